//! Frame pump: the task that reads from the socket and feeds objects.
//!
//! Runs for the lifetime of a [`Display`](crate::Display). The flow is:
//!   1. Read a chunk from the connection
//!   2. Split it into whole frames (a frame may span reads)
//!   3. Route each frame to the object it names, which decodes and emits
//!
//! The loop ends when the server hangs up, the stream fails, a header is
//! corrupt, or a fatal protocol error arrives. Whatever the cause, every
//! listener is dropped on the way out so pending waits resolve.

use std::sync::Arc;

use waylink_protocol::{ByteOrder, Frame, FrameDecoder};
use waylink_transport::Connection;

use crate::display::Shared;
use crate::WaylinkError;

/// Tears the connection down when the pump exits, including when its task
/// is aborted because the `Display` was dropped.
///
/// `Drop` is synchronous, so closing the stream is handed to a
/// fire-and-forget task.
struct TeardownGuard {
    shared: Arc<Shared>,
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        self.shared.mark_closed();
        for proxy in self.shared.objects() {
            proxy.clear_listeners();
        }
        self.shared.signal_torn_down();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let shared = Arc::clone(&self.shared);
            handle.spawn(async move { shared.teardown().await });
        }
    }
}

/// Reads and dispatches frames until the connection ends.
pub(crate) async fn run(shared: Arc<Shared>) {
    let conn_id = shared.conn.id();
    tracing::debug!(%conn_id, "frame pump started");
    let _guard = TeardownGuard {
        shared: Arc::clone(&shared),
    };
    let mut decoder = FrameDecoder::new(ByteOrder::NATIVE);

    'read: loop {
        let data = match shared.conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "compositor closed the connection");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                if !shared.is_closed() {
                    shared.escalate(e.into());
                }
                break;
            }
        };
        decoder.push(&data);

        loop {
            match decoder.next_frame() {
                Ok(Some(frame)) => dispatch(&shared, frame),
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(%conn_id, error = %e, "corrupt frame header");
                    shared.escalate(e.into());
                    break 'read;
                }
            }
            if shared.has_failed() {
                tracing::info!(%conn_id, "connection failed while dispatching");
                break 'read;
            }
        }
    }

    if decoder.pending() > 0 {
        tracing::debug!(%conn_id, pending = decoder.pending(), "discarding partial frame");
    }
    tracing::debug!(%conn_id, "frame pump stopped");
    // _guard drops here → listeners cleared, stream closed.
}

/// Routes one frame to its target object.
fn dispatch(shared: &Shared, frame: Frame) {
    let Some(target) = shared.lookup(frame.object_id) else {
        let warning = WaylinkError::UnknownTarget(frame.object_id);
        tracing::warn!(opcode = frame.opcode, error = %warning, "dropping event");
        shared.warn(warning);
        return;
    };
    target.push(frame.opcode, &frame.payload);
}
