//! Typed event values and the per-object listener table.
//!
//! Every [`Proxy`] owns an [`EventBus`]. Listeners are plain synchronous
//! closures, called on the frame pump's task in arrival order. Async
//! consumers use [`Proxy::once`] or [`Proxy::subscribe`], which are built
//! on top of these closures with channels.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot};
use waylink_protocol::{Arg, ObjectId};

use crate::{lock, Proxy, WaylinkError};

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// One decoded event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The object that emitted it.
    pub sender: ObjectId,
    pub opcode: u16,
    pub name: String,
    pub args: Vec<EventArg>,
}

/// A single event argument.
///
/// Events that announce a server-created object carry the freshly
/// registered [`Proxy`] in place of its raw identity.
#[derive(Debug, Clone)]
pub enum EventArg {
    Value(Arg),
    Object(Proxy),
}

impl EventArg {
    pub fn as_value(&self) -> Option<&Arg> {
        match self {
            Self::Value(v) => Some(v),
            Self::Object(_) => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            Self::Object(p) => Some(p),
            Self::Value(_) => None,
        }
    }
}

impl Event {
    /// The `i`-th argument as a plain value.
    pub fn value(&self, i: usize) -> Option<&Arg> {
        self.args.get(i).and_then(EventArg::as_value)
    }

    /// The `i`-th argument as an object created by this event.
    pub fn proxy(&self, i: usize) -> Option<&Proxy> {
        self.args.get(i).and_then(EventArg::as_proxy)
    }

    pub fn u32(&self, i: usize) -> Option<u32> {
        self.value(i).and_then(Arg::as_u32)
    }

    pub fn str(&self, i: usize) -> Option<&str> {
        self.value(i).and_then(Arg::as_str)
    }
}

// ---------------------------------------------------------------------------
// Listener table
// ---------------------------------------------------------------------------

/// Handle returned by [`Proxy::on`]; pass it to [`Proxy::off`] to detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L-{}", self.0)
    }
}

pub(crate) type EventCallback = Arc<Mutex<dyn FnMut(&Event) + Send>>;
pub(crate) type ErrorCallback = Arc<Mutex<dyn FnMut(&WaylinkError) + Send>>;

struct Listener {
    id: ListenerId,
    /// `None` listens to every event.
    event: Option<String>,
    callback: EventCallback,
}

/// Listener table of one object.
///
/// Callbacks are handed out as cloned `Arc`s so the table lock is released
/// before any of them run. A callback may therefore attach or detach
/// listeners (on this object or any other) without deadlocking.
#[derive(Default)]
pub(crate) struct EventBus {
    next_id: u64,
    listeners: Vec<Listener>,
    error_listeners: Vec<(ListenerId, ErrorCallback)>,
}

impl EventBus {
    fn next_id(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }

    pub(crate) fn add(&mut self, event: Option<String>, callback: EventCallback) -> ListenerId {
        let id = self.next_id();
        self.listeners.push(Listener {
            id,
            event,
            callback,
        });
        id
    }

    pub(crate) fn add_error(&mut self, callback: ErrorCallback) -> ListenerId {
        let id = self.next_id();
        self.error_listeners.push((id, callback));
        id
    }

    /// Detaches a listener of either kind. Returns `false` if it wasn't
    /// attached.
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len() + self.error_listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.error_listeners.retain(|(lid, _)| *lid != id);
        before != self.listeners.len() + self.error_listeners.len()
    }

    /// Callbacks interested in `name`, in attachment order.
    pub(crate) fn matching(&self, name: &str) -> Vec<EventCallback> {
        self.listeners
            .iter()
            .filter(|l| l.event.as_deref().is_none_or(|e| e == name))
            .map(|l| Arc::clone(&l.callback))
            .collect()
    }

    pub(crate) fn error_callbacks(&self) -> Vec<ErrorCallback> {
        self.error_listeners
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect()
    }

    /// Number of listeners for `name` (wildcards included).
    pub(crate) fn count(&self, name: &str) -> usize {
        self.listeners
            .iter()
            .filter(|l| l.event.as_deref().is_none_or(|e| e == name))
            .count()
    }

    pub(crate) fn error_count(&self) -> usize {
        self.error_listeners.len()
    }

    /// Drops every listener. Pending [`OnceEvent`]s and [`EventStream`]s
    /// see their sender go away and finish.
    pub(crate) fn clear(&mut self) {
        self.listeners.clear();
        self.error_listeners.clear();
    }
}

/// Runs `callbacks` in order with `event`.
pub(crate) fn dispatch(callbacks: &[EventCallback], event: &Event) {
    for callback in callbacks {
        let mut f = lock(callback);
        (&mut *f)(event);
    }
}

/// Runs error `callbacks` in order.
pub(crate) fn dispatch_error(callbacks: &[ErrorCallback], error: &WaylinkError) {
    for callback in callbacks {
        let mut f = lock(callback);
        (&mut *f)(error);
    }
}

// ---------------------------------------------------------------------------
// Async adapters
// ---------------------------------------------------------------------------

/// Detaches a listener when dropped.
pub(crate) struct ListenerGuard {
    proxy: Proxy,
    id: ListenerId,
}

impl ListenerGuard {
    pub(crate) fn new(proxy: Proxy, id: ListenerId) -> Self {
        Self { proxy, id }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.proxy.off(self.id);
    }
}

/// Resolves once the connection behind a proxy has been torn down.
///
/// Listeners of deleted objects are not reachable from the registry, so
/// pending waits also watch this.
pub(crate) struct ClosedSignal {
    wait: Option<Pin<Box<dyn Future<Output = ()> + Send>>>,
}

impl ClosedSignal {
    pub(crate) fn new(wait: impl Future<Output = ()> + Send + 'static) -> Self {
        Self {
            wait: Some(Box::pin(wait)),
        }
    }

    /// Already closed.
    pub(crate) fn closed() -> Self {
        Self { wait: None }
    }

    fn poll_closed(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        let Some(wait) = self.wait.as_mut() else {
            return Poll::Ready(());
        };
        match wait.as_mut().poll(cx) {
            Poll::Ready(()) => {
                self.wait = None;
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Future returned by [`Proxy::once`]: resolves with the next matching
/// event.
///
/// The listener is attached as soon as `once` is called, not when the
/// future is first polled, so an event that arrives in between is not
/// lost. Dropping the future detaches it. If the connection is torn down
/// first, resolves with [`WaylinkError::ConnectionClosed`].
pub struct OnceEvent {
    rx: oneshot::Receiver<Event>,
    closed: ClosedSignal,
    _guard: ListenerGuard,
}

impl OnceEvent {
    pub(crate) fn attach(proxy: &Proxy, event: Option<String>) -> Self {
        let (tx, rx) = oneshot::channel();
        let mut tx = Some(tx);
        let id = proxy.attach(event, move |e: &Event| {
            if let Some(tx) = tx.take() {
                let _ = tx.send(e.clone());
            }
        });
        Self {
            rx,
            closed: proxy.closed_signal(),
            _guard: ListenerGuard::new(proxy.clone(), id),
        }
    }
}

impl Future for OnceEvent {
    type Output = Result<Event, WaylinkError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Poll::Ready(r) = Pin::new(&mut self.rx).poll(cx) {
            return Poll::Ready(r.map_err(|_| WaylinkError::ConnectionClosed));
        }
        self.closed
            .poll_closed(cx)
            .map(|()| Err(WaylinkError::ConnectionClosed))
    }
}

/// Stream of every event an object emits, from [`Proxy::subscribe`].
///
/// Ends when the connection is torn down. Dropping it detaches the
/// listener.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Event>,
    closed: ClosedSignal,
    _guard: ListenerGuard,
}

impl EventStream {
    pub(crate) fn attach(proxy: &Proxy) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = proxy.attach(None, move |e: &Event| {
            let _ = tx.send(e.clone());
        });
        Self {
            rx,
            closed: proxy.closed_signal(),
            _guard: ListenerGuard::new(proxy.clone(), id),
        }
    }

    /// Receives the next event, or `None` once the connection is gone.
    ///
    /// Events queued before teardown are still handed out first.
    pub async fn recv(&mut self) -> Option<Event> {
        std::future::poll_fn(|cx| self.poll_event(cx)).await
    }

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        if let Poll::Ready(event) = self.rx.poll_recv(cx) {
            return Poll::Ready(event);
        }
        match self.closed.poll_closed(cx) {
            // Drain whatever slipped in before the signal fired.
            Poll::Ready(()) => Poll::Ready(self.rx.try_recv().ok()),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl futures_util::Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.poll_event(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn callback(f: impl FnMut(&Event) + Send + 'static) -> EventCallback {
        Arc::new(Mutex::new(f))
    }

    fn event(name: &str) -> Event {
        Event {
            sender: ObjectId(3),
            opcode: 0,
            name: name.into(),
            args: vec![EventArg::Value(Arg::Uint(9))],
        }
    }

    #[test]
    fn test_bus_matching_filters_by_name() {
        let mut bus = EventBus::default();
        bus.add(Some("done".into()), callback(|_| {}));
        bus.add(Some("other".into()), callback(|_| {}));
        bus.add(None, callback(|_| {}));

        assert_eq!(bus.matching("done").len(), 2);
        assert_eq!(bus.count("other"), 2);
        assert_eq!(bus.count("missing"), 1);
    }

    #[test]
    fn test_bus_remove_returns_whether_attached() {
        let mut bus = EventBus::default();
        let id = bus.add(Some("done".into()), callback(|_| {}));
        assert!(bus.remove(id));
        assert!(!bus.remove(id));
        assert_eq!(bus.count("done"), 0);
    }

    #[test]
    fn test_dispatch_runs_in_attachment_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::default();
        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            bus.add(
                Some("done".into()),
                callback(move |e| seen.lock().unwrap().push((tag, e.u32(0)))),
            );
        }
        dispatch(&bus.matching("done"), &event("done"));
        assert_eq!(
            *seen.lock().unwrap(),
            [("first", Some(9)), ("second", Some(9))]
        );
    }

    #[test]
    fn test_bus_clear_drops_everything() {
        let mut bus = EventBus::default();
        bus.add(None, callback(|_| {}));
        bus.add_error(Arc::new(Mutex::new(|_: &WaylinkError| {})));
        bus.clear();
        assert_eq!(bus.count("x"), 0);
        assert_eq!(bus.error_count(), 0);
    }

    #[test]
    fn test_listener_id_display() {
        assert_eq!(ListenerId(4).to_string(), "L-4");
    }
}
