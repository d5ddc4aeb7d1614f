//! Transport abstraction layer for waylink.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! how the client reaches the compositor. The protocol itself only needs
//! an ordered, reliable byte stream; a Unix socket in production, an
//! in-memory pipe in tests.
//!
//! # Feature Flags
//!
//! - `unix` (default): [`UnixTransport`], connecting to the compositor's
//!   Unix domain socket.

#![allow(async_fn_in_trait)]

mod error;
mod socket;
mod stream;

pub use error::TransportError;
pub use socket::{resolve_socket_path, socket_path, DEFAULT_DISPLAY};
#[cfg(all(unix, feature = "unix"))]
pub use socket::UnixTransport;
pub use stream::StreamConnection;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection, used to tag log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Hands out the next process-wide unique id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Opens connections to a compositor.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Opens a new connection.
    async fn connect(&self) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that can send and receive bytes.
///
/// Unlike a message-oriented transport, `recv` hands back whatever chunk
/// the stream produced: it may hold several protocol frames or end in the
/// middle of one. Reassembly is the caller's job.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Writes all of `data` to the peer.
    ///
    /// Concurrent sends never interleave: each call's bytes reach the
    /// stream contiguously. If the stream is not writable, the call waits
    /// until it is.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next chunk of bytes from the peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the write half of the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
