/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Opening the socket failed.
    #[error("failed to connect to {path}: {source}")]
    ConnectFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `WAYLAND_DISPLAY` is relative and there's no runtime directory to
    /// resolve it against.
    #[error("XDG_RUNTIME_DIR is not set; can't locate socket {0}")]
    NoRuntimeDir(String),
}
