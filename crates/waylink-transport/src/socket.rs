//! Locating and opening the compositor socket.
//!
//! The socket name comes from `WAYLAND_DISPLAY`. An absolute name is used
//! as is; a relative one lives in `XDG_RUNTIME_DIR`. With no
//! `WAYLAND_DISPLAY` at all, the conventional `wayland-0` is assumed.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::TransportError;

/// Socket name used when `WAYLAND_DISPLAY` is unset.
pub const DEFAULT_DISPLAY: &str = "wayland-0";

/// Resolves a socket path from the two environment values.
///
/// Kept free of any environment access so it can be tested directly.
pub fn resolve_socket_path(
    runtime_dir: Option<&OsStr>,
    display: Option<&OsStr>,
) -> Result<PathBuf, TransportError> {
    let display = Path::new(display.unwrap_or(OsStr::new(DEFAULT_DISPLAY)));
    if display.is_absolute() {
        return Ok(display.to_path_buf());
    }
    match runtime_dir {
        Some(dir) if !dir.is_empty() => Ok(Path::new(dir).join(display)),
        _ => Err(TransportError::NoRuntimeDir(
            display.to_string_lossy().into_owned(),
        )),
    }
}

/// Socket path for the current environment.
pub fn socket_path() -> Result<PathBuf, TransportError> {
    let runtime_dir = std::env::var_os("XDG_RUNTIME_DIR");
    let display = std::env::var_os("WAYLAND_DISPLAY");
    resolve_socket_path(runtime_dir.as_deref(), display.as_deref())
}

/// A [`Transport`](crate::Transport) that connects to a Unix domain socket.
#[cfg(all(unix, feature = "unix"))]
#[derive(Debug, Clone)]
pub struct UnixTransport {
    path: PathBuf,
}

#[cfg(all(unix, feature = "unix"))]
impl UnixTransport {
    /// A transport for an explicit socket path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A transport for the socket named by the environment.
    pub fn from_env() -> Result<Self, TransportError> {
        socket_path().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(all(unix, feature = "unix"))]
impl crate::Transport for UnixTransport {
    type Connection = crate::StreamConnection;
    type Error = TransportError;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let stream = tokio::net::UnixStream::connect(&self.path)
            .await
            .map_err(|source| TransportError::ConnectFailed {
                path: self.path.clone(),
                source,
            })?;
        tracing::info!(path = %self.path.display(), "connected to compositor");
        Ok(crate::StreamConnection::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_socket_path_relative_joins_runtime_dir() {
        let path = resolve_socket_path(
            Some(OsStr::new("/run/user/1000")),
            Some(OsStr::new("wayland-1")),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/run/user/1000/wayland-1"));
    }

    #[test]
    fn test_resolve_socket_path_absolute_used_verbatim() {
        let path = resolve_socket_path(None, Some(OsStr::new("/tmp/wl.sock"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/wl.sock"));
    }

    #[test]
    fn test_resolve_socket_path_defaults_to_wayland_0() {
        let path = resolve_socket_path(Some(OsStr::new("/run/user/1000")), None).unwrap();
        assert_eq!(path, PathBuf::from("/run/user/1000/wayland-0"));
    }

    #[test]
    fn test_resolve_socket_path_without_runtime_dir_fails() {
        let err = resolve_socket_path(None, None).unwrap_err();
        assert!(matches!(err, TransportError::NoRuntimeDir(ref name) if name == "wayland-0"));
    }
}
