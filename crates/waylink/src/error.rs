//! Unified error type for waylink.

use waylink_protocol::{ObjectId, ProtocolError};
use waylink_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `waylink` crate, you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on the wrapping variants generates `From` impls, so `?`
/// converts sub-crate errors automatically.
///
/// ## Taxonomy
///
/// - Argument problems (`Protocol(InvalidArity | InvalidType | InvalidValue)`,
///   `FdUnsupported`, `UnknownRequest`) are raised before anything is
///   written. The request never left the client.
/// - `UnknownTarget` and `UnknownOpcode` describe inbound frames that were
///   dropped. They're reported as warnings, never returned from a call.
/// - `Fatal` is the server's own error event. The connection is torn down
///   after one of these.
/// - `Transport` is the byte stream failing underneath us.
#[derive(Debug, thiserror::Error)]
pub enum WaylinkError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (bad argument, bad frame, unknown interface).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An inbound frame was addressed to an identity with no object.
    #[error("no object with id {}", .0.get())]
    UnknownTarget(ObjectId),

    /// An inbound frame carried an event code the interface doesn't declare.
    #[error("interface {interface} has no event with index {opcode}")]
    UnknownOpcode { interface: String, opcode: u16 },

    /// No request with that name on the object's interface.
    #[error("no operation named {request} in interface {interface}")]
    UnknownRequest { interface: String, request: String },

    /// `create` was used on a request whose first argument isn't a typed
    /// `new_id`.
    #[error("{interface}.{request} does not create an object")]
    NotACreationRequest { interface: String, request: String },

    /// The request has a file-descriptor argument. Descriptors travel out
    /// of band, which isn't implemented.
    #[error("{interface}.{request}: file descriptor arguments are not supported")]
    FdUnsupported { interface: String, request: String },

    /// An object-creating request failed; `args` lists the declared
    /// argument names.
    #[error("{interface}.{request}({args}) failed: {source}")]
    Request {
        interface: String,
        request: String,
        args: String,
        #[source]
        source: Box<WaylinkError>,
    },

    /// `bind` was asked for an interface the server never advertised.
    #[error("no global named {name}. Available globals: {available}")]
    NoGlobal { name: String, available: String },

    /// The server reported a fatal error on one of our objects.
    #[error(
        "fatal protocol error on {} {object}: {} ({code}): {message}",
        .interface.as_deref().unwrap_or("unknown object"),
        .code_name.as_deref().unwrap_or("undefined error")
    )]
    Fatal {
        object: ObjectId,
        interface: Option<String>,
        code: u32,
        code_name: Option<String>,
        summary: Option<String>,
        message: String,
    },

    /// Every client identity is in use.
    #[error("no free object id left")]
    IdsExhausted,

    /// The connection is gone (closed locally, by the peer, or after a
    /// fatal error).
    #[error("connection closed")]
    ConnectionClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let waylink_err: WaylinkError = err.into();
        assert!(matches!(waylink_err, WaylinkError::Transport(_)));
        assert!(waylink_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidArity {
            given: 1,
            expected: 2,
        };
        let waylink_err: WaylinkError = err.into();
        assert!(matches!(waylink_err, WaylinkError::Protocol(_)));
        assert_eq!(
            waylink_err.to_string(),
            "bad number of arguments (1, expected 2)"
        );
    }

    #[test]
    fn test_request_error_message_names_arguments() {
        let err = WaylinkError::Request {
            interface: "wl_compositor".into(),
            request: "create_surface".into(),
            args: "id".into(),
            source: Box::new(WaylinkError::ConnectionClosed),
        };
        assert_eq!(
            err.to_string(),
            "wl_compositor.create_surface(id) failed: connection closed"
        );
    }

    #[test]
    fn test_fatal_message_with_resolved_code() {
        let err = WaylinkError::Fatal {
            object: ObjectId(3),
            interface: Some("wl_surface".into()),
            code: 0,
            code_name: Some("invalid_scale".into()),
            summary: None,
            message: "scale 0".into(),
        };
        assert_eq!(
            err.to_string(),
            "fatal protocol error on wl_surface @3: invalid_scale (0): scale 0"
        );
    }

    #[test]
    fn test_fatal_message_unknown_object() {
        let err = WaylinkError::Fatal {
            object: ObjectId(40),
            interface: None,
            code: 7,
            code_name: None,
            summary: None,
            message: "boom".into(),
        };
        assert_eq!(
            err.to_string(),
            "fatal protocol error on unknown object @40: undefined error (7): boom"
        );
    }
}
