//! Error types for the protocol layer.
//!
//! Each crate in waylink defines its own error enum. A `ProtocolError`
//! always means the problem is in the bytes or the schema: a bad argument,
//! a malformed frame, an interface nobody loaded. Never a socket problem.

/// Errors that can occur while encoding, decoding, or resolving schema.
///
/// The argument variants (`InvalidArity`, `InvalidType`, `InvalidValue`)
/// are raised before a single byte is written, so a caller that sees one
/// knows the request never left the client.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The number of supplied values doesn't match the definition.
    #[error("bad number of arguments ({given}, expected {expected})")]
    InvalidArity { given: usize, expected: usize },

    /// A value of the wrong kind was supplied for an argument,
    /// e.g. a string where the schema says `uint`.
    #[error("invalid type: {found} for {name}, expected a {expected}")]
    InvalidType {
        name: String,
        expected: String,
        found: &'static str,
    },

    /// The value has the right kind but is out of range for the slot:
    /// negative `uint`, NaN, zero object identity, and so on.
    #[error("invalid {ty} value for {name}: {reason}")]
    InvalidValue {
        name: String,
        ty: String,
        reason: String,
    },

    /// The schema names an argument type the codec doesn't implement.
    #[error("unsupported argument type: {0}")]
    UnsupportedType(String),

    /// A read ran past the end of the buffer.
    #[error("truncated message: needed {needed} bytes at offset {offset}, buffer has {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A decoded string wasn't valid UTF-8.
    #[error("invalid utf-8 in string argument {name}")]
    InvalidUtf8 { name: String },

    /// A frame header declared a size smaller than the header itself.
    /// The stream can't be resynchronised after this.
    #[error("invalid frame size {0} (minimum is 8)")]
    InvalidFrameSize(u16),

    /// An outbound message doesn't fit in the 16-bit size field.
    #[error("message of {0} bytes exceeds the 65535 byte frame limit")]
    FrameTooLarge(usize),

    /// No definition has been loaded for this interface name.
    #[error("no interface definition for {0}")]
    UnknownInterface(String),

    /// The schema itself is inconsistent (missing enum, bad request, ...).
    #[error("invalid schema: {0}")]
    Schema(String),

    /// Reading a schema file failed.
    #[error("failed to read schema: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON schema document couldn't be parsed.
    #[cfg(feature = "json")]
    #[error("failed to parse schema: {0}")]
    Json(#[from] serde_json::Error),
}
