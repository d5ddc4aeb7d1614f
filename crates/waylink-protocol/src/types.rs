//! Core value types shared by the codec and everything above it.
//!
//! An [`Arg`] is one argument of a request or event, in native form. It
//! carries no type information of its own beyond the variant: what a value
//! *means* on the wire is decided by the [`ArgumentDefinition`] it's paired
//! with, never by inspecting the value.
//!
//! [`ArgumentDefinition`]: crate::ArgumentDefinition

use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The 32-bit identity of one protocol object within a connection.
///
/// Identity 1 is always the display; client-allocated identities grow
/// upward from there. `#[serde(transparent)]` makes `ObjectId(5)`
/// serialize as plain `5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// The root display object, reserved on every connection.
    pub const DISPLAY: ObjectId = ObjectId(1);

    /// Returns the underlying `u32`.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl From<u32> for ObjectId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Anything that names a protocol object.
///
/// `object` arguments accept either a raw identity or a live object handle;
/// both go through this trait so they encode identically.
pub trait ObjectLike {
    /// The identity of the object on the wire.
    fn object_id(&self) -> ObjectId;
}

impl ObjectLike for ObjectId {
    fn object_id(&self) -> ObjectId {
        *self
    }
}

impl ObjectLike for u32 {
    fn object_id(&self) -> ObjectId {
        ObjectId(*self)
    }
}

// ---------------------------------------------------------------------------
// Byte order
// ---------------------------------------------------------------------------

/// Multi-byte ordering used for every 32-bit word on the wire.
///
/// The protocol runs over a local socket, so both ends use the host's
/// order. [`ByteOrder::NATIVE`] is what the connection uses; the explicit
/// variants exist so tests can pin down exact bytes on any host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// The byte order of the machine we're compiled for.
    #[cfg(target_endian = "little")]
    pub const NATIVE: ByteOrder = ByteOrder::Little;
    /// The byte order of the machine we're compiled for.
    #[cfg(target_endian = "big")]
    pub const NATIVE: ByteOrder = ByteOrder::Big;

    pub(crate) fn u32_bytes(self, value: u32) -> [u8; 4] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }

    pub(crate) fn u32_from(self, bytes: [u8; 4]) -> u32 {
        match self {
            Self::Little => u32::from_le_bytes(bytes),
            Self::Big => u32::from_be_bytes(bytes),
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self::NATIVE
    }
}

// ---------------------------------------------------------------------------
// Arg
// ---------------------------------------------------------------------------

/// A single argument value in native form.
///
/// Requests are built from these and events decode into them. The codec
/// is lenient about *which* integer variant fills an integer slot (an
/// `Int(3)` is a fine `uint`) but strict about range: it never silently
/// wraps a negative number or truncates a fraction.
///
/// `#[serde(untagged)]` serializes the bare value (`5`, `"eDP-1"`, `1.5`),
/// which is what snapshots print.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Arg {
    /// Unsigned 32-bit integer (`uint`, `enum`).
    Uint(u32),
    /// Signed 32-bit integer (`int`).
    Int(i32),
    /// 24.8 fixed-point number, carried as `f64`.
    Fixed(f64),
    /// UTF-8 string.
    Str(String),
    /// Opaque byte array.
    Array(Vec<u8>),
    /// Identity of an existing object.
    Object(u32),
    /// Identity of an object being created.
    NewId(u32),
    /// A file descriptor slot. Descriptors never travel in the payload,
    /// so a decoded `fd` is always `Fd(None)`.
    Fd(Option<i32>),
}

impl Arg {
    /// Builds an `object` argument from anything that has an identity.
    pub fn object(target: &impl ObjectLike) -> Self {
        Self::Object(target.object_id().0)
    }

    /// A short name for the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Uint(_) => "uint",
            Self::Int(_) => "int",
            Self::Fixed(_) => "fixed",
            Self::Str(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::NewId(_) => "new_id",
            Self::Fd(_) => "fd",
        }
    }

    /// Returns the value as a `u32` if it's an unsigned or identity slot.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::Uint(v) | Self::Object(v) | Self::NewId(v) => Some(*v),
            Self::Int(v) => u32::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Returns the value as an `i32` if it's an integer slot.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Uint(v) => i32::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Returns the value as a float for `fixed` or integer slots.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Fixed(v) => Some(*v),
            Self::Int(v) => Some(f64::from(*v)),
            Self::Uint(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    /// Returns the string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<u32> for Arg {
    fn from(v: u32) -> Self {
        Self::Uint(v)
    }
}

impl From<i32> for Arg {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Self::Fixed(v)
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<u8>> for Arg {
    fn from(v: Vec<u8>) -> Self {
        Self::Array(v)
    }
}

impl From<ObjectId> for Arg {
    fn from(id: ObjectId) -> Self {
        Self::Object(id.0)
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uint(v) | Self::Object(v) | Self::NewId(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Fixed(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Array(a) => write!(f, "array[{}]", a.len()),
            Self::Fd(Some(fd)) => write!(f, "fd {fd}"),
            Self::Fd(None) => write!(f, "fd (unavailable)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_display() {
        assert_eq!(ObjectId(5).to_string(), "@5");
    }

    #[test]
    fn test_object_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&ObjectId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_arg_object_from_raw_and_id_are_equal() {
        assert_eq!(Arg::object(&3u32), Arg::object(&ObjectId(3)));
        assert_eq!(Arg::from(ObjectId(3)), Arg::Object(3));
    }

    #[test]
    fn test_arg_serializes_untagged() {
        assert_eq!(serde_json::to_string(&Arg::Uint(7)).unwrap(), "7");
        assert_eq!(
            serde_json::to_string(&Arg::Str("eDP-1".into())).unwrap(),
            "\"eDP-1\""
        );
        assert_eq!(serde_json::to_string(&Arg::Fd(None)).unwrap(), "null");
    }

    #[test]
    fn test_arg_as_u32_rejects_negative_int() {
        assert_eq!(Arg::Int(-1).as_u32(), None);
        assert_eq!(Arg::Int(4).as_u32(), Some(4));
    }

    #[test]
    fn test_byte_order_round_trips_words() {
        for order in [ByteOrder::Little, ByteOrder::Big] {
            let bytes = order.u32_bytes(0x0102_0304);
            assert_eq!(order.u32_from(bytes), 0x0102_0304);
        }
        assert_eq!(ByteOrder::Little.u32_bytes(1), [1, 0, 0, 0]);
        assert_eq!(ByteOrder::Big.u32_bytes(1), [0, 0, 0, 1]);
    }
}
