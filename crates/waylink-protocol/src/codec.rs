//! Argument codec: native [`Arg`] values ↔ payload bytes.
//!
//! Every argument is laid out in 32-bit words. Numbers take one word;
//! strings and arrays take a length word plus their bytes padded to the
//! next multiple of 4; `fd` takes nothing at all, because descriptors
//! travel out of band.
//!
//! Encoding is done in two passes:
//!
//! 1. **Plan**: validate every value against its [`ArgumentDefinition`]
//!    and work out how many bytes it needs. Any type or range error comes
//!    out of this pass.
//! 2. **Write**: allocate one buffer of the exact total size and write each
//!    planned value at its offset.
//!
//! So a caller either gets the complete payload or an error, never a
//! half-written buffer.
//!
//! ## Example
//!
//! ```rust
//! use waylink_protocol::{format_args_with, get_args_with, Arg, ArgumentDefinition, ByteOrder};
//!
//! let defs = [
//!     ArgumentDefinition::new("name", "string"),
//!     ArgumentDefinition::new("scale", "fixed"),
//! ];
//! let bytes = format_args_with(ByteOrder::Little, &[Arg::from("he"), Arg::Fixed(1.5)], &defs).unwrap();
//! assert_eq!(bytes.len(), 12);
//!
//! let args = get_args_with(ByteOrder::Little, &bytes, &defs).unwrap();
//! assert_eq!(args, [Arg::from("he"), Arg::Fixed(1.5)]);
//! ```

use crate::{Arg, ArgType, ArgumentDefinition, ByteOrder, ProtocolError};

/// Largest magnitude a 24.8 fixed value can hold: 31 bits.
const FIXED_MAGNITUDE_MASK: u32 = 0x7FFF_FFFF;
const FIXED_SIGN_BIT: u32 = 0x8000_0000;

/// Rounds `len` up to the next multiple of 4.
pub fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

// ---------------------------------------------------------------------------
// Fixed point
// ---------------------------------------------------------------------------

/// Encodes a float as 24.8 fixed point in sign-magnitude form.
///
/// This is *not* two's complement: bit 31 is the sign and bits 0..31 are
/// the magnitude scaled by 256. `-1.0` is `0x8000_0100`.
pub fn fixed_to_word(value: f64) -> Option<u32> {
    if !value.is_finite() {
        return None;
    }
    // Ties round toward positive infinity, before the sign is split off.
    let scaled = (value * 256.0 + 0.5).floor();
    if scaled.abs() > f64::from(FIXED_MAGNITUDE_MASK) {
        return None;
    }
    // Range checked above, so the cast can't saturate.
    let magnitude = scaled.abs() as u32;
    let sign = if scaled < 0.0 {
        FIXED_SIGN_BIT
    } else {
        0
    };
    Some(sign | magnitude)
}

/// Decodes a sign-magnitude 24.8 word back into a float.
pub fn word_to_fixed(word: u32) -> f64 {
    let magnitude = f64::from(word & FIXED_MAGNITUDE_MASK) / 256.0;
    if word & FIXED_SIGN_BIT != 0 {
        -magnitude
    } else {
        magnitude
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Argument codec bound to one byte order.
///
/// Connections always use [`ByteOrder::NATIVE`]; the free functions
/// [`format_args`] and [`get_args`] are shorthands for that. Tests that
/// compare against literal hex use an explicit order so they hold on any
/// host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WireCodec {
    order: ByteOrder,
}

impl WireCodec {
    pub fn new(order: ByteOrder) -> Self {
        Self { order }
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Encodes `values` according to `defs`.
    ///
    /// # Errors
    /// - `InvalidArity` if the counts differ (checked before anything else).
    /// - `InvalidType` / `InvalidValue` for a value that doesn't fit its slot.
    /// - `UnsupportedType` for a type tag the codec doesn't implement.
    pub fn encode(
        &self,
        values: &[Arg],
        defs: &[ArgumentDefinition],
    ) -> Result<Vec<u8>, ProtocolError> {
        if values.len() != defs.len() {
            return Err(ProtocolError::InvalidArity {
                given: values.len(),
                expected: defs.len(),
            });
        }

        // Pass 1: validate and size.
        let mut plan = Vec::with_capacity(values.len());
        let mut total = 0usize;
        for (value, def) in values.iter().zip(defs) {
            let slot = Slot::plan(value, def)?;
            total += slot.encoded_len();
            plan.push(slot);
        }

        // Pass 2: write into one zeroed buffer, so padding is already 0.
        let mut buf = vec![0u8; total];
        let mut offset = 0;
        for slot in &plan {
            offset = slot.write(self.order, &mut buf, offset);
        }
        Ok(buf)
    }

    /// Decodes a payload according to `defs`.
    ///
    /// # Errors
    /// - `Truncated` if the payload ends before every argument was read.
    /// - `InvalidUtf8` for a string that isn't UTF-8.
    /// - `UnsupportedType` for a type tag the codec doesn't implement.
    pub fn decode(
        &self,
        bytes: &[u8],
        defs: &[ArgumentDefinition],
    ) -> Result<Vec<Arg>, ProtocolError> {
        let mut reader = Reader {
            bytes,
            offset: 0,
            order: self.order,
        };
        defs.iter().map(|def| reader.read_arg(def)).collect()
    }
}

/// Encodes `values` in the host's byte order.
pub fn format_args(values: &[Arg], defs: &[ArgumentDefinition]) -> Result<Vec<u8>, ProtocolError> {
    WireCodec::new(ByteOrder::NATIVE).encode(values, defs)
}

/// Encodes `values` in an explicit byte order.
pub fn format_args_with(
    order: ByteOrder,
    values: &[Arg],
    defs: &[ArgumentDefinition],
) -> Result<Vec<u8>, ProtocolError> {
    WireCodec::new(order).encode(values, defs)
}

/// Decodes a payload in the host's byte order.
pub fn get_args(bytes: &[u8], defs: &[ArgumentDefinition]) -> Result<Vec<Arg>, ProtocolError> {
    WireCodec::new(ByteOrder::NATIVE).decode(bytes, defs)
}

/// Decodes a payload in an explicit byte order.
pub fn get_args_with(
    order: ByteOrder,
    bytes: &[u8],
    defs: &[ArgumentDefinition],
) -> Result<Vec<Arg>, ProtocolError> {
    WireCodec::new(order).decode(bytes, defs)
}

// ---------------------------------------------------------------------------
// Encoding plan
// ---------------------------------------------------------------------------

/// One validated argument, ready to be written.
enum Slot<'a> {
    /// A single 32-bit word.
    Word(u32),
    /// Length word followed by bytes, padded to 4. `nul` appends the
    /// string terminator, which the length word already counts.
    Blob { data: &'a [u8], nul: bool },
    /// Takes no payload space (`fd`).
    Empty,
}

impl<'a> Slot<'a> {
    fn plan(value: &'a Arg, def: &ArgumentDefinition) -> Result<Self, ProtocolError> {
        let slot = match &def.ty {
            ArgType::Uint | ArgType::Enum | ArgType::NewId => {
                let word = unsigned(value, def)?;
                if def.ty == ArgType::NewId && word == 0 {
                    return Err(invalid_value(def, "object identity must be positive"));
                }
                Slot::Word(word)
            }
            ArgType::Object => {
                let word = unsigned(value, def)?;
                if word == 0 && !def.allow_null {
                    return Err(invalid_value(def, "object identity must be positive"));
                }
                Slot::Word(word)
            }
            ArgType::Int => Slot::Word(signed(value, def)? as u32),
            ArgType::Fixed => {
                let float = match value {
                    Arg::Fixed(v) => *v,
                    Arg::Int(v) => f64::from(*v),
                    Arg::Uint(v) => f64::from(*v),
                    other => return Err(invalid_type(def, other)),
                };
                if float.is_nan() {
                    return Err(invalid_value(def, "NaN"));
                }
                let word = fixed_to_word(float)
                    .ok_or_else(|| invalid_value(def, "out of 24.8 fixed-point range"))?;
                Slot::Word(word)
            }
            ArgType::String => match value {
                Arg::Str(s) => {
                    if s.as_bytes().contains(&0) {
                        return Err(invalid_value(def, "string contains a NUL byte"));
                    }
                    Slot::Blob {
                        data: s.as_bytes(),
                        nul: true,
                    }
                }
                other => return Err(invalid_type(def, other)),
            },
            ArgType::Array => match value {
                Arg::Array(a) => Slot::Blob {
                    data: a,
                    nul: false,
                },
                other => return Err(invalid_type(def, other)),
            },
            ArgType::Fd => match value {
                Arg::Fd(_) | Arg::Int(_) => Slot::Empty,
                other => return Err(invalid_type(def, other)),
            },
            ArgType::Other(name) => return Err(ProtocolError::UnsupportedType(name.clone())),
        };

        if let Slot::Blob { data, nul } = &slot {
            let declared = data.len() + usize::from(*nul);
            if u32::try_from(declared).is_err() {
                return Err(invalid_value(def, "too long for a 32-bit length"));
            }
        }
        Ok(slot)
    }

    fn encoded_len(&self) -> usize {
        match self {
            Slot::Word(_) => 4,
            Slot::Blob { data, nul } => 4 + padded_len(data.len() + usize::from(*nul)),
            Slot::Empty => 0,
        }
    }

    /// Writes at `offset` and returns the offset just past this slot.
    fn write(&self, order: ByteOrder, buf: &mut [u8], offset: usize) -> usize {
        match self {
            Slot::Word(word) => {
                buf[offset..offset + 4].copy_from_slice(&order.u32_bytes(*word));
            }
            Slot::Blob { data, nul } => {
                // Length was range-checked while planning.
                let declared = (data.len() + usize::from(*nul)) as u32;
                buf[offset..offset + 4].copy_from_slice(&order.u32_bytes(declared));
                let start = offset + 4;
                buf[start..start + data.len()].copy_from_slice(data);
            }
            Slot::Empty => {}
        }
        offset + self.encoded_len()
    }
}

/// Extracts a non-negative 32-bit value from any integer-bearing variant.
fn unsigned(value: &Arg, def: &ArgumentDefinition) -> Result<u32, ProtocolError> {
    match value {
        Arg::Uint(v) | Arg::Object(v) | Arg::NewId(v) => Ok(*v),
        Arg::Int(v) => u32::try_from(*v).map_err(|_| invalid_value(def, "negative")),
        Arg::Fixed(v) => {
            if v.is_nan() {
                Err(invalid_value(def, "NaN"))
            } else if v.fract() != 0.0 {
                Err(invalid_value(def, "not an integer"))
            } else if *v < 0.0 {
                Err(invalid_value(def, "negative"))
            } else if *v > f64::from(u32::MAX) {
                Err(invalid_value(def, "out of 32-bit range"))
            } else {
                Ok(*v as u32)
            }
        }
        other => Err(invalid_type(def, other)),
    }
}

/// Extracts a signed 32-bit value.
fn signed(value: &Arg, def: &ArgumentDefinition) -> Result<i32, ProtocolError> {
    match value {
        Arg::Int(v) => Ok(*v),
        Arg::Uint(v) => i32::try_from(*v).map_err(|_| invalid_value(def, "out of 32-bit range")),
        Arg::Fixed(v) => {
            if v.is_nan() {
                Err(invalid_value(def, "NaN"))
            } else if v.fract() != 0.0 {
                Err(invalid_value(def, "not an integer"))
            } else if *v < f64::from(i32::MIN) || *v > f64::from(i32::MAX) {
                Err(invalid_value(def, "out of 32-bit range"))
            } else {
                Ok(*v as i32)
            }
        }
        other => Err(invalid_type(def, other)),
    }
}

fn invalid_type(def: &ArgumentDefinition, found: &Arg) -> ProtocolError {
    ProtocolError::InvalidType {
        name: def.name.clone(),
        expected: def.ty.to_string(),
        found: found.kind(),
    }
}

fn invalid_value(def: &ArgumentDefinition, reason: &str) -> ProtocolError {
    ProtocolError::InvalidValue {
        name: def.name.clone(),
        ty: def.ty.to_string(),
        reason: reason.to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
    order: ByteOrder,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        let end = self.offset.checked_add(len).filter(|end| *end <= self.bytes.len());
        let Some(end) = end else {
            return Err(ProtocolError::Truncated {
                offset: self.offset,
                needed: len,
                available: self.bytes.len(),
            });
        };
        let bytes = self.bytes;
        let slice = &bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn word(&mut self) -> Result<u32, ProtocolError> {
        let order = self.order;
        let bytes = self.take(4)?;
        Ok(order.u32_from([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a length word and the padded bytes after it; returns the
    /// unpadded content.
    fn blob(&mut self) -> Result<&'a [u8], ProtocolError> {
        let len = self.word()? as usize;
        let padded = self.take(padded_len(len))?;
        Ok(&padded[..len])
    }

    fn read_arg(&mut self, def: &ArgumentDefinition) -> Result<Arg, ProtocolError> {
        let arg = match &def.ty {
            ArgType::Uint | ArgType::Enum => Arg::Uint(self.word()?),
            ArgType::Object => Arg::Object(self.word()?),
            ArgType::NewId => Arg::NewId(self.word()?),
            ArgType::Int => Arg::Int(self.word()? as i32),
            ArgType::Fixed => Arg::Fixed(word_to_fixed(self.word()?)),
            ArgType::String => {
                let raw = self.blob()?;
                let end = raw.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
                let text = std::str::from_utf8(&raw[..end]).map_err(|_| {
                    ProtocolError::InvalidUtf8 {
                        name: def.name.clone(),
                    }
                })?;
                Arg::Str(text.to_owned())
            }
            ArgType::Array => Arg::Array(self.blob()?.to_vec()),
            ArgType::Fd => Arg::Fd(None),
            ArgType::Other(name) => return Err(ProtocolError::UnsupportedType(name.clone())),
        };
        Ok(arg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LE: ByteOrder = ByteOrder::Little;

    fn def(ty: &str) -> ArgumentDefinition {
        ArgumentDefinition::new("arg", ty)
    }

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn test_fixed_known_pairs() {
        assert_eq!(fixed_to_word(1.0), Some(0x0000_0100));
        assert_eq!(fixed_to_word(-1.0), Some(0x8000_0100));
        assert_eq!(fixed_to_word(1.5), Some(0x0000_0180));
        assert_eq!(word_to_fixed(0x0000_0100), 1.0);
        assert_eq!(word_to_fixed(0x8000_0100), -1.0);
        assert_eq!(word_to_fixed(0x0000_0180), 1.5);
    }

    #[test]
    fn test_fixed_to_word_half_steps_round_up() {
        assert_eq!(fixed_to_word(1.5 / 256.0), Some(0x0000_0002));
        assert_eq!(fixed_to_word(-1.5 / 256.0), Some(0x8000_0001));
        assert_eq!(fixed_to_word(-0.5 / 256.0), Some(0));
        assert_eq!(fixed_to_word(-2.5 / 256.0), Some(0x8000_0002));
    }

    #[test]
    fn test_fixed_round_trip_through_codec() {
        let defs = [def("fixed"), def("fixed"), def("fixed")];
        let values = [Arg::Fixed(1.0), Arg::Fixed(-1.0), Arg::Fixed(1.5)];
        let bytes = format_args_with(LE, &values, &defs).unwrap();
        assert_eq!(hex(&bytes), "000100000001008080010000");
        assert_eq!(get_args_with(LE, &bytes, &defs).unwrap(), values);
    }

    #[test]
    fn test_fixed_rejects_nan() {
        let err = format_args(&[Arg::Fixed(f64::NAN)], &[def("fixed")]).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidValue { .. }));
    }

    #[test]
    fn test_format_args_wrong_count_reports_both_counts() {
        let err = format_args(&[Arg::Uint(1)], &[def("string"), def("array")]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidArity {
                given: 1,
                expected: 2
            }
        ));
        assert_eq!(err.to_string(), "bad number of arguments (1, expected 2)");
    }

    #[test]
    fn test_format_args_string_lengths_are_padded() {
        let he = format_args(&[Arg::from("he")], &[def("string")]).unwrap();
        let hello = format_args(&[Arg::from("hello")], &[def("string")]).unwrap();
        assert_eq!(he.len(), 8);
        assert_eq!(hello.len(), 12);
    }

    #[test]
    fn test_format_args_string_counts_terminator() {
        let bytes = format_args_with(LE, &[Arg::from("he")], &[def("string")]).unwrap();
        assert_eq!(hex(&bytes), "0300000068650000");
    }

    #[test]
    fn test_format_args_array_exact_bytes() {
        let bytes = format_args_with(LE, &[Arg::Array(vec![5, 4, 3])], &[def("array")]).unwrap();
        assert_eq!(hex(&bytes), "0300000005040300");
    }

    #[test]
    fn test_format_args_type_error_before_any_output() {
        let defs = [def("uint"), def("uint")];
        let err = format_args(&[Arg::Uint(1), Arg::from("nope")], &defs).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidType { found: "string", .. }));
    }

    #[test]
    fn test_format_args_negative_uint_rejected() {
        let err = format_args(&[Arg::Int(-3)], &[def("uint")]).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidValue { .. }));
    }

    #[test]
    fn test_format_args_fractional_uint_rejected() {
        let err = format_args(&[Arg::Fixed(2.5)], &[def("enum")]).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidValue { .. }));
        // Integral floats are fine.
        assert!(format_args(&[Arg::Fixed(2.0)], &[def("enum")]).is_ok());
    }

    #[test]
    fn test_format_args_object_zero_rejected_unless_nullable() {
        let err = format_args(&[Arg::Object(0)], &[def("object")]).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidValue { .. }));

        let mut nullable = def("object");
        nullable.allow_null = true;
        assert_eq!(format_args_with(LE, &[Arg::Object(0)], &[nullable]).unwrap(), [0; 4]);
    }

    #[test]
    fn test_format_args_object_raw_and_handle_encode_alike() {
        let raw = format_args(&[Arg::Uint(7)], &[def("object")]).unwrap();
        let handle = format_args(&[Arg::object(&crate::ObjectId(7))], &[def("object")]).unwrap();
        assert_eq!(raw, handle);
    }

    #[test]
    fn test_format_args_interior_nul_rejected() {
        let err = format_args(&[Arg::from("a\0b")], &[def("string")]).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidValue { .. }));
    }

    #[test]
    fn test_fd_takes_no_bytes_either_way() {
        let defs = [def("uint"), def("fd"), def("uint")];
        let bytes = format_args_with(LE, &[Arg::Uint(1), Arg::Fd(Some(4)), Arg::Uint(2)], &defs)
            .unwrap();
        assert_eq!(bytes.len(), 8);

        let args = get_args_with(LE, &bytes, &defs).unwrap();
        assert_eq!(args, [Arg::Uint(1), Arg::Fd(None), Arg::Uint(2)]);
    }

    #[test]
    fn test_unsupported_type_fails_both_directions() {
        let err = format_args(&[Arg::Uint(1)], &[def("quaternion")]).unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedType(ref t) if t == "quaternion"));
        let err = get_args(&[0; 4], &[def("quaternion")]).unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedType(_)));
    }

    #[test]
    fn test_get_args_mixed_payload() {
        let defs = [def("int"), def("string"), def("array"), def("new_id")];
        let values = [
            Arg::Int(-5),
            Arg::from("hello"),
            Arg::Array(vec![1, 2, 3, 4, 5]),
            Arg::NewId(9),
        ];
        let bytes = format_args(&values, &defs).unwrap();
        assert_eq!(bytes.len(), 4 + 12 + 12 + 4);
        assert_eq!(get_args(&bytes, &defs).unwrap(), values);
    }

    #[test]
    fn test_get_args_zero_length_string_is_empty() {
        let args = get_args_with(LE, &[0, 0, 0, 0], &[def("string")]).unwrap();
        assert_eq!(args, [Arg::from("")]);
    }

    #[test]
    fn test_get_args_truncated_returns_error() {
        let err = get_args_with(LE, &[9, 0, 0, 0, b'a'], &[def("string")]).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated { offset: 4, .. }));

        let err = get_args(&[1, 2], &[def("uint")]).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated { .. }));
    }

    #[test]
    fn test_get_args_invalid_utf8_rejected() {
        let bytes = [2, 0, 0, 0, 0xff, 0, 0, 0];
        let err = get_args_with(LE, &bytes, &[def("string")]).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidUtf8 { .. }));
    }

    #[test]
    fn test_big_endian_words() {
        let bytes = format_args_with(ByteOrder::Big, &[Arg::Uint(1)], &[def("uint")]).unwrap();
        assert_eq!(bytes, [0, 0, 0, 1]);
    }
}
