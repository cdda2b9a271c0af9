//! OPC UA binary encoding primitives
//!
//! Every value on the wire is little-endian. Strings and byte strings carry a
//! signed i32 length prefix:
//!
//! ```text
//! ┌──────────────┬──────────────────────────┐
//! │ length (i32) │ bytes                    │
//! ├──────────────┼──────────────────────────┤
//! │ -1           │ null (decodes as empty)  │
//! │ 0            │ empty                    │
//! │ N > 0        │ N raw bytes              │
//! └──────────────┴──────────────────────────┘
//! ```
//!
//! Arrays use the same signed prefix. A decoder that reads the length as u32
//! desynchronises on the next field, so all array reads in this crate go
//! through [`read_array`] or [`read_i32_length`].

use bytes::{Buf, BufMut};

/// Upper bound on a single decoded array, applied before allocation.
pub const MAX_ARRAY_LENGTH: usize = 0x10_0000;

/// Upper bound on nesting while decoding recursive values
/// (Variant, DataValue, DiagnosticInfo).
pub const MAX_DECODE_DEPTH: u8 = 64;

/// Decode failure kinds.
///
/// Encoding never fails: values that cannot be represented are programmer
/// errors and are caught by debug assertions at the call site.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    /// The buffer ended before the value did.
    #[error("truncated buffer: need {needed} more bytes, have {remaining}")]
    Truncated { needed: usize, remaining: usize },

    /// A declared length disagrees with the bytes actually present.
    #[error("length mismatch: declared {declared} bytes, {actual} available")]
    LengthMismatch { declared: usize, actual: usize },

    /// An encoding byte carries bits or a discriminant that no form defines.
    #[error("invalid {what} encoding byte 0x{value:02x}")]
    InvalidEncodingByte { what: &'static str, value: u8 },

    /// An enumerated field holds a value outside its defined range.
    #[error("{name} out of range: {value}")]
    EnumOutOfRange { name: &'static str, value: i64 },

    /// A string field is not valid UTF-8.
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    /// An array length exceeds [`MAX_ARRAY_LENGTH`].
    #[error("array length {length} exceeds limit {limit}")]
    ArrayTooLong { length: usize, limit: usize },

    /// Recursive decode exceeded [`MAX_DECODE_DEPTH`].
    #[error("maximum decode depth exceeded")]
    DepthExceeded,

    /// A late-bound decode hit a data type with no cached definition.
    #[error("no structure definition for data type {type_id}")]
    UnknownTypeId { type_id: String },
}

/// Result alias for decode operations.
pub type EncodingResult<T> = Result<T, EncodingError>;

/// A value that can be written to the OPC UA binary stream.
pub trait BinaryEncode {
    /// Append the binary form of `self` to `out`.
    fn encode(&self, out: &mut Vec<u8>);
}

/// A value that can be read from the OPC UA binary stream.
///
/// Decoders consume exactly the bytes of the value and never read past the
/// end of the buffer they were given.
pub trait BinaryDecode: Sized {
    /// Read one value, advancing `stream` past it.
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self>;
}

fn ensure(stream: &&[u8], needed: usize) -> EncodingResult<()> {
    let remaining = stream.len();
    if remaining < needed {
        Err(EncodingError::Truncated { needed, remaining })
    } else {
        Ok(())
    }
}

macro_rules! primitive_codec {
    ($ty:ty, $size:expr, $put:ident, $get:ident) => {
        impl BinaryEncode for $ty {
            fn encode(&self, out: &mut Vec<u8>) {
                out.$put(*self);
            }
        }

        impl BinaryDecode for $ty {
            fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
                ensure(stream, $size)?;
                Ok(stream.$get())
            }
        }
    };
}

primitive_codec!(i8, 1, put_i8, get_i8);
primitive_codec!(u8, 1, put_u8, get_u8);
primitive_codec!(i16, 2, put_i16_le, get_i16_le);
primitive_codec!(u16, 2, put_u16_le, get_u16_le);
primitive_codec!(i32, 4, put_i32_le, get_i32_le);
primitive_codec!(u32, 4, put_u32_le, get_u32_le);
primitive_codec!(i64, 8, put_i64_le, get_i64_le);
primitive_codec!(u64, 8, put_u64_le, get_u64_le);
primitive_codec!(f32, 4, put_f32_le, get_f32_le);
primitive_codec!(f64, 8, put_f64_le, get_f64_le);

impl BinaryEncode for bool {
    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u8(if *self { 1 } else { 0 });
    }
}

impl BinaryDecode for bool {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        ensure(stream, 1)?;
        Ok(stream.get_u8() != 0)
    }
}

/// Strings are encoded as a signed length prefix plus UTF-8 bytes, no NUL
/// terminator. The empty string is written with length 0; a null string on
/// the wire (-1) decodes as empty.
impl BinaryEncode for String {
    fn encode(&self, out: &mut Vec<u8>) {
        write_string(out, self);
    }
}

impl BinaryDecode for String {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        read_string(stream)
    }
}

/// Write a string with its i32 length prefix.
pub fn write_string(out: &mut Vec<u8>, s: &str) {
    debug_assert!(s.len() <= i32::MAX as usize);
    out.put_i32_le(s.len() as i32);
    out.put_slice(s.as_bytes());
}

/// Read a length-prefixed UTF-8 string. Null (-1) decodes as empty.
pub fn read_string(stream: &mut &[u8]) -> EncodingResult<String> {
    match read_i32_length(stream)? {
        None | Some(0) => Ok(String::new()),
        Some(len) => {
            ensure(stream, len)?;
            let bytes = &stream[..len];
            let s = std::str::from_utf8(bytes)
                .map_err(|_| EncodingError::InvalidUtf8)?
                .to_owned();
            stream.advance(len);
            Ok(s)
        }
    }
}

/// Write a byte string. Empty byte strings are written as null (-1), which
/// is the conventional form for absent certificates, nonces and continuation
/// points.
pub fn write_byte_string(out: &mut Vec<u8>, bytes: &[u8]) {
    if bytes.is_empty() {
        out.put_i32_le(-1);
    } else {
        debug_assert!(bytes.len() <= i32::MAX as usize);
        out.put_i32_le(bytes.len() as i32);
        out.put_slice(bytes);
    }
}

/// Read a length-prefixed byte string. Null (-1) decodes as empty.
pub fn read_byte_string(stream: &mut &[u8]) -> EncodingResult<Vec<u8>> {
    match read_i32_length(stream)? {
        None | Some(0) => Ok(Vec::new()),
        Some(len) => {
            ensure(stream, len)?;
            let bytes = stream[..len].to_vec();
            stream.advance(len);
            Ok(bytes)
        }
    }
}

/// Read a signed i32 length prefix.
///
/// Returns `None` for any negative length (null collection on the wire).
/// This is the single point where the -1 sentinel is interpreted; nothing
/// in this crate reads a length as u32.
pub fn read_i32_length(stream: &mut &[u8]) -> EncodingResult<Option<usize>> {
    ensure(stream, 4)?;
    let len = stream.get_i32_le();
    if len < 0 {
        Ok(None)
    } else {
        let len = len as usize;
        if len > MAX_ARRAY_LENGTH {
            return Err(EncodingError::ArrayTooLong {
                length: len,
                limit: MAX_ARRAY_LENGTH,
            });
        }
        Ok(Some(len))
    }
}

/// Write an array with its i32 length prefix. Empty arrays are written with
/// length 0.
pub fn write_array<T: BinaryEncode>(out: &mut Vec<u8>, items: &[T]) {
    debug_assert!(items.len() <= i32::MAX as usize);
    out.put_i32_le(items.len() as i32);
    for item in items {
        item.encode(out);
    }
}

/// Read an array. Null (-1) and zero-length both decode as the empty vector.
pub fn read_array<T: BinaryDecode>(stream: &mut &[u8]) -> EncodingResult<Vec<T>> {
    let Some(len) = read_i32_length(stream)? else {
        return Ok(Vec::new());
    };
    // Pre-allocation is clamped to the bytes actually remaining so a bogus
    // length cannot force a huge allocation before the first element fails.
    let mut items = Vec::with_capacity(len.min(stream.len()));
    for _ in 0..len {
        items.push(T::decode(stream)?);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_roundtrip() {
        let mut out = Vec::new();
        true.encode(&mut out);
        (-7i8).encode(&mut out);
        0xABu8.encode(&mut out);
        (-300i16).encode(&mut out);
        40000u16.encode(&mut out);
        (-70000i32).encode(&mut out);
        3_000_000_000u32.encode(&mut out);
        i64::MIN.encode(&mut out);
        u64::MAX.encode(&mut out);
        1.5f32.encode(&mut out);
        (-2.25f64).encode(&mut out);

        let mut stream = out.as_slice();
        assert!(bool::decode(&mut stream).unwrap());
        assert_eq!(i8::decode(&mut stream).unwrap(), -7);
        assert_eq!(u8::decode(&mut stream).unwrap(), 0xAB);
        assert_eq!(i16::decode(&mut stream).unwrap(), -300);
        assert_eq!(u16::decode(&mut stream).unwrap(), 40000);
        assert_eq!(i32::decode(&mut stream).unwrap(), -70000);
        assert_eq!(u32::decode(&mut stream).unwrap(), 3_000_000_000);
        assert_eq!(i64::decode(&mut stream).unwrap(), i64::MIN);
        assert_eq!(u64::decode(&mut stream).unwrap(), u64::MAX);
        assert_eq!(f32::decode(&mut stream).unwrap(), 1.5);
        assert_eq!(f64::decode(&mut stream).unwrap(), -2.25);
        assert!(stream.is_empty());
    }

    #[test]
    fn integers_are_little_endian() {
        let mut out = Vec::new();
        0x12345678u32.encode(&mut out);
        assert_eq!(out, [0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn string_roundtrip() {
        let mut out = Vec::new();
        write_string(&mut out, "opc.tcp");
        assert_eq!(&out[..4], &7i32.to_le_bytes());

        let mut stream = out.as_slice();
        assert_eq!(read_string(&mut stream).unwrap(), "opc.tcp");
        assert!(stream.is_empty());
    }

    #[test]
    fn null_string_decodes_as_empty() {
        let data = (-1i32).to_le_bytes();
        let mut stream = data.as_slice();
        assert_eq!(read_string(&mut stream).unwrap(), "");
        assert!(stream.is_empty());
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let mut data = 2i32.to_le_bytes().to_vec();
        data.extend_from_slice(&[0xFF, 0xFE]);
        let mut stream = data.as_slice();
        assert_eq!(
            read_string(&mut stream).unwrap_err(),
            EncodingError::InvalidUtf8
        );
    }

    #[test]
    fn byte_string_null_and_empty_agree() {
        let null = (-1i32).to_le_bytes();
        let mut stream = null.as_slice();
        assert_eq!(read_byte_string(&mut stream).unwrap(), Vec::<u8>::new());

        let empty = 0i32.to_le_bytes();
        let mut stream = empty.as_slice();
        assert_eq!(read_byte_string(&mut stream).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn empty_byte_string_written_as_null() {
        let mut out = Vec::new();
        write_byte_string(&mut out, &[]);
        assert_eq!(out, (-1i32).to_le_bytes());
    }

    #[test]
    fn array_null_law() {
        // -1 never turns into 4294967295 elements.
        let data = (-1i32).to_le_bytes();
        let mut stream = data.as_slice();
        let items: Vec<u32> = read_array(&mut stream).unwrap();
        assert!(items.is_empty());
        assert!(stream.is_empty());
    }

    #[test]
    fn array_roundtrip() {
        let values = vec![1u32, 2, 3, 0xFFFF_FFFF];
        let mut out = Vec::new();
        write_array(&mut out, &values);

        let mut stream = out.as_slice();
        let decoded: Vec<u32> = read_array(&mut stream).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn truncated_array_fails() {
        let mut out = Vec::new();
        write_array(&mut out, &[1u32, 2, 3]);
        out.truncate(out.len() - 2);

        let mut stream = out.as_slice();
        let result: EncodingResult<Vec<u32>> = read_array(&mut stream);
        assert!(matches!(result, Err(EncodingError::Truncated { .. })));
    }

    #[test]
    fn oversized_array_length_rejected() {
        let data = ((MAX_ARRAY_LENGTH as i32) + 1).to_le_bytes();
        let mut stream = data.as_slice();
        let result: EncodingResult<Vec<u8>> = read_array(&mut stream);
        assert!(matches!(result, Err(EncodingError::ArrayTooLong { .. })));
    }

    #[test]
    fn decode_does_not_read_past_value() {
        let mut out = Vec::new();
        write_string(&mut out, "ab");
        out.extend_from_slice(&[0xAA, 0xBB]);

        let mut stream = out.as_slice();
        assert_eq!(read_string(&mut stream).unwrap(), "ab");
        assert_eq!(stream, &[0xAA, 0xBB]);
    }
}
