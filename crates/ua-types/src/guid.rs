//! GUID values
//!
//! Wire layout is 16 bytes with mixed endianness:
//!
//! ```text
//! Offset | Size | Field | Byte order
//! -------|------|-------|-----------
//! 0x00   | 4    | Data1 | little endian
//! 0x04   | 2    | Data2 | little endian
//! 0x06   | 2    | Data3 | little endian
//! 0x08   | 8    | Data4 | as-is (big endian in text form)
//! ```

use crate::encoding::{BinaryDecode, BinaryEncode, EncodingError, EncodingResult};
use bytes::{Buf, BufMut};

/// A 16-byte globally unique identifier.
///
/// The canonical text form is lower-case `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Guid {
    data1: u32,
    data2: u16,
    data3: u16,
    data4: [u8; 8],
}

impl Guid {
    /// The all-zero GUID.
    pub const NULL: Guid = Guid {
        data1: 0,
        data2: 0,
        data3: 0,
        data4: [0; 8],
    };

    /// Build a GUID from its four components.
    pub fn from_fields(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }

    /// Build a GUID from 16 raw bytes in wire order.
    pub fn from_wire_bytes(bytes: [u8; 16]) -> Self {
        let mut stream = bytes.as_slice();
        // Infallible: exactly 16 bytes.
        Self::decode(&mut stream).expect("16 bytes always decode as a guid")
    }

    /// `true` if every byte is zero.
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    /// Parse the canonical `8-4-4-4-12` text form, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split('-').collect();
        let [p1, p2, p3, p4, p5] = parts.as_slice() else {
            return None;
        };
        if p1.len() != 8 || p2.len() != 4 || p3.len() != 4 || p4.len() != 4 || p5.len() != 12 {
            return None;
        }

        let data1 = u32::from_str_radix(p1, 16).ok()?;
        let data2 = u16::from_str_radix(p2, 16).ok()?;
        let data3 = u16::from_str_radix(p3, 16).ok()?;

        let mut data4 = [0u8; 8];
        for (i, chunk) in [*p4, *p5].concat().as_bytes().chunks(2).enumerate() {
            let s = std::str::from_utf8(chunk).ok()?;
            data4[i] = u8::from_str_radix(s, 16).ok()?;
        }

        Some(Self {
            data1,
            data2,
            data3,
            data4,
        })
    }
}

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7],
        )
    }
}

impl BinaryEncode for Guid {
    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32_le(self.data1);
        out.put_u16_le(self.data2);
        out.put_u16_le(self.data3);
        out.put_slice(&self.data4);
    }
}

impl BinaryDecode for Guid {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        if stream.len() < 16 {
            return Err(EncodingError::Truncated {
                needed: 16,
                remaining: stream.len(),
            });
        }
        let data1 = stream.get_u32_le();
        let data2 = stream.get_u16_le();
        let data3 = stream.get_u16_le();
        let mut data4 = [0u8; 8];
        stream.copy_to_slice(&mut data4);
        Ok(Self {
            data1,
            data2,
            data3,
            data4,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_wire_layout() {
        // 72962B91-FA75-4AE6-8D28-B404DC7DAF63
        let guid = Guid::parse("72962B91-FA75-4AE6-8D28-B404DC7DAF63").unwrap();

        let mut out = Vec::new();
        guid.encode(&mut out);
        assert_eq!(
            out,
            hex::decode("912b967275fae64a8d28b404dc7daf63").unwrap()
        );

        let mut stream = out.as_slice();
        let decoded = Guid::decode(&mut stream).unwrap();
        assert_eq!(decoded, guid);
        assert_eq!(decoded.to_string(), "72962b91-fa75-4ae6-8d28-b404dc7daf63");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(Guid::parse("").is_none());
        assert!(Guid::parse("72962B91FA754AE68D28B404DC7DAF63").is_none());
        assert!(Guid::parse("72962B91-FA75-4AE6-8D28").is_none());
        assert!(Guid::parse("zz962B91-FA75-4AE6-8D28-B404DC7DAF63").is_none());
    }

    #[test]
    fn null_guid() {
        assert!(Guid::NULL.is_null());
        assert_eq!(
            Guid::NULL.to_string(),
            "00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn truncated_decode_fails() {
        let data = [0u8; 15];
        let mut stream = data.as_slice();
        assert!(matches!(
            Guid::decode(&mut stream),
            Err(EncodingError::Truncated { .. })
        ));
    }
}
