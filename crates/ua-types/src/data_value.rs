//! Data values
//!
//! A DataValue couples a variant with quality and timing. A presence byte
//! selects which fields follow:
//!
//! ```text
//! Bit  | Field
//! -----|---------------------------
//! 0x01 | value (Variant)
//! 0x02 | status code
//! 0x04 | source timestamp
//! 0x08 | server timestamp
//! 0x10 | source picoseconds
//! 0x20 | server picoseconds
//! ```
//!
//! Picosecond fields refine their timestamp in 10-picosecond units and are
//! bounded by 9999.

use crate::date_time::UaDateTime;
use crate::encoding::{
    BinaryDecode, BinaryEncode, EncodingError, EncodingResult, MAX_DECODE_DEPTH,
};
use crate::status_code::StatusCode;
use crate::variant::Variant;
use bytes::BufMut;

const HAS_VALUE: u8 = 0x01;
const HAS_STATUS: u8 = 0x02;
const HAS_SOURCE_TIMESTAMP: u8 = 0x04;
const HAS_SERVER_TIMESTAMP: u8 = 0x08;
const HAS_SOURCE_PICOSECONDS: u8 = 0x10;
const HAS_SERVER_PICOSECONDS: u8 = 0x20;

/// A value with quality and timestamps, as stored in the address space.
///
/// An absent status code means Good.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataValue {
    pub value: Option<Variant>,
    pub status: Option<StatusCode>,
    pub source_timestamp: Option<UaDateTime>,
    pub source_picoseconds: Option<u16>,
    pub server_timestamp: Option<UaDateTime>,
    pub server_picoseconds: Option<u16>,
}

impl DataValue {
    /// A good value with no timestamps.
    pub fn new(value: Variant) -> Self {
        Self {
            value: Some(value),
            ..Default::default()
        }
    }

    /// The effective status; absent means Good.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::GOOD)
    }

    pub fn is_good(&self) -> bool {
        self.status().is_good()
    }

    pub(crate) fn decode_depth(stream: &mut &[u8], depth: u8) -> EncodingResult<Self> {
        if depth >= MAX_DECODE_DEPTH {
            return Err(EncodingError::DepthExceeded);
        }
        let mask = u8::decode(stream)?;
        if mask & 0xC0 != 0 {
            return Err(EncodingError::InvalidEncodingByte {
                what: "data value",
                value: mask,
            });
        }

        let mut dv = DataValue::default();
        if mask & HAS_VALUE != 0 {
            dv.value = Some(Variant::decode_depth(stream, depth + 1)?);
        }
        if mask & HAS_STATUS != 0 {
            dv.status = Some(StatusCode::decode(stream)?);
        }
        if mask & HAS_SOURCE_TIMESTAMP != 0 {
            dv.source_timestamp = Some(UaDateTime::decode(stream)?);
        }
        if mask & HAS_SOURCE_PICOSECONDS != 0 {
            dv.source_picoseconds = Some(u16::decode(stream)?);
        }
        if mask & HAS_SERVER_TIMESTAMP != 0 {
            dv.server_timestamp = Some(UaDateTime::decode(stream)?);
        }
        if mask & HAS_SERVER_PICOSECONDS != 0 {
            dv.server_picoseconds = Some(u16::decode(stream)?);
        }
        Ok(dv)
    }
}

impl BinaryEncode for DataValue {
    fn encode(&self, out: &mut Vec<u8>) {
        debug_assert!(self.source_picoseconds.unwrap_or(0) <= 9999);
        debug_assert!(self.server_picoseconds.unwrap_or(0) <= 9999);

        let mut mask = 0;
        if self.value.is_some() {
            mask |= HAS_VALUE;
        }
        if self.status.is_some() {
            mask |= HAS_STATUS;
        }
        if self.source_timestamp.is_some() {
            mask |= HAS_SOURCE_TIMESTAMP;
        }
        if self.source_picoseconds.is_some() {
            mask |= HAS_SOURCE_PICOSECONDS;
        }
        if self.server_timestamp.is_some() {
            mask |= HAS_SERVER_TIMESTAMP;
        }
        if self.server_picoseconds.is_some() {
            mask |= HAS_SERVER_PICOSECONDS;
        }
        out.put_u8(mask);

        if let Some(value) = &self.value {
            value.encode(out);
        }
        if let Some(status) = self.status {
            status.encode(out);
        }
        if let Some(ts) = self.source_timestamp {
            ts.encode(out);
        }
        if let Some(ps) = self.source_picoseconds {
            ps.encode(out);
        }
        if let Some(ts) = self.server_timestamp {
            ts.encode(out);
        }
        if let Some(ps) = self.server_picoseconds {
            ps.encode(out);
        }
    }
}

impl BinaryDecode for DataValue {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Self::decode_depth(stream, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_data_value_is_one_byte() {
        let mut out = Vec::new();
        DataValue::default().encode(&mut out);
        assert_eq!(out, vec![0x00]);
    }

    #[test]
    fn full_roundtrip() {
        let dv = DataValue {
            value: Some(Variant::Double(21.5)),
            status: Some(StatusCode::UNCERTAIN_INITIAL_VALUE),
            source_timestamp: Some(UaDateTime(116_444_736_000_000_000)),
            source_picoseconds: Some(1234),
            server_timestamp: Some(UaDateTime(116_444_736_000_000_100)),
            server_picoseconds: Some(9999),
        };
        let mut out = Vec::new();
        dv.encode(&mut out);
        assert_eq!(out[0], 0x3F);

        let mut stream = out.as_slice();
        assert_eq!(DataValue::decode(&mut stream).unwrap(), dv);
        assert!(stream.is_empty());
    }

    #[test]
    fn absent_status_is_good() {
        let dv = DataValue::new(Variant::Boolean(true));
        assert!(dv.is_good());
        assert_eq!(dv.status(), StatusCode::GOOD);
    }

    #[test]
    fn reserved_mask_bits_rejected() {
        let data = [0x40u8];
        let mut stream = data.as_slice();
        assert!(matches!(
            DataValue::decode(&mut stream),
            Err(EncodingError::InvalidEncodingByte { .. })
        ));
    }

    #[test]
    fn partial_mask_roundtrip() {
        let dv = DataValue {
            value: Some(Variant::Int32(-1)),
            server_timestamp: Some(UaDateTime(1)),
            ..Default::default()
        };
        let mut out = Vec::new();
        dv.encode(&mut out);
        assert_eq!(out[0], HAS_VALUE | HAS_SERVER_TIMESTAMP);

        let mut stream = out.as_slice();
        assert_eq!(DataValue::decode(&mut stream).unwrap(), dv);
    }
}
