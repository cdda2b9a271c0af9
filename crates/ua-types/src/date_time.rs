//! OPC UA timestamps
//!
//! A DateTime is an i64 count of 100-nanosecond ticks since
//! 1601-01-01 00:00:00 UTC. Zero means "unspecified".

use crate::encoding::{BinaryDecode, BinaryEncode, EncodingResult};
use chrono::{DateTime, TimeZone, Utc};

/// Ticks between 1601-01-01 and 1970-01-01.
const UNIX_EPOCH_TICKS: i64 = 116_444_736_000_000_000;

/// Nanoseconds per tick.
const NANOS_PER_TICK: i64 = 100;

/// A timestamp in 100-nanosecond ticks since 1601-01-01 UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct UaDateTime(pub i64);

impl UaDateTime {
    /// The "unspecified" timestamp.
    pub const NULL: UaDateTime = UaDateTime(0);

    /// The current time.
    pub fn now() -> Self {
        Self::from_chrono(Utc::now())
    }

    /// `true` if the timestamp is unspecified.
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Raw tick count.
    pub fn ticks(&self) -> i64 {
        self.0
    }

    /// Convert from a chrono UTC timestamp, clamping to the representable
    /// range.
    pub fn from_chrono(dt: DateTime<Utc>) -> Self {
        let nanos = dt.timestamp_nanos_opt().unwrap_or(i64::MAX);
        let ticks = (nanos / NANOS_PER_TICK).saturating_add(UNIX_EPOCH_TICKS);
        Self(ticks.max(0))
    }

    /// Convert to a chrono UTC timestamp. Unspecified (zero) and values
    /// before the Unix epoch map to the Unix epoch.
    pub fn as_chrono(&self) -> DateTime<Utc> {
        let unix_ticks = self.0.saturating_sub(UNIX_EPOCH_TICKS).max(0);
        let secs = unix_ticks / 10_000_000;
        let nanos = (unix_ticks % 10_000_000) * NANOS_PER_TICK;
        Utc.timestamp_opt(secs, nanos as u32)
            .single()
            .unwrap_or_default()
    }
}

impl std::fmt::Display for UaDateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "<unspecified>")
        } else {
            write!(f, "{}", self.as_chrono().to_rfc3339())
        }
    }
}

impl BinaryEncode for UaDateTime {
    fn encode(&self, out: &mut Vec<u8>) {
        self.0.encode(out);
    }
}

impl BinaryDecode for UaDateTime {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self(i64::decode(stream)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_epoch_tick_count() {
        let epoch = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(UaDateTime::from_chrono(epoch).ticks(), UNIX_EPOCH_TICKS);
    }

    #[test]
    fn chrono_roundtrip() {
        let dt = Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 45).unwrap();
        let ua = UaDateTime::from_chrono(dt);
        assert_eq!(ua.as_chrono(), dt);
    }

    #[test]
    fn wire_roundtrip() {
        let ua = UaDateTime::now();
        let mut out = Vec::new();
        ua.encode(&mut out);
        assert_eq!(out.len(), 8);

        let mut stream = out.as_slice();
        assert_eq!(UaDateTime::decode(&mut stream).unwrap(), ua);
    }

    #[test]
    fn null_is_unspecified() {
        assert!(UaDateTime::NULL.is_null());
        assert!(!UaDateTime::now().is_null());
    }
}
