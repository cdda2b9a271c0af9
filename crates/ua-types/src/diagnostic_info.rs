//! Diagnostic information
//!
//! DiagnosticInfo is the one openly recursive structure in the protocol: the
//! inner diagnostic is boxed and decode is depth-limited.

use crate::encoding::{
    read_string, write_string, BinaryDecode, BinaryEncode, EncodingError, EncodingResult,
    MAX_DECODE_DEPTH,
};
use crate::status_code::StatusCode;
use bytes::BufMut;

const HAS_SYMBOLIC_ID: u8 = 0x01;
const HAS_NAMESPACE_URI: u8 = 0x02;
const HAS_LOCALIZED_TEXT: u8 = 0x04;
const HAS_LOCALE: u8 = 0x08;
const HAS_ADDITIONAL_INFO: u8 = 0x10;
const HAS_INNER_STATUS_CODE: u8 = 0x20;
const HAS_INNER_DIAGNOSTIC_INFO: u8 = 0x40;

/// Vendor-specific diagnostics attached to a response or operation result.
///
/// The symbolic id, namespace URI, locale and localized text fields are
/// indexes into the response header's string table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiagnosticInfo {
    pub symbolic_id: Option<i32>,
    pub namespace_uri: Option<i32>,
    pub localized_text: Option<i32>,
    pub locale: Option<i32>,
    pub additional_info: Option<String>,
    pub inner_status_code: Option<StatusCode>,
    pub inner_diagnostic_info: Option<Box<DiagnosticInfo>>,
}

impl DiagnosticInfo {
    pub fn is_null(&self) -> bool {
        *self == Self::default()
    }

    fn decode_depth(stream: &mut &[u8], depth: u8) -> EncodingResult<Self> {
        if depth >= MAX_DECODE_DEPTH {
            return Err(EncodingError::DepthExceeded);
        }
        let mask = u8::decode(stream)?;
        if mask & 0x80 != 0 {
            return Err(EncodingError::InvalidEncodingByte {
                what: "diagnostic info",
                value: mask,
            });
        }

        let mut info = DiagnosticInfo::default();
        if mask & HAS_SYMBOLIC_ID != 0 {
            info.symbolic_id = Some(i32::decode(stream)?);
        }
        if mask & HAS_NAMESPACE_URI != 0 {
            info.namespace_uri = Some(i32::decode(stream)?);
        }
        if mask & HAS_LOCALE != 0 {
            info.locale = Some(i32::decode(stream)?);
        }
        if mask & HAS_LOCALIZED_TEXT != 0 {
            info.localized_text = Some(i32::decode(stream)?);
        }
        if mask & HAS_ADDITIONAL_INFO != 0 {
            info.additional_info = Some(read_string(stream)?);
        }
        if mask & HAS_INNER_STATUS_CODE != 0 {
            info.inner_status_code = Some(StatusCode::decode(stream)?);
        }
        if mask & HAS_INNER_DIAGNOSTIC_INFO != 0 {
            info.inner_diagnostic_info =
                Some(Box::new(Self::decode_depth(stream, depth + 1)?));
        }
        Ok(info)
    }
}

impl BinaryEncode for DiagnosticInfo {
    fn encode(&self, out: &mut Vec<u8>) {
        let mut mask = 0;
        if self.symbolic_id.is_some() {
            mask |= HAS_SYMBOLIC_ID;
        }
        if self.namespace_uri.is_some() {
            mask |= HAS_NAMESPACE_URI;
        }
        if self.locale.is_some() {
            mask |= HAS_LOCALE;
        }
        if self.localized_text.is_some() {
            mask |= HAS_LOCALIZED_TEXT;
        }
        if self.additional_info.is_some() {
            mask |= HAS_ADDITIONAL_INFO;
        }
        if self.inner_status_code.is_some() {
            mask |= HAS_INNER_STATUS_CODE;
        }
        if self.inner_diagnostic_info.is_some() {
            mask |= HAS_INNER_DIAGNOSTIC_INFO;
        }
        out.put_u8(mask);

        if let Some(v) = self.symbolic_id {
            v.encode(out);
        }
        if let Some(v) = self.namespace_uri {
            v.encode(out);
        }
        if let Some(v) = self.locale {
            v.encode(out);
        }
        if let Some(v) = self.localized_text {
            v.encode(out);
        }
        if let Some(v) = &self.additional_info {
            write_string(out, v);
        }
        if let Some(v) = self.inner_status_code {
            v.encode(out);
        }
        if let Some(v) = &self.inner_diagnostic_info {
            v.encode(out);
        }
    }
}

impl BinaryDecode for DiagnosticInfo {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Self::decode_depth(stream, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_diagnostic_is_one_byte() {
        let mut out = Vec::new();
        DiagnosticInfo::default().encode(&mut out);
        assert_eq!(out, vec![0x00]);
    }

    #[test]
    fn nested_roundtrip() {
        let info = DiagnosticInfo {
            symbolic_id: Some(4),
            additional_info: Some("cable unplugged".into()),
            inner_status_code: Some(StatusCode::BAD_NO_COMMUNICATION),
            inner_diagnostic_info: Some(Box::new(DiagnosticInfo {
                locale: Some(0),
                localized_text: Some(1),
                ..Default::default()
            })),
            ..Default::default()
        };

        let mut out = Vec::new();
        info.encode(&mut out);

        let mut stream = out.as_slice();
        assert_eq!(DiagnosticInfo::decode(&mut stream).unwrap(), info);
        assert!(stream.is_empty());
    }

    #[test]
    fn runaway_nesting_is_bounded() {
        // A chain of inner-diagnostic masks with no terminator.
        let data = vec![HAS_INNER_DIAGNOSTIC_INFO; 200];
        let mut stream = data.as_slice();
        assert_eq!(
            DiagnosticInfo::decode(&mut stream).unwrap_err(),
            EncodingError::DepthExceeded
        );
    }

    #[test]
    fn reserved_bit_rejected() {
        let data = [0x80u8];
        let mut stream = data.as_slice();
        assert!(matches!(
            DiagnosticInfo::decode(&mut stream),
            Err(EncodingError::InvalidEncodingByte { .. })
        ));
    }
}
