//! SecureChannel service messages
//!
//! OpenSecureChannel travels in OPN chunks under asymmetric security;
//! CloseSecureChannel in a CLO chunk and is never answered.

use crate::encoding::{
    read_byte_string, write_byte_string, BinaryDecode, BinaryEncode, EncodingError,
    EncodingResult,
};
use crate::ids::object_ids;
use crate::service::{
    MessageBody, RequestHeader, ResponseHeader, ServiceRequest, ServiceResponse,
};
use crate::date_time::UaDateTime;
use bytes::BufMut;

/// How message payloads on the channel are protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum MessageSecurityMode {
    Invalid = 0,
    #[default]
    None = 1,
    Sign = 2,
    SignAndEncrypt = 3,
}

impl MessageSecurityMode {
    pub fn from_u32(value: u32) -> EncodingResult<Self> {
        Ok(match value {
            0 => Self::Invalid,
            1 => Self::None,
            2 => Self::Sign,
            3 => Self::SignAndEncrypt,
            _ => {
                return Err(EncodingError::EnumOutOfRange {
                    name: "message security mode",
                    value: value as i64,
                });
            }
        })
    }
}

impl BinaryEncode for MessageSecurityMode {
    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32_le(*self as u32);
    }
}

impl BinaryDecode for MessageSecurityMode {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Self::from_u32(u32::decode(stream)?)
    }
}

/// Issue a fresh token or renew the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SecurityTokenRequestType {
    Issue = 0,
    Renew = 1,
}

impl BinaryEncode for SecurityTokenRequestType {
    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32_le(*self as u32);
    }
}

impl BinaryDecode for SecurityTokenRequestType {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        match u32::decode(stream)? {
            0 => Ok(Self::Issue),
            1 => Ok(Self::Renew),
            value => Err(EncodingError::EnumOutOfRange {
                name: "security token request type",
                value: value as i64,
            }),
        }
    }
}

/// The channel token: channel id, token id and lifetime.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelSecurityToken {
    pub channel_id: u32,
    pub token_id: u32,
    pub created_at: UaDateTime,
    /// Revised lifetime in milliseconds.
    pub revised_lifetime: u32,
}

impl BinaryEncode for ChannelSecurityToken {
    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32_le(self.channel_id);
        out.put_u32_le(self.token_id);
        self.created_at.encode(out);
        out.put_u32_le(self.revised_lifetime);
    }
}

impl BinaryDecode for ChannelSecurityToken {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            channel_id: u32::decode(stream)?,
            token_id: u32::decode(stream)?,
            created_at: UaDateTime::decode(stream)?,
            revised_lifetime: u32::decode(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenSecureChannelRequest {
    pub request_header: RequestHeader,
    pub client_protocol_version: u32,
    pub request_type: SecurityTokenRequestType,
    pub security_mode: MessageSecurityMode,
    pub client_nonce: Vec<u8>,
    /// Requested token lifetime in milliseconds.
    pub requested_lifetime: u32,
}

impl BinaryEncode for OpenSecureChannelRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        out.put_u32_le(self.client_protocol_version);
        self.request_type.encode(out);
        self.security_mode.encode(out);
        write_byte_string(out, &self.client_nonce);
        out.put_u32_le(self.requested_lifetime);
    }
}

impl BinaryDecode for OpenSecureChannelRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            client_protocol_version: u32::decode(stream)?,
            request_type: SecurityTokenRequestType::decode(stream)?,
            security_mode: MessageSecurityMode::decode(stream)?,
            client_nonce: read_byte_string(stream)?,
            requested_lifetime: u32::decode(stream)?,
        })
    }
}

impl MessageBody for OpenSecureChannelRequest {
    const TYPE_ID: u32 = object_ids::OPEN_SECURE_CHANNEL_REQUEST;
}

impl ServiceRequest for OpenSecureChannelRequest {
    type Response = OpenSecureChannelResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OpenSecureChannelResponse {
    pub response_header: ResponseHeader,
    pub server_protocol_version: u32,
    pub security_token: ChannelSecurityToken,
    pub server_nonce: Vec<u8>,
}

impl BinaryEncode for OpenSecureChannelResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
        out.put_u32_le(self.server_protocol_version);
        self.security_token.encode(out);
        write_byte_string(out, &self.server_nonce);
    }
}

impl BinaryDecode for OpenSecureChannelResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
            server_protocol_version: u32::decode(stream)?,
            security_token: ChannelSecurityToken::decode(stream)?,
            server_nonce: read_byte_string(stream)?,
        })
    }
}

impl MessageBody for OpenSecureChannelResponse {
    const TYPE_ID: u32 = object_ids::OPEN_SECURE_CHANNEL_RESPONSE;
}

impl ServiceResponse for OpenSecureChannelResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CloseSecureChannelRequest {
    pub request_header: RequestHeader,
}

impl BinaryEncode for CloseSecureChannelRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
    }
}

impl BinaryDecode for CloseSecureChannelRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
        })
    }
}

impl MessageBody for CloseSecureChannelRequest {
    const TYPE_ID: u32 = object_ids::CLOSE_SECURE_CHANNEL_REQUEST;
}

impl ServiceRequest for CloseSecureChannelRequest {
    type Response = CloseSecureChannelResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

/// Defined for completeness; servers close the connection instead of
/// answering CLO.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CloseSecureChannelResponse {
    pub response_header: ResponseHeader,
}

impl BinaryEncode for CloseSecureChannelResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
    }
}

impl BinaryDecode for CloseSecureChannelResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
        })
    }
}

impl MessageBody for CloseSecureChannelResponse {
    const TYPE_ID: u32 = object_ids::CLOSE_SECURE_CHANNEL_RESPONSE;
}

impl ServiceResponse for CloseSecureChannelResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_request_roundtrip() {
        let req = OpenSecureChannelRequest {
            request_header: RequestHeader::new(1, 0),
            client_protocol_version: 0,
            request_type: SecurityTokenRequestType::Issue,
            security_mode: MessageSecurityMode::SignAndEncrypt,
            client_nonce: vec![0xAA; 32],
            requested_lifetime: 3_600_000,
        };
        let mut out = Vec::new();
        req.encode(&mut out);

        let mut stream = out.as_slice();
        assert_eq!(OpenSecureChannelRequest::decode(&mut stream).unwrap(), req);
        assert!(stream.is_empty());
    }

    #[test]
    fn open_response_roundtrip() {
        let resp = OpenSecureChannelResponse {
            server_protocol_version: 0,
            security_token: ChannelSecurityToken {
                channel_id: 17,
                token_id: 2,
                created_at: UaDateTime(99),
                revised_lifetime: 600_000,
            },
            server_nonce: vec![0x55; 32],
            ..Default::default()
        };
        let mut out = Vec::new();
        resp.encode(&mut out);

        let mut stream = out.as_slice();
        assert_eq!(
            OpenSecureChannelResponse::decode(&mut stream).unwrap(),
            resp
        );
    }

    #[test]
    fn security_mode_out_of_range() {
        let data = 9u32.to_le_bytes();
        let mut stream = data.as_slice();
        assert!(matches!(
            MessageSecurityMode::decode(&mut stream),
            Err(EncodingError::EnumOutOfRange { .. })
        ));
    }
}
