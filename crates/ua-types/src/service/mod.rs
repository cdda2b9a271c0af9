//! Service messages
//!
//! Every service call is a request/response pair. On the wire a message body
//! is the DefaultBinary type id (a NodeId) followed by the structure fields
//! in Part 6 order. The [`ServiceRequest`]/[`ServiceResponse`] traits tie a
//! request to its response type so the secure channel can dispatch
//! generically.

pub mod attribute;
pub mod channel;
pub mod discovery;
pub mod method;
pub mod monitored_item;
pub mod session;
pub mod subscription;
pub mod view;

use crate::date_time::UaDateTime;
use crate::diagnostic_info::DiagnosticInfo;
use crate::encoding::{
    read_array, read_string, write_array, write_string, BinaryDecode, BinaryEncode,
    EncodingResult,
};
use crate::extension_object::ExtensionObject;
use crate::ids::object_ids;
use crate::node_id::NodeId;
use crate::status_code::StatusCode;
use bytes::BufMut;

/// A structure that can appear as a message body, identified by its
/// DefaultBinary encoding id.
pub trait MessageBody: BinaryEncode + BinaryDecode {
    /// Numeric DefaultBinary type id in namespace 0.
    const TYPE_ID: u32;
}

/// A request message, linked to its response type.
pub trait ServiceRequest: MessageBody {
    type Response: ServiceResponse;

    fn request_header(&self) -> &RequestHeader;
    fn request_header_mut(&mut self) -> &mut RequestHeader;
}

/// A response message.
pub trait ServiceResponse: MessageBody {
    fn response_header(&self) -> &ResponseHeader;
}

/// The header stamped on every request.
///
/// The authentication token is the opaque NodeId handed out by
/// CreateSession; the secure channel leaves it null for channel-level
/// services.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestHeader {
    pub authentication_token: NodeId,
    pub timestamp: UaDateTime,
    pub request_handle: u32,
    pub return_diagnostics: u32,
    pub audit_entry_id: String,
    /// Server-side timeout hint in milliseconds; 0 means no hint.
    pub timeout_hint: u32,
    pub additional_header: ExtensionObject,
}

impl RequestHeader {
    /// A header stamped with the current time and the given handle/timeout.
    pub fn new(request_handle: u32, timeout_hint: u32) -> Self {
        Self {
            timestamp: UaDateTime::now(),
            request_handle,
            timeout_hint,
            ..Default::default()
        }
    }
}

impl BinaryEncode for RequestHeader {
    fn encode(&self, out: &mut Vec<u8>) {
        self.authentication_token.encode(out);
        self.timestamp.encode(out);
        out.put_u32_le(self.request_handle);
        out.put_u32_le(self.return_diagnostics);
        write_string(out, &self.audit_entry_id);
        out.put_u32_le(self.timeout_hint);
        self.additional_header.encode(out);
    }
}

impl BinaryDecode for RequestHeader {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            authentication_token: NodeId::decode(stream)?,
            timestamp: UaDateTime::decode(stream)?,
            request_handle: u32::decode(stream)?,
            return_diagnostics: u32::decode(stream)?,
            audit_entry_id: read_string(stream)?,
            timeout_hint: u32::decode(stream)?,
            additional_header: ExtensionObject::decode(stream)?,
        })
    }
}

/// The header carried on every response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseHeader {
    pub timestamp: UaDateTime,
    pub request_handle: u32,
    pub service_result: StatusCode,
    pub service_diagnostics: DiagnosticInfo,
    pub string_table: Vec<String>,
    pub additional_header: ExtensionObject,
}

impl BinaryEncode for ResponseHeader {
    fn encode(&self, out: &mut Vec<u8>) {
        self.timestamp.encode(out);
        out.put_u32_le(self.request_handle);
        self.service_result.encode(out);
        self.service_diagnostics.encode(out);
        write_array(out, &self.string_table);
        self.additional_header.encode(out);
    }
}

impl BinaryDecode for ResponseHeader {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            timestamp: UaDateTime::decode(stream)?,
            request_handle: u32::decode(stream)?,
            service_result: StatusCode::decode(stream)?,
            service_diagnostics: DiagnosticInfo::decode(stream)?,
            string_table: read_array(stream)?,
            additional_header: ExtensionObject::decode(stream)?,
        })
    }
}

/// The generic failure response a server sends when a service cannot run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServiceFault {
    pub response_header: ResponseHeader,
}

impl BinaryEncode for ServiceFault {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
    }
}

impl BinaryDecode for ServiceFault {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
        })
    }
}

impl MessageBody for ServiceFault {
    const TYPE_ID: u32 = object_ids::SERVICE_FAULT;
}

impl ServiceResponse for ServiceFault {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

/// Encode a message body prefixed with its DefaultBinary type id, the form
/// every OPN/MSG body takes.
pub fn encode_message<T: MessageBody>(body: &T) -> Vec<u8> {
    let mut out = Vec::new();
    NodeId::numeric(0, T::TYPE_ID).encode(&mut out);
    body.encode(&mut out);
    out
}

/// Read the type id that prefixes a message body.
pub fn decode_message_type_id(stream: &mut &[u8]) -> EncodingResult<NodeId> {
    NodeId::decode(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_header_roundtrip() {
        let header = RequestHeader {
            authentication_token: NodeId::opaque(0, vec![1, 2, 3]),
            timestamp: UaDateTime(42),
            request_handle: 9,
            return_diagnostics: 0,
            audit_entry_id: String::new(),
            timeout_hint: 5000,
            additional_header: ExtensionObject::null(),
        };
        let mut out = Vec::new();
        header.encode(&mut out);

        let mut stream = out.as_slice();
        assert_eq!(RequestHeader::decode(&mut stream).unwrap(), header);
        assert!(stream.is_empty());
    }

    #[test]
    fn response_header_roundtrip() {
        let header = ResponseHeader {
            timestamp: UaDateTime(7),
            request_handle: 3,
            service_result: StatusCode::BAD_SERVICE_UNSUPPORTED,
            service_diagnostics: DiagnosticInfo::default(),
            string_table: vec!["a".into(), "b".into()],
            additional_header: ExtensionObject::null(),
        };
        let mut out = Vec::new();
        header.encode(&mut out);

        let mut stream = out.as_slice();
        assert_eq!(ResponseHeader::decode(&mut stream).unwrap(), header);
    }

    #[test]
    fn message_prefix_is_type_id() {
        let fault = ServiceFault::default();
        let bytes = encode_message(&fault);

        let mut stream = bytes.as_slice();
        let type_id = decode_message_type_id(&mut stream).unwrap();
        assert_eq!(type_id.as_object_id(), Some(object_ids::SERVICE_FAULT));

        let decoded = ServiceFault::decode(&mut stream).unwrap();
        assert_eq!(decoded, fault);
        assert!(stream.is_empty());
    }
}
