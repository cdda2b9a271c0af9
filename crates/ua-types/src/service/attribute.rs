//! Attribute service messages: Read, Write, HistoryRead

use crate::data_value::DataValue;
use crate::date_time::UaDateTime;
use crate::diagnostic_info::DiagnosticInfo;
use crate::encoding::{
    read_array, read_byte_string, read_string, write_array, write_byte_string, write_string,
    BinaryDecode, BinaryEncode, EncodingError, EncodingResult,
};
use crate::extension_object::ExtensionObject;
use crate::ids::object_ids;
use crate::node_id::NodeId;
use crate::qualified_name::QualifiedName;
use crate::service::{
    MessageBody, RequestHeader, ResponseHeader, ServiceRequest, ServiceResponse,
};
use crate::status_code::StatusCode;
use bytes::BufMut;

/// Which timestamps the server returns with each value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum TimestampsToReturn {
    Source = 0,
    Server = 1,
    #[default]
    Both = 2,
    Neither = 3,
}

impl BinaryEncode for TimestampsToReturn {
    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32_le(*self as u32);
    }
}

impl BinaryDecode for TimestampsToReturn {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        match u32::decode(stream)? {
            0 => Ok(Self::Source),
            1 => Ok(Self::Server),
            2 => Ok(Self::Both),
            3 => Ok(Self::Neither),
            value => Err(EncodingError::EnumOutOfRange {
                name: "timestamps to return",
                value: value as i64,
            }),
        }
    }
}

/// One attribute of one node to read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadValueId {
    pub node_id: NodeId,
    pub attribute_id: u32,
    pub index_range: String,
    pub data_encoding: QualifiedName,
}

impl ReadValueId {
    /// Read the Value attribute of a node.
    pub fn value_of(node_id: NodeId) -> Self {
        Self {
            node_id,
            attribute_id: crate::ids::attribute_ids::VALUE,
            ..Default::default()
        }
    }

    /// Read an arbitrary attribute of a node.
    pub fn attribute_of(node_id: NodeId, attribute_id: u32) -> Self {
        Self {
            node_id,
            attribute_id,
            ..Default::default()
        }
    }
}

impl BinaryEncode for ReadValueId {
    fn encode(&self, out: &mut Vec<u8>) {
        self.node_id.encode(out);
        out.put_u32_le(self.attribute_id);
        write_string(out, &self.index_range);
        self.data_encoding.encode(out);
    }
}

impl BinaryDecode for ReadValueId {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            node_id: NodeId::decode(stream)?,
            attribute_id: u32::decode(stream)?,
            index_range: read_string(stream)?,
            data_encoding: QualifiedName::decode(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadRequest {
    pub request_header: RequestHeader,
    /// Oldest acceptable cached value age in milliseconds; 0 forces a fresh
    /// read.
    pub max_age: f64,
    pub timestamps_to_return: TimestampsToReturn,
    pub nodes_to_read: Vec<ReadValueId>,
}

impl BinaryEncode for ReadRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        self.max_age.encode(out);
        self.timestamps_to_return.encode(out);
        write_array(out, &self.nodes_to_read);
    }
}

impl BinaryDecode for ReadRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            max_age: f64::decode(stream)?,
            timestamps_to_return: TimestampsToReturn::decode(stream)?,
            nodes_to_read: read_array(stream)?,
        })
    }
}

impl MessageBody for ReadRequest {
    const TYPE_ID: u32 = object_ids::READ_REQUEST;
}

impl ServiceRequest for ReadRequest {
    type Response = ReadResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadResponse {
    pub response_header: ResponseHeader,
    /// One DataValue per requested node, in request order. Per-operation
    /// failures are carried in the value's status, not as errors.
    pub results: Vec<DataValue>,
    pub diagnostic_infos: Vec<DiagnosticInfo>,
}

impl BinaryEncode for ReadResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
        write_array(out, &self.results);
        write_array(out, &self.diagnostic_infos);
    }
}

impl BinaryDecode for ReadResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
            results: read_array(stream)?,
            diagnostic_infos: read_array(stream)?,
        })
    }
}

impl MessageBody for ReadResponse {
    const TYPE_ID: u32 = object_ids::READ_RESPONSE;
}

impl ServiceResponse for ReadResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

/// One attribute of one node to write.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteValue {
    pub node_id: NodeId,
    pub attribute_id: u32,
    pub index_range: String,
    pub value: DataValue,
}

impl WriteValue {
    /// Write the Value attribute of a node.
    pub fn value_of(node_id: NodeId, value: DataValue) -> Self {
        Self {
            node_id,
            attribute_id: crate::ids::attribute_ids::VALUE,
            index_range: String::new(),
            value,
        }
    }
}

impl BinaryEncode for WriteValue {
    fn encode(&self, out: &mut Vec<u8>) {
        self.node_id.encode(out);
        out.put_u32_le(self.attribute_id);
        write_string(out, &self.index_range);
        self.value.encode(out);
    }
}

impl BinaryDecode for WriteValue {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            node_id: NodeId::decode(stream)?,
            attribute_id: u32::decode(stream)?,
            index_range: read_string(stream)?,
            value: DataValue::decode(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteRequest {
    pub request_header: RequestHeader,
    pub nodes_to_write: Vec<WriteValue>,
}

impl BinaryEncode for WriteRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        write_array(out, &self.nodes_to_write);
    }
}

impl BinaryDecode for WriteRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            nodes_to_write: read_array(stream)?,
        })
    }
}

impl MessageBody for WriteRequest {
    const TYPE_ID: u32 = object_ids::WRITE_REQUEST;
}

impl ServiceRequest for WriteRequest {
    type Response = WriteResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteResponse {
    pub response_header: ResponseHeader,
    pub results: Vec<StatusCode>,
    pub diagnostic_infos: Vec<DiagnosticInfo>,
}

impl BinaryEncode for WriteResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
        write_array(out, &self.results);
        write_array(out, &self.diagnostic_infos);
    }
}

impl BinaryDecode for WriteResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
            results: read_array(stream)?,
            diagnostic_infos: read_array(stream)?,
        })
    }
}

impl MessageBody for WriteResponse {
    const TYPE_ID: u32 = object_ids::WRITE_RESPONSE;
}

impl ServiceResponse for WriteResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

/// Raw/modified history read window, wrapped in the request's details
/// extension object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadRawModifiedDetails {
    pub is_read_modified: bool,
    pub start_time: UaDateTime,
    pub end_time: UaDateTime,
    pub num_values_per_node: u32,
    pub return_bounds: bool,
}

impl BinaryEncode for ReadRawModifiedDetails {
    fn encode(&self, out: &mut Vec<u8>) {
        self.is_read_modified.encode(out);
        self.start_time.encode(out);
        self.end_time.encode(out);
        out.put_u32_le(self.num_values_per_node);
        self.return_bounds.encode(out);
    }
}

impl BinaryDecode for ReadRawModifiedDetails {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            is_read_modified: bool::decode(stream)?,
            start_time: UaDateTime::decode(stream)?,
            end_time: UaDateTime::decode(stream)?,
            num_values_per_node: u32::decode(stream)?,
            return_bounds: bool::decode(stream)?,
        })
    }
}

impl MessageBody for ReadRawModifiedDetails {
    const TYPE_ID: u32 = object_ids::READ_RAW_MODIFIED_DETAILS;
}

/// The history payload for plain data history.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryData {
    pub data_values: Vec<DataValue>,
}

impl BinaryEncode for HistoryData {
    fn encode(&self, out: &mut Vec<u8>) {
        write_array(out, &self.data_values);
    }
}

impl BinaryDecode for HistoryData {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            data_values: read_array(stream)?,
        })
    }
}

impl MessageBody for HistoryData {
    const TYPE_ID: u32 = object_ids::HISTORY_DATA;
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryReadValueId {
    pub node_id: NodeId,
    pub index_range: String,
    pub data_encoding: QualifiedName,
    pub continuation_point: Vec<u8>,
}

impl BinaryEncode for HistoryReadValueId {
    fn encode(&self, out: &mut Vec<u8>) {
        self.node_id.encode(out);
        write_string(out, &self.index_range);
        self.data_encoding.encode(out);
        write_byte_string(out, &self.continuation_point);
    }
}

impl BinaryDecode for HistoryReadValueId {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            node_id: NodeId::decode(stream)?,
            index_range: read_string(stream)?,
            data_encoding: QualifiedName::decode(stream)?,
            continuation_point: read_byte_string(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryReadResult {
    pub status_code: StatusCode,
    pub continuation_point: Vec<u8>,
    /// Usually a [`HistoryData`] wrapped by value.
    pub history_data: ExtensionObject,
}

impl BinaryEncode for HistoryReadResult {
    fn encode(&self, out: &mut Vec<u8>) {
        self.status_code.encode(out);
        write_byte_string(out, &self.continuation_point);
        self.history_data.encode(out);
    }
}

impl BinaryDecode for HistoryReadResult {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            status_code: StatusCode::decode(stream)?,
            continuation_point: read_byte_string(stream)?,
            history_data: ExtensionObject::decode(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryReadRequest {
    pub request_header: RequestHeader,
    /// A [`ReadRawModifiedDetails`] wrapped by value.
    pub history_read_details: ExtensionObject,
    pub timestamps_to_return: TimestampsToReturn,
    pub release_continuation_points: bool,
    pub nodes_to_read: Vec<HistoryReadValueId>,
}

impl BinaryEncode for HistoryReadRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        self.history_read_details.encode(out);
        self.timestamps_to_return.encode(out);
        self.release_continuation_points.encode(out);
        write_array(out, &self.nodes_to_read);
    }
}

impl BinaryDecode for HistoryReadRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            history_read_details: ExtensionObject::decode(stream)?,
            timestamps_to_return: TimestampsToReturn::decode(stream)?,
            release_continuation_points: bool::decode(stream)?,
            nodes_to_read: read_array(stream)?,
        })
    }
}

impl MessageBody for HistoryReadRequest {
    const TYPE_ID: u32 = object_ids::HISTORY_READ_REQUEST;
}

impl ServiceRequest for HistoryReadRequest {
    type Response = HistoryReadResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryReadResponse {
    pub response_header: ResponseHeader,
    pub results: Vec<HistoryReadResult>,
    pub diagnostic_infos: Vec<DiagnosticInfo>,
}

impl BinaryEncode for HistoryReadResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
        write_array(out, &self.results);
        write_array(out, &self.diagnostic_infos);
    }
}

impl BinaryDecode for HistoryReadResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
            results: read_array(stream)?,
            diagnostic_infos: read_array(stream)?,
        })
    }
}

impl MessageBody for HistoryReadResponse {
    const TYPE_ID: u32 = object_ids::HISTORY_READ_RESPONSE;
}

impl ServiceResponse for HistoryReadResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::Variant;

    #[test]
    fn read_roundtrip() {
        let req = ReadRequest {
            request_header: RequestHeader::new(5, 0),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: vec![
                ReadValueId::value_of(NodeId::string(2, "Demo.Temperature")),
                ReadValueId::attribute_of(NodeId::numeric(0, 2258), 13),
            ],
        };
        let mut out = Vec::new();
        req.encode(&mut out);
        let mut stream = out.as_slice();
        assert_eq!(ReadRequest::decode(&mut stream).unwrap(), req);

        let resp = ReadResponse {
            results: vec![
                DataValue::new(Variant::Double(20.5)),
                DataValue {
                    status: Some(StatusCode::BAD_NODE_ID_UNKNOWN),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let mut out = Vec::new();
        resp.encode(&mut out);
        let mut stream = out.as_slice();
        assert_eq!(ReadResponse::decode(&mut stream).unwrap(), resp);
    }

    #[test]
    fn write_roundtrip() {
        let req = WriteRequest {
            request_header: RequestHeader::new(6, 0),
            nodes_to_write: vec![WriteValue::value_of(
                NodeId::string(2, "Demo.Setpoint"),
                DataValue::new(Variant::Float(42.0)),
            )],
        };
        let mut out = Vec::new();
        req.encode(&mut out);
        let mut stream = out.as_slice();
        assert_eq!(WriteRequest::decode(&mut stream).unwrap(), req);
    }

    #[test]
    fn history_read_roundtrip() {
        let details = ReadRawModifiedDetails {
            start_time: UaDateTime(100),
            end_time: UaDateTime(200),
            num_values_per_node: 1000,
            ..Default::default()
        };
        let req = HistoryReadRequest {
            request_header: RequestHeader::new(7, 0),
            history_read_details: ExtensionObject::from_message(
                ReadRawModifiedDetails::TYPE_ID,
                &details,
            ),
            timestamps_to_return: TimestampsToReturn::Source,
            release_continuation_points: false,
            nodes_to_read: vec![HistoryReadValueId {
                node_id: NodeId::string(2, "Demo.History"),
                ..Default::default()
            }],
        };
        let mut out = Vec::new();
        req.encode(&mut out);
        let mut stream = out.as_slice();
        let decoded = HistoryReadRequest::decode(&mut stream).unwrap();
        assert_eq!(decoded, req);

        let inner: ReadRawModifiedDetails = decoded
            .history_read_details
            .decode_body_as(ReadRawModifiedDetails::TYPE_ID)
            .unwrap()
            .unwrap();
        assert_eq!(inner, details);
    }

    #[test]
    fn history_data_inside_result() {
        let data = HistoryData {
            data_values: vec![DataValue::new(Variant::Int32(1))],
        };
        let result = HistoryReadResult {
            status_code: StatusCode::GOOD,
            continuation_point: Vec::new(),
            history_data: ExtensionObject::from_message(HistoryData::TYPE_ID, &data),
        };
        let mut out = Vec::new();
        result.encode(&mut out);
        let mut stream = out.as_slice();
        let decoded = HistoryReadResult::decode(&mut stream).unwrap();
        let inner: HistoryData = decoded
            .history_data
            .decode_body_as(HistoryData::TYPE_ID)
            .unwrap()
            .unwrap();
        assert_eq!(inner, data);
    }
}
