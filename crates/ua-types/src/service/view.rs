//! View service messages: Browse, BrowseNext, RegisterNodes,
//! TranslateBrowsePathsToNodeIds
//!
//! A truncated Browse result carries an opaque continuation point which the
//! client hands back to BrowseNext until the server returns an empty one.

use crate::diagnostic_info::DiagnosticInfo;
use crate::encoding::{
    read_array, read_byte_string, read_i32_length, write_array, write_byte_string, BinaryDecode,
    BinaryEncode, EncodingError, EncodingResult,
};
use crate::date_time::UaDateTime;
use crate::ids::object_ids;
use crate::node_id::{ExpandedNodeId, NodeId};
use crate::qualified_name::{LocalizedText, QualifiedName};
use crate::service::{
    MessageBody, RequestHeader, ResponseHeader, ServiceRequest, ServiceResponse,
};
use crate::status_code::StatusCode;
use bytes::BufMut;

/// Direction references are followed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum BrowseDirection {
    #[default]
    Forward = 0,
    Inverse = 1,
    Both = 2,
}

impl BinaryEncode for BrowseDirection {
    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32_le(*self as u32);
    }
}

impl BinaryDecode for BrowseDirection {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        match u32::decode(stream)? {
            0 => Ok(Self::Forward),
            1 => Ok(Self::Inverse),
            2 => Ok(Self::Both),
            value => Err(EncodingError::EnumOutOfRange {
                name: "browse direction",
                value: value as i64,
            }),
        }
    }
}

/// Node class bits for `node_class_mask`; 0 selects every class.
pub mod node_class {
    pub const OBJECT: u32 = 0x01;
    pub const VARIABLE: u32 = 0x02;
    pub const METHOD: u32 = 0x04;
    pub const OBJECT_TYPE: u32 = 0x08;
    pub const VARIABLE_TYPE: u32 = 0x10;
    pub const REFERENCE_TYPE: u32 = 0x20;
    pub const DATA_TYPE: u32 = 0x40;
    pub const VIEW: u32 = 0x80;
}

/// Result-mask bits selecting which reference fields the server fills in.
pub mod browse_result_mask {
    pub const ALL: u32 = 0x3F;
}

/// The view to browse in; null means the whole address space.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewDescription {
    pub view_id: NodeId,
    pub timestamp: UaDateTime,
    pub view_version: u32,
}

impl BinaryEncode for ViewDescription {
    fn encode(&self, out: &mut Vec<u8>) {
        self.view_id.encode(out);
        self.timestamp.encode(out);
        out.put_u32_le(self.view_version);
    }
}

impl BinaryDecode for ViewDescription {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            view_id: NodeId::decode(stream)?,
            timestamp: UaDateTime::decode(stream)?,
            view_version: u32::decode(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowseDescription {
    pub node_id: NodeId,
    pub browse_direction: BrowseDirection,
    /// Reference type to follow; null follows all references.
    pub reference_type_id: NodeId,
    pub include_subtypes: bool,
    pub node_class_mask: u32,
    pub result_mask: u32,
}

impl BrowseDescription {
    /// Browse all forward hierarchical references of a node.
    pub fn all_of(node_id: NodeId) -> Self {
        Self {
            node_id,
            browse_direction: BrowseDirection::Forward,
            reference_type_id: NodeId::null(),
            include_subtypes: true,
            node_class_mask: 0,
            result_mask: browse_result_mask::ALL,
        }
    }
}

impl BinaryEncode for BrowseDescription {
    fn encode(&self, out: &mut Vec<u8>) {
        self.node_id.encode(out);
        self.browse_direction.encode(out);
        self.reference_type_id.encode(out);
        self.include_subtypes.encode(out);
        out.put_u32_le(self.node_class_mask);
        out.put_u32_le(self.result_mask);
    }
}

impl BinaryDecode for BrowseDescription {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            node_id: NodeId::decode(stream)?,
            browse_direction: BrowseDirection::decode(stream)?,
            reference_type_id: NodeId::decode(stream)?,
            include_subtypes: bool::decode(stream)?,
            node_class_mask: u32::decode(stream)?,
            result_mask: u32::decode(stream)?,
        })
    }
}

/// One reference discovered while browsing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReferenceDescription {
    pub reference_type_id: NodeId,
    pub is_forward: bool,
    pub node_id: ExpandedNodeId,
    pub browse_name: QualifiedName,
    pub display_name: LocalizedText,
    pub node_class: u32,
    pub type_definition: ExpandedNodeId,
}

impl BinaryEncode for ReferenceDescription {
    fn encode(&self, out: &mut Vec<u8>) {
        self.reference_type_id.encode(out);
        self.is_forward.encode(out);
        self.node_id.encode(out);
        self.browse_name.encode(out);
        self.display_name.encode(out);
        out.put_u32_le(self.node_class);
        self.type_definition.encode(out);
    }
}

impl BinaryDecode for ReferenceDescription {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            reference_type_id: NodeId::decode(stream)?,
            is_forward: bool::decode(stream)?,
            node_id: ExpandedNodeId::decode(stream)?,
            browse_name: QualifiedName::decode(stream)?,
            display_name: LocalizedText::decode(stream)?,
            node_class: u32::decode(stream)?,
            type_definition: ExpandedNodeId::decode(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowseResult {
    pub status_code: StatusCode,
    /// Non-empty when the result was truncated; hand it to BrowseNext.
    pub continuation_point: Vec<u8>,
    pub references: Vec<ReferenceDescription>,
}

impl BinaryEncode for BrowseResult {
    fn encode(&self, out: &mut Vec<u8>) {
        self.status_code.encode(out);
        write_byte_string(out, &self.continuation_point);
        write_array(out, &self.references);
    }
}

impl BinaryDecode for BrowseResult {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            status_code: StatusCode::decode(stream)?,
            continuation_point: read_byte_string(stream)?,
            references: read_array(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowseRequest {
    pub request_header: RequestHeader,
    pub view: ViewDescription,
    /// 0 lets the server choose.
    pub requested_max_references_per_node: u32,
    pub nodes_to_browse: Vec<BrowseDescription>,
}

impl BinaryEncode for BrowseRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        self.view.encode(out);
        out.put_u32_le(self.requested_max_references_per_node);
        write_array(out, &self.nodes_to_browse);
    }
}

impl BinaryDecode for BrowseRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            view: ViewDescription::decode(stream)?,
            requested_max_references_per_node: u32::decode(stream)?,
            nodes_to_browse: read_array(stream)?,
        })
    }
}

impl MessageBody for BrowseRequest {
    const TYPE_ID: u32 = object_ids::BROWSE_REQUEST;
}

impl ServiceRequest for BrowseRequest {
    type Response = BrowseResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowseResponse {
    pub response_header: ResponseHeader,
    pub results: Vec<BrowseResult>,
    pub diagnostic_infos: Vec<DiagnosticInfo>,
}

impl BinaryEncode for BrowseResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
        write_array(out, &self.results);
        write_array(out, &self.diagnostic_infos);
    }
}

impl BinaryDecode for BrowseResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
            results: read_array(stream)?,
            diagnostic_infos: read_array(stream)?,
        })
    }
}

impl MessageBody for BrowseResponse {
    const TYPE_ID: u32 = object_ids::BROWSE_RESPONSE;
}

impl ServiceResponse for BrowseResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowseNextRequest {
    pub request_header: RequestHeader,
    /// When set, the server frees the continuation points without returning
    /// further results.
    pub release_continuation_points: bool,
    pub continuation_points: Vec<Vec<u8>>,
}

impl BinaryEncode for BrowseNextRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        self.release_continuation_points.encode(out);
        debug_assert!(self.continuation_points.len() <= i32::MAX as usize);
        out.put_i32_le(self.continuation_points.len() as i32);
        for point in &self.continuation_points {
            write_byte_string(out, point);
        }
    }
}

impl BinaryDecode for BrowseNextRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        let request_header = RequestHeader::decode(stream)?;
        let release_continuation_points = bool::decode(stream)?;
        let len = read_i32_length(stream)?.unwrap_or(0);
        let mut continuation_points = Vec::with_capacity(len.min(stream.len()));
        for _ in 0..len {
            continuation_points.push(read_byte_string(stream)?);
        }
        Ok(Self {
            request_header,
            release_continuation_points,
            continuation_points,
        })
    }
}

impl MessageBody for BrowseNextRequest {
    const TYPE_ID: u32 = object_ids::BROWSE_NEXT_REQUEST;
}

impl ServiceRequest for BrowseNextRequest {
    type Response = BrowseNextResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowseNextResponse {
    pub response_header: ResponseHeader,
    pub results: Vec<BrowseResult>,
    pub diagnostic_infos: Vec<DiagnosticInfo>,
}

impl BinaryEncode for BrowseNextResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
        write_array(out, &self.results);
        write_array(out, &self.diagnostic_infos);
    }
}

impl BinaryDecode for BrowseNextResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
            results: read_array(stream)?,
            diagnostic_infos: read_array(stream)?,
        })
    }
}

impl MessageBody for BrowseNextResponse {
    const TYPE_ID: u32 = object_ids::BROWSE_NEXT_RESPONSE;
}

impl ServiceResponse for BrowseNextResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegisterNodesRequest {
    pub request_header: RequestHeader,
    pub nodes_to_register: Vec<NodeId>,
}

impl BinaryEncode for RegisterNodesRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        write_array(out, &self.nodes_to_register);
    }
}

impl BinaryDecode for RegisterNodesRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            nodes_to_register: read_array(stream)?,
        })
    }
}

impl MessageBody for RegisterNodesRequest {
    const TYPE_ID: u32 = object_ids::REGISTER_NODES_REQUEST;
}

impl ServiceRequest for RegisterNodesRequest {
    type Response = RegisterNodesResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegisterNodesResponse {
    pub response_header: ResponseHeader,
    /// Session-local aliases, one per registered node, in request order.
    pub registered_node_ids: Vec<NodeId>,
}

impl BinaryEncode for RegisterNodesResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
        write_array(out, &self.registered_node_ids);
    }
}

impl BinaryDecode for RegisterNodesResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
            registered_node_ids: read_array(stream)?,
        })
    }
}

impl MessageBody for RegisterNodesResponse {
    const TYPE_ID: u32 = object_ids::REGISTER_NODES_RESPONSE;
}

impl ServiceResponse for RegisterNodesResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnregisterNodesRequest {
    pub request_header: RequestHeader,
    pub nodes_to_unregister: Vec<NodeId>,
}

impl BinaryEncode for UnregisterNodesRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        write_array(out, &self.nodes_to_unregister);
    }
}

impl BinaryDecode for UnregisterNodesRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            nodes_to_unregister: read_array(stream)?,
        })
    }
}

impl MessageBody for UnregisterNodesRequest {
    const TYPE_ID: u32 = object_ids::UNREGISTER_NODES_REQUEST;
}

impl ServiceRequest for UnregisterNodesRequest {
    type Response = UnregisterNodesResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnregisterNodesResponse {
    pub response_header: ResponseHeader,
}

impl BinaryEncode for UnregisterNodesResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
    }
}

impl BinaryDecode for UnregisterNodesResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
        })
    }
}

impl MessageBody for UnregisterNodesResponse {
    const TYPE_ID: u32 = object_ids::UNREGISTER_NODES_RESPONSE;
}

impl ServiceResponse for UnregisterNodesResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RelativePathElement {
    pub reference_type_id: NodeId,
    pub is_inverse: bool,
    pub include_subtypes: bool,
    pub target_name: QualifiedName,
}

impl BinaryEncode for RelativePathElement {
    fn encode(&self, out: &mut Vec<u8>) {
        self.reference_type_id.encode(out);
        self.is_inverse.encode(out);
        self.include_subtypes.encode(out);
        self.target_name.encode(out);
    }
}

impl BinaryDecode for RelativePathElement {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            reference_type_id: NodeId::decode(stream)?,
            is_inverse: bool::decode(stream)?,
            include_subtypes: bool::decode(stream)?,
            target_name: QualifiedName::decode(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RelativePath {
    pub elements: Vec<RelativePathElement>,
}

impl BinaryEncode for RelativePath {
    fn encode(&self, out: &mut Vec<u8>) {
        write_array(out, &self.elements);
    }
}

impl BinaryDecode for RelativePath {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            elements: read_array(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowsePath {
    pub starting_node: NodeId,
    pub relative_path: RelativePath,
}

impl BinaryEncode for BrowsePath {
    fn encode(&self, out: &mut Vec<u8>) {
        self.starting_node.encode(out);
        self.relative_path.encode(out);
    }
}

impl BinaryDecode for BrowsePath {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            starting_node: NodeId::decode(stream)?,
            relative_path: RelativePath::decode(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowsePathTarget {
    pub target_id: ExpandedNodeId,
    /// Index of the first unprocessed path element, or u32::MAX when the
    /// whole path matched.
    pub remaining_path_index: u32,
}

impl BinaryEncode for BrowsePathTarget {
    fn encode(&self, out: &mut Vec<u8>) {
        self.target_id.encode(out);
        out.put_u32_le(self.remaining_path_index);
    }
}

impl BinaryDecode for BrowsePathTarget {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            target_id: ExpandedNodeId::decode(stream)?,
            remaining_path_index: u32::decode(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowsePathResult {
    pub status_code: StatusCode,
    pub targets: Vec<BrowsePathTarget>,
}

impl BinaryEncode for BrowsePathResult {
    fn encode(&self, out: &mut Vec<u8>) {
        self.status_code.encode(out);
        write_array(out, &self.targets);
    }
}

impl BinaryDecode for BrowsePathResult {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            status_code: StatusCode::decode(stream)?,
            targets: read_array(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranslateBrowsePathsRequest {
    pub request_header: RequestHeader,
    pub browse_paths: Vec<BrowsePath>,
}

impl BinaryEncode for TranslateBrowsePathsRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        write_array(out, &self.browse_paths);
    }
}

impl BinaryDecode for TranslateBrowsePathsRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            browse_paths: read_array(stream)?,
        })
    }
}

impl MessageBody for TranslateBrowsePathsRequest {
    const TYPE_ID: u32 = object_ids::TRANSLATE_BROWSE_PATHS_REQUEST;
}

impl ServiceRequest for TranslateBrowsePathsRequest {
    type Response = TranslateBrowsePathsResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranslateBrowsePathsResponse {
    pub response_header: ResponseHeader,
    pub results: Vec<BrowsePathResult>,
    pub diagnostic_infos: Vec<DiagnosticInfo>,
}

impl BinaryEncode for TranslateBrowsePathsResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
        write_array(out, &self.results);
        write_array(out, &self.diagnostic_infos);
    }
}

impl BinaryDecode for TranslateBrowsePathsResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
            results: read_array(stream)?,
            diagnostic_infos: read_array(stream)?,
        })
    }
}

impl MessageBody for TranslateBrowsePathsResponse {
    const TYPE_ID: u32 = object_ids::TRANSLATE_BROWSE_PATHS_RESPONSE;
}

impl ServiceResponse for TranslateBrowsePathsResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browse_roundtrip() {
        let req = BrowseRequest {
            request_header: RequestHeader::new(1, 0),
            view: ViewDescription::default(),
            requested_max_references_per_node: 100,
            nodes_to_browse: vec![BrowseDescription::all_of(NodeId::numeric(0, 85))],
        };
        let mut out = Vec::new();
        req.encode(&mut out);
        let mut stream = out.as_slice();
        assert_eq!(BrowseRequest::decode(&mut stream).unwrap(), req);
    }

    #[test]
    fn browse_result_with_continuation() {
        let result = BrowseResult {
            status_code: StatusCode::GOOD,
            continuation_point: vec![0xCA, 0xFE],
            references: vec![ReferenceDescription {
                reference_type_id: NodeId::numeric(0, 35),
                is_forward: true,
                node_id: ExpandedNodeId::local(NodeId::string(2, "Demo")),
                browse_name: QualifiedName::new(2, "Demo"),
                display_name: LocalizedText::text_only("Demo"),
                node_class: node_class::OBJECT,
                type_definition: ExpandedNodeId::local(NodeId::numeric(0, 61)),
            }],
        };
        let mut out = Vec::new();
        result.encode(&mut out);
        let mut stream = out.as_slice();
        assert_eq!(BrowseResult::decode(&mut stream).unwrap(), result);
    }

    #[test]
    fn browse_next_null_continuation_points() {
        // A null points array decodes as empty.
        let mut data = Vec::new();
        RequestHeader::default().encode(&mut data);
        false.encode(&mut data);
        data.extend_from_slice(&(-1i32).to_le_bytes());

        let mut stream = data.as_slice();
        let req = BrowseNextRequest::decode(&mut stream).unwrap();
        assert!(req.continuation_points.is_empty());
        assert!(stream.is_empty());
    }

    #[test]
    fn browse_next_roundtrip() {
        let req = BrowseNextRequest {
            request_header: RequestHeader::new(2, 0),
            release_continuation_points: true,
            continuation_points: vec![vec![1, 2, 3], vec![4, 5]],
        };
        let mut out = Vec::new();
        req.encode(&mut out);
        let mut stream = out.as_slice();
        assert_eq!(BrowseNextRequest::decode(&mut stream).unwrap(), req);
    }

    #[test]
    fn translate_roundtrip() {
        let req = TranslateBrowsePathsRequest {
            request_header: RequestHeader::new(3, 0),
            browse_paths: vec![BrowsePath {
                starting_node: NodeId::numeric(0, 85),
                relative_path: RelativePath {
                    elements: vec![RelativePathElement {
                        reference_type_id: NodeId::numeric(0, 47),
                        is_inverse: false,
                        include_subtypes: true,
                        target_name: QualifiedName::new(2, "Machine"),
                    }],
                },
            }],
        };
        let mut out = Vec::new();
        req.encode(&mut out);
        let mut stream = out.as_slice();
        assert_eq!(
            TranslateBrowsePathsRequest::decode(&mut stream).unwrap(),
            req
        );
    }

    #[test]
    fn register_nodes_roundtrip() {
        let req = RegisterNodesRequest {
            request_header: RequestHeader::new(4, 0),
            nodes_to_register: vec![NodeId::string(2, "Demo.A"), NodeId::string(2, "Demo.B")],
        };
        let mut out = Vec::new();
        req.encode(&mut out);
        let mut stream = out.as_slice();
        assert_eq!(RegisterNodesRequest::decode(&mut stream).unwrap(), req);
    }
}
