//! Discovery service messages
//!
//! GetEndpoints runs before a session exists; the request header carries a
//! null authentication token.

use crate::encoding::{
    read_array, read_string, write_array, write_string, BinaryDecode, BinaryEncode,
    EncodingResult,
};
use crate::ids::object_ids;
use crate::service::session::EndpointDescription;
use crate::service::{
    MessageBody, RequestHeader, ResponseHeader, ServiceRequest, ServiceResponse,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GetEndpointsRequest {
    pub request_header: RequestHeader,
    pub endpoint_url: String,
    pub locale_ids: Vec<String>,
    pub profile_uris: Vec<String>,
}

impl BinaryEncode for GetEndpointsRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        write_string(out, &self.endpoint_url);
        write_array(out, &self.locale_ids);
        write_array(out, &self.profile_uris);
    }
}

impl BinaryDecode for GetEndpointsRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            endpoint_url: read_string(stream)?,
            locale_ids: read_array(stream)?,
            profile_uris: read_array(stream)?,
        })
    }
}

impl MessageBody for GetEndpointsRequest {
    const TYPE_ID: u32 = object_ids::GET_ENDPOINTS_REQUEST;
}

impl ServiceRequest for GetEndpointsRequest {
    type Response = GetEndpointsResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GetEndpointsResponse {
    pub response_header: ResponseHeader,
    pub endpoints: Vec<EndpointDescription>,
}

impl BinaryEncode for GetEndpointsResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
        write_array(out, &self.endpoints);
    }
}

impl BinaryDecode for GetEndpointsResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
            endpoints: read_array(stream)?,
        })
    }
}

impl MessageBody for GetEndpointsResponse {
    const TYPE_ID: u32 = object_ids::GET_ENDPOINTS_RESPONSE;
}

impl ServiceResponse for GetEndpointsResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}
