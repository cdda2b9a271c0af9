//! Method service messages: Call

use crate::diagnostic_info::DiagnosticInfo;
use crate::encoding::{
    read_array, write_array, BinaryDecode, BinaryEncode, EncodingResult,
};
use crate::ids::object_ids;
use crate::node_id::NodeId;
use crate::service::{
    MessageBody, RequestHeader, ResponseHeader, ServiceRequest, ServiceResponse,
};
use crate::status_code::StatusCode;
use crate::variant::Variant;

/// One method invocation: the object it lives on, the method node, and the
/// input arguments in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallMethodRequest {
    pub object_id: NodeId,
    pub method_id: NodeId,
    pub input_arguments: Vec<Variant>,
}

impl BinaryEncode for CallMethodRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.object_id.encode(out);
        self.method_id.encode(out);
        write_array(out, &self.input_arguments);
    }
}

impl BinaryDecode for CallMethodRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            object_id: NodeId::decode(stream)?,
            method_id: NodeId::decode(stream)?,
            input_arguments: read_array(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallMethodResult {
    pub status_code: StatusCode,
    pub input_argument_results: Vec<StatusCode>,
    pub input_argument_diagnostic_infos: Vec<DiagnosticInfo>,
    pub output_arguments: Vec<Variant>,
}

impl BinaryEncode for CallMethodResult {
    fn encode(&self, out: &mut Vec<u8>) {
        self.status_code.encode(out);
        write_array(out, &self.input_argument_results);
        write_array(out, &self.input_argument_diagnostic_infos);
        write_array(out, &self.output_arguments);
    }
}

impl BinaryDecode for CallMethodResult {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            status_code: StatusCode::decode(stream)?,
            input_argument_results: read_array(stream)?,
            input_argument_diagnostic_infos: read_array(stream)?,
            output_arguments: read_array(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallRequest {
    pub request_header: RequestHeader,
    pub methods_to_call: Vec<CallMethodRequest>,
}

impl BinaryEncode for CallRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        write_array(out, &self.methods_to_call);
    }
}

impl BinaryDecode for CallRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            methods_to_call: read_array(stream)?,
        })
    }
}

impl MessageBody for CallRequest {
    const TYPE_ID: u32 = object_ids::CALL_REQUEST;
}

impl ServiceRequest for CallRequest {
    type Response = CallResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallResponse {
    pub response_header: ResponseHeader,
    pub results: Vec<CallMethodResult>,
    pub diagnostic_infos: Vec<DiagnosticInfo>,
}

impl BinaryEncode for CallResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
        write_array(out, &self.results);
        write_array(out, &self.diagnostic_infos);
    }
}

impl BinaryDecode for CallResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
            results: read_array(stream)?,
            diagnostic_infos: read_array(stream)?,
        })
    }
}

impl MessageBody for CallResponse {
    const TYPE_ID: u32 = object_ids::CALL_RESPONSE;
}

impl ServiceResponse for CallResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_roundtrip() {
        let req = CallRequest {
            request_header: RequestHeader::new(8, 0),
            methods_to_call: vec![CallMethodRequest {
                object_id: NodeId::string(2, "Demo.Pump"),
                method_id: NodeId::string(2, "Demo.Pump.Start"),
                input_arguments: vec![Variant::UInt32(3), Variant::Boolean(true)],
            }],
        };
        let mut out = Vec::new();
        req.encode(&mut out);
        let mut stream = out.as_slice();
        assert_eq!(CallRequest::decode(&mut stream).unwrap(), req);

        let resp = CallResponse {
            results: vec![CallMethodResult {
                status_code: StatusCode::GOOD,
                output_arguments: vec![Variant::Int32(-1)],
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut out = Vec::new();
        resp.encode(&mut out);
        let mut stream = out.as_slice();
        assert_eq!(CallResponse::decode(&mut stream).unwrap(), resp);
    }
}
