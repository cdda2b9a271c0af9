//! MonitoredItem service messages
//!
//! The client picks a `client_handle` per item; the server routes every
//! notification back through it.

use crate::diagnostic_info::DiagnosticInfo;
use crate::encoding::{
    read_array, write_array, BinaryDecode, BinaryEncode, EncodingError, EncodingResult,
};
use crate::extension_object::ExtensionObject;
use crate::ids::object_ids;
use crate::service::attribute::{ReadValueId, TimestampsToReturn};
use crate::service::{
    MessageBody, RequestHeader, ResponseHeader, ServiceRequest, ServiceResponse,
};
use crate::status_code::StatusCode;
use bytes::BufMut;

/// Sampling/reporting state of a monitored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum MonitoringMode {
    Disabled = 0,
    Sampling = 1,
    #[default]
    Reporting = 2,
}

impl BinaryEncode for MonitoringMode {
    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32_le(*self as u32);
    }
}

impl BinaryDecode for MonitoringMode {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        match u32::decode(stream)? {
            0 => Ok(Self::Disabled),
            1 => Ok(Self::Sampling),
            2 => Ok(Self::Reporting),
            value => Err(EncodingError::EnumOutOfRange {
                name: "monitoring mode",
                value: value as i64,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringParameters {
    /// Client-chosen handle echoed in every notification for this item.
    pub client_handle: u32,
    /// Sampling interval in milliseconds; -1 inherits the publishing
    /// interval.
    pub sampling_interval: f64,
    pub filter: ExtensionObject,
    pub queue_size: u32,
    pub discard_oldest: bool,
}

impl Default for MonitoringParameters {
    fn default() -> Self {
        Self {
            client_handle: 0,
            sampling_interval: -1.0,
            filter: ExtensionObject::null(),
            queue_size: 1,
            discard_oldest: true,
        }
    }
}

impl BinaryEncode for MonitoringParameters {
    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32_le(self.client_handle);
        self.sampling_interval.encode(out);
        self.filter.encode(out);
        out.put_u32_le(self.queue_size);
        self.discard_oldest.encode(out);
    }
}

impl BinaryDecode for MonitoringParameters {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            client_handle: u32::decode(stream)?,
            sampling_interval: f64::decode(stream)?,
            filter: ExtensionObject::decode(stream)?,
            queue_size: u32::decode(stream)?,
            discard_oldest: bool::decode(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitoredItemCreateRequest {
    pub item_to_monitor: ReadValueId,
    pub monitoring_mode: MonitoringMode,
    pub requested_parameters: MonitoringParameters,
}

impl BinaryEncode for MonitoredItemCreateRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.item_to_monitor.encode(out);
        self.monitoring_mode.encode(out);
        self.requested_parameters.encode(out);
    }
}

impl BinaryDecode for MonitoredItemCreateRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            item_to_monitor: ReadValueId::decode(stream)?,
            monitoring_mode: MonitoringMode::decode(stream)?,
            requested_parameters: MonitoringParameters::decode(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitoredItemCreateResult {
    pub status_code: StatusCode,
    pub monitored_item_id: u32,
    pub revised_sampling_interval: f64,
    pub revised_queue_size: u32,
    pub filter_result: ExtensionObject,
}

impl BinaryEncode for MonitoredItemCreateResult {
    fn encode(&self, out: &mut Vec<u8>) {
        self.status_code.encode(out);
        out.put_u32_le(self.monitored_item_id);
        self.revised_sampling_interval.encode(out);
        out.put_u32_le(self.revised_queue_size);
        self.filter_result.encode(out);
    }
}

impl BinaryDecode for MonitoredItemCreateResult {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            status_code: StatusCode::decode(stream)?,
            monitored_item_id: u32::decode(stream)?,
            revised_sampling_interval: f64::decode(stream)?,
            revised_queue_size: u32::decode(stream)?,
            filter_result: ExtensionObject::decode(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateMonitoredItemsRequest {
    pub request_header: RequestHeader,
    pub subscription_id: u32,
    pub timestamps_to_return: TimestampsToReturn,
    pub items_to_create: Vec<MonitoredItemCreateRequest>,
}

impl BinaryEncode for CreateMonitoredItemsRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        out.put_u32_le(self.subscription_id);
        self.timestamps_to_return.encode(out);
        write_array(out, &self.items_to_create);
    }
}

impl BinaryDecode for CreateMonitoredItemsRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            subscription_id: u32::decode(stream)?,
            timestamps_to_return: TimestampsToReturn::decode(stream)?,
            items_to_create: read_array(stream)?,
        })
    }
}

impl MessageBody for CreateMonitoredItemsRequest {
    const TYPE_ID: u32 = object_ids::CREATE_MONITORED_ITEMS_REQUEST;
}

impl ServiceRequest for CreateMonitoredItemsRequest {
    type Response = CreateMonitoredItemsResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateMonitoredItemsResponse {
    pub response_header: ResponseHeader,
    pub results: Vec<MonitoredItemCreateResult>,
    pub diagnostic_infos: Vec<DiagnosticInfo>,
}

impl BinaryEncode for CreateMonitoredItemsResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
        write_array(out, &self.results);
        write_array(out, &self.diagnostic_infos);
    }
}

impl BinaryDecode for CreateMonitoredItemsResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
            results: read_array(stream)?,
            diagnostic_infos: read_array(stream)?,
        })
    }
}

impl MessageBody for CreateMonitoredItemsResponse {
    const TYPE_ID: u32 = object_ids::CREATE_MONITORED_ITEMS_RESPONSE;
}

impl ServiceResponse for CreateMonitoredItemsResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitoredItemModifyRequest {
    pub monitored_item_id: u32,
    pub requested_parameters: MonitoringParameters,
}

impl BinaryEncode for MonitoredItemModifyRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32_le(self.monitored_item_id);
        self.requested_parameters.encode(out);
    }
}

impl BinaryDecode for MonitoredItemModifyRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            monitored_item_id: u32::decode(stream)?,
            requested_parameters: MonitoringParameters::decode(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitoredItemModifyResult {
    pub status_code: StatusCode,
    pub revised_sampling_interval: f64,
    pub revised_queue_size: u32,
    pub filter_result: ExtensionObject,
}

impl BinaryEncode for MonitoredItemModifyResult {
    fn encode(&self, out: &mut Vec<u8>) {
        self.status_code.encode(out);
        self.revised_sampling_interval.encode(out);
        out.put_u32_le(self.revised_queue_size);
        self.filter_result.encode(out);
    }
}

impl BinaryDecode for MonitoredItemModifyResult {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            status_code: StatusCode::decode(stream)?,
            revised_sampling_interval: f64::decode(stream)?,
            revised_queue_size: u32::decode(stream)?,
            filter_result: ExtensionObject::decode(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModifyMonitoredItemsRequest {
    pub request_header: RequestHeader,
    pub subscription_id: u32,
    pub timestamps_to_return: TimestampsToReturn,
    pub items_to_modify: Vec<MonitoredItemModifyRequest>,
}

impl BinaryEncode for ModifyMonitoredItemsRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        out.put_u32_le(self.subscription_id);
        self.timestamps_to_return.encode(out);
        write_array(out, &self.items_to_modify);
    }
}

impl BinaryDecode for ModifyMonitoredItemsRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            subscription_id: u32::decode(stream)?,
            timestamps_to_return: TimestampsToReturn::decode(stream)?,
            items_to_modify: read_array(stream)?,
        })
    }
}

impl MessageBody for ModifyMonitoredItemsRequest {
    const TYPE_ID: u32 = object_ids::MODIFY_MONITORED_ITEMS_REQUEST;
}

impl ServiceRequest for ModifyMonitoredItemsRequest {
    type Response = ModifyMonitoredItemsResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModifyMonitoredItemsResponse {
    pub response_header: ResponseHeader,
    pub results: Vec<MonitoredItemModifyResult>,
    pub diagnostic_infos: Vec<DiagnosticInfo>,
}

impl BinaryEncode for ModifyMonitoredItemsResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
        write_array(out, &self.results);
        write_array(out, &self.diagnostic_infos);
    }
}

impl BinaryDecode for ModifyMonitoredItemsResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
            results: read_array(stream)?,
            diagnostic_infos: read_array(stream)?,
        })
    }
}

impl MessageBody for ModifyMonitoredItemsResponse {
    const TYPE_ID: u32 = object_ids::MODIFY_MONITORED_ITEMS_RESPONSE;
}

impl ServiceResponse for ModifyMonitoredItemsResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetMonitoringModeRequest {
    pub request_header: RequestHeader,
    pub subscription_id: u32,
    pub monitoring_mode: MonitoringMode,
    pub monitored_item_ids: Vec<u32>,
}

impl BinaryEncode for SetMonitoringModeRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        out.put_u32_le(self.subscription_id);
        self.monitoring_mode.encode(out);
        write_array(out, &self.monitored_item_ids);
    }
}

impl BinaryDecode for SetMonitoringModeRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            subscription_id: u32::decode(stream)?,
            monitoring_mode: MonitoringMode::decode(stream)?,
            monitored_item_ids: read_array(stream)?,
        })
    }
}

impl MessageBody for SetMonitoringModeRequest {
    const TYPE_ID: u32 = object_ids::SET_MONITORING_MODE_REQUEST;
}

impl ServiceRequest for SetMonitoringModeRequest {
    type Response = SetMonitoringModeResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetMonitoringModeResponse {
    pub response_header: ResponseHeader,
    pub results: Vec<StatusCode>,
    pub diagnostic_infos: Vec<DiagnosticInfo>,
}

impl BinaryEncode for SetMonitoringModeResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
        write_array(out, &self.results);
        write_array(out, &self.diagnostic_infos);
    }
}

impl BinaryDecode for SetMonitoringModeResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
            results: read_array(stream)?,
            diagnostic_infos: read_array(stream)?,
        })
    }
}

impl MessageBody for SetMonitoringModeResponse {
    const TYPE_ID: u32 = object_ids::SET_MONITORING_MODE_RESPONSE;
}

impl ServiceResponse for SetMonitoringModeResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteMonitoredItemsRequest {
    pub request_header: RequestHeader,
    pub subscription_id: u32,
    pub monitored_item_ids: Vec<u32>,
}

impl BinaryEncode for DeleteMonitoredItemsRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        out.put_u32_le(self.subscription_id);
        write_array(out, &self.monitored_item_ids);
    }
}

impl BinaryDecode for DeleteMonitoredItemsRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            subscription_id: u32::decode(stream)?,
            monitored_item_ids: read_array(stream)?,
        })
    }
}

impl MessageBody for DeleteMonitoredItemsRequest {
    const TYPE_ID: u32 = object_ids::DELETE_MONITORED_ITEMS_REQUEST;
}

impl ServiceRequest for DeleteMonitoredItemsRequest {
    type Response = DeleteMonitoredItemsResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteMonitoredItemsResponse {
    pub response_header: ResponseHeader,
    pub results: Vec<StatusCode>,
    pub diagnostic_infos: Vec<DiagnosticInfo>,
}

impl BinaryEncode for DeleteMonitoredItemsResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
        write_array(out, &self.results);
        write_array(out, &self.diagnostic_infos);
    }
}

impl BinaryDecode for DeleteMonitoredItemsResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
            results: read_array(stream)?,
            diagnostic_infos: read_array(stream)?,
        })
    }
}

impl MessageBody for DeleteMonitoredItemsResponse {
    const TYPE_ID: u32 = object_ids::DELETE_MONITORED_ITEMS_RESPONSE;
}

impl ServiceResponse for DeleteMonitoredItemsResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_id::NodeId;

    #[test]
    fn create_monitored_items_roundtrip() {
        let req = CreateMonitoredItemsRequest {
            request_header: RequestHeader::new(10, 0),
            subscription_id: 4,
            timestamps_to_return: TimestampsToReturn::Both,
            items_to_create: vec![MonitoredItemCreateRequest {
                item_to_monitor: ReadValueId::value_of(NodeId::string(2, "Demo.Level")),
                monitoring_mode: MonitoringMode::Reporting,
                requested_parameters: MonitoringParameters {
                    client_handle: 17,
                    sampling_interval: 250.0,
                    queue_size: 10,
                    ..Default::default()
                },
            }],
        };
        let mut out = Vec::new();
        req.encode(&mut out);
        let mut stream = out.as_slice();
        assert_eq!(
            CreateMonitoredItemsRequest::decode(&mut stream).unwrap(),
            req
        );
    }

    #[test]
    fn delete_monitored_items_roundtrip() {
        let req = DeleteMonitoredItemsRequest {
            request_header: RequestHeader::new(11, 0),
            subscription_id: 4,
            monitored_item_ids: vec![100, 101],
        };
        let mut out = Vec::new();
        req.encode(&mut out);
        let mut stream = out.as_slice();
        assert_eq!(
            DeleteMonitoredItemsRequest::decode(&mut stream).unwrap(),
            req
        );
    }

    #[test]
    fn monitoring_mode_out_of_range() {
        let data = 3u32.to_le_bytes();
        let mut stream = data.as_slice();
        assert!(matches!(
            MonitoringMode::decode(&mut stream),
            Err(EncodingError::EnumOutOfRange { .. })
        ));
    }
}
