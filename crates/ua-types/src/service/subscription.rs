//! Subscription service messages
//!
//! Publish responses carry a NotificationMessage whose notification data is
//! a list of extension objects; DataChangeNotification and
//! EventNotificationList are the two payloads a client routes, anything else
//! is skipped for forward compatibility.

use crate::data_value::DataValue;
use crate::date_time::UaDateTime;
use crate::diagnostic_info::DiagnosticInfo;
use crate::encoding::{
    read_array, write_array, BinaryDecode, BinaryEncode, EncodingResult,
};
use crate::extension_object::ExtensionObject;
use crate::ids::object_ids;
use crate::service::{
    MessageBody, RequestHeader, ResponseHeader, ServiceRequest, ServiceResponse,
};
use crate::status_code::StatusCode;
use crate::variant::Variant;
use bytes::BufMut;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateSubscriptionRequest {
    pub request_header: RequestHeader,
    /// Requested publishing interval in milliseconds.
    pub requested_publishing_interval: f64,
    pub requested_lifetime_count: u32,
    pub requested_max_keep_alive_count: u32,
    pub max_notifications_per_publish: u32,
    pub publishing_enabled: bool,
    pub priority: u8,
}

impl BinaryEncode for CreateSubscriptionRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        self.requested_publishing_interval.encode(out);
        out.put_u32_le(self.requested_lifetime_count);
        out.put_u32_le(self.requested_max_keep_alive_count);
        out.put_u32_le(self.max_notifications_per_publish);
        self.publishing_enabled.encode(out);
        out.put_u8(self.priority);
    }
}

impl BinaryDecode for CreateSubscriptionRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            requested_publishing_interval: f64::decode(stream)?,
            requested_lifetime_count: u32::decode(stream)?,
            requested_max_keep_alive_count: u32::decode(stream)?,
            max_notifications_per_publish: u32::decode(stream)?,
            publishing_enabled: bool::decode(stream)?,
            priority: u8::decode(stream)?,
        })
    }
}

impl MessageBody for CreateSubscriptionRequest {
    const TYPE_ID: u32 = object_ids::CREATE_SUBSCRIPTION_REQUEST;
}

impl ServiceRequest for CreateSubscriptionRequest {
    type Response = CreateSubscriptionResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateSubscriptionResponse {
    pub response_header: ResponseHeader,
    pub subscription_id: u32,
    pub revised_publishing_interval: f64,
    pub revised_lifetime_count: u32,
    pub revised_max_keep_alive_count: u32,
}

impl BinaryEncode for CreateSubscriptionResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
        out.put_u32_le(self.subscription_id);
        self.revised_publishing_interval.encode(out);
        out.put_u32_le(self.revised_lifetime_count);
        out.put_u32_le(self.revised_max_keep_alive_count);
    }
}

impl BinaryDecode for CreateSubscriptionResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
            subscription_id: u32::decode(stream)?,
            revised_publishing_interval: f64::decode(stream)?,
            revised_lifetime_count: u32::decode(stream)?,
            revised_max_keep_alive_count: u32::decode(stream)?,
        })
    }
}

impl MessageBody for CreateSubscriptionResponse {
    const TYPE_ID: u32 = object_ids::CREATE_SUBSCRIPTION_RESPONSE;
}

impl ServiceResponse for CreateSubscriptionResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModifySubscriptionRequest {
    pub request_header: RequestHeader,
    pub subscription_id: u32,
    pub requested_publishing_interval: f64,
    pub requested_lifetime_count: u32,
    pub requested_max_keep_alive_count: u32,
    pub max_notifications_per_publish: u32,
    pub priority: u8,
}

impl BinaryEncode for ModifySubscriptionRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        out.put_u32_le(self.subscription_id);
        self.requested_publishing_interval.encode(out);
        out.put_u32_le(self.requested_lifetime_count);
        out.put_u32_le(self.requested_max_keep_alive_count);
        out.put_u32_le(self.max_notifications_per_publish);
        out.put_u8(self.priority);
    }
}

impl BinaryDecode for ModifySubscriptionRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            subscription_id: u32::decode(stream)?,
            requested_publishing_interval: f64::decode(stream)?,
            requested_lifetime_count: u32::decode(stream)?,
            requested_max_keep_alive_count: u32::decode(stream)?,
            max_notifications_per_publish: u32::decode(stream)?,
            priority: u8::decode(stream)?,
        })
    }
}

impl MessageBody for ModifySubscriptionRequest {
    const TYPE_ID: u32 = object_ids::MODIFY_SUBSCRIPTION_REQUEST;
}

impl ServiceRequest for ModifySubscriptionRequest {
    type Response = ModifySubscriptionResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModifySubscriptionResponse {
    pub response_header: ResponseHeader,
    pub revised_publishing_interval: f64,
    pub revised_lifetime_count: u32,
    pub revised_max_keep_alive_count: u32,
}

impl BinaryEncode for ModifySubscriptionResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
        self.revised_publishing_interval.encode(out);
        out.put_u32_le(self.revised_lifetime_count);
        out.put_u32_le(self.revised_max_keep_alive_count);
    }
}

impl BinaryDecode for ModifySubscriptionResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
            revised_publishing_interval: f64::decode(stream)?,
            revised_lifetime_count: u32::decode(stream)?,
            revised_max_keep_alive_count: u32::decode(stream)?,
        })
    }
}

impl MessageBody for ModifySubscriptionResponse {
    const TYPE_ID: u32 = object_ids::MODIFY_SUBSCRIPTION_RESPONSE;
}

impl ServiceResponse for ModifySubscriptionResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetPublishingModeRequest {
    pub request_header: RequestHeader,
    pub publishing_enabled: bool,
    pub subscription_ids: Vec<u32>,
}

impl BinaryEncode for SetPublishingModeRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        self.publishing_enabled.encode(out);
        write_array(out, &self.subscription_ids);
    }
}

impl BinaryDecode for SetPublishingModeRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            publishing_enabled: bool::decode(stream)?,
            subscription_ids: read_array(stream)?,
        })
    }
}

impl MessageBody for SetPublishingModeRequest {
    const TYPE_ID: u32 = object_ids::SET_PUBLISHING_MODE_REQUEST;
}

impl ServiceRequest for SetPublishingModeRequest {
    type Response = SetPublishingModeResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetPublishingModeResponse {
    pub response_header: ResponseHeader,
    pub results: Vec<StatusCode>,
    pub diagnostic_infos: Vec<DiagnosticInfo>,
}

impl BinaryEncode for SetPublishingModeResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
        write_array(out, &self.results);
        write_array(out, &self.diagnostic_infos);
    }
}

impl BinaryDecode for SetPublishingModeResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
            results: read_array(stream)?,
            diagnostic_infos: read_array(stream)?,
        })
    }
}

impl MessageBody for SetPublishingModeResponse {
    const TYPE_ID: u32 = object_ids::SET_PUBLISHING_MODE_RESPONSE;
}

impl ServiceResponse for SetPublishingModeResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteSubscriptionsRequest {
    pub request_header: RequestHeader,
    pub subscription_ids: Vec<u32>,
}

impl BinaryEncode for DeleteSubscriptionsRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        write_array(out, &self.subscription_ids);
    }
}

impl BinaryDecode for DeleteSubscriptionsRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            subscription_ids: read_array(stream)?,
        })
    }
}

impl MessageBody for DeleteSubscriptionsRequest {
    const TYPE_ID: u32 = object_ids::DELETE_SUBSCRIPTIONS_REQUEST;
}

impl ServiceRequest for DeleteSubscriptionsRequest {
    type Response = DeleteSubscriptionsResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteSubscriptionsResponse {
    pub response_header: ResponseHeader,
    pub results: Vec<StatusCode>,
    pub diagnostic_infos: Vec<DiagnosticInfo>,
}

impl BinaryEncode for DeleteSubscriptionsResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
        write_array(out, &self.results);
        write_array(out, &self.diagnostic_infos);
    }
}

impl BinaryDecode for DeleteSubscriptionsResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
            results: read_array(stream)?,
            diagnostic_infos: read_array(stream)?,
        })
    }
}

impl MessageBody for DeleteSubscriptionsResponse {
    const TYPE_ID: u32 = object_ids::DELETE_SUBSCRIPTIONS_RESPONSE;
}

impl ServiceResponse for DeleteSubscriptionsResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

/// One acknowledged sequence number of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubscriptionAcknowledgement {
    pub subscription_id: u32,
    pub sequence_number: u32,
}

impl BinaryEncode for SubscriptionAcknowledgement {
    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32_le(self.subscription_id);
        out.put_u32_le(self.sequence_number);
    }
}

impl BinaryDecode for SubscriptionAcknowledgement {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            subscription_id: u32::decode(stream)?,
            sequence_number: u32::decode(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PublishRequest {
    pub request_header: RequestHeader,
    pub subscription_acknowledgements: Vec<SubscriptionAcknowledgement>,
}

impl BinaryEncode for PublishRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        write_array(out, &self.subscription_acknowledgements);
    }
}

impl BinaryDecode for PublishRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            subscription_acknowledgements: read_array(stream)?,
        })
    }
}

impl MessageBody for PublishRequest {
    const TYPE_ID: u32 = object_ids::PUBLISH_REQUEST;
}

impl ServiceRequest for PublishRequest {
    type Response = PublishResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

/// The batched notifications of one subscription.
///
/// A message with no notification data is a server-side keep-alive.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NotificationMessage {
    pub sequence_number: u32,
    pub publish_time: UaDateTime,
    pub notification_data: Vec<ExtensionObject>,
}

impl NotificationMessage {
    pub fn is_keep_alive(&self) -> bool {
        self.notification_data.is_empty()
    }
}

impl BinaryEncode for NotificationMessage {
    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32_le(self.sequence_number);
        self.publish_time.encode(out);
        write_array(out, &self.notification_data);
    }
}

impl BinaryDecode for NotificationMessage {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            sequence_number: u32::decode(stream)?,
            publish_time: UaDateTime::decode(stream)?,
            notification_data: read_array(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PublishResponse {
    pub response_header: ResponseHeader,
    /// The subscription this response belongs to; the demultiplexing key.
    pub subscription_id: u32,
    pub available_sequence_numbers: Vec<u32>,
    pub more_notifications: bool,
    pub notification_message: NotificationMessage,
    /// One status per acknowledgement sent in the request.
    pub results: Vec<StatusCode>,
    pub diagnostic_infos: Vec<DiagnosticInfo>,
}

impl BinaryEncode for PublishResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
        out.put_u32_le(self.subscription_id);
        write_array(out, &self.available_sequence_numbers);
        self.more_notifications.encode(out);
        self.notification_message.encode(out);
        write_array(out, &self.results);
        write_array(out, &self.diagnostic_infos);
    }
}

impl BinaryDecode for PublishResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
            subscription_id: u32::decode(stream)?,
            available_sequence_numbers: read_array(stream)?,
            more_notifications: bool::decode(stream)?,
            notification_message: NotificationMessage::decode(stream)?,
            results: read_array(stream)?,
            diagnostic_infos: read_array(stream)?,
        })
    }
}

impl MessageBody for PublishResponse {
    const TYPE_ID: u32 = object_ids::PUBLISH_RESPONSE;
}

impl ServiceResponse for PublishResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RepublishRequest {
    pub request_header: RequestHeader,
    pub subscription_id: u32,
    pub retransmit_sequence_number: u32,
}

impl BinaryEncode for RepublishRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        out.put_u32_le(self.subscription_id);
        out.put_u32_le(self.retransmit_sequence_number);
    }
}

impl BinaryDecode for RepublishRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            subscription_id: u32::decode(stream)?,
            retransmit_sequence_number: u32::decode(stream)?,
        })
    }
}

impl MessageBody for RepublishRequest {
    const TYPE_ID: u32 = object_ids::REPUBLISH_REQUEST;
}

impl ServiceRequest for RepublishRequest {
    type Response = RepublishResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RepublishResponse {
    pub response_header: ResponseHeader,
    pub notification_message: NotificationMessage,
}

impl BinaryEncode for RepublishResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
        self.notification_message.encode(out);
    }
}

impl BinaryDecode for RepublishResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
            notification_message: NotificationMessage::decode(stream)?,
        })
    }
}

impl MessageBody for RepublishResponse {
    const TYPE_ID: u32 = object_ids::REPUBLISH_RESPONSE;
}

impl ServiceResponse for RepublishResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

/// One changed value, keyed by the client handle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitoredItemNotification {
    pub client_handle: u32,
    pub value: DataValue,
}

impl BinaryEncode for MonitoredItemNotification {
    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32_le(self.client_handle);
        self.value.encode(out);
    }
}

impl BinaryDecode for MonitoredItemNotification {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            client_handle: u32::decode(stream)?,
            value: DataValue::decode(stream)?,
        })
    }
}

/// Data-change payload inside a NotificationMessage.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataChangeNotification {
    pub monitored_items: Vec<MonitoredItemNotification>,
    pub diagnostic_infos: Vec<DiagnosticInfo>,
}

impl BinaryEncode for DataChangeNotification {
    fn encode(&self, out: &mut Vec<u8>) {
        write_array(out, &self.monitored_items);
        write_array(out, &self.diagnostic_infos);
    }
}

impl BinaryDecode for DataChangeNotification {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            monitored_items: read_array(stream)?,
            diagnostic_infos: read_array(stream)?,
        })
    }
}

impl MessageBody for DataChangeNotification {
    const TYPE_ID: u32 = object_ids::DATA_CHANGE_NOTIFICATION;
}

/// One fired event: the client handle plus the selected field values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventFieldList {
    pub client_handle: u32,
    pub event_fields: Vec<Variant>,
}

impl BinaryEncode for EventFieldList {
    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32_le(self.client_handle);
        write_array(out, &self.event_fields);
    }
}

impl BinaryDecode for EventFieldList {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            client_handle: u32::decode(stream)?,
            event_fields: read_array(stream)?,
        })
    }
}

/// Event payload inside a NotificationMessage.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventNotificationList {
    pub events: Vec<EventFieldList>,
}

impl BinaryEncode for EventNotificationList {
    fn encode(&self, out: &mut Vec<u8>) {
        write_array(out, &self.events);
    }
}

impl BinaryDecode for EventNotificationList {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            events: read_array(stream)?,
        })
    }
}

impl MessageBody for EventNotificationList {
    const TYPE_ID: u32 = object_ids::EVENT_NOTIFICATION_LIST;
}

/// Status-change payload, e.g. when the server times a subscription out.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusChangeNotification {
    pub status: StatusCode,
    pub diagnostic_info: DiagnosticInfo,
}

impl BinaryEncode for StatusChangeNotification {
    fn encode(&self, out: &mut Vec<u8>) {
        self.status.encode(out);
        self.diagnostic_info.encode(out);
    }
}

impl BinaryDecode for StatusChangeNotification {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            status: StatusCode::decode(stream)?,
            diagnostic_info: DiagnosticInfo::decode(stream)?,
        })
    }
}

impl MessageBody for StatusChangeNotification {
    const TYPE_ID: u32 = object_ids::STATUS_CHANGE_NOTIFICATION;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_subscription_roundtrip() {
        let req = CreateSubscriptionRequest {
            request_header: RequestHeader::new(20, 0),
            requested_publishing_interval: 500.0,
            requested_lifetime_count: 60,
            requested_max_keep_alive_count: 10,
            max_notifications_per_publish: 0,
            publishing_enabled: true,
            priority: 0,
        };
        let mut out = Vec::new();
        req.encode(&mut out);
        let mut stream = out.as_slice();
        assert_eq!(CreateSubscriptionRequest::decode(&mut stream).unwrap(), req);
    }

    #[test]
    fn publish_response_with_data_change() {
        let change = DataChangeNotification {
            monitored_items: vec![MonitoredItemNotification {
                client_handle: 42,
                value: DataValue::new(Variant::Int32(5)),
            }],
            diagnostic_infos: Vec::new(),
        };
        let resp = PublishResponse {
            subscription_id: 9,
            available_sequence_numbers: vec![3],
            more_notifications: false,
            notification_message: NotificationMessage {
                sequence_number: 3,
                publish_time: UaDateTime(77),
                notification_data: vec![ExtensionObject::from_message(
                    DataChangeNotification::TYPE_ID,
                    &change,
                )],
            },
            ..Default::default()
        };
        let mut out = Vec::new();
        resp.encode(&mut out);

        let mut stream = out.as_slice();
        let decoded = PublishResponse::decode(&mut stream).unwrap();
        assert_eq!(decoded, resp);
        assert!(!decoded.notification_message.is_keep_alive());

        let inner: DataChangeNotification = decoded.notification_message.notification_data[0]
            .decode_body_as(DataChangeNotification::TYPE_ID)
            .unwrap()
            .unwrap();
        assert_eq!(inner, change);
    }

    #[test]
    fn keep_alive_message_has_no_data() {
        let msg = NotificationMessage {
            sequence_number: 12,
            publish_time: UaDateTime(1),
            notification_data: Vec::new(),
        };
        assert!(msg.is_keep_alive());

        let mut out = Vec::new();
        msg.encode(&mut out);
        let mut stream = out.as_slice();
        assert_eq!(NotificationMessage::decode(&mut stream).unwrap(), msg);
    }

    #[test]
    fn event_notification_roundtrip() {
        let events = EventNotificationList {
            events: vec![EventFieldList {
                client_handle: 7,
                event_fields: vec![Variant::String("alarm".into()), Variant::UInt16(900)],
            }],
        };
        let mut out = Vec::new();
        events.encode(&mut out);
        let mut stream = out.as_slice();
        assert_eq!(EventNotificationList::decode(&mut stream).unwrap(), events);
    }

    #[test]
    fn acknowledgement_roundtrip() {
        let req = PublishRequest {
            request_header: RequestHeader::new(21, 0),
            subscription_acknowledgements: vec![
                SubscriptionAcknowledgement {
                    subscription_id: 9,
                    sequence_number: 3,
                },
                SubscriptionAcknowledgement {
                    subscription_id: 9,
                    sequence_number: 4,
                },
            ],
        };
        let mut out = Vec::new();
        req.encode(&mut out);
        let mut stream = out.as_slice();
        assert_eq!(PublishRequest::decode(&mut stream).unwrap(), req);
    }
}
