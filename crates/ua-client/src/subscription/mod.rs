//! Subscriptions and monitored items
//!
//! The server object is mirrored by [`Subscription`]; a session-wide
//! [`SubscriptionSet`] demultiplexes publish responses by subscription id
//! and routes each notification to its monitored item by client handle.
//! Applications consume typed channels, not callbacks: every monitored
//! item hands out an mpsc receiver of [`Notification`], every subscription
//! one of [`SubscriptionEvent`].
//!
//! Acknowledgements ride on the next PublishRequest. The queue is bounded
//! with oldest-first eviction; an ack is enqueued only after its
//! notification message was processed, never for a keep-alive, never
//! twice.

use crate::error::Result;
use crate::session::Session;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use ua_types::service::attribute::TimestampsToReturn;
use ua_types::service::monitored_item::{
    CreateMonitoredItemsRequest, DeleteMonitoredItemsRequest, ModifyMonitoredItemsRequest,
    MonitoredItemCreateRequest, MonitoredItemModifyResult, MonitoringMode, MonitoringParameters,
    SetMonitoringModeRequest,
};
use ua_types::service::subscription::{
    CreateSubscriptionRequest, DataChangeNotification, DeleteSubscriptionsRequest,
    EventNotificationList, ModifySubscriptionRequest, NotificationMessage, PublishRequest,
    PublishResponse, RepublishRequest, SetPublishingModeRequest, StatusChangeNotification,
    SubscriptionAcknowledgement,
};
use ua_types::service::MessageBody;
use ua_types::{DataValue, StatusCode, Variant};

/// Bound on queued, not-yet-sent acknowledgements.
const MAX_PENDING_ACKS: usize = 100;

/// Publish failures tolerated before the connection counts as lost.
const MAX_MISSED_PUBLISHES: u32 = 3;

/// Requested subscription parameters.
#[derive(Debug, Clone)]
pub struct SubscriptionParams {
    pub publishing_interval_ms: f64,
    pub lifetime_count: u32,
    pub max_keep_alive_count: u32,
    /// 0 lets the server choose.
    pub max_notifications_per_publish: u32,
    pub priority: u8,
    pub publishing_enabled: bool,
}

impl Default for SubscriptionParams {
    fn default() -> Self {
        Self {
            publishing_interval_ms: 500.0,
            lifetime_count: 60,
            max_keep_alive_count: 10,
            max_notifications_per_publish: 0,
            priority: 0,
            publishing_enabled: true,
        }
    }
}

/// What a monitored item receives.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    DataChange(DataValue),
    Event(Vec<Variant>),
}

/// Out-of-band subscription state changes.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    /// The server confirmed liveness with consecutive empty publishes.
    KeepAlive { subscription_id: u32 },
    /// The server reported a status change for the subscription.
    StatusChange {
        subscription_id: u32,
        status: StatusCode,
    },
    /// Publishing kept failing past the keep-alive window; typically
    /// hooked to reconnect.
    ConnectionLost { subscription_id: u32 },
}

/// Values the server revised on create/modify.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevisedValues {
    pub publishing_interval_ms: f64,
    pub lifetime_count: u32,
    pub max_keep_alive_count: u32,
}

struct ItemSlot {
    monitored_item_id: u32,
    sender: mpsc::UnboundedSender<Notification>,
}

/// The client mirror of one server-side subscription.
pub struct Subscription {
    id: u32,
    revised: Mutex<RevisedValues>,
    items: Mutex<HashMap<u32, ItemSlot>>,
    next_client_handle: AtomicU32,
    consecutive_keep_alives: AtomicU32,
    keep_alive_event_sent: AtomicBool,
    connection_lost_sent: AtomicBool,
    events: mpsc::UnboundedSender<SubscriptionEvent>,
}

impl Subscription {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn revised(&self) -> RevisedValues {
        *self.revised.lock().unwrap()
    }

    /// Milliseconds after which silence means the keep-alive window was
    /// missed.
    fn keep_alive_window(&self) -> Duration {
        let revised = self.revised();
        let ms = revised.publishing_interval_ms * revised.max_keep_alive_count.max(1) as f64;
        Duration::from_millis(ms.max(1.0) as u64)
    }

    fn allocate_handle(&self) -> u32 {
        self.next_client_handle.fetch_add(1, Ordering::Relaxed)
    }

    /// An empty notification message proves liveness. After as many
    /// consecutive empties as the keep-alive count, one KeepAlive event
    /// fires; the counter re-arms on the next data-bearing message.
    fn note_keep_alive(&self) {
        let count = self.consecutive_keep_alives.fetch_add(1, Ordering::Relaxed) + 1;
        let threshold = self.revised().max_keep_alive_count.max(1);
        if count >= threshold && !self.keep_alive_event_sent.swap(true, Ordering::Relaxed) {
            let _ = self.events.send(SubscriptionEvent::KeepAlive {
                subscription_id: self.id,
            });
        }
    }

    fn note_data_bearing(&self) {
        self.consecutive_keep_alives.store(0, Ordering::Relaxed);
        self.keep_alive_event_sent.store(false, Ordering::Relaxed);
        self.connection_lost_sent.store(false, Ordering::Relaxed);
    }

    /// Route one notification message's payloads to the monitored items.
    fn route_message(&self, message: &NotificationMessage) {
        for object in &message.notification_data {
            match object.type_id.as_object_id() {
                Some(id) if id == DataChangeNotification::TYPE_ID => {
                    match object.decode_body_as::<DataChangeNotification>(id) {
                        Ok(Some(change)) => {
                            for item in change.monitored_items {
                                self.deliver(
                                    item.client_handle,
                                    Notification::DataChange(item.value),
                                );
                            }
                        }
                        Ok(None) | Err(_) => {
                            warn!(
                                subscription_id = self.id,
                                "undecodable data change notification skipped"
                            );
                        }
                    }
                }
                Some(id) if id == EventNotificationList::TYPE_ID => {
                    match object.decode_body_as::<EventNotificationList>(id) {
                        Ok(Some(list)) => {
                            for event in list.events {
                                self.deliver(
                                    event.client_handle,
                                    Notification::Event(event.event_fields),
                                );
                            }
                        }
                        Ok(None) | Err(_) => {
                            warn!(
                                subscription_id = self.id,
                                "undecodable event notification skipped"
                            );
                        }
                    }
                }
                Some(id) if id == StatusChangeNotification::TYPE_ID => {
                    if let Ok(Some(change)) =
                        object.decode_body_as::<StatusChangeNotification>(id)
                    {
                        let _ = self.events.send(SubscriptionEvent::StatusChange {
                            subscription_id: self.id,
                            status: change.status,
                        });
                    }
                }
                // Unknown notification kinds are skipped so newer servers
                // keep working.
                _ => trace!(
                    subscription_id = self.id,
                    type_id = %object.type_id,
                    "unknown notification type ignored"
                ),
            }
        }
    }

    fn deliver(&self, client_handle: u32, notification: Notification) {
        let items = self.items.lock().unwrap();
        match items.get(&client_handle) {
            Some(slot) => {
                // A dropped receiver just means the application stopped
                // listening to this item.
                let _ = slot.sender.send(notification);
            }
            None => warn!(
                subscription_id = self.id,
                client_handle, "notification for unknown client handle dropped"
            ),
        }
    }

    fn emit_connection_lost(&self) {
        if !self.connection_lost_sent.swap(true, Ordering::Relaxed) {
            let _ = self.events.send(SubscriptionEvent::ConnectionLost {
                subscription_id: self.id,
            });
        }
    }
}

/// A created monitored item: its ids, creation status, and the stream of
/// notifications routed to it.
pub struct MonitoredItemHandle {
    pub client_handle: u32,
    pub monitored_item_id: u32,
    pub status_code: StatusCode,
    pub receiver: mpsc::UnboundedReceiver<Notification>,
}

/// Session-wide registry: subscriptions by id plus the shared ack queue.
#[derive(Default)]
pub struct SubscriptionSet {
    subscriptions: Mutex<HashMap<u32, Arc<Subscription>>>,
    ack_queue: Mutex<VecDeque<SubscriptionAcknowledgement>>,
    missed_publishes: AtomicU32,
    last_success: Mutex<Option<Instant>>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, subscription_id: u32) -> Option<Arc<Subscription>> {
        self.subscriptions
            .lock()
            .unwrap()
            .get(&subscription_id)
            .cloned()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.subscriptions.lock().unwrap().keys().copied().collect()
    }

    fn insert(&self, subscription: Arc<Subscription>) {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(subscription.id, subscription);
    }

    fn remove(&self, subscription_id: u32) {
        self.subscriptions.lock().unwrap().remove(&subscription_id);
        // Acks for a deleted subscription would be rejected anyway.
        self.ack_queue
            .lock()
            .unwrap()
            .retain(|ack| ack.subscription_id != subscription_id);
    }

    /// Drain the queued acknowledgements for the next PublishRequest.
    fn take_acks(&self) -> Vec<SubscriptionAcknowledgement> {
        self.ack_queue.lock().unwrap().drain(..).collect()
    }

    /// Return unsent acks to the head of the queue after a failed publish.
    fn requeue_acks(&self, acks: Vec<SubscriptionAcknowledgement>) {
        let mut queue = self.ack_queue.lock().unwrap();
        for ack in acks.into_iter().rev() {
            queue.push_front(ack);
        }
        while queue.len() > MAX_PENDING_ACKS {
            queue.pop_back();
        }
    }

    fn enqueue_ack(&self, ack: SubscriptionAcknowledgement) {
        let mut queue = self.ack_queue.lock().unwrap();
        if queue.len() == MAX_PENDING_ACKS {
            queue.pop_front();
        }
        queue.push_back(ack);
    }

    #[cfg(test)]
    fn pending_acks(&self) -> Vec<SubscriptionAcknowledgement> {
        self.ack_queue.lock().unwrap().iter().copied().collect()
    }

    /// Route one publish response; returns the subscription it belonged
    /// to.
    pub fn route_response(&self, response: &PublishResponse) -> Option<Arc<Subscription>> {
        let Some(subscription) = self.get(response.subscription_id) else {
            warn!(
                subscription_id = response.subscription_id,
                "publish response for unknown subscription discarded"
            );
            return None;
        };

        let message = &response.notification_message;
        if message.is_keep_alive() {
            subscription.note_keep_alive();
        } else {
            subscription.note_data_bearing();
            subscription.route_message(message);
            self.enqueue_ack(SubscriptionAcknowledgement {
                subscription_id: response.subscription_id,
                sequence_number: message.sequence_number,
            });
        }
        Some(subscription)
    }

    fn note_publish_success(&self) {
        self.missed_publishes.store(0, Ordering::Relaxed);
        *self.last_success.lock().unwrap() = Some(Instant::now());
    }

    fn note_publish_failure(&self) {
        let missed = self.missed_publishes.fetch_add(1, Ordering::Relaxed) + 1;
        if missed < MAX_MISSED_PUBLISHES {
            return;
        }
        let last = *self.last_success.lock().unwrap();
        let subscriptions: Vec<Arc<Subscription>> = {
            self.subscriptions.lock().unwrap().values().cloned().collect()
        };
        for subscription in subscriptions {
            let window = subscription.keep_alive_window();
            let overdue = match last {
                Some(last) => last.elapsed() > window,
                None => true,
            };
            if overdue {
                subscription.emit_connection_lost();
            }
        }
    }

    /// A deadline generous enough for the slowest subscription's
    /// keep-alive cadence.
    fn publish_timeout(&self, floor: Duration) -> Duration {
        let longest = self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .map(|subscription| subscription.keep_alive_window())
            .max()
            .unwrap_or(Duration::ZERO);
        floor.max(longest * 2)
    }
}

impl Session {
    pub fn subscriptions(&self) -> &SubscriptionSet {
        &self.subscription_set
    }

    /// Create a subscription; returns the mirror plus its event stream.
    pub async fn create_subscription(
        &self,
        params: SubscriptionParams,
    ) -> Result<(
        Arc<Subscription>,
        mpsc::UnboundedReceiver<SubscriptionEvent>,
    )> {
        let request = CreateSubscriptionRequest {
            requested_publishing_interval: params.publishing_interval_ms,
            requested_lifetime_count: params.lifetime_count,
            requested_max_keep_alive_count: params.max_keep_alive_count,
            max_notifications_per_publish: params.max_notifications_per_publish,
            publishing_enabled: params.publishing_enabled,
            priority: params.priority,
            ..Default::default()
        };
        let response = self.dispatch(request).await?;

        let (events, event_receiver) = mpsc::unbounded_channel();
        let subscription = Arc::new(Subscription {
            id: response.subscription_id,
            revised: Mutex::new(RevisedValues {
                publishing_interval_ms: response.revised_publishing_interval,
                lifetime_count: response.revised_lifetime_count,
                max_keep_alive_count: response.revised_max_keep_alive_count,
            }),
            items: Mutex::new(HashMap::new()),
            next_client_handle: AtomicU32::new(1),
            consecutive_keep_alives: AtomicU32::new(0),
            keep_alive_event_sent: AtomicBool::new(false),
            connection_lost_sent: AtomicBool::new(false),
            events,
        });
        self.subscription_set.insert(Arc::clone(&subscription));
        debug!(
            subscription_id = subscription.id,
            interval_ms = response.revised_publishing_interval,
            "subscription created"
        );
        Ok((subscription, event_receiver))
    }

    /// Modify a subscription's timing; the revised values are stored on
    /// the mirror.
    pub async fn modify_subscription(
        &self,
        subscription: &Subscription,
        params: SubscriptionParams,
    ) -> Result<RevisedValues> {
        let request = ModifySubscriptionRequest {
            subscription_id: subscription.id,
            requested_publishing_interval: params.publishing_interval_ms,
            requested_lifetime_count: params.lifetime_count,
            requested_max_keep_alive_count: params.max_keep_alive_count,
            max_notifications_per_publish: params.max_notifications_per_publish,
            priority: params.priority,
            ..Default::default()
        };
        let response = self.dispatch(request).await?;
        let revised = RevisedValues {
            publishing_interval_ms: response.revised_publishing_interval,
            lifetime_count: response.revised_lifetime_count,
            max_keep_alive_count: response.revised_max_keep_alive_count,
        };
        *subscription.revised.lock().unwrap() = revised;
        Ok(revised)
    }

    /// Enable or disable publishing for a set of subscriptions. The
    /// server's answer is returned, not mirrored.
    pub async fn set_publishing_mode(
        &self,
        subscription_ids: Vec<u32>,
        publishing_enabled: bool,
    ) -> Result<Vec<StatusCode>> {
        let request = SetPublishingModeRequest {
            publishing_enabled,
            subscription_ids,
            ..Default::default()
        };
        Ok(self.dispatch(request).await?.results)
    }

    /// Delete subscriptions and drop their mirrors.
    pub async fn delete_subscriptions(
        &self,
        subscription_ids: Vec<u32>,
    ) -> Result<Vec<StatusCode>> {
        let request = DeleteSubscriptionsRequest {
            subscription_ids: subscription_ids.clone(),
            ..Default::default()
        };
        let result = self.dispatch(request).await;
        // Mirrors go regardless; the server reaps its side on session
        // close anyway.
        for id in subscription_ids {
            self.subscription_set.remove(id);
        }
        Ok(result?.results)
    }

    /// Best-effort deletion of every known subscription; failures are
    /// swallowed.
    pub async fn delete_all_subscriptions(&self) {
        let ids = self.subscription_set.ids();
        if ids.is_empty() {
            return;
        }
        if let Err(err) = self.delete_subscriptions(ids).await {
            debug!(error = %err, "best-effort subscription deletion failed");
        }
    }

    /// Create monitored items for the Value attribute with client-chosen
    /// handles assigned automatically. Batched by
    /// MaxMonitoredItemsPerCall.
    pub async fn create_monitored_items(
        &self,
        subscription: &Arc<Subscription>,
        items: Vec<ua_types::service::attribute::ReadValueId>,
        sampling_interval_ms: f64,
        queue_size: u32,
    ) -> Result<Vec<MonitoredItemHandle>> {
        self.ensure_activated()?;
        let limit = self.operation_limits().await?.max_monitored_items_per_call;

        let mut handles = Vec::with_capacity(items.len());
        for batch in crate::session::limits::split_batches(items, limit) {
            if batch.is_empty() {
                continue;
            }
            let mut pending = Vec::with_capacity(batch.len());
            let items_to_create = batch
                .into_iter()
                .map(|item_to_monitor| {
                    let client_handle = subscription.allocate_handle();
                    let (sender, receiver) = mpsc::unbounded_channel();
                    pending.push((client_handle, sender, receiver));
                    MonitoredItemCreateRequest {
                        item_to_monitor,
                        monitoring_mode: MonitoringMode::Reporting,
                        requested_parameters: MonitoringParameters {
                            client_handle,
                            sampling_interval: sampling_interval_ms,
                            queue_size,
                            ..Default::default()
                        },
                    }
                })
                .collect();

            let request = CreateMonitoredItemsRequest {
                subscription_id: subscription.id,
                timestamps_to_return: TimestampsToReturn::Both,
                items_to_create,
                ..Default::default()
            };
            let response = self.channel().dispatch(request).await?;

            for ((client_handle, sender, receiver), result) in
                pending.into_iter().zip(response.results)
            {
                if result.status_code.is_good() {
                    subscription.items.lock().unwrap().insert(
                        client_handle,
                        ItemSlot {
                            monitored_item_id: result.monitored_item_id,
                            sender,
                        },
                    );
                }
                handles.push(MonitoredItemHandle {
                    client_handle,
                    monitored_item_id: result.monitored_item_id,
                    status_code: result.status_code,
                    receiver,
                });
            }
        }
        Ok(handles)
    }

    /// Modify monitoring parameters of existing items.
    pub async fn modify_monitored_items(
        &self,
        subscription: &Subscription,
        items_to_modify: Vec<ua_types::service::monitored_item::MonitoredItemModifyRequest>,
    ) -> Result<Vec<MonitoredItemModifyResult>> {
        let request = ModifyMonitoredItemsRequest {
            subscription_id: subscription.id,
            timestamps_to_return: TimestampsToReturn::Both,
            items_to_modify,
            ..Default::default()
        };
        Ok(self.dispatch(request).await?.results)
    }

    /// Switch items between disabled/sampling/reporting.
    pub async fn set_monitoring_mode(
        &self,
        subscription: &Subscription,
        monitoring_mode: MonitoringMode,
        monitored_item_ids: Vec<u32>,
    ) -> Result<Vec<StatusCode>> {
        let request = SetMonitoringModeRequest {
            subscription_id: subscription.id,
            monitoring_mode,
            monitored_item_ids,
            ..Default::default()
        };
        Ok(self.dispatch(request).await?.results)
    }

    /// Delete monitored items and drop their routing slots.
    pub async fn delete_monitored_items(
        &self,
        subscription: &Subscription,
        monitored_item_ids: Vec<u32>,
    ) -> Result<Vec<StatusCode>> {
        let request = DeleteMonitoredItemsRequest {
            subscription_id: subscription.id,
            monitored_item_ids: monitored_item_ids.clone(),
            ..Default::default()
        };
        let response = self.dispatch(request).await?;
        let mut items = subscription.items.lock().unwrap();
        items.retain(|_, slot| !monitored_item_ids.contains(&slot.monitored_item_id));
        Ok(response.results)
    }

    /// One publish round-trip: send the queued acks, await a notification
    /// message, route it. The intended suspension point of a
    /// subscription-driven application.
    pub async fn publish(&self) -> Result<()> {
        self.ensure_activated()?;
        let acks = self.subscription_set.take_acks();
        let request = PublishRequest {
            subscription_acknowledgements: acks.clone(),
            ..Default::default()
        };
        let timeout = self
            .subscription_set
            .publish_timeout(self.channel().config().request_timeout);

        match self.channel().dispatch_within(request, timeout).await {
            Ok(response) => {
                self.subscription_set.note_publish_success();
                for (ack, result) in acks.iter().zip(response.results.iter()) {
                    if result.is_bad() {
                        debug!(
                            subscription_id = ack.subscription_id,
                            sequence_number = ack.sequence_number,
                            status = %result,
                            "acknowledgement rejected"
                        );
                    }
                }
                self.subscription_set.route_response(&response);
                Ok(())
            }
            Err(err) => {
                // The server never saw these acks; they go back to the
                // front of the queue.
                self.subscription_set.requeue_acks(acks);
                self.subscription_set.note_publish_failure();
                Err(err)
            }
        }
    }

    /// Recover a missed notification message by sequence number.
    pub async fn republish(
        &self,
        subscription_id: u32,
        retransmit_sequence_number: u32,
    ) -> Result<NotificationMessage> {
        let request = RepublishRequest {
            subscription_id,
            retransmit_sequence_number,
            ..Default::default()
        };
        let response = self.dispatch(request).await?;
        if let Some(subscription) = self.subscription_set.get(subscription_id) {
            subscription.route_message(&response.notification_message);
        }
        Ok(response.notification_message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ua_types::service::subscription::MonitoredItemNotification;
    use ua_types::ExtensionObject;

    fn test_subscription(
        id: u32,
        max_keep_alive: u32,
    ) -> (
        Arc<Subscription>,
        mpsc::UnboundedReceiver<SubscriptionEvent>,
    ) {
        let (events, receiver) = mpsc::unbounded_channel();
        let subscription = Arc::new(Subscription {
            id,
            revised: Mutex::new(RevisedValues {
                publishing_interval_ms: 100.0,
                lifetime_count: 60,
                max_keep_alive_count: max_keep_alive,
            }),
            items: Mutex::new(HashMap::new()),
            next_client_handle: AtomicU32::new(1),
            consecutive_keep_alives: AtomicU32::new(0),
            keep_alive_event_sent: AtomicBool::new(false),
            connection_lost_sent: AtomicBool::new(false),
            events,
        });
        (subscription, receiver)
    }

    fn attach_item(
        subscription: &Subscription,
        client_handle: u32,
    ) -> mpsc::UnboundedReceiver<Notification> {
        let (sender, receiver) = mpsc::unbounded_channel();
        subscription.items.lock().unwrap().insert(
            client_handle,
            ItemSlot {
                monitored_item_id: client_handle + 1000,
                sender,
            },
        );
        receiver
    }

    fn data_change_response(
        subscription_id: u32,
        sequence_number: u32,
        changes: Vec<(u32, i32)>,
    ) -> PublishResponse {
        let change = DataChangeNotification {
            monitored_items: changes
                .into_iter()
                .map(|(client_handle, value)| MonitoredItemNotification {
                    client_handle,
                    value: DataValue::new(Variant::Int32(value)),
                })
                .collect(),
            diagnostic_infos: Vec::new(),
        };
        PublishResponse {
            subscription_id,
            notification_message: NotificationMessage {
                sequence_number,
                notification_data: vec![ExtensionObject::from_message(
                    DataChangeNotification::TYPE_ID,
                    &change,
                )],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn keep_alive_response(subscription_id: u32, sequence_number: u32) -> PublishResponse {
        PublishResponse {
            subscription_id,
            notification_message: NotificationMessage {
                sequence_number,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn data_changes_route_by_client_handle() {
        let set = SubscriptionSet::new();
        let (subscription, _events) = test_subscription(9, 10);
        let mut first = attach_item(&subscription, 1);
        let mut second = attach_item(&subscription, 2);
        set.insert(Arc::clone(&subscription));

        set.route_response(&data_change_response(9, 3, vec![(1, 11), (2, 22), (1, 12)]));

        assert_eq!(
            first.try_recv().unwrap(),
            Notification::DataChange(DataValue::new(Variant::Int32(11)))
        );
        assert_eq!(
            first.try_recv().unwrap(),
            Notification::DataChange(DataValue::new(Variant::Int32(12)))
        );
        assert_eq!(
            second.try_recv().unwrap(),
            Notification::DataChange(DataValue::new(Variant::Int32(22)))
        );
        assert!(first.try_recv().is_err());
    }

    #[test]
    fn acks_follow_processed_notifications_only() {
        let set = SubscriptionSet::new();
        let (subscription, _events) = test_subscription(9, 10);
        let _item = attach_item(&subscription, 1);
        set.insert(subscription);

        // A keep-alive is not acknowledged.
        set.route_response(&keep_alive_response(9, 7));
        assert!(set.pending_acks().is_empty());

        // A data-bearing message is acknowledged exactly once.
        set.route_response(&data_change_response(9, 8, vec![(1, 1)]));
        let acks = set.pending_acks();
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].subscription_id, 9);
        assert_eq!(acks[0].sequence_number, 8);

        // Taking the queue empties it; nothing is emitted twice.
        let taken = set.take_acks();
        assert_eq!(taken.len(), 1);
        assert!(set.pending_acks().is_empty());
    }

    #[test]
    fn unknown_subscription_response_is_discarded() {
        let set = SubscriptionSet::new();
        assert!(set.route_response(&keep_alive_response(404, 1)).is_none());
        assert!(set.pending_acks().is_empty());
    }

    #[test]
    fn ack_queue_is_bounded_oldest_first() {
        let set = SubscriptionSet::new();
        let (subscription, _events) = test_subscription(1, 10);
        let _item = attach_item(&subscription, 1);
        set.insert(subscription);

        for sequence in 0..(MAX_PENDING_ACKS as u32 + 10) {
            set.route_response(&data_change_response(1, sequence, vec![(1, 0)]));
        }
        let acks = set.pending_acks();
        assert_eq!(acks.len(), MAX_PENDING_ACKS);
        // The oldest ten were evicted.
        assert_eq!(acks[0].sequence_number, 10);
        assert_eq!(acks.last().unwrap().sequence_number, MAX_PENDING_ACKS as u32 + 9);
    }

    #[test]
    fn requeue_preserves_order() {
        let set = SubscriptionSet::new();
        let (subscription, _events) = test_subscription(1, 10);
        let _item = attach_item(&subscription, 1);
        set.insert(subscription);

        set.route_response(&data_change_response(1, 1, vec![(1, 0)]));
        set.route_response(&data_change_response(1, 2, vec![(1, 0)]));
        let taken = set.take_acks();
        set.route_response(&data_change_response(1, 3, vec![(1, 0)]));
        set.requeue_acks(taken);

        let sequences: Vec<u32> = set
            .pending_acks()
            .iter()
            .map(|ack| ack.sequence_number)
            .collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn keep_alive_event_fires_once_and_rearms_on_data() {
        let set = SubscriptionSet::new();
        let (subscription, mut events) = test_subscription(5, 3);
        let _item = attach_item(&subscription, 1);
        set.insert(subscription);

        // Two empties: below the threshold, no event.
        set.route_response(&keep_alive_response(5, 1));
        set.route_response(&keep_alive_response(5, 2));
        assert!(events.try_recv().is_err());

        // Third empty crosses the threshold: exactly one event.
        set.route_response(&keep_alive_response(5, 3));
        assert_eq!(
            events.try_recv().unwrap(),
            SubscriptionEvent::KeepAlive { subscription_id: 5 }
        );
        set.route_response(&keep_alive_response(5, 4));
        assert!(events.try_recv().is_err(), "keep-alive event must not repeat");

        // A data-bearing publish resets the counter; the cycle restarts.
        set.route_response(&data_change_response(5, 5, vec![(1, 1)]));
        set.route_response(&keep_alive_response(5, 6));
        set.route_response(&keep_alive_response(5, 7));
        set.route_response(&keep_alive_response(5, 8));
        assert_eq!(
            events.try_recv().unwrap(),
            SubscriptionEvent::KeepAlive { subscription_id: 5 }
        );
    }

    #[test]
    fn connection_lost_after_missed_publishes() {
        let set = SubscriptionSet::new();
        let (subscription, mut events) = test_subscription(2, 1);
        set.insert(subscription);

        // Never any successful publish: the window counts as overdue.
        for _ in 0..MAX_MISSED_PUBLISHES {
            set.note_publish_failure();
        }
        assert_eq!(
            events.try_recv().unwrap(),
            SubscriptionEvent::ConnectionLost { subscription_id: 2 }
        );
        // Not re-emitted while still down.
        set.note_publish_failure();
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn unknown_notification_types_are_ignored() {
        let set = SubscriptionSet::new();
        let (subscription, _events) = test_subscription(7, 10);
        let mut item = attach_item(&subscription, 1);
        set.insert(subscription);

        let response = PublishResponse {
            subscription_id: 7,
            notification_message: NotificationMessage {
                sequence_number: 1,
                notification_data: vec![ExtensionObject {
                    type_id: ua_types::NodeId::numeric(1, 9999),
                    body: ua_types::ExtensionBody::Binary(vec![1, 2, 3]),
                }],
                ..Default::default()
            },
            ..Default::default()
        };
        set.route_response(&response);
        assert!(item.try_recv().is_err());
        // Still data-bearing from the protocol's view: it is acknowledged.
        assert_eq!(set.pending_acks().len(), 1);
    }
}
