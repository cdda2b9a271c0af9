//! Server operation limits and auto-batching
//!
//! The ServerCapabilities/OperationLimits variables advertise how many
//! operations one request may carry. They are read once on first need and
//! cached for the session's lifetime; 0 (or an unreadable node) means
//! unlimited.

use super::Session;
use crate::error::Result;
use tracing::debug;
use ua_types::ids::operation_limits;
use ua_types::service::attribute::ReadValueId;
use ua_types::{NodeId, Variant};

/// Cached per-service operation limits; 0 = unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationLimits {
    pub max_nodes_per_read: u32,
    pub max_nodes_per_write: u32,
    pub max_nodes_per_method_call: u32,
    pub max_nodes_per_browse: u32,
    pub max_nodes_per_register_nodes: u32,
    pub max_nodes_per_translate_browse_paths: u32,
    pub max_monitored_items_per_call: u32,
}

/// The well-known limit nodes, in the order `fetch` reads them.
const LIMIT_NODES: [u32; 7] = [
    operation_limits::MAX_NODES_PER_READ,
    operation_limits::MAX_NODES_PER_WRITE,
    operation_limits::MAX_NODES_PER_METHOD_CALL,
    operation_limits::MAX_NODES_PER_BROWSE,
    operation_limits::MAX_NODES_PER_REGISTER_NODES,
    operation_limits::MAX_NODES_PER_TRANSLATE_BROWSE_PATHS,
    operation_limits::MAX_MONITORED_ITEMS_PER_CALL,
];

impl Session {
    /// The server's operation limits, fetched lazily and cached.
    pub async fn operation_limits(&self) -> Result<OperationLimits> {
        let mut cached = self.limits.lock().await;
        if let Some(limits) = *cached {
            return Ok(limits);
        }

        // This read must not recurse into batching.
        let nodes = LIMIT_NODES
            .iter()
            .map(|id| ReadValueId::value_of(NodeId::numeric(0, *id)))
            .collect();
        let results = self.read_batch(nodes).await?;

        let mut values = [0u32; 7];
        for (slot, result) in values.iter_mut().zip(results.iter()) {
            // Unreadable or oddly-typed limits count as unlimited.
            if result.is_good()
                && let Some(value) = result.value.as_ref().and_then(Variant::as_u32)
            {
                *slot = value;
            }
        }

        let limits = OperationLimits {
            max_nodes_per_read: values[0],
            max_nodes_per_write: values[1],
            max_nodes_per_method_call: values[2],
            max_nodes_per_browse: values[3],
            max_nodes_per_register_nodes: values[4],
            max_nodes_per_translate_browse_paths: values[5],
            max_monitored_items_per_call: values[6],
        };
        debug!(?limits, "operation limits cached");
        *cached = Some(limits);
        Ok(limits)
    }
}

/// Split `items` into ceil(n / limit) ordered batches of at most `limit`
/// elements; a limit of 0 yields one batch.
pub(crate) fn split_batches<T>(items: Vec<T>, limit: u32) -> Vec<Vec<T>> {
    if limit == 0 || items.len() <= limit as usize {
        return vec![items];
    }
    let limit = limit as usize;
    let mut batches = Vec::with_capacity(items.len().div_ceil(limit));
    let mut items = items.into_iter();
    loop {
        let batch: Vec<T> = items.by_ref().take(limit).collect();
        if batch.is_empty() {
            break;
        }
        batches.push(batch);
    }
    batches
}
