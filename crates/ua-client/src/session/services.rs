//! Typed service wrappers
//!
//! Thin request builders over channel dispatch. Read, Write and
//! RegisterNodes split transparently into batches when the server
//! advertises operation limits (see [`super::limits`]).

use super::Session;
use crate::channel::SecureChannel;
use crate::error::{Error, Result};
use std::sync::Arc;
use tracing::debug;
use ua_types::ids::attribute_ids;
use ua_types::service::attribute::{
    HistoryReadRequest, HistoryReadResult, HistoryReadValueId, ReadRawModifiedDetails,
    ReadRequest, ReadValueId, TimestampsToReturn, WriteRequest, WriteValue,
};
use ua_types::service::discovery::GetEndpointsRequest;
use ua_types::service::method::{CallMethodRequest, CallMethodResult, CallRequest};
use ua_types::service::session::EndpointDescription;
use ua_types::service::view::{
    BrowseDescription, BrowseNextRequest, BrowsePath, BrowsePathResult, BrowseRequest,
    BrowseResult, TranslateBrowsePathsRequest, ViewDescription,
};
use ua_types::service::MessageBody;
use ua_types::{
    DataValue, DynamicStructure, ExtensionObject, NodeId, StatusCode, StructureDefinition,
    Variant,
};

/// GetEndpoints needs no session; any open channel will do.
pub async fn get_endpoints(channel: &Arc<SecureChannel>) -> Result<Vec<EndpointDescription>> {
    let request = GetEndpointsRequest {
        endpoint_url: channel.config().endpoint_url.clone(),
        ..Default::default()
    };
    Ok(channel.dispatch(request).await?.endpoints)
}

impl Session {
    /// Read attribute values, splitting into batches of at most
    /// MaxNodesPerRead.
    pub async fn read(&self, nodes_to_read: Vec<ReadValueId>) -> Result<Vec<DataValue>> {
        self.ensure_activated()?;
        let limit = self.operation_limits().await?.max_nodes_per_read;
        let mut results = Vec::with_capacity(nodes_to_read.len());
        for batch in super::limits::split_batches(nodes_to_read, limit) {
            results.extend(self.read_batch(batch).await?);
        }
        Ok(results)
    }

    pub(crate) async fn read_batch(
        &self,
        nodes_to_read: Vec<ReadValueId>,
    ) -> Result<Vec<DataValue>> {
        if nodes_to_read.is_empty() {
            return Ok(Vec::new());
        }
        let request = ReadRequest {
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read,
            ..Default::default()
        };
        Ok(self.channel().dispatch(request).await?.results)
    }

    /// Read the Value attribute of a list of nodes.
    pub async fn read_values(&self, node_ids: Vec<NodeId>) -> Result<Vec<DataValue>> {
        self.read(node_ids.into_iter().map(ReadValueId::value_of).collect())
            .await
    }

    /// Write attribute values, splitting into batches of at most
    /// MaxNodesPerWrite. Per-node results come back in request order.
    pub async fn write(&self, nodes_to_write: Vec<WriteValue>) -> Result<Vec<StatusCode>> {
        self.ensure_activated()?;
        let limit = self.operation_limits().await?.max_nodes_per_write;
        let mut results = Vec::with_capacity(nodes_to_write.len());
        for batch in super::limits::split_batches(nodes_to_write, limit) {
            let request = WriteRequest {
                nodes_to_write: batch,
                ..Default::default()
            };
            results.extend(self.channel().dispatch(request).await?.results);
        }
        Ok(results)
    }

    /// One Browse call; managed continuation lives in [`super::browse`].
    pub async fn browse(
        &self,
        nodes_to_browse: Vec<BrowseDescription>,
        max_references_per_node: u32,
    ) -> Result<Vec<BrowseResult>> {
        let request = BrowseRequest {
            view: ViewDescription::default(),
            requested_max_references_per_node: max_references_per_node,
            nodes_to_browse,
            ..Default::default()
        };
        Ok(self.dispatch(request).await?.results)
    }

    /// One BrowseNext call with explicit release control.
    pub async fn browse_next(
        &self,
        continuation_points: Vec<Vec<u8>>,
        release_continuation_points: bool,
    ) -> Result<Vec<BrowseResult>> {
        let request = BrowseNextRequest {
            release_continuation_points,
            continuation_points,
            ..Default::default()
        };
        Ok(self.dispatch(request).await?.results)
    }

    /// Call methods; per-call results in request order.
    pub async fn call(
        &self,
        methods_to_call: Vec<CallMethodRequest>,
    ) -> Result<Vec<CallMethodResult>> {
        let request = CallRequest {
            methods_to_call,
            ..Default::default()
        };
        Ok(self.dispatch(request).await?.results)
    }

    /// Call a single method.
    pub async fn call_method(
        &self,
        object_id: NodeId,
        method_id: NodeId,
        input_arguments: Vec<Variant>,
    ) -> Result<CallMethodResult> {
        let mut results = self
            .call(vec![CallMethodRequest {
                object_id,
                method_id,
                input_arguments,
            }])
            .await?;
        results
            .pop()
            .ok_or_else(|| Error::Service(StatusCode::BAD_UNEXPECTED_ERROR))
    }

    /// Raw history read over a time window.
    pub async fn history_read_raw(
        &self,
        details: ReadRawModifiedDetails,
        nodes_to_read: Vec<HistoryReadValueId>,
        timestamps_to_return: TimestampsToReturn,
        release_continuation_points: bool,
    ) -> Result<Vec<HistoryReadResult>> {
        let request = HistoryReadRequest {
            history_read_details: ExtensionObject::from_message(
                ReadRawModifiedDetails::TYPE_ID,
                &details,
            ),
            timestamps_to_return,
            release_continuation_points,
            nodes_to_read,
            ..Default::default()
        };
        Ok(self.dispatch(request).await?.results)
    }

    /// Register nodes for faster repeated access; batched by
    /// MaxNodesPerRegisterNodes.
    pub async fn register_nodes(&self, nodes_to_register: Vec<NodeId>) -> Result<Vec<NodeId>> {
        self.ensure_activated()?;
        let limit = self
            .operation_limits()
            .await?
            .max_nodes_per_register_nodes;
        let mut registered = Vec::with_capacity(nodes_to_register.len());
        for batch in super::limits::split_batches(nodes_to_register, limit) {
            let request = ua_types::service::view::RegisterNodesRequest {
                nodes_to_register: batch,
                ..Default::default()
            };
            registered.extend(self.channel().dispatch(request).await?.registered_node_ids);
        }
        Ok(registered)
    }

    /// Release previously registered nodes.
    pub async fn unregister_nodes(&self, nodes_to_unregister: Vec<NodeId>) -> Result<()> {
        let request = ua_types::service::view::UnregisterNodesRequest {
            nodes_to_unregister,
            ..Default::default()
        };
        self.dispatch(request).await?;
        Ok(())
    }

    /// Translate browse paths to node ids.
    pub async fn translate_browse_paths(
        &self,
        browse_paths: Vec<BrowsePath>,
    ) -> Result<Vec<BrowsePathResult>> {
        let request = TranslateBrowsePathsRequest {
            browse_paths,
            ..Default::default()
        };
        Ok(self.dispatch(request).await?.results)
    }

    /// Fetch the DataTypeDefinition attribute of a data type node and
    /// cache the resulting structure definition.
    pub async fn data_type_definition(
        &self,
        data_type: NodeId,
    ) -> Result<StructureDefinition> {
        let results = self
            .read(vec![ReadValueId::attribute_of(
                data_type.clone(),
                attribute_ids::DATA_TYPE_DEFINITION,
            )])
            .await?;
        let value = results
            .into_iter()
            .next()
            .ok_or_else(|| Error::Service(StatusCode::BAD_UNEXPECTED_ERROR))?;
        if value.status().is_bad() {
            return Err(Error::Service(value.status()));
        }
        let Some(Variant::ExtensionObject(object)) = value.value else {
            return Err(Error::Decode(ua_types::EncodingError::UnknownTypeId {
                type_id: data_type.to_string(),
            }));
        };
        let definition: StructureDefinition = object
            .decode_body_as(ua_types::structure::STRUCTURE_DEFINITION_TYPE_ID)?
            .ok_or_else(|| {
                Error::Decode(ua_types::EncodingError::UnknownTypeId {
                    type_id: object.type_id.to_string(),
                })
            })?;
        debug!(%data_type, fields = definition.fields.len(), "structure definition cached");
        self.cache_definition(data_type, definition.clone());
        Ok(definition)
    }

    /// Decode an unknown extension object, fetching the structure
    /// definition from the server on a cache miss.
    ///
    /// The encoding id is mapped to its data type node by browsing the
    /// inverse HasEncoding reference.
    pub async fn decode_extension_object(
        &self,
        object: &ExtensionObject,
    ) -> Result<DynamicStructure> {
        if let Ok(decoded) = self.decode_cached(object) {
            return Ok(decoded);
        }

        let data_type = self.data_type_of_encoding(object.type_id.clone()).await?;
        self.data_type_definition(data_type).await?;
        self.decode_cached(object)
    }

    /// Follow the inverse HasEncoding reference from a DefaultBinary
    /// encoding node to its data type node.
    async fn data_type_of_encoding(&self, encoding_id: NodeId) -> Result<NodeId> {
        const HAS_ENCODING: u32 = 38;
        let results = self
            .browse(
                vec![BrowseDescription {
                    node_id: encoding_id.clone(),
                    browse_direction: ua_types::service::view::BrowseDirection::Inverse,
                    reference_type_id: NodeId::numeric(0, HAS_ENCODING),
                    include_subtypes: false,
                    node_class_mask: 0,
                    result_mask: 0,
                }],
                0,
            )
            .await?;
        results
            .first()
            .and_then(|result| result.references.first())
            .map(|reference| reference.node_id.node_id.clone())
            .ok_or_else(|| {
                Error::Decode(ua_types::EncodingError::UnknownTypeId {
                    type_id: encoding_id.to_string(),
                })
            })
    }
}
