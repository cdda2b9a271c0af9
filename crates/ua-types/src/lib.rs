//! OPC UA built-in types and binary codec
//!
//! Everything a client needs to speak the Part 6 binary encoding:
//! - Primitive codecs and the signed-length array law
//! - Built-in types (NodeId, Variant, DataValue, ...)
//! - The service message set with typed request/response pairs
//! - Late-bound decode of server-described structures

pub mod data_value;
pub mod date_time;
pub mod diagnostic_info;
pub mod encoding;
pub mod extension_object;
pub mod guid;
pub mod ids;
pub mod node_id;
pub mod qualified_name;
pub mod service;
pub mod status_code;
pub mod structure;
pub mod variant;

pub use data_value::DataValue;
pub use date_time::UaDateTime;
pub use diagnostic_info::DiagnosticInfo;
pub use encoding::{BinaryDecode, BinaryEncode, EncodingError, EncodingResult};
pub use extension_object::{ExtensionBody, ExtensionObject};
pub use guid::Guid;
pub use node_id::{ExpandedNodeId, Identifier, NodeId};
pub use qualified_name::{LocalizedText, QualifiedName};
pub use status_code::StatusCode;
pub use structure::{DynamicStructure, DynamicValue, StructureDefinition, TypeTable};
pub use variant::{Variant, VariantTypeId};
