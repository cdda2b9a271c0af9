//! Late-bound structure decode
//!
//! Servers describe their custom structures through the DataTypeDefinition
//! attribute, which returns a [`StructureDefinition`]. The [`TypeTable`]
//! caches definitions by DataType NodeId and decodes extension-object bodies
//! field by field:
//!
//! - `Structure`: every field in order.
//! - `StructureWithOptionalFields`: a leading u32 mask whose bit i covers
//!   the i-th *optional* field only.
//! - `Union`: a leading u32 switch; 0 is the empty union, k selects the
//!   (k-1)th field.
//!
//! Well-known types (ServerStatusDataType, BuildInfo) are preloaded so they
//! decode without a server round-trip.

use crate::encoding::{
    read_array, read_i32_length, read_string, BinaryDecode, BinaryEncode, EncodingError,
    EncodingResult,
};
use crate::extension_object::{ExtensionBody, ExtensionObject};
use crate::ids::object_ids;
use crate::node_id::NodeId;
use crate::qualified_name::LocalizedText;
use crate::variant::{Variant, VariantTypeId};
use bytes::BufMut;
use std::collections::HashMap;

/// DefaultBinary encoding id of StructureDefinition itself.
pub const STRUCTURE_DEFINITION_TYPE_ID: u32 = 122;

/// DataType node ids for the abstract types that force an extension-object
/// wrapper.
const DATA_TYPE_STRUCTURE: u32 = 22;
const DATA_TYPE_BASE: u32 = 24;

/// Layout kind of a described structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum StructureType {
    #[default]
    Structure = 0,
    StructureWithOptionalFields = 1,
    Union = 2,
}

impl BinaryEncode for StructureType {
    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32_le(*self as u32);
    }
}

impl BinaryDecode for StructureType {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        match u32::decode(stream)? {
            0 => Ok(Self::Structure),
            1 => Ok(Self::StructureWithOptionalFields),
            2 => Ok(Self::Union),
            value => Err(EncodingError::EnumOutOfRange {
                name: "structure type",
                value: value as i64,
            }),
        }
    }
}

/// One field of a described structure.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructureField {
    pub name: String,
    pub description: LocalizedText,
    pub data_type: NodeId,
    /// -1 scalar, >= 1 array.
    pub value_rank: i32,
    pub array_dimensions: Vec<u32>,
    pub max_string_length: u32,
    pub is_optional: bool,
}

impl StructureField {
    fn is_array(&self) -> bool {
        self.value_rank >= 1
    }
}

impl BinaryEncode for StructureField {
    fn encode(&self, out: &mut Vec<u8>) {
        crate::encoding::write_string(out, &self.name);
        self.description.encode(out);
        self.data_type.encode(out);
        self.value_rank.encode(out);
        crate::encoding::write_array(out, &self.array_dimensions);
        out.put_u32_le(self.max_string_length);
        self.is_optional.encode(out);
    }
}

impl BinaryDecode for StructureField {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            name: read_string(stream)?,
            description: LocalizedText::decode(stream)?,
            data_type: NodeId::decode(stream)?,
            value_rank: i32::decode(stream)?,
            array_dimensions: read_array(stream)?,
            max_string_length: u32::decode(stream)?,
            is_optional: bool::decode(stream)?,
        })
    }
}

/// Self-describing structure metadata, read from the server.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructureDefinition {
    pub default_encoding_id: NodeId,
    pub base_data_type: NodeId,
    pub structure_type: StructureType,
    pub fields: Vec<StructureField>,
}

impl BinaryEncode for StructureDefinition {
    fn encode(&self, out: &mut Vec<u8>) {
        self.default_encoding_id.encode(out);
        self.base_data_type.encode(out);
        self.structure_type.encode(out);
        crate::encoding::write_array(out, &self.fields);
    }
}

impl BinaryDecode for StructureDefinition {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            default_encoding_id: NodeId::decode(stream)?,
            base_data_type: NodeId::decode(stream)?,
            structure_type: StructureType::decode(stream)?,
            fields: read_array(stream)?,
        })
    }
}

/// A decoded field value: a built-in scalar, a nested structure, or an
/// array of either.
#[derive(Debug, Clone, PartialEq)]
pub enum DynamicValue {
    Builtin(Variant),
    Struct(DynamicStructure),
    Array(Vec<DynamicValue>),
}

/// A structure decoded against its definition. Absent optional fields and
/// unselected union fields are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicStructure {
    /// DataType NodeId the definition was cached under.
    pub data_type: NodeId,
    pub fields: Vec<(String, Option<DynamicValue>)>,
}

impl DynamicStructure {
    /// Look a decoded field up by name.
    pub fn field(&self, name: &str) -> Option<&DynamicValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_ref())
    }
}

/// Structure definitions keyed by DataType NodeId, plus a map from encoding
/// id back to the data type. Cached for a session's lifetime.
#[derive(Debug, Default)]
pub struct TypeTable {
    definitions: HashMap<NodeId, StructureDefinition>,
    by_encoding_id: HashMap<NodeId, NodeId>,
}

impl TypeTable {
    /// A table preloaded with the well-known structures.
    pub fn new() -> Self {
        let mut table = Self::default();
        table.insert(NodeId::numeric(0, 338), build_info_definition());
        table.insert(NodeId::numeric(0, 862), server_status_definition());
        table
    }

    /// Register the definition of a data type.
    pub fn insert(&mut self, data_type: NodeId, definition: StructureDefinition) {
        if !definition.default_encoding_id.is_null() {
            self.by_encoding_id
                .insert(definition.default_encoding_id.clone(), data_type.clone());
        }
        self.definitions.insert(data_type, definition);
    }

    pub fn contains(&self, data_type: &NodeId) -> bool {
        self.definitions.contains_key(data_type)
    }

    /// Resolve an extension object's type id (an encoding id or the data
    /// type itself) to the cached data type.
    pub fn resolve(&self, type_id: &NodeId) -> Option<&NodeId> {
        if self.definitions.contains_key(type_id) {
            return self.definitions.get_key_value(type_id).map(|(k, _)| k);
        }
        self.by_encoding_id.get(type_id)
    }

    /// Decode an extension object body against the cached definitions.
    pub fn decode(&self, object: &ExtensionObject) -> EncodingResult<DynamicStructure> {
        let data_type = self
            .resolve(&object.type_id)
            .ok_or_else(|| EncodingError::UnknownTypeId {
                type_id: object.type_id.to_string(),
            })?
            .clone();
        let ExtensionBody::Binary(body) = &object.body else {
            return Err(EncodingError::InvalidEncodingByte {
                what: "dynamic structure body",
                value: match object.body {
                    ExtensionBody::None => 0,
                    ExtensionBody::Xml(_) => 2,
                    ExtensionBody::Binary(_) => unreachable!(),
                },
            });
        };
        let mut stream = body.as_slice();
        let value = self.decode_structure(&mut stream, &data_type)?;
        if !stream.is_empty() {
            return Err(EncodingError::LengthMismatch {
                declared: body.len(),
                actual: body.len() - stream.len(),
            });
        }
        Ok(value)
    }

    fn decode_structure(
        &self,
        stream: &mut &[u8],
        data_type: &NodeId,
    ) -> EncodingResult<DynamicStructure> {
        let definition = self
            .definitions
            .get(data_type)
            .ok_or_else(|| EncodingError::UnknownTypeId {
                type_id: data_type.to_string(),
            })?;

        let mut fields = Vec::with_capacity(definition.fields.len());
        match definition.structure_type {
            StructureType::Structure => {
                for field in &definition.fields {
                    let value = self.decode_field(stream, field)?;
                    fields.push((field.name.clone(), Some(value)));
                }
            }
            StructureType::StructureWithOptionalFields => {
                let mask = u32::decode(stream)?;
                // The mask covers optional fields only, in declaration
                // order; mandatory fields are always present.
                let mut optional_index = 0;
                for field in &definition.fields {
                    let present = if field.is_optional {
                        let bit = mask & (1 << optional_index) != 0;
                        optional_index += 1;
                        bit
                    } else {
                        true
                    };
                    let value = if present {
                        Some(self.decode_field(stream, field)?)
                    } else {
                        None
                    };
                    fields.push((field.name.clone(), value));
                }
            }
            StructureType::Union => {
                let switch = u32::decode(stream)?;
                if switch as usize > definition.fields.len() {
                    return Err(EncodingError::EnumOutOfRange {
                        name: "union switch",
                        value: switch as i64,
                    });
                }
                for (index, field) in definition.fields.iter().enumerate() {
                    let value = if switch != 0 && index == (switch - 1) as usize {
                        Some(self.decode_field(stream, field)?)
                    } else {
                        None
                    };
                    fields.push((field.name.clone(), value));
                }
            }
        }

        Ok(DynamicStructure {
            data_type: data_type.clone(),
            fields,
        })
    }

    fn decode_field(
        &self,
        stream: &mut &[u8],
        field: &StructureField,
    ) -> EncodingResult<DynamicValue> {
        if field.is_array() {
            let len = read_i32_length(stream)?.unwrap_or(0);
            let mut elements = Vec::with_capacity(len.min(stream.len()));
            for _ in 0..len {
                elements.push(self.decode_scalar(stream, &field.data_type)?);
            }
            Ok(DynamicValue::Array(elements))
        } else {
            self.decode_scalar(stream, &field.data_type)
        }
    }

    fn decode_scalar(
        &self,
        stream: &mut &[u8],
        data_type: &NodeId,
    ) -> EncodingResult<DynamicValue> {
        if let Some(id) = data_type.as_object_id() {
            match id {
                // Abstract bases: the concrete value travels wrapped.
                DATA_TYPE_STRUCTURE => {
                    let object = ExtensionObject::decode(stream)?;
                    // Recurse when the nested type is known, otherwise keep
                    // the opaque wrapper.
                    return if self.resolve(&object.type_id).is_some() {
                        Ok(DynamicValue::Struct(self.decode(&object)?))
                    } else {
                        Ok(DynamicValue::Builtin(Variant::ExtensionObject(Box::new(
                            object,
                        ))))
                    };
                }
                DATA_TYPE_BASE => {
                    return Ok(DynamicValue::Builtin(Variant::decode(stream)?));
                }
                1..=21 | 23 | 25 => {
                    let type_id = VariantTypeId::from_id(id as u8)?;
                    return Ok(DynamicValue::Builtin(Variant::decode_value_of(
                        stream, type_id,
                    )?));
                }
                _ => {}
            }
        }
        if self.contains(data_type) {
            Ok(DynamicValue::Struct(self.decode_structure(stream, data_type)?))
        } else if let Some(resolved) = self.resolve(data_type).cloned() {
            Ok(DynamicValue::Struct(self.decode_structure(stream, &resolved)?))
        } else {
            // Unknown enumerations and subtypes of Int32 decode as Int32;
            // anything else is undecodable without its definition.
            Err(EncodingError::UnknownTypeId {
                type_id: data_type.to_string(),
            })
        }
    }
}

fn scalar_field(name: &str, data_type: u32) -> StructureField {
    StructureField {
        name: name.to_owned(),
        data_type: NodeId::numeric(0, data_type),
        value_rank: -1,
        ..Default::default()
    }
}

fn build_info_definition() -> StructureDefinition {
    StructureDefinition {
        default_encoding_id: NodeId::numeric(0, object_ids::BUILD_INFO),
        base_data_type: NodeId::numeric(0, DATA_TYPE_STRUCTURE),
        structure_type: StructureType::Structure,
        fields: vec![
            scalar_field("ProductUri", 12),
            scalar_field("ManufacturerName", 12),
            scalar_field("ProductName", 12),
            scalar_field("SoftwareVersion", 12),
            scalar_field("BuildNumber", 12),
            scalar_field("BuildDate", 13),
        ],
    }
}

fn server_status_definition() -> StructureDefinition {
    StructureDefinition {
        default_encoding_id: NodeId::numeric(0, object_ids::SERVER_STATUS_DATA_TYPE),
        base_data_type: NodeId::numeric(0, DATA_TYPE_STRUCTURE),
        structure_type: StructureType::Structure,
        fields: vec![
            scalar_field("StartTime", 13),
            scalar_field("CurrentTime", 13),
            // ServerState enumeration, Int32 on the wire.
            scalar_field("State", 6),
            StructureField {
                name: "BuildInfo".to_owned(),
                data_type: NodeId::numeric(0, 338),
                value_rank: -1,
                ..Default::default()
            },
            scalar_field("SecondsTillShutdown", 7),
            scalar_field("ShutdownReason", 21),
        ],
    }
}
