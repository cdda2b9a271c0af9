//! Variant values
//!
//! The polymorphic value carrier. The encoding byte holds the built-in type
//! id in bits 0-5, "is array" in bit 7 and "has dimensions" in bit 6:
//!
//! ```text
//! ┌───┬───┬─────────────────┐
//! │ 7 │ 6 │ 5 4 3 2 1 0     │
//! │arr│dim│ built-in type   │
//! └───┴───┴─────────────────┘
//! ```
//!
//! Scalars follow the byte directly. Arrays carry a signed i32 length, then
//! the elements without per-element type bytes (except arrays of Variant,
//! whose elements are complete variants), then optional dimension extents.
//! Numeric widths are distinct variants; an Int16 is never an Int32.

use crate::data_value::DataValue;
use crate::date_time::UaDateTime;
use crate::diagnostic_info::DiagnosticInfo;
use crate::encoding::{
    read_byte_string, read_i32_length, read_string, write_byte_string, write_string, BinaryDecode,
    BinaryEncode, EncodingError, EncodingResult, MAX_DECODE_DEPTH,
};
use crate::extension_object::ExtensionObject;
use crate::guid::Guid;
use crate::node_id::{ExpandedNodeId, NodeId};
use crate::qualified_name::{LocalizedText, QualifiedName};
use crate::status_code::StatusCode;
use bytes::BufMut;

const ARRAY_BIT: u8 = 0x80;
const DIMENSIONS_BIT: u8 = 0x40;
const TYPE_MASK: u8 = 0x3F;

/// Built-in type ids, bits 0-5 of the variant encoding byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VariantTypeId {
    Empty = 0,
    Boolean = 1,
    SByte = 2,
    Byte = 3,
    Int16 = 4,
    UInt16 = 5,
    Int32 = 6,
    UInt32 = 7,
    Int64 = 8,
    UInt64 = 9,
    Float = 10,
    Double = 11,
    String = 12,
    DateTime = 13,
    Guid = 14,
    ByteString = 15,
    XmlElement = 16,
    NodeId = 17,
    ExpandedNodeId = 18,
    StatusCode = 19,
    QualifiedName = 20,
    LocalizedText = 21,
    ExtensionObject = 22,
    DataValue = 23,
    Variant = 24,
    DiagnosticInfo = 25,
}

impl VariantTypeId {
    /// Map a raw type id, rejecting values outside 0..=25.
    pub fn from_id(id: u8) -> EncodingResult<Self> {
        use VariantTypeId::*;
        Ok(match id {
            0 => Empty,
            1 => Boolean,
            2 => SByte,
            3 => Byte,
            4 => Int16,
            5 => UInt16,
            6 => Int32,
            7 => UInt32,
            8 => Int64,
            9 => UInt64,
            10 => Float,
            11 => Double,
            12 => String,
            13 => DateTime,
            14 => Guid,
            15 => ByteString,
            16 => XmlElement,
            17 => NodeId,
            18 => ExpandedNodeId,
            19 => StatusCode,
            20 => QualifiedName,
            21 => LocalizedText,
            22 => ExtensionObject,
            23 => DataValue,
            24 => Variant,
            25 => DiagnosticInfo,
            _ => {
                return Err(EncodingError::EnumOutOfRange {
                    name: "variant type id",
                    value: id as i64,
                });
            }
        })
    }
}

/// A homogeneous variant array, optionally multi-dimensional.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantArray {
    pub element_type: VariantTypeId,
    pub elements: Vec<Variant>,
    /// Extents for a multi-dimensional array. When present their product
    /// must equal the element count.
    pub dimensions: Option<Vec<i32>>,
}

/// The polymorphic value carrier.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    #[default]
    Empty,
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    DateTime(UaDateTime),
    Guid(Guid),
    ByteString(Vec<u8>),
    XmlElement(String),
    NodeId(NodeId),
    ExpandedNodeId(Box<ExpandedNodeId>),
    StatusCode(StatusCode),
    QualifiedName(Box<QualifiedName>),
    LocalizedText(Box<LocalizedText>),
    ExtensionObject(Box<ExtensionObject>),
    DataValue(Box<DataValue>),
    DiagnosticInfo(Box<DiagnosticInfo>),
    Array(Box<VariantArray>),
}

impl Variant {
    /// The built-in type id carried in bits 0-5 of the encoding byte.
    pub fn type_id(&self) -> VariantTypeId {
        match self {
            Variant::Empty => VariantTypeId::Empty,
            Variant::Boolean(_) => VariantTypeId::Boolean,
            Variant::SByte(_) => VariantTypeId::SByte,
            Variant::Byte(_) => VariantTypeId::Byte,
            Variant::Int16(_) => VariantTypeId::Int16,
            Variant::UInt16(_) => VariantTypeId::UInt16,
            Variant::Int32(_) => VariantTypeId::Int32,
            Variant::UInt32(_) => VariantTypeId::UInt32,
            Variant::Int64(_) => VariantTypeId::Int64,
            Variant::UInt64(_) => VariantTypeId::UInt64,
            Variant::Float(_) => VariantTypeId::Float,
            Variant::Double(_) => VariantTypeId::Double,
            Variant::String(_) => VariantTypeId::String,
            Variant::DateTime(_) => VariantTypeId::DateTime,
            Variant::Guid(_) => VariantTypeId::Guid,
            Variant::ByteString(_) => VariantTypeId::ByteString,
            Variant::XmlElement(_) => VariantTypeId::XmlElement,
            Variant::NodeId(_) => VariantTypeId::NodeId,
            Variant::ExpandedNodeId(_) => VariantTypeId::ExpandedNodeId,
            Variant::StatusCode(_) => VariantTypeId::StatusCode,
            Variant::QualifiedName(_) => VariantTypeId::QualifiedName,
            Variant::LocalizedText(_) => VariantTypeId::LocalizedText,
            Variant::ExtensionObject(_) => VariantTypeId::ExtensionObject,
            Variant::DataValue(_) => VariantTypeId::DataValue,
            Variant::DiagnosticInfo(_) => VariantTypeId::DiagnosticInfo,
            Variant::Array(arr) => arr.element_type,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Variant::Array(_))
    }

    /// Build a single-dimensional array from homogeneous scalars.
    pub fn array(element_type: VariantTypeId, elements: Vec<Variant>) -> Self {
        debug_assert!(elements.iter().all(|e| e.type_id() == element_type));
        Variant::Array(Box::new(VariantArray {
            element_type,
            elements,
            dimensions: None,
        }))
    }

    /// The scalar u32 value, if this variant holds one.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Variant::UInt32(v) => Some(*v),
            _ => None,
        }
    }

    /// Write the raw value of a scalar, without its type byte. Array
    /// elements are written this way.
    fn encode_value(&self, out: &mut Vec<u8>) {
        match self {
            Variant::Empty => {}
            Variant::Boolean(v) => v.encode(out),
            Variant::SByte(v) => v.encode(out),
            Variant::Byte(v) => v.encode(out),
            Variant::Int16(v) => v.encode(out),
            Variant::UInt16(v) => v.encode(out),
            Variant::Int32(v) => v.encode(out),
            Variant::UInt32(v) => v.encode(out),
            Variant::Int64(v) => v.encode(out),
            Variant::UInt64(v) => v.encode(out),
            Variant::Float(v) => v.encode(out),
            Variant::Double(v) => v.encode(out),
            Variant::String(v) => write_string(out, v),
            Variant::DateTime(v) => v.encode(out),
            Variant::Guid(v) => v.encode(out),
            Variant::ByteString(v) => write_byte_string(out, v),
            Variant::XmlElement(v) => write_string(out, v),
            Variant::NodeId(v) => v.encode(out),
            Variant::ExpandedNodeId(v) => v.encode(out),
            Variant::StatusCode(v) => v.encode(out),
            Variant::QualifiedName(v) => v.encode(out),
            Variant::LocalizedText(v) => v.encode(out),
            Variant::ExtensionObject(v) => v.encode(out),
            Variant::DataValue(v) => v.encode(out),
            Variant::DiagnosticInfo(v) => v.encode(out),
            // An array is never an element value; arrays of Variant wrap
            // each element as a complete variant in encode() below.
            Variant::Array(_) => debug_assert!(false, "array cannot be an element value"),
        }
    }

    /// Read the raw value of `type_id`, without a type byte.
    fn decode_value(
        stream: &mut &[u8],
        type_id: VariantTypeId,
        depth: u8,
    ) -> EncodingResult<Self> {
        if depth >= MAX_DECODE_DEPTH {
            return Err(EncodingError::DepthExceeded);
        }
        Ok(match type_id {
            VariantTypeId::Empty => Variant::Empty,
            VariantTypeId::Boolean => Variant::Boolean(bool::decode(stream)?),
            VariantTypeId::SByte => Variant::SByte(i8::decode(stream)?),
            VariantTypeId::Byte => Variant::Byte(u8::decode(stream)?),
            VariantTypeId::Int16 => Variant::Int16(i16::decode(stream)?),
            VariantTypeId::UInt16 => Variant::UInt16(u16::decode(stream)?),
            VariantTypeId::Int32 => Variant::Int32(i32::decode(stream)?),
            VariantTypeId::UInt32 => Variant::UInt32(u32::decode(stream)?),
            VariantTypeId::Int64 => Variant::Int64(i64::decode(stream)?),
            VariantTypeId::UInt64 => Variant::UInt64(u64::decode(stream)?),
            VariantTypeId::Float => Variant::Float(f32::decode(stream)?),
            VariantTypeId::Double => Variant::Double(f64::decode(stream)?),
            VariantTypeId::String => Variant::String(read_string(stream)?),
            VariantTypeId::DateTime => Variant::DateTime(UaDateTime::decode(stream)?),
            VariantTypeId::Guid => Variant::Guid(Guid::decode(stream)?),
            VariantTypeId::ByteString => Variant::ByteString(read_byte_string(stream)?),
            VariantTypeId::XmlElement => Variant::XmlElement(read_string(stream)?),
            VariantTypeId::NodeId => Variant::NodeId(NodeId::decode(stream)?),
            VariantTypeId::ExpandedNodeId => {
                Variant::ExpandedNodeId(Box::new(ExpandedNodeId::decode(stream)?))
            }
            VariantTypeId::StatusCode => Variant::StatusCode(StatusCode::decode(stream)?),
            VariantTypeId::QualifiedName => {
                Variant::QualifiedName(Box::new(QualifiedName::decode(stream)?))
            }
            VariantTypeId::LocalizedText => {
                Variant::LocalizedText(Box::new(LocalizedText::decode(stream)?))
            }
            VariantTypeId::ExtensionObject => {
                Variant::ExtensionObject(Box::new(ExtensionObject::decode(stream)?))
            }
            VariantTypeId::DataValue => {
                Variant::DataValue(Box::new(DataValue::decode_depth(stream, depth + 1)?))
            }
            VariantTypeId::Variant => Self::decode_depth(stream, depth + 1)?,
            VariantTypeId::DiagnosticInfo => {
                Variant::DiagnosticInfo(Box::new(DiagnosticInfo::decode(stream)?))
            }
        })
    }

    /// Read the raw value of `type_id` without a leading encoding byte.
    /// Late-bound structure decode reads fields this way.
    pub(crate) fn decode_value_of(
        stream: &mut &[u8],
        type_id: VariantTypeId,
    ) -> EncodingResult<Self> {
        Self::decode_value(stream, type_id, 0)
    }

    pub(crate) fn decode_depth(stream: &mut &[u8], depth: u8) -> EncodingResult<Self> {
        if depth >= MAX_DECODE_DEPTH {
            return Err(EncodingError::DepthExceeded);
        }
        let encoding = u8::decode(stream)?;
        let type_id = VariantTypeId::from_id(encoding & TYPE_MASK)?;

        if encoding & ARRAY_BIT == 0 {
            if encoding & DIMENSIONS_BIT != 0 {
                // Dimensions without the array bit have no meaning.
                return Err(EncodingError::InvalidEncodingByte {
                    what: "variant",
                    value: encoding,
                });
            }
            if type_id == VariantTypeId::Variant {
                // A variant scalar cannot directly contain a variant.
                return Err(EncodingError::InvalidEncodingByte {
                    what: "variant",
                    value: encoding,
                });
            }
            return Self::decode_value(stream, type_id, depth);
        }

        let len = read_i32_length(stream)?.unwrap_or(0);
        let mut elements = Vec::with_capacity(len.min(stream.len()));
        for _ in 0..len {
            elements.push(Self::decode_value(stream, type_id, depth + 1)?);
        }

        let dimensions = if encoding & DIMENSIONS_BIT != 0 {
            let Some(count) = read_i32_length(stream)? else {
                return Ok(Variant::Array(Box::new(VariantArray {
                    element_type: type_id,
                    elements,
                    dimensions: None,
                })));
            };
            let mut dims = Vec::with_capacity(count.min(stream.len()));
            for _ in 0..count {
                dims.push(i32::decode(stream)?);
            }
            Some(dims)
        } else {
            None
        };

        Ok(Variant::Array(Box::new(VariantArray {
            element_type: type_id,
            elements,
            dimensions,
        })))
    }
}

impl BinaryEncode for Variant {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Variant::Array(arr) => {
                let mut encoding = (arr.element_type as u8) | ARRAY_BIT;
                if arr.dimensions.is_some() {
                    encoding |= DIMENSIONS_BIT;
                }
                out.put_u8(encoding);
                debug_assert!(arr.elements.len() <= i32::MAX as usize);
                out.put_i32_le(arr.elements.len() as i32);
                for element in &arr.elements {
                    if arr.element_type == VariantTypeId::Variant {
                        element.encode(out);
                    } else {
                        debug_assert_eq!(element.type_id(), arr.element_type);
                        element.encode_value(out);
                    }
                }
                if let Some(dims) = &arr.dimensions {
                    debug_assert_eq!(
                        dims.iter().map(|d| *d as i64).product::<i64>(),
                        arr.elements.len() as i64,
                    );
                    out.put_i32_le(dims.len() as i32);
                    for dim in dims {
                        dim.encode(out);
                    }
                }
            }
            scalar => {
                out.put_u8(scalar.type_id() as u8);
                scalar.encode_value(out);
            }
        }
    }
}

impl BinaryDecode for Variant {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Self::decode_depth(stream, 0)
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Boolean(v)
    }
}

impl From<i16> for Variant {
    fn from(v: i16) -> Self {
        Variant::Int16(v)
    }
}

impl From<u16> for Variant {
    fn from(v: u16) -> Self {
        Variant::UInt16(v)
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Variant::Int32(v)
    }
}

impl From<u32> for Variant {
    fn from(v: u32) -> Self {
        Variant::UInt32(v)
    }
}

impl From<i64> for Variant {
    fn from(v: i64) -> Self {
        Variant::Int64(v)
    }
}

impl From<u64> for Variant {
    fn from(v: u64) -> Self {
        Variant::UInt64(v)
    }
}

impl From<f32> for Variant {
    fn from(v: f32) -> Self {
        Variant::Float(v)
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Variant::Double(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(v.to_owned())
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::String(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: &Variant) -> Variant {
        let mut out = Vec::new();
        v.encode(&mut out);
        let mut stream = out.as_slice();
        let decoded = Variant::decode(&mut stream).unwrap();
        assert!(stream.is_empty(), "{v:?} left bytes behind");
        decoded
    }

    #[test]
    fn scalar_roundtrips() {
        let values = vec![
            Variant::Empty,
            Variant::Boolean(true),
            Variant::SByte(-3),
            Variant::Byte(200),
            Variant::Int16(-1000),
            Variant::UInt16(50_000),
            Variant::Int32(-7),
            Variant::UInt32(7),
            Variant::Int64(i64::MIN),
            Variant::UInt64(u64::MAX),
            Variant::Float(3.5),
            Variant::Double(-0.125),
            Variant::String("temperature".into()),
            Variant::DateTime(UaDateTime(116_444_736_000_000_000)),
            Variant::Guid(Guid::parse("72962b91-fa75-4ae6-8d28-b404dc7daf63").unwrap()),
            Variant::ByteString(vec![9, 8, 7]),
            Variant::XmlElement("<a/>".into()),
            Variant::NodeId(NodeId::string(2, "Demo")),
            Variant::ExpandedNodeId(Box::new(ExpandedNodeId::local(NodeId::numeric(0, 85)))),
            Variant::StatusCode(StatusCode::BAD_NODE_ID_UNKNOWN),
            Variant::QualifiedName(Box::new(QualifiedName::new(1, "Value"))),
            Variant::LocalizedText(Box::new(LocalizedText::new("en", "on"))),
            Variant::ExtensionObject(Box::new(ExtensionObject::null())),
            Variant::DiagnosticInfo(Box::new(DiagnosticInfo::default())),
        ];
        for v in values {
            assert_eq!(roundtrip(&v), v);
        }
    }

    #[test]
    fn encoding_byte_matches_type_and_flags() {
        let scalar = Variant::Int32(1);
        let mut out = Vec::new();
        scalar.encode(&mut out);
        assert_eq!(out[0], 6);

        let array = Variant::array(
            VariantTypeId::Int32,
            vec![Variant::Int32(1), Variant::Int32(2)],
        );
        let mut out = Vec::new();
        array.encode(&mut out);
        assert_eq!(out[0], 6 | 0x80);

        let matrix = Variant::Array(Box::new(VariantArray {
            element_type: VariantTypeId::Double,
            elements: vec![
                Variant::Double(1.0),
                Variant::Double(2.0),
                Variant::Double(3.0),
                Variant::Double(4.0),
            ],
            dimensions: Some(vec![2, 2]),
        }));
        let mut out = Vec::new();
        matrix.encode(&mut out);
        assert_eq!(out[0], 11 | 0x80 | 0x40);
    }

    #[test]
    fn array_roundtrip() {
        let array = Variant::array(
            VariantTypeId::UInt16,
            vec![
                Variant::UInt16(1),
                Variant::UInt16(2),
                Variant::UInt16(3),
            ],
        );
        assert_eq!(roundtrip(&array), array);
    }

    #[test]
    fn matrix_roundtrip() {
        let matrix = Variant::Array(Box::new(VariantArray {
            element_type: VariantTypeId::Byte,
            elements: (0..6).map(Variant::Byte).collect(),
            dimensions: Some(vec![2, 3]),
        }));
        assert_eq!(roundtrip(&matrix), matrix);
    }

    #[test]
    fn variant_array_elements_are_full_variants() {
        let mixed = Variant::Array(Box::new(VariantArray {
            element_type: VariantTypeId::Variant,
            elements: vec![Variant::Int32(1), Variant::String("two".into())],
            dimensions: None,
        }));
        assert_eq!(roundtrip(&mixed), mixed);
    }

    #[test]
    fn null_array_decodes_empty() {
        let mut data = vec![7 | 0x80];
        data.extend_from_slice(&(-1i32).to_le_bytes());
        let mut stream = data.as_slice();
        let decoded = Variant::decode(&mut stream).unwrap();
        match decoded {
            Variant::Array(arr) => {
                assert_eq!(arr.element_type, VariantTypeId::UInt32);
                assert!(arr.elements.is_empty());
            }
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn numeric_widths_stay_distinct() {
        assert_ne!(roundtrip(&Variant::Int16(5)), Variant::Int32(5));
        assert_ne!(roundtrip(&Variant::UInt32(5)), Variant::Int32(5));
    }

    #[test]
    fn type_id_out_of_range_rejected() {
        let data = [26u8];
        let mut stream = data.as_slice();
        assert!(matches!(
            Variant::decode(&mut stream),
            Err(EncodingError::EnumOutOfRange { .. })
        ));
    }

    #[test]
    fn dimensions_without_array_bit_rejected() {
        let data = [6 | 0x40, 1, 0, 0, 0];
        let mut stream = data.as_slice();
        assert!(matches!(
            Variant::decode(&mut stream),
            Err(EncodingError::InvalidEncodingByte { .. })
        ));
    }

    #[test]
    fn nested_data_value_roundtrip() {
        let inner = DataValue {
            value: Some(Variant::Int32(9)),
            ..Default::default()
        };
        let v = Variant::DataValue(Box::new(inner));
        assert_eq!(roundtrip(&v), v);
    }
}
