//! Extension objects
//!
//! An ExtensionObject wraps a structure by value: a type id naming the
//! encoding, an encoding byte, and the body as opaque bytes. Bodies are
//! never decoded eagerly; callers that know the type id decode the body
//! bytes explicitly. This keeps the codec free of live cycles (a body may
//! itself contain further extension objects).

use crate::encoding::{
    read_byte_string, read_string, write_string, BinaryDecode, BinaryEncode, EncodingError,
    EncodingResult,
};
use crate::node_id::NodeId;
use bytes::BufMut;

const ENCODING_NONE: u8 = 0x00;
const ENCODING_BINARY: u8 = 0x01;
const ENCODING_XML: u8 = 0x02;

/// The body of an extension object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExtensionBody {
    /// No body.
    #[default]
    None,
    /// Binary-encoded body, kept as raw bytes.
    Binary(Vec<u8>),
    /// XML-encoded body, kept as its text.
    Xml(String),
}

/// A typed, by-value wrapper around an encoded structure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtensionObject {
    /// NodeId of the DataType encoding (usually the DefaultBinary id).
    pub type_id: NodeId,
    pub body: ExtensionBody,
}

impl ExtensionObject {
    /// An empty extension object: null type id, no body.
    pub fn null() -> Self {
        Self::default()
    }

    pub fn is_null(&self) -> bool {
        self.type_id.is_null() && matches!(self.body, ExtensionBody::None)
    }

    /// Wrap an encodable structure under its DefaultBinary numeric type id.
    pub fn from_message<T: BinaryEncode>(type_id: u32, body: &T) -> Self {
        let mut bytes = Vec::new();
        body.encode(&mut bytes);
        Self {
            type_id: NodeId::numeric(0, type_id),
            body: ExtensionBody::Binary(bytes),
        }
    }

    /// Binary body bytes, if the body is binary.
    pub fn binary_body(&self) -> Option<&[u8]> {
        match &self.body {
            ExtensionBody::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Decode the binary body as `T`, checking the expected type id.
    ///
    /// Returns `None` when the type id does not match; a matching id with a
    /// malformed body is a decode error. The body must be consumed exactly.
    pub fn decode_body_as<T: BinaryDecode>(
        &self,
        expected_type_id: u32,
    ) -> EncodingResult<Option<T>> {
        if self.type_id.as_object_id() != Some(expected_type_id) {
            return Ok(None);
        }
        let Some(bytes) = self.binary_body() else {
            return Ok(None);
        };
        let mut stream = bytes;
        let value = T::decode(&mut stream)?;
        if !stream.is_empty() {
            return Err(EncodingError::LengthMismatch {
                declared: bytes.len(),
                actual: bytes.len() - stream.len(),
            });
        }
        Ok(Some(value))
    }
}

impl BinaryEncode for ExtensionObject {
    fn encode(&self, out: &mut Vec<u8>) {
        self.type_id.encode(out);
        match &self.body {
            ExtensionBody::None => out.put_u8(ENCODING_NONE),
            ExtensionBody::Binary(bytes) => {
                out.put_u8(ENCODING_BINARY);
                debug_assert!(bytes.len() <= i32::MAX as usize);
                out.put_i32_le(bytes.len() as i32);
                out.put_slice(bytes);
            }
            ExtensionBody::Xml(text) => {
                out.put_u8(ENCODING_XML);
                write_string(out, text);
            }
        }
    }
}

impl BinaryDecode for ExtensionObject {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        let type_id = NodeId::decode(stream)?;
        let encoding = u8::decode(stream)?;
        let body = match encoding {
            ENCODING_NONE => ExtensionBody::None,
            ENCODING_BINARY => ExtensionBody::Binary(read_byte_string(stream)?),
            ENCODING_XML => ExtensionBody::Xml(read_string(stream)?),
            _ => {
                return Err(EncodingError::InvalidEncodingByte {
                    what: "extension object",
                    value: encoding,
                });
            }
        };
        Ok(Self { type_id, body })
    }
}
