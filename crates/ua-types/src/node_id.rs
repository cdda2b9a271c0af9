//! Node identifiers
//!
//! A NodeId is a namespace index plus one of four identifier variants.
//! Numeric identifiers have three wire forms and the shortest legal one is
//! chosen on write:
//!
//! ```text
//! Byte | Form       | Layout
//! -----|------------|----------------------------------------
//! 0x00 | two-byte   | id: u8            (namespace must be 0)
//! 0x01 | four-byte  | ns: u8, id: u16
//! 0x02 | numeric    | ns: u16, id: u32
//! 0x03 | string     | ns: u16, id: String
//! 0x04 | guid       | ns: u16, id: Guid
//! 0x05 | opaque     | ns: u16, id: ByteString
//! ```
//!
//! ExpandedNodeId overloads bits 0x80 (namespace URI follows) and 0x40
//! (server index follows) of the same encoding byte.

use crate::encoding::{
    read_byte_string, read_string, write_byte_string, write_string, BinaryDecode, BinaryEncode,
    EncodingError, EncodingResult,
};
use crate::guid::Guid;
use bytes::BufMut;

const FORM_TWO_BYTE: u8 = 0x00;
const FORM_FOUR_BYTE: u8 = 0x01;
const FORM_NUMERIC: u8 = 0x02;
const FORM_STRING: u8 = 0x03;
const FORM_GUID: u8 = 0x04;
const FORM_OPAQUE: u8 = 0x05;

const BIT_NAMESPACE_URI: u8 = 0x80;
const BIT_SERVER_INDEX: u8 = 0x40;

/// The identifier part of a NodeId.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Numeric(u32),
    String(String),
    Guid(Guid),
    Opaque(Vec<u8>),
}

/// A node identifier: namespace index plus identifier.
///
/// Equality is over namespace and identifier value; the wire form a NodeId
/// was read from does not matter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub namespace: u16,
    pub identifier: Identifier,
}

impl NodeId {
    /// The null node id: numeric 0 in namespace 0.
    pub fn null() -> Self {
        Self::numeric(0, 0)
    }

    /// A numeric node id.
    pub fn numeric(namespace: u16, id: u32) -> Self {
        Self {
            namespace,
            identifier: Identifier::Numeric(id),
        }
    }

    /// A string node id.
    pub fn string(namespace: u16, id: impl Into<String>) -> Self {
        Self {
            namespace,
            identifier: Identifier::String(id.into()),
        }
    }

    /// A guid node id.
    pub fn guid(namespace: u16, id: Guid) -> Self {
        Self {
            namespace,
            identifier: Identifier::Guid(id),
        }
    }

    /// An opaque (byte string) node id.
    pub fn opaque(namespace: u16, id: Vec<u8>) -> Self {
        Self {
            namespace,
            identifier: Identifier::Opaque(id),
        }
    }

    /// `true` for numeric 0 in namespace 0.
    pub fn is_null(&self) -> bool {
        self.namespace == 0 && self.identifier == Identifier::Numeric(0)
    }

    /// The numeric identifier value, if this is a numeric id in namespace 0.
    /// Used to match well-known ids.
    pub fn as_object_id(&self) -> Option<u32> {
        match (&self.identifier, self.namespace) {
            (Identifier::Numeric(id), 0) => Some(*id),
            _ => None,
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::null()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.namespace != 0 {
            write!(f, "ns={};", self.namespace)?;
        }
        match &self.identifier {
            Identifier::Numeric(id) => write!(f, "i={id}"),
            Identifier::String(id) => write!(f, "s={id}"),
            Identifier::Guid(id) => write!(f, "g={id}"),
            Identifier::Opaque(id) => write!(f, "b={}", hex_bytes(id)),
        }
    }
}

fn hex_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Append the NodeId body to `out` with `extra` bits OR-ed into the encoding
/// byte. Shared with ExpandedNodeId, which sets the overload bits.
fn encode_with_bits(node: &NodeId, out: &mut Vec<u8>, extra: u8) {
    match &node.identifier {
        Identifier::Numeric(id) => {
            if node.namespace == 0 && *id <= u8::MAX as u32 {
                out.put_u8(FORM_TWO_BYTE | extra);
                out.put_u8(*id as u8);
            } else if node.namespace <= u8::MAX as u16 && *id <= u16::MAX as u32 {
                out.put_u8(FORM_FOUR_BYTE | extra);
                out.put_u8(node.namespace as u8);
                out.put_u16_le(*id as u16);
            } else {
                out.put_u8(FORM_NUMERIC | extra);
                out.put_u16_le(node.namespace);
                out.put_u32_le(*id);
            }
        }
        Identifier::String(id) => {
            out.put_u8(FORM_STRING | extra);
            out.put_u16_le(node.namespace);
            write_string(out, id);
        }
        Identifier::Guid(id) => {
            out.put_u8(FORM_GUID | extra);
            out.put_u16_le(node.namespace);
            id.encode(out);
        }
        Identifier::Opaque(id) => {
            out.put_u8(FORM_OPAQUE | extra);
            out.put_u16_le(node.namespace);
            write_byte_string(out, id);
        }
    }
}

/// Decode a NodeId body given its already-read encoding byte.
fn decode_body(stream: &mut &[u8], encoding: u8) -> EncodingResult<NodeId> {
    match encoding & 0x3F {
        FORM_TWO_BYTE => {
            let id = u8::decode(stream)?;
            Ok(NodeId::numeric(0, id as u32))
        }
        FORM_FOUR_BYTE => {
            let namespace = u8::decode(stream)? as u16;
            let id = u16::decode(stream)? as u32;
            Ok(NodeId::numeric(namespace, id))
        }
        FORM_NUMERIC => {
            let namespace = u16::decode(stream)?;
            let id = u32::decode(stream)?;
            Ok(NodeId::numeric(namespace, id))
        }
        FORM_STRING => {
            let namespace = u16::decode(stream)?;
            let id = read_string(stream)?;
            Ok(NodeId::string(namespace, id))
        }
        FORM_GUID => {
            let namespace = u16::decode(stream)?;
            let id = Guid::decode(stream)?;
            Ok(NodeId::guid(namespace, id))
        }
        FORM_OPAQUE => {
            let namespace = u16::decode(stream)?;
            let id = read_byte_string(stream)?;
            Ok(NodeId::opaque(namespace, id))
        }
        _ => Err(EncodingError::InvalidEncodingByte {
            what: "node id",
            value: encoding,
        }),
    }
}

impl BinaryEncode for NodeId {
    fn encode(&self, out: &mut Vec<u8>) {
        encode_with_bits(self, out, 0);
    }
}

impl BinaryDecode for NodeId {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        let encoding = u8::decode(stream)?;
        if encoding & (BIT_NAMESPACE_URI | BIT_SERVER_INDEX) != 0 {
            // Overload bits belong to ExpandedNodeId only.
            return Err(EncodingError::InvalidEncodingByte {
                what: "node id",
                value: encoding,
            });
        }
        decode_body(stream, encoding)
    }
}

/// A NodeId plus optional namespace URI and server index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ExpandedNodeId {
    pub node_id: NodeId,
    /// When present, overrides the numeric namespace index.
    pub namespace_uri: Option<String>,
    /// Index into the server table; 0 means the local server.
    pub server_index: u32,
}

impl ExpandedNodeId {
    /// Wrap a local NodeId.
    pub fn local(node_id: NodeId) -> Self {
        Self {
            node_id,
            namespace_uri: None,
            server_index: 0,
        }
    }

    /// `true` if the inner NodeId is null and no URI or server index is set.
    pub fn is_null(&self) -> bool {
        self.node_id.is_null() && self.namespace_uri.is_none() && self.server_index == 0
    }
}

impl std::fmt::Display for ExpandedNodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.server_index != 0 {
            write!(f, "svr={};", self.server_index)?;
        }
        if let Some(uri) = &self.namespace_uri {
            write!(f, "nsu={uri};")?;
        }
        write!(f, "{}", self.node_id)
    }
}

impl BinaryEncode for ExpandedNodeId {
    fn encode(&self, out: &mut Vec<u8>) {
        let mut extra = 0;
        if self.namespace_uri.is_some() {
            extra |= BIT_NAMESPACE_URI;
        }
        if self.server_index != 0 {
            extra |= BIT_SERVER_INDEX;
        }
        encode_with_bits(&self.node_id, out, extra);
        if let Some(uri) = &self.namespace_uri {
            write_string(out, uri);
        }
        if self.server_index != 0 {
            out.put_u32_le(self.server_index);
        }
    }
}

impl BinaryDecode for ExpandedNodeId {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        let encoding = u8::decode(stream)?;
        let node_id = decode_body(stream, encoding)?;
        let namespace_uri = if encoding & BIT_NAMESPACE_URI != 0 {
            Some(read_string(stream)?)
        } else {
            None
        };
        let server_index = if encoding & BIT_SERVER_INDEX != 0 {
            u32::decode(stream)?
        } else {
            0
        };
        Ok(Self {
            node_id,
            namespace_uri,
            server_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(node: &NodeId) -> (Vec<u8>, NodeId) {
        let mut out = Vec::new();
        node.encode(&mut out);
        let mut stream = out.as_slice();
        let decoded = NodeId::decode(&mut stream).unwrap();
        assert!(stream.is_empty());
        (out, decoded)
    }

    #[test]
    fn two_byte_form() {
        let node = NodeId::numeric(0, 255);
        let (bytes, decoded) = roundtrip(&node);
        assert_eq!(bytes, vec![0x00, 0xFF]);
        assert_eq!(decoded, node);
    }

    #[test]
    fn four_byte_form() {
        let node = NodeId::numeric(5, 1025);
        let (bytes, decoded) = roundtrip(&node);
        assert_eq!(bytes, vec![0x01, 0x05, 0x01, 0x04]);
        assert_eq!(decoded, node);
    }

    #[test]
    fn numeric_form() {
        let node = NodeId::numeric(300, 0x0012_3456);
        let (bytes, decoded) = roundtrip(&node);
        assert_eq!(bytes[0], 0x02);
        assert_eq!(bytes.len(), 1 + 2 + 4);
        assert_eq!(decoded, node);
    }

    #[test]
    fn shortest_form_is_chosen() {
        // id 256 does not fit the two-byte form even in namespace 0.
        let mut out = Vec::new();
        NodeId::numeric(0, 256).encode(&mut out);
        assert_eq!(out[0], 0x01);

        // namespace 256 does not fit the four-byte form.
        let mut out = Vec::new();
        NodeId::numeric(256, 1).encode(&mut out);
        assert_eq!(out[0], 0x02);
    }

    #[test]
    fn decoder_accepts_non_canonical_forms() {
        // Numeric form holding a value that would fit the two-byte form.
        let mut data = vec![0x02];
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&5u32.to_le_bytes());
        let mut stream = data.as_slice();
        assert_eq!(NodeId::decode(&mut stream).unwrap(), NodeId::numeric(0, 5));
    }

    #[test]
    fn string_guid_opaque_roundtrip() {
        for node in [
            NodeId::string(2, "Demo.Static.Scalar"),
            NodeId::guid(3, Guid::parse("72962b91-fa75-4ae6-8d28-b404dc7daf63").unwrap()),
            NodeId::opaque(4, vec![0xDE, 0xAD, 0xBE, 0xEF]),
        ] {
            let (_, decoded) = roundtrip(&node);
            assert_eq!(decoded, node);
        }
    }

    #[test]
    fn invalid_form_rejected() {
        let data = [0x06, 0x00];
        let mut stream = data.as_slice();
        assert!(matches!(
            NodeId::decode(&mut stream),
            Err(EncodingError::InvalidEncodingByte { .. })
        ));
    }

    #[test]
    fn plain_node_id_rejects_expanded_bits() {
        let data = [0x80 | 0x00, 0x05];
        let mut stream = data.as_slice();
        assert!(NodeId::decode(&mut stream).is_err());
    }

    #[test]
    fn expanded_with_uri_and_server_index() {
        let expanded = ExpandedNodeId {
            node_id: NodeId::numeric(0, 42),
            namespace_uri: Some("urn:demo:ns".into()),
            server_index: 3,
        };
        let mut out = Vec::new();
        expanded.encode(&mut out);
        assert_eq!(out[0], 0x00 | 0x80 | 0x40);

        let mut stream = out.as_slice();
        let decoded = ExpandedNodeId::decode(&mut stream).unwrap();
        assert_eq!(decoded, expanded);
        assert!(stream.is_empty());
    }

    #[test]
    fn expanded_local_matches_plain_encoding() {
        let node = NodeId::numeric(1, 77);
        let mut plain = Vec::new();
        node.encode(&mut plain);

        let mut expanded = Vec::new();
        ExpandedNodeId::local(node).encode(&mut expanded);
        assert_eq!(plain, expanded);
    }

    #[test]
    fn display_forms() {
        assert_eq!(NodeId::numeric(0, 85).to_string(), "i=85");
        assert_eq!(NodeId::string(2, "x").to_string(), "ns=2;s=x");
    }
}
