//! TCP message framing
//!
//! Every message starts with an 8-byte header:
//!
//! ```text
//! Offset | Size | Field
//! -------|------|---------------------------------------------
//! 0x00   | 3    | message type, ASCII: HEL ACK ERR OPN MSG CLO
//! 0x03   | 1    | chunk flag: 'F' final, 'C' continue, 'A' abort
//! 0x04   | 4    | total length including this header (u32 LE)
//! ```
//!
//! OPN, MSG and CLO carry a u32 secure-channel id immediately after the
//! header; that id belongs to the secure-channel layer and stays inside the
//! payload here.

use crate::error::{Error, Result};
use bytes::BufMut;
use std::collections::HashMap;
use ua_types::encoding::{read_string, write_string};
use ua_types::{BinaryDecode, BinaryEncode, StatusCode};

/// Fixed message header size.
pub const MESSAGE_HEADER_SIZE: usize = 8;

/// Sanity floor for a negotiated chunk size, from Part 6.
pub const MIN_CHUNK_SIZE: u32 = 8192;

/// The six message types of the TCP binary protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Hello,
    Acknowledge,
    Error,
    OpenSecureChannel,
    Message,
    CloseSecureChannel,
}

impl MessageType {
    pub fn code(&self) -> &'static [u8; 3] {
        match self {
            MessageType::Hello => b"HEL",
            MessageType::Acknowledge => b"ACK",
            MessageType::Error => b"ERR",
            MessageType::OpenSecureChannel => b"OPN",
            MessageType::Message => b"MSG",
            MessageType::CloseSecureChannel => b"CLO",
        }
    }

    pub fn from_code(code: &[u8]) -> Result<Self> {
        match code {
            b"HEL" => Ok(MessageType::Hello),
            b"ACK" => Ok(MessageType::Acknowledge),
            b"ERR" => Ok(MessageType::Error),
            b"OPN" => Ok(MessageType::OpenSecureChannel),
            b"MSG" => Ok(MessageType::Message),
            b"CLO" => Ok(MessageType::CloseSecureChannel),
            other => Err(Error::Transport(format!(
                "invalid message type bytes {other:02x?}"
            ))),
        }
    }

    /// Whether a u32 secure-channel id follows the header.
    pub fn has_channel_id(&self) -> bool {
        matches!(
            self,
            MessageType::OpenSecureChannel
                | MessageType::Message
                | MessageType::CloseSecureChannel
        )
    }
}

/// The chunk flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkFlag {
    /// 'C': more chunks follow.
    Intermediate,
    /// 'F': last chunk of the message.
    Final,
    /// 'A': sender aborted; discard the partial message.
    Abort,
}

impl ChunkFlag {
    pub fn code(&self) -> u8 {
        match self {
            ChunkFlag::Intermediate => b'C',
            ChunkFlag::Final => b'F',
            ChunkFlag::Abort => b'A',
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            b'C' => Ok(ChunkFlag::Intermediate),
            b'F' => Ok(ChunkFlag::Final),
            b'A' => Ok(ChunkFlag::Abort),
            other => Err(Error::Transport(format!(
                "invalid chunk flag byte 0x{other:02x}"
            ))),
        }
    }
}

/// A parsed 8-byte message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub message_type: MessageType,
    pub chunk_flag: ChunkFlag,
    /// Total message length including the header.
    pub message_size: u32,
}

impl MessageHeader {
    pub fn parse(bytes: &[u8; MESSAGE_HEADER_SIZE]) -> Result<Self> {
        let message_type = MessageType::from_code(&bytes[0..3])?;
        let chunk_flag = ChunkFlag::from_code(bytes[3])?;
        let message_size = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if (message_size as usize) < MESSAGE_HEADER_SIZE {
            return Err(Error::Transport(format!(
                "message size {message_size} smaller than its header"
            )));
        }
        Ok(Self {
            message_type,
            chunk_flag,
            message_size,
        })
    }
}

/// Build a complete frame: header, optional channel id, payload.
pub fn encode_frame(
    message_type: MessageType,
    chunk_flag: ChunkFlag,
    channel_id: Option<u32>,
    payload: &[u8],
) -> Vec<u8> {
    debug_assert_eq!(message_type.has_channel_id(), channel_id.is_some());
    let total = MESSAGE_HEADER_SIZE + if channel_id.is_some() { 4 } else { 0 } + payload.len();

    let mut frame = Vec::with_capacity(total);
    frame.extend_from_slice(message_type.code());
    frame.put_u8(chunk_flag.code());
    frame.put_u32_le(total as u32);
    if let Some(id) = channel_id {
        frame.put_u32_le(id);
    }
    frame.extend_from_slice(payload);
    frame
}

/// The client's opening offer.
#[derive(Debug, Clone, PartialEq)]
pub struct HelloMessage {
    pub protocol_version: u32,
    pub receive_buffer_size: u32,
    pub send_buffer_size: u32,
    pub max_message_size: u32,
    pub max_chunk_count: u32,
    pub endpoint_url: String,
}

impl BinaryEncode for HelloMessage {
    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32_le(self.protocol_version);
        out.put_u32_le(self.receive_buffer_size);
        out.put_u32_le(self.send_buffer_size);
        out.put_u32_le(self.max_message_size);
        out.put_u32_le(self.max_chunk_count);
        write_string(out, &self.endpoint_url);
    }
}

impl BinaryDecode for HelloMessage {
    fn decode(stream: &mut &[u8]) -> ua_types::EncodingResult<Self> {
        Ok(Self {
            protocol_version: u32::decode(stream)?,
            receive_buffer_size: u32::decode(stream)?,
            send_buffer_size: u32::decode(stream)?,
            max_message_size: u32::decode(stream)?,
            max_chunk_count: u32::decode(stream)?,
            endpoint_url: read_string(stream)?,
        })
    }
}

/// The server's counter-offer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcknowledgeMessage {
    pub protocol_version: u32,
    pub receive_buffer_size: u32,
    pub send_buffer_size: u32,
    pub max_message_size: u32,
    pub max_chunk_count: u32,
}

impl BinaryEncode for AcknowledgeMessage {
    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32_le(self.protocol_version);
        out.put_u32_le(self.receive_buffer_size);
        out.put_u32_le(self.send_buffer_size);
        out.put_u32_le(self.max_message_size);
        out.put_u32_le(self.max_chunk_count);
    }
}

impl BinaryDecode for AcknowledgeMessage {
    fn decode(stream: &mut &[u8]) -> ua_types::EncodingResult<Self> {
        Ok(Self {
            protocol_version: u32::decode(stream)?,
            receive_buffer_size: u32::decode(stream)?,
            send_buffer_size: u32::decode(stream)?,
            max_message_size: u32::decode(stream)?,
            max_chunk_count: u32::decode(stream)?,
        })
    }
}

/// A fatal error frame from the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    pub error: StatusCode,
    pub reason: String,
}

impl BinaryEncode for ErrorMessage {
    fn encode(&self, out: &mut Vec<u8>) {
        self.error.encode(out);
        write_string(out, &self.reason);
    }
}

impl BinaryDecode for ErrorMessage {
    fn decode(stream: &mut &[u8]) -> ua_types::EncodingResult<Self> {
        Ok(Self {
            error: StatusCode::decode(stream)?,
            reason: read_string(stream)?,
        })
    }
}

/// Split an encoded message body into chunk-sized pieces.
///
/// `max_body` is the payload capacity of one chunk after all headers,
/// padding and signature are accounted for. Only the last piece carries the
/// final flag.
pub fn split_into_chunks(body: &[u8], max_body: usize) -> Vec<(&[u8], ChunkFlag)> {
    debug_assert!(max_body > 0);
    if body.is_empty() {
        return vec![(body, ChunkFlag::Final)];
    }
    let mut pieces: Vec<(&[u8], ChunkFlag)> = body
        .chunks(max_body)
        .map(|piece| (piece, ChunkFlag::Intermediate))
        .collect();
    if let Some(last) = pieces.last_mut() {
        last.1 = ChunkFlag::Final;
    }
    pieces
}

/// Why reassembly of a message failed.
#[derive(Debug, Clone)]
pub enum ReassemblyError {
    /// The sender aborted this one request; only its caller fails.
    Aborted { request_id: u32, detail: String },
    /// A negotiated limit was exceeded; the connection is unrecoverable.
    LimitExceeded(String),
}

impl From<ReassemblyError> for Error {
    fn from(err: ReassemblyError) -> Self {
        match err {
            ReassemblyError::Aborted { request_id, detail } => {
                Error::Transport(format!("peer aborted request {request_id}: {detail}"))
            }
            ReassemblyError::LimitExceeded(detail) => Error::Transport(detail),
        }
    }
}

/// Reassembles message bodies from decrypted chunk payloads, keyed by
/// request id.
#[derive(Debug)]
pub struct Reassembler {
    partial: HashMap<u32, Partial>,
    max_chunk_count: u32,
    max_message_size: u32,
}

#[derive(Debug, Default)]
struct Partial {
    body: Vec<u8>,
    chunks: u32,
}

impl Reassembler {
    /// `max_chunk_count` / `max_message_size` of 0 mean unlimited.
    pub fn new(max_chunk_count: u32, max_message_size: u32) -> Self {
        Self {
            partial: HashMap::new(),
            max_chunk_count,
            max_message_size,
        }
    }

    /// Feed one chunk's body. Returns the complete message on the final
    /// chunk, `None` while more are outstanding.
    pub fn push(
        &mut self,
        request_id: u32,
        flag: ChunkFlag,
        payload: &[u8],
    ) -> std::result::Result<Option<Vec<u8>>, ReassemblyError> {
        if flag == ChunkFlag::Abort {
            self.partial.remove(&request_id);
            // The abort body is an ErrorMessage; surface its reason.
            let mut stream = payload;
            let detail = ErrorMessage::decode(&mut stream)
                .map(|e| format!("{} ({})", e.reason, e.error))
                .unwrap_or_else(|_| "no detail".to_owned());
            return Err(ReassemblyError::Aborted { request_id, detail });
        }

        let partial = self.partial.entry(request_id).or_default();
        partial.chunks += 1;
        if self.max_chunk_count != 0 && partial.chunks > self.max_chunk_count {
            self.partial.remove(&request_id);
            return Err(ReassemblyError::LimitExceeded(format!(
                "request {request_id} exceeded the negotiated chunk count {}",
                self.max_chunk_count
            )));
        }
        partial.body.extend_from_slice(payload);
        if self.max_message_size != 0 && partial.body.len() > self.max_message_size as usize {
            self.partial.remove(&request_id);
            return Err(ReassemblyError::LimitExceeded(format!(
                "request {request_id} exceeded the negotiated message size {}",
                self.max_message_size
            )));
        }

        if flag == ChunkFlag::Final {
            let partial = self.partial.remove(&request_id).expect("entry exists");
            Ok(Some(partial.body))
        } else {
            Ok(None)
        }
    }

    /// Drop any partial message for a request, e.g. when its caller died.
    pub fn discard(&mut self, request_id: u32) {
        self.partial.remove(&request_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let frame = encode_frame(MessageType::Hello, ChunkFlag::Final, None, &[1, 2, 3]);
        assert_eq!(&frame[0..3], b"HEL");
        assert_eq!(frame[3], b'F');
        assert_eq!(frame.len(), MESSAGE_HEADER_SIZE + 3);

        let header = MessageHeader::parse(frame[..8].try_into().unwrap()).unwrap();
        assert_eq!(header.message_type, MessageType::Hello);
        assert_eq!(header.chunk_flag, ChunkFlag::Final);
        assert_eq!(header.message_size as usize, frame.len());
    }

    #[test]
    fn channel_id_follows_header() {
        let frame = encode_frame(
            MessageType::Message,
            ChunkFlag::Intermediate,
            Some(0xDEAD_BEEF),
            &[],
        );
        assert_eq!(frame.len(), 12);
        assert_eq!(&frame[8..12], &0xDEAD_BEEFu32.to_le_bytes());
    }

    #[test]
    fn invalid_type_and_flag_rejected() {
        assert!(MessageHeader::parse(b"XXXF\x08\x00\x00\x00").is_err());
        assert!(MessageHeader::parse(b"MSGX\x08\x00\x00\x00").is_err());
        // Size smaller than the header itself.
        assert!(MessageHeader::parse(b"MSGF\x04\x00\x00\x00").is_err());
    }

    #[test]
    fn hello_roundtrip() {
        let hello = HelloMessage {
            protocol_version: 0,
            receive_buffer_size: 65_535,
            send_buffer_size: 65_535,
            max_message_size: 0,
            max_chunk_count: 0,
            endpoint_url: "opc.tcp://plc:4840/core".into(),
        };
        let mut out = Vec::new();
        hello.encode(&mut out);
        let mut stream = out.as_slice();
        assert_eq!(HelloMessage::decode(&mut stream).unwrap(), hello);
    }

    #[test]
    fn error_message_roundtrip() {
        let err = ErrorMessage {
            error: StatusCode::BAD_TCP_ENDPOINT_URL_INVALID,
            reason: "unknown endpoint".into(),
        };
        let mut out = Vec::new();
        err.encode(&mut out);
        let mut stream = out.as_slice();
        assert_eq!(ErrorMessage::decode(&mut stream).unwrap(), err);
    }

    #[test]
    fn chunk_split_counts() {
        let body = vec![0u8; 1000];
        let pieces = split_into_chunks(&body, 400);
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0].0.len(), 400);
        assert_eq!(pieces[0].1, ChunkFlag::Intermediate);
        assert_eq!(pieces[2].0.len(), 200);
        assert_eq!(pieces[2].1, ChunkFlag::Final);

        // Concatenating the pieces reproduces the message.
        let total: Vec<u8> = pieces.iter().flat_map(|(p, _)| p.iter().copied()).collect();
        assert_eq!(total, body);
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let body = vec![0u8; 800];
        let pieces = split_into_chunks(&body, 400);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[1].0.len(), 400);
        assert_eq!(pieces[1].1, ChunkFlag::Final);
    }

    #[test]
    fn reassembler_joins_chunks() {
        let mut reassembler = Reassembler::new(0, 0);
        assert_eq!(
            reassembler
                .push(1, ChunkFlag::Intermediate, b"hello ")
                .unwrap(),
            None
        );
        let done = reassembler.push(1, ChunkFlag::Final, b"world").unwrap();
        assert_eq!(done.unwrap(), b"hello world");
    }

    #[test]
    fn reassembler_interleaves_requests() {
        let mut reassembler = Reassembler::new(0, 0);
        reassembler.push(1, ChunkFlag::Intermediate, b"a1").unwrap();
        reassembler.push(2, ChunkFlag::Intermediate, b"b1").unwrap();
        let b = reassembler.push(2, ChunkFlag::Final, b"b2").unwrap();
        let a = reassembler.push(1, ChunkFlag::Final, b"a2").unwrap();
        assert_eq!(a.unwrap(), b"a1a2");
        assert_eq!(b.unwrap(), b"b1b2");
    }

    #[test]
    fn abort_discards_partial() {
        let mut reassembler = Reassembler::new(0, 0);
        reassembler.push(1, ChunkFlag::Intermediate, b"partial").unwrap();

        let mut abort_body = Vec::new();
        ErrorMessage {
            error: StatusCode::BAD_TCP_MESSAGE_TOO_LARGE,
            reason: "too big".into(),
        }
        .encode(&mut abort_body);
        assert!(reassembler.push(1, ChunkFlag::Abort, &abort_body).is_err());

        // The partial message is gone; a fresh final chunk stands alone.
        let done = reassembler.push(1, ChunkFlag::Final, b"fresh").unwrap();
        assert_eq!(done.unwrap(), b"fresh");
    }

    #[test]
    fn chunk_count_limit_enforced() {
        let mut reassembler = Reassembler::new(2, 0);
        reassembler.push(7, ChunkFlag::Intermediate, b"one").unwrap();
        reassembler.push(7, ChunkFlag::Intermediate, b"two").unwrap();
        assert!(reassembler.push(7, ChunkFlag::Intermediate, b"three").is_err());
    }

    #[test]
    fn message_size_limit_enforced() {
        let mut reassembler = Reassembler::new(0, 8);
        assert!(
            reassembler
                .push(9, ChunkFlag::Final, &[0u8; 16])
                .is_err()
        );
    }
}
