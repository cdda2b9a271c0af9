//! TCP transport
//!
//! Owns the socket and the Hello/Acknowledge handshake. After connect the
//! transport splits into a reader and a writer; the secure channel drives
//! both. Any I/O error leaves the half terminally dead, and a fresh connect
//! is the only way back.

pub mod framing;
pub mod url;

use crate::config::TransportLimits;
use crate::error::{Error, Result};
use framing::{
    AcknowledgeMessage, ChunkFlag, ErrorMessage, HelloMessage, MessageHeader, MessageType,
    MESSAGE_HEADER_SIZE, MIN_CHUNK_SIZE,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, trace};
use ua_types::{BinaryDecode, BinaryEncode};
use url::EndpointUrl;

/// Buffer sizes and limits agreed with the server: the minimum of both
/// sides' offers, with 0 meaning unlimited for message size and chunk
/// count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedLimits {
    /// Our receive buffer: the largest chunk the server may send.
    pub receive_buffer_size: u32,
    /// The server's receive buffer: the largest chunk we may send.
    pub send_buffer_size: u32,
    pub max_message_size: u32,
    pub max_chunk_count: u32,
}

fn negotiate(offered: &TransportLimits, ack: &AcknowledgeMessage) -> NegotiatedLimits {
    fn min_nonzero(a: u32, b: u32) -> u32 {
        match (a, b) {
            (0, b) => b,
            (a, 0) => a,
            (a, b) => a.min(b),
        }
    }
    NegotiatedLimits {
        // Buffer sizes are never unlimited; both sides must offer one.
        receive_buffer_size: offered.receive_buffer_size.min(ack.receive_buffer_size),
        send_buffer_size: offered.send_buffer_size.min(ack.send_buffer_size),
        max_message_size: min_nonzero(offered.max_message_size, ack.max_message_size),
        max_chunk_count: min_nonzero(offered.max_chunk_count, ack.max_chunk_count),
    }
}

/// A connected, handshaken transport.
#[derive(Debug)]
pub struct TcpTransport {
    reader: TransportReader,
    writer: TransportWriter,
    limits: NegotiatedLimits,
}

impl TcpTransport {
    /// Connect, send Hello, await Acknowledge.
    ///
    /// An Error message in place of the Acknowledge fails the connect with
    /// the server's status code.
    pub async fn connect(endpoint: &EndpointUrl, offered: &TransportLimits) -> Result<Self> {
        let stream = TcpStream::connect(endpoint.socket_addr()).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();

        let mut reader = TransportReader {
            half: read_half,
            receive_buffer_size: offered.receive_buffer_size,
            dead: false,
        };
        let mut writer = TransportWriter {
            half: write_half,
            dead: false,
        };

        let hello = HelloMessage {
            protocol_version: 0,
            receive_buffer_size: offered.receive_buffer_size,
            send_buffer_size: offered.send_buffer_size,
            max_message_size: offered.max_message_size,
            max_chunk_count: offered.max_chunk_count,
            endpoint_url: endpoint.as_given.clone(),
        };
        let mut payload = Vec::new();
        hello.encode(&mut payload);
        writer
            .write_frame(MessageType::Hello, ChunkFlag::Final, None, &payload)
            .await?;

        let (header, body) = reader.read_message().await?;
        let limits = match header.message_type {
            MessageType::Acknowledge => {
                let mut stream = body.as_slice();
                let ack = AcknowledgeMessage::decode(&mut stream).map_err(Error::Decode)?;
                if ack.protocol_version != 0 {
                    return Err(Error::Transport(format!(
                        "server negotiated unsupported protocol version {}",
                        ack.protocol_version
                    )));
                }
                negotiate(offered, &ack)
            }
            MessageType::Error => {
                let mut stream = body.as_slice();
                let error = ErrorMessage::decode(&mut stream).map_err(Error::Decode)?;
                return Err(Error::Transport(format!(
                    "server rejected hello: {} ({})",
                    error.reason, error.error
                )));
            }
            other => {
                return Err(Error::Transport(format!(
                    "expected ACK or ERR after hello, got {other:?}"
                )));
            }
        };

        if limits.send_buffer_size < MIN_CHUNK_SIZE || limits.receive_buffer_size < MIN_CHUNK_SIZE
        {
            return Err(Error::Transport(format!(
                "negotiated buffers below the protocol minimum: {limits:?}"
            )));
        }

        debug!(
            endpoint = %endpoint.as_given,
            send_buffer = limits.send_buffer_size,
            receive_buffer = limits.receive_buffer_size,
            max_message_size = limits.max_message_size,
            max_chunk_count = limits.max_chunk_count,
            "transport connected"
        );

        reader.receive_buffer_size = limits.receive_buffer_size;
        Ok(Self {
            reader,
            writer,
            limits,
        })
    }

    pub fn limits(&self) -> NegotiatedLimits {
        self.limits
    }

    /// Hand the two halves to the channel's read and write paths.
    pub fn into_split(self) -> (TransportReader, TransportWriter) {
        (self.reader, self.writer)
    }
}

/// The receive half: framed message reads.
#[derive(Debug)]
pub struct TransportReader {
    half: OwnedReadHalf,
    receive_buffer_size: u32,
    dead: bool,
}

impl TransportReader {
    /// Read one framed message: the 8-byte header plus the rest of the
    /// frame (channel id included for OPN/MSG/CLO).
    pub async fn read_message(&mut self) -> Result<(MessageHeader, Vec<u8>)> {
        if self.dead {
            return Err(Error::Transport("transport is closed".to_owned()));
        }
        match self.read_message_inner().await {
            Ok(result) => Ok(result),
            Err(err) => {
                self.dead = true;
                Err(err)
            }
        }
    }

    async fn read_message_inner(&mut self) -> Result<(MessageHeader, Vec<u8>)> {
        let mut header_bytes = [0u8; MESSAGE_HEADER_SIZE];
        self.half.read_exact(&mut header_bytes).await?;
        let header = MessageHeader::parse(&header_bytes)?;

        let body_len = header.message_size as usize - MESSAGE_HEADER_SIZE;
        if body_len > self.receive_buffer_size as usize {
            return Err(Error::Transport(format!(
                "incoming chunk of {} bytes exceeds the negotiated receive buffer {}",
                header.message_size, self.receive_buffer_size
            )));
        }

        let mut body = vec![0u8; body_len];
        self.half.read_exact(&mut body).await?;
        trace!(
            message_type = ?header.message_type,
            chunk_flag = ?header.chunk_flag,
            size = header.message_size,
            "frame received"
        );
        Ok((header, body))
    }
}

/// The send half: one frame at a time, serialised by the caller's lock.
#[derive(Debug)]
pub struct TransportWriter {
    half: OwnedWriteHalf,
    dead: bool,
}

impl TransportWriter {
    pub async fn write_frame(
        &mut self,
        message_type: MessageType,
        chunk_flag: ChunkFlag,
        channel_id: Option<u32>,
        payload: &[u8],
    ) -> Result<()> {
        let frame = framing::encode_frame(message_type, chunk_flag, channel_id, payload);
        self.write_raw(&frame).await
    }

    /// Write an already-framed chunk (the secure path builds frames itself
    /// to sign them).
    pub async fn write_raw(&mut self, frame: &[u8]) -> Result<()> {
        if self.dead {
            return Err(Error::Transport("transport is closed".to_owned()));
        }
        match self.write_raw_inner(frame).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.dead = true;
                Err(err)
            }
        }
    }

    async fn write_raw_inner(&mut self, frame: &[u8]) -> Result<()> {
        self.half.write_all(frame).await?;
        self.half.flush().await?;
        trace!(
            size = frame.len(),
            head = %hex::encode(&frame[..frame.len().min(12)]),
            "frame sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn serve_handshake(listener: TcpListener, response: Vec<u8>) -> HelloMessage {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut header = [0u8; MESSAGE_HEADER_SIZE];
        socket.read_exact(&mut header).await.unwrap();
        let parsed = MessageHeader::parse(&header).unwrap();
        assert_eq!(parsed.message_type, MessageType::Hello);

        let mut body = vec![0u8; parsed.message_size as usize - MESSAGE_HEADER_SIZE];
        socket.read_exact(&mut body).await.unwrap();
        let mut stream = body.as_slice();
        let hello = HelloMessage::decode(&mut stream).unwrap();

        socket.write_all(&response).await.unwrap();
        socket.flush().await.unwrap();
        // Keep the socket alive until the client is done with it.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        hello
    }

    fn ack_frame(ack: AcknowledgeMessage) -> Vec<u8> {
        let mut payload = Vec::new();
        ack.encode(&mut payload);
        framing::encode_frame(MessageType::Acknowledge, ChunkFlag::Final, None, &payload)
    }

    #[tokio::test]
    async fn handshake_negotiates_minimum() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_handshake(
            listener,
            ack_frame(AcknowledgeMessage {
                protocol_version: 0,
                receive_buffer_size: 16_384,
                send_buffer_size: 1 << 20,
                max_message_size: 0,
                max_chunk_count: 16,
            }),
        ));

        let endpoint = EndpointUrl::parse(&format!("opc.tcp://127.0.0.1:{}/x", addr.port())).unwrap();
        let offered = TransportLimits {
            receive_buffer_size: 65_535,
            send_buffer_size: 65_535,
            max_message_size: 1 << 24,
            max_chunk_count: 0,
        };
        let transport = TcpTransport::connect(&endpoint, &offered).await.unwrap();

        let limits = transport.limits();
        // min() per direction; 0 means the other side's value wins.
        assert_eq!(limits.send_buffer_size, 16_384);
        assert_eq!(limits.receive_buffer_size, 65_535);
        assert_eq!(limits.max_message_size, 1 << 24);
        assert_eq!(limits.max_chunk_count, 16);

        let hello = server.await.unwrap();
        assert_eq!(hello.endpoint_url, endpoint.as_given);
        assert_eq!(hello.protocol_version, 0);
    }

    #[tokio::test]
    async fn server_error_fails_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut payload = Vec::new();
        ErrorMessage {
            error: ua_types::StatusCode::BAD_TCP_ENDPOINT_URL_INVALID,
            reason: "no such endpoint".into(),
        }
        .encode(&mut payload);
        let frame = framing::encode_frame(MessageType::Error, ChunkFlag::Final, None, &payload);
        let server = tokio::spawn(serve_handshake(listener, frame));

        let endpoint = EndpointUrl::parse(&format!("opc.tcp://127.0.0.1:{}", addr.port())).unwrap();
        let result = TcpTransport::connect(&endpoint, &TransportLimits::default()).await;
        match result {
            Err(Error::Transport(message)) => {
                assert!(message.contains("no such endpoint"), "{message}");
            }
            other => panic!("expected transport error, got {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn tiny_negotiated_buffer_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_handshake(
            listener,
            ack_frame(AcknowledgeMessage {
                protocol_version: 0,
                receive_buffer_size: 1024,
                send_buffer_size: 1024,
                max_message_size: 0,
                max_chunk_count: 0,
            }),
        ));

        let endpoint = EndpointUrl::parse(&format!("opc.tcp://127.0.0.1:{}", addr.port())).unwrap();
        assert!(
            TcpTransport::connect(&endpoint, &TransportLimits::default())
                .await
                .is_err()
        );
        server.await.unwrap();
    }
}
