//! In-process server for tests
//!
//! A minimal policy-None peer: accepts one connection, answers the
//! Hello/Acknowledge handshake and the OPN exchange, then lets each test
//! script the MSG request/response traffic.

use crate::transport::framing::{
    encode_frame, AcknowledgeMessage, ChunkFlag, MessageHeader, MessageType, MESSAGE_HEADER_SIZE,
};
use bytes::Buf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use ua_types::encoding::{read_byte_string, read_string, write_byte_string, write_string};
use ua_types::service::channel::{ChannelSecurityToken, OpenSecureChannelResponse};
use ua_types::service::{encode_message, MessageBody, ResponseHeader};
use ua_types::{BinaryEncode, UaDateTime};

pub(crate) struct MockServer {
    socket: TcpStream,
    sequence: u32,
    pub channel_id: u32,
}

impl MockServer {
    /// Accept one client and complete the transport handshake.
    pub async fn accept(listener: TcpListener) -> Self {
        let (socket, _) = listener.accept().await.unwrap();
        let mut server = Self {
            socket,
            sequence: 1,
            channel_id: 1,
        };
        let (header, _body) = server.read_frame().await;
        assert_eq!(header.message_type, MessageType::Hello);
        let mut ack = Vec::new();
        AcknowledgeMessage {
            protocol_version: 0,
            receive_buffer_size: 65_535,
            send_buffer_size: 65_535,
            max_message_size: 0,
            max_chunk_count: 0,
        }
        .encode(&mut ack);
        server
            .write_frame(encode_frame(
                MessageType::Acknowledge,
                ChunkFlag::Final,
                None,
                &ack,
            ))
            .await;
        server
    }

    pub async fn read_frame(&mut self) -> (MessageHeader, Vec<u8>) {
        let mut header_bytes = [0u8; MESSAGE_HEADER_SIZE];
        self.socket.read_exact(&mut header_bytes).await.unwrap();
        let header = MessageHeader::parse(&header_bytes).unwrap();
        let mut body = vec![0u8; header.message_size as usize - MESSAGE_HEADER_SIZE];
        self.socket.read_exact(&mut body).await.unwrap();
        (header, body)
    }

    pub async fn write_frame(&mut self, frame: Vec<u8>) {
        self.socket.write_all(&frame).await.unwrap();
        self.socket.flush().await.unwrap();
    }

    /// Answer the OPN exchange under policy None.
    pub async fn serve_open(&mut self, channel_id: u32, token_id: u32) {
        self.channel_id = channel_id;
        let (header, body) = self.read_frame().await;
        assert_eq!(header.message_type, MessageType::OpenSecureChannel);

        let mut stream = body.as_slice();
        let _channel_id = stream.get_u32_le();
        read_string(&mut stream).unwrap();
        read_byte_string(&mut stream).unwrap();
        read_byte_string(&mut stream).unwrap();
        let _sequence = stream.get_u32_le();
        let request_id = stream.get_u32_le();

        let response = OpenSecureChannelResponse {
            response_header: ResponseHeader::default(),
            server_protocol_version: 0,
            security_token: ChannelSecurityToken {
                channel_id,
                token_id,
                created_at: UaDateTime::now(),
                revised_lifetime: 3_600_000,
            },
            server_nonce: Vec::new(),
        };
        let payload = encode_message(&response);

        let mut frame_payload = Vec::new();
        frame_payload.extend_from_slice(&channel_id.to_le_bytes());
        write_string(&mut frame_payload, crate::crypto::policy::URI_NONE);
        write_byte_string(&mut frame_payload, &[]);
        write_byte_string(&mut frame_payload, &[]);
        frame_payload.extend_from_slice(&self.sequence.to_le_bytes());
        self.sequence += 1;
        frame_payload.extend_from_slice(&request_id.to_le_bytes());
        frame_payload.extend_from_slice(&payload);
        self.write_frame(encode_frame(
            MessageType::OpenSecureChannel,
            ChunkFlag::Final,
            Some(channel_id),
            &frame_payload,
        ))
        .await;
    }

    /// Read one complete MSG message (joining chunks), returning
    /// (request id, service body).
    pub async fn read_request(&mut self) -> (u32, Vec<u8>) {
        let mut message = Vec::new();
        loop {
            let (header, body) = self.read_frame().await;
            assert!(matches!(
                header.message_type,
                MessageType::Message | MessageType::CloseSecureChannel
            ));
            let mut stream = body.as_slice();
            let _channel_id = stream.get_u32_le();
            let _token_id = stream.get_u32_le();
            let _sequence = stream.get_u32_le();
            let request_id = stream.get_u32_le();
            message.extend_from_slice(stream);
            if header.chunk_flag == ChunkFlag::Final {
                return (request_id, message);
            }
        }
    }

    /// Send a service response body for a request id.
    pub async fn send_response(&mut self, request_id: u32, body: &[u8]) {
        let sequence = self.sequence;
        self.sequence += 1;
        self.send_response_with_sequence(request_id, body, sequence)
            .await;
    }

    /// Send a response with an explicit sequence number (for
    /// out-of-order tests).
    pub async fn send_response_with_sequence(
        &mut self,
        request_id: u32,
        body: &[u8],
        sequence: u32,
    ) {
        self.sequence = self.sequence.max(sequence + 1);
        let mut payload = Vec::new();
        payload.extend_from_slice(&self.channel_id.to_le_bytes());
        payload.extend_from_slice(&1u32.to_le_bytes());
        payload.extend_from_slice(&sequence.to_le_bytes());
        payload.extend_from_slice(&request_id.to_le_bytes());
        payload.extend_from_slice(body);
        self.write_frame(encode_frame(
            MessageType::Message,
            ChunkFlag::Final,
            Some(self.channel_id),
            &payload,
        ))
        .await;
    }

    /// Answer one request with an encoded service response message.
    pub async fn answer<T: MessageBody>(&mut self, response: &T) -> Vec<u8> {
        let (request_id, body) = self.read_request().await;
        self.send_response(request_id, &encode_message(response)).await;
        body
    }
}
