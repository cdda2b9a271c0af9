//! The secure channel
//!
//! One channel per transport. The channel owns request/response
//! correlation, chunk security, sequence numbering and token rotation:
//!
//! ```text
//! Closed → Opening → Open ⇄ Renewing
//!                     │
//!                     ├→ Closing → Closed
//!                     └→ Faulted   (verification/decode failure)
//! ```
//!
//! Writes are serialised behind one lock; a spawned read task decodes
//! headers, verifies and decrypts chunks, reassembles bodies and wakes the
//! caller registered under the matching request id. A response nobody
//! waits for is logged and discarded. Callers that give up (timeout,
//! drop) leave their entry behind; the read task still consumes the
//! response off the wire, which keeps correlation intact.

pub mod security;

use crate::config::ClientConfig;
use crate::crypto::{self, AppIdentity, KeySet, SecurityMode, SecurityPolicy};
use crate::error::{Error, Result};
use crate::transport::framing::{ErrorMessage, MessageType, Reassembler, ReassemblyError};
use crate::transport::url::EndpointUrl;
use crate::transport::{TcpTransport, TransportReader, TransportWriter};
use security::OpenedChunk;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use ua_types::service::channel::{
    CloseSecureChannelRequest, OpenSecureChannelRequest, OpenSecureChannelResponse,
    SecurityTokenRequestType,
};
use ua_types::service::{
    decode_message_type_id, encode_message, MessageBody, RequestHeader, ServiceFault,
    ServiceRequest, ServiceResponse,
};
use ua_types::{BinaryDecode, NodeId};

/// Renew once this fraction of the token lifetime has passed.
const RENEW_AT_FRACTION: f64 = 0.75;

/// Upper bound on concurrently outstanding requests.
const MAX_INFLIGHT_REQUESTS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    Opening,
    Open,
    Renewing,
    Closing,
    Faulted,
}

/// The active token: ids, key material and lifetime bookkeeping.
#[derive(Debug, Default)]
struct TokenState {
    channel_id: u32,
    token_id: u32,
    keys: Option<KeySet>,
    /// The superseded token stays valid on receive until the server uses
    /// the new one.
    previous: Option<(u32, KeySet)>,
    created_at: Option<Instant>,
    lifetime: Duration,
    /// Expected next inbound sequence number; None before the first chunk.
    next_recv_sequence: Option<u32>,
}

impl TokenState {
    fn needs_renewal(&self) -> bool {
        match self.created_at {
            Some(created_at) => {
                let deadline = self.lifetime.mul_f64(RENEW_AT_FRACTION);
                created_at.elapsed() >= deadline
            }
            None => false,
        }
    }
}

type PendingResponse = oneshot::Sender<Result<Vec<u8>>>;

struct Inner {
    policy: SecurityPolicy,
    mode: SecurityMode,
    identity: Option<AppIdentity>,
    state: Mutex<ChannelState>,
    tokens: Mutex<TokenState>,
    correlation: Mutex<HashMap<u32, PendingResponse>>,
    reassembler: Mutex<Reassembler>,
    /// Server certificate DER: configured up front or learned from the OPN
    /// response's security header.
    server_certificate: Mutex<Vec<u8>>,
}

impl Inner {
    fn fault(&self, error: &Error) {
        let mut state = self.state.lock().unwrap();
        if !matches!(*state, ChannelState::Closed | ChannelState::Closing) {
            *state = ChannelState::Faulted;
        }
        drop(state);
        self.fail_all(error);
    }

    fn fail_all(&self, error: &Error) {
        let mut correlation = self.correlation.lock().unwrap();
        for (_, waiter) in correlation.drain() {
            let _ = waiter.send(Err(error.clone()));
        }
    }

    fn check_sequence(&self, sequence_number: u32) -> Result<()> {
        let mut tokens = self.tokens.lock().unwrap();
        if let Some(expected) = tokens.next_recv_sequence
            && sequence_number != expected
        {
            return Err(Error::Transport(format!(
                "out-of-order sequence number {sequence_number}, expected {expected}"
            )));
        }
        tokens.next_recv_sequence = Some(sequence_number.wrapping_add(1));
        Ok(())
    }

    fn route(&self, request_id: u32, payload: Result<Vec<u8>>) {
        let waiter = self.correlation.lock().unwrap().remove(&request_id);
        match waiter {
            Some(waiter) => {
                // A dead receiver means the caller abandoned the request;
                // the response was still consumed off the wire.
                if waiter.send(payload).is_err() {
                    trace!(request_id, "response for abandoned request discarded");
                }
            }
            None => {
                warn!(request_id, "response with unknown request id discarded");
            }
        }
    }
}

struct WriteState {
    writer: TransportWriter,
    sequence_number: u32,
}

impl WriteState {
    fn next_sequence(&mut self) -> u32 {
        let seq = self.sequence_number;
        self.sequence_number = self.sequence_number.wrapping_add(1);
        seq
    }
}

/// A connected secure channel.
pub struct SecureChannel {
    config: ClientConfig,
    inner: Arc<Inner>,
    write: tokio::sync::Mutex<WriteState>,
    /// Serialises open/renew so only one OPN is in flight.
    renew_lock: tokio::sync::Mutex<()>,
    next_request_id: AtomicU32,
    next_request_handle: AtomicU32,
    authentication_token: Mutex<NodeId>,
    send_buffer_size: usize,
    max_chunk_count: u32,
    read_task: Mutex<Option<JoinHandle<()>>>,
}

impl SecureChannel {
    /// Connect the transport, perform the handshake and issue the first
    /// security token.
    ///
    /// `identity` and `server_certificate` are required for any policy
    /// other than None; the certificate is the DER from the chosen
    /// endpoint description.
    pub async fn connect(
        config: ClientConfig,
        identity: Option<AppIdentity>,
        server_certificate: Option<Vec<u8>>,
    ) -> Result<Arc<Self>> {
        if !config.security_policy.is_none() && identity.is_none() {
            return Err(Error::State(
                "security policies other than None need a client certificate".to_owned(),
            ));
        }

        let endpoint = EndpointUrl::parse(&config.endpoint_url)?;
        let transport = TcpTransport::connect(&endpoint, &config.transport).await?;
        let limits = transport.limits();
        let (reader, writer) = transport.into_split();

        let inner = Arc::new(Inner {
            policy: config.security_policy,
            mode: config.security_mode,
            identity,
            state: Mutex::new(ChannelState::Opening),
            tokens: Mutex::new(TokenState::default()),
            correlation: Mutex::new(HashMap::new()),
            reassembler: Mutex::new(Reassembler::new(
                limits.max_chunk_count,
                limits.max_message_size,
            )),
            server_certificate: Mutex::new(server_certificate.unwrap_or_default()),
        });

        let channel = Arc::new(Self {
            config,
            inner: Arc::clone(&inner),
            write: tokio::sync::Mutex::new(WriteState {
                writer,
                sequence_number: 1,
            }),
            renew_lock: tokio::sync::Mutex::new(()),
            next_request_id: AtomicU32::new(1),
            next_request_handle: AtomicU32::new(1),
            authentication_token: Mutex::new(NodeId::null()),
            send_buffer_size: limits.send_buffer_size as usize,
            max_chunk_count: limits.max_chunk_count,
            read_task: Mutex::new(None),
        });

        let task = tokio::spawn(read_loop(reader, Arc::clone(&inner)));
        *channel.read_task.lock().unwrap() = Some(task);

        channel.open(SecurityTokenRequestType::Issue).await?;
        *channel.inner.state.lock().unwrap() = ChannelState::Open;
        Ok(channel)
    }

    pub fn state(&self) -> ChannelState {
        *self.inner.state.lock().unwrap()
    }

    pub fn security_policy(&self) -> SecurityPolicy {
        self.inner.policy
    }

    pub fn security_mode(&self) -> SecurityMode {
        self.inner.mode
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The own certificate DER, when a client identity is configured.
    pub fn client_certificate(&self) -> Vec<u8> {
        self.inner
            .identity
            .as_ref()
            .map(|identity| identity.certificate_der.clone())
            .unwrap_or_default()
    }

    /// Sign `data` with the client private key under the channel policy.
    /// Returns `None` under policy None.
    pub fn sign_with_identity(&self, data: &[u8]) -> Result<Option<(Vec<u8>, &'static str)>> {
        let Some(scheme) = self.inner.policy.asymmetric_signature() else {
            return Ok(None);
        };
        let identity = self.inner.identity.as_ref().ok_or_else(|| {
            Error::State("signing requires a client certificate".to_owned())
        })?;
        let signature =
            crate::crypto::asymmetric::sign(scheme, identity.private_key(), data)?;
        Ok(Some((
            signature,
            self.inner.policy.asymmetric_signature_uri(),
        )))
    }

    /// The server certificate DER, as configured or learned during OPN.
    pub fn server_certificate(&self) -> Vec<u8> {
        self.inner.server_certificate.lock().unwrap().clone()
    }

    /// Install the authentication token stamped on session-bound requests.
    pub fn set_authentication_token(&self, token: NodeId) {
        *self.authentication_token.lock().unwrap() = token;
    }

    /// Fresh request handle for a request header.
    pub fn next_request_handle(&self) -> u32 {
        self.next_request_handle.fetch_add(1, Ordering::Relaxed)
    }

    fn make_request_header(&self, timeout: Duration) -> RequestHeader {
        let mut header = RequestHeader::new(self.next_request_handle(), timeout.as_millis() as u32);
        header.authentication_token = self.authentication_token.lock().unwrap().clone();
        header
    }

    /// Issue or renew the channel token.
    async fn open(&self, request_type: SecurityTokenRequestType) -> Result<()> {
        let _guard = self.renew_lock.lock().await;

        let client_nonce = crypto::create_nonce(self.inner.policy);
        let request = OpenSecureChannelRequest {
            request_header: RequestHeader::new(
                self.next_request_handle(),
                self.config.request_timeout.as_millis() as u32,
            ),
            client_protocol_version: 0,
            request_type,
            security_mode: self.config.security_mode.into(),
            client_nonce: client_nonce.clone(),
            requested_lifetime: self.config.channel_lifetime_ms,
        };
        let body = encode_message(&request);

        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let receiver = self.register(request_id)?;

        // The server key is only needed when the OPN itself is protected.
        let server_cert = self.server_certificate();
        let server_key = if self.inner.policy.is_none() {
            None
        } else {
            Some(crate::crypto::asymmetric::public_key_from_cert(&server_cert)?)
        };

        let sent = async {
            let channel_id = self.inner.tokens.lock().unwrap().channel_id;
            let mut write = self.write.lock().await;
            let sequence = write.next_sequence();
            let frame = security::seal_open_chunk(
                self.inner.policy,
                self.inner.identity.as_ref(),
                server_key.as_ref().map(|key| (server_cert.as_slice(), key)),
                channel_id,
                sequence,
                request_id,
                &body,
            )?;
            write.writer.write_raw(&frame).await
        }
        .await;
        if let Err(err) = sent {
            self.inner.correlation.lock().unwrap().remove(&request_id);
            return Err(err);
        }

        let payload = self.await_response(request_id, receiver).await?;
        let response: OpenSecureChannelResponse = decode_response(&payload)?;

        let mut tokens = self.inner.tokens.lock().unwrap();
        if request_type == SecurityTokenRequestType::Renew {
            if let Some(keys) = tokens.keys.take() {
                tokens.previous = Some((tokens.token_id, keys));
            }
        }
        tokens.channel_id = response.security_token.channel_id;
        tokens.token_id = response.security_token.token_id;
        tokens.created_at = Some(Instant::now());
        tokens.lifetime =
            Duration::from_millis(response.security_token.revised_lifetime as u64);
        tokens.keys = if self.inner.policy.is_none() {
            None
        } else {
            Some(KeySet::derive(
                self.inner.policy,
                &client_nonce,
                &response.server_nonce,
            ))
        };
        debug!(
            channel_id = tokens.channel_id,
            token_id = tokens.token_id,
            lifetime_ms = response.security_token.revised_lifetime,
            renew = (request_type == SecurityTokenRequestType::Renew),
            "secure channel token installed"
        );
        Ok(())
    }

    /// Renew before the token expires; called lazily from dispatch.
    async fn maybe_renew(&self) -> Result<()> {
        let due = self.inner.tokens.lock().unwrap().needs_renewal();
        if !due {
            return Ok(());
        }
        {
            let mut state = self.inner.state.lock().unwrap();
            if *state != ChannelState::Open {
                return Ok(());
            }
            *state = ChannelState::Renewing;
        }
        let result = self.open(SecurityTokenRequestType::Renew).await;
        let mut state = self.inner.state.lock().unwrap();
        if *state == ChannelState::Renewing {
            *state = ChannelState::Open;
        }
        result
    }

    fn register(&self, request_id: u32) -> Result<oneshot::Receiver<Result<Vec<u8>>>> {
        let (sender, receiver) = oneshot::channel();
        let mut correlation = self.inner.correlation.lock().unwrap();
        if correlation.len() >= MAX_INFLIGHT_REQUESTS {
            return Err(Error::State(format!(
                "too many outstanding requests ({MAX_INFLIGHT_REQUESTS})"
            )));
        }
        correlation.insert(request_id, sender);
        Ok(receiver)
    }

    async fn await_response(
        &self,
        request_id: u32,
        receiver: oneshot::Receiver<Result<Vec<u8>>>,
    ) -> Result<Vec<u8>> {
        self.await_response_within(request_id, receiver, self.config.request_timeout)
            .await
    }

    async fn await_response_within(
        &self,
        request_id: u32,
        receiver: oneshot::Receiver<Result<Vec<u8>>>,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Transport(
                "channel read path terminated".to_owned(),
            )),
            Err(_) => {
                // Leave no dangling entry; the read task will discard the
                // late response as unknown.
                self.inner.correlation.lock().unwrap().remove(&request_id);
                Err(Error::Timeout(timeout))
            }
        }
    }

    /// Send a typed request and await its typed response.
    pub async fn dispatch<R: ServiceRequest>(&self, request: R) -> Result<R::Response> {
        self.dispatch_within(request, self.config.request_timeout)
            .await
    }

    /// Dispatch with a custom deadline (publish uses a long one).
    pub async fn dispatch_within<R: ServiceRequest>(
        &self,
        mut request: R,
        timeout: Duration,
    ) -> Result<R::Response> {
        match self.state() {
            ChannelState::Open | ChannelState::Renewing => {}
            ChannelState::Faulted => {
                return Err(Error::State("secure channel is faulted".to_owned()));
            }
            other => {
                return Err(Error::State(format!(
                    "secure channel is not open (state {other:?})"
                )));
            }
        }
        self.maybe_renew().await?;

        let header = request.request_header_mut();
        let stamped = self.make_request_header(timeout);
        header.authentication_token = stamped.authentication_token;
        header.timestamp = stamped.timestamp;
        header.request_handle = stamped.request_handle;
        header.timeout_hint = stamped.timeout_hint;

        let body = encode_message(&request);
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let receiver = self.register(request_id)?;

        if let Err(err) = self
            .send_message(MessageType::Message, request_id, &body)
            .await
        {
            self.inner.correlation.lock().unwrap().remove(&request_id);
            return Err(err);
        }

        let payload = self
            .await_response_within(request_id, receiver, timeout)
            .await?;
        let result = decode_response::<R::Response>(&payload);
        if let Err(err) = &result
            && err.faults_channel()
        {
            self.inner.fault(err);
        }
        result
    }

    /// Chunk, seal and write one message.
    async fn send_message(
        &self,
        message_type: MessageType,
        request_id: u32,
        body: &[u8],
    ) -> Result<()> {
        let (channel_id, token_id, keys) = {
            let tokens = self.inner.tokens.lock().unwrap();
            (tokens.channel_id, tokens.token_id, tokens.keys.clone())
        };

        let max_body = security::max_message_body(
            self.inner.policy,
            self.inner.mode,
            self.send_buffer_size,
        );
        let pieces = crate::transport::framing::split_into_chunks(body, max_body);
        if self.max_chunk_count != 0 && pieces.len() as u32 > self.max_chunk_count {
            return Err(Error::Transport(format!(
                "message needs {} chunks, negotiated maximum is {}",
                pieces.len(),
                self.max_chunk_count
            )));
        }

        let mut write = self.write.lock().await;
        for (piece, flag) in pieces {
            let sequence = write.next_sequence();
            let frame = security::seal_message_chunk(
                self.inner.policy,
                self.inner.mode,
                keys.as_ref(),
                message_type,
                flag,
                channel_id,
                token_id,
                sequence,
                request_id,
                piece,
            )?;
            write.writer.write_raw(&frame).await?;
        }
        Ok(())
    }

    /// Close the channel: best-effort CLO, then tear down. Idempotent.
    pub async fn close(&self) {
        {
            let mut state = self.inner.state.lock().unwrap();
            match *state {
                ChannelState::Closed | ChannelState::Closing => return,
                _ => *state = ChannelState::Closing,
            }
        }

        let request = CloseSecureChannelRequest {
            request_header: self.make_request_header(self.config.request_timeout),
        };
        let body = encode_message(&request);
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        // CLO is never answered; failure to send it changes nothing.
        if let Err(err) = self
            .send_message(MessageType::CloseSecureChannel, request_id, &body)
            .await
        {
            debug!(error = %err, "close secure channel send failed");
        }

        if let Some(task) = self.read_task.lock().unwrap().take() {
            task.abort();
        }
        self.inner
            .fail_all(&Error::Transport("secure channel closed".to_owned()));
        *self.inner.state.lock().unwrap() = ChannelState::Closed;
        debug!("secure channel closed");
    }
}

/// Decode a response body: type id, then the message or a ServiceFault.
fn decode_response<S: ServiceResponse>(payload: &[u8]) -> Result<S> {
    let mut stream = payload;
    let type_id = decode_message_type_id(&mut stream).map_err(Error::Decode)?;
    match type_id.as_object_id() {
        Some(id) if id == S::TYPE_ID => {
            let response = S::decode(&mut stream).map_err(Error::Decode)?;
            let result = response.response_header().service_result;
            if result.is_bad() {
                return Err(Error::Service(result));
            }
            Ok(response)
        }
        Some(id) if id == ServiceFault::TYPE_ID => {
            let fault = ServiceFault::decode(&mut stream).map_err(Error::Decode)?;
            Err(Error::Service(fault.response_header.service_result))
        }
        _ => Err(Error::Decode(ua_types::EncodingError::UnknownTypeId {
            type_id: type_id.to_string(),
        })),
    }
}

/// The dedicated read path: verify, decrypt, reassemble, route.
async fn read_loop(mut reader: TransportReader, inner: Arc<Inner>) {
    loop {
        let (header, frame_body) = match reader.read_message().await {
            Ok(message) => message,
            Err(err) => {
                debug!(error = %err, "transport read failed, channel dead");
                inner.fault(&err);
                return;
            }
        };

        let result = match header.message_type {
            MessageType::Error => {
                let mut stream = frame_body.as_slice();
                let error = match ErrorMessage::decode(&mut stream) {
                    Ok(message) => Error::Transport(format!(
                        "server error: {} ({})",
                        message.reason, message.error
                    )),
                    Err(_) => Error::Transport("undecodable server error frame".to_owned()),
                };
                inner.fault(&error);
                return;
            }
            MessageType::OpenSecureChannel => security::open_open_chunk(
                inner.policy,
                inner.identity.as_ref(),
                &header,
                &frame_body,
            )
            .map(|(chunk, open_header)| {
                // Learn the server certificate if it was not configured.
                if !open_header.sender_certificate.is_empty() {
                    let mut cert = inner.server_certificate.lock().unwrap();
                    if cert.is_empty() {
                        *cert = open_header.sender_certificate;
                    }
                }
                chunk
            }),
            MessageType::Message | MessageType::CloseSecureChannel => {
                let (current, previous) = {
                    let tokens = inner.tokens.lock().unwrap();
                    (
                        (tokens.token_id, tokens.keys.clone()),
                        tokens.previous.clone(),
                    )
                };
                security::open_message_chunk(
                    inner.policy,
                    inner.mode,
                    &header,
                    &frame_body,
                    (current.0, current.1.as_ref()),
                    previous.as_ref().map(|(id, keys)| (*id, keys)),
                )
            }
            MessageType::Hello | MessageType::Acknowledge => {
                inner.fault(&Error::Transport(format!(
                    "unexpected {:?} after handshake",
                    header.message_type
                )));
                return;
            }
        };

        let chunk: OpenedChunk = match result {
            Ok(chunk) => chunk,
            Err(err) => {
                // Verification and decode failures poison the channel.
                inner.fault(&err);
                return;
            }
        };

        if let Err(err) = inner.check_sequence(chunk.sequence_number) {
            inner.fault(&err);
            return;
        }

        let complete = {
            let mut reassembler = inner.reassembler.lock().unwrap();
            reassembler.push(chunk.request_id, header.chunk_flag, &chunk.body)
        };
        match complete {
            Ok(Some(message)) => inner.route(chunk.request_id, Ok(message)),
            Ok(None) => {}
            Err(err @ ReassemblyError::Aborted { .. }) => {
                // An aborted request fails only its own caller.
                inner.route(chunk.request_id, Err(err.into()));
            }
            Err(err @ ReassemblyError::LimitExceeded(_)) => {
                inner.fault(&err.into());
                return;
            }
        }
    }
}

impl Drop for SecureChannel {
    fn drop(&mut self) {
        if let Some(task) = self.read_task.lock().unwrap().take() {
            task.abort();
        }
    }
}
