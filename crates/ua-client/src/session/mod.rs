//! Sessions
//!
//! A session borrows the secure channel and owns no socket. Lifecycle:
//! CreateSession → ActivateSession → Close. After CreateSession the
//! authentication token is stamped into every request header through the
//! channel; ActivateSession presents the user identity with the policy id
//! copied verbatim from the server's user token policies.

pub mod browse;
pub mod limits;
pub mod services;

use crate::channel::SecureChannel;
use crate::config::IdentityToken;
use crate::crypto::{identity, SecurityPolicy};
use crate::error::{Error, Result};
use limits::OperationLimits;
use rand::RngCore;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use ua_types::service::session::{
    ActivateSessionRequest, AnonymousIdentityToken, ApplicationDescription, ApplicationType,
    CloseSessionRequest, CreateSessionRequest, EndpointDescription, SignatureData,
    UserNameIdentityToken, UserTokenPolicy, UserTokenType, X509IdentityToken,
};
use ua_types::service::{MessageBody, ServiceRequest};
use ua_types::{ExtensionObject, LocalizedText, NodeId, StructureDefinition, TypeTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Created,
    Activated,
    Closed,
}

/// An authenticated context on a secure channel.
pub struct Session {
    channel: Arc<SecureChannel>,
    state: Mutex<SessionState>,
    session_id: Mutex<NodeId>,
    server_nonce: Mutex<Vec<u8>>,
    server_endpoints: Mutex<Vec<EndpointDescription>>,
    revised_timeout_ms: Mutex<f64>,
    limits: tokio::sync::Mutex<Option<OperationLimits>>,
    type_table: Mutex<TypeTable>,
    pub(crate) subscription_set: crate::subscription::SubscriptionSet,
}

impl Session {
    /// CreateSession on the given channel.
    pub async fn create(channel: Arc<SecureChannel>) -> Result<Arc<Self>> {
        let config = channel.config().clone();

        let mut client_nonce = vec![0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut client_nonce);

        let request = CreateSessionRequest {
            client_description: ApplicationDescription {
                application_uri: config.application_uri.clone(),
                product_uri: config.product_uri.clone(),
                application_name: LocalizedText::text_only(config.application_name.clone()),
                application_type: ApplicationType::Client,
                ..Default::default()
            },
            server_uri: String::new(),
            endpoint_url: config.endpoint_url.clone(),
            session_name: config.session_name.clone(),
            client_nonce,
            client_certificate: channel.client_certificate(),
            requested_session_timeout: config.session_timeout_ms,
            max_response_message_size: 0,
            ..Default::default()
        };

        let response = channel.dispatch(request).await?;
        debug!(
            session_id = %response.session_id,
            revised_timeout_ms = response.revised_session_timeout,
            "session created"
        );

        // From here on every session-bound request carries the token.
        channel.set_authentication_token(response.authentication_token.clone());

        Ok(Arc::new(Self {
            channel,
            state: Mutex::new(SessionState::Created),
            session_id: Mutex::new(response.session_id),
            server_nonce: Mutex::new(response.server_nonce),
            server_endpoints: Mutex::new(response.server_endpoints),
            revised_timeout_ms: Mutex::new(response.revised_session_timeout),
            limits: tokio::sync::Mutex::new(None),
            type_table: Mutex::new(TypeTable::new()),
            subscription_set: crate::subscription::SubscriptionSet::new(),
        }))
    }

    /// Connect transport + channel + session and activate in one call.
    pub async fn connect(
        config: crate::config::ClientConfig,
        app_identity: Option<crate::crypto::AppIdentity>,
        server_certificate: Option<Vec<u8>>,
        user_identity: IdentityToken,
    ) -> Result<Arc<Self>> {
        let channel = SecureChannel::connect(config, app_identity, server_certificate).await?;
        let session = Self::create(channel).await?;
        session.activate(user_identity).await?;
        Ok(session)
    }

    pub fn session_id(&self) -> NodeId {
        self.session_id.lock().unwrap().clone()
    }

    pub fn channel(&self) -> &Arc<SecureChannel> {
        &self.channel
    }

    /// Revised session timeout in milliseconds.
    pub fn revised_timeout_ms(&self) -> f64 {
        *self.revised_timeout_ms.lock().unwrap()
    }

    /// Server endpoints as returned by CreateSession.
    pub fn server_endpoints(&self) -> Vec<EndpointDescription> {
        self.server_endpoints.lock().unwrap().clone()
    }

    pub(crate) fn server_nonce(&self) -> Vec<u8> {
        self.server_nonce.lock().unwrap().clone()
    }

    fn set_server_nonce(&self, nonce: Vec<u8>) {
        *self.server_nonce.lock().unwrap() = nonce;
    }

    /// The endpoint matching the channel's policy and mode, used to pick
    /// user token policies. Falls back to the first endpoint.
    fn matching_endpoint(&self) -> Result<EndpointDescription> {
        let endpoints = self.server_endpoints.lock().unwrap();
        if endpoints.is_empty() {
            return Err(Error::State(
                "server returned no endpoints in CreateSession".to_owned(),
            ));
        }
        let policy_uri = self.channel.security_policy().uri();
        let wanted_mode: ua_types::service::channel::MessageSecurityMode =
            self.channel.security_mode().into();
        let matching = endpoints
            .iter()
            .find(|e| e.security_policy_uri == policy_uri && e.security_mode == wanted_mode)
            .or_else(|| {
                endpoints
                    .iter()
                    .find(|e| e.security_policy_uri == policy_uri)
            })
            .unwrap_or(&endpoints[0]);
        Ok(matching.clone())
    }

    /// Build the identity token for ActivateSession.
    ///
    /// The policy id is always taken from the server's token policy list;
    /// there is no hard-coded fallback. Password encryption uses the token
    /// policy's own security policy URI when present, the channel policy
    /// otherwise.
    fn build_identity_token(
        &self,
        user_identity: IdentityToken,
        endpoint: &EndpointDescription,
    ) -> Result<(ExtensionObject, SignatureData)> {
        fn require_policy<'a>(
            endpoint: &'a EndpointDescription,
            token_type: UserTokenType,
        ) -> Result<&'a UserTokenPolicy> {
            endpoint.find_token_policy(token_type).ok_or_else(|| {
                Error::State(format!(
                    "endpoint advertises no {token_type:?} user token policy"
                ))
            })
        }

        match user_identity {
            IdentityToken::Anonymous => {
                let policy = require_policy(endpoint, UserTokenType::Anonymous)?;
                let token = AnonymousIdentityToken {
                    policy_id: policy.policy_id.clone(),
                };
                Ok((
                    ExtensionObject::from_message(AnonymousIdentityToken::TYPE_ID, &token),
                    SignatureData::default(),
                ))
            }
            IdentityToken::UserName {
                user_name,
                password,
            } => {
                let policy = require_policy(endpoint, UserTokenType::UserName)?;
                // The token policy may name its own security policy; the
                // channel policy applies only when it does not.
                let token_policy = if policy.security_policy_uri.is_empty() {
                    self.channel.security_policy()
                } else {
                    SecurityPolicy::from_uri(&policy.security_policy_uri).ok_or_else(|| {
                        Error::Security(format!(
                            "unsupported user token security policy {}",
                            policy.security_policy_uri
                        ))
                    })?
                };

                let server_certificate = {
                    let from_endpoint = &endpoint.server_certificate;
                    if from_endpoint.is_empty() {
                        self.channel.server_certificate()
                    } else {
                        from_endpoint.clone()
                    }
                };
                let secret = identity::encrypt_password(
                    token_policy,
                    &server_certificate,
                    password,
                    &self.server_nonce(),
                )?;
                if token_policy.is_none() && !self.channel.security_mode().encrypts() {
                    warn!("password travels unencrypted: policy None over an unencrypted channel");
                }

                let token = UserNameIdentityToken {
                    policy_id: policy.policy_id.clone(),
                    user_name,
                    password: secret.data,
                    encryption_algorithm: secret.algorithm_uri,
                };
                Ok((
                    ExtensionObject::from_message(UserNameIdentityToken::TYPE_ID, &token),
                    SignatureData::default(),
                ))
            }
            IdentityToken::X509 { certificate_der } => {
                let policy = require_policy(endpoint, UserTokenType::Certificate)?;
                let token = X509IdentityToken {
                    policy_id: policy.policy_id.clone(),
                    certificate_data: certificate_der,
                };
                // The proof-of-possession signature requires the user key;
                // only the certificate part is carried here.
                Ok((
                    ExtensionObject::from_message(X509IdentityToken::TYPE_ID, &token),
                    SignatureData::default(),
                ))
            }
        }
    }

    /// ActivateSession with the given user identity.
    pub async fn activate(&self, user_identity: IdentityToken) -> Result<()> {
        if *self.state.lock().unwrap() == SessionState::Closed {
            return Err(Error::State("session is closed".to_owned()));
        }

        let endpoint = self.matching_endpoint()?;
        let (user_identity_token, user_token_signature) =
            self.build_identity_token(user_identity, &endpoint)?;

        // clientSignature: sign(server certificate || server nonce) with
        // the client key under the channel policy.
        let client_signature = {
            let mut data = self.channel.server_certificate();
            data.extend_from_slice(&self.server_nonce());
            match self.channel.sign_with_identity(&data)? {
                Some((signature, algorithm)) => SignatureData {
                    algorithm: algorithm.to_owned(),
                    signature,
                },
                None => SignatureData::default(),
            }
        };

        let request = ActivateSessionRequest {
            client_signature,
            user_identity_token,
            user_token_signature,
            ..Default::default()
        };
        let response = self.channel.dispatch(request).await?;

        self.set_server_nonce(response.server_nonce);
        *self.state.lock().unwrap() = SessionState::Activated;
        debug!("session activated");
        Ok(())
    }

    pub fn is_activated(&self) -> bool {
        *self.state.lock().unwrap() == SessionState::Activated
    }

    pub(crate) fn ensure_activated(&self) -> Result<()> {
        match *self.state.lock().unwrap() {
            SessionState::Activated => Ok(()),
            SessionState::Created => Err(Error::State(
                "session used before activation".to_owned(),
            )),
            SessionState::Closed => Err(Error::State("session is closed".to_owned())),
        }
    }

    /// Session-bound dispatch: activation check, then channel dispatch.
    pub(crate) async fn dispatch<R: ServiceRequest>(&self, request: R) -> Result<R::Response> {
        self.ensure_activated()?;
        self.channel.dispatch(request).await
    }

    /// Close the session and, best-effort, its subscriptions. Idempotent;
    /// the channel stays open for reuse.
    pub async fn close(&self) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            if *state == SessionState::Closed {
                return Ok(());
            }
            *state = SessionState::Closed;
        }

        let request = CloseSessionRequest {
            delete_subscriptions: true,
            ..Default::default()
        };
        let result = self.channel.dispatch(request).await;
        self.channel.set_authentication_token(NodeId::null());
        match result {
            Ok(_) => {
                debug!("session closed");
                Ok(())
            }
            Err(err) => {
                // Closing is best-effort; the server reaps the session on
                // its timeout anyway.
                warn!(error = %err, "close session failed");
                Err(err)
            }
        }
    }

    /// Look up a cached structure definition.
    pub fn cached_definition(&self, data_type: &NodeId) -> bool {
        self.type_table.lock().unwrap().contains(data_type)
    }

    /// Register a definition, e.g. one fetched by
    /// [`services`]'s `data_type_definition`.
    pub(crate) fn cache_definition(&self, data_type: NodeId, definition: StructureDefinition) {
        self.type_table.lock().unwrap().insert(data_type, definition);
    }

    /// Decode an extension object against the cached definitions only.
    pub fn decode_cached(
        &self,
        object: &ExtensionObject,
    ) -> Result<ua_types::DynamicStructure> {
        Ok(self.type_table.lock().unwrap().decode(object)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockServer;
    use tokio::net::TcpListener;
    use ua_types::service::attribute::{ReadRequest, ReadResponse};
    use ua_types::service::session::{
        ActivateSessionResponse, CreateSessionResponse, CloseSessionResponse,
    };
    use ua_types::service::view::{
        BrowseDescription, BrowseNextRequest, BrowseNextResponse, BrowseRequest, BrowseResponse,
        BrowseResult, ReferenceDescription,
    };
    use ua_types::service::{decode_message_type_id, encode_message};
    use ua_types::{
        BinaryDecode, DataValue, ExpandedNodeId, Identifier, QualifiedName, StatusCode, Variant,
    };

    const ANONYMOUS_POLICY_ID: &str = "open62541-anonymous-policy";

    fn config_for(addr: std::net::SocketAddr) -> crate::config::ClientConfig {
        crate::config::ClientConfig {
            endpoint_url: format!("opc.tcp://127.0.0.1:{}", addr.port()),
            request_timeout: std::time::Duration::from_secs(2),
            ..Default::default()
        }
    }

    fn none_endpoint(url: &str) -> EndpointDescription {
        EndpointDescription {
            endpoint_url: url.to_owned(),
            security_policy_uri: crate::crypto::policy::URI_NONE.to_owned(),
            user_identity_tokens: vec![UserTokenPolicy {
                policy_id: ANONYMOUS_POLICY_ID.to_owned(),
                token_type: UserTokenType::Anonymous,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn create_session_response(url: &str) -> CreateSessionResponse {
        CreateSessionResponse {
            session_id: NodeId::numeric(0, 1111),
            authentication_token: NodeId::opaque(0, vec![9; 8]),
            revised_session_timeout: 1_200_000.0,
            server_nonce: vec![0x5A; 32],
            server_endpoints: vec![none_endpoint(url)],
            ..Default::default()
        }
    }

    /// Serve CreateSession + ActivateSession, asserting the identity
    /// token echoes the endpoint's policy id verbatim.
    async fn serve_session_setup(server: &mut MockServer, url: &str) {
        // CreateSession
        let (request_id, body) = server.read_request().await;
        let mut stream = body.as_slice();
        let type_id = decode_message_type_id(&mut stream).unwrap();
        assert_eq!(type_id.as_object_id(), Some(CreateSessionRequest::TYPE_ID));
        let request = CreateSessionRequest::decode(&mut stream).unwrap();
        assert_eq!(request.endpoint_url, url);
        assert_eq!(request.client_nonce.len(), 32);
        server
            .send_response(request_id, &encode_message(&create_session_response(url)))
            .await;

        // ActivateSession
        let (request_id, body) = server.read_request().await;
        let mut stream = body.as_slice();
        let type_id = decode_message_type_id(&mut stream).unwrap();
        assert_eq!(
            type_id.as_object_id(),
            Some(ActivateSessionRequest::TYPE_ID)
        );
        let request = ActivateSessionRequest::decode(&mut stream).unwrap();

        // The session token from CreateSession is stamped from here on.
        assert_eq!(
            request.request_header.authentication_token,
            NodeId::opaque(0, vec![9; 8])
        );

        // The policy id must be the server's, never a literal guess.
        let token: AnonymousIdentityToken = request
            .user_identity_token
            .decode_body_as(AnonymousIdentityToken::TYPE_ID)
            .unwrap()
            .expect("anonymous token expected");
        assert_eq!(token.policy_id, ANONYMOUS_POLICY_ID);

        server
            .send_response(
                request_id,
                &encode_message(&ActivateSessionResponse {
                    server_nonce: vec![0xA5; 32],
                    ..Default::default()
                }),
            )
            .await;
    }

    #[tokio::test]
    async fn create_activate_close_with_server_policy_id() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let url = format!("opc.tcp://127.0.0.1:{}", addr.port());

        let server_url = url.clone();
        let server = tokio::spawn(async move {
            let mut server = MockServer::accept(listener).await;
            server.serve_open(7, 1).await;
            serve_session_setup(&mut server, &server_url).await;

            // CloseSession must request subscription deletion.
            let (request_id, body) = server.read_request().await;
            let mut stream = body.as_slice();
            let type_id = decode_message_type_id(&mut stream).unwrap();
            assert_eq!(type_id.as_object_id(), Some(CloseSessionRequest::TYPE_ID));
            let request = CloseSessionRequest::decode(&mut stream).unwrap();
            assert!(request.delete_subscriptions);
            server
                .send_response(request_id, &encode_message(&CloseSessionResponse::default()))
                .await;
        });

        let channel = crate::channel::SecureChannel::connect(config_for(addr), None, None)
            .await
            .unwrap();
        let session = Session::create(channel).await.unwrap();
        assert!(!session.is_activated());
        assert_eq!(session.session_id(), NodeId::numeric(0, 1111));

        // Services before activation are a state error.
        let err = session.read_values(vec![NodeId::numeric(0, 2258)]).await;
        assert!(matches!(err, Err(Error::State(_))));

        session.activate(IdentityToken::Anonymous).await.unwrap();
        assert!(session.is_activated());
        // The activate response's nonce replaces the create one.
        assert_eq!(session.server_nonce(), vec![0xA5; 32]);

        session.close().await.unwrap();
        assert!(session.close().await.is_ok(), "close is idempotent");
        server.await.unwrap();
    }

    fn reference(name: &str) -> ReferenceDescription {
        ReferenceDescription {
            node_id: ExpandedNodeId::local(NodeId::string(2, name)),
            browse_name: QualifiedName::new(2, name),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn managed_browse_concatenates_continuations() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let url = format!("opc.tcp://127.0.0.1:{}", addr.port());

        let server = tokio::spawn(async move {
            let mut server = MockServer::accept(listener).await;
            server.serve_open(7, 1).await;
            serve_session_setup(&mut server, &url).await;

            // Browse: 100 references plus a continuation point.
            let (request_id, body) = server.read_request().await;
            let mut stream = body.as_slice();
            let type_id = decode_message_type_id(&mut stream).unwrap();
            assert_eq!(type_id.as_object_id(), Some(BrowseRequest::TYPE_ID));
            server
                .send_response(
                    request_id,
                    &encode_message(&BrowseResponse {
                        results: vec![BrowseResult {
                            status_code: StatusCode::GOOD,
                            continuation_point: vec![0xCC, 0x01],
                            references: (0..100)
                                .map(|i| reference(&format!("Ref{i}")))
                                .collect(),
                        }],
                        ..Default::default()
                    }),
                )
                .await;

            // BrowseNext: the final 50, no further continuation.
            let (request_id, body) = server.read_request().await;
            let mut stream = body.as_slice();
            let type_id = decode_message_type_id(&mut stream).unwrap();
            assert_eq!(type_id.as_object_id(), Some(BrowseNextRequest::TYPE_ID));
            let request = BrowseNextRequest::decode(&mut stream).unwrap();
            assert!(!request.release_continuation_points);
            assert_eq!(request.continuation_points, vec![vec![0xCC, 0x01]]);
            server
                .send_response(
                    request_id,
                    &encode_message(&BrowseNextResponse {
                        results: vec![BrowseResult {
                            status_code: StatusCode::GOOD,
                            continuation_point: Vec::new(),
                            references: (100..150)
                                .map(|i| reference(&format!("Ref{i}")))
                                .collect(),
                        }],
                        ..Default::default()
                    }),
                )
                .await;

            // No release round may follow: the next frame is the CLO from
            // channel close (or socket shutdown).
            let (header, _) = server.read_frame().await;
            assert_eq!(
                header.message_type,
                crate::transport::framing::MessageType::CloseSecureChannel
            );
        });

        let channel = crate::channel::SecureChannel::connect(config_for(addr), None, None)
            .await
            .unwrap();
        let session = Session::create(Arc::clone(&channel)).await.unwrap();
        session.activate(IdentityToken::Anonymous).await.unwrap();

        let results = session
            .managed_browse(vec![BrowseDescription::all_of(NodeId::numeric(0, 85))])
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].references.len(), 150);
        // Server order is preserved across the continuation.
        for (i, reference) in results[0].references.iter().enumerate() {
            assert_eq!(
                reference.node_id.node_id.identifier,
                Identifier::String(format!("Ref{i}"))
            );
        }

        channel.close().await;
        server.await.unwrap();
    }

    fn read_results(count: std::ops::Range<i32>) -> ReadResponse {
        ReadResponse {
            results: count
                .map(|i| DataValue::new(Variant::Int32(i)))
                .collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn read_splits_into_operation_limit_batches() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let url = format!("opc.tcp://127.0.0.1:{}", addr.port());

        let server = tokio::spawn(async move {
            let mut server = MockServer::accept(listener).await;
            server.serve_open(7, 1).await;
            serve_session_setup(&mut server, &url).await;

            // First read: the lazy OperationLimits fetch. Answer
            // MaxNodesPerRead = 100, everything else unlimited.
            let (request_id, body) = server.read_request().await;
            let mut stream = body.as_slice();
            decode_message_type_id(&mut stream).unwrap();
            let request = ReadRequest::decode(&mut stream).unwrap();
            assert_eq!(
                request.nodes_to_read[0].node_id,
                NodeId::numeric(0, ua_types::ids::operation_limits::MAX_NODES_PER_READ)
            );
            let mut limit_values = vec![DataValue::new(Variant::UInt32(100))];
            limit_values
                .resize_with(request.nodes_to_read.len(), || DataValue::default());
            server
                .send_response(
                    request_id,
                    &encode_message(&ReadResponse {
                        results: limit_values,
                        ..Default::default()
                    }),
                )
                .await;

            // Then exactly ceil(250/100) = 3 batches: 100, 100, 50.
            for (expected_len, range) in
                [(100, 0..100), (100, 100..200), (50, 200..250)]
            {
                let (request_id, body) = server.read_request().await;
                let mut stream = body.as_slice();
                decode_message_type_id(&mut stream).unwrap();
                let request = ReadRequest::decode(&mut stream).unwrap();
                assert_eq!(request.nodes_to_read.len(), expected_len);
                server
                    .send_response(request_id, &encode_message(&read_results(range)))
                    .await;
            }
        });

        let channel = crate::channel::SecureChannel::connect(config_for(addr), None, None)
            .await
            .unwrap();
        let session = Session::create(channel).await.unwrap();
        session.activate(IdentityToken::Anonymous).await.unwrap();

        let nodes: Vec<NodeId> = (0..250).map(|i| NodeId::numeric(2, i)).collect();
        let values = session.read_values(nodes).await.unwrap();

        // 250 values, in original request order.
        assert_eq!(values.len(), 250);
        for (i, value) in values.iter().enumerate() {
            assert_eq!(value.value, Some(Variant::Int32(i as i32)));
        }
        server.await.unwrap();
    }
}
