//! Session service messages
//!
//! CreateSession returns the session and authentication tokens plus the
//! server's endpoint list; ActivateSession carries the user identity token
//! as an ExtensionObject wrapping one of the three token structures.

use crate::diagnostic_info::DiagnosticInfo;
use crate::encoding::{
    read_array, read_byte_string, read_string, write_array, write_byte_string, write_string,
    BinaryDecode, BinaryEncode, EncodingError, EncodingResult,
};
use crate::extension_object::ExtensionObject;
use crate::ids::object_ids;
use crate::node_id::NodeId;
use crate::qualified_name::LocalizedText;
use crate::service::channel::MessageSecurityMode;
use crate::service::{
    MessageBody, RequestHeader, ResponseHeader, ServiceRequest, ServiceResponse,
};
use crate::status_code::StatusCode;
use bytes::BufMut;

/// What kind of application an endpoint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum ApplicationType {
    Server = 0,
    #[default]
    Client = 1,
    ClientAndServer = 2,
    DiscoveryServer = 3,
}

impl BinaryEncode for ApplicationType {
    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32_le(*self as u32);
    }
}

impl BinaryDecode for ApplicationType {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        match u32::decode(stream)? {
            0 => Ok(Self::Server),
            1 => Ok(Self::Client),
            2 => Ok(Self::ClientAndServer),
            3 => Ok(Self::DiscoveryServer),
            value => Err(EncodingError::EnumOutOfRange {
                name: "application type",
                value: value as i64,
            }),
        }
    }
}

/// Identity token kinds an endpoint may accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum UserTokenType {
    #[default]
    Anonymous = 0,
    UserName = 1,
    Certificate = 2,
    IssuedToken = 3,
}

impl BinaryEncode for UserTokenType {
    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32_le(*self as u32);
    }
}

impl BinaryDecode for UserTokenType {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        match u32::decode(stream)? {
            0 => Ok(Self::Anonymous),
            1 => Ok(Self::UserName),
            2 => Ok(Self::Certificate),
            3 => Ok(Self::IssuedToken),
            value => Err(EncodingError::EnumOutOfRange {
                name: "user token type",
                value: value as i64,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApplicationDescription {
    pub application_uri: String,
    pub product_uri: String,
    pub application_name: LocalizedText,
    pub application_type: ApplicationType,
    pub gateway_server_uri: String,
    pub discovery_profile_uri: String,
    pub discovery_urls: Vec<String>,
}

impl BinaryEncode for ApplicationDescription {
    fn encode(&self, out: &mut Vec<u8>) {
        write_string(out, &self.application_uri);
        write_string(out, &self.product_uri);
        self.application_name.encode(out);
        self.application_type.encode(out);
        write_string(out, &self.gateway_server_uri);
        write_string(out, &self.discovery_profile_uri);
        write_array(out, &self.discovery_urls);
    }
}

impl BinaryDecode for ApplicationDescription {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            application_uri: read_string(stream)?,
            product_uri: read_string(stream)?,
            application_name: LocalizedText::decode(stream)?,
            application_type: ApplicationType::decode(stream)?,
            gateway_server_uri: read_string(stream)?,
            discovery_profile_uri: read_string(stream)?,
            discovery_urls: read_array(stream)?,
        })
    }
}

/// One accepted identity token kind of an endpoint.
///
/// The policy id is an opaque server-chosen string; it must be echoed
/// verbatim in the matching identity token.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserTokenPolicy {
    pub policy_id: String,
    pub token_type: UserTokenType,
    pub issued_token_type: String,
    pub issuer_endpoint_url: String,
    /// When non-empty, overrides the channel's security policy for
    /// protecting the token secret.
    pub security_policy_uri: String,
}

impl BinaryEncode for UserTokenPolicy {
    fn encode(&self, out: &mut Vec<u8>) {
        write_string(out, &self.policy_id);
        self.token_type.encode(out);
        write_string(out, &self.issued_token_type);
        write_string(out, &self.issuer_endpoint_url);
        write_string(out, &self.security_policy_uri);
    }
}

impl BinaryDecode for UserTokenPolicy {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            policy_id: read_string(stream)?,
            token_type: UserTokenType::decode(stream)?,
            issued_token_type: read_string(stream)?,
            issuer_endpoint_url: read_string(stream)?,
            security_policy_uri: read_string(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EndpointDescription {
    pub endpoint_url: String,
    pub server: ApplicationDescription,
    pub server_certificate: Vec<u8>,
    pub security_mode: MessageSecurityMode,
    pub security_policy_uri: String,
    pub user_identity_tokens: Vec<UserTokenPolicy>,
    pub transport_profile_uri: String,
    pub security_level: u8,
}

impl EndpointDescription {
    /// The first token policy of the given type, in server order.
    pub fn find_token_policy(&self, token_type: UserTokenType) -> Option<&UserTokenPolicy> {
        self.user_identity_tokens
            .iter()
            .find(|p| p.token_type == token_type)
    }
}

impl BinaryEncode for EndpointDescription {
    fn encode(&self, out: &mut Vec<u8>) {
        write_string(out, &self.endpoint_url);
        self.server.encode(out);
        write_byte_string(out, &self.server_certificate);
        self.security_mode.encode(out);
        write_string(out, &self.security_policy_uri);
        write_array(out, &self.user_identity_tokens);
        write_string(out, &self.transport_profile_uri);
        out.put_u8(self.security_level);
    }
}

impl BinaryDecode for EndpointDescription {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            endpoint_url: read_string(stream)?,
            server: ApplicationDescription::decode(stream)?,
            server_certificate: read_byte_string(stream)?,
            security_mode: MessageSecurityMode::decode(stream)?,
            security_policy_uri: read_string(stream)?,
            user_identity_tokens: read_array(stream)?,
            transport_profile_uri: read_string(stream)?,
            security_level: u8::decode(stream)?,
        })
    }
}

/// An algorithm URI plus signature bytes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignatureData {
    pub algorithm: String,
    pub signature: Vec<u8>,
}

impl BinaryEncode for SignatureData {
    fn encode(&self, out: &mut Vec<u8>) {
        write_string(out, &self.algorithm);
        write_byte_string(out, &self.signature);
    }
}

impl BinaryDecode for SignatureData {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            algorithm: read_string(stream)?,
            signature: read_byte_string(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignedSoftwareCertificate {
    pub certificate_data: Vec<u8>,
    pub signature: Vec<u8>,
}

impl BinaryEncode for SignedSoftwareCertificate {
    fn encode(&self, out: &mut Vec<u8>) {
        write_byte_string(out, &self.certificate_data);
        write_byte_string(out, &self.signature);
    }
}

impl BinaryDecode for SignedSoftwareCertificate {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            certificate_data: read_byte_string(stream)?,
            signature: read_byte_string(stream)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateSessionRequest {
    pub request_header: RequestHeader,
    pub client_description: ApplicationDescription,
    pub server_uri: String,
    pub endpoint_url: String,
    pub session_name: String,
    pub client_nonce: Vec<u8>,
    pub client_certificate: Vec<u8>,
    /// Requested timeout in milliseconds.
    pub requested_session_timeout: f64,
    pub max_response_message_size: u32,
}

impl BinaryEncode for CreateSessionRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        self.client_description.encode(out);
        write_string(out, &self.server_uri);
        write_string(out, &self.endpoint_url);
        write_string(out, &self.session_name);
        write_byte_string(out, &self.client_nonce);
        write_byte_string(out, &self.client_certificate);
        self.requested_session_timeout.encode(out);
        out.put_u32_le(self.max_response_message_size);
    }
}

impl BinaryDecode for CreateSessionRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            client_description: ApplicationDescription::decode(stream)?,
            server_uri: read_string(stream)?,
            endpoint_url: read_string(stream)?,
            session_name: read_string(stream)?,
            client_nonce: read_byte_string(stream)?,
            client_certificate: read_byte_string(stream)?,
            requested_session_timeout: f64::decode(stream)?,
            max_response_message_size: u32::decode(stream)?,
        })
    }
}

impl MessageBody for CreateSessionRequest {
    const TYPE_ID: u32 = object_ids::CREATE_SESSION_REQUEST;
}

impl ServiceRequest for CreateSessionRequest {
    type Response = CreateSessionResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateSessionResponse {
    pub response_header: ResponseHeader,
    pub session_id: NodeId,
    pub authentication_token: NodeId,
    /// Revised timeout in milliseconds.
    pub revised_session_timeout: f64,
    pub server_nonce: Vec<u8>,
    pub server_certificate: Vec<u8>,
    pub server_endpoints: Vec<EndpointDescription>,
    pub server_software_certificates: Vec<SignedSoftwareCertificate>,
    pub server_signature: SignatureData,
    pub max_request_message_size: u32,
}

impl BinaryEncode for CreateSessionResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
        self.session_id.encode(out);
        self.authentication_token.encode(out);
        self.revised_session_timeout.encode(out);
        write_byte_string(out, &self.server_nonce);
        write_byte_string(out, &self.server_certificate);
        write_array(out, &self.server_endpoints);
        write_array(out, &self.server_software_certificates);
        self.server_signature.encode(out);
        out.put_u32_le(self.max_request_message_size);
    }
}

impl BinaryDecode for CreateSessionResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
            session_id: NodeId::decode(stream)?,
            authentication_token: NodeId::decode(stream)?,
            revised_session_timeout: f64::decode(stream)?,
            server_nonce: read_byte_string(stream)?,
            server_certificate: read_byte_string(stream)?,
            server_endpoints: read_array(stream)?,
            server_software_certificates: read_array(stream)?,
            server_signature: SignatureData::decode(stream)?,
            max_request_message_size: u32::decode(stream)?,
        })
    }
}

impl MessageBody for CreateSessionResponse {
    const TYPE_ID: u32 = object_ids::CREATE_SESSION_RESPONSE;
}

impl ServiceResponse for CreateSessionResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActivateSessionRequest {
    pub request_header: RequestHeader,
    pub client_signature: SignatureData,
    pub client_software_certificates: Vec<SignedSoftwareCertificate>,
    pub locale_ids: Vec<String>,
    pub user_identity_token: ExtensionObject,
    pub user_token_signature: SignatureData,
}

impl BinaryEncode for ActivateSessionRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        self.client_signature.encode(out);
        write_array(out, &self.client_software_certificates);
        write_array(out, &self.locale_ids);
        self.user_identity_token.encode(out);
        self.user_token_signature.encode(out);
    }
}

impl BinaryDecode for ActivateSessionRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            client_signature: SignatureData::decode(stream)?,
            client_software_certificates: read_array(stream)?,
            locale_ids: read_array(stream)?,
            user_identity_token: ExtensionObject::decode(stream)?,
            user_token_signature: SignatureData::decode(stream)?,
        })
    }
}

impl MessageBody for ActivateSessionRequest {
    const TYPE_ID: u32 = object_ids::ACTIVATE_SESSION_REQUEST;
}

impl ServiceRequest for ActivateSessionRequest {
    type Response = ActivateSessionResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActivateSessionResponse {
    pub response_header: ResponseHeader,
    pub server_nonce: Vec<u8>,
    pub results: Vec<StatusCode>,
    pub diagnostic_infos: Vec<DiagnosticInfo>,
}

impl BinaryEncode for ActivateSessionResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
        write_byte_string(out, &self.server_nonce);
        write_array(out, &self.results);
        write_array(out, &self.diagnostic_infos);
    }
}

impl BinaryDecode for ActivateSessionResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
            server_nonce: read_byte_string(stream)?,
            results: read_array(stream)?,
            diagnostic_infos: read_array(stream)?,
        })
    }
}

impl MessageBody for ActivateSessionResponse {
    const TYPE_ID: u32 = object_ids::ACTIVATE_SESSION_RESPONSE;
}

impl ServiceResponse for ActivateSessionResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CloseSessionRequest {
    pub request_header: RequestHeader,
    pub delete_subscriptions: bool,
}

impl BinaryEncode for CloseSessionRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.request_header.encode(out);
        self.delete_subscriptions.encode(out);
    }
}

impl BinaryDecode for CloseSessionRequest {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            request_header: RequestHeader::decode(stream)?,
            delete_subscriptions: bool::decode(stream)?,
        })
    }
}

impl MessageBody for CloseSessionRequest {
    const TYPE_ID: u32 = object_ids::CLOSE_SESSION_REQUEST;
}

impl ServiceRequest for CloseSessionRequest {
    type Response = CloseSessionResponse;

    fn request_header(&self) -> &RequestHeader {
        &self.request_header
    }

    fn request_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.request_header
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CloseSessionResponse {
    pub response_header: ResponseHeader,
}

impl BinaryEncode for CloseSessionResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.response_header.encode(out);
    }
}

impl BinaryDecode for CloseSessionResponse {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            response_header: ResponseHeader::decode(stream)?,
        })
    }
}

impl MessageBody for CloseSessionResponse {
    const TYPE_ID: u32 = object_ids::CLOSE_SESSION_RESPONSE;
}

impl ServiceResponse for CloseSessionResponse {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }
}

/// Anonymous identity: just the echoed policy id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnonymousIdentityToken {
    pub policy_id: String,
}

impl BinaryEncode for AnonymousIdentityToken {
    fn encode(&self, out: &mut Vec<u8>) {
        write_string(out, &self.policy_id);
    }
}

impl BinaryDecode for AnonymousIdentityToken {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            policy_id: read_string(stream)?,
        })
    }
}

impl MessageBody for AnonymousIdentityToken {
    const TYPE_ID: u32 = object_ids::ANONYMOUS_IDENTITY_TOKEN;
}

/// Username identity. The password bytes are the RSA-encrypted
/// `len || password || server nonce` composition, never the plaintext.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserNameIdentityToken {
    pub policy_id: String,
    pub user_name: String,
    pub password: Vec<u8>,
    /// URI of the asymmetric algorithm the password was encrypted with;
    /// empty over a policy without encryption.
    pub encryption_algorithm: String,
}

impl BinaryEncode for UserNameIdentityToken {
    fn encode(&self, out: &mut Vec<u8>) {
        write_string(out, &self.policy_id);
        write_string(out, &self.user_name);
        write_byte_string(out, &self.password);
        write_string(out, &self.encryption_algorithm);
    }
}

impl BinaryDecode for UserNameIdentityToken {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            policy_id: read_string(stream)?,
            user_name: read_string(stream)?,
            password: read_byte_string(stream)?,
            encryption_algorithm: read_string(stream)?,
        })
    }
}

impl MessageBody for UserNameIdentityToken {
    const TYPE_ID: u32 = object_ids::USER_NAME_IDENTITY_TOKEN;
}

/// X.509 identity: the DER certificate. The proof-of-possession signature
/// travels separately in `user_token_signature`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct X509IdentityToken {
    pub policy_id: String,
    pub certificate_data: Vec<u8>,
}

impl BinaryEncode for X509IdentityToken {
    fn encode(&self, out: &mut Vec<u8>) {
        write_string(out, &self.policy_id);
        write_byte_string(out, &self.certificate_data);
    }
}

impl BinaryDecode for X509IdentityToken {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self {
            policy_id: read_string(stream)?,
            certificate_data: read_byte_string(stream)?,
        })
    }
}

impl MessageBody for X509IdentityToken {
    const TYPE_ID: u32 = object_ids::X509_IDENTITY_TOKEN;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A response body ending in three null arrays and a zero
    /// maxRequestMessageSize, as some servers send for anonymous sessions.
    #[test]
    fn create_session_response_with_null_tails() {
        let mut data = Vec::new();
        ResponseHeader::default().encode(&mut data);
        NodeId::numeric(0, 1000).encode(&mut data); // session id
        NodeId::opaque(0, vec![7; 8]).encode(&mut data); // auth token
        1_200_000f64.encode(&mut data); // revised timeout
        write_byte_string(&mut data, &[0x11; 32]); // server nonce
        data.extend_from_slice(&(-1i32).to_le_bytes()); // server certificate: null
        data.extend_from_slice(&(-1i32).to_le_bytes()); // server endpoints: null
        // serverSoftwareCertificates, signature algorithm, signature bytes:
        // three consecutive nulls.
        data.extend_from_slice(&(-1i32).to_le_bytes());
        data.extend_from_slice(&(-1i32).to_le_bytes());
        data.extend_from_slice(&(-1i32).to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes()); // maxRequestMessageSize

        let mut stream = data.as_slice();
        let resp = CreateSessionResponse::decode(&mut stream).unwrap();
        assert!(stream.is_empty(), "no further bytes may be consumed");

        assert!(resp.server_software_certificates.is_empty());
        assert!(resp.server_signature.algorithm.is_empty());
        assert!(resp.server_signature.signature.is_empty());
        assert_eq!(resp.max_request_message_size, 0);
        assert_eq!(resp.revised_session_timeout, 1_200_000.0);
    }

    #[test]
    fn endpoint_description_roundtrip() {
        let endpoint = EndpointDescription {
            endpoint_url: "opc.tcp://plc:4840".into(),
            server: ApplicationDescription {
                application_uri: "urn:plc".into(),
                application_type: ApplicationType::Server,
                ..Default::default()
            },
            server_certificate: vec![0x30, 0x82],
            security_mode: MessageSecurityMode::SignAndEncrypt,
            security_policy_uri:
                "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256".into(),
            user_identity_tokens: vec![
                UserTokenPolicy {
                    policy_id: "open62541-anonymous-policy".into(),
                    token_type: UserTokenType::Anonymous,
                    ..Default::default()
                },
                UserTokenPolicy {
                    policy_id: "open62541-username-policy".into(),
                    token_type: UserTokenType::UserName,
                    security_policy_uri:
                        "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256".into(),
                    ..Default::default()
                },
            ],
            transport_profile_uri:
                "http://opcfoundation.org/UA-Profile/Transport/uatcp-uasc-uabinary".into(),
            security_level: 3,
        };
        let mut out = Vec::new();
        endpoint.encode(&mut out);

        let mut stream = out.as_slice();
        let decoded = EndpointDescription::decode(&mut stream).unwrap();
        assert_eq!(decoded, endpoint);

        let policy = decoded.find_token_policy(UserTokenType::UserName).unwrap();
        assert_eq!(policy.policy_id, "open62541-username-policy");
    }

    #[test]
    fn activate_request_roundtrip() {
        let token = UserNameIdentityToken {
            policy_id: "username_basic256sha256".into(),
            user_name: "operator".into(),
            password: vec![0xEE; 256],
            encryption_algorithm: "http://www.w3.org/2001/04/xmlenc#rsa-oaep".into(),
        };
        let req = ActivateSessionRequest {
            request_header: RequestHeader::new(2, 10_000),
            user_identity_token: ExtensionObject::from_message(
                UserNameIdentityToken::TYPE_ID,
                &token,
            ),
            ..Default::default()
        };
        let mut out = Vec::new();
        req.encode(&mut out);

        let mut stream = out.as_slice();
        let decoded = ActivateSessionRequest::decode(&mut stream).unwrap();
        assert_eq!(decoded, req);

        let inner: UserNameIdentityToken = decoded
            .user_identity_token
            .decode_body_as(UserNameIdentityToken::TYPE_ID)
            .unwrap()
            .unwrap();
        assert_eq!(inner, token);
    }

    #[test]
    fn close_session_roundtrip() {
        let req = CloseSessionRequest {
            request_header: RequestHeader::new(3, 0),
            delete_subscriptions: true,
        };
        let mut out = Vec::new();
        req.encode(&mut out);
        let mut stream = out.as_slice();
        assert_eq!(CloseSessionRequest::decode(&mut stream).unwrap(), req);
    }
}
