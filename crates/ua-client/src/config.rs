//! Client configuration
//!
//! Plain data with workable defaults. Nothing here reads the process
//! environment; the caller decides where values come from.

use crate::crypto::{SecurityMode, SecurityPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Buffer sizes and chunk limits offered in the Hello message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportLimits {
    pub receive_buffer_size: u32,
    pub send_buffer_size: u32,
    /// 0 means unlimited.
    pub max_message_size: u32,
    /// 0 means unlimited.
    pub max_chunk_count: u32,
}

impl Default for TransportLimits {
    fn default() -> Self {
        Self {
            receive_buffer_size: 65_535,
            send_buffer_size: 65_535,
            max_message_size: 16 * 1024 * 1024,
            max_chunk_count: 4096,
        }
    }
}

/// The user identity presented in ActivateSession.
///
/// The password is held only until activation encrypts it; the encryption
/// path zeroizes the plaintext.
#[derive(Debug, Clone, Default)]
pub enum IdentityToken {
    #[default]
    Anonymous,
    UserName {
        user_name: String,
        password: String,
    },
    X509 {
        certificate_der: Vec<u8>,
    },
}

/// Everything needed to open a channel and run a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// `opc.tcp://host:port[/path]`
    pub endpoint_url: String,
    pub application_uri: String,
    pub product_uri: String,
    pub application_name: String,
    pub session_name: String,
    pub security_policy: SecurityPolicy,
    pub security_mode: SecurityMode,
    /// Requested session timeout in milliseconds.
    pub session_timeout_ms: f64,
    /// Requested secure-channel token lifetime in milliseconds.
    pub channel_lifetime_ms: u32,
    /// Per-request deadline; also sent as the timeout hint.
    #[serde(with = "duration_millis")]
    pub request_timeout: Duration,
    pub transport: TransportLimits,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "opc.tcp://localhost:4840".to_owned(),
            application_uri: "urn:ua-client".to_owned(),
            product_uri: "urn:ua-client".to_owned(),
            application_name: "ua-client".to_owned(),
            session_name: "ua-client session".to_owned(),
            security_policy: SecurityPolicy::None,
            security_mode: SecurityMode::None,
            session_timeout_ms: 1_200_000.0,
            channel_lifetime_ms: 3_600_000,
            request_timeout: Duration::from_secs(30),
            transport: TransportLimits::default(),
        }
    }
}

impl ClientConfig {
    /// A config pointing at `endpoint_url` with everything else default.
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            ..Default::default()
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ClientConfig::default();
        assert!(config.transport.receive_buffer_size >= 8192);
        assert_eq!(config.security_policy, SecurityPolicy::None);
        assert!(config.request_timeout > Duration::ZERO);
    }

    #[test]
    fn identity_defaults_to_anonymous() {
        assert!(matches!(IdentityToken::default(), IdentityToken::Anonymous));
    }
}
