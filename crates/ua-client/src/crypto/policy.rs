//! Security policies
//!
//! A policy names the whole suite: asymmetric padding and signature,
//! symmetric cipher, HMAC, nonce length and derived key sizes. The URI is
//! what travels on the wire.

use serde::{Deserialize, Serialize};

pub const URI_NONE: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";
pub const URI_BASIC256SHA256: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256";
pub const URI_AES128_SHA256_RSAOAEP: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep";
pub const URI_AES256_SHA256_RSAPSS: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss";

/// RSA padding used for key transport (OPN bodies, password encryption).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsymmetricPadding {
    Pkcs1,
    OaepSha1,
    OaepSha256,
}

impl AsymmetricPadding {
    /// URI carried in the identity token's `encryption_algorithm` field.
    pub fn algorithm_uri(&self) -> &'static str {
        match self {
            AsymmetricPadding::Pkcs1 => "http://www.w3.org/2001/04/xmlenc#rsa-1_5",
            AsymmetricPadding::OaepSha1 => "http://www.w3.org/2001/04/xmlenc#rsa-oaep",
            AsymmetricPadding::OaepSha256 => {
                "http://opcfoundation.org/UA/security/rsa-oaep-sha2-256"
            }
        }
    }

    /// Padding overhead per RSA block.
    pub fn overhead(&self) -> usize {
        match self {
            AsymmetricPadding::Pkcs1 => 11,
            AsymmetricPadding::OaepSha1 => 42,
            AsymmetricPadding::OaepSha256 => 66,
        }
    }
}

/// RSA signature scheme for asymmetric chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsymmetricSignature {
    RsaPkcs1Sha256,
    RsaPssSha256,
}

/// The named cipher suites this client implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SecurityPolicy {
    #[default]
    None,
    Basic256Sha256,
    Aes128Sha256RsaOaep,
    Aes256Sha256RsaPss,
}

impl SecurityPolicy {
    pub fn uri(&self) -> &'static str {
        match self {
            SecurityPolicy::None => URI_NONE,
            SecurityPolicy::Basic256Sha256 => URI_BASIC256SHA256,
            SecurityPolicy::Aes128Sha256RsaOaep => URI_AES128_SHA256_RSAOAEP,
            SecurityPolicy::Aes256Sha256RsaPss => URI_AES256_SHA256_RSAPSS,
        }
    }

    /// Map a URI back to a policy; unknown URIs are `None` (the option, not
    /// the policy).
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            URI_NONE | "" => Some(SecurityPolicy::None),
            URI_BASIC256SHA256 => Some(SecurityPolicy::Basic256Sha256),
            URI_AES128_SHA256_RSAOAEP => Some(SecurityPolicy::Aes128Sha256RsaOaep),
            URI_AES256_SHA256_RSAPSS => Some(SecurityPolicy::Aes256Sha256RsaPss),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        *self == SecurityPolicy::None
    }

    /// Random nonce length for key derivation.
    pub fn nonce_length(&self) -> usize {
        if self.is_none() { 0 } else { 32 }
    }

    /// Derived symmetric signing key length (HMAC-SHA256 throughout).
    pub fn signing_key_length(&self) -> usize {
        32
    }

    /// Derived AES key length.
    pub fn encryption_key_length(&self) -> usize {
        match self {
            SecurityPolicy::None => 0,
            SecurityPolicy::Aes128Sha256RsaOaep => 16,
            SecurityPolicy::Basic256Sha256 | SecurityPolicy::Aes256Sha256RsaPss => 32,
        }
    }

    /// AES-CBC initialization vector length.
    pub fn iv_length(&self) -> usize {
        16
    }

    /// Symmetric signature (HMAC-SHA256) length.
    pub fn symmetric_signature_length(&self) -> usize {
        32
    }

    pub fn asymmetric_padding(&self) -> Option<AsymmetricPadding> {
        match self {
            SecurityPolicy::None => None,
            SecurityPolicy::Basic256Sha256 | SecurityPolicy::Aes128Sha256RsaOaep => {
                Some(AsymmetricPadding::OaepSha1)
            }
            SecurityPolicy::Aes256Sha256RsaPss => Some(AsymmetricPadding::OaepSha256),
        }
    }

    pub fn asymmetric_signature(&self) -> Option<AsymmetricSignature> {
        match self {
            SecurityPolicy::None => None,
            SecurityPolicy::Basic256Sha256 | SecurityPolicy::Aes128Sha256RsaOaep => {
                Some(AsymmetricSignature::RsaPkcs1Sha256)
            }
            SecurityPolicy::Aes256Sha256RsaPss => Some(AsymmetricSignature::RsaPssSha256),
        }
    }

    /// Algorithm URI for SignatureData entries produced under this policy
    /// (client signature, user token signature).
    pub fn asymmetric_signature_uri(&self) -> &'static str {
        match self.asymmetric_signature() {
            None => "",
            Some(AsymmetricSignature::RsaPkcs1Sha256) => {
                "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"
            }
            Some(AsymmetricSignature::RsaPssSha256) => {
                "http://opcfoundation.org/UA/security/rsa-pss-sha2-256"
            }
        }
    }
}

/// Client-side view of the message security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SecurityMode {
    #[default]
    None,
    Sign,
    SignAndEncrypt,
}

impl SecurityMode {
    pub fn signs(&self) -> bool {
        !matches!(self, SecurityMode::None)
    }

    pub fn encrypts(&self) -> bool {
        matches!(self, SecurityMode::SignAndEncrypt)
    }
}

impl From<SecurityMode> for ua_types::service::channel::MessageSecurityMode {
    fn from(mode: SecurityMode) -> Self {
        use ua_types::service::channel::MessageSecurityMode as Wire;
        match mode {
            SecurityMode::None => Wire::None,
            SecurityMode::Sign => Wire::Sign,
            SecurityMode::SignAndEncrypt => Wire::SignAndEncrypt,
        }
    }
}
