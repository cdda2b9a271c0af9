//! Cryptography for the secure channel
//!
//! Three concerns, split by module:
//! - `policy`: the named suites and their parameters
//! - `derive`: P_SHA256 key derivation from the nonce exchange
//! - `symmetric` / `asymmetric`: the actual cipher and signature operations
//! - `identity`: identity-token secret handling
//!
//! Private key material lives in [`asymmetric::AppIdentity`] and derived
//! keys in [`derive::DerivedKeys`]; neither is ever serialised and both are
//! wiped on drop where the type owns the bytes.

pub mod asymmetric;
pub mod derive;
pub mod identity;
pub mod policy;
pub mod symmetric;

pub use asymmetric::AppIdentity;
pub use derive::{DerivedKeys, KeySet};
pub use policy::{SecurityMode, SecurityPolicy};

use rand::RngCore;

/// A fresh random nonce of the policy's length.
pub fn create_nonce(policy: SecurityPolicy) -> Vec<u8> {
    let mut nonce = vec![0u8; policy.nonce_length()];
    if !nonce.is_empty() {
        rand::rngs::OsRng.fill_bytes(&mut nonce);
    }
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_length_follows_policy() {
        assert!(create_nonce(SecurityPolicy::None).is_empty());
        assert_eq!(create_nonce(SecurityPolicy::Basic256Sha256).len(), 32);
    }

    #[test]
    fn nonces_are_random() {
        let a = create_nonce(SecurityPolicy::Basic256Sha256);
        let b = create_nonce(SecurityPolicy::Basic256Sha256);
        assert_ne!(a, b);
    }
}
