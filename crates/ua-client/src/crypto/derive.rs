//! Symmetric key derivation
//!
//! Both directions derive (signing key, encryption key, IV) from the nonce
//! pair with the P_SHA256 pseudo-random function. The client's keys use the
//! server nonce as secret and the client nonce as seed; the server's keys
//! swap the two.

use crate::crypto::SecurityPolicy;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

/// P_SHA256 from the TLS PRF family:
/// `A(0) = seed; A(i) = HMAC(secret, A(i-1));`
/// `output = HMAC(secret, A(1) || seed) || HMAC(secret, A(2) || seed) || ...`
pub fn p_sha256(secret: &[u8], seed: &[u8], length: usize) -> Vec<u8> {
    let mut output = Vec::with_capacity(length);
    let mut a = hmac_once(secret, seed);
    while output.len() < length {
        let mut input = Vec::with_capacity(a.len() + seed.len());
        input.extend_from_slice(&a);
        input.extend_from_slice(seed);
        output.extend_from_slice(&hmac_once(secret, &input));
        a = hmac_once(secret, &a);
    }
    output.truncate(length);
    output
}

fn hmac_once(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// One direction's derived key material. Wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKeys {
    pub signing_key: Vec<u8>,
    pub encryption_key: Vec<u8>,
    pub iv: Vec<u8>,
}

impl std::fmt::Debug for DerivedKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material never reaches logs.
        f.debug_struct("DerivedKeys").finish_non_exhaustive()
    }
}

impl DerivedKeys {
    /// Derive one direction's keys: `secret` is the peer's nonce, `seed`
    /// the own nonce of the direction being keyed.
    pub fn derive(policy: SecurityPolicy, secret: &[u8], seed: &[u8]) -> Self {
        let sig_len = policy.signing_key_length();
        let enc_len = policy.encryption_key_length();
        let iv_len = policy.iv_length();

        let mut material = p_sha256(secret, seed, sig_len + enc_len + iv_len);
        let keys = Self {
            signing_key: material[..sig_len].to_vec(),
            encryption_key: material[sig_len..sig_len + enc_len].to_vec(),
            iv: material[sig_len + enc_len..].to_vec(),
        };
        material.zeroize();
        keys
    }
}

/// Both directions of a channel token's key material.
#[derive(Clone, Debug)]
pub struct KeySet {
    /// Keys this client signs and encrypts with.
    pub client: DerivedKeys,
    /// Keys the server's chunks are verified and decrypted with.
    pub server: DerivedKeys,
}

impl KeySet {
    pub fn derive(policy: SecurityPolicy, client_nonce: &[u8], server_nonce: &[u8]) -> Self {
        Self {
            client: DerivedKeys::derive(policy, server_nonce, client_nonce),
            server: DerivedKeys::derive(policy, client_nonce, server_nonce),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p_sha256_is_deterministic_and_length_exact() {
        let a = p_sha256(b"secret", b"seed", 72);
        let b = p_sha256(b"secret", b"seed", 72);
        assert_eq!(a, b);
        assert_eq!(a.len(), 72);

        // A prefix of a longer output equals a shorter output.
        let c = p_sha256(b"secret", b"seed", 16);
        assert_eq!(&a[..16], c.as_slice());
    }

    #[test]
    fn different_inputs_diverge() {
        assert_ne!(
            p_sha256(b"secret", b"seed-a", 32),
            p_sha256(b"secret", b"seed-b", 32)
        );
        assert_ne!(
            p_sha256(b"secret-a", b"seed", 32),
            p_sha256(b"secret-b", b"seed", 32)
        );
    }

    #[test]
    fn derived_sizes_match_policy() {
        let keys = DerivedKeys::derive(
            SecurityPolicy::Aes128Sha256RsaOaep,
            &[1u8; 32],
            &[2u8; 32],
        );
        assert_eq!(keys.signing_key.len(), 32);
        assert_eq!(keys.encryption_key.len(), 16);
        assert_eq!(keys.iv.len(), 16);

        let keys = DerivedKeys::derive(SecurityPolicy::Basic256Sha256, &[1u8; 32], &[2u8; 32]);
        assert_eq!(keys.encryption_key.len(), 32);
    }

    #[test]
    fn directions_differ() {
        let set = KeySet::derive(SecurityPolicy::Basic256Sha256, &[1u8; 32], &[2u8; 32]);
        assert_ne!(set.client.signing_key, set.server.signing_key);
        assert_ne!(set.client.encryption_key, set.server.encryption_key);
    }
}
