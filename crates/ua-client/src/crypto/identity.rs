//! Identity token secrets
//!
//! The password composition for a UserName token is
//! `u32 length || utf8 password || server nonce`, where the length covers
//! password and nonce. The whole composition is RSA-encrypted with the
//! server certificate under the *token policy's* security policy. The
//! plaintext is wiped as soon as the ciphertext exists.

use crate::crypto::{asymmetric, SecurityPolicy};
use crate::error::{Error, Result};
use bytes::BufMut;
use zeroize::Zeroize;

/// Encrypted password plus the algorithm URI to put on the token.
pub struct EncryptedSecret {
    pub data: Vec<u8>,
    pub algorithm_uri: String,
}

/// Encrypt a password for a UserName identity token.
///
/// `password` is consumed and zeroized, whatever the outcome. Over policy
/// None the password travels as its raw bytes with an empty algorithm URI;
/// that is only acceptable when the channel itself encrypts.
pub fn encrypt_password(
    policy: SecurityPolicy,
    server_certificate_der: &[u8],
    mut password: String,
    server_nonce: &[u8],
) -> Result<EncryptedSecret> {
    let Some(padding) = policy.asymmetric_padding() else {
        let secret = EncryptedSecret {
            data: password.as_bytes().to_vec(),
            algorithm_uri: String::new(),
        };
        password.zeroize();
        return Ok(secret);
    };

    if server_certificate_der.is_empty() {
        password.zeroize();
        return Err(Error::Security(
            "password encryption requires the server certificate".to_owned(),
        ));
    }

    let mut composed = Vec::with_capacity(4 + password.len() + server_nonce.len());
    composed.put_u32_le((password.len() + server_nonce.len()) as u32);
    composed.extend_from_slice(password.as_bytes());
    composed.extend_from_slice(server_nonce);
    password.zeroize();

    let result = asymmetric::public_key_from_cert(server_certificate_der)
        .and_then(|key| asymmetric::encrypt(padding, &key, &composed));
    composed.zeroize();

    Ok(EncryptedSecret {
        data: result?,
        algorithm_uri: padding.algorithm_uri().to_owned(),
    })
}
