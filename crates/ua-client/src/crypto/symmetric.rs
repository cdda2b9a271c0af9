//! Symmetric chunk protection: HMAC-SHA256 signatures, AES-CBC encryption

use crate::crypto::SecurityPolicy;
use crate::error::{Error, Result};
use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;
type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES block size; encrypted regions are padded to a multiple of this.
pub const AES_BLOCK_SIZE: usize = 16;

/// HMAC-SHA256 over `data`.
pub fn sign(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Constant-time signature check.
pub fn verify(key: &[u8], data: &[u8], signature: &[u8]) -> Result<()> {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(data);
    mac.verify_slice(signature)
        .map_err(|_| Error::Security("chunk signature verification failed".to_owned()))
}

/// Encrypt a whole number of AES blocks in CBC mode. The caller pads.
pub fn encrypt(policy: SecurityPolicy, key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if !data.len().is_multiple_of(AES_BLOCK_SIZE) {
        return Err(Error::Security(format!(
            "plaintext length {} is not block aligned",
            data.len()
        )));
    }
    match policy.encryption_key_length() {
        16 => Ok(Aes128CbcEnc::new_from_slices(key, iv)
            .map_err(|_| bad_key_material())?
            .encrypt_padded_vec_mut::<NoPadding>(data)),
        32 => Ok(Aes256CbcEnc::new_from_slices(key, iv)
            .map_err(|_| bad_key_material())?
            .encrypt_padded_vec_mut::<NoPadding>(data)),
        other => Err(Error::Security(format!(
            "policy has no symmetric cipher (key length {other})"
        ))),
    }
}

fn bad_key_material() -> Error {
    Error::Security("derived key material does not fit the cipher".to_owned())
}

/// Decrypt a whole number of AES blocks in CBC mode. Padding is left in
/// place for the caller to strip.
pub fn decrypt(policy: SecurityPolicy, key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if !data.len().is_multiple_of(AES_BLOCK_SIZE) {
        return Err(Error::Security(format!(
            "ciphertext length {} is not block aligned",
            data.len()
        )));
    }
    let result = match policy.encryption_key_length() {
        16 => Aes128CbcDec::new_from_slices(key, iv)
            .map_err(|_| bad_key_material())?
            .decrypt_padded_vec_mut::<NoPadding>(data),
        32 => Aes256CbcDec::new_from_slices(key, iv)
            .map_err(|_| bad_key_material())?
            .decrypt_padded_vec_mut::<NoPadding>(data),
        other => {
            return Err(Error::Security(format!(
                "policy has no symmetric cipher (key length {other})"
            )));
        }
    };
    result.map_err(|_| Error::Security("symmetric decryption failed".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let key = [0x0Bu8; 32];
        let data = b"sequence header and body";
        let signature = sign(&key, data);
        assert_eq!(signature.len(), 32);
        verify(&key, data, &signature).unwrap();
    }

    #[test]
    fn tampered_data_fails_verification() {
        let key = [0x0Bu8; 32];
        let signature = sign(&key, b"original");
        assert!(verify(&key, b"tampered", &signature).is_err());
    }

    #[test]
    fn wrong_key_fails_verification() {
        let signature = sign(&[1u8; 32], b"data");
        assert!(verify(&[2u8; 32], b"data", &signature).is_err());
    }

    #[test]
    fn aes_roundtrip_both_key_sizes() {
        for (policy, key_len) in [
            (SecurityPolicy::Aes128Sha256RsaOaep, 16usize),
            (SecurityPolicy::Basic256Sha256, 32),
        ] {
            let key = vec![0x42u8; key_len];
            let iv = [0x24u8; 16];
            let plain = vec![7u8; 64];

            let cipher = encrypt(policy, &key, &iv, &plain).unwrap();
            assert_eq!(cipher.len(), plain.len());
            assert_ne!(cipher, plain);

            let decrypted = decrypt(policy, &key, &iv, &cipher).unwrap();
            assert_eq!(decrypted, plain);
        }
    }

    #[test]
    fn unaligned_input_rejected() {
        let key = [0u8; 32];
        let iv = [0u8; 16];
        assert!(encrypt(SecurityPolicy::Basic256Sha256, &key, &iv, &[1u8; 17]).is_err());
        assert!(decrypt(SecurityPolicy::Basic256Sha256, &key, &iv, &[1u8; 31]).is_err());
    }

    #[test]
    fn policy_none_has_no_cipher() {
        let result = encrypt(SecurityPolicy::None, &[], &[], &[0u8; 16]);
        assert!(matches!(result, Err(Error::Security(_))));
    }
}
