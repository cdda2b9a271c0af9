//! RSA operations: key transport, signatures, certificate plumbing
//!
//! Certificates stay as opaque DER byte strings everywhere else in the
//! stack; this module is the only place that looks inside one, and only to
//! lift out the RSA public key and compute the SHA-1 thumbprint.

use crate::crypto::policy::{AsymmetricPadding, AsymmetricSignature};
use crate::error::{Error, Result};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, Pkcs1v15Encrypt, Pkcs1v15Sign, Pss, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use x509_cert::der::{Decode, Encode};
use x509_cert::Certificate;

/// The application's own certificate and private key, required for any
/// policy other than None. Loading from files is the caller's concern.
#[derive(Clone)]
pub struct AppIdentity {
    pub certificate_der: Vec<u8>,
    private_key: RsaPrivateKey,
}

impl std::fmt::Debug for AppIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppIdentity")
            .field("certificate_der_len", &self.certificate_der.len())
            .finish_non_exhaustive()
    }
}

impl AppIdentity {
    /// Build from a DER certificate and a PKCS#8 DER private key.
    pub fn from_der(certificate_der: Vec<u8>, private_key_der: &[u8]) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_der(private_key_der)
            .map_err(|e| Error::Security(format!("cannot parse private key: {e}")))?;
        Ok(Self {
            certificate_der,
            private_key,
        })
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    /// SHA-1 thumbprint of the own certificate.
    pub fn thumbprint(&self) -> Vec<u8> {
        thumbprint(&self.certificate_der)
    }
}

/// SHA-1 over the raw DER, the receiver-certificate reference in
/// asymmetric security headers.
pub fn thumbprint(certificate_der: &[u8]) -> Vec<u8> {
    let mut hasher = Sha1::new();
    hasher.update(certificate_der);
    hasher.finalize().to_vec()
}

/// Extract the RSA public key from an X.509 certificate DER.
pub fn public_key_from_cert(certificate_der: &[u8]) -> Result<RsaPublicKey> {
    let certificate = Certificate::from_der(certificate_der)
        .map_err(|e| Error::Security(format!("cannot parse certificate: {e}")))?;
    let spki_der = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| Error::Security(format!("cannot re-encode public key info: {e}")))?;
    RsaPublicKey::from_public_key_der(&spki_der)
        .map_err(|e| Error::Security(format!("certificate carries no RSA key: {e}")))
}

/// Ciphertext block size: the modulus size.
pub fn cipher_block_size(key: &RsaPublicKey) -> usize {
    key.size()
}

/// Plaintext block capacity under the given padding.
pub fn plain_block_size(padding: AsymmetricPadding, key: &RsaPublicKey) -> usize {
    key.size() - padding.overhead()
}

/// Encrypt data of any length by splitting it into padded RSA blocks.
pub fn encrypt(
    padding: AsymmetricPadding,
    key: &RsaPublicKey,
    data: &[u8],
) -> Result<Vec<u8>> {
    let block = plain_block_size(padding, key);
    let mut out = Vec::with_capacity(data.len().div_ceil(block) * key.size());
    let mut rng = OsRng;
    for chunk in data.chunks(block) {
        let encrypted = match padding {
            AsymmetricPadding::Pkcs1 => key.encrypt(&mut rng, Pkcs1v15Encrypt, chunk),
            AsymmetricPadding::OaepSha1 => key.encrypt(&mut rng, Oaep::new::<Sha1>(), chunk),
            AsymmetricPadding::OaepSha256 => {
                key.encrypt(&mut rng, Oaep::new::<Sha256>(), chunk)
            }
        }
        .map_err(|e| Error::Security(format!("rsa encryption failed: {e}")))?;
        out.extend_from_slice(&encrypted);
    }
    Ok(out)
}

/// Decrypt a sequence of RSA blocks.
pub fn decrypt(
    padding: AsymmetricPadding,
    key: &RsaPrivateKey,
    data: &[u8],
) -> Result<Vec<u8>> {
    let block = key.size();
    if !data.len().is_multiple_of(block) {
        return Err(Error::Security(format!(
            "ciphertext length {} is not a multiple of the key size {block}",
            data.len()
        )));
    }
    let mut out = Vec::with_capacity(data.len());
    for chunk in data.chunks(block) {
        let decrypted = match padding {
            AsymmetricPadding::Pkcs1 => key.decrypt(Pkcs1v15Encrypt, chunk),
            AsymmetricPadding::OaepSha1 => key.decrypt(Oaep::new::<Sha1>(), chunk),
            AsymmetricPadding::OaepSha256 => key.decrypt(Oaep::new::<Sha256>(), chunk),
        }
        .map_err(|e| Error::Security(format!("rsa decryption failed: {e}")))?;
        out.extend_from_slice(&decrypted);
    }
    Ok(out)
}

/// Sign SHA-256(data) with the chosen scheme.
pub fn sign(
    scheme: AsymmetricSignature,
    key: &RsaPrivateKey,
    data: &[u8],
) -> Result<Vec<u8>> {
    let digest = Sha256::digest(data);
    match scheme {
        AsymmetricSignature::RsaPkcs1Sha256 => key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| Error::Security(format!("rsa signing failed: {e}"))),
        AsymmetricSignature::RsaPssSha256 => key
            .sign_with_rng(&mut OsRng, Pss::new::<Sha256>(), &digest)
            .map_err(|e| Error::Security(format!("rsa-pss signing failed: {e}"))),
    }
}

/// Verify a signature over SHA-256(data).
pub fn verify(
    scheme: AsymmetricSignature,
    key: &RsaPublicKey,
    data: &[u8],
    signature: &[u8],
) -> Result<()> {
    let digest = Sha256::digest(data);
    match scheme {
        AsymmetricSignature::RsaPkcs1Sha256 => key
            .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
            .map_err(|_| Error::Security("rsa signature verification failed".to_owned())),
        AsymmetricSignature::RsaPssSha256 => key
            .verify(Pss::new::<Sha256>(), &digest, signature)
            .map_err(|_| Error::Security("rsa-pss signature verification failed".to_owned())),
    }
}
