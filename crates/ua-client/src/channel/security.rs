//! Per-chunk protection
//!
//! Chunk layout on the wire:
//!
//! ```text
//! ┌──────────────┬────────────┬─────────────────┬───────────────────────────┐
//! │ header (8)   │ channel id │ security header │ sequence │ body │ padding │ signature
//! ├──────────────┼────────────┼─────────────────┴──────────┴──────┴─────────┴──────────
//! │ plaintext    │ plaintext  │ plaintext       │←——— encrypted region ———————————————→
//! └──────────────┴────────────┴─────────────────┘
//! ```
//!
//! OPN chunks use the asymmetric security header (policy URI, sender
//! certificate, receiver thumbprint) and RSA protection; MSG/CLO chunks use
//! the four-byte token id and the derived symmetric keys. The signature
//! covers everything before it and is itself inside the encrypted region.
//! Padding is written as `size + 1` bytes each holding the size, so the
//! last encrypted byte before the signature recovers it.

use crate::crypto::{asymmetric, symmetric, AppIdentity, KeySet, SecurityMode, SecurityPolicy};
use crate::error::{Error, Result};
use crate::transport::framing::{encode_frame, ChunkFlag, MessageHeader, MessageType};
use bytes::{Buf, BufMut};
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use ua_types::encoding::{read_byte_string, read_string, write_byte_string, write_string};

/// Sequence number + request id.
pub const SEQUENCE_HEADER_SIZE: usize = 8;
/// Message header + secure channel id.
const CHUNK_PREFIX_SIZE: usize = 12;

/// A verified, decrypted chunk ready for reassembly.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedChunk {
    pub channel_id: u32,
    /// Token the sender protected the chunk with; None for OPN.
    pub token_id: Option<u32>,
    pub sequence_number: u32,
    pub request_id: u32,
    pub body: Vec<u8>,
}

fn asymmetric_security_header(
    policy_uri: &str,
    sender_certificate: &[u8],
    receiver_thumbprint: &[u8],
) -> Vec<u8> {
    let mut out = Vec::new();
    write_string(&mut out, policy_uri);
    write_byte_string(&mut out, sender_certificate);
    write_byte_string(&mut out, receiver_thumbprint);
    out
}

fn sequence_header(sequence_number: u32, request_id: u32) -> [u8; SEQUENCE_HEADER_SIZE] {
    let mut out = [0u8; SEQUENCE_HEADER_SIZE];
    out[0..4].copy_from_slice(&sequence_number.to_le_bytes());
    out[4..8].copy_from_slice(&request_id.to_le_bytes());
    out
}

/// Padding bytes so that `unpadded + padding` is a multiple of `block`.
/// Every padding byte (including the leading size byte) holds the size.
fn padding_for(unpadded: usize, block: usize) -> Vec<u8> {
    let size = (block - (unpadded + 1) % block) % block;
    vec![size as u8; size + 1]
}

/// Strip `padding + signature` from a decrypted region, validating the
/// size byte.
fn strip_padding(region: &[u8], signature_len: usize) -> Result<usize> {
    if region.len() < signature_len + 1 {
        return Err(Error::Security("chunk too short for its padding".to_owned()));
    }
    let size = region[region.len() - signature_len - 1] as usize;
    let padded = size + 1;
    if region.len() < signature_len + padded {
        return Err(Error::Security(format!(
            "padding size {size} exceeds the chunk"
        )));
    }
    Ok(region.len() - signature_len - padded)
}

/// Largest message body that fits one MSG/CLO chunk of `send_buffer` bytes.
pub fn max_message_body(
    policy: SecurityPolicy,
    mode: SecurityMode,
    send_buffer: usize,
) -> usize {
    let fixed = CHUNK_PREFIX_SIZE + 4 + SEQUENCE_HEADER_SIZE;
    match mode {
        SecurityMode::None => send_buffer - fixed,
        SecurityMode::Sign => send_buffer - fixed - policy.symmetric_signature_length(),
        SecurityMode::SignAndEncrypt => {
            let sig = policy.symmetric_signature_length();
            // The encrypted region must be whole AES blocks.
            let available = send_buffer - CHUNK_PREFIX_SIZE - 4;
            let aligned = available - available % symmetric::AES_BLOCK_SIZE;
            aligned - SEQUENCE_HEADER_SIZE - sig - 1
        }
    }
}

/// Seal one MSG or CLO chunk under the current token.
#[allow(clippy::too_many_arguments)]
pub fn seal_message_chunk(
    policy: SecurityPolicy,
    mode: SecurityMode,
    keys: Option<&KeySet>,
    message_type: MessageType,
    flag: ChunkFlag,
    channel_id: u32,
    token_id: u32,
    sequence_number: u32,
    request_id: u32,
    body: &[u8],
) -> Result<Vec<u8>> {
    let seq = sequence_header(sequence_number, request_id);

    match mode {
        SecurityMode::None => {
            let mut payload = Vec::with_capacity(4 + SEQUENCE_HEADER_SIZE + body.len());
            payload.put_u32_le(token_id);
            payload.extend_from_slice(&seq);
            payload.extend_from_slice(body);
            Ok(encode_frame(message_type, flag, Some(channel_id), &payload))
        }
        SecurityMode::Sign | SecurityMode::SignAndEncrypt => {
            let keys = keys.ok_or_else(|| {
                Error::State("channel has no derived keys for its security mode".to_owned())
            })?;
            let sig_len = policy.symmetric_signature_length();

            let padding = if mode.encrypts() {
                padding_for(
                    SEQUENCE_HEADER_SIZE + body.len() + sig_len,
                    symmetric::AES_BLOCK_SIZE,
                )
            } else {
                Vec::new()
            };

            let total = CHUNK_PREFIX_SIZE
                + 4
                + SEQUENCE_HEADER_SIZE
                + body.len()
                + padding.len()
                + sig_len;

            let mut frame = Vec::with_capacity(total);
            frame.extend_from_slice(message_type.code());
            frame.put_u8(flag.code());
            frame.put_u32_le(total as u32);
            frame.put_u32_le(channel_id);
            frame.put_u32_le(token_id);
            frame.extend_from_slice(&seq);
            frame.extend_from_slice(body);
            frame.extend_from_slice(&padding);

            let signature = symmetric::sign(&keys.client.signing_key, &frame);
            frame.extend_from_slice(&signature);
            debug_assert_eq!(frame.len(), total);

            if mode.encrypts() {
                let offset = CHUNK_PREFIX_SIZE + 4;
                let cipher = symmetric::encrypt(
                    policy,
                    &keys.client.encryption_key,
                    &keys.client.iv,
                    &frame[offset..],
                )?;
                frame.truncate(offset);
                frame.extend_from_slice(&cipher);
            }
            Ok(frame)
        }
    }
}

/// Verify and decrypt one MSG or CLO chunk.
///
/// Until a renewed token's first use, the previous token must remain
/// acceptable, so both key sets are offered.
pub fn open_message_chunk(
    policy: SecurityPolicy,
    mode: SecurityMode,
    header: &MessageHeader,
    frame_body: &[u8],
    current: (u32, Option<&KeySet>),
    previous: Option<(u32, &KeySet)>,
) -> Result<OpenedChunk> {
    let mut stream = frame_body;
    if stream.remaining() < 8 {
        return Err(Error::Transport("chunk too short for its headers".to_owned()));
    }
    let channel_id = stream.get_u32_le();
    let token_id = stream.get_u32_le();

    if mode == SecurityMode::None {
        if stream.remaining() < SEQUENCE_HEADER_SIZE {
            return Err(Error::Transport("chunk too short for its headers".to_owned()));
        }
        let sequence_number = stream.get_u32_le();
        let request_id = stream.get_u32_le();
        return Ok(OpenedChunk {
            channel_id,
            token_id: Some(token_id),
            sequence_number,
            request_id,
            body: stream.to_vec(),
        });
    }

    let keys = if token_id == current.0 {
        current.1.ok_or_else(|| {
            Error::State("channel has no derived keys for its security mode".to_owned())
        })?
    } else if let Some((previous_id, previous_keys)) = previous
        && token_id == previous_id
    {
        previous_keys
    } else {
        return Err(Error::Security(format!(
            "chunk protected with unknown token {token_id}"
        )));
    };

    // Reconstitute the signed byte sequence: header, channel id, token id,
    // then the (decrypted) region.
    let mut frame = Vec::with_capacity(8 + frame_body.len());
    frame.extend_from_slice(header.message_type.code());
    frame.put_u8(header.chunk_flag.code());
    frame.put_u32_le(header.message_size);
    frame.put_u32_le(channel_id);
    frame.put_u32_le(token_id);

    let region = if mode.encrypts() {
        symmetric::decrypt(
            policy,
            &keys.server.encryption_key,
            &keys.server.iv,
            stream,
        )?
    } else {
        stream.to_vec()
    };
    frame.extend_from_slice(&region);

    let sig_len = policy.symmetric_signature_length();
    if frame.len() < sig_len + CHUNK_PREFIX_SIZE + 4 + SEQUENCE_HEADER_SIZE {
        return Err(Error::Security("chunk too short for its signature".to_owned()));
    }
    let (signed, signature) = frame.split_at(frame.len() - sig_len);
    symmetric::verify(&keys.server.signing_key, signed, signature)?;

    let body_end = if mode.encrypts() {
        // region = seq + body + padding + signature
        let inner_end = strip_padding(&region, sig_len)?;
        CHUNK_PREFIX_SIZE + 4 + inner_end
    } else {
        frame.len() - sig_len
    };

    let mut inner = &frame[CHUNK_PREFIX_SIZE + 4..body_end];
    if inner.remaining() < SEQUENCE_HEADER_SIZE {
        return Err(Error::Security("chunk lost its sequence header".to_owned()));
    }
    let sequence_number = inner.get_u32_le();
    let request_id = inner.get_u32_le();

    Ok(OpenedChunk {
        channel_id,
        token_id: Some(token_id),
        sequence_number,
        request_id,
        body: inner.to_vec(),
    })
}

/// Seal the single OPN chunk.
///
/// Under policy None the security header carries the URI and null
/// certificates; otherwise the body is RSA-signed with the own key and
/// encrypted with the server's.
pub fn seal_open_chunk(
    policy: SecurityPolicy,
    identity: Option<&AppIdentity>,
    server: Option<(&[u8], &RsaPublicKey)>,
    channel_id: u32,
    sequence_number: u32,
    request_id: u32,
    body: &[u8],
) -> Result<Vec<u8>> {
    let seq = sequence_header(sequence_number, request_id);

    if policy.is_none() {
        let security_header = asymmetric_security_header(policy.uri(), &[], &[]);
        let mut payload =
            Vec::with_capacity(security_header.len() + SEQUENCE_HEADER_SIZE + body.len());
        payload.extend_from_slice(&security_header);
        payload.extend_from_slice(&seq);
        payload.extend_from_slice(body);
        return Ok(encode_frame(
            MessageType::OpenSecureChannel,
            ChunkFlag::Final,
            Some(channel_id),
            &payload,
        ));
    }

    let identity = identity.ok_or_else(|| {
        Error::State("policies other than None require a client certificate".to_owned())
    })?;
    let (server_certificate, server_key) = server.ok_or_else(|| {
        Error::State("policies other than None require the server certificate".to_owned())
    })?;

    let padding_scheme = policy
        .asymmetric_padding()
        .expect("non-None policy has a padding");
    let signature_scheme = policy
        .asymmetric_signature()
        .expect("non-None policy has a signature");

    let security_header = asymmetric_security_header(
        policy.uri(),
        &identity.certificate_der,
        &asymmetric::thumbprint(server_certificate),
    );

    let own_key = identity.private_key();
    let sig_len = own_key.size();
    let plain_block = asymmetric::plain_block_size(padding_scheme, server_key);
    let cipher_block = asymmetric::cipher_block_size(server_key);

    let padding = padding_for(SEQUENCE_HEADER_SIZE + body.len() + sig_len, plain_block);
    let plain_len = SEQUENCE_HEADER_SIZE + body.len() + padding.len() + sig_len;
    debug_assert!(plain_len.is_multiple_of(plain_block));
    let cipher_len = plain_len / plain_block * cipher_block;

    let total = CHUNK_PREFIX_SIZE + security_header.len() + cipher_len;

    // Sign over the plaintext chunk carrying the final (encrypted) size.
    let mut frame = Vec::with_capacity(CHUNK_PREFIX_SIZE + security_header.len() + plain_len);
    frame.extend_from_slice(MessageType::OpenSecureChannel.code());
    frame.put_u8(ChunkFlag::Final.code());
    frame.put_u32_le(total as u32);
    frame.put_u32_le(channel_id);
    frame.extend_from_slice(&security_header);
    frame.extend_from_slice(&seq);
    frame.extend_from_slice(body);
    frame.extend_from_slice(&padding);

    let signature = asymmetric::sign(signature_scheme, own_key, &frame)?;
    frame.extend_from_slice(&signature);

    let offset = CHUNK_PREFIX_SIZE + security_header.len();
    let cipher = asymmetric::encrypt(padding_scheme, server_key, &frame[offset..])?;
    debug_assert_eq!(cipher.len(), cipher_len);
    frame.truncate(offset);
    frame.extend_from_slice(&cipher);
    debug_assert_eq!(frame.len(), total);
    Ok(frame)
}

/// Parsed asymmetric security header of an inbound OPN chunk.
#[derive(Debug)]
pub struct OpenSecurityHeader {
    pub policy_uri: String,
    pub sender_certificate: Vec<u8>,
    pub receiver_thumbprint: Vec<u8>,
}

/// Verify and decrypt the OPN response chunk.
pub fn open_open_chunk(
    policy: SecurityPolicy,
    identity: Option<&AppIdentity>,
    header: &MessageHeader,
    frame_body: &[u8],
) -> Result<(OpenedChunk, OpenSecurityHeader)> {
    let mut stream = frame_body;
    if stream.remaining() < 4 {
        return Err(Error::Transport("OPN chunk too short".to_owned()));
    }
    let channel_id = stream.get_u32_le();

    let security = {
        let policy_uri = read_string(&mut stream).map_err(Error::Decode)?;
        let sender_certificate = read_byte_string(&mut stream).map_err(Error::Decode)?;
        let receiver_thumbprint = read_byte_string(&mut stream).map_err(Error::Decode)?;
        OpenSecurityHeader {
            policy_uri,
            sender_certificate,
            receiver_thumbprint,
        }
    };

    if SecurityPolicy::from_uri(&security.policy_uri) != Some(policy) {
        return Err(Error::Security(format!(
            "server answered under policy {:?}, expected {:?}",
            security.policy_uri,
            policy.uri()
        )));
    }

    if policy.is_none() {
        if stream.remaining() < SEQUENCE_HEADER_SIZE {
            return Err(Error::Transport("OPN chunk too short".to_owned()));
        }
        let sequence_number = stream.get_u32_le();
        let request_id = stream.get_u32_le();
        let chunk = OpenedChunk {
            channel_id,
            token_id: None,
            sequence_number,
            request_id,
            body: stream.to_vec(),
        };
        return Ok((chunk, security));
    }

    let identity = identity.ok_or_else(|| {
        Error::State("policies other than None require a client certificate".to_owned())
    })?;
    let padding_scheme = policy
        .asymmetric_padding()
        .expect("non-None policy has a padding");
    let signature_scheme = policy
        .asymmetric_signature()
        .expect("non-None policy has a signature");

    // The response is encrypted with our public key; decrypt with the
    // private one.
    let region = asymmetric::decrypt(padding_scheme, identity.private_key(), stream)?;

    let server_key = asymmetric::public_key_from_cert(&security.sender_certificate)?;
    let sig_len = server_key.size();
    if region.len() < sig_len + SEQUENCE_HEADER_SIZE + 1 {
        return Err(Error::Security("OPN chunk too short after decryption".to_owned()));
    }

    // The server signed the plaintext with the wire message size.
    let consumed = frame_body.len() - stream.len();
    let mut signed = Vec::with_capacity(8 + consumed + region.len() - sig_len);
    signed.extend_from_slice(header.message_type.code());
    signed.put_u8(header.chunk_flag.code());
    signed.put_u32_le(header.message_size);
    signed.extend_from_slice(&frame_body[..consumed]);
    signed.extend_from_slice(&region[..region.len() - sig_len]);
    asymmetric::verify(
        signature_scheme,
        &server_key,
        &signed,
        &region[region.len() - sig_len..],
    )?;

    let body_end = strip_padding(&region, sig_len)?;
    let mut inner = &region[..body_end];
    if inner.remaining() < SEQUENCE_HEADER_SIZE {
        return Err(Error::Security("OPN chunk lost its sequence header".to_owned()));
    }
    let sequence_number = inner.get_u32_le();
    let request_id = inner.get_u32_le();

    let chunk = OpenedChunk {
        channel_id,
        token_id: None,
        sequence_number,
        request_id,
        body: inner.to_vec(),
    };
    Ok((chunk, security))
}
