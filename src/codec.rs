//! Canonical encoding and content hashing.
//!
//! One deterministic encoding serves three roles: wire payloads, persisted
//! resources, and the input to the content-hash function. Field order follows
//! struct declaration order, so two semantically distinct values never encode
//! to the same bytes and every node derives identical hashes.

use crate::error::{ChainError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Text encoding of a 32-byte all-zero hash. Its leading characters form the
/// difficulty target and the reward sentinel.
pub static HASH_ZERO: Lazy<String> = Lazy::new(|| encode_b64(&[0u8; 32]));

/// Text encoding of the hash of the empty byte string. Stands in for "no such
/// block" when a chain index is out of range.
pub static HASH_NULL: Lazy<String> = Lazy::new(|| {
    let digest: [u8; 32] = Sha256::digest(b"").into();
    encode_b64(&digest)
});

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| ChainError::Codec(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    serde_json::from_slice(data).map_err(|e| ChainError::Codec(e.to_string()))
}

pub fn encode_b64(data: &[u8]) -> String {
    BASE64.encode(data)
}

pub fn decode_b64(text: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(text)
        .map_err(|e| ChainError::Codec(format!("invalid base64: {e}")))
}

/// Content hash: base64 of the SHA-256 of the canonical encoding.
pub fn hash_of<T: Serialize>(value: &T) -> String {
    let data = encode(value).expect("canonical encoding of ledger types is infallible");
    let digest: [u8; 32] = Sha256::digest(&data).into();
    encode_b64(&digest)
}
