//! Cryptographic identity for emberchain

use crate::codec;
use crate::error::{ChainError, Result};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{ecdsa::Signature, All, Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A thread-safe, lazily initialized Secp256k1 context.
/// This prevents repeated, unnecessary context creation.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Account identity: base64 of the SHA-256 of the compressed public key point.
/// Deterministic and irreversible; two distinct keys collide only with
/// cryptographic-hash probability.
pub type Address = String;

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

/// Key material as persisted in the data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredKey {
    pub secret: String,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    /// Recovers a KeyPair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let secret_key = SecretKey::from_slice(bytes)
            .map_err(|e| ChainError::Crypto(format!("invalid secret key bytes: {e}")))?;
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        Ok(KeyPair {
            secret_key,
            public_key,
        })
    }

    pub fn from_stored(stored: &StoredKey) -> Result<Self> {
        Self::from_secret_bytes(&codec::decode_b64(&stored.secret)?)
    }

    pub fn to_stored(&self) -> StoredKey {
        StoredKey {
            secret: codec::encode_b64(&self.secret_key.secret_bytes()),
        }
    }

    /// The compressed public key point, text-encoded. Stored as the envelope
    /// verifier on signed objects.
    pub fn verifier(&self) -> String {
        codec::encode_b64(&self.public_key.serialize())
    }

    pub fn address(&self) -> Address {
        address_of(&self.public_key)
    }

    /// Signs a content hash (base64 SHA-256 digest), returning the compact
    /// signature text-encoded.
    pub fn sign_digest(&self, hash: &str) -> Result<String> {
        let digest = codec::decode_b64(hash)?;
        let message = Message::from_digest_slice(&digest)
            .map_err(|e| ChainError::Crypto(format!("invalid digest: {e}")))?;
        let signature = SECP256K1_CONTEXT.sign_ecdsa(&message, &self.secret_key);
        Ok(codec::encode_b64(&signature.serialize_compact()))
    }
}

/// Derives the address of a public key.
pub fn address_of(public_key: &PublicKey) -> Address {
    let digest: [u8; 32] = Sha256::digest(public_key.serialize()).into();
    codec::encode_b64(&digest)
}

/// Verifies `signature` over `hash` against `verifier`. Malformed input of
/// any kind is a normal `false`, never an error.
pub fn verify(verifier: &str, hash: &str, signature: &str) -> bool {
    let Ok(key_bytes) = codec::decode_b64(verifier) else {
        return false;
    };
    let Ok(public_key) = PublicKey::from_slice(&key_bytes) else {
        return false;
    };
    let Ok(digest) = codec::decode_b64(hash) else {
        return false;
    };
    let Ok(message) = Message::from_digest_slice(&digest) else {
        return false;
    };
    let Ok(sig_bytes) = codec::decode_b64(signature) else {
        return false;
    };
    let Ok(sig) = Signature::from_compact(&sig_bytes) else {
        return false;
    };
    SECP256K1_CONTEXT
        .verify_ecdsa(&message, &sig, &public_key)
        .is_ok()
}
