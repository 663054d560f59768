//! Signed value transfers and the signable envelope they share with blocks.

use crate::codec;
use crate::crypto::{self, Address, KeyPair};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Signature bundle attached to every ledger object. `hash` covers the
/// object's data payload only, computed before signing; `verifier` and
/// `signature` stay empty until the owner signs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub verifier: String,
    pub signature: String,
    pub hash: String,
}

impl Envelope {
    /// Fills verifier and signature over the stored hash.
    pub fn sign(&mut self, keys: &KeyPair) -> Result<()> {
        self.verifier = keys.verifier();
        self.signature = keys.sign_digest(&self.hash)?;
        Ok(())
    }

    pub fn verify(&self) -> bool {
        crypto::verify(&self.verifier, &self.hash, &self.signature)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionData {
    pub id: u64,
    pub previous: String,
    pub sender: Address,
    pub receiver: Address,
    pub amount: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub envelope: Envelope,
    pub data: TransactionData,
}

impl Transaction {
    /// Builds an unsigned transaction. The id is a random uniqueness nonce,
    /// not an ordering key; `previous` tags the tip hash known at submission
    /// time. The amount may be any value; no underflow check at this layer.
    pub fn new(previous: &str, sender: &str, receiver: &str, amount: i64) -> Self {
        let data = TransactionData {
            id: rand::random(),
            previous: previous.to_string(),
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            amount,
        };
        let hash = codec::hash_of(&data);
        Transaction {
            envelope: Envelope {
                hash,
                ..Envelope::default()
            },
            data,
        }
    }

    pub fn sign(&mut self, keys: &KeyPair) -> Result<()> {
        self.envelope.sign(keys)
    }

    pub fn verify(&self) -> bool {
        self.envelope.verify()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transaction_hashes_its_data_payload() {
        let tx = Transaction::new("prev", "alice", "bob", 100);
        assert_eq!(tx.envelope.hash, codec::hash_of(&tx.data));
        assert!(tx.envelope.verifier.is_empty());
        assert!(tx.envelope.signature.is_empty());
    }

    #[test]
    fn signing_fills_envelope_without_touching_hash() {
        let keys = KeyPair::generate();
        let mut tx = Transaction::new("prev", &keys.address(), "bob", 5);
        let hash_before = tx.envelope.hash.clone();

        tx.sign(&keys).unwrap();

        assert_eq!(tx.envelope.hash, hash_before);
        assert_eq!(tx.envelope.verifier, keys.verifier());
        assert!(tx.verify());
    }

    #[test]
    fn unsigned_transaction_does_not_verify() {
        let tx = Transaction::new("prev", "alice", "bob", 1);
        assert!(!tx.verify());
    }

    #[test]
    fn foreign_signature_does_not_verify() {
        let keys = KeyPair::generate();
        let mut tx = Transaction::new("prev", &keys.address(), "bob", 1);
        tx.sign(&keys).unwrap();
        tx.envelope.verifier = KeyPair::generate().verifier();
        assert!(!tx.verify());
    }

    #[test]
    fn random_ids_differ() {
        let a = Transaction::new("prev", "alice", "bob", 1);
        let b = Transaction::new("prev", "alice", "bob", 1);
        assert_ne!(a.data.id, b.data.id);
        assert_ne!(a.envelope.hash, b.envelope.hash);
    }

    #[test]
    fn wire_round_trip() {
        let keys = KeyPair::generate();
        let mut tx = Transaction::new("prev", &keys.address(), "bob", 77);
        tx.sign(&keys).unwrap();

        let data = codec::encode(&tx).unwrap();
        let back: Transaction = codec::decode(&data).unwrap();
        assert_eq!(tx, back);
        assert!(back.verify());
    }
}
