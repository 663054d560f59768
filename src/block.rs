//! Blocks: bounded transaction batches proven by work.

use crate::codec::{self, HASH_ZERO};
use crate::crypto::{Address, KeyPair};
use crate::error::Result;
use crate::transaction::{Envelope, Transaction};
use serde::{Deserialize, Serialize};

/// Maximum transactions per block.
pub const BLOCK_MAX_TX: usize = 2;

/// The hashed payload of a block. `nonce` is mutated only by mining.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockData {
    pub nonce: u32,
    pub previous: String,
    pub miner: Address,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub envelope: Envelope,
    pub data: BlockData,
}

impl Block {
    /// Fresh empty block linked to `previous` (the chain tip hash, or the
    /// null sentinel when the chain is empty).
    pub fn new(previous: &str) -> Self {
        Block {
            envelope: Envelope::default(),
            data: BlockData {
                previous: previous.to_string(),
                ..BlockData::default()
            },
        }
    }

    pub fn len(&self) -> usize {
        self.data.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.transactions.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= BLOCK_MAX_TX
    }

    /// Appends a transaction. Callers gate on `is_full`; exceeding the block
    /// capacity is a programming error, not a recoverable condition.
    pub fn push(&mut self, tx: Transaction) {
        assert!(self.len() < BLOCK_MAX_TX, "block overflow");
        self.data.transactions.push(tx);
    }

    /// Recomputes the content hash over the block's data payload.
    pub fn rehash(&mut self) {
        self.envelope.hash = codec::hash_of(&self.data);
    }

    /// Mining reward: 1, doubled for every leading hash character equal to
    /// the all-zero sentinel's, scanned until the first mismatch. Surplus
    /// work beyond the difficulty target pays more.
    pub fn reward(&self) -> i64 {
        let matches = self
            .envelope
            .hash
            .chars()
            .zip(HASH_ZERO.chars())
            .take_while(|(a, b)| a == b)
            .count();
        1i64 << matches
    }

    /// Net effect of this block on `addr`: sent amounts leave, received
    /// amounts arrive, the miner collects the reward. When an address is
    /// both sender and receiver of one transaction the sender arm wins.
    pub fn balance_of(&self, addr: &str) -> i64 {
        let mut balance = 0;
        for tx in &self.data.transactions {
            if tx.data.sender == addr {
                balance -= tx.data.amount;
            } else if tx.data.receiver == addr {
                balance += tx.data.amount;
            }
        }
        if self.data.miner == addr {
            balance += self.reward();
        }
        balance
    }

    pub fn sign(&mut self, keys: &KeyPair) -> Result<()> {
        self.envelope.sign(keys)
    }

    pub fn verify(&self) -> bool {
        self.envelope.verify()
    }
}
