//! The append-only block chain.

use crate::block::Block;
use crate::codec::HASH_NULL;
use crate::crypto::Address;
use serde::{Deserialize, Serialize};

/// One-time reward credited to the chain creator.
pub const CREATOR_REWARD: i64 = 1024;

/// Maximum chain length.
pub const CHAIN_MAX_LEN: usize = 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub creator: Address,
    pub blocks: Vec<Block>,
}

impl Chain {
    pub fn new(creator: Address) -> Self {
        Chain {
            creator,
            blocks: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Index of the last block, -1 when the chain is empty.
    pub fn last_index(&self) -> i64 {
        self.len() as i64 - 1
    }

    /// Hash of the block at `index`, or the null sentinel out of range.
    pub fn hash_at(&self, index: i64) -> String {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.blocks.get(i))
            .map(|block| block.envelope.hash.clone())
            .unwrap_or_else(|| HASH_NULL.clone())
    }

    /// Hash the next block links to: the tip hash, or the null sentinel.
    pub fn tip_hash(&self) -> String {
        self.hash_at(self.last_index())
    }

    /// Balance across the whole chain: the one-time creator reward plus
    /// every block's net effect. The pending block is not included here;
    /// the protocol layer adds it for live balance queries.
    pub fn balance_of(&self, addr: &str) -> i64 {
        let mut balance = if self.creator == addr {
            CREATOR_REWARD
        } else {
            0
        };
        for block in &self.blocks {
            balance += block.balance_of(addr);
        }
        balance
    }

    /// Appends a proven block. Exceeding the chain capacity is a programming
    /// error, not a recoverable condition.
    pub fn push(&mut self, block: Block) {
        assert!(self.len() < CHAIN_MAX_LEN, "chain overflow");
        self.blocks.push(block);
    }
}
