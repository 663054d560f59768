//! Proof-of-work engine with cooperative cancellation.

use crate::block::Block;
use crate::codec::HASH_ZERO;
use crate::crypto::Address;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Leading sentinel characters a block hash must match to be accepted.
pub const DIFFICULTY: usize = 2;

/// How a mining run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MineOutcome {
    /// Target met with the flag still raised; the block is ready to sign
    /// and broadcast.
    Proven,
    /// The shared flag was cleared externally; the result is discarded.
    Aborted,
    /// Nonce space ran out before the target was met. A failure, not a
    /// fatal condition.
    Exhausted,
}

/// Whether `hash` satisfies the difficulty target.
pub fn meets_target(hash: &str) -> bool {
    hash.as_bytes().get(..DIFFICULTY) == HASH_ZERO.as_bytes().get(..DIFFICULTY)
}

/// Searches for a nonce satisfying the difficulty target.
///
/// Callers raise `flag` before starting; clearing it from another task
/// cancels the run cooperatively, checked once per nonce increment. This is
/// the only CPU-bound loop in the system and belongs on a blocking thread.
pub fn mine(block: &mut Block, miner: &Address, flag: &AtomicBool) -> MineOutcome {
    block.data.miner = miner.clone();
    block.rehash();

    info!(miner = %block.data.miner, "mining started");

    while flag.load(Ordering::SeqCst)
        && block.data.nonce < u32::MAX
        && !meets_target(&block.envelope.hash)
    {
        block.data.nonce += 1;
        block.rehash();
    }

    if !flag.load(Ordering::SeqCst) {
        MineOutcome::Aborted
    } else if meets_target(&block.envelope.hash) {
        info!(hash = %block.envelope.hash, nonce = block.data.nonce, "block proven");
        MineOutcome::Proven
    } else {
        MineOutcome::Exhausted
    }
}
