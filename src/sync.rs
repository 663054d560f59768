//! Pull-based chain synchronization.
//!
//! Each round asks every configured peer for its chain length, pulls the
//! full chain from the longest one and replaces the local chain wholesale.
//! The fetched chain is trusted as-is: no merge, no re-validation of its
//! blocks. Peers are assumed honest.

use crate::network;
use crate::node::Node;
use crate::store::CHAIN_FILE;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Selects the peer reporting the strictly greatest chain length. Ties keep
/// the first-seen candidate; unreachable peers report nothing and are never
/// chosen. `None` only when the peer list is empty.
pub async fn choose(peers: &[String]) -> Option<String> {
    let mut best = peers.first()?.clone();
    let mut best_length = 0i64;

    for peer in peers {
        if let Some(length) = network::length(peer).await {
            if length > best_length {
                best = peer.clone();
                best_length = length;
            }
        }
    }

    Some(best)
}

/// One sync round: pull the longest peer's chain, replace the local chain
/// wholesale, persist the result. The pending block is left untouched.
pub async fn sync_once(node: &Node) {
    let Some(best) = choose(&node.peers).await else {
        return;
    };
    let Some(chain) = network::chain(&best).await else {
        warn!(peer = %best, "chain pull failed");
        return;
    };

    let snapshot = {
        let mut state = node.state.lock().await;
        state.chain = chain;
        state.chain.clone()
    };
    info!(peer = %best, length = snapshot.len(), "chain synchronized");

    if let Err(e) = node.store.save(CHAIN_FILE, &snapshot) {
        warn!(error = %e, "chain persist failed");
    }
}

/// Periodic pull-replace loop. The first round runs immediately.
pub async fn run(node: Arc<Node>) {
    let mut ticker =
        tokio::time::interval(Duration::from_secs(node.config.sync_interval_secs));
    loop {
        ticker.tick().await;
        sync_once(&node).await;
    }
}
