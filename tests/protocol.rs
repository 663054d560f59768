//! Integration tests for the peer protocol, driven over real TCP sockets

use emberchain::block::Block;
use emberchain::chain::{Chain, CREATOR_REWARD};
use emberchain::codec::HASH_NULL;
use emberchain::config::Config;
use emberchain::crypto::KeyPair;
use emberchain::network;
use emberchain::node::Node;
use emberchain::store::{Store, CHAIN_FILE};
use emberchain::sync;
use emberchain::transaction::Transaction;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Spawns a serving node on an ephemeral port. The TempDir must stay alive
/// for the duration of the test.
async fn spawn_node(peers: Vec<String>, chain: Chain) -> (String, Arc<Node>, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let keys = KeyPair::generate();
    let node = Node::new(Config::default(), keys, peers, chain, store);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(node.clone().serve(listener));

    (addr, node, dir)
}

/// A chain of `n` linked empty blocks.
fn chain_of(creator: &str, n: usize) -> Chain {
    let mut chain = Chain::new(creator.to_string());
    for _ in 0..n {
        let mut block = Block::new(&chain.tip_hash());
        block.rehash();
        chain.push(block);
    }
    chain
}

fn signed_transfer(keys: &KeyPair, receiver: &str, amount: i64) -> Transaction {
    let mut tx = Transaction::new("prev", &keys.address(), receiver, amount);
    tx.sign(keys).unwrap();
    tx
}

/// An externally mined, signed block carrying no transactions.
fn proven_external_block(keys: &KeyPair, previous: &str) -> Block {
    let mut block = Block::new(previous);
    let flag = std::sync::atomic::AtomicBool::new(true);
    emberchain::miner::mine(&mut block, &keys.address(), &flag);
    block.sign(keys).unwrap();
    block
}

#[tokio::test]
async fn read_only_queries_on_an_empty_chain() {
    let creator = KeyPair::generate();
    let (addr, node, _dir) = spawn_node(Vec::new(), Chain::new(creator.address())).await;

    assert_eq!(network::length(&addr).await, Some(0));
    assert_eq!(network::last(&addr).await, Some(-1));
    assert_eq!(network::hash_at(&addr, 0).await, Some(HASH_NULL.clone()));
    assert_eq!(network::hash_at(&addr, -1).await, Some(HASH_NULL.clone()));
    assert_eq!(
        network::node_addr(&addr).await,
        Some(node.keys.address())
    );

    // The creator's one-time reward is visible; strangers hold nothing.
    assert_eq!(
        network::balance(&addr, &creator.address()).await,
        Some(CREATOR_REWARD)
    );
    assert_eq!(
        network::balance(&addr, &KeyPair::generate().address()).await,
        Some(0)
    );
}

#[tokio::test]
async fn chain_pull_returns_the_full_chain() {
    let chain = chain_of("creator", 3);
    let (addr, _node, _dir) = spawn_node(Vec::new(), chain.clone()).await;

    let pulled = network::chain(&addr).await.expect("chain pull");
    assert_eq!(pulled, chain);
}

#[tokio::test]
async fn valid_transaction_is_acked_and_counted_in_pending_balance() {
    let alice = KeyPair::generate();
    let (addr, _node, _dir) = spawn_node(Vec::new(), Chain::new("creator".to_string())).await;

    let tx = signed_transfer(&alice, "bob", 100);
    assert!(network::send_tx(&addr, &tx).await);

    // One transaction does not fill the block; the amount shows up through
    // the pending block in live balances while the chain stays empty.
    assert_eq!(network::balance(&addr, "bob").await, Some(100));
    assert_eq!(network::balance(&addr, &alice.address()).await, Some(-100));
    assert_eq!(network::length(&addr).await, Some(0));
}

#[tokio::test]
async fn unsigned_transaction_is_rejected() {
    let (addr, _node, _dir) = spawn_node(Vec::new(), Chain::new("creator".to_string())).await;

    let tx = Transaction::new("prev", "alice", "bob", 100);
    assert!(!network::send_tx(&addr, &tx).await);
    assert_eq!(network::balance(&addr, "bob").await, Some(0));
}

#[tokio::test]
async fn corrupted_signature_is_rejected() {
    let alice = KeyPair::generate();
    let (addr, _node, _dir) = spawn_node(Vec::new(), Chain::new("creator".to_string())).await;

    let mut tx = signed_transfer(&alice, "bob", 100);
    tx.envelope.signature = tx.envelope.signature.to_lowercase();
    assert!(!network::send_tx(&addr, &tx).await);
}

#[tokio::test]
async fn invalid_block_prove_leaves_the_chain_unchanged() {
    let (addr, _node, _dir) = spawn_node(Vec::new(), Chain::new("creator".to_string())).await;

    let mut block = Block::new(&HASH_NULL);
    block.rehash();
    assert!(!network::prove(&addr, &block).await);
    assert_eq!(network::length(&addr).await, Some(0));
}

#[tokio::test]
async fn valid_block_prove_appends_and_relinks_the_pending_block() {
    let miner_keys = KeyPair::generate();
    let (addr, node, _dir) = spawn_node(Vec::new(), Chain::new("creator".to_string())).await;

    let block = proven_external_block(&miner_keys, &HASH_NULL);
    let block_hash = block.envelope.hash.clone();

    assert!(network::prove(&addr, &block).await);
    assert_eq!(network::length(&addr).await, Some(1));
    assert_eq!(network::hash_at(&addr, 0).await, Some(block_hash.clone()));

    let state = node.state.lock().await;
    assert!(state.pending.is_empty());
    assert_eq!(state.pending.data.previous, block_hash);
}

#[tokio::test]
async fn choose_prefers_the_strictly_longest_peer() {
    let (short_addr, _a, _da) = spawn_node(Vec::new(), chain_of("creator", 3)).await;
    let (long_addr, _b, _db) = spawn_node(Vec::new(), chain_of("creator", 5)).await;

    let peers = vec![short_addr.clone(), long_addr.clone()];
    assert_eq!(sync::choose(&peers).await, Some(long_addr.clone()));

    // Ties keep the first-seen candidate.
    let (twin_addr, _c, _dc) = spawn_node(Vec::new(), chain_of("creator", 5)).await;
    let tied = vec![long_addr.clone(), twin_addr];
    assert_eq!(sync::choose(&tied).await, Some(long_addr));
}

#[tokio::test]
async fn sync_replaces_the_shorter_chain_wholesale_and_persists_it() {
    let long_chain = chain_of("creator", 5);
    let (long_addr, _b, _db) = spawn_node(Vec::new(), long_chain.clone()).await;

    let (_short_addr, short_node, _da) =
        spawn_node(vec![long_addr], chain_of("other-creator", 3)).await;

    sync::sync_once(&short_node).await;

    let state = short_node.state.lock().await;
    assert_eq!(state.chain, long_chain);
    drop(state);

    let persisted: Chain = short_node.store.load(CHAIN_FILE).unwrap();
    assert_eq!(persisted, long_chain);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn full_pending_block_is_mined_and_proven_back_to_the_node() {
    let alice = KeyPair::generate();

    // The node lists itself as its only peer: its own PROVE handler is how
    // the proven block reaches its chain.
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let keys = KeyPair::generate();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let node = Node::new(
        Config::default(),
        keys,
        vec![addr.clone()],
        Chain::new("creator".to_string()),
        store,
    );
    tokio::spawn(node.clone().serve(listener));

    assert!(network::send_tx(&addr, &signed_transfer(&alice, "bob", 10)).await);
    assert!(network::send_tx(&addr, &signed_transfer(&alice, "carol", 20)).await);

    let mut proven = false;
    for _ in 0..400 {
        if network::length(&addr).await == Some(1) {
            proven = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert!(proven, "mined block never came back through PROVE");

    let state = node.state.lock().await;
    let block = &state.chain.blocks[0];
    assert!(block.verify());
    assert!(emberchain::miner::meets_target(&block.envelope.hash));
    assert_eq!(block.data.miner, node.keys.address());
    assert_eq!(block.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn external_prove_wins_over_in_flight_local_mining() {
    let alice = KeyPair::generate();
    let external_miner = KeyPair::generate();

    // No peers: the node's own proven block has nowhere to go, so the chain
    // can only ever reflect the externally proven block.
    let (addr, node, _dir) = spawn_node(Vec::new(), Chain::new("creator".to_string())).await;

    assert!(network::send_tx(&addr, &signed_transfer(&alice, "bob", 1)).await);
    assert!(network::send_tx(&addr, &signed_transfer(&alice, "carol", 2)).await);

    let external = proven_external_block(&external_miner, &HASH_NULL);
    let external_hash = external.envelope.hash.clone();
    assert!(network::prove(&addr, &external).await);

    // Whether local mining was aborted or finished unheard, the chain holds
    // exactly the external block and the pending block links onto it.
    let mut settled = false;
    for _ in 0..400 {
        if !node.mining.load(std::sync::atomic::Ordering::SeqCst) {
            settled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert!(settled, "mining flag never cleared");

    assert_eq!(network::length(&addr).await, Some(1));
    assert_eq!(network::hash_at(&addr, 0).await, Some(external_hash.clone()));

    let state = node.state.lock().await;
    assert_eq!(state.chain.blocks[0].data.miner, external_miner.address());
    assert_eq!(state.pending.data.previous, external_hash);
}
