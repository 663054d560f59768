//! Node orchestration: the protocol server bound to one node's mutable state.

use crate::block::Block;
use crate::chain::Chain;
use crate::codec;
use crate::config::Config;
use crate::crypto::KeyPair;
use crate::error::ChainError;
use crate::miner::{self, MineOutcome};
use crate::network::{self, Opcode, ACK, BUFF_SIZE};
use crate::store::Store;
use crate::transaction::Transaction;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Mutable consensus state: the committed chain and the block currently
/// accumulating transactions. Every transition (mining start, PROVE cancel,
/// pending reset, chain append) happens under this one lock.
pub struct NodeState {
    pub chain: Chain,
    pub pending: Block,
}

pub struct Node {
    pub config: Config,
    pub keys: KeyPair,
    pub peers: Vec<String>,
    pub state: Arc<Mutex<NodeState>>,
    pub mining: Arc<AtomicBool>,
    pub store: Store,
}

impl Node {
    /// Wires a node around an already-recovered chain. The pending block
    /// starts empty, linked to the chain tip.
    pub fn new(
        config: Config,
        keys: KeyPair,
        peers: Vec<String>,
        chain: Chain,
        store: Store,
    ) -> Arc<Self> {
        let pending = Block::new(&chain.tip_hash());
        Arc::new(Node {
            config,
            keys,
            peers,
            state: Arc::new(Mutex::new(NodeState { chain, pending })),
            mining: Arc::new(AtomicBool::new(false)),
            store,
        })
    }

    /// Accept loop: one task per connection, one request per connection.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "node listening");
        }
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let node = self.clone();
                    tokio::spawn(async move {
                        node.handle(socket).await;
                    });
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                }
            }
        }
    }

    async fn handle(&self, mut socket: TcpStream) {
        let mut buf = vec![0u8; BUFF_SIZE];
        let n = match socket.read(&mut buf).await {
            Ok(0) => return,
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "request read failed");
                return;
            }
        };

        let Ok(opcode) = Opcode::try_from(buf[0]) else {
            warn!(opcode = buf[0], "unknown opcode");
            return;
        };

        if let Some(response) = self.dispatch(opcode, &buf[1..n]).await {
            if let Err(e) = socket.write_all(&response).await {
                warn!(error = %e, "response write failed");
            }
        }
    }

    /// Opcode dispatch. `None` closes the connection without a response,
    /// which clients read as a failed acknowledgement.
    async fn dispatch(&self, opcode: Opcode, payload: &[u8]) -> Option<Vec<u8>> {
        match opcode {
            Opcode::Length => {
                let state = self.state.lock().await;
                codec::encode(&(state.chain.len() as i64)).ok()
            }
            Opcode::Chain => {
                // Snapshot under the lock; encode and send outside it.
                let snapshot = { self.state.lock().await.chain.clone() };
                codec::encode(&snapshot).ok()
            }
            Opcode::Tx => self.accept_tx(payload).await,
            Opcode::Prove => self.accept_block(payload).await,
            Opcode::Balance => {
                let addr: String = codec::decode(payload).ok()?;
                let state = self.state.lock().await;
                let balance =
                    state.chain.balance_of(&addr) + state.pending.balance_of(&addr);
                codec::encode(&balance).ok()
            }
            Opcode::Hash => {
                let index: i64 = codec::decode(payload).ok()?;
                let state = self.state.lock().await;
                codec::encode(&state.chain.hash_at(index)).ok()
            }
            Opcode::Last => {
                let state = self.state.lock().await;
                codec::encode(&state.chain.last_index()).ok()
            }
            Opcode::Addr => codec::encode(&self.keys.address()).ok(),
        }
    }

    /// TX: verify the signature, append to the pending block, and kick off
    /// mining once the block is full. No double-spend or linkage checks.
    async fn accept_tx(&self, payload: &[u8]) -> Option<Vec<u8>> {
        let tx: Transaction = codec::decode(payload).ok()?;
        if !tx.verify() {
            warn!(id = tx.data.id, error = %ChainError::InvalidTransaction, "transaction rejected");
            return None;
        }

        let mut state = self.state.lock().await;
        state.pending.push(tx);
        if state.pending.is_full() {
            self.start_mining(&state);
        }
        Some(ACK.to_vec())
    }

    /// PROVE: verify the signature, cancel any in-flight local mining,
    /// append the block, reset the pending block onto the new tip.
    async fn accept_block(&self, payload: &[u8]) -> Option<Vec<u8>> {
        let block: Block = codec::decode(payload).ok()?;
        if !block.verify() {
            warn!(error = %ChainError::InvalidBlock, "block rejected");
            return None;
        }

        let mut state = self.state.lock().await;
        self.mining.store(false, Ordering::SeqCst);
        state.chain.push(block);
        state.pending = Block::new(&state.chain.tip_hash());
        info!(length = state.chain.len(), "block appended");
        Some(ACK.to_vec())
    }

    /// Snapshots the full pending block and mines it off the request path.
    /// The caller holds the state lock, which serializes raising the flag
    /// against any concurrent PROVE.
    fn start_mining(&self, state: &NodeState) {
        let snapshot = state.pending.clone();
        self.mining.store(true, Ordering::SeqCst);

        let keys = self.keys.clone();
        let peers = self.peers.clone();
        let shared = self.state.clone();
        let flag = self.mining.clone();
        tokio::spawn(mine_and_broadcast(snapshot, keys, peers, shared, flag));
    }
}

/// Mines `block` on a blocking thread, then signs and announces it to every
/// peer on success. A node lists itself among its peers; its own PROVE
/// handler is how the proven block reaches its own chain.
async fn mine_and_broadcast(
    block: Block,
    keys: KeyPair,
    peers: Vec<String>,
    state: Arc<Mutex<NodeState>>,
    flag: Arc<AtomicBool>,
) {
    let miner_addr = keys.address();
    let mine_flag = flag.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut block = block;
        let outcome = miner::mine(&mut block, &miner_addr, &mine_flag);
        (outcome, block)
    })
    .await;

    let (outcome, mut block) = match result {
        Ok(mined) => mined,
        Err(e) => {
            error!(error = %e, "mining task failed");
            flag.store(false, Ordering::SeqCst);
            return;
        }
    };

    match outcome {
        MineOutcome::Proven => {
            match block.sign(&keys) {
                Ok(()) => {
                    // Per-peer failures are logged and skipped; one dead
                    // peer never blocks delivery to the rest.
                    for peer in &peers {
                        let accepted = network::prove(peer, &block).await;
                        info!(peer = %peer, accepted, "prove broadcast");
                    }
                }
                Err(e) => error!(error = %e, "failed to sign proven block"),
            }
            let mut state = state.lock().await;
            state.pending = Block::new(&state.chain.tip_hash());
            flag.store(false, Ordering::SeqCst);
        }
        MineOutcome::Aborted => {
            // A competing block won; its PROVE handler already reset the
            // pending block. The snapshot is discarded.
            info!("mining aborted by competing block");
        }
        MineOutcome::Exhausted => {
            warn!("nonce space exhausted without meeting the target");
            let mut state = state.lock().await;
            state.pending = Block::new(&state.chain.tip_hash());
            flag.store(false, Ordering::SeqCst);
        }
    }
}
