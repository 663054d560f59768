#![forbid(unsafe_code)]
//! Emberchain daemon: protocol server plus the background chain sync loop.

use clap::Parser;
use emberchain::chain::Chain;
use emberchain::config;
use emberchain::crypto::{KeyPair, StoredKey};
use emberchain::node::Node;
use emberchain::store::{Store, CHAIN_FILE, KEY_FILE, PEERS_FILE};
use emberchain::sync;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "ember-node", about = "Run an emberchain node")]
struct Args {
    /// Data directory holding the chain, key and peer files
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Listen address, overriding config.toml
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut config = config::load_config(&args.data_dir)?;
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }

    let store = Store::open(&args.data_dir)?;

    let peers: Vec<String> = match store.load(PEERS_FILE) {
        Ok(peers) => peers,
        Err(e) => {
            warn!(error = %e, "no usable peer list");
            Vec::new()
        }
    };
    store.save(PEERS_FILE, &peers)?;
    if peers.is_empty() {
        return Err(format!("peer list is empty, configure {PEERS_FILE}").into());
    }

    let keys = match store
        .load::<StoredKey>(KEY_FILE)
        .and_then(|stored| KeyPair::from_stored(&stored))
    {
        Ok(keys) => keys,
        Err(e) => {
            warn!(error = %e, "generating a fresh key pair");
            KeyPair::generate()
        }
    };
    store.save(KEY_FILE, &keys.to_stored())?;

    let chain: Chain = match store.load(CHAIN_FILE) {
        Ok(chain) => chain,
        Err(e) => {
            warn!(error = %e, "starting a fresh chain");
            Chain::new(keys.address())
        }
    };
    store.save(CHAIN_FILE, &chain)?;

    info!(address = %keys.address(), "node identity");

    let node = Node::new(config.clone(), keys, peers, chain, store);

    tokio::spawn(sync::run(node.clone()));

    let listener = TcpListener::bind(&config.listen_addr).await?;
    node.serve(listener).await;
    Ok(())
}
