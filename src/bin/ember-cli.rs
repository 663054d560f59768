#![forbid(unsafe_code)]
//! Interactive wallet shell for emberchain.

use clap::Parser;
use colored::Colorize;
use emberchain::crypto::{KeyPair, StoredKey};
use emberchain::network;
use emberchain::store::{Store, KEY_FILE, PEERS_FILE};
use emberchain::sync;
use emberchain::transaction::Transaction;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ember-cli", about = "Interactive emberchain wallet shell")]
struct Args {
    /// Data directory holding the key and peer files
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let store = Store::open(&args.data_dir)?;

    let peers: Vec<String> = store.load(PEERS_FILE).unwrap_or_default();
    store.save(PEERS_FILE, &peers)?;
    if peers.is_empty() {
        eprintln!(
            "{}",
            format!("peer list is empty, configure {PEERS_FILE}").red()
        );
        return Ok(());
    }

    let keys = match store
        .load::<StoredKey>(KEY_FILE)
        .and_then(|stored| KeyPair::from_stored(&stored))
    {
        Ok(keys) => keys,
        Err(_) => KeyPair::generate(),
    };
    store.save(KEY_FILE, &keys.to_stored())?;

    let my_addr = keys.address();
    println!("address: {}", my_addr.cyan());

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("exit") => break,

            Some("myaddress") => println!("{}", my_addr.cyan()),

            Some("mybalance") => query_balance(&peers, &my_addr).await,

            Some("balance") => match parts.next() {
                Some(addr) => query_balance(&peers, addr).await,
                None => eprintln!("{}", "usage: balance <addr>".yellow()),
            },

            Some("tx") => {
                let (Some(receiver), Some(amount)) = (parts.next(), parts.next()) else {
                    eprintln!("{}", "usage: tx <addr> <amount>".yellow());
                    continue;
                };
                let Ok(amount) = amount.parse::<i64>() else {
                    eprintln!("{}", "amount must be an integer".yellow());
                    continue;
                };
                send_transaction(&peers, &keys, receiver, amount).await;
            }

            Some(other) => eprintln!("{}", format!("unknown command: {other}").yellow()),

            None => {}
        }
    }

    Ok(())
}

/// Queries the best-known peer for a live balance.
async fn query_balance(peers: &[String], addr: &str) {
    let Some(best) = sync::choose(peers).await else {
        return;
    };
    println!("peer: {best}");
    match network::balance(&best, addr).await {
        Some(balance) => println!("balance: {}", balance.to_string().green()),
        None => eprintln!("{}", "peer unreachable".red()),
    }
}

/// Builds, signs and submits a transfer to every configured peer, tagged
/// with the best peer's current tip hash.
async fn send_transaction(peers: &[String], keys: &KeyPair, receiver: &str, amount: i64) {
    let Some(best) = sync::choose(peers).await else {
        return;
    };
    let Some(last) = network::last(&best).await else {
        eprintln!("{}", "peer unreachable".red());
        return;
    };
    let Some(previous) = network::hash_at(&best, last).await else {
        eprintln!("{}", "peer unreachable".red());
        return;
    };

    let mut tx = Transaction::new(&previous, &keys.address(), receiver, amount);
    if let Err(e) = tx.sign(keys) {
        eprintln!("{}", format!("failed to sign transaction: {e}").red());
        return;
    }

    for peer in peers {
        let accepted = network::send_tx(peer, &tx).await;
        let verdict = if accepted {
            "accepted".green()
        } else {
            "rejected".red()
        };
        println!("{peer}: {verdict}");
    }
}
