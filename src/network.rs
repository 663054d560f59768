//! Peer wire protocol: framing, opcodes and client requests.
//!
//! One request per connection: a single opcode byte followed by the
//! canonical payload, answered by a single canonical response. Both sides
//! perform one bounded read; payloads beyond `BUFF_SIZE` truncate. There is
//! no length prefix, pipelining, version byte or transport authentication.

use crate::block::Block;
use crate::chain::Chain;
use crate::codec;
use crate::transaction::Transaction;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::warn;

/// Read buffer per request and per response.
pub const BUFF_SIZE: usize = 1024 * 1024;

/// Acknowledgement byte for accepted TX and PROVE payloads.
pub const ACK: [u8; 1] = [1];

/// Protocol opcodes, the first byte of every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Length = 1,
    Chain = 2,
    Tx = 3,
    Prove = 4,
    Balance = 5,
    Hash = 6,
    Last = 7,
    Addr = 8,
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        match value {
            1 => Ok(Opcode::Length),
            2 => Ok(Opcode::Chain),
            3 => Ok(Opcode::Tx),
            4 => Ok(Opcode::Prove),
            5 => Ok(Opcode::Balance),
            6 => Ok(Opcode::Hash),
            7 => Ok(Opcode::Last),
            8 => Ok(Opcode::Addr),
            other => Err(other),
        }
    }
}

/// One request against `peer`. Transport failures are logged and collapse to
/// `None`: the peer is simply unreachable for this operation, and callers
/// proceed without it.
pub async fn request(peer: &str, opcode: Opcode, payload: &[u8]) -> Option<Vec<u8>> {
    match try_request(peer, opcode, payload).await {
        Ok(response) => Some(response),
        Err(e) => {
            warn!(peer, ?opcode, error = %e, "peer unreachable");
            None
        }
    }
}

async fn try_request(peer: &str, opcode: Opcode, payload: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut stream = TcpStream::connect(peer).await?;

    let mut frame = Vec::with_capacity(1 + payload.len());
    frame.push(opcode as u8);
    frame.extend_from_slice(payload);
    stream.write_all(&frame).await?;

    let mut buf = vec![0u8; BUFF_SIZE];
    let n = stream.read(&mut buf).await?;
    buf.truncate(n);
    Ok(buf)
}

/// Reported chain length of `peer`.
pub async fn length(peer: &str) -> Option<i64> {
    let data = request(peer, Opcode::Length, &[]).await?;
    codec::decode(&data).ok()
}

/// Pulls the peer's full chain. Expensive: the response carries every block.
pub async fn chain(peer: &str) -> Option<Chain> {
    let data = request(peer, Opcode::Chain, &[]).await?;
    codec::decode(&data).ok()
}

/// Submits a signed transaction. `true` only on a positive acknowledgement.
pub async fn send_tx(peer: &str, tx: &Transaction) -> bool {
    let Ok(payload) = codec::encode(tx) else {
        return false;
    };
    request(peer, Opcode::Tx, &payload)
        .await
        .is_some_and(|resp| resp == ACK)
}

/// Announces a proven block. `true` only on a positive acknowledgement.
pub async fn prove(peer: &str, block: &Block) -> bool {
    let Ok(payload) = codec::encode(block) else {
        return false;
    };
    request(peer, Opcode::Prove, &payload)
        .await
        .is_some_and(|resp| resp == ACK)
}

/// Live balance of `addr` as seen by `peer` (committed chain plus pending
/// block).
pub async fn balance(peer: &str, addr: &str) -> Option<i64> {
    let payload = codec::encode(&addr).ok()?;
    let data = request(peer, Opcode::Balance, &payload).await?;
    codec::decode(&data).ok()
}

/// Hash of the peer's block at `index`, or the null sentinel out of range.
pub async fn hash_at(peer: &str, index: i64) -> Option<String> {
    let payload = codec::encode(&index).ok()?;
    let data = request(peer, Opcode::Hash, &payload).await?;
    codec::decode(&data).ok()
}

/// Index of the peer's last block, -1 when its chain is empty.
pub async fn last(peer: &str) -> Option<i64> {
    let data = request(peer, Opcode::Last, &[]).await?;
    codec::decode(&data).ok()
}

/// The peer's own account address.
pub async fn node_addr(peer: &str) -> Option<String> {
    let data = request(peer, Opcode::Addr, &[]).await?;
    codec::decode(&data).ok()
}
