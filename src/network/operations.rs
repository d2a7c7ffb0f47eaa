//! Outbound message plumbing.
//!
//! Sends are best-effort: a peer that cannot be reached within the timeout
//! is dropped from the known-peers list and the current operation yields no
//! result.

use crate::config::GLOBAL_CONFIG;
use crate::core::block::Block;
use crate::core::transaction::Transaction;
use crate::error::{CoinError, Result};
use crate::network::message::{
    AddrPayload, BlockPayload, GetBlocksPayload, GetDataPayload, InvKind, InvPayload, Message,
    PROTOCOL_VERSION, TxPayload, VersionPayload,
};
use crate::node::state::NodeState;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{error, warn};

const TCP_CONNECT_TIMEOUT: Duration = Duration::from_millis(1000);
const TCP_WRITE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Writes one framed message to `addr_to` and closes the connection.
pub async fn send_raw(addr_to: &SocketAddr, message: &Message) -> Result<()> {
    let frame = message.encode()?;
    let mut stream = timeout(TCP_CONNECT_TIMEOUT, TcpStream::connect(addr_to))
        .await
        .map_err(|_| CoinError::Io(format!("connect to {} timed out", addr_to)))?
        .map_err(|e| CoinError::Io(e.to_string()))?;
    timeout(TCP_WRITE_TIMEOUT, stream.write_all(frame.as_slice()))
        .await
        .map_err(|_| CoinError::Io(format!("write to {} timed out", addr_to)))?
        .map_err(|e| CoinError::Io(e.to_string()))?;
    let _ = stream.shutdown().await;
    Ok(())
}

/// Best-effort send; an unreachable peer is evicted from the known list.
async fn send_or_evict(state: &NodeState, addr_to: &SocketAddr, message: Message) {
    if let Err(e) = send_raw(addr_to, &message).await {
        warn!(peer = %addr_to, error = %e, "peer unreachable, evicting");
        if let Err(e) = state.known_nodes().remove(addr_to) {
            error!(error = %e, "failed to evict peer");
        }
    }
}

fn local_addr() -> Option<SocketAddr> {
    match GLOBAL_CONFIG.node_addr() {
        Ok(addr) => Some(addr),
        Err(e) => {
            error!(error = %e, "node address unavailable");
            None
        }
    }
}

pub async fn send_version(state: &NodeState, addr_to: &SocketAddr, best_height: usize) {
    let Some(addr_from) = local_addr() else { return };
    send_or_evict(
        state,
        addr_to,
        Message::Version(VersionPayload {
            addr_from,
            version: PROTOCOL_VERSION,
            best_height,
        }),
    )
    .await;
}

pub async fn send_get_blocks(state: &NodeState, addr_to: &SocketAddr) {
    let Some(addr_from) = local_addr() else { return };
    send_or_evict(
        state,
        addr_to,
        Message::GetBlocks(GetBlocksPayload { addr_from }),
    )
    .await;
}

pub async fn send_inv(state: &NodeState, addr_to: &SocketAddr, kind: InvKind, items: &[Vec<u8>]) {
    let Some(addr_from) = local_addr() else { return };
    send_or_evict(
        state,
        addr_to,
        Message::Inv(InvPayload {
            addr_from,
            kind,
            items: items.to_vec(),
        }),
    )
    .await;
}

pub async fn send_get_data(state: &NodeState, addr_to: &SocketAddr, kind: InvKind, id: &[u8]) {
    let Some(addr_from) = local_addr() else { return };
    send_or_evict(
        state,
        addr_to,
        Message::GetData(GetDataPayload {
            addr_from,
            kind,
            id: id.to_vec(),
        }),
    )
    .await;
}

pub async fn send_block(state: &NodeState, addr_to: &SocketAddr, block: &Block) {
    let Some(addr_from) = local_addr() else { return };
    let serialized = match block.serialize() {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "block serialization failed");
            return;
        }
    };
    send_or_evict(
        state,
        addr_to,
        Message::Block(BlockPayload {
            addr_from,
            block: serialized,
        }),
    )
    .await;
}

pub async fn send_tx(state: &NodeState, addr_to: &SocketAddr, tx: &Transaction) {
    let Some(addr_from) = local_addr() else { return };
    let serialized = match tx.serialize() {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "transaction serialization failed");
            return;
        }
    };
    send_or_evict(
        state,
        addr_to,
        Message::Tx(TxPayload {
            addr_from,
            transaction: serialized,
        }),
    )
    .await;
}

pub async fn send_addr(state: &NodeState, addr_to: &SocketAddr) {
    let addr_list = match state.known_nodes().all() {
        Ok(list) => list,
        Err(e) => {
            error!(error = %e, "known peers unavailable");
            return;
        }
    };
    send_or_evict(state, addr_to, Message::Addr(AddrPayload { addr_list })).await;
}

/// One-shot transaction dispatch used by the CLI `send` path; the error is
/// surfaced instead of demoting a peer.
pub async fn send_transaction_once(addr_to: &SocketAddr, tx: &Transaction) -> Result<()> {
    let addr_from = GLOBAL_CONFIG.node_addr()?;
    send_raw(
        addr_to,
        &Message::Tx(TxPayload {
            addr_from,
            transaction: tx.serialize()?,
        }),
    )
    .await
}
