//! Inbound message dispatch.
//!
//! Each accepted connection carries one request: the task reads to EOF,
//! decodes the frame, runs the matching handler and closes. Handler failures
//! are isolated per connection; a misbehaving peer cannot take the node
//! down.

use crate::chain::store::ChainStore;
use crate::chain::utxo_set::UTXOSet;
use crate::config::GLOBAL_CONFIG;
use crate::core::block::Block;
use crate::core::transaction::Transaction;
use crate::error::{CoinError, Result};
use crate::network::message::{
    AddrPayload, BlockPayload, GetBlocksPayload, GetDataPayload, InvKind, InvPayload, Message,
    TxPayload, VersionPayload,
};
use crate::network::operations::{
    send_addr, send_block, send_get_blocks, send_get_data, send_inv, send_tx, send_version,
};
use crate::node::state::NodeState;
use data_encoding::HEXLOWER;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Pooled transactions needed before a miner node assembles a block.
pub const TRANSACTION_THRESHOLD: usize = 2;

const TCP_READ_TIMEOUT: Duration = Duration::from_millis(5000);

pub async fn handle_connection(
    chain: ChainStore,
    state: Arc<NodeState>,
    mut stream: TcpStream,
) -> Result<()> {
    let mut frame = vec![];
    timeout(TCP_READ_TIMEOUT, stream.read_to_end(&mut frame))
        .await
        .map_err(|_| CoinError::Io("request read timed out".to_string()))?
        .map_err(|e| CoinError::Io(e.to_string()))?;
    drop(stream);

    let message = Message::decode(frame.as_slice())?;
    debug!(command = message.command(), "received request");

    match message {
        Message::Version(p) => handle_version(&chain, &state, p).await,
        Message::GetBlocks(p) => handle_get_blocks(&chain, &state, p).await,
        Message::Inv(p) => handle_inv(&state, p).await,
        Message::GetData(p) => handle_get_data(&chain, &state, p).await,
        Message::Block(p) => handle_block(&chain, &state, p).await,
        Message::Tx(p) => handle_tx(&chain, &state, p).await,
        Message::Addr(p) => handle_addr(&state, p).await,
    }
}

/// Height comparison drives sync: the lower side asks for blocks, the
/// higher side advertises back. The sender becomes a known peer either way,
/// and the central node introduces each newcomer to the peers it knows.
async fn handle_version(
    chain: &ChainStore,
    state: &NodeState,
    payload: VersionPayload,
) -> Result<()> {
    let local_height = chain.get_best_height().await?;
    debug!(
        remote = payload.best_height,
        local = local_height,
        "version exchange"
    );

    if local_height < payload.best_height {
        send_get_blocks(state, &payload.addr_from).await;
    } else if local_height > payload.best_height {
        send_version(state, &payload.addr_from, local_height).await;
    }

    if !state.known_nodes().contains(&payload.addr_from)? {
        state.known_nodes().add(payload.addr_from)?;
        if GLOBAL_CONFIG.node_addr()? == GLOBAL_CONFIG.central_node() {
            send_addr(state, &payload.addr_from).await;
        }
    }
    Ok(())
}

async fn handle_get_blocks(
    chain: &ChainStore,
    state: &NodeState,
    payload: GetBlocksPayload,
) -> Result<()> {
    let hashes = chain.get_block_hashes().await;
    send_inv(state, &payload.addr_from, InvKind::Block, hashes.as_slice()).await;
    Ok(())
}

async fn handle_inv(state: &NodeState, payload: InvPayload) -> Result<()> {
    match payload.kind {
        InvKind::Block => {
            state.blocks_in_transit.replace(payload.items.as_slice())?;
            if let Some(first) = state.blocks_in_transit.take_first()? {
                send_get_data(state, &payload.addr_from, InvKind::Block, first.as_slice()).await;
            }
        }
        InvKind::Tx => {
            let Some(txid) = payload.items.first() else {
                return Ok(());
            };
            if !state.mempool.contains(&HEXLOWER.encode(txid))? {
                send_get_data(state, &payload.addr_from, InvKind::Tx, txid.as_slice()).await;
            }
        }
    }
    Ok(())
}

async fn handle_get_data(
    chain: &ChainStore,
    state: &NodeState,
    payload: GetDataPayload,
) -> Result<()> {
    match payload.kind {
        InvKind::Block => {
            if let Some(block) = chain.get_block(payload.id.as_slice())? {
                send_block(state, &payload.addr_from, &block).await;
            }
        }
        InvKind::Tx => {
            let txid_hex = HEXLOWER.encode(payload.id.as_slice());
            if let Some(tx) = state.mempool.get(&txid_hex)? {
                send_tx(state, &payload.addr_from, &tx).await;
            } else {
                debug!(txid = %txid_hex, "requested transaction not in mempool, likely mined");
            }
        }
    }
    Ok(())
}

/// Stores a delivered block, then either pulls the next pending one or, once
/// the download queue drains, rebuilds the UTXO index against the new tip.
async fn handle_block(chain: &ChainStore, state: &NodeState, payload: BlockPayload) -> Result<()> {
    let block = Block::deserialize(payload.block.as_slice())?;
    let block_hash = block.hash_hex();
    chain.add_block(&block).await?;
    info!(hash = %block_hash, height = block.height(), "received block");

    if let Some(next) = state.blocks_in_transit.take_first()? {
        send_get_data(state, &payload.addr_from, InvKind::Block, next.as_slice()).await;
    } else {
        UTXOSet::new(chain.clone()).reindex().await?;
    }
    Ok(())
}

/// Pools a delivered transaction. The central node gossips its id onward;
/// a miner node with enough pooled transactions assembles a block.
async fn handle_tx(chain: &ChainStore, state: &NodeState, payload: TxPayload) -> Result<()> {
    let tx = Transaction::deserialize(payload.transaction.as_slice())?;
    let txid = tx.id().to_vec();
    info!(txid = %tx.id_hex(), "pooled transaction");
    state.mempool.add(tx)?;

    let node_addr = GLOBAL_CONFIG.node_addr()?;
    if node_addr == GLOBAL_CONFIG.central_node() {
        for peer in state.known_nodes().all()? {
            if peer != node_addr && peer != payload.addr_from {
                send_inv(state, &peer, InvKind::Tx, &[txid.clone()]).await;
            }
        }
    }

    if GLOBAL_CONFIG.is_miner() && state.mempool.len()? >= TRANSACTION_THRESHOLD {
        mine_pending_transactions(chain, state).await?;
    }
    Ok(())
}

/// Learns gossiped peers, then catches up with each of them.
async fn handle_addr(state: &NodeState, payload: AddrPayload) -> Result<()> {
    state.known_nodes().union(payload.addr_list.as_slice())?;
    info!(peers = state.known_nodes().len()?, "peer list updated");

    let node_addr = GLOBAL_CONFIG.node_addr()?;
    for peer in state.known_nodes().all()? {
        if peer != node_addr {
            send_get_blocks(state, &peer).await;
        }
    }
    Ok(())
}

/// Drains the mempool into mined blocks until it is empty or nothing valid
/// remains. Invalid transactions are dropped, never mined.
pub async fn mine_pending_transactions(chain: &ChainStore, state: &NodeState) -> Result<()> {
    let Some(miner_address) = GLOBAL_CONFIG.miner_address() else {
        return Ok(());
    };

    loop {
        let candidates = state.mempool.drain()?;
        if candidates.is_empty() {
            return Ok(());
        }

        let mut transactions = vec![];
        for tx in candidates {
            match chain.verify_transaction(&tx).await {
                Ok(true) => transactions.push(tx),
                Ok(false) => warn!(txid = %tx.id_hex(), "dropping invalid transaction"),
                Err(e) => {
                    warn!(txid = %tx.id_hex(), error = %e, "dropping unverifiable transaction")
                }
            }
        }
        if transactions.is_empty() {
            info!("no valid transactions to mine");
            return Ok(());
        }

        transactions.push(Transaction::new_coinbase_tx(&miner_address, "")?);
        let block = chain
            .mine_block(transactions.as_slice(), state.shutdown_flag())
            .await?;
        UTXOSet::new(chain.clone()).reindex().await?;
        info!(hash = %block.hash_hex(), height = block.height(), "mined new block");

        let node_addr = GLOBAL_CONFIG.node_addr()?;
        for peer in state.known_nodes().all()? {
            if peer != node_addr {
                send_inv(state, &peer, InvKind::Block, &[block.hash().to_vec()]).await;
            }
        }

        if state.mempool.is_empty()? {
            return Ok(());
        }
    }
}
