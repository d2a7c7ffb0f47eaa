use crate::config::GLOBAL_CONFIG;
use crate::core::block::Block;
use crate::core::transaction::{TXOutputs, Transaction};
use crate::error::{CoinError, Result};
use sled::Db;
use sled::transaction::TransactionResult;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Key holding the hash of the current chain tip.
const TIP_HASH_KEY: &str = "lh";

/// Provenance data carried by the genesis coinbase.
pub const GENESIS_COINBASE_DATA: &str = "First Transaction from Genesis";

/// The persistent chain: blocks keyed by their raw hash, the tip pointer
/// under `"lh"`, and the UTXO index under its own key prefix (see
/// [`crate::chain::utxo_set::UTXOSet`]). The store is the source of truth;
/// the UTXO index is a rebuildable projection over it.
///
/// Cloning shares the underlying database and the tip cache. The tip lock
/// serializes every append, so concurrent receipts of the same block
/// converge on one stored copy.
#[derive(Clone)]
pub struct ChainStore {
    db: Db,
    tip_hash: Arc<RwLock<Vec<u8>>>,
}

impl ChainStore {
    /// Creates a brand-new chain at the node's configured path, mining the
    /// genesis block with the reward paid to `genesis_address`. Refuses to
    /// touch an existing database.
    pub fn create(genesis_address: &str) -> Result<ChainStore> {
        Self::create_at(GLOBAL_CONFIG.blocks_dir()?, genesis_address)
    }

    pub fn create_at<P: AsRef<Path>>(path: P, genesis_address: &str) -> Result<ChainStore> {
        let path = path.as_ref();
        if path.exists() {
            return Err(CoinError::ChainAlreadyExists(path.display().to_string()));
        }
        let db = Self::open_db(path)?;

        let coinbase = Transaction::new_coinbase_tx(genesis_address, GENESIS_COINBASE_DATA)?;
        let genesis = Block::generate_genesis_block(&coinbase, &AtomicBool::new(false))?;
        Self::write_block(&db, &genesis, true)?;
        info!(hash = %genesis.hash_hex(), "created chain with genesis block");

        Ok(ChainStore {
            db,
            tip_hash: Arc::new(RwLock::new(genesis.hash().to_vec())),
        })
    }

    /// Opens the existing chain at the node's configured path.
    pub fn open() -> Result<ChainStore> {
        Self::open_at(GLOBAL_CONFIG.blocks_dir()?)
    }

    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<ChainStore> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CoinError::ChainNotFound(path.display().to_string()));
        }
        let db = Self::open_db(path)?;
        let tip_hash = db
            .get(TIP_HASH_KEY)
            .map_err(|e| CoinError::Store(e.to_string()))?
            .ok_or_else(|| CoinError::ChainNotFound(path.display().to_string()))?
            .to_vec();
        Ok(ChainStore {
            db,
            tip_hash: Arc::new(RwLock::new(tip_hash)),
        })
    }

    /// An unclean shutdown can leave the database locked or its log dirty;
    /// sled repairs the log on open, so one delayed retry recovers.
    fn open_db(path: &Path) -> Result<Db> {
        match sled::open(path) {
            Ok(db) => Ok(db),
            Err(first_err) => {
                warn!(error = %first_err, "chain database open failed, retrying once");
                std::thread::sleep(Duration::from_millis(100));
                sled::open(path).map_err(|e| CoinError::Store(e.to_string()))
            }
        }
    }

    /// Atomically persists `block` and, when `set_tip`, advances `"lh"`.
    fn write_block(db: &Db, block: &Block, set_tip: bool) -> Result<()> {
        let block_bytes = block.serialize()?;
        let result: TransactionResult<(), ()> = db.transaction(|tx_db| {
            tx_db.insert(block.hash(), block_bytes.clone())?;
            if set_tip {
                tx_db.insert(TIP_HASH_KEY, block.hash())?;
            }
            Ok(())
        });
        result
            .map(|_| ())
            .map_err(|e| CoinError::Store(format!("{:?}", e)))
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub async fn get_tip_hash(&self) -> Vec<u8> {
        self.tip_hash.read().await.clone()
    }

    pub async fn get_best_height(&self) -> Result<usize> {
        let tip_hash = self.get_tip_hash().await;
        let tip = self
            .get_block(tip_hash.as_slice())?
            .ok_or_else(|| CoinError::Store("tip block is missing".to_string()))?;
        Ok(tip.height())
    }

    pub fn get_block(&self, hash: &[u8]) -> Result<Option<Block>> {
        let bytes = self
            .db
            .get(hash)
            .map_err(|e| CoinError::Store(e.to_string()))?;
        match bytes {
            Some(bytes) => Ok(Some(Block::deserialize(bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    /// Mines a block holding `transactions` on top of the current tip.
    /// Every non-coinbase transaction must verify against the chain.
    pub async fn mine_block(
        &self,
        transactions: &[Transaction],
        cancel: &AtomicBool,
    ) -> Result<Block> {
        for tx in transactions {
            if !self.verify_transaction(tx).await? {
                return Err(CoinError::InvalidTransaction);
            }
        }

        let prev_hash = self.get_tip_hash().await;
        let height = self.get_best_height().await?;
        let block = Block::new_block(prev_hash, transactions, height + 1, cancel)?;

        let mut tip_guard = self.tip_hash.write().await;
        Self::write_block(&self.db, &block, true)?;
        *tip_guard = block.hash().to_vec();
        Ok(block)
    }

    /// Stores a block received from the network. A block already present is
    /// a no-op; the tip advances only for a strictly greater height, which
    /// yields best-chain-by-height selection without reorganizing competing
    /// histories.
    pub async fn add_block(&self, block: &Block) -> Result<()> {
        let mut tip_guard = self.tip_hash.write().await;

        if self
            .db
            .contains_key(block.hash())
            .map_err(|e| CoinError::Store(e.to_string()))?
        {
            return Ok(());
        }

        let tip = self
            .get_block(tip_guard.as_slice())?
            .ok_or_else(|| CoinError::Store("tip block is missing".to_string()))?;
        let advances_tip = block.height() > tip.height();

        Self::write_block(&self.db, block, advances_tip)?;
        if advances_tip {
            *tip_guard = block.hash().to_vec();
        } else {
            info!(
                hash = %block.hash_hex(),
                height = block.height(),
                "stored block without advancing the tip"
            );
        }
        Ok(())
    }

    pub async fn iterator(&self) -> ChainIterator {
        ChainIterator {
            db: self.db.clone(),
            current_hash: self.get_tip_hash().await,
        }
    }

    /// All block hashes, tip to genesis.
    pub async fn get_block_hashes(&self) -> Vec<Vec<u8>> {
        let mut hashes = vec![];
        let mut iterator = self.iterator().await;
        while let Some(block) = iterator.next() {
            hashes.push(block.hash().to_vec());
        }
        hashes
    }

    /// Linear scan for a transaction by id, tip to genesis.
    pub async fn find_transaction(&self, txid: &[u8]) -> Result<Option<Transaction>> {
        let mut iterator = self.iterator().await;
        while let Some(block) = iterator.next() {
            for tx in block.transactions() {
                if tx.id().eq(txid) {
                    return Ok(Some(tx.clone()));
                }
            }
        }
        Ok(None)
    }

    async fn get_prev_transactions(
        &self,
        tx: &Transaction,
    ) -> Result<HashMap<String, Transaction>> {
        let mut prev_txs = HashMap::new();
        for vin in tx.vin() {
            let prev_tx = self
                .find_transaction(vin.txid())
                .await?
                .ok_or_else(|| CoinError::TransactionNotFound(vin.txid_hex()))?;
            prev_txs.insert(prev_tx.id_hex(), prev_tx);
        }
        Ok(prev_txs)
    }

    /// Signs `tx` after resolving every referenced transaction on-chain.
    pub async fn sign_transaction(&self, tx: &mut Transaction, pkcs8: &[u8]) -> Result<()> {
        let prev_txs = self.get_prev_transactions(tx).await?;
        tx.sign(&prev_txs, pkcs8)
    }

    /// Verifies `tx` against the chain. Coinbase transactions are valid by
    /// construction.
    pub async fn verify_transaction(&self, tx: &Transaction) -> Result<bool> {
        if tx.is_coinbase() {
            return Ok(true);
        }
        let prev_txs = self.get_prev_transactions(tx).await?;
        tx.verify(&prev_txs)
    }

    /// Recomputes the full UTXO map by one chain scan: every output that no
    /// accepted input references, keyed by hex transaction id and tagged
    /// with its original output index.
    pub async fn find_utxo(&self) -> Result<HashMap<String, TXOutputs>> {
        let mut utxo: HashMap<String, TXOutputs> = HashMap::new();
        let mut spent: HashMap<String, HashSet<i32>> = HashMap::new();

        // Tip-to-genesis order guarantees every spending input is seen
        // before the outputs it consumes.
        let mut iterator = self.iterator().await;
        while let Some(block) = iterator.next() {
            for tx in block.transactions() {
                let txid_hex = tx.id_hex();
                for (idx, out) in tx.vout().iter().enumerate() {
                    let consumed = spent
                        .get(txid_hex.as_str())
                        .is_some_and(|outs| outs.contains(&(idx as i32)));
                    if !consumed {
                        utxo.entry(txid_hex.clone())
                            .or_default()
                            .outputs
                            .push((idx, out.clone()));
                    }
                }
                if !tx.is_coinbase() {
                    for vin in tx.vin() {
                        spent.entry(vin.txid_hex()).or_default().insert(vin.vout());
                    }
                }
            }
        }
        Ok(utxo)
    }

    /// Flushes the database; called before process exit.
    pub async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map(|_| ())
            .map_err(|e| CoinError::Store(e.to_string()))
    }
}

/// Cursor walking the chain from the tip to the genesis block.
pub struct ChainIterator {
    db: Db,
    current_hash: Vec<u8>,
}

impl ChainIterator {
    pub fn next(&mut self) -> Option<Block> {
        if self.current_hash.is_empty() {
            return None;
        }
        let bytes = self.db.get(self.current_hash.as_slice()).ok()??;
        let block = Block::deserialize(bytes.as_ref()).ok()?;
        self.current_hash = block.prev_block_hash().to_vec();
        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;
    use tempfile::TempDir;

    fn test_address() -> String {
        Wallet::new().expect("create wallet").get_address()
    }

    fn test_chain() -> (ChainStore, TempDir, String) {
        let dir = TempDir::new().expect("create temp dir");
        let address = test_address();
        let chain = ChainStore::create_at(dir.path().join("blocks"), &address)
            .expect("create chain");
        (chain, dir, address)
    }

    #[tokio::test]
    async fn genesis_chain_has_height_zero() {
        let (chain, _dir, _) = test_chain();
        assert_eq!(chain.get_best_height().await.expect("height"), 0);

        let tip_hash = chain.get_tip_hash().await;
        let genesis = chain
            .get_block(tip_hash.as_slice())
            .expect("get block")
            .expect("genesis exists");
        assert!(genesis.prev_block_hash().is_empty());
        assert!(genesis.transactions()[0].is_coinbase());
    }

    #[tokio::test]
    async fn create_refuses_existing_database() {
        let (chain, dir, _) = test_chain();
        drop(chain);
        let result = ChainStore::create_at(dir.path().join("blocks"), &test_address());
        assert!(matches!(result, Err(CoinError::ChainAlreadyExists(_))));
    }

    #[tokio::test]
    async fn open_missing_database_fails() {
        let dir = TempDir::new().expect("create temp dir");
        let result = ChainStore::open_at(dir.path().join("absent"));
        assert!(matches!(result, Err(CoinError::ChainNotFound(_))));
    }

    #[tokio::test]
    async fn mine_block_extends_the_chain() {
        let (chain, _dir, address) = test_chain();
        let coinbase = Transaction::new_coinbase_tx(&address, "").expect("coinbase");
        let block = chain
            .mine_block(&[coinbase], &AtomicBool::new(false))
            .await
            .expect("mine block");

        assert_eq!(block.height(), 1);
        assert_eq!(chain.get_best_height().await.expect("height"), 1);
        assert_eq!(chain.get_tip_hash().await, block.hash().to_vec());
    }

    #[tokio::test]
    async fn duplicate_add_block_is_a_noop() {
        let (chain, _dir, address) = test_chain();
        let coinbase = Transaction::new_coinbase_tx(&address, "").expect("coinbase");
        let block = chain
            .mine_block(&[coinbase], &AtomicBool::new(false))
            .await
            .expect("mine block");

        chain.add_block(&block).await.expect("re-add block");
        assert_eq!(chain.get_best_height().await.expect("height"), 1);
        assert_eq!(chain.get_block_hashes().await.len(), 2);
    }

    #[tokio::test]
    async fn lower_height_block_does_not_advance_tip() {
        let (chain, _dir, address) = test_chain();
        let coinbase = Transaction::new_coinbase_tx(&address, "").expect("coinbase");
        let block = chain
            .mine_block(&[coinbase], &AtomicBool::new(false))
            .await
            .expect("mine block");

        // A competing genesis from another node: height 0 against tip 1.
        let other_dir = TempDir::new().expect("create temp dir");
        let other = ChainStore::create_at(other_dir.path().join("blocks"), &test_address())
            .expect("create other chain");
        let other_tip = other.get_tip_hash().await;
        let competing = other
            .get_block(other_tip.as_slice())
            .expect("get block")
            .expect("genesis exists");

        chain.add_block(&competing).await.expect("add block");
        assert_eq!(chain.get_tip_hash().await, block.hash().to_vec());
        // Still stored, just not the tip.
        assert!(
            chain
                .get_block(competing.hash())
                .expect("get block")
                .is_some()
        );
    }

    #[tokio::test]
    async fn iterator_walks_tip_to_genesis() {
        let (chain, _dir, address) = test_chain();
        for _ in 0..2 {
            let coinbase = Transaction::new_coinbase_tx(&address, "").expect("coinbase");
            chain
                .mine_block(&[coinbase], &AtomicBool::new(false))
                .await
                .expect("mine block");
        }

        let hashes = chain.get_block_hashes().await;
        assert_eq!(hashes.len(), 3);
        assert_eq!(hashes[0], chain.get_tip_hash().await);

        let mut iterator = chain.iterator().await;
        let mut heights = vec![];
        while let Some(block) = iterator.next() {
            heights.push(block.height());
        }
        assert_eq!(heights, vec![2, 1, 0]);
    }

    #[tokio::test]
    async fn find_transaction_locates_the_genesis_coinbase() {
        let (chain, _dir, _) = test_chain();
        let tip_hash = chain.get_tip_hash().await;
        let genesis = chain
            .get_block(tip_hash.as_slice())
            .expect("get block")
            .expect("genesis exists");
        let coinbase = &genesis.transactions()[0];

        let found = chain
            .find_transaction(coinbase.id())
            .await
            .expect("find transaction")
            .expect("coinbase found");
        assert_eq!(found.id(), coinbase.id());

        let missing = chain
            .find_transaction(&[0u8; 32])
            .await
            .expect("find transaction");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn chain_persists_across_reopen() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("blocks");
        let address = test_address();
        let tip;
        {
            let chain = ChainStore::create_at(&path, &address).expect("create chain");
            let coinbase = Transaction::new_coinbase_tx(&address, "").expect("coinbase");
            let block = chain
                .mine_block(&[coinbase], &AtomicBool::new(false))
                .await
                .expect("mine block");
            tip = block.hash().to_vec();
            chain.flush().await.expect("flush");
        }

        let reopened = ChainStore::open_at(&path).expect("reopen chain");
        assert_eq!(reopened.get_best_height().await.expect("height"), 1);
        assert_eq!(reopened.get_tip_hash().await, tip);
    }

    #[tokio::test]
    async fn genesis_find_utxo_contains_the_reward() {
        let (chain, _dir, _) = test_chain();
        let utxo = chain.find_utxo().await.expect("find utxo");
        assert_eq!(utxo.len(), 1);
        let outputs = utxo.values().next().expect("one entry");
        assert_eq!(outputs.outputs.len(), 1);
        assert_eq!(outputs.outputs[0].0, 0);
        assert_eq!(outputs.outputs[0].1.value(), crate::core::transaction::SUBSIDY);
    }
}
