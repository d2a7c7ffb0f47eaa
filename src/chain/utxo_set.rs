use crate::chain::store::ChainStore;
use crate::core::block::Block;
use crate::core::transaction::{TXOutput, TXOutputs};
use crate::crypto::address::pub_key_hash_from_address;
use crate::error::{CoinError, Result};
use data_encoding::HEXLOWER;
use sled::Batch;
use sled::transaction::{TransactionResult, UnabortableTransactionError};
use tracing::debug;
use std::collections::HashMap;

/// Reserved key prefix separating UTXO entries from blocks in the shared
/// database.
const UTXO_KEY_PREFIX: &[u8] = b"utxo-";

/// Keys removed per write batch while clearing the index, to bound memory
/// on large chains.
const DELETE_BATCH_SIZE: usize = 100_000;

/// Secondary index over unspent outputs so balance and spendable-output
/// queries need not rescan the chain. Holds a handle to the chain store it
/// projects; the chain remains the source of truth and the index can always
/// be rebuilt from it with [`UTXOSet::reindex`].
pub struct UTXOSet {
    chain: ChainStore,
}

impl UTXOSet {
    pub fn new(chain: ChainStore) -> UTXOSet {
        UTXOSet { chain }
    }

    pub fn chain(&self) -> &ChainStore {
        &self.chain
    }

    fn utxo_key(txid: &[u8]) -> Vec<u8> {
        let mut key = UTXO_KEY_PREFIX.to_vec();
        key.extend_from_slice(txid);
        key
    }

    /// Drops the whole index and rebuilds it from one chain scan.
    pub async fn reindex(&self) -> Result<()> {
        let db = self.chain.db();

        // Clear in pages: collect keys under the prefix and remove them in
        // bounded batches.
        let mut batch = Batch::default();
        let mut collected = 0;
        for item in db.scan_prefix(UTXO_KEY_PREFIX) {
            let (key, _) = item.map_err(|e| CoinError::Store(e.to_string()))?;
            batch.remove(key);
            collected += 1;
            if collected == DELETE_BATCH_SIZE {
                db.apply_batch(batch)
                    .map_err(|e| CoinError::Store(e.to_string()))?;
                batch = Batch::default();
                collected = 0;
            }
        }
        if collected > 0 {
            db.apply_batch(batch)
                .map_err(|e| CoinError::Store(e.to_string()))?;
        }

        let utxo_map = self.chain.find_utxo().await?;
        debug!(transactions = utxo_map.len(), "rebuilding utxo index");

        let mut insert_batch = Batch::default();
        for (txid_hex, outputs) in &utxo_map {
            let txid = HEXLOWER
                .decode(txid_hex.as_bytes())
                .map_err(|e| CoinError::HexDecoding(e.to_string()))?;
            insert_batch.insert(Self::utxo_key(txid.as_slice()), outputs.serialize()?);
        }
        db.apply_batch(insert_batch)
            .map_err(|e| CoinError::Store(e.to_string()))?;
        Ok(())
    }

    /// Applies one accepted block to the index: consumed outputs disappear,
    /// and every transaction's outputs are inserted under its id. Atomic per
    /// block.
    pub async fn update(&self, block: &Block) -> Result<()> {
        let db = self.chain.db();

        // The fresh output sets are independent of index state, so they are
        // serialized once, outside the retryable closure.
        let mut fresh: Vec<(Vec<u8>, Vec<u8>)> = vec![];
        for tx in block.transactions() {
            let outputs = TXOutputs {
                outputs: tx
                    .vout()
                    .iter()
                    .cloned()
                    .enumerate()
                    .collect(),
            };
            fresh.push((Self::utxo_key(tx.id()), outputs.serialize()?));
        }

        let result: TransactionResult<(), ()> = db.transaction(|tx_db| {
            let storage_err = |msg: String| {
                UnabortableTransactionError::Storage(sled::Error::Unsupported(msg))
            };

            for tx in block.transactions() {
                if tx.is_coinbase() {
                    continue;
                }
                for vin in tx.vin() {
                    let key = Self::utxo_key(vin.txid());
                    let entry = tx_db
                        .get(key.as_slice())?
                        .ok_or_else(|| {
                            storage_err(format!("utxo entry missing for {}", vin.txid_hex()))
                        })?;
                    let outputs = TXOutputs::deserialize(entry.as_ref())
                        .map_err(|e| storage_err(e.to_string()))?;

                    let surviving = TXOutputs {
                        outputs: outputs
                            .outputs
                            .into_iter()
                            .filter(|(idx, _)| *idx as i32 != vin.vout())
                            .collect(),
                    };
                    if surviving.outputs.is_empty() {
                        tx_db.remove(key.as_slice())?;
                    } else {
                        let bytes = surviving
                            .serialize()
                            .map_err(|e| storage_err(e.to_string()))?;
                        tx_db.insert(key.as_slice(), bytes)?;
                    }
                }
            }

            for (key, bytes) in &fresh {
                tx_db.insert(key.as_slice(), bytes.clone())?;
            }
            Ok(())
        });
        result
            .map(|_| ())
            .map_err(|e| CoinError::Store(format!("{:?}", e)))
    }

    /// Unspent outputs locked to `pub_key_hash`.
    pub async fn find_utxo(&self, pub_key_hash: &[u8]) -> Result<Vec<TXOutput>> {
        let mut utxos = vec![];
        for item in self.chain.db().scan_prefix(UTXO_KEY_PREFIX) {
            let (_, value) = item.map_err(|e| CoinError::Store(e.to_string()))?;
            let outputs = TXOutputs::deserialize(value.as_ref())?;
            for (_, out) in outputs.outputs {
                if out.is_locked_with_key(pub_key_hash) {
                    utxos.push(out);
                }
            }
        }
        Ok(utxos)
    }

    /// Selects outputs locked to `pub_key_hash` until their sum reaches
    /// `amount`. Returns the accumulated value and the selected output
    /// indices grouped by hex transaction id; the caller decides whether the
    /// accumulation suffices.
    pub async fn find_spendable_outputs(
        &self,
        pub_key_hash: &[u8],
        amount: i32,
    ) -> Result<(i32, HashMap<String, Vec<usize>>)> {
        let mut spendable: HashMap<String, Vec<usize>> = HashMap::new();
        let mut accumulated = 0;

        for item in self.chain.db().scan_prefix(UTXO_KEY_PREFIX) {
            let (key, value) = item.map_err(|e| CoinError::Store(e.to_string()))?;
            let txid_hex = HEXLOWER.encode(&key[UTXO_KEY_PREFIX.len()..]);
            let outputs = TXOutputs::deserialize(value.as_ref())?;
            for (idx, out) in outputs.outputs {
                if accumulated < amount && out.is_locked_with_key(pub_key_hash) {
                    accumulated += out.value();
                    spendable.entry(txid_hex.clone()).or_default().push(idx);
                }
            }
        }
        Ok((accumulated, spendable))
    }

    /// Number of transactions with at least one unspent output.
    pub async fn count_transactions(&self) -> Result<usize> {
        let mut count = 0;
        for item in self.chain.db().scan_prefix(UTXO_KEY_PREFIX) {
            item.map_err(|e| CoinError::Store(e.to_string()))?;
            count += 1;
        }
        Ok(count)
    }

    /// Sum of the unspent outputs locked to `address`.
    pub async fn get_balance(&self, address: &str) -> Result<i32> {
        let pub_key_hash = pub_key_hash_from_address(address)?;
        let utxos = self.find_utxo(pub_key_hash.as_slice()).await?;
        Ok(utxos.iter().map(|out| out.value()).sum())
    }
}
