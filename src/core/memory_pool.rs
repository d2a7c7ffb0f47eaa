use crate::core::transaction::Transaction;
use crate::error::{CoinError, Result};
use std::collections::HashMap;
use std::sync::RwLock;

/// Received, not-yet-mined transactions, keyed by hex transaction id.
pub struct MemoryPool {
    inner: RwLock<HashMap<String, Transaction>>,
}

impl MemoryPool {
    pub fn new() -> MemoryPool {
        MemoryPool {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn contains(&self, txid_hex: &str) -> Result<bool> {
        let inner = self
            .inner
            .read()
            .map_err(|e| CoinError::PoisonedLock(e.to_string()))?;
        Ok(inner.contains_key(txid_hex))
    }

    pub fn add(&self, tx: Transaction) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| CoinError::PoisonedLock(e.to_string()))?;
        inner.insert(tx.id_hex(), tx);
        Ok(())
    }

    pub fn get(&self, txid_hex: &str) -> Result<Option<Transaction>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| CoinError::PoisonedLock(e.to_string()))?;
        Ok(inner.get(txid_hex).cloned())
    }

    /// Removes and returns every pooled transaction.
    pub fn drain(&self) -> Result<Vec<Transaction>> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| CoinError::PoisonedLock(e.to_string()))?;
        Ok(inner.drain().map(|(_, tx)| tx).collect())
    }

    pub fn len(&self) -> Result<usize> {
        let inner = self
            .inner
            .read()
            .map_err(|e| CoinError::PoisonedLock(e.to_string()))?;
        Ok(inner.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl Default for MemoryPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Block hashes advertised by a peer and not yet downloaded.
pub struct BlocksInTransit {
    inner: RwLock<Vec<Vec<u8>>>,
}

impl BlocksInTransit {
    pub fn new() -> BlocksInTransit {
        BlocksInTransit {
            inner: RwLock::new(vec![]),
        }
    }

    /// Replaces the queue with a freshly advertised inventory.
    pub fn replace(&self, hashes: &[Vec<u8>]) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| CoinError::PoisonedLock(e.to_string()))?;
        *inner = hashes.to_vec();
        Ok(())
    }

    /// Pops the next hash to request, if any.
    pub fn take_first(&self) -> Result<Option<Vec<u8>>> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| CoinError::PoisonedLock(e.to_string()))?;
        if inner.is_empty() {
            Ok(None)
        } else {
            Ok(Some(inner.remove(0)))
        }
    }

    pub fn len(&self) -> Result<usize> {
        let inner = self
            .inner
            .read()
            .map_err(|e| CoinError::PoisonedLock(e.to_string()))?;
        Ok(inner.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl Default for BlocksInTransit {
    fn default() -> Self {
        Self::new()
    }
}
