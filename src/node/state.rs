use crate::core::memory_pool::{BlocksInTransit, MemoryPool};
use crate::error::{CoinError, Result};
use std::net::SocketAddr;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// Known peer addresses, in learn order. The first entry is the bootstrap
/// node the network forms around.
pub struct KnownNodes {
    inner: RwLock<Vec<SocketAddr>>,
}

impl KnownNodes {
    pub fn new(bootstrap: SocketAddr) -> KnownNodes {
        KnownNodes {
            inner: RwLock::new(vec![bootstrap]),
        }
    }

    pub fn contains(&self, addr: &SocketAddr) -> Result<bool> {
        let inner = self
            .inner
            .read()
            .map_err(|e| CoinError::PoisonedLock(e.to_string()))?;
        Ok(inner.contains(addr))
    }

    pub fn add(&self, addr: SocketAddr) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| CoinError::PoisonedLock(e.to_string()))?;
        if !inner.contains(&addr) {
            inner.push(addr);
        }
        Ok(())
    }

    /// Set-union with a gossiped peer list; known entries keep their
    /// position.
    pub fn union(&self, addrs: &[SocketAddr]) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| CoinError::PoisonedLock(e.to_string()))?;
        for addr in addrs {
            if !inner.contains(addr) {
                inner.push(*addr);
            }
        }
        Ok(())
    }

    /// Drops an unreachable peer.
    pub fn remove(&self, addr: &SocketAddr) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| CoinError::PoisonedLock(e.to_string()))?;
        inner.retain(|known| known != addr);
        Ok(())
    }

    pub fn all(&self) -> Result<Vec<SocketAddr>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| CoinError::PoisonedLock(e.to_string()))?;
        Ok(inner.clone())
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

/// All mutable state a running node shares between connection tasks: the
/// peer list, the mempool, the block-download queue and the shutdown flag.
/// Owned by the server and passed to every handler.
pub struct NodeState {
    known_nodes: KnownNodes,
    pub mempool: MemoryPool,
    pub blocks_in_transit: BlocksInTransit,
    shutdown: AtomicBool,
}

impl NodeState {
    pub fn new(bootstrap: SocketAddr) -> NodeState {
        NodeState {
            known_nodes: KnownNodes::new(bootstrap),
            mempool: MemoryPool::new(),
            blocks_in_transit: BlocksInTransit::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn known_nodes(&self) -> &KnownNodes {
        &self.known_nodes
    }

    /// The flag the mining loop polls; raised once on shutdown.
    pub fn shutdown_flag(&self) -> &AtomicBool {
        &self.shutdown
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}
