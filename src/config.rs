//! Node configuration.
//!
//! Everything persistent or network-visible is keyed by `NODE_ID` (a port
//! number): the node listens on `127.0.0.1:<NODE_ID>`, stores its chain under
//! `<DATA_DIR>/blocks_<NODE_ID>` and its wallets in
//! `<DATA_DIR>/wallets_<NODE_ID>.data`. `DATA_DIR` defaults to `./tmp` and is
//! overridable so tests can point a node at a scratch directory.
//!
//! The miner address is runtime state (set by `startnode -miner`); it lives
//! here so the server and the mining trigger read it from one place.

use crate::error::{CoinError, Result};
use once_cell::sync::Lazy;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::RwLock;

pub const DEFAULT_DATA_DIR: &str = "./tmp";
pub const DEFAULT_CENTRAL_NODE: &str = "127.0.0.1:3000";

pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::new);

pub struct Config {
    miner_address: RwLock<Option<String>>,
}

impl Config {
    fn new() -> Config {
        Config {
            miner_address: RwLock::new(None),
        }
    }

    /// The node identity. Required for every subcommand that touches disk or
    /// the network.
    pub fn node_id(&self) -> Result<String> {
        env::var("NODE_ID").map_err(|_| CoinError::NodeIdMissing)
    }

    pub fn node_addr(&self) -> Result<SocketAddr> {
        let node_id = self.node_id()?;
        format!("127.0.0.1:{}", node_id)
            .parse()
            .map_err(|_| CoinError::InvalidNodeAddress(node_id))
    }

    /// The bootstrap peer. The first entry of every known-peers list.
    pub fn central_node(&self) -> SocketAddr {
        env::var("CENTRAL_NODE")
            .unwrap_or_else(|_| DEFAULT_CENTRAL_NODE.to_string())
            .parse()
            .unwrap_or_else(|_| {
                DEFAULT_CENTRAL_NODE
                    .parse()
                    .expect("default central node address is valid")
            })
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string()))
    }

    pub fn blocks_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir().join(format!("blocks_{}", self.node_id()?)))
    }

    pub fn wallets_file(&self) -> Result<PathBuf> {
        Ok(self
            .data_dir()
            .join(format!("wallets_{}.data", self.node_id()?)))
    }

    pub fn set_miner_address(&self, address: &str) -> Result<()> {
        let mut guard = self
            .miner_address
            .write()
            .map_err(|e| CoinError::PoisonedLock(e.to_string()))?;
        *guard = Some(address.to_string());
        Ok(())
    }

    pub fn miner_address(&self) -> Option<String> {
        self.miner_address.read().ok()?.clone()
    }

    pub fn is_miner(&self) -> bool {
        self.miner_address
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }
}
