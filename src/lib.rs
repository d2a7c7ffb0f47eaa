pub mod chain;
pub mod config;
pub mod core;
pub mod crypto;
pub mod error;
pub mod network;
pub mod node;
pub mod wallet;

pub use chain::{ChainIterator, ChainStore, GENESIS_COINBASE_DATA, UTXOSet};
pub use config::GLOBAL_CONFIG;
pub use core::{
    Block, BlocksInTransit, DIFFICULTY, MemoryPool, ProofOfWork, SUBSIDY, TXInput, TXOutput,
    TXOutputs, Transaction, merkle_root,
};
pub use crypto::{
    address_from_pub_key_hash, base58_decode, base58_encode, hash_pub_key,
    pub_key_hash_from_address, sha256_digest, validate_address,
};
pub use error::{CoinError, Result};
pub use network::{InvKind, Message, Server};
pub use node::{KnownNodes, NodeState};
pub use wallet::{Wallet, Wallets};
