pub mod store;
pub mod utxo_set;

pub use store::{ChainIterator, ChainStore, GENESIS_COINBASE_DATA};
pub use utxo_set::UTXOSet;
