pub mod block;
pub mod memory_pool;
pub mod merkle;
pub mod proof_of_work;
pub mod transaction;

pub use block::Block;
pub use memory_pool::{BlocksInTransit, MemoryPool};
pub use merkle::merkle_root;
pub use proof_of_work::{DIFFICULTY, ProofOfWork};
pub use transaction::{SUBSIDY, TXInput, TXOutput, TXOutputs, Transaction};
