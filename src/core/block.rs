use crate::core::merkle::merkle_root;
use crate::core::proof_of_work::ProofOfWork;
use crate::core::transaction::Transaction;
use crate::error::{CoinError, Result};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;

/// One block of the chain.
///
/// `hash` is the SHA-256 of the mined header preimage; `prev_block_hash` is
/// empty only for the genesis block; `height` is 0 for genesis and
/// parent height + 1 otherwise.
#[derive(Clone, Serialize, Deserialize)]
pub struct Block {
    hash: Vec<u8>,
    transactions: Vec<Transaction>,
    prev_block_hash: Vec<u8>,
    nonce: i64,
    height: usize,
}

impl Block {
    /// Assembles and mines a block. Blocks on the proof-of-work search;
    /// raising `cancel` aborts it with [`CoinError::MiningInterrupted`].
    pub fn new_block(
        prev_block_hash: Vec<u8>,
        transactions: &[Transaction],
        height: usize,
        cancel: &AtomicBool,
    ) -> Result<Block> {
        let mut block = Block {
            hash: vec![],
            transactions: transactions.to_vec(),
            prev_block_hash,
            nonce: 0,
            height,
        };
        let pow = ProofOfWork::new(block.clone())?;
        let (nonce, hash) = pow.run(cancel)?;
        block.nonce = nonce;
        block.hash = hash;
        Ok(block)
    }

    pub fn generate_genesis_block(coinbase: &Transaction, cancel: &AtomicBool) -> Result<Block> {
        Block::new_block(vec![], &[coinbase.clone()], 0, cancel)
    }

    pub fn hash(&self) -> &[u8] {
        self.hash.as_slice()
    }

    pub fn hash_hex(&self) -> String {
        HEXLOWER.encode(self.hash.as_slice())
    }

    pub fn prev_block_hash(&self) -> &[u8] {
        self.prev_block_hash.as_slice()
    }

    pub fn nonce(&self) -> i64 {
        self.nonce
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    /// Merkle root over the serialized transactions; part of the mining
    /// preimage, so any transaction byte change invalidates the stored hash.
    pub fn transactions_merkle_root(&self) -> Result<Vec<u8>> {
        let serialized: Vec<Vec<u8>> = self
            .transactions
            .iter()
            .map(|tx| tx.serialize())
            .collect::<Result<_>>()?;
        merkle_root(serialized.as_slice())
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CoinError::Serialization(e.to_string()))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(block, _)| block)
            .map_err(|e| CoinError::Deserialization(e.to_string()))
    }
}
