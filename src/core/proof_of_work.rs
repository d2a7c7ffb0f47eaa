use crate::core::block::Block;
use crate::crypto::hash::sha256_digest;
use crate::error::{CoinError, Result};
use num_bigint::{BigInt, Sign};
use std::ops::ShlAssign;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::debug;

/// Leading zero bits a block hash must carry. Fixed for the lifetime of a
/// chain; all nodes must agree on it.
pub const DIFFICULTY: i64 = 12;

const MAX_NONCE: i64 = i64::MAX;

/// The mining predicate: a nonce solves the block iff
/// `SHA256(prev_hash ‖ merkle_root ‖ be64(nonce) ‖ be64(difficulty))`,
/// read as a big-endian integer, is strictly below `1 << (256 - DIFFICULTY)`.
pub struct ProofOfWork {
    block: Block,
    merkle_root: Vec<u8>,
    target: BigInt,
}

impl ProofOfWork {
    pub fn new(block: Block) -> Result<ProofOfWork> {
        let merkle_root = block.transactions_merkle_root()?;
        let mut target = BigInt::from(1);
        target.shl_assign(256 - DIFFICULTY as usize);
        Ok(ProofOfWork {
            block,
            merkle_root,
            target,
        })
    }

    fn prepare_data(&self, nonce: i64) -> Vec<u8> {
        let mut data = vec![];
        data.extend(self.block.prev_block_hash());
        data.extend(self.merkle_root.as_slice());
        data.extend(nonce.to_be_bytes());
        data.extend(DIFFICULTY.to_be_bytes());
        data
    }

    fn hash_is_below_target(&self, hash: &[u8]) -> bool {
        BigInt::from_bytes_be(Sign::Plus, hash).lt(&self.target)
    }

    /// Searches the nonce space until a solution is found or `cancel` is
    /// raised. Worker threads stride the space; the first solution wins via
    /// a shared found flag and the other workers stop.
    pub fn run(&self, cancel: &AtomicBool) -> Result<(i64, Vec<u8>)> {
        let workers = thread::available_parallelism()
            .map(|n| n.get() as i64)
            .unwrap_or(1);
        let found = AtomicBool::new(false);
        let winner: Mutex<Option<(i64, Vec<u8>)>> = Mutex::new(None);

        debug!(workers, "mining block");
        thread::scope(|scope| {
            for worker in 0..workers {
                let found = &found;
                let winner = &winner;
                scope.spawn(move || {
                    let mut nonce = worker;
                    while nonce < MAX_NONCE
                        && !found.load(Ordering::Relaxed)
                        && !cancel.load(Ordering::Relaxed)
                    {
                        let hash = sha256_digest(self.prepare_data(nonce).as_slice());
                        if self.hash_is_below_target(hash.as_slice()) {
                            // Only the worker that flips the flag commits.
                            if !found.swap(true, Ordering::SeqCst) {
                                if let Ok(mut slot) = winner.lock() {
                                    *slot = Some((nonce, hash));
                                }
                            }
                            return;
                        }
                        nonce += workers;
                    }
                });
            }
        });

        let winner = winner
            .into_inner()
            .map_err(|e| CoinError::PoisonedLock(e.to_string()))?;
        match winner {
            Some((nonce, hash)) => {
                debug!(nonce, hash = %data_encoding::HEXLOWER.encode(hash.as_slice()), "block mined");
                Ok((nonce, hash))
            }
            None => Err(CoinError::MiningInterrupted),
        }
    }

    /// Re-runs the predicate with the block's stored nonce.
    pub fn validate(&self) -> Result<bool> {
        let hash = sha256_digest(self.prepare_data(self.block.nonce()).as_slice());
        Ok(self.hash_is_below_target(hash.as_slice()))
    }
}
