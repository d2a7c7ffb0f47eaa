//! Merkle root of a block's transaction set.
//!
//! The base layer hashes each serialized transaction; every upper layer
//! hashes the concatenation of two children. A layer of odd cardinality
//! duplicates its last node before pairing.

use crate::crypto::hash::sha256_digest;
use crate::error::{CoinError, Result};

pub fn merkle_root(serialized_txs: &[Vec<u8>]) -> Result<Vec<u8>> {
    if serialized_txs.is_empty() {
        return Err(CoinError::EmptyMerkleTree);
    }

    let mut layer: Vec<Vec<u8>> = serialized_txs
        .iter()
        .map(|tx| sha256_digest(tx.as_slice()))
        .collect();

    while layer.len() > 1 {
        if layer.len() % 2 != 0 {
            layer.push(layer[layer.len() - 1].clone());
        }
        layer = layer
            .chunks(2)
            .map(|pair| {
                let mut concatenated = pair[0].clone();
                concatenated.extend_from_slice(pair[1].as_slice());
                sha256_digest(concatenated.as_slice())
            })
            .collect();
    }

    Ok(layer.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_an_error() {
        assert!(merkle_root(&[]).is_err());
    }

    #[test]
    fn single_transaction_root_is_its_hash() {
        let tx = b"only transaction".to_vec();
        let root = merkle_root(std::slice::from_ref(&tx)).expect("root");
        assert_eq!(root, sha256_digest(tx.as_slice()));
    }

    #[test]
    fn two_transactions_hash_their_concatenated_leaves() {
        let a = b"tx a".to_vec();
        let b = b"tx b".to_vec();
        let root = merkle_root(&[a.clone(), b.clone()]).expect("root");

        let mut concatenated = sha256_digest(a.as_slice());
        concatenated.extend_from_slice(sha256_digest(b.as_slice()).as_slice());
        assert_eq!(root, sha256_digest(concatenated.as_slice()));
    }

    #[test]
    fn odd_layer_duplicates_last_node() {
        let a = b"tx a".to_vec();
        let b = b"tx b".to_vec();
        let c = b"tx c".to_vec();
        let odd = merkle_root(&[a.clone(), b.clone(), c.clone()]).expect("root");
        let padded = merkle_root(&[a, b, c.clone(), c]).expect("root");
        assert_eq!(odd, padded);
    }

    #[test]
    fn any_byte_change_changes_the_root() {
        let txs = vec![b"tx a".to_vec(), b"tx b".to_vec(), b"tx c".to_vec()];
        let root = merkle_root(&txs).expect("root");

        let mut mutated = txs.clone();
        mutated[1][0] ^= 0x01;
        assert_ne!(root, merkle_root(&mutated).expect("root"));
    }
}
