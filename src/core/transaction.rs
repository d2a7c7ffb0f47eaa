use crate::chain::utxo_set::UTXOSet;
use crate::crypto::address::{hash_pub_key, pub_key_hash_from_address};
use crate::crypto::keypair::{ecdsa_sign_digest, ecdsa_verify_digest};
use crate::crypto::hash::sha256_digest;
use crate::error::{CoinError, Result};
use crate::wallet::Wallet;
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fixed mining reward paid by every coinbase output.
pub const SUBSIDY: i32 = 20;

/// Coinbase inputs with no caller-supplied data carry this many random bytes
/// (hex formatted) so every coinbase hashes uniquely.
const COINBASE_RANDOM_DATA_LEN: usize = 24;

/// Output index used by the coinbase marker input.
const COINBASE_VOUT: i32 = -1;

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TXInput {
    txid: Vec<u8>,
    vout: i32,
    signature: Vec<u8>,
    pub_key: Vec<u8>,
}

impl TXInput {
    pub fn new(txid: &[u8], vout: i32, pub_key: &[u8]) -> TXInput {
        TXInput {
            txid: txid.to_vec(),
            vout,
            signature: vec![],
            pub_key: pub_key.to_vec(),
        }
    }

    pub fn txid(&self) -> &[u8] {
        self.txid.as_slice()
    }

    pub fn txid_hex(&self) -> String {
        HEXLOWER.encode(self.txid.as_slice())
    }

    pub fn vout(&self) -> i32 {
        self.vout
    }

    pub fn signature(&self) -> &[u8] {
        self.signature.as_slice()
    }

    pub fn pub_key(&self) -> &[u8] {
        self.pub_key.as_slice()
    }

    pub fn uses_key(&self, pub_key_hash: &[u8]) -> bool {
        hash_pub_key(self.pub_key.as_slice()).eq(pub_key_hash)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TXOutput {
    value: i32,
    pub_key_hash: Vec<u8>,
}

impl TXOutput {
    /// Creates an output worth `value` locked to `address`.
    pub fn new(value: i32, address: &str) -> Result<TXOutput> {
        Ok(TXOutput {
            value,
            pub_key_hash: pub_key_hash_from_address(address)?,
        })
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn pub_key_hash(&self) -> &[u8] {
        self.pub_key_hash.as_slice()
    }

    pub fn is_locked_with_key(&self, pub_key_hash: &[u8]) -> bool {
        self.pub_key_hash.eq(pub_key_hash)
    }
}

/// The surviving outputs of one transaction, each tagged with its original
/// output index. This is the value stored per transaction in the UTXO index;
/// keeping the index with the output means consuming an earlier output never
/// shifts the references to later ones.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TXOutputs {
    pub outputs: Vec<(usize, TXOutput)>,
}

impl TXOutputs {
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CoinError::Serialization(e.to_string()))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<TXOutputs> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(outputs, _)| outputs)
            .map_err(|e| CoinError::Deserialization(e.to_string()))
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Transaction {
    id: Vec<u8>,
    vin: Vec<TXInput>,
    vout: Vec<TXOutput>,
}

impl Transaction {
    /// Creates the coinbase transaction paying the mining reward to `to`.
    ///
    /// `data` is free-form provenance carried in the marker input's pubkey
    /// field; when empty it is replaced with random hex.
    pub fn new_coinbase_tx(to: &str, data: &str) -> Result<Transaction> {
        let data = if data.is_empty() {
            let random: [u8; COINBASE_RANDOM_DATA_LEN] = rand::random();
            HEXLOWER.encode(&random)
        } else {
            data.to_string()
        };
        let input = TXInput {
            txid: vec![],
            vout: COINBASE_VOUT,
            signature: vec![],
            pub_key: data.into_bytes(),
        };
        let output = TXOutput::new(SUBSIDY, to)?;

        let mut tx = Transaction {
            id: vec![],
            vin: vec![input],
            vout: vec![output],
        };
        tx.id = tx.hash()?;
        Ok(tx)
    }

    /// Builds, signs and returns a transfer of `amount` from `from_wallet`
    /// to `to`, spending outputs selected from the UTXO index. A change
    /// output back to the sender is added when the selection overshoots.
    pub async fn new_utxo_transaction(
        from_wallet: &Wallet,
        to: &str,
        amount: i32,
        utxo_set: &UTXOSet,
    ) -> Result<Transaction> {
        let pub_key_hash = hash_pub_key(from_wallet.public_key());
        let (accumulated, spendable) = utxo_set
            .find_spendable_outputs(pub_key_hash.as_slice(), amount)
            .await?;
        if accumulated < amount {
            return Err(CoinError::InsufficientFunds);
        }

        let mut inputs = vec![];
        for (txid_hex, out_indexes) in spendable {
            let txid = HEXLOWER
                .decode(txid_hex.as_bytes())
                .map_err(|e| CoinError::HexDecoding(e.to_string()))?;
            for out_index in out_indexes {
                inputs.push(TXInput::new(
                    txid.as_slice(),
                    out_index as i32,
                    from_wallet.public_key(),
                ));
            }
        }

        let mut outputs = vec![TXOutput::new(amount, to)?];
        if accumulated > amount {
            let change_address = from_wallet.get_address();
            outputs.push(TXOutput::new(accumulated - amount, &change_address)?);
        }

        let mut tx = Transaction {
            id: vec![],
            vin: inputs,
            vout: outputs,
        };
        tx.id = tx.hash()?;
        utxo_set
            .chain()
            .sign_transaction(&mut tx, from_wallet.pkcs8())
            .await?;
        Ok(tx)
    }

    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].txid.is_empty() && self.vin[0].vout == COINBASE_VOUT
    }

    /// SHA-256 of the transaction serialized with a zeroed id.
    fn hash(&self) -> Result<Vec<u8>> {
        let tx_copy = Transaction {
            id: vec![],
            vin: self.vin.clone(),
            vout: self.vout.clone(),
        };
        Ok(sha256_digest(tx_copy.serialize()?.as_slice()))
    }

    /// Copy with signatures and pubkeys cleared; the deterministic form both
    /// signing and verification hash against.
    fn trimmed_copy(&self) -> Transaction {
        let inputs = self
            .vin
            .iter()
            .map(|input| TXInput {
                txid: input.txid.clone(),
                vout: input.vout,
                signature: vec![],
                pub_key: vec![],
            })
            .collect();
        Transaction {
            id: self.id.clone(),
            vin: inputs,
            vout: self.vout.clone(),
        }
    }

    /// Signs every input against the outputs it spends. `prev_txs` maps the
    /// hex id of each referenced transaction to the transaction itself.
    pub fn sign(
        &mut self,
        prev_txs: &HashMap<String, Transaction>,
        pkcs8: &[u8],
    ) -> Result<()> {
        if self.is_coinbase() {
            return Ok(());
        }
        let mut tx_copy = self.trimmed_copy();
        for idx in 0..self.vin.len() {
            let prev_tx = prev_txs
                .get(&self.vin[idx].txid_hex())
                .ok_or_else(|| CoinError::TransactionNotFound(self.vin[idx].txid_hex()))?;
            let out_index = usize::try_from(self.vin[idx].vout)
                .map_err(|_| CoinError::InvalidTransaction)?;
            let prev_out = prev_tx
                .vout
                .get(out_index)
                .ok_or(CoinError::InvalidTransaction)?;

            tx_copy.vin[idx].signature = vec![];
            tx_copy.vin[idx].pub_key = prev_out.pub_key_hash.clone();
            tx_copy.id = tx_copy.hash()?;
            tx_copy.vin[idx].pub_key = vec![];

            self.vin[idx].signature = ecdsa_sign_digest(pkcs8, tx_copy.id.as_slice())?;
        }
        Ok(())
    }

    /// Verifies every input's signature. The first failure makes the whole
    /// transaction invalid. Structurally broken references (bad output
    /// index) also verify to false.
    pub fn verify(&self, prev_txs: &HashMap<String, Transaction>) -> Result<bool> {
        if self.is_coinbase() {
            return Ok(true);
        }
        let mut tx_copy = self.trimmed_copy();
        for (idx, vin) in self.vin.iter().enumerate() {
            let prev_tx = prev_txs
                .get(&vin.txid_hex())
                .ok_or_else(|| CoinError::TransactionNotFound(vin.txid_hex()))?;
            let Ok(out_index) = usize::try_from(vin.vout) else {
                return Ok(false);
            };
            let Some(prev_out) = prev_tx.vout.get(out_index) else {
                return Ok(false);
            };

            tx_copy.vin[idx].signature = vec![];
            tx_copy.vin[idx].pub_key = prev_out.pub_key_hash.clone();
            tx_copy.id = tx_copy.hash()?;
            tx_copy.vin[idx].pub_key = vec![];

            if !ecdsa_verify_digest(
                vin.pub_key.as_slice(),
                vin.signature.as_slice(),
                tx_copy.id.as_slice(),
            ) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn id(&self) -> &[u8] {
        self.id.as_slice()
    }

    pub fn id_hex(&self) -> String {
        HEXLOWER.encode(self.id.as_slice())
    }

    pub fn vin(&self) -> &[TXInput] {
        self.vin.as_slice()
    }

    pub fn vout(&self) -> &[TXOutput] {
        self.vout.as_slice()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CoinError::Serialization(e.to_string()))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(tx, _)| tx)
            .map_err(|e| CoinError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;

    fn test_address() -> String {
        Wallet::new().expect("create wallet").get_address()
    }

    #[test]
    fn coinbase_has_marker_shape() {
        let tx = Transaction::new_coinbase_tx(&test_address(), "").expect("create coinbase");
        assert!(tx.is_coinbase());
        assert_eq!(tx.vin().len(), 1);
        assert_eq!(tx.vout().len(), 1);
        assert!(tx.vin()[0].txid().is_empty());
        assert_eq!(tx.vin()[0].vout(), -1);
        assert_eq!(tx.vout()[0].value(), SUBSIDY);
        assert_eq!(tx.id().len(), 32);
    }

    #[test]
    fn coinbase_with_empty_data_gets_random_provenance() {
        let address = test_address();
        let first = Transaction::new_coinbase_tx(&address, "").expect("create coinbase");
        let second = Transaction::new_coinbase_tx(&address, "").expect("create coinbase");
        assert!(!first.vin()[0].pub_key().is_empty());
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn coinbase_keeps_explicit_data() {
        let tx = Transaction::new_coinbase_tx(&test_address(), "First Transaction from Genesis")
            .expect("create coinbase");
        assert_eq!(tx.vin()[0].pub_key(), b"First Transaction from Genesis");
    }

    #[test]
    fn serialization_round_trip() {
        let tx = Transaction::new_coinbase_tx(&test_address(), "").expect("create coinbase");
        let bytes = tx.serialize().expect("serialize");
        let decoded = Transaction::deserialize(bytes.as_slice()).expect("deserialize");
        assert_eq!(tx.id(), decoded.id());
        assert_eq!(tx.vin().len(), decoded.vin().len());
        assert_eq!(tx.vout().len(), decoded.vout().len());
    }

    #[test]
    fn outputs_round_trip_with_indexes() {
        let address = test_address();
        let outputs = TXOutputs {
            outputs: vec![
                (0, TXOutput::new(7, &address).expect("output")),
                (2, TXOutput::new(13, &address).expect("output")),
            ],
        };
        let decoded =
            TXOutputs::deserialize(outputs.serialize().expect("serialize").as_slice())
                .expect("deserialize");
        assert_eq!(decoded.outputs.len(), 2);
        assert_eq!(decoded.outputs[1].0, 2);
        assert_eq!(decoded.outputs[1].1.value(), 13);
    }

    fn signed_transfer() -> (Transaction, HashMap<String, Transaction>, Wallet) {
        let sender = Wallet::new().expect("create sender");
        let receiver = Wallet::new().expect("create receiver");
        let coinbase =
            Transaction::new_coinbase_tx(&sender.get_address(), "").expect("create coinbase");

        let mut tx = Transaction {
            id: vec![],
            vin: vec![TXInput::new(coinbase.id(), 0, sender.public_key())],
            vout: vec![TXOutput::new(SUBSIDY, &receiver.get_address()).expect("output")],
        };
        tx.id = tx.hash().expect("hash");

        let mut prev_txs = HashMap::new();
        prev_txs.insert(coinbase.id_hex(), coinbase);
        tx.sign(&prev_txs, sender.pkcs8()).expect("sign");
        (tx, prev_txs, sender)
    }

    #[test]
    fn signed_transaction_verifies() {
        let (tx, prev_txs, _) = signed_transfer();
        assert!(tx.verify(&prev_txs).expect("verify"));
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let (mut tx, prev_txs, _) = signed_transfer();
        tx.vin[0].signature[7] ^= 0x01;
        assert!(!tx.verify(&prev_txs).expect("verify"));
    }

    #[test]
    fn tampered_pub_key_fails_verification() {
        let (mut tx, prev_txs, _) = signed_transfer();
        tx.vin[0].pub_key[0] ^= 0x01;
        assert!(!tx.verify(&prev_txs).expect("verify"));
    }

    #[test]
    fn missing_prev_transaction_is_an_error() {
        let (tx, _, _) = signed_transfer();
        assert!(tx.verify(&HashMap::new()).is_err());
    }

    #[test]
    fn input_key_matching() {
        let wallet = Wallet::new().expect("create wallet");
        let input = TXInput::new(&[1, 2, 3], 0, wallet.public_key());
        assert!(input.uses_key(&hash_pub_key(wallet.public_key())));
        assert!(!input.uses_key(&[0u8; 20]));
    }

    #[test]
    fn output_lock_matches_address() {
        let wallet = Wallet::new().expect("create wallet");
        let address = wallet.get_address();
        let output = TXOutput::new(5, &address).expect("output");
        assert!(output.is_locked_with_key(&hash_pub_key(wallet.public_key())));
        assert!(!output.is_locked_with_key(&[0u8; 20]));
    }
}
