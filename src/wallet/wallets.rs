use crate::config::GLOBAL_CONFIG;
use crate::error::{CoinError, Result};
use crate::wallet::wallet::Wallet;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// The node's wallet file: a persisted `address → wallet` map.
pub struct Wallets {
    wallets: HashMap<String, Wallet>,
    path: PathBuf,
}

impl Wallets {
    /// Opens the node's wallet file, starting empty if it does not exist.
    pub fn new() -> Result<Wallets> {
        Wallets::open_at(GLOBAL_CONFIG.wallets_file()?)
    }

    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Wallets> {
        let mut wallets = Wallets {
            wallets: HashMap::new(),
            path: path.as_ref().to_path_buf(),
        };
        wallets.load_from_file()?;
        Ok(wallets)
    }

    /// Creates one wallet, persists the map, and returns the new address.
    pub fn create_wallet(&mut self) -> Result<String> {
        let wallet = Wallet::new()?;
        let address = wallet.get_address();
        self.wallets.insert(address.clone(), wallet);
        self.save_to_file()?;
        Ok(address)
    }

    pub fn get_addresses(&self) -> Vec<String> {
        self.wallets.keys().cloned().collect()
    }

    pub fn get_wallet(&self, address: &str) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    fn load_from_file(&mut self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let mut file =
            File::open(&self.path).map_err(|e| CoinError::WalletFile(e.to_string()))?;
        let mut buf = vec![];
        file.read_to_end(&mut buf)
            .map_err(|e| CoinError::WalletFile(e.to_string()))?;
        self.wallets =
            bincode::serde::decode_from_slice(buf.as_slice(), bincode::config::standard())
                .map_err(|e| CoinError::Deserialization(e.to_string()))?
                .0;
        Ok(())
    }

    fn save_to_file(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoinError::WalletFile(e.to_string()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| CoinError::WalletFile(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        let bytes = bincode::serde::encode_to_vec(&self.wallets, bincode::config::standard())
            .map_err(|e| CoinError::Serialization(e.to_string()))?;
        writer
            .write_all(bytes.as_slice())
            .map_err(|e| CoinError::WalletFile(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| CoinError::WalletFile(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn wallets_persist_across_reloads() {
        let dir = TempDir::new().expect("create temp dir");
        let file = dir.path().join("wallets_3900.data");

        let mut wallets = Wallets::open_at(&file).expect("open wallets");
        let first = wallets.create_wallet().expect("create wallet");
        let second = wallets.create_wallet().expect("create wallet");

        let reloaded = Wallets::open_at(&file).expect("reload wallets");
        let mut addresses = reloaded.get_addresses();
        addresses.sort();
        let mut expected = vec![first.clone(), second];
        expected.sort();
        assert_eq!(addresses, expected);
        assert!(reloaded.get_wallet(&first).is_some());
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = TempDir::new().expect("create temp dir");
        let wallets =
            Wallets::open_at(dir.path().join("wallets_3901.data")).expect("open wallets");
        assert!(wallets.get_addresses().is_empty());
    }

    #[test]
    fn unknown_address_has_no_wallet() {
        let dir = TempDir::new().expect("create temp dir");
        let wallets =
            Wallets::open_at(dir.path().join("wallets_3902.data")).expect("open wallets");
        assert!(wallets.get_wallet("not-an-address").is_none());
    }
}
