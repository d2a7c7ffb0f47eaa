use crate::crypto::address::{address_from_pub_key_hash, hash_pub_key};
use crate::crypto::keypair::{new_key_pair, raw_public_key};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// An ECDSA P-256 key pair. The address is a pure function of the public
/// key, so it is derived on demand rather than stored.
#[derive(Clone, Serialize, Deserialize)]
pub struct Wallet {
    pkcs8: Vec<u8>,
    public_key: Vec<u8>,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let pkcs8 = new_key_pair()?;
        let public_key = raw_public_key(pkcs8.as_slice())?;
        Ok(Wallet { pkcs8, public_key })
    }

    pub fn get_address(&self) -> String {
        address_from_pub_key_hash(hash_pub_key(self.public_key.as_slice()).as_slice())
    }

    /// Raw `X ‖ Y` public key bytes.
    pub fn public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    /// The private key as a PKCS#8 document.
    pub fn pkcs8(&self) -> &[u8] {
        self.pkcs8.as_slice()
    }
}
