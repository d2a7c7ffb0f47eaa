//! Address derivation and validation.
//!
//! An address is `Base58(version ‖ pubkey_hash ‖ checksum)` where the pubkey
//! hash is RIPEMD160(SHA256(pubkey)) and the checksum is the first four bytes
//! of a double SHA-256 over `version ‖ pubkey_hash`.

use crate::crypto::hash::{double_sha256_digest, ripemd160_digest};
use crate::error::{CoinError, Result};

const VERSION: u8 = 0x00;
pub const ADDRESS_CHECKSUM_LEN: usize = 4;

pub fn base58_encode(data: &[u8]) -> String {
    bs58::encode(data).into_string()
}

pub fn base58_decode(data: &str) -> Result<Vec<u8>> {
    bs58::decode(data)
        .into_vec()
        .map_err(|e| CoinError::AddressDecoding(e.to_string()))
}

/// The 20-byte hash that locks outputs to a public key.
pub fn hash_pub_key(pub_key: &[u8]) -> Vec<u8> {
    ripemd160_digest(pub_key)
}

fn checksum(payload: &[u8]) -> Vec<u8> {
    double_sha256_digest(payload)[..ADDRESS_CHECKSUM_LEN].to_vec()
}

/// Builds the Base58 address for a pubkey hash.
pub fn address_from_pub_key_hash(pub_key_hash: &[u8]) -> String {
    let mut payload = Vec::with_capacity(1 + pub_key_hash.len() + ADDRESS_CHECKSUM_LEN);
    payload.push(VERSION);
    payload.extend_from_slice(pub_key_hash);
    let check = checksum(payload.as_slice());
    payload.extend_from_slice(check.as_slice());
    base58_encode(payload.as_slice())
}

/// Recovers the pubkey hash embedded in an address.
pub fn pub_key_hash_from_address(address: &str) -> Result<Vec<u8>> {
    let payload = base58_decode(address)?;
    if payload.len() <= 1 + ADDRESS_CHECKSUM_LEN {
        return Err(CoinError::InvalidAddress(address.to_string()));
    }
    Ok(payload[1..payload.len() - ADDRESS_CHECKSUM_LEN].to_vec())
}

/// Decodes an address, recomputes its checksum and compares.
pub fn validate_address(address: &str) -> Result<bool> {
    let payload = base58_decode(address)?;
    if payload.len() <= 1 + ADDRESS_CHECKSUM_LEN {
        return Ok(false);
    }
    let actual_checksum = &payload[payload.len() - ADDRESS_CHECKSUM_LEN..];
    let versioned_hash = &payload[..payload.len() - ADDRESS_CHECKSUM_LEN];
    let target_checksum = checksum(versioned_hash);
    Ok(actual_checksum.eq(target_checksum.as_slice()))
}
