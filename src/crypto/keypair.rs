//! ECDSA P-256 key handling.
//!
//! Private keys are PKCS#8 documents produced by `ring`. Public keys travel
//! through the system as the raw `X ‖ Y` concatenation with both coordinates
//! at the full 32-byte field width, so signing preimages and derived
//! addresses never drift with leading-zero coordinates.

use crate::error::{CoinError, Result};
use ring::rand::SystemRandom;
use ring::signature::{
    ECDSA_P256_SHA256_FIXED, ECDSA_P256_SHA256_FIXED_SIGNING, EcdsaKeyPair, KeyPair,
    UnparsedPublicKey,
};

/// Byte length of one P-256 field element.
const FIELD_LEN: usize = 32;

/// Generates a fresh ECDSA P-256 key pair, returned as a PKCS#8 document.
pub fn new_key_pair() -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
        .map_err(|e| CoinError::KeyPair(e.to_string()))?;
    Ok(pkcs8.as_ref().to_vec())
}

/// Extracts the public key from a PKCS#8 document as `X ‖ Y` (64 bytes).
///
/// ring exposes the key as an uncompressed SEC1 point (`0x04 ‖ X ‖ Y`); the
/// marker byte is stripped here and restored on verification.
pub fn raw_public_key(pkcs8: &[u8]) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
        .map_err(|e| CoinError::KeyPair(e.to_string()))?;
    let point = key_pair.public_key().as_ref();
    if point.len() != 1 + 2 * FIELD_LEN || point[0] != 0x04 {
        return Err(CoinError::KeyPair(
            "unexpected public key encoding".to_string(),
        ));
    }
    Ok(point[1..].to_vec())
}

/// Signs `message` with the key in `pkcs8`.
///
/// The fixed encoding yields `r ‖ s` with both halves padded to 32 bytes.
pub fn ecdsa_sign_digest(pkcs8: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
        .map_err(|e| CoinError::Signature(e.to_string()))?;
    key_pair
        .sign(&rng, message)
        .map(|signature| signature.as_ref().to_vec())
        .map_err(|e| CoinError::Signature(e.to_string()))
}

/// Verifies an `r ‖ s` signature over `message` under a raw `X ‖ Y` public
/// key. Any malformed input simply fails verification.
pub fn ecdsa_verify_digest(public_key: &[u8], signature: &[u8], message: &[u8]) -> bool {
    if public_key.len() != 2 * FIELD_LEN {
        return false;
    }
    let mut point = Vec::with_capacity(1 + 2 * FIELD_LEN);
    point.push(0x04);
    point.extend_from_slice(public_key);
    UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, point)
        .verify(message, signature)
        .is_ok()
}
