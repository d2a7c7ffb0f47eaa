pub mod address;
pub mod hash;
pub mod keypair;

pub use address::{
    ADDRESS_CHECKSUM_LEN, address_from_pub_key_hash, base58_decode, base58_encode, hash_pub_key,
    pub_key_hash_from_address, validate_address,
};
pub use hash::{double_sha256_digest, ripemd160_digest, sha256_digest};
pub use keypair::{ecdsa_sign_digest, ecdsa_verify_digest, new_key_pair, raw_public_key};
