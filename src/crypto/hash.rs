use ring::digest::{Context, SHA256};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// SHA-256 of `data`. Used for transaction ids, merkle nodes and the
/// proof-of-work predicate.
pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    context.finish().as_ref().to_vec()
}

/// SHA-256 applied twice. Address checksums take the first four bytes of
/// this digest.
pub fn double_sha256_digest(data: &[u8]) -> Vec<u8> {
    sha256_digest(sha256_digest(data).as_slice())
}

/// RIPEMD-160 over SHA-256 of `data`, the 20-byte pubkey hash that locks an
/// output to an address.
pub fn ripemd160_digest(data: &[u8]) -> Vec<u8> {
    let sha = Sha256::digest(data);
    let mut hasher = Ripemd160::new();
    hasher.update(sha);
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_value() {
        let digest = sha256_digest(b"abc");
        let expected =
            hex::decode("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
                .expect("valid hex");
        assert_eq!(digest, expected);
    }

    #[test]
    fn double_sha256_is_sha256_of_sha256() {
        let data = b"checksum input";
        assert_eq!(
            double_sha256_digest(data),
            sha256_digest(&sha256_digest(data))
        );
    }

    #[test]
    fn ripemd160_of_sha256_is_20_bytes() {
        let digest = ripemd160_digest(b"abc");
        assert_eq!(digest.len(), 20);
        // RIPEMD160(SHA256("abc")), the standard hash160 construction.
        let expected =
            hex::decode("bb1be98c142444d7a56aa3981c3942a978e4dc33").expect("valid hex");
        assert_eq!(digest, expected);
    }

    #[test]
    fn digests_are_deterministic() {
        let data = b"determinism";
        assert_eq!(sha256_digest(data), sha256_digest(data));
        assert_eq!(ripemd160_digest(data), ripemd160_digest(data));
    }
}
