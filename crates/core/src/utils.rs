//! Hashing helpers

use sha2::Sha256;
use sha3::{Digest, Keccak256};

/// Hex-encoded SHA-256 digest, used to fingerprint downloaded binaries
pub fn hash_bytes(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// `0x`-prefixed hex Keccak-256 digest, as solc expects in `sources.*.keccak256`
pub fn keccak256_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(Keccak256::digest(data)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty() {
        assert_eq!(
            keccak256_hex(b""),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_hash_bytes_len() {
        let hash = hash_bytes(b"test bytecode");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
