// src/utils/crypto.rs
//! Hashing utilities shared by the signing, verification and anchoring layers.
//!
//! - Keccak-256 for Ethereum address derivation (via `ethers`)
//! - SHA-256 for JWS signing inputs and content fingerprints (via `ring`)

use ethers::types::Address;
use ethers::utils::{hex, keccak256};
use k256::ecdsa::VerifyingKey;
use ring::digest::{digest, SHA256};

/// Computes a Keccak-256 hash of the input data (Ethereum-compatible).
///
/// # Arguments
/// * `data` - Binary data to hash (as bytes slice)
///
/// # Returns
/// Fixed-size 32-byte array (`[u8; 32]`) containing the hash.
pub fn hash_data(data: &[u8]) -> [u8; 32] {
    keccak256(data)
}

/// Computes the SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(digest(&SHA256, data).as_ref());
    out
}

/// Lowercase hex SHA-256 fingerprint of `data`.
///
/// This is the content hash written to the ledger and the `vpHash` stored for
/// verified presentations.
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Derives the Ethereum address controlled by a secp256k1 public key.
///
/// The address is the last 20 bytes of the Keccak-256 hash of the
/// uncompressed point without its `0x04` prefix.
pub fn ethereum_address(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = hash_data(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Formats an address as a lowercase hex string with 0x prefix.
pub fn format_address(addr: &Address) -> String {
    format!("0x{}", hex::encode(addr.as_bytes()))
}

/// Returns true if `value` is a 64 character lowercase hex string.
pub fn is_content_hash(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    #[test]
    fn test_content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert!(is_content_hash(&content_hash(b"anything")));
    }

    #[test]
    fn test_is_content_hash_rejects_uppercase_and_short() {
        assert!(!is_content_hash("ABCDEF"));
        assert!(!is_content_hash(&"A".repeat(64)));
        assert!(!is_content_hash(&"a".repeat(63)));
    }

    #[test]
    fn test_ethereum_address_matches_known_vector() {
        // Private key 0x01 controls 0x7e5f4552091a69125d5dfcb7b8c2659029395bdf
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let key = SigningKey::from_slice(&secret).unwrap();
        let addr = ethereum_address(key.verifying_key());
        assert_eq!(format_address(&addr), "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf");
    }
}
