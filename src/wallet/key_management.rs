// src/wallet/key_management.rs
//! Cryptographic key management for issuer and holder identities.
//!
//! One 32-byte secret backs two keys:
//! - secp256k1 (via `k256`) for `did:ethr` identities and `ES256K`/`ES256K-R`
//! - ed25519 (via `ed25519-dalek`) for `did:near` identities and `EdDSA`

use crate::errors::SigningError;
use crate::jwt::signing::Algorithm;
use crate::utils::crypto::{ethereum_address, format_address, sha256};
use ed25519_dalek::Signer;
use ethers::types::Address;
use ethers::utils::hex;
use k256::ecdsa::SigningKey;

/// Key material for one identity.
///
/// # Security Notes
/// - Secret keys are never exposed publicly
/// - ECDSA signatures are deterministic (RFC 6979)
#[derive(Clone, Debug)]
pub struct KeyManager {
    /// secp256k1 signing key
    secp256k1: SigningKey,
    /// ed25519 signing key derived from the same secret bytes
    ed25519: ed25519_dalek::SigningKey,
}

impl KeyManager {
    /// Generates a KeyManager with a fresh random secret.
    pub fn new() -> Self {
        loop {
            let secret: [u8; 32] = rand::random();
            if let Ok(manager) = Self::from_secret(&secret) {
                return manager;
            }
        }
    }

    /// Builds a KeyManager from a raw 32-byte secret.
    pub fn from_secret(secret: &[u8; 32]) -> Result<Self, SigningError> {
        let secp256k1 =
            SigningKey::from_slice(secret).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        let ed25519 = ed25519_dalek::SigningKey::from_bytes(secret);
        Ok(KeyManager { secp256k1, ed25519 })
    }

    /// Parses a hex private key (with or without 0x prefix).
    pub fn from_hex(private_key: &str) -> Result<Self, SigningError> {
        let bytes = hex::decode(private_key.trim().trim_start_matches("0x"))
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        let secret: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| SigningError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len())))?;
        Self::from_secret(&secret)
    }

    /// Ethereum address of the secp256k1 key.
    pub fn address(&self) -> Address {
        ethereum_address(self.secp256k1.verifying_key())
    }

    /// `did:ethr:<chain id hex>:<address>`
    pub fn ethr_did(&self, chain_id: u64) -> String {
        format!("did:ethr:0x{:x}:{}", chain_id, format_address(&self.address()))
    }

    /// Compressed secp256k1 public key as hex.
    pub fn secp256k1_public_key_hex(&self) -> String {
        hex::encode(self.secp256k1.verifying_key().to_encoded_point(true).as_bytes())
    }

    /// Base58 ed25519 public key.
    pub fn ed25519_public_key_base58(&self) -> String {
        bs58::encode(self.ed25519.verifying_key().as_bytes()).into_string()
    }

    /// `did:near:<base58 ed25519 public key>`
    pub fn near_did(&self) -> String {
        format!("did:near:{}", self.ed25519_public_key_base58())
    }

    /// Signs a JWS signing input with the requested algorithm.
    ///
    /// # Returns
    /// - `ES256K`: 64-byte compact signature (r || s)
    /// - `ES256K-R`: 65 bytes, compact signature followed by the recovery id
    /// - `EdDSA`: 64-byte ed25519 signature
    pub fn sign(&self, algorithm: Algorithm, signing_input: &[u8]) -> Result<Vec<u8>, SigningError> {
        match algorithm {
            Algorithm::ES256K | Algorithm::ES256KR => {
                let digest = sha256(signing_input);
                let (signature, recovery_id) = self
                    .secp256k1
                    .sign_prehash_recoverable(&digest)
                    .map_err(|e| SigningError::Failed(e.to_string()))?;
                let mut bytes = signature.to_bytes().to_vec();
                if algorithm == Algorithm::ES256KR {
                    bytes.push(recovery_id.to_byte());
                }
                Ok(bytes)
            }
            Algorithm::EdDSA => Ok(self.ed25519.sign(signing_input).to_bytes().to_vec()),
        }
    }
}

impl Default for KeyManager {
    fn default() -> Self {
        Self::new()
    }
}
