// src/jwt/verification.rs
//! Signed token verification against resolved DID Documents.
//!
//! One call walks `Decode -> ResolveSigner -> CheckSignature -> CheckClaims`
//! and stops at the first rejection. Nothing read from the payload is
//! trusted before the signature step succeeds, except the signer DID used to
//! find the key.

use crate::did::ResolverRegistry;
use crate::errors::VerificationError;
use crate::jwt::signing::{decode_unverified, Algorithm, DecodedJws, Header};
use crate::models::did::{DIDDocument, Did, VerificationMethod};
use crate::utils::crypto::{ethereum_address, sha256};
use ed25519_dalek::Verifier;
use ethers::types::Address;
use ethers::utils::hex;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use serde_json::Value;
use std::sync::Arc;

/// Tolerated clock skew for `exp` and `nbf`.
pub const CLOCK_LEEWAY_SECS: i64 = 60;

/// How the `aud` claim is treated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudiencePolicy {
    /// `aud` is not looked at.
    Ignore,
    /// When `aud` is present it must contain this value.
    RequireIfPresent(String),
}

/// A token whose signature and time claims checked out.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedJwt {
    pub header: Header,
    pub payload: Value,
    /// DID whose document held the verifying key
    pub signer_did: String,
    /// Id of the verification method that matched
    pub method_id: String,
}

/// Verifies JWS tokens signed by DID controlled keys.
#[derive(Clone)]
pub struct ProofVerifier {
    resolvers: Arc<ResolverRegistry>,
}

impl ProofVerifier {
    pub fn new(resolvers: Arc<ResolverRegistry>) -> Self {
        ProofVerifier { resolvers }
    }

    pub async fn verify(&self, token: &str, audience: &AudiencePolicy) -> Result<VerifiedJwt, VerificationError> {
        self.verify_at(token, audience, chrono::Utc::now().timestamp()).await
    }

    /// [`ProofVerifier::verify`] with an explicit clock.
    pub async fn verify_at(
        &self,
        token: &str,
        audience: &AudiencePolicy,
        now: i64,
    ) -> Result<VerifiedJwt, VerificationError> {
        let decoded = decode_unverified(token)?;

        let signer_did = signer_did(&decoded)?;
        let document = self
            .resolvers
            .resolve(&signer_did)
            .await
            .map_err(|e| VerificationError::SignerUnresolvable(e.to_string()))?;
        let candidates = candidate_methods(&document, decoded.header.kid.as_deref())?;

        let method = verify_signature(&decoded, &candidates)?;

        check_time(&decoded.payload, now)?;
        check_audience(&decoded.payload, audience)?;

        Ok(VerifiedJwt {
            method_id: method.id.clone(),
            header: decoded.header,
            payload: decoded.payload,
            signer_did,
        })
    }
}

/// Signer DID: a DID `iss`, otherwise the DID part of `kid`. Both must agree
/// when both name a DID.
fn signer_did(decoded: &DecodedJws) -> Result<String, VerificationError> {
    let iss = decoded
        .payload
        .get("iss")
        .and_then(Value::as_str)
        .filter(|iss| iss.starts_with("did:"));
    let kid_did = decoded
        .header
        .kid
        .as_deref()
        .map(|kid| Did::split_url(kid).0)
        .filter(|did| did.starts_with("did:"));

    match (iss, kid_did) {
        (Some(iss), Some(kid_did)) if iss != kid_did => Err(VerificationError::SignerUnresolvable(format!(
            "kid {} does not belong to issuer {}",
            kid_did, iss
        ))),
        (Some(did), _) | (None, Some(did)) => Ok(did.to_string()),
        (None, None) => Err(VerificationError::SignerUnresolvable(
            "token names no signer DID in iss or kid".to_string(),
        )),
    }
}

/// Methods a signature may be checked against: the one named by `kid`, or
/// every method of the document.
fn candidate_methods<'a>(
    document: &'a DIDDocument,
    kid: Option<&str>,
) -> Result<Vec<&'a VerificationMethod>, VerificationError> {
    let candidates: Vec<&VerificationMethod> = match kid {
        Some(kid) => document.find_method(kid).into_iter().collect(),
        None => document.verification_method.iter().collect(),
    };
    if candidates.is_empty() {
        return Err(VerificationError::SignerUnresolvable(format!(
            "no verification method {} in {}",
            kid.unwrap_or("*"),
            document.id
        )));
    }
    Ok(candidates)
}

/// Returns the first candidate that validates the signature.
fn verify_signature<'a>(
    decoded: &DecodedJws,
    candidates: &[&'a VerificationMethod],
) -> Result<&'a VerificationMethod, VerificationError> {
    let matched = match decoded.header.alg {
        Algorithm::ES256K => {
            let signature = secp256k1_signature(&decoded.signature, 64)?;
            let digest = sha256(&decoded.signing_input);
            candidates.iter().find(|m| es256k_matches(m, &digest, &signature))
        }
        Algorithm::ES256KR => {
            let signature = secp256k1_signature(&decoded.signature, 65)?;
            let recovery_byte = decoded.signature[64];
            let recovery_id = RecoveryId::from_byte(recovery_byte.checked_sub(27).unwrap_or(recovery_byte))
                .ok_or_else(|| VerificationError::SignatureInvalid("bad recovery id".to_string()))?;
            let digest = sha256(&decoded.signing_input);
            let recovered = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
                .map_err(|e| VerificationError::SignatureInvalid(e.to_string()))?;
            candidates.iter().find(|m| secp256k1_key_matches(m, &recovered))
        }
        Algorithm::EdDSA => {
            let bytes: [u8; 64] = decoded
                .signature
                .as_slice()
                .try_into()
                .map_err(|_| VerificationError::SignatureInvalid("EdDSA signature must be 64 bytes".to_string()))?;
            let signature = ed25519_dalek::Signature::from_bytes(&bytes);
            candidates.iter().find(|m| {
                ed25519_key(m)
                    .map(|key| key.verify(&decoded.signing_input, &signature).is_ok())
                    .unwrap_or(false)
            })
        }
    };
    matched.copied().ok_or_else(|| {
        VerificationError::SignatureInvalid(format!(
            "no verification method validates the {} signature",
            decoded.header.alg
        ))
    })
}

fn secp256k1_signature(bytes: &[u8], expected_len: usize) -> Result<Signature, VerificationError> {
    if bytes.len() != expected_len {
        return Err(VerificationError::SignatureInvalid(format!(
            "expected {} signature bytes, got {}",
            expected_len,
            bytes.len()
        )));
    }
    Signature::from_slice(&bytes[..64]).map_err(|e| VerificationError::SignatureInvalid(e.to_string()))
}

/// Plain ES256K: verify against a listed key, or recover with both
/// recovery ids for address-only methods.
fn es256k_matches(method: &VerificationMethod, digest: &[u8; 32], signature: &Signature) -> bool {
    use k256::ecdsa::signature::hazmat::PrehashVerifier;

    if let Some(key) = secp256k1_public_key(method) {
        return key.verify_prehash(digest, signature).is_ok();
    }
    [0u8, 1].iter().filter_map(|b| RecoveryId::from_byte(*b)).any(|recovery_id| {
        VerifyingKey::recover_from_prehash(digest, signature, recovery_id)
            .map(|key| secp256k1_key_matches(method, &key))
            .unwrap_or(false)
    })
}

fn secp256k1_key_matches(method: &VerificationMethod, key: &VerifyingKey) -> bool {
    if let Some(listed) = secp256k1_public_key(method) {
        return listed == *key;
    }
    account_address(method)
        .map(|address| address == ethereum_address(key))
        .unwrap_or(false)
}

fn secp256k1_public_key(method: &VerificationMethod) -> Option<VerifyingKey> {
    let bytes = hex::decode(method.public_key_hex.as_deref()?.trim_start_matches("0x")).ok()?;
    VerifyingKey::from_sec1_bytes(&bytes).ok()
}

/// Address of a CAIP-10 `blockchainAccountId` (`eip155:<chain>:<address>`).
fn account_address(method: &VerificationMethod) -> Option<Address> {
    method.blockchain_account_id.as_deref()?.rsplit(':').next()?.parse().ok()
}

fn ed25519_key(method: &VerificationMethod) -> Option<ed25519_dalek::VerifyingKey> {
    let bytes = bs58::decode(method.public_key_base58.as_deref()?).into_vec().ok()?;
    let bytes: [u8; 32] = bytes.as_slice().try_into().ok()?;
    ed25519_dalek::VerifyingKey::from_bytes(&bytes).ok()
}

fn check_time(payload: &Value, now: i64) -> Result<(), VerificationError> {
    if let Some(exp) = payload.get("exp").and_then(Value::as_i64) {
        if now > exp.saturating_add(CLOCK_LEEWAY_SECS) {
            return Err(VerificationError::TokenNotActive(format!("expired at {}", exp)));
        }
    }
    if let Some(nbf) = payload.get("nbf").and_then(Value::as_i64) {
        if now.saturating_add(CLOCK_LEEWAY_SECS) < nbf {
            return Err(VerificationError::TokenNotActive(format!("not valid before {}", nbf)));
        }
    }
    Ok(())
}

fn check_audience(payload: &Value, policy: &AudiencePolicy) -> Result<(), VerificationError> {
    let expected = match policy {
        AudiencePolicy::Ignore => return Ok(()),
        AudiencePolicy::RequireIfPresent(expected) => expected,
    };
    let same = |aud: &str| aud.trim_end_matches('/') == expected.trim_end_matches('/');
    let accepted = match payload.get("aud") {
        None | Some(Value::Null) => true,
        Some(Value::String(aud)) => same(aud),
        Some(Value::Array(auds)) => auds.iter().filter_map(Value::as_str).any(same),
        Some(_) => false,
    };
    if accepted {
        Ok(())
    } else {
        Err(VerificationError::AudienceMismatch {
            expected: expected.clone(),
        })
    }
}
