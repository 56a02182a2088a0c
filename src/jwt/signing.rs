// src/jwt/signing.rs
//! Compact JWS encoding and decoding.
//!
//! Tokens are `base64url(header).base64url(payload).base64url(signature)`.
//! Supported algorithms:
//! - `ES256K`: secp256k1 over SHA-256, 64-byte signature
//! - `ES256K-R`: as `ES256K` plus a trailing recovery id byte
//! - `EdDSA`: ed25519

use crate::errors::{SigningError, VerificationError};
use crate::utils::serialization::{base64url_decode, base64url_encode, decode_json_segment, encode_json_segment};
use crate::wallet::key_management::KeyManager;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// JWS signature algorithm.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    #[serde(rename = "ES256K")]
    ES256K,
    #[serde(rename = "ES256K-R")]
    ES256KR,
    #[serde(rename = "EdDSA")]
    EdDSA,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Algorithm::ES256K => "ES256K",
            Algorithm::ES256KR => "ES256K-R",
            Algorithm::EdDSA => "EdDSA",
        };
        f.write_str(name)
    }
}

/// JOSE header.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub alg: Algorithm,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// DID URL of the signing key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl Header {
    pub fn jwt(alg: Algorithm, kid: Option<String>) -> Self {
        Header {
            alg,
            typ: Some("JWT".to_string()),
            kid,
        }
    }
}

/// A split, decoded but unverified token.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedJws {
    pub header: Header,
    pub payload: Value,
    pub signing_input: Vec<u8>,
    pub signature: Vec<u8>,
}

impl DecodedJws {
    /// Deserializes the payload into a typed claim set.
    pub fn claims<T: DeserializeOwned>(&self) -> Result<T, VerificationError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| VerificationError::MalformedToken(e.to_string()))
    }
}

/// Splits a compact JWS into its three segments.
pub fn split_jws(jws: &str) -> Result<(&str, &str, &str), VerificationError> {
    let mut parts = jws.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) if !h.is_empty() && !p.is_empty() && !s.is_empty() => Ok((h, p, s)),
        _ => Err(VerificationError::MalformedToken(
            "expected three non-empty dot separated segments".to_string(),
        )),
    }
}

/// Decodes a compact JWS without checking its signature.
///
/// The payload must be a JSON object.
pub fn decode_unverified(jws: &str) -> Result<DecodedJws, VerificationError> {
    let (header_b64, payload_b64, signature_b64) = split_jws(jws)?;
    let header: Header = decode_json_segment(header_b64)
        .map_err(|e| VerificationError::MalformedToken(format!("header: {}", e)))?;
    let payload: Value = decode_json_segment(payload_b64)
        .map_err(|e| VerificationError::MalformedToken(format!("payload: {}", e)))?;
    if !payload.is_object() {
        return Err(VerificationError::MalformedToken("payload is not a JSON object".to_string()));
    }
    let signature = base64url_decode(signature_b64)
        .map_err(|e| VerificationError::MalformedToken(format!("signature: {}", e)))?;
    Ok(DecodedJws {
        header,
        payload,
        signing_input: format!("{}.{}", header_b64, payload_b64).into_bytes(),
        signature,
    })
}

/// Serializes `claims` and signs them as a compact JWT.
pub fn encode_signed<T: Serialize>(
    claims: &T,
    keys: &KeyManager,
    alg: Algorithm,
    kid: Option<String>,
) -> Result<String, SigningError> {
    let header = Header::jwt(alg, kid);
    let header_b64 = encode_json_segment(&header).map_err(|e| SigningError::Failed(e.to_string()))?;
    let payload_b64 = encode_json_segment(claims).map_err(|e| SigningError::Failed(e.to_string()))?;
    let signing_input = format!("{}.{}", header_b64, payload_b64);
    let signature = keys.sign(alg, signing_input.as_bytes())?;
    Ok(format!("{}.{}", signing_input, base64url_encode(signature)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_then_decode_keeps_header_and_claims() {
        let keys = KeyManager::new();
        let token = encode_signed(
            &json!({"iss": "did:ethr:0x1", "n": 1}),
            &keys,
            Algorithm::ES256KR,
            Some("did:ethr:0x1#controller".into()),
        )
        .unwrap();
        let decoded = decode_unverified(&token).unwrap();
        assert_eq!(decoded.header.alg, Algorithm::ES256KR);
        assert_eq!(decoded.header.typ.as_deref(), Some("JWT"));
        assert_eq!(decoded.header.kid.as_deref(), Some("did:ethr:0x1#controller"));
        assert_eq!(decoded.payload["n"], 1);
        assert_eq!(decoded.signature.len(), 65);
    }

    #[test]
    fn test_header_algorithm_names() {
        let header = serde_json::to_value(Header::jwt(Algorithm::ES256KR, None)).unwrap();
        assert_eq!(header, json!({"alg": "ES256K-R", "typ": "JWT"}));
    }

    #[test]
    fn test_malformed_tokens() {
        for bad in ["", "a.b", "a.b.c.d", "..", "abc.def.ghi"] {
            assert!(
                matches!(decode_unverified(bad), Err(VerificationError::MalformedToken(_))),
                "{:?} should be malformed",
                bad
            );
        }
    }

    #[test]
    fn test_non_object_payload_rejected() {
        let header = encode_json_segment(&json!({"alg": "EdDSA"})).unwrap();
        let payload = encode_json_segment(&json!([1, 2])).unwrap();
        let token = format!("{}.{}.c2ln", header, payload);
        assert!(matches!(decode_unverified(&token), Err(VerificationError::MalformedToken(_))));
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        let header = encode_json_segment(&json!({"alg": "HS256"})).unwrap();
        let payload = encode_json_segment(&json!({})).unwrap();
        let token = format!("{}.{}.c2ln", header, payload);
        assert!(matches!(decode_unverified(&token), Err(VerificationError::MalformedToken(_))));
    }
}
