// src/utils/serialization.rs
//! Serialization utilities for the DID system.
//!
//! JSON and base64url (unpadded) helpers for compact JWS segments.

use serde::{de::DeserializeOwned, Serialize};

/// Serializes a value to a JSON string.
pub fn serialize<T: Serialize>(data: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(data)
}

/// Encodes bytes as unpadded base64url.
pub fn base64url_encode<T: AsRef<[u8]>>(data: T) -> String {
    base64::encode_config(data, base64::URL_SAFE_NO_PAD)
}

/// Decodes an unpadded base64url segment.
pub fn base64url_decode(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::decode_config(data, base64::URL_SAFE_NO_PAD)
}

/// Serializes a value to JSON and encodes it as a base64url segment.
pub fn encode_json_segment<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(base64url_encode(serialize(value)?))
}

/// Decodes a base64url segment and parses the JSON it carries.
pub fn decode_json_segment<T: DeserializeOwned>(segment: &str) -> Result<T, String> {
    let bytes = base64url_decode(segment).map_err(|e| format!("Base64 decoding failed: {}", e))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("Deserialization failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_segment_has_no_padding() {
        let segment = encode_json_segment(&json!({"alg": "EdDSA"})).unwrap();
        assert!(!segment.contains('='));
        let value: serde_json::Value = decode_json_segment(&segment).unwrap();
        assert_eq!(value["alg"], "EdDSA");
    }

    #[test]
    fn test_decode_json_segment_reports_bad_base64() {
        let err = decode_json_segment::<serde_json::Value>("***").unwrap_err();
        assert!(err.starts_with("Base64 decoding failed"));
    }
}
