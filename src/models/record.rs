// src/models/record.rs
//! Durable records: verified presentations, mirrored ledger transactions and
//! on-ledger registry entries.

use crate::utils::crypto::is_content_hash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A successfully verified presentation.
///
/// `email` is kept for internal use only; anything leaving the process goes
/// through [`SanitizedVerifiedRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub did: String,
    pub vp_hash: String,
    pub verified: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Public view of a [`VerifiedRecord`]. Has no email field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedVerifiedRecord {
    pub id: String,
    pub name: String,
    pub did: String,
    pub vp_hash: String,
    pub verified: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<VerifiedRecord> for SanitizedVerifiedRecord {
    fn from(record: VerifiedRecord) -> Self {
        let VerifiedRecord {
            id,
            name,
            email: _,
            did,
            vp_hash,
            verified,
            created_at,
            updated_at,
        } = record;
        SanitizedVerifiedRecord {
            id,
            name,
            did,
            vp_hash,
            verified,
            created_at,
            updated_at,
        }
    }
}

/// Input for creating a [`VerifiedRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewVerifiedRecord {
    pub name: String,
    pub email: String,
    pub did: String,
    pub vp_hash: String,
    pub verified: bool,
}

/// Outcome of a ledger submission as observed at submission time.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Success,
    Failure,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Failure => "FAILURE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SUCCESS" => Some(TransactionStatus::Success),
            "FAILURE" => Some(TransactionStatus::Failure),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mirror of an on-chain submission. Append-only.
///
/// `id` is assigned by the mirror store on insert and is `0` before that.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    #[serde(default)]
    pub id: i64,
    pub transaction_hash: String,
    pub block_hash: String,
    pub did1: String,
    pub did2: String,
    pub data_hash: String,
    pub record_id: String,
    pub contract_id: String,
    pub method_name: String,
    pub status: TransactionStatus,
    pub gas_burnt: u64,
    #[serde(default)]
    pub logs: Vec<String>,
    pub explorer_link: String,
    pub near_blocks_link: String,
    pub created_at: String,
    pub blockchain_timestamp: String,
}

/// AND-combined equality filters for mirror lookups. Absent fields match all.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TransactionCriteria {
    #[serde(default)]
    pub record_id: Option<String>,
    #[serde(default)]
    pub did1: Option<String>,
    #[serde(default)]
    pub did2: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

/// One on-ledger registry entry: `"<did1>-<hash>-<did2>"`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub did1: String,
    pub hash: String,
    pub did2: String,
}

impl RegistryEntry {
    pub fn new(did1: impl Into<String>, hash: impl Into<String>, did2: impl Into<String>) -> Self {
        RegistryEntry {
            did1: did1.into(),
            hash: hash.into(),
            did2: did2.into(),
        }
    }

    /// The exact string appended on-chain.
    pub fn encode(&self) -> String {
        format!("{}-{}-{}", self.did1, self.hash, self.did2)
    }

    /// Parses an on-chain entry.
    ///
    /// DIDs may themselves contain `-`, so the hash is located as the first
    /// `-<64 hex>-` segment rather than by splitting.
    pub fn parse(entry: &str) -> Option<Self> {
        let bytes = entry.as_bytes();
        for (start, _) in entry.match_indices('-') {
            let hash_start = start + 1;
            let hash_end = hash_start + 64;
            if hash_end >= bytes.len() || bytes[hash_end] != b'-' {
                continue;
            }
            let hash = &entry[hash_start..hash_end];
            if !is_content_hash(hash) {
                continue;
            }
            let did1 = &entry[..start];
            let did2 = &entry[hash_end + 1..];
            if did1.is_empty() || did2.is_empty() {
                continue;
            }
            return Some(RegistryEntry::new(did1, hash, did2));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitized_record_drops_email() {
        let record = VerifiedRecord {
            id: "1".into(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            did: "did:ethr:0xabc".into(),
            vp_hash: "ff".into(),
            verified: true,
            created_at: "t".into(),
            updated_at: "t".into(),
        };
        let json = serde_json::to_value(SanitizedVerifiedRecord::from(record)).unwrap();
        assert!(json.get("email").is_none());
        assert_eq!(json["vpHash"], "ff");
    }

    #[test]
    fn test_registry_entry_roundtrip_with_hyphenated_dids() {
        let hash = "a".repeat(64);
        let entry = RegistryEntry::new("did:near:seller-one.testnet", hash.clone(), "did:near:buyer-two.testnet");
        let encoded = entry.encode();
        assert_eq!(
            encoded,
            format!("did:near:seller-one.testnet-{}-did:near:buyer-two.testnet", hash)
        );
        assert_eq!(RegistryEntry::parse(&encoded), Some(entry));
    }

    #[test]
    fn test_registry_entry_parse_rejects_free_text() {
        assert_eq!(RegistryEntry::parse("did:a-nothash-did:b"), None);
        assert_eq!(RegistryEntry::parse(""), None);
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_value(TransactionStatus::Success).unwrap(), "SUCCESS");
        assert_eq!(TransactionStatus::parse("FAILURE"), Some(TransactionStatus::Failure));
        assert_eq!(TransactionStatus::parse("pending"), None);
    }
}
