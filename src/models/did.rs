// src/models/did.rs
//! Decentralized Identifier (DID) data model implementation.
//!
//! Defines the parsed DID type and the W3C-shaped DID Document produced by the
//! resolvers in [`crate::did`], following the
//! [DID Core Specification](https://www.w3.org/TR/did-core/).

use crate::errors::ResolverError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A parsed `did:<method>:<method-specific-id>` identifier.
///
/// Immutable once issued. The method segment is lowercase alphanumeric;
/// the method-specific id is everything after the second colon.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Did {
    method: String,
    method_specific_id: String,
}

impl Did {
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn method_specific_id(&self) -> &str {
        &self.method_specific_id
    }

    /// Splits a DID URL (`did:ethr:0xabc#controller`) into its DID and
    /// optional fragment.
    pub fn split_url(did_url: &str) -> (&str, Option<&str>) {
        match did_url.split_once('#') {
            Some((did, fragment)) => (did, Some(fragment)),
            None => (did_url, None),
        }
    }
}

impl FromStr for Did {
    type Err = ResolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("did:")
            .ok_or_else(|| ResolverError::InvalidDid(s.to_string()))?;
        let (method, msi) = rest
            .split_once(':')
            .ok_or_else(|| ResolverError::InvalidDid(s.to_string()))?;
        let method_ok = !method.is_empty()
            && method.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
        if !method_ok || msi.is_empty() || msi.contains(['#', '?', '/']) {
            return Err(ResolverError::InvalidDid(s.to_string()));
        }
        Ok(Did {
            method: method.to_string(),
            method_specific_id: msi.to_string(),
        })
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "did:{}:{}", self.method, self.method_specific_id)
    }
}

/// A verification method entry of a DID Document.
///
/// Exactly which key field is populated depends on `type_`:
/// - `EcdsaSecp256k1RecoveryMethod2020`: `blockchain_account_id`
/// - `EcdsaSecp256k1VerificationKey2019`: `public_key_hex`
/// - `Ed25519VerificationKey2018`: `public_key_base58`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub controller: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockchain_account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_hex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_base58: Option<String>,
}

/// A service endpoint entry of a DID Document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpoint {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub service_endpoint: String,
}

/// A resolved DID Document.
///
/// Produced by a resolver, consumed by the proof verifier, never mutated.
/// Resolution can change over time (key rotation), so documents are not
/// cached beyond a single verification call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DIDDocument {
    #[serde(rename = "@context")]
    pub context: Vec<String>,

    /// The complete DID string identifier
    pub id: String,

    #[serde(default)]
    pub verification_method: Vec<VerificationMethod>,

    /// Ids of methods usable for authentication (proofs of possession)
    #[serde(default)]
    pub authentication: Vec<String>,

    /// Ids of methods usable for issuing assertions (credentials)
    #[serde(default)]
    pub assertion_method: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service: Vec<ServiceEndpoint>,
}

pub const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";

impl DIDDocument {
    /// Creates a document whose methods are all usable for authentication and
    /// assertions.
    pub fn new(id: impl Into<String>, methods: Vec<VerificationMethod>) -> Self {
        let ids: Vec<String> = methods.iter().map(|m| m.id.clone()).collect();
        DIDDocument {
            context: vec![DID_CONTEXT.to_string()],
            id: id.into(),
            verification_method: methods,
            authentication: ids.clone(),
            assertion_method: ids,
            service: Vec::new(),
        }
    }

    /// Looks up a verification method by full id or by fragment.
    pub fn find_method(&self, key_id: &str) -> Option<&VerificationMethod> {
        let (_, fragment) = Did::split_url(key_id);
        self.verification_method.iter().find(|m| {
            m.id == key_id
                || fragment
                    .map(|f| Did::split_url(&m.id).1 == Some(f))
                    .unwrap_or(false)
        })
    }
}
