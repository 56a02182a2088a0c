// src/did/near.rs
//! `did:near` resolver.
//!
//! - `did:near:<base58 ed25519 key>` resolves locally to that key
//! - `did:near:<64 hex chars>` (implicit account) resolves locally to the
//!   key the account id encodes
//! - `did:near:<account id>` lists the account's full-access ed25519 keys
//!   through the NEAR JSON-RPC `view_access_key_list` query

use super::DidResolver;
use crate::errors::ResolverError;
use crate::models::did::{DIDDocument, Did, VerificationMethod};
use async_trait::async_trait;
use ethers::utils::hex;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

pub const ED25519_KEY_2018: &str = "Ed25519VerificationKey2018";

#[derive(Deserialize, Debug)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Deserialize, Debug)]
struct RpcError {
    #[serde(default)]
    cause: Option<RpcErrorCause>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RpcErrorCause {
    name: String,
}

#[derive(Deserialize, Debug)]
struct AccessKeyList {
    keys: Vec<AccessKeyInfo>,
}

#[derive(Deserialize, Debug)]
struct AccessKeyInfo {
    public_key: String,
    access_key: AccessKey,
}

#[derive(Deserialize, Debug)]
struct AccessKey {
    permission: Value,
}

/// Resolver for NEAR accounts and keys.
pub struct NearResolver {
    client: Client,
    rpc_url: String,
}

impl NearResolver {
    pub fn new(rpc_url: &str) -> Self {
        NearResolver {
            client: Client::new(),
            rpc_url: rpc_url.to_string(),
        }
    }

    /// Base58 ed25519 keys of `account_id` with full access.
    async fn full_access_keys(&self, account_id: &str) -> Result<Vec<String>, ResolverError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": "did-anchor",
            "method": "query",
            "params": {
                "request_type": "view_access_key_list",
                "finality": "final",
                "account_id": account_id,
            }
        });
        debug!("near rpc: view_access_key_list for {}", account_id);
        let response: RpcResponse = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ResolverError::ResolutionFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| ResolverError::ResolutionFailed(format!("invalid RPC response: {}", e)))?;

        if let Some(error) = response.error {
            return match error.cause {
                Some(cause) if cause.name == "UNKNOWN_ACCOUNT" => Err(ResolverError::NotFound(account_id.to_string())),
                Some(cause) => Err(ResolverError::ResolutionFailed(cause.name)),
                None => Err(ResolverError::ResolutionFailed(
                    error.message.unwrap_or_else(|| "unknown RPC error".to_string()),
                )),
            };
        }
        let result = response
            .result
            .ok_or_else(|| ResolverError::ResolutionFailed("RPC response without result".to_string()))?;
        let list: AccessKeyList = serde_json::from_value(result)
            .map_err(|e| ResolverError::ResolutionFailed(format!("unexpected access key list: {}", e)))?;

        Ok(list
            .keys
            .into_iter()
            .filter(|k| k.access_key.permission == Value::String("FullAccess".to_string()))
            .filter_map(|k| k.public_key.strip_prefix("ed25519:").map(str::to_string))
            .collect())
    }
}

/// Decodes a base58 string holding exactly 32 bytes.
fn base58_key(value: &str) -> Option<String> {
    match bs58::decode(value).into_vec() {
        Ok(bytes) if bytes.len() == 32 => Some(value.to_string()),
        _ => None,
    }
}

/// Implicit accounts are the hex encoding of their ed25519 key.
fn implicit_account_key(account_id: &str) -> Option<String> {
    if account_id.len() != 64 || !account_id.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
        return None;
    }
    hex::decode(account_id).ok().map(|bytes| bs58::encode(bytes).into_string())
}

/// NEAR account id rules: 2 to 64 chars of `a-z 0-9 _ - .`, no leading or
/// trailing separator.
fn is_account_id(value: &str) -> bool {
    let valid_chars = value
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'_' | b'-' | b'.'));
    let edges_ok = !value.starts_with(['_', '-', '.']) && !value.ends_with(['_', '-', '.']);
    (2..=64).contains(&value.len()) && valid_chars && edges_ok
}

fn key_method(did: &str, fragment: &str, key: String) -> VerificationMethod {
    VerificationMethod {
        id: format!("{}#{}", did, fragment),
        type_: ED25519_KEY_2018.to_string(),
        controller: did.to_string(),
        blockchain_account_id: None,
        public_key_hex: None,
        public_key_base58: Some(key),
    }
}

#[async_trait]
impl DidResolver for NearResolver {
    fn method(&self) -> &'static str {
        "near"
    }

    async fn resolve(&self, did: &Did) -> Result<DIDDocument, ResolverError> {
        let did_string = did.to_string();
        let id = did.method_specific_id();

        let local_key = if id.contains('.') { None } else { base58_key(id) }.or_else(|| implicit_account_key(id));
        if let Some(key) = local_key {
            return Ok(DIDDocument::new(did_string.clone(), vec![key_method(&did_string, "owner", key)]));
        }
        if !is_account_id(id) {
            return Err(ResolverError::InvalidDid(did_string));
        }

        let keys = self.full_access_keys(id).await?;
        if keys.is_empty() {
            return Err(ResolverError::NotFound(format!("{} has no full access ed25519 keys", did_string)));
        }
        let methods = keys
            .into_iter()
            .enumerate()
            .map(|(i, key)| {
                let fragment = if i == 0 { "owner".to_string() } else { format!("key-{}", i) };
                key_method(&did_string, &fragment, key)
            })
            .collect();
        Ok(DIDDocument::new(did_string, methods))
    }
}
