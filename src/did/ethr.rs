// src/did/ethr.rs
//! `did:ethr` resolver.
//!
//! Grammar: `did:ethr:[<network>:]<identifier>` where the network is a
//! configured name or a hex chain id, and the identifier is either a
//! 20-byte address or a 33-byte compressed secp256k1 public key.

use super::DidResolver;
use crate::contracts::did_registry::DIDRegistry;
use crate::errors::ResolverError;
use crate::models::did::{DIDDocument, Did, VerificationMethod};
use crate::settings::EthrSettings;
use crate::utils::crypto::{ethereum_address, format_address};
use async_trait::async_trait;
use ethers::providers::{Http, Provider};
use ethers::types::Address;
use ethers::utils::hex;
use k256::ecdsa::VerifyingKey;
use std::sync::Arc;

pub const RECOVERY_METHOD_2020: &str = "EcdsaSecp256k1RecoveryMethod2020";
pub const VERIFICATION_KEY_2019: &str = "EcdsaSecp256k1VerificationKey2019";

/// A configured EVM network.
struct EthrNetwork {
    name: Option<String>,
    chain_id: u64,
    /// Present when the network has an RPC endpoint
    registry: Option<DIDRegistry<Provider<Http>>>,
}

impl EthrNetwork {
    fn matches(&self, segment: &str) -> bool {
        match segment.strip_prefix("0x") {
            Some(hex_id) => u64::from_str_radix(hex_id, 16).map(|id| id == self.chain_id).unwrap_or(false),
            None => self
                .name
                .as_deref()
                .map(|name| name.eq_ignore_ascii_case(segment))
                .unwrap_or(false),
        }
    }
}

/// The identity part of an ethr DID.
#[derive(Debug, Clone, PartialEq)]
enum EthrIdentifier {
    Address(Address),
    PublicKey { address: Address, public_key_hex: String },
}

impl EthrIdentifier {
    fn parse(id: &str) -> Option<Self> {
        let bytes = hex::decode(id.strip_prefix("0x")?).ok()?;
        match bytes.len() {
            20 => Some(EthrIdentifier::Address(Address::from_slice(&bytes))),
            33 => {
                let key = VerifyingKey::from_sec1_bytes(&bytes).ok()?;
                Some(EthrIdentifier::PublicKey {
                    address: ethereum_address(&key),
                    public_key_hex: hex::encode(&bytes),
                })
            }
            _ => None,
        }
    }

    fn address(&self) -> Address {
        match self {
            EthrIdentifier::Address(address) => *address,
            EthrIdentifier::PublicKey { address, .. } => *address,
        }
    }
}

/// Resolver for `did:ethr` identities across the configured networks.
pub struct EthrResolver {
    networks: Vec<EthrNetwork>,
}

impl EthrResolver {
    pub fn from_settings(settings: &EthrSettings) -> Result<Self, ResolverError> {
        let mut networks = Vec::with_capacity(settings.networks.len());
        for network in &settings.networks {
            let registry = match &network.rpc_url {
                Some(rpc_url) => {
                    let address: Address = network.registry.parse().map_err(|_| {
                        ResolverError::ResolutionFailed(format!("invalid registry address {}", network.registry))
                    })?;
                    let provider = Provider::<Http>::try_from(rpc_url.as_str())
                        .map_err(|e| ResolverError::ResolutionFailed(format!("invalid RPC URL {}: {}", rpc_url, e)))?;
                    Some(DIDRegistry::new(Arc::new(provider), address))
                }
                None => None,
            };
            networks.push(EthrNetwork {
                name: network.name.clone(),
                chain_id: network.chain_id,
                registry,
            });
        }
        Ok(EthrResolver { networks })
    }

    /// Picks the network named by `segment`; without one, `mainnet` if
    /// configured, else the first network.
    fn network(&self, segment: Option<&str>) -> Option<&EthrNetwork> {
        match segment {
            Some(segment) => self.networks.iter().find(|n| n.matches(segment)),
            None => self
                .networks
                .iter()
                .find(|n| n.matches("mainnet"))
                .or_else(|| self.networks.first()),
        }
    }
}

#[async_trait]
impl DidResolver for EthrResolver {
    fn method(&self) -> &'static str {
        "ethr"
    }

    async fn resolve(&self, did: &Did) -> Result<DIDDocument, ResolverError> {
        let did_string = did.to_string();
        let (segment, id) = match did.method_specific_id().rsplit_once(':') {
            Some((network, id)) => (Some(network), id),
            None => (None, did.method_specific_id()),
        };
        let identifier = EthrIdentifier::parse(id).ok_or_else(|| ResolverError::InvalidDid(did_string.clone()))?;
        let network = self
            .network(segment)
            .ok_or_else(|| ResolverError::NotFound(format!("{} (unknown network)", did_string)))?;

        let owner = match &network.registry {
            Some(registry) => registry.identity_owner(identifier.address()).await?,
            None => identifier.address(),
        };

        let mut methods = vec![VerificationMethod {
            id: format!("{}#controller", did_string),
            type_: RECOVERY_METHOD_2020.to_string(),
            controller: did_string.clone(),
            blockchain_account_id: Some(format!("eip155:{}:{}", network.chain_id, format_address(&owner))),
            public_key_hex: None,
            public_key_base58: None,
        }];
        if let EthrIdentifier::PublicKey { address, public_key_hex } = &identifier {
            // a transferred identity no longer trusts its original key
            if *address == owner {
                methods.push(VerificationMethod {
                    id: format!("{}#controllerKey", did_string),
                    type_: VERIFICATION_KEY_2019.to_string(),
                    controller: did_string.clone(),
                    blockchain_account_id: None,
                    public_key_hex: Some(public_key_hex.clone()),
                    public_key_base58: None,
                });
            }
        }
        Ok(DIDDocument::new(did_string, methods))
    }
}
