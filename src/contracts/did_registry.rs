// src/contracts/did_registry.rs
//! EVM DID Registry (ERC-1056) smart contract interface.
//!
//! Only the owner lookup is needed to resolve `did:ethr` identities: an
//! identity controls itself until ownership is transferred on the registry.

use crate::errors::ResolverError;
use ethers::prelude::abigen;
use ethers::providers::Middleware;
use ethers::types::Address;
use std::sync::Arc;

abigen!(
    EthereumDIDRegistry,
    r#"[
        function identityOwner(address identity) external view returns (address)
    ]"#
);

/// DID Registry smart contract interface.
///
/// # Type Parameters
/// * `M` - ethers middleware used for read-only calls
pub struct DIDRegistry<M> {
    /// Underlying contract instance
    contract: EthereumDIDRegistry<M>,
}

impl<M> DIDRegistry<M>
where
    M: Middleware + 'static,
{
    /// Creates a new DIDRegistry instance.
    ///
    /// # Arguments
    /// * `client` - Shared provider or middleware
    /// * `contract_address` - Address of the deployed registry
    pub fn new(client: Arc<M>, contract_address: Address) -> Self {
        DIDRegistry {
            contract: EthereumDIDRegistry::new(contract_address, client),
        }
    }

    /// Address currently controlling `identity`.
    ///
    /// # Errors
    /// `ResolutionFailed` if the RPC call fails or reverts.
    pub async fn identity_owner(&self, identity: Address) -> Result<Address, ResolverError> {
        self.contract
            .identity_owner(identity)
            .call()
            .await
            .map_err(|e| ResolverError::ResolutionFailed(format!("identityOwner call failed: {}", e)))
    }
}
