// src/did/mod.rs
//! DID resolution.
//!
//! Each DID method is a [`DidResolver`]; the [`ResolverRegistry`] dispatches
//! on the method segment. Resolvers hold only shared, read-only network
//! handles and never retry internally.

pub mod ethr;
pub mod near;

use crate::errors::ResolverError;
use crate::models::did::{DIDDocument, Did};
use crate::settings::Settings;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves DIDs of one method.
#[async_trait]
pub trait DidResolver: Send + Sync {
    /// Method segment handled, e.g. `ethr`.
    fn method(&self) -> &'static str;

    async fn resolve(&self, did: &Did) -> Result<DIDDocument, ResolverError>;
}

/// Method keyed set of resolvers.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    resolvers: HashMap<&'static str, Arc<dyn DidResolver>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the `ethr` and `near` resolvers from configuration.
    pub fn from_settings(settings: &Settings) -> Result<Self, ResolverError> {
        let mut registry = Self::new();
        registry.register(Arc::new(ethr::EthrResolver::from_settings(&settings.ethr)?));
        registry.register(Arc::new(near::NearResolver::new(&settings.near.rpc_url)));
        Ok(registry)
    }

    /// Adds a resolver, replacing any previous one for the same method.
    pub fn register(&mut self, resolver: Arc<dyn DidResolver>) {
        self.resolvers.insert(resolver.method(), resolver);
    }

    /// Resolves a DID (fragments are ignored).
    pub async fn resolve(&self, did: &str) -> Result<DIDDocument, ResolverError> {
        let (did, _) = Did::split_url(did);
        let parsed: Did = did.parse()?;
        let resolver = self
            .resolvers
            .get(parsed.method())
            .ok_or_else(|| ResolverError::UnsupportedMethod(parsed.method().to_string()))?;
        resolver.resolve(&parsed).await
    }
}
