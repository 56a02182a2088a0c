// src/main.rs

//! # DID Anchor - Main Entry Point
//!
//! Issues verifiable credentials, verifies presentations of them and anchors
//! verified interactions on an EVM ledger, mirrored into SQLite.
//!
//! ## Architecture Overview
//! 1. **DID Layer**: `did:ethr` and `did:near` resolvers behind one registry
//! 2. **JWT Layer**: JWS signing and DID-based signature verification
//! 3. **Services Layer**: Credential issuance, presentation verification and the HTTP API
//! 4. **Blockchain Layer**: Anchoring client over the registry contract
//! 5. **Storage Layer**: SQLite mirror of transactions and verified presentations
//!
//! ## Configuration
//! `config/default.toml` (or the file named by `ANCHOR_CONFIG`) and
//! `ANCHOR_*` environment variables, e.g. `ANCHOR_ISSUER__PRIVATE_KEY`,
//! `ANCHOR_AUTH__JWT_SECRET`, `ANCHOR_LEDGER__RPC_URL`.

use crate::blockchain::anchoring::AnchoringClient;
use crate::blockchain::evm_client::EvmLedger;
use crate::did::ResolverRegistry;
use crate::jwt::verification::ProofVerifier;
use crate::services::api_server::ApiServer;
use crate::services::auth::BearerAuth;
use crate::services::credential_issuer::CredentialIssuer;
use crate::services::issuer_registry::IssuerRegistry;
use crate::services::notifications::NotificationHub;
use crate::services::verifier::{PresentationVerifier, VerifierService};
use crate::settings::Settings;
use crate::storage::database::Database;
use anyhow::Context;
use dotenv::dotenv;
use log::{info, warn};
use std::net::SocketAddr;
use std::sync::Arc;

mod blockchain; // Ledger anchoring
mod contracts; // Contract bindings
mod did; // DID resolution
mod errors;
mod jwt; // JWS signing and verification
mod models; // Data structures
mod services; // Business logic and API
mod settings;
mod storage; // SQLite persistence
mod utils; // Helper functions
mod wallet; // Key management

/// Main application entry point
///
/// # Initialization Sequence
/// 1. Load environment and settings
/// 2. Open the database
/// 3. Connect to the ledger when one is configured
/// 4. Initialize service components
/// 5. Start API server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load().context("failed to load settings")?;

    let db = Arc::new(
        Database::open(&settings.database.path)
            .with_context(|| format!("failed to open database {}", settings.database.path))?,
    );

    let resolvers = Arc::new(ResolverRegistry::from_settings(&settings).context("invalid DID resolver settings")?);
    let proofs = ProofVerifier::new(resolvers);

    let registry = Arc::new(IssuerRegistry::from_settings(&settings).context("invalid issuer key")?);
    info!("main: issuer profile at {}", settings.issuer_uri(&settings.issuer.name));

    let anchoring = if settings.ledger.rpc_url.is_some() {
        let ledger = EvmLedger::connect(&settings.ledger)
            .await
            .context("failed to connect to the ledger")?;
        Some(Arc::new(AnchoringClient::new(Arc::new(ledger), db.clone(), &settings.ledger)))
    } else {
        warn!("main: ledger.rpc_url not set, anchoring routes are disabled");
        None
    };

    let verifier_anchoring = if settings.verifier.anchor_presentations {
        if anchoring.is_none() {
            warn!("main: verifier.anchor_presentations is on but no ledger is configured");
        }
        anchoring.clone()
    } else {
        None
    };

    let verifier = VerifierService::new(
        PresentationVerifier::new(proofs.clone(), &settings.verifier.required_credential_type),
        db.clone(),
        Arc::new(NotificationHub::default()),
        verifier_anchoring,
        settings.verifier.recent_limit,
    );

    if settings.auth.jwt_secret.is_none() {
        warn!("main: auth.jwt_secret not set, credential issuance will reject every request");
    }

    let api_server = ApiServer::new(
        Arc::new(CredentialIssuer::new(registry, proofs)),
        Arc::new(verifier),
        db,
        BearerAuth::new(settings.auth.jwt_secret.as_deref()),
        anchoring,
        settings.verifier.success_url(),
        settings.verifier.failure_url(),
        settings.server.cors_origins.clone(),
    );

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("invalid server host or port")?;
    api_server.run(addr).await.context("API server failed")?;
    Ok(())
}
