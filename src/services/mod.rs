//! Services layer: issuance, presentation verification and the HTTP API.

pub mod api_server;
pub mod auth;
pub mod credential_issuer;
pub mod issuer_registry;
pub mod notifications;
pub mod verifier;
