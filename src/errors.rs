// src/errors.rs
//! Error types for each layer of the system.
//!
//! Every layer returns its own `thiserror` enum; the HTTP layer converts them
//! into [`crate::services::api_server::AppError`] responses.

use thiserror::Error;

/// DID resolution failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    #[error("Invalid DID: {0}")]
    InvalidDid(String),

    #[error("Unsupported DID method: {0}")]
    UnsupportedMethod(String),

    #[error("DID not found: {0}")]
    NotFound(String),

    /// Network or RPC failure. Retryable by the caller.
    #[error("DID resolution failed: {0}")]
    ResolutionFailed(String),
}

/// Rejections produced while verifying a signed token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Signer could not be resolved: {0}")]
    SignerUnresolvable(String),

    #[error("Invalid signature: {0}")]
    SignatureInvalid(String),

    #[error("Token expired or not yet valid: {0}")]
    TokenNotActive(String),

    #[error("Audience mismatch: expected {expected}")]
    AudienceMismatch { expected: String },

    #[error("Required credential type missing: {0}")]
    RequiredCredentialTypeMissing(String),

    #[error("Presentation holder {holder} is not the credential subject {subject}")]
    SubjectIssuerMismatch { holder: String, subject: String },

    #[error("Embedded credential invalid: {0}")]
    EmbeddedCredentialInvalid(Box<VerificationError>),
}

/// Credential request shape violations. Carries every violated rule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", .violations.join(" "))]
pub struct ValidationError {
    pub violations: Vec<String>,
}

impl ValidationError {
    /// True if any violation message contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.violations.iter().any(|v| v.contains(needle))
    }
}

/// Signing failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Algorithm {0} is not supported by this key")]
    UnsupportedAlgorithm(String),

    #[error("Signing failed: {0}")]
    Failed(String),
}

/// Credential issuance failures.
#[derive(Error, Debug)]
pub enum IssuanceError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(String),

    #[error("Proof of possession rejected: {0}")]
    ProofInvalid(#[source] VerificationError),

    #[error("{0}")]
    SigningFailed(String),
}

/// Bearer authentication failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid bearer token: {0}")]
    InvalidToken(String),

    #[error("Bearer authentication is not configured")]
    NotConfigured,
}

/// Ledger client failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Ledger configuration error: {0}")]
    Config(String),

    #[error("Ledger submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Transaction {0} was dropped before finality")]
    Dropped(String),

    #[error("Ledger query failed: {0}")]
    QueryFailed(String),
}

/// Local database failures.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures of the submit-then-mirror anchoring flow.
#[derive(Error, Debug)]
pub enum AnchorError {
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures of presentation evaluation.
#[derive(Error, Debug)]
pub enum PresentationError {
    #[error(transparent)]
    Invalid(#[from] VerificationError),

    #[error(transparent)]
    Anchor(#[from] AnchorError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_joins_violations() {
        let err = ValidationError {
            violations: vec!["first.".into(), "second.".into()],
        };
        assert_eq!(err.to_string(), "first. second.");
        assert!(err.mentions("second"));
    }

    #[test]
    fn test_embedded_error_wraps_inner_reason() {
        let err = VerificationError::EmbeddedCredentialInvalid(Box::new(
            VerificationError::SignatureInvalid("bad".into()),
        ));
        assert_eq!(err.to_string(), "Embedded credential invalid: Invalid signature: bad");
    }
}
