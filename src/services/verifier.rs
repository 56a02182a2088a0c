// src/services/verifier.rs
//! Presentation verification service.
//!
//! Verifies a holder-signed VP-JWT, selects and cross-checks the embedded
//! credential, then records the verified presentation and notifies live
//! subscribers. Optionally anchors the presentation hash on the ledger first.

use crate::blockchain::anchoring::AnchoringClient;
use crate::errors::{AnchorError, PresentationError, StorageError, VerificationError};
use crate::jwt::signing::decode_unverified;
use crate::jwt::verification::{AudiencePolicy, ProofVerifier};
use crate::models::credential::{CredentialSubject, JwtPresentationPayload, VcClaim, VERIFIABLE_CREDENTIAL};
use crate::models::record::{NewVerifiedRecord, SanitizedVerifiedRecord, TransactionStatus};
use crate::services::notifications::NotificationHub;
use crate::storage::database::Database;
use crate::storage::{timestamp_now, verifications};
use crate::utils::context::RequestContext;
use crate::utils::crypto::content_hash;
use log::{info, warn};
use serde_json::Value;
use std::sync::Arc;

/// What an accepted presentation proves.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedPresentation {
    /// VP signer, equal to the credential subject
    pub holder_did: String,
    /// Signer of the embedded credential
    pub credential_issuer: String,
    pub subject: CredentialSubject,
}

/// Verifies presentations carrying one credential of a required type.
#[derive(Clone)]
pub struct PresentationVerifier {
    proofs: ProofVerifier,
    required_type: String,
}

impl PresentationVerifier {
    pub fn new(proofs: ProofVerifier, required_type: &str) -> Self {
        PresentationVerifier {
            proofs,
            required_type: required_type.to_string(),
        }
    }

    /// Verifies `vp_token`.
    ///
    /// The VP signature is checked before its `iss` is used, and the embedded
    /// credential's signature before its subject claims are returned.
    /// `aud` is not enforced on either token.
    pub async fn verify(&self, ctx: &RequestContext, vp_token: &str) -> Result<AcceptedPresentation, VerificationError> {
        let presentation = self.proofs.verify(vp_token, &AudiencePolicy::Ignore).await?;
        let vp: JwtPresentationPayload = serde_json::from_value(presentation.payload)
            .map_err(|e| VerificationError::MalformedToken(format!("presentation payload: {}", e)))?;

        let (credential_jwt, claims) = self.select_credential(&vp)?;

        let subject = claims
            .get("sub")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                claims
                    .get("vc")
                    .and_then(|vc| vc.get("credentialSubject"))
                    .and_then(|s| s.get("id"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_default();
        if subject != vp.iss {
            return Err(VerificationError::SubjectIssuerMismatch {
                holder: vp.iss,
                subject,
            });
        }

        let credential = self
            .proofs
            .verify(credential_jwt, &AudiencePolicy::Ignore)
            .await
            .map_err(|e| VerificationError::EmbeddedCredentialInvalid(Box::new(e)))?;
        let vc: VcClaim = credential
            .payload
            .get("vc")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| VerificationError::MalformedToken(format!("credential payload: {}", e)))?
            .unwrap_or_default();

        info!(
            "verify_presentation: {} - accepted {} credential of {} issued by {}",
            ctx.correlation_id, self.required_type, vp.iss, credential.signer_did
        );
        Ok(AcceptedPresentation {
            holder_did: vp.iss,
            credential_issuer: credential.signer_did,
            subject: vc.credential_subject,
        })
    }

    /// First embedded credential typed both `VerifiableCredential` and the
    /// required type, with its unverified claims.
    fn select_credential<'a>(&self, vp: &'a JwtPresentationPayload) -> Result<(&'a str, Value), VerificationError> {
        vp.vp
            .credential_jwts()
            .into_iter()
            .filter_map(|jwt| decode_unverified(jwt).ok().map(|decoded| (jwt, decoded.payload)))
            .find(|(_, claims)| {
                let vc: VcClaim = claims
                    .get("vc")
                    .cloned()
                    .and_then(|vc| serde_json::from_value(vc).ok())
                    .unwrap_or_default();
                vc.has_type(VERIFIABLE_CREDENTIAL) && vc.has_type(&self.required_type)
            })
            .ok_or_else(|| VerificationError::RequiredCredentialTypeMissing(self.required_type.clone()))
    }
}

/// Verifier flow: verify, optionally anchor, store, notify.
pub struct VerifierService {
    presentations: PresentationVerifier,
    db: Arc<Database>,
    hub: Arc<NotificationHub>,
    anchoring: Option<Arc<AnchoringClient>>,
    recent_limit: usize,
}

impl VerifierService {
    pub fn new(
        presentations: PresentationVerifier,
        db: Arc<Database>,
        hub: Arc<NotificationHub>,
        anchoring: Option<Arc<AnchoringClient>>,
        recent_limit: usize,
    ) -> Self {
        VerifierService {
            presentations,
            db,
            hub,
            anchoring,
            recent_limit,
        }
    }

    pub fn hub(&self) -> &NotificationHub {
        &self.hub
    }

    /// Evaluates a presentation and returns the stored record.
    ///
    /// Exactly one record is created per accepted presentation. Rejected
    /// presentations leave no trace besides the log.
    pub async fn evaluate(
        &self,
        ctx: &RequestContext,
        vp_token: &str,
    ) -> Result<SanitizedVerifiedRecord, PresentationError> {
        let accepted = self.presentations.verify(ctx, vp_token).await.map_err(|e| {
            warn!("verify_presentation: {} - rejected: {}", ctx.correlation_id, e);
            e
        })?;
        let vp_hash = content_hash(vp_token.as_bytes());

        if let Some(anchoring) = &self.anchoring {
            let transaction = anchoring
                .anchor(ctx, &accepted.holder_did, &vp_hash, &accepted.credential_issuer)
                .await?;
            if transaction.status == TransactionStatus::Failure {
                return Err(PresentationError::Anchor(AnchorError::Invalid(format!(
                    "transaction {} did not succeed",
                    transaction.transaction_hash
                ))));
            }
        }

        let email = accepted.subject.email.clone().unwrap_or_default();
        let name = accepted
            .subject
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.clone());
        let input = NewVerifiedRecord {
            name,
            email,
            did: accepted.holder_did,
            vp_hash,
            verified: true,
        };
        let now = timestamp_now();
        let record: SanitizedVerifiedRecord = self
            .db
            .with_conn(|c| verifications::create(c, input, &now))?
            .into();

        let delivered = self.hub.broadcast(record.clone());
        info!(
            "verify_presentation: {} - stored {} for {}, notified {} subscribers",
            ctx.correlation_id, record.id, record.did, delivered
        );
        Ok(record)
    }

    /// Most recently updated records, sanitized.
    pub fn list(&self) -> Result<Vec<SanitizedVerifiedRecord>, StorageError> {
        let records = self.db.with_conn(|c| verifications::recent(c, self.recent_limit))?;
        Ok(records.into_iter().map(Into::into).collect())
    }
}
