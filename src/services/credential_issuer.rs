// src/services/credential_issuer.rs
//! Credential issuance service.
//!
//! Validates an OpenID4VCI credential request, checks the holder's proof of
//! possession and returns a signed VC-JWT for the configured issuer profile.

use crate::errors::{IssuanceError, ValidationError};
use crate::jwt::signing::encode_signed;
use crate::jwt::verification::{AudiencePolicy, ProofVerifier};
use crate::models::credential::JwtCredentialPayload;
use crate::models::did::Did;
use crate::models::request::CredentialRequest;
use crate::services::auth::Identity;
use crate::services::issuer_registry::{IssuerProfile, IssuerRegistry, JWT_VC_FORMAT};
use crate::utils::context::RequestContext;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

pub const UNSUPPORTED_FORMAT: &str = "E8091002";
pub const REQUEST_NOT_VALID: &str = "E8091005";
pub const SIGNING_FAILED: &str = "E8091019";
pub const UNSUPPORTED_CONFIGURATION: &str = "E8091021";

/// Response body of the credential endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IssuedCredential {
    pub format: String,
    /// Compact VC-JWT
    pub credential: String,
}

/// Issues credentials on behalf of the registered issuer profiles.
pub struct CredentialIssuer {
    registry: Arc<IssuerRegistry>,
    proofs: ProofVerifier,
}

impl CredentialIssuer {
    pub fn new(registry: Arc<IssuerRegistry>, proofs: ProofVerifier) -> Self {
        CredentialIssuer { registry, proofs }
    }

    pub fn registry(&self) -> &IssuerRegistry {
        &self.registry
    }

    /// Issues a credential to the holder proven by `request.proof`.
    ///
    /// # Arguments
    /// * `issuer_name` - Profile name from the request path
    /// * `request` - Credential request body
    /// * `identity` - Requester authenticated by the identity provider
    ///
    /// # Errors
    /// - `Validation` for shape violations, unsupported formats and
    ///   configurations
    /// - `NotFound` for an unknown issuer
    /// - `ProofInvalid` when the proof does not verify
    /// - `SigningFailed` when the credential cannot be signed
    pub async fn issue_credential(
        &self,
        ctx: &RequestContext,
        issuer_name: &str,
        request: &CredentialRequest,
        identity: &Identity,
    ) -> Result<IssuedCredential, IssuanceError> {
        request.validate().map_err(|e| {
            warn!("issue_credential: {} - invalid request: {}", ctx.correlation_id, e);
            e
        })?;
        let profile = self.registry.profile(issuer_name)?;
        check_supported(&profile, request)?;

        let proof = request
            .proof
            .as_ref()
            .ok_or_else(|| ValidationError {
                violations: vec!["Request field 'proof' is required.".to_string()],
            })?;
        let audience = AudiencePolicy::RequireIfPresent(self.registry.issuer_uri(&profile));
        let verified = self.proofs.verify(&proof.jwt, &audience).await.map_err(|e| {
            warn!("issue_credential: {} - proof rejected: {}", ctx.correlation_id, e);
            IssuanceError::ProofInvalid(e)
        })?;
        let holder_did = verified.signer_did;

        let method = Did::from_str(&holder_did)
            .map(|did| did.method().to_string())
            .unwrap_or_default();
        let issuer_did = self.registry.issuer_did(issuer_name, &method)?;
        let keys = self.registry.issuer_keys(issuer_name)?;
        let credential = profile.build_credential(&issuer_did, &holder_did, identity);
        let payload = JwtCredentialPayload::from_credential(&credential, chrono::Utc::now().timestamp());

        let (alg, kid) = profile.signing_params(&issuer_did);
        let jwt = encode_signed(&payload, &keys, alg, Some(kid)).map_err(|e| {
            error!("issue_credential: {} - signing failed: {}", ctx.correlation_id, e);
            IssuanceError::SigningFailed(format!("Credential could not be signed ({})", SIGNING_FAILED))
        })?;

        info!(
            "issue_credential: {} - issued {} to {} as {}",
            ctx.correlation_id, credential.id, holder_did, issuer_did
        );
        Ok(IssuedCredential {
            format: request.format.clone().unwrap_or_else(|| JWT_VC_FORMAT.to_string()),
            credential: jwt,
        })
    }
}

/// Rejects formats and credential configurations the profile does not issue.
fn check_supported(profile: &IssuerProfile, request: &CredentialRequest) -> Result<(), ValidationError> {
    let mut violations = Vec::new();
    if let Some(format) = request.format.as_deref().filter(|f| !f.trim().is_empty()) {
        if format != JWT_VC_FORMAT {
            violations.push(format!("Credential format {} is not supported ({})", format, UNSUPPORTED_FORMAT));
        }
    }

    let configuration = request
        .credential_configuration_id
        .as_deref()
        .or(request.credential_identifier.as_deref())
        .filter(|c| !c.trim().is_empty());
    if let Some(configuration) = configuration {
        if configuration != profile.configuration_id() {
            violations.push(format!(
                "Credential configuration {} is not supported ({})",
                configuration, UNSUPPORTED_CONFIGURATION
            ));
        }
    } else if let Some(types) = &request.types {
        if !types.contains(&profile.credential_type) {
            violations.push(format!(
                "Credential types [{}] are not supported ({})",
                types.join(", "),
                UNSUPPORTED_CONFIGURATION
            ));
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { violations })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::did::ResolverRegistry;
    use crate::jwt::signing::{decode_unverified, Algorithm};
    use crate::jwt::verification::AudiencePolicy;
    use crate::models::request::{ProofObject, ProofsObject};
    use crate::settings::{IssuerDisplaySettings, Settings};
    use crate::wallet::key_management::KeyManager;
    use serde_json::json;

    pub const CHAIN: u64 = 80002;
    pub const ISSUER_URI: &str = "http://localhost:3000/issuer/melon_university";

    pub fn issuer_with_keys(keys: KeyManager) -> CredentialIssuer {
        let profile = IssuerProfile::new(
            "melon_university",
            keys,
            CHAIN,
            "AcmeAccreditation",
            IssuerDisplaySettings::default(),
        );
        let registry = Arc::new(IssuerRegistry::new(profile, "http://localhost:3000"));
        let resolvers = Arc::new(ResolverRegistry::from_settings(&Settings::default()).unwrap());
        CredentialIssuer::new(registry, ProofVerifier::new(resolvers))
    }

    /// Proof of possession signed by `holder` for the test issuer.
    pub fn proof_jwt(holder: &KeyManager) -> String {
        let did = holder.ethr_did(CHAIN);
        encode_signed(
            &json!({"iss": did, "aud": ISSUER_URI, "nonce": "n-1"}),
            holder,
            Algorithm::ES256KR,
            Some(format!("{}#controller", did)),
        )
        .unwrap()
    }

    pub fn request_by_types(jwt: String) -> CredentialRequest {
        CredentialRequest {
            types: Some(vec!["VerifiableCredential".into(), "AcmeAccreditation".into()]),
            format: Some("jwt_vc".into()),
            proof: Some(ProofObject {
                proof_type: "jwt".into(),
                jwt,
            }),
            ..Default::default()
        }
    }

    pub fn identity() -> Identity {
        Identity {
            subject: "user-1".into(),
            name: Some("Ada Lovelace".into()),
            email: "ada@example.com".into(),
        }
    }

    #[tokio::test]
    async fn test_issue_by_types() {
        let issuer_keys = KeyManager::new();
        let issuer = issuer_with_keys(issuer_keys.clone());
        let holder = KeyManager::new();

        let issued = issuer
            .issue_credential(
                &RequestContext::new(),
                "melon_university",
                &request_by_types(proof_jwt(&holder)),
                &identity(),
            )
            .await
            .unwrap();
        assert_eq!(issued.format, "jwt_vc");

        let decoded = decode_unverified(&issued.credential).unwrap();
        assert_eq!(decoded.header.alg, Algorithm::ES256KR);
        let payload: JwtCredentialPayload = decoded.claims().unwrap();
        assert_eq!(payload.iss, issuer_keys.ethr_did(CHAIN));
        assert_eq!(payload.sub.as_deref(), Some(holder.ethr_did(CHAIN).as_str()));
        assert_eq!(payload.vc.credential_subject.id, Some(holder.ethr_did(CHAIN)));
        assert_eq!(payload.vc.credential_subject.email.as_deref(), Some("ada@example.com"));
        assert!(payload.vc.has_type("AcmeAccreditation"));

        let verified = issuer
            .proofs
            .verify(&issued.credential, &AudiencePolicy::Ignore)
            .await
            .unwrap();
        assert_eq!(verified.signer_did, issuer_keys.ethr_did(CHAIN));
    }

    #[tokio::test]
    async fn test_near_holder_gets_near_issuer() {
        let issuer_keys = KeyManager::new();
        let issuer = issuer_with_keys(issuer_keys.clone());
        let holder = KeyManager::new();
        let kid = format!("{}#owner", holder.near_did());
        let jwt = encode_signed(&json!({"aud": ISSUER_URI}), &holder, Algorithm::EdDSA, Some(kid)).unwrap();

        let issued = issuer
            .issue_credential(&RequestContext::new(), "default", &request_by_types(jwt), &identity())
            .await
            .unwrap();
        let decoded = decode_unverified(&issued.credential).unwrap();
        assert_eq!(decoded.header.alg, Algorithm::EdDSA);
        let payload: JwtCredentialPayload = decoded.claims().unwrap();
        assert_eq!(payload.iss, issuer_keys.near_did());
        assert_eq!(payload.sub, Some(holder.near_did()));
        assert_eq!(payload.iss, issuer.registry.issuer_did("default", "near").unwrap());
        assert_eq!(
            issuer.registry.issuer_keys("melon_university").unwrap().near_did(),
            issuer_keys.near_did()
        );
    }

    #[tokio::test]
    async fn test_issue_by_configuration_id_defaults_format() {
        let issuer = issuer_with_keys(KeyManager::new());
        let holder = KeyManager::new();
        let request = CredentialRequest {
            credential_configuration_id: Some("AcmeAccreditationJWTVCDidEthr".into()),
            proof: Some(ProofObject {
                proof_type: "jwt".into(),
                jwt: proof_jwt(&holder),
            }),
            ..Default::default()
        };
        let issued = issuer
            .issue_credential(&RequestContext::new(), "melon_university", &request, &identity())
            .await
            .unwrap();
        assert_eq!(issued.format, "jwt_vc");
    }

    #[tokio::test]
    async fn test_unsupported_configuration_and_format() {
        let issuer = issuer_with_keys(KeyManager::new());
        let holder = KeyManager::new();
        let ctx = RequestContext::new();

        let mut request = request_by_types(proof_jwt(&holder));
        request.types = Some(vec!["VerifiableCredential".into(), "DriverLicense".into()]);
        request.format = Some("ldp_vc".into());
        match issuer.issue_credential(&ctx, "melon_university", &request, &identity()).await {
            Err(IssuanceError::Validation(e)) => {
                assert!(e.mentions("E8091002"));
                assert!(e.mentions("E8091021"));
            }
            other => panic!("expected validation error, got {:?}", other.map(|i| i.format)),
        }

        let request = CredentialRequest {
            credential_identifier: Some("Unknown".into()),
            proof: Some(ProofObject {
                proof_type: "jwt".into(),
                jwt: proof_jwt(&holder),
            }),
            ..Default::default()
        };
        assert!(matches!(
            issuer.issue_credential(&ctx, "melon_university", &request, &identity()).await,
            Err(IssuanceError::Validation(ref e)) if e.mentions("E8091021")
        ));
    }

    #[tokio::test]
    async fn test_rejections() {
        let issuer = issuer_with_keys(KeyManager::new());
        let holder = KeyManager::new();
        let ctx = RequestContext::new();

        let unknown = issuer
            .issue_credential(&ctx, "acme", &request_by_types(proof_jwt(&holder)), &identity())
            .await;
        assert!(matches!(unknown, Err(IssuanceError::NotFound(ref m)) if m.contains("E8091000")));

        let mut with_proofs = request_by_types(proof_jwt(&holder));
        with_proofs.proofs = Some(ProofsObject { jwt: vec!["a.b.c".into()] });
        assert!(matches!(
            issuer.issue_credential(&ctx, "melon_university", &with_proofs, &identity()).await,
            Err(IssuanceError::Validation(ref e)) if e.mentions("'proofs' not supported")
        ));

        let did = holder.ethr_did(CHAIN);
        let wrong_audience = encode_signed(
            &json!({"iss": did, "aud": "https://elsewhere.example"}),
            &holder,
            Algorithm::ES256KR,
            None,
        )
        .unwrap();
        assert!(matches!(
            issuer
                .issue_credential(&ctx, "melon_university", &request_by_types(wrong_audience), &identity())
                .await,
            Err(IssuanceError::ProofInvalid(_))
        ));

        let forged = encode_signed(&json!({"iss": did}), &KeyManager::new(), Algorithm::ES256KR, None).unwrap();
        assert!(matches!(
            issuer
                .issue_credential(&ctx, "melon_university", &request_by_types(forged), &identity())
                .await,
            Err(IssuanceError::ProofInvalid(_))
        ));
    }
}
