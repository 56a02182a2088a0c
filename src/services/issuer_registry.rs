// src/services/issuer_registry.rs
//! Issuer profiles keyed by name.
//!
//! One profile is configured today; the alias `default` maps to it. Any other
//! name is not found.

use crate::errors::{IssuanceError, SigningError};
use crate::jwt::signing::Algorithm;
use crate::models::credential::{
    CardDisplay, CredentialDisplay, CredentialIssuerMetadata, CredentialOffer, CredentialSubject, DisplayLogo,
    OfferedCredential, SupportedCredential, TrustFramework, VerifiableCredential, CREDENTIALS_CONTEXT_V1,
    VERIFIABLE_CREDENTIAL,
};
use crate::services::auth::Identity;
use crate::settings::{IssuerDisplaySettings, Settings};
use crate::wallet::key_management::KeyManager;
use log::warn;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Alias resolving to the configured profile.
pub const DEFAULT_ALIAS: &str = "default";
/// The only credential format issued.
pub const JWT_VC_FORMAT: &str = "jwt_vc";
/// Error code of an unknown issuer.
pub const ISSUER_NOT_FOUND: &str = "E8091000";

/// Identity, keys and branding of one issuer.
pub struct IssuerProfile {
    pub name: String,
    keys: KeyManager,
    ethr_did: String,
    near_did: String,
    /// Type carried besides `VerifiableCredential`
    pub credential_type: String,
    authorization_server: Option<String>,
    display: IssuerDisplaySettings,
}

impl IssuerProfile {
    pub fn new(
        name: &str,
        keys: KeyManager,
        chain_id: u64,
        credential_type: &str,
        display: IssuerDisplaySettings,
    ) -> Self {
        IssuerProfile {
            name: name.to_string(),
            ethr_did: keys.ethr_did(chain_id),
            near_did: keys.near_did(),
            keys,
            credential_type: credential_type.to_string(),
            authorization_server: None,
            display,
        }
    }

    pub fn keys(&self) -> &KeyManager {
        &self.keys
    }

    /// Issuer DID for holders of `method`: `near` holders get the near DID,
    /// everyone else the ethr DID.
    pub fn did_for(&self, method: &str) -> &str {
        if method == "near" {
            &self.near_did
        } else {
            &self.ethr_did
        }
    }

    /// Algorithm and key id used to sign as `issuer_did`.
    pub fn signing_params(&self, issuer_did: &str) -> (Algorithm, String) {
        if issuer_did.starts_with("did:near:") {
            (Algorithm::EdDSA, format!("{}#owner", issuer_did))
        } else {
            (Algorithm::ES256KR, format!("{}#controller", issuer_did))
        }
    }

    /// Credential configuration id advertised in the metadata.
    pub fn configuration_id(&self) -> String {
        format!("{}JWTVCDidEthr", self.credential_type)
    }

    pub fn credential_types(&self) -> Vec<String> {
        vec![VERIFIABLE_CREDENTIAL.to_string(), self.credential_type.clone()]
    }

    pub fn credential_display(&self) -> CredentialDisplay {
        let d = &self.display;
        CredentialDisplay {
            locale: "en-US".to_string(),
            card: CardDisplay {
                title: d.card_title.clone(),
                issued_by: d.issued_by.clone(),
                background_color: d.background_color.clone(),
                text_color: d.text_color.clone(),
                logo: DisplayLogo {
                    uri: d.logo_uri.clone(),
                    description: d.logo_description.clone(),
                },
                description: d.card_description.clone(),
            },
            name: d.credential_name.clone(),
        }
    }

    /// Builds the unsigned credential for `holder_did`.
    pub fn build_credential(&self, issuer_did: &str, holder_did: &str, identity: &Identity) -> VerifiableCredential {
        let d = &self.display;
        let mut claims = Map::new();
        claims.insert("@id".to_string(), Value::String(holder_did.to_string()));
        claims.insert("@type".to_string(), Value::String("Person".to_string()));
        claims.insert(
            "knowsAbout".to_string(),
            json!({
                "@type": "Course",
                "name": d.course_name,
                "about": d.course_about,
                "description": d.course_description,
                "provider": {
                    "@type": "EducationalOrganization",
                    "name": d.organization,
                },
            }),
        );

        VerifiableCredential {
            context: vec![CREDENTIALS_CONTEXT_V1.to_string()],
            types: vec![self.credential_type.clone(), VERIFIABLE_CREDENTIAL.to_string()],
            issuer: issuer_did.to_string(),
            issuance_date: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            id: format!("vc:{}#{}", self.name, Uuid::new_v4()),
            credential_subject: CredentialSubject {
                id: Some(holder_did.to_string()),
                name: identity.name.clone(),
                email: Some(identity.email.clone()),
                claims,
            },
        }
    }
}

/// Name keyed issuer profiles.
pub struct IssuerRegistry {
    profiles: HashMap<String, Arc<IssuerProfile>>,
    default_name: String,
    public_base_url: String,
}

impl IssuerRegistry {
    pub fn new(profile: IssuerProfile, public_base_url: &str) -> Self {
        let default_name = profile.name.clone();
        let mut profiles = HashMap::new();
        profiles.insert(default_name.clone(), Arc::new(profile));
        IssuerRegistry {
            profiles,
            default_name,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Builds the configured profile. Without a private key a random one is
    /// generated, so issued credentials will not survive a restart.
    pub fn from_settings(settings: &Settings) -> Result<Self, SigningError> {
        let issuer = &settings.issuer;
        let keys = match issuer.private_key.as_deref().filter(|k| !k.trim().is_empty()) {
            Some(private_key) => KeyManager::from_hex(private_key)?,
            None => {
                warn!("issuer: no private key configured for {}, using a random key", issuer.name);
                KeyManager::new()
            }
        };
        let mut profile = IssuerProfile::new(
            &issuer.name,
            keys,
            issuer.chain_id,
            &settings.verifier.required_credential_type,
            issuer.display.clone(),
        );
        if let Some(did) = issuer.ethr_did.clone() {
            profile.ethr_did = did;
        }
        if let Some(did) = issuer.near_did.clone() {
            profile.near_did = did;
        }
        profile.authorization_server = issuer.authorization_server.clone();
        Ok(Self::new(profile, &settings.server.public_base_url))
    }

    /// Looks up a profile by name or by the `default` alias.
    pub fn profile(&self, name: &str) -> Result<Arc<IssuerProfile>, IssuanceError> {
        let key = if name == DEFAULT_ALIAS { self.default_name.as_str() } else { name };
        self.profiles
            .get(key)
            .cloned()
            .ok_or_else(|| IssuanceError::NotFound(format!("Issuer not found: {} ({})", name, ISSUER_NOT_FOUND)))
    }

    pub fn issuer_did(&self, name: &str, method: &str) -> Result<String, IssuanceError> {
        Ok(self.profile(name)?.did_for(method).to_string())
    }

    pub fn issuer_keys(&self, name: &str) -> Result<KeyManager, IssuanceError> {
        Ok(self.profile(name)?.keys().clone())
    }

    /// `<public base>/issuer/<profile name>`
    pub fn issuer_uri(&self, profile: &IssuerProfile) -> String {
        format!("{}/issuer/{}", self.public_base_url, profile.name)
    }

    /// `/.well-known/openid-credential-issuer` document.
    pub fn metadata(&self, name: &str) -> Result<CredentialIssuerMetadata, IssuanceError> {
        let profile = self.profile(name)?;
        let credential_issuer = self.issuer_uri(&profile);
        Ok(CredentialIssuerMetadata {
            authorization_server: profile
                .authorization_server
                .clone()
                .unwrap_or_else(|| credential_issuer.clone()),
            credential_endpoint: format!("{}/credential/issue", credential_issuer),
            credentials_supported: vec![SupportedCredential {
                format: JWT_VC_FORMAT.to_string(),
                id: profile.configuration_id(),
                types: profile.credential_types(),
                display: profile.credential_display(),
            }],
            credential_issuer,
        })
    }

    pub fn offer(&self, name: &str) -> Result<CredentialOffer, IssuanceError> {
        let profile = self.profile(name)?;
        Ok(CredentialOffer {
            credential_issuer: self.issuer_uri(&profile),
            credentials: vec![OfferedCredential {
                format: JWT_VC_FORMAT.to_string(),
                types: profile.credential_types(),
                trust_framework: TrustFramework {
                    name: profile.display.issued_by.clone(),
                    type_: "Accreditation".to_string(),
                    uri: profile.display.trust_framework_uri.clone(),
                },
            }],
            grants: json!({"authorization_code": {"issuer_state": ""}}),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (IssuerRegistry, KeyManager) {
        let keys = KeyManager::new();
        let profile = IssuerProfile::new(
            "melon_university",
            keys.clone(),
            80002,
            "AcmeAccreditation",
            IssuerDisplaySettings::default(),
        );
        (IssuerRegistry::new(profile, "http://localhost:3000/"), keys)
    }

    #[test]
    fn test_issuer_did_per_name_and_method() {
        let (registry, keys) = registry();
        let cases = [
            ("melon_university", "ethr", Some(keys.ethr_did(80002))),
            ("melon_university", "near", Some(keys.near_did())),
            ("default", "ethr", Some(keys.ethr_did(80002))),
            ("default", "near", Some(keys.near_did())),
            ("melon_university", "web", Some(keys.ethr_did(80002))),
            ("acme", "ethr", None),
        ];
        for (name, method, expected) in cases {
            let did = registry.issuer_did(name, method).ok();
            assert_eq!(did, expected, "issuer {} method {}", name, method);
        }
    }

    #[test]
    fn test_unknown_issuer_message_carries_code() {
        let (registry, _) = registry();
        let err = registry.issuer_keys("acme").unwrap_err();
        assert_eq!(err.to_string(), "Issuer not found: acme (E8091000)");
    }

    #[test]
    fn test_signing_params_follow_did_method() {
        let (registry, keys) = registry();
        let profile = registry.profile("default").unwrap();
        let near = keys.near_did();
        assert_eq!(profile.signing_params(&near), (Algorithm::EdDSA, format!("{}#owner", near)));
        let ethr = keys.ethr_did(80002);
        assert_eq!(profile.signing_params(&ethr), (Algorithm::ES256KR, format!("{}#controller", ethr)));
    }

    #[test]
    fn test_metadata_document() {
        let (registry, _) = registry();
        let metadata = registry.metadata("melon_university").unwrap();
        assert_eq!(metadata.credential_issuer, "http://localhost:3000/issuer/melon_university");
        assert_eq!(metadata.authorization_server, metadata.credential_issuer);
        assert_eq!(
            metadata.credential_endpoint,
            "http://localhost:3000/issuer/melon_university/credential/issue"
        );
        let supported = &metadata.credentials_supported[0];
        assert_eq!(supported.id, "AcmeAccreditationJWTVCDidEthr");
        assert_eq!(supported.format, "jwt_vc");
        assert_eq!(supported.types, vec!["VerifiableCredential", "AcmeAccreditation"]);
        assert_eq!(supported.display.card.title, "Bachelor's Degree");
    }

    #[test]
    fn test_offer_payload() {
        let (registry, _) = registry();
        let offer = serde_json::to_value(registry.offer("default").unwrap()).unwrap();
        assert_eq!(offer["credential_issuer"], "http://localhost:3000/issuer/melon_university");
        assert_eq!(offer["credentials"][0]["trust_framework"]["type"], "Accreditation");
        assert_eq!(offer["grants"]["authorization_code"]["issuer_state"], "");
    }

    #[test]
    fn test_built_credential_subject() {
        let (registry, keys) = registry();
        let profile = registry.profile("default").unwrap();
        let identity = Identity {
            subject: "user-1".into(),
            name: Some("Ada".into()),
            email: "ada@example.com".into(),
        };
        let vc = profile.build_credential(&keys.ethr_did(80002), "did:ethr:0xholder", &identity);
        assert!(vc.id.starts_with("vc:melon_university#"));
        assert_eq!(vc.types, vec!["AcmeAccreditation", "VerifiableCredential"]);
        assert_eq!(vc.credential_subject.id.as_deref(), Some("did:ethr:0xholder"));
        assert_eq!(vc.credential_subject.claims["@type"], "Person");
        assert_eq!(vc.credential_subject.claims["knowsAbout"]["about"], "Web3");
        assert!(vc.issuance_date.ends_with('Z') && !vc.issuance_date.contains('.'));
    }
}
