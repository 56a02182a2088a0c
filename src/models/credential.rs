// src/models/credential.rs
//! Verifiable Credential data model implementation.
//!
//! Defines the W3C-shaped credential the issuer signs, the JWT claim sets that
//! carry credentials and presentations, and the OpenID4VCI issuer metadata
//! documents.
//! See the [W3C Verifiable Credentials Data Model](https://www.w3.org/TR/vc-data-model/).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const CREDENTIALS_CONTEXT_V1: &str = "https://www.w3.org/2018/credentials/v1";
pub const VERIFIABLE_CREDENTIAL: &str = "VerifiableCredential";

/// A Verifiable Credential according to W3C standards.
///
/// Issuer-owned and immutable once signed. `id` has the shape
/// `vc:<issuer_name>#<random>`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerifiableCredential {
    #[serde(rename = "@context")]
    pub context: Vec<String>,

    #[serde(rename = "type")]
    pub types: Vec<String>,

    /// DID of the credential issuer
    pub issuer: String,

    /// Second precision ISO-8601 timestamp, e.g. `2024-05-17T10:00:00Z`
    pub issuance_date: String,

    pub id: String,

    pub credential_subject: CredentialSubject,
}

/// Claims about the credential subject. `id` is the subject DID; every other
/// claim is kept as free-form JSON.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct CredentialSubject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

/// The `vc` claim of a credential JWT. Every field is optional so that
/// foreign credentials can still be inspected for their type.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VcClaim {
    #[serde(rename = "@context", default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,

    #[serde(rename = "type", default)]
    pub types: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuance_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub credential_subject: CredentialSubject,
}

impl VcClaim {
    pub fn has_type(&self, wanted: &str) -> bool {
        self.types.iter().any(|t| t == wanted)
    }
}

impl From<VerifiableCredential> for VcClaim {
    fn from(vc: VerifiableCredential) -> Self {
        VcClaim {
            context: vc.context,
            types: vc.types,
            issuer: Some(vc.issuer),
            issuance_date: Some(vc.issuance_date),
            id: Some(vc.id),
            credential_subject: vc.credential_subject,
        }
    }
}

/// Claim set of a VC-JWT.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JwtCredentialPayload {
    pub iss: String,

    #[serde(default)]
    pub sub: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    pub vc: VcClaim,
}

impl JwtCredentialPayload {
    /// Builds the JWT claim set for a credential: issuer, subject, issuance
    /// date and id are lifted to registered claims, and the full credential is
    /// kept under `vc`.
    pub fn from_credential(vc: &VerifiableCredential, issuance_epoch: i64) -> Self {
        JwtCredentialPayload {
            iss: vc.issuer.clone(),
            sub: vc.credential_subject.id.clone(),
            nbf: Some(issuance_epoch),
            jti: Some(vc.id.clone()),
            aud: Some(vc.issuer.clone()),
            vc: vc.clone().into(),
        }
    }
}

/// The `vp` claim of a presentation JWT.
///
/// `verifiableCredential` may be a single entry or a list; entries that are
/// not compact JWTs are ignored.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VpClaim {
    #[serde(rename = "@context", default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,

    #[serde(default)]
    pub verifiable_credential: Value,
}

impl VpClaim {
    /// Normalizes `verifiableCredential` to a list of JWT strings.
    pub fn credential_jwts(&self) -> Vec<&str> {
        match &self.verifiable_credential {
            Value::String(jwt) => vec![jwt.as_str()],
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

/// Claim set of a VP-JWT. `iss` is the holder DID.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JwtPresentationPayload {
    pub iss: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Value>,

    pub vp: VpClaim,
}

/// Logo shown on a credential card.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DisplayLogo {
    pub uri: String,
    pub description: String,
}

/// Card rendering hints for wallets.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CardDisplay {
    pub title: String,
    pub issued_by: String,
    pub background_color: String,
    pub text_color: String,
    pub logo: DisplayLogo,
    pub description: String,
}

/// Localized display metadata of a supported credential.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CredentialDisplay {
    pub locale: String,
    pub card: CardDisplay,
    pub name: String,
}

/// One entry of `credentials_supported` in the issuer metadata.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SupportedCredential {
    pub format: String,
    pub id: String,
    pub types: Vec<String>,
    pub display: CredentialDisplay,
}

/// `/.well-known/openid-credential-issuer` document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CredentialIssuerMetadata {
    pub credential_issuer: String,
    pub authorization_server: String,
    pub credential_endpoint: String,
    pub credentials_supported: Vec<SupportedCredential>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrustFramework {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub uri: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OfferedCredential {
    pub format: String,
    pub types: Vec<String>,
    pub trust_framework: TrustFramework,
}

/// Credential offer payload handed to wallets.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CredentialOffer {
    pub credential_issuer: String,
    pub credentials: Vec<OfferedCredential>,
    pub grants: Value,
}
