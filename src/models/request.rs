// src/models/request.rs
//! OpenID4VCI credential request body and its shape validation.

use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};

/// Single proof of possession of the holder's key material.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProofObject {
    pub proof_type: String,

    /// Compact JWT signed by the holder
    #[serde(alias = "token")]
    pub jwt: String,
}

/// Multiple proofs. Not supported; present only so that it can be rejected.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ProofsObject {
    #[serde(default)]
    pub jwt: Vec<String>,
}

/// Credential request as posted to `/issuer/{name}/credential/issue`.
///
/// Exactly one identification path is valid: either one of
/// `credential_identifier` / `credential_configuration_id`, or neither of them
/// with both `types` and `format` present.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct CredentialRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_identifier: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_configuration_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<ProofObject>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proofs: Option<ProofsObject>,
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).map_or(true, str::is_empty)
}

impl CredentialRequest {
    /// Checks every shape rule and reports all violations at once.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let identifier_empty = blank(&self.credential_identifier);
        let configuration_empty = blank(&self.credential_configuration_id);
        let types_empty = self.types.as_ref().map_or(true, Vec::is_empty);
        let format_empty = blank(&self.format);
        let proof_empty = self.proof.is_none();
        let proofs_empty = self.proofs.as_ref().map_or(true, |p| p.jwt.is_empty());

        let mut violations = Vec::new();

        if identifier_empty && configuration_empty && types_empty && format_empty {
            violations.push(
                "Request fields 'credential_identifier', 'credential_configuration_id', 'types' and 'format' are null or empty."
                    .to_string(),
            );
        }

        if !identifier_empty && !configuration_empty {
            violations.push(
                "Request fields 'credential_identifier' and 'credential_configuration_id' cannot all be non-null simultaneously. Only 'credential_configuration_id' or 'credential_identifier' are accepted as non-null."
                    .to_string(),
            );
        }

        if identifier_empty && configuration_empty && (types_empty || format_empty) {
            violations.push(
                "Request fields 'types' and 'format' cannot be null if 'credential_configuration_id' and 'credential_identifier' are null."
                    .to_string(),
            );
        }

        if !proof_empty && !proofs_empty {
            violations.push(
                "Request fields 'proof' and 'proofs' cannot all be non-null simultaneously. Only one is accepted as non-null."
                    .to_string(),
            );
        }

        if !proofs_empty {
            violations.push("Request fields 'proofs' not supported.".to_string());
        }

        if proof_empty && proofs_empty {
            violations.push("Request field 'proof' is required.".to_string());
        }

        if let Some(proof) = &self.proof {
            if proof.proof_type != "jwt" {
                violations.push("Request field 'proof' must contain 'proof_type' as 'jwt'.".to_string());
            }
            if proof.jwt.trim().is_empty() {
                violations.push("Field 'jwt' cannot be null or blank.".to_string());
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations })
        }
    }
}
