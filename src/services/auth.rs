// src/services/auth.rs
//! Bearer authentication against the external identity provider.
//!
//! Tokens are HS256 JWTs carrying `sub`, optional `name` and `email`, and
//! `exp`. The verified claims become the holder identity used for issuance.

use crate::errors::AuthError;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims issued by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize,
}

/// The authenticated requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub name: Option<String>,
    /// Falls back to the subject when the token has no email
    pub email: String,
}

impl From<IdentityClaims> for Identity {
    fn from(claims: IdentityClaims) -> Self {
        Identity {
            email: claims.email.filter(|e| !e.is_empty()).unwrap_or_else(|| claims.sub.clone()),
            name: claims.name.filter(|n| !n.is_empty()),
            subject: claims.sub,
        }
    }
}

/// Validates `Authorization: Bearer <jwt>` headers.
pub struct BearerAuth {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl BearerAuth {
    /// Without a secret every token is rejected.
    pub fn new(secret: Option<&str>) -> Self {
        BearerAuth {
            key: secret
                .filter(|s| !s.is_empty())
                .map(|s| DecodingKey::from_secret(s.as_bytes())),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        let key = self.key.as_ref().ok_or(AuthError::NotConfigured)?;
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;
        let data = decode::<IdentityClaims>(token, key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        Ok(data.claims.into())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    pub const SECRET: &str = "identity-provider-secret";

    /// Bearer header value for a token signed with [`SECRET`].
    pub fn bearer(sub: &str, name: Option<&str>, email: Option<&str>) -> String {
        let claims = IdentityClaims {
            sub: sub.into(),
            name: name.map(str::to_string),
            email: email.map(str::to_string),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
        format!("Bearer {}", token)
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_valid_token_yields_identity() {
        let auth = BearerAuth::new(Some(SECRET));
        let identity = auth
            .authenticate(&headers(&bearer("user-1", Some("Ada"), Some("ada@example.com"))))
            .unwrap();
        assert_eq!(
            identity,
            Identity {
                subject: "user-1".into(),
                name: Some("Ada".into()),
                email: "ada@example.com".into(),
            }
        );
    }

    #[test]
    fn test_email_falls_back_to_subject() {
        let auth = BearerAuth::new(Some(SECRET));
        let identity = auth.authenticate(&headers(&bearer("user-2", None, None))).unwrap();
        assert_eq!(identity.email, "user-2");
        assert_eq!(identity.name, None);
    }

    #[test]
    fn test_rejections() {
        let auth = BearerAuth::new(Some(SECRET));
        assert_eq!(auth.authenticate(&HeaderMap::new()), Err(AuthError::MissingToken));
        assert!(matches!(
            auth.authenticate(&headers("Bearer not.a.jwt")),
            Err(AuthError::InvalidToken(_))
        ));

        let other = BearerAuth::new(Some("another-secret"));
        assert!(matches!(
            other.authenticate(&headers(&bearer("user-1", None, None))),
            Err(AuthError::InvalidToken(_))
        ));

        let unconfigured = BearerAuth::new(None);
        assert_eq!(
            unconfigured.authenticate(&headers(&bearer("user-1", None, None))),
            Err(AuthError::NotConfigured)
        );
    }
}
