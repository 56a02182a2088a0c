// src/settings.rs
//! Application configuration.
//!
//! Sources, lowest precedence first:
//! 1. serde defaults below
//! 2. `config/default.toml`, or the file named by `ANCHOR_CONFIG` (optional)
//! 3. `ANCHOR_*` environment variables, `__` separating nested keys
//!    (`ANCHOR_ISSUER__PRIVATE_KEY`, `ANCHOR_LEDGER__RPC_URL`, ...)
//!
//! `.env` is loaded into the environment first via `dotenv`.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root of the configuration tree.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub issuer: IssuerSettings,
    pub ethr: EthrSettings,
    pub near: NearSettings,
    pub verifier: VerifierSettings,
    pub ledger: LedgerSettings,
    pub database: DatabaseSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Externally visible base URL; issuer URIs are `<base>/issuer/<name>`
    pub public_base_url: String,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: "0.0.0.0".to_string(),
            port: 3000,
            public_base_url: "http://localhost:3000".to_string(),
            cors_origins: Vec::new(),
        }
    }
}

/// Identity provider bearer tokens.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AuthSettings {
    /// HS256 secret. When unset every bearer token is rejected.
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IssuerSettings {
    /// Profile name used in issuer URLs
    pub name: String,
    /// Hex secp256k1 secret; the ed25519 key is derived from the same bytes
    pub private_key: Option<String>,
    /// Explicit DIDs. Derived from the key when absent.
    pub ethr_did: Option<String>,
    pub near_did: Option<String>,
    /// Chain id used when deriving the ethr DID
    pub chain_id: u64,
    /// Defaults to the issuer URI
    pub authorization_server: Option<String>,
    pub display: IssuerDisplaySettings,
}

impl Default for IssuerSettings {
    fn default() -> Self {
        IssuerSettings {
            name: "melon_university".to_string(),
            private_key: None,
            ethr_did: None,
            near_did: None,
            chain_id: 80002,
            authorization_server: None,
            display: IssuerDisplaySettings::default(),
        }
    }
}

/// Wallet facing branding of the issued credential.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IssuerDisplaySettings {
    pub organization: String,
    pub issued_by: String,
    pub credential_name: String,
    pub card_title: String,
    pub card_description: String,
    pub background_color: String,
    pub text_color: String,
    pub logo_uri: String,
    pub logo_description: String,
    pub course_name: String,
    pub course_about: String,
    pub course_description: String,
    pub trust_framework_uri: String,
}

impl Default for IssuerDisplaySettings {
    fn default() -> Self {
        IssuerDisplaySettings {
            organization: "Melon University".to_string(),
            issued_by: "Melón University".to_string(),
            credential_name: "Melon Bachelor's Degree".to_string(),
            card_title: "Bachelor's Degree".to_string(),
            card_description: "Blockchain Technologies".to_string(),
            background_color: "#f8f6ef".to_string(),
            text_color: "#012a2d".to_string(),
            logo_uri: "https://frutas.demo.kaytrust.id/images/logo-acme-university.png".to_string(),
            logo_description: "Melón University Logo".to_string(),
            course_name: "Bachelor's Degree in Blockchain Technologies".to_string(),
            course_about: "Web3".to_string(),
            course_description: "An intensive course on Blockchain Technologies, tokens, networks and more"
                .to_string(),
            trust_framework_uri: "TIR link towards accreditation".to_string(),
        }
    }
}

/// One EVM network known to the `did:ethr` resolver.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EthrNetworkSettings {
    #[serde(default)]
    pub name: Option<String>,
    pub chain_id: u64,
    pub registry: String,
    /// Without an RPC URL identities are resolved offline (owner = identity)
    #[serde(default)]
    pub rpc_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EthrSettings {
    pub networks: Vec<EthrNetworkSettings>,
}

impl Default for EthrSettings {
    fn default() -> Self {
        EthrSettings {
            networks: vec![EthrNetworkSettings {
                name: Some("amoy".to_string()),
                chain_id: 80002,
                registry: "0xBC56d0883ef228b2B16420E9002Ece0A46c893F8".to_string(),
                rpc_url: None,
            }],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NearSettings {
    /// JSON-RPC node used for account key lookups
    pub rpc_url: String,
}

impl Default for NearSettings {
    fn default() -> Self {
        NearSettings {
            rpc_url: "https://rpc.testnet.near.org".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VerifierSettings {
    /// Base URL of the frontend the wallet is redirected to
    pub frontend_url: String,
    pub success_path: String,
    pub failure_path: String,
    /// Credential type a presentation must carry besides `VerifiableCredential`
    pub required_credential_type: String,
    /// Anchor every accepted presentation on the ledger
    pub anchor_presentations: bool,
    /// Size of the `/verifier/list` window
    pub recent_limit: usize,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        VerifierSettings {
            frontend_url: "http://localhost:5173".to_string(),
            success_path: "/congrats?close=1".to_string(),
            failure_path: "/failed-share?close=1".to_string(),
            required_credential_type: "AcmeAccreditation".to_string(),
            anchor_presentations: false,
            recent_limit: 30,
        }
    }
}

impl VerifierSettings {
    pub fn success_url(&self) -> String {
        join_url(&self.frontend_url, &self.success_path)
    }

    pub fn failure_url(&self) -> String {
        join_url(&self.frontend_url, &self.failure_path)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// EVM JSON-RPC endpoint. Anchoring is disabled when unset.
    pub rpc_url: Option<String>,
    /// Hex secret of the submitting account
    pub private_key: Option<String>,
    /// Address of the anchoring registry contract
    pub contract_address: Option<String>,
    pub gas_limit: u64,
    pub confirmations: usize,
    /// `{hash}` is replaced by the transaction hash
    pub explorer_tx_url: String,
    pub secondary_explorer_tx_url: String,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            rpc_url: None,
            private_key: None,
            contract_address: None,
            gas_limit: 3_000_000,
            confirmations: 1,
            explorer_tx_url: "https://amoy.polygonscan.com/tx/{hash}".to_string(),
            secondary_explorer_tx_url: "https://www.oklink.com/amoy/tx/{hash}".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: "anchor.db".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from the optional config file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("ANCHOR_CONFIG").unwrap_or_else(|_| "config/default".to_string());
        Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix("ANCHOR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins"),
            )
            .build()?
            .try_deserialize()
    }

    /// Issuer URI of profile `name`: `<public base>/issuer/<name>`.
    pub fn issuer_uri(&self, name: &str) -> String {
        join_url(&self.server.public_base_url, &format!("/issuer/{}", name))
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.issuer.name, "melon_university");
        assert_eq!(settings.ethr.networks[0].chain_id, 80002);
        assert_eq!(settings.ledger.gas_limit, 3_000_000);
        assert_eq!(settings.verifier.recent_limit, 30);
        assert_eq!(settings.near.rpc_url, "https://rpc.testnet.near.org");
    }

    #[test]
    fn test_redirect_urls_join_cleanly() {
        let verifier = VerifierSettings {
            frontend_url: "https://shop.example/".into(),
            ..Default::default()
        };
        assert_eq!(verifier.success_url(), "https://shop.example/congrats?close=1");
        assert_eq!(verifier.failure_url(), "https://shop.example/failed-share?close=1");
    }

    #[test]
    fn test_issuer_uri() {
        let mut settings = Settings::default();
        settings.server.public_base_url = "https://api.example//".into();
        assert_eq!(settings.issuer_uri("melon_university"), "https://api.example/issuer/melon_university");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(
                "[verifier]\nanchor_presentations = true\n[ledger]\ngas_limit = 42\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert!(settings.verifier.anchor_presentations);
        assert_eq!(settings.verifier.success_path, "/congrats?close=1");
        assert_eq!(settings.ledger.gas_limit, 42);
        assert_eq!(settings.ledger.confirmations, 1);
    }
}
