// src/services/api_server.rs
//! HTTP API for issuance, presentation verification and ledger anchoring.
//!
//! The API is built using Axum and includes endpoints for:
//! - OpenID4VCI issuer metadata, credential offers and credential issuance
//! - The wallet callback that verifies a presentation and redirects the user
//! - Listing verified presentations and subscribing to new ones over WebSocket
//! - Anchoring records on the ledger and querying the local mirror

use crate::blockchain::anchoring::AnchoringClient;
use crate::errors::{AnchorError, AuthError, IssuanceError, LedgerError, StorageError};
use crate::models::record::{RegistryEntry, TransactionCriteria};
use crate::models::request::CredentialRequest;
use crate::services::auth::BearerAuth;
use crate::services::credential_issuer::{CredentialIssuer, REQUEST_NOT_VALID};
use crate::services::notifications::Notification;
use crate::services::verifier::VerifierService;
use crate::storage::database::Database;
use crate::storage::transactions;
use crate::utils::context::RequestContext;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Json, Path, Query, State,
    },
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Error returned by handlers.
///
/// Verification, ledger and internal failures are logged in full and answered
/// with a generic description, so signer material and internals never reach
/// the caller.
#[derive(Error, Debug)]
pub enum AppError {
    /// OpenID4VCI `invalid_credential_request` (400).
    #[error("{0}")]
    InvalidCredentialRequest(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Proof or presentation rejected (400).
    #[error("verification failed: {0}")]
    Verification(String),

    /// Ledger unreachable or the submission failed (502).
    #[error("ledger error: {0}")]
    Ledger(String),

    /// Ledger anchoring is not configured (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::InvalidCredentialRequest(_) => (StatusCode::BAD_REQUEST, "invalid_credential_request"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "invalid_token"),
            Self::Verification(_) => (StatusCode::BAD_REQUEST, "invalid_proof"),
            Self::Ledger(_) => (StatusCode::BAD_GATEWAY, "ledger_error"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error"),
        }
    }

    /// Attaches the request's correlation id to the response.
    pub fn correlated(self, ctx: &RequestContext) -> ApiError {
        ApiError {
            error: self,
            correlation_id: ctx.correlation_id.clone(),
        }
    }
}

/// [`AppError`] plus the correlation id of the failed request.
#[derive(Debug)]
pub struct ApiError {
    pub error: AppError,
    pub correlation_id: String,
}

/// JSON error body.
#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub error: String,
    pub error_description: String,
    pub correlation_id: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.error.status_and_code();
        let description = match &self.error {
            AppError::Verification(_) => "The proof could not be verified".to_string(),
            AppError::Ledger(_) => "The ledger request failed".to_string(),
            AppError::Internal(_) => "An internal error occurred".to_string(),
            AppError::InvalidCredentialRequest(m) | AppError::NotFound(m) => m.clone(),
            other => other.to_string(),
        };

        match &self.error {
            AppError::Internal(_) | AppError::Ledger(_) => {
                error!("api: {} - {}", self.correlation_id, self.error)
            }
            AppError::Verification(_) | AppError::Unauthorized(_) => {
                warn!("api: {} - {}", self.correlation_id, self.error)
            }
            _ => debug!("api: {} - {}", self.correlation_id, self.error),
        }

        let body = ErrorBody {
            error: code.to_string(),
            error_description: description,
            correlation_id: self.correlation_id,
        };
        (status, Json(body)).into_response()
    }
}

impl From<IssuanceError> for AppError {
    fn from(err: IssuanceError) -> Self {
        match err {
            IssuanceError::Validation(e) => Self::InvalidCredentialRequest(format!("{} ({})", e, REQUEST_NOT_VALID)),
            IssuanceError::NotFound(m) => Self::NotFound(m),
            IssuanceError::ProofInvalid(e) => Self::Verification(e.to_string()),
            IssuanceError::SigningFailed(m) => Self::Internal(m),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        Self::Unauthorized(err.to_string())
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        Self::Ledger(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<AnchorError> for AppError {
    fn from(err: AnchorError) -> Self {
        match err {
            AnchorError::Invalid(m) => Self::BadRequest(m),
            AnchorError::Ledger(e) => e.into(),
            AnchorError::Storage(e) => e.into(),
        }
    }
}

/// Query of the wallet callback.
#[derive(Serialize, Deserialize, Debug, Default)]
struct VpTokenQuery {
    #[serde(default)]
    vp_token: Option<String>,
}

/// Request payload for anchoring a record
#[derive(Serialize, Deserialize, Debug, Default)]
struct AddRecordRequest {
    #[serde(default)]
    did1: Option<String>,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    did2: Option<String>,
}

/// One on-chain entry, parsed when it follows the entry grammar
#[derive(Serialize, Deserialize, Debug)]
struct LedgerRecordResponse {
    entry: String,
    record: Option<RegistryEntry>,
}

/// API server state containing all service dependencies
#[derive(Clone)]
pub struct ApiServer {
    /// Service for issuing credentials
    credential_issuer: Arc<CredentialIssuer>,

    /// Service for verifying presentations
    verifier: Arc<VerifierService>,

    /// Local mirror of ledger transactions
    db: Arc<Database>,

    /// Bearer authentication of credential requests
    auth: Arc<BearerAuth>,

    /// Ledger anchoring, absent when no ledger is configured
    anchoring: Option<Arc<AnchoringClient>>,

    /// Redirect targets of the wallet callback
    success_url: String,
    failure_url: String,

    /// Allowed CORS origins; any origin when empty
    cors_origins: Vec<String>,
}

impl ApiServer {
    /// Creates a new instance of the API server
    ///
    /// # Arguments
    /// * `credential_issuer` - Service for credential issuance
    /// * `verifier` - Service for presentation verification
    /// * `db` - Database holding the transaction mirror
    /// * `auth` - Bearer authentication of the credential endpoint
    /// * `anchoring` - Ledger anchoring client, if a ledger is configured
    /// * `success_url` / `failure_url` - Wallet callback redirect targets
    /// * `cors_origins` - Allowed browser origins
    pub fn new(
        credential_issuer: Arc<CredentialIssuer>,
        verifier: Arc<VerifierService>,
        db: Arc<Database>,
        auth: BearerAuth,
        anchoring: Option<Arc<AnchoringClient>>,
        success_url: String,
        failure_url: String,
        cors_origins: Vec<String>,
    ) -> Self {
        ApiServer {
            credential_issuer,
            verifier,
            db,
            auth: Arc::new(auth),
            anchoring,
            success_url,
            failure_url,
            cors_origins,
        }
    }

    /// Configures all API routes
    pub fn router(&self) -> Router {
        Router::new()
            .route(
                "/issuer/:name/.well-known/openid-credential-issuer",
                get(Self::issuer_metadata_handler),
            )
            .route("/issuer/:name/credential-offer", get(Self::credential_offer_handler))
            .route("/issuer/:name/credential/issue", post(Self::issue_credential_handler))
            .route("/verifier/oauth2/cb/vpToken", get(Self::vp_token_handler))
            .route("/verifier/list", get(Self::list_verified_handler))
            .route("/verifier/ws", get(Self::notifications_handler))
            .route("/transactions", get(Self::find_transactions_handler))
            .route("/add-record", post(Self::add_record_handler))
            .route("/ledger/records", get(Self::ledger_records_handler))
            .layer(self.cors())
            .with_state(Arc::new(self.clone()))
    }

    /// Starts the API server and begins listening for requests
    ///
    /// # Arguments
    /// * `addr` - Socket address to bind to (e.g., "0.0.0.0:3000")
    pub async fn run(&self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("api: listening on http://{}", addr);
        axum::serve(listener, self.router()).await
    }

    fn cors(&self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .cors_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("api: ignoring invalid CORS origin {}", origin);
                    None
                }
            })
            .collect();
        let layer = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any);
        if origins.is_empty() {
            layer.allow_origin(Any)
        } else {
            layer.allow_origin(AllowOrigin::list(origins))
        }
    }

    fn require_anchoring(&self) -> Result<&AnchoringClient, AppError> {
        self.anchoring
            .as_deref()
            .ok_or_else(|| AppError::ServiceUnavailable("ledger anchoring is not configured".to_string()))
    }

    // =====================
    // Issuer Handlers
    // =====================

    /// Returns the OpenID4VCI issuer metadata
    ///
    /// # Endpoint
    /// GET /issuer/:name/.well-known/openid-credential-issuer
    ///
    /// # Responses
    /// - 200 OK: Issuer URI, authorization server, credential endpoint and
    ///   supported credentials with display metadata
    /// - 404 Not Found: Unknown issuer
    async fn issuer_metadata_handler(
        Path(name): Path<String>,
        headers: HeaderMap,
        State(state): State<Arc<ApiServer>>,
    ) -> Result<Response, ApiError> {
        let ctx = RequestContext::from_headers(&headers);
        let metadata = state
            .credential_issuer
            .registry()
            .metadata(&name)
            .map_err(|e| AppError::from(e).correlated(&ctx))?;
        Ok(Json(metadata).into_response())
    }

    /// Returns the credential offer of an issuer
    ///
    /// # Endpoint
    /// GET /issuer/:name/credential-offer
    ///
    /// # Responses
    /// - 200 OK: Offered credential types, format, trust framework and grants
    /// - 404 Not Found: Unknown issuer
    async fn credential_offer_handler(
        Path(name): Path<String>,
        headers: HeaderMap,
        State(state): State<Arc<ApiServer>>,
    ) -> Result<Response, ApiError> {
        let ctx = RequestContext::from_headers(&headers);
        let offer = state
            .credential_issuer
            .registry()
            .offer(&name)
            .map_err(|e| AppError::from(e).correlated(&ctx))?;
        Ok(Json(offer).into_response())
    }

    /// Issues a credential to the authenticated holder
    ///
    /// # Endpoint
    /// POST /issuer/:name/credential/issue
    ///
    /// # Request Body
    /// OpenID4VCI credential request with a `jwt` proof of possession
    ///
    /// # Responses
    /// - 200 OK: `{ format, credential }`
    /// - 400 Bad Request: Invalid request or rejected proof
    /// - 401 Unauthorized: Missing or invalid bearer token
    /// - 404 Not Found: Unknown issuer
    /// - 500 Internal Server Error: Signing failed
    async fn issue_credential_handler(
        Path(name): Path<String>,
        headers: HeaderMap,
        State(state): State<Arc<ApiServer>>,
        Json(request): Json<CredentialRequest>,
    ) -> Result<Response, ApiError> {
        let ctx = RequestContext::from_headers(&headers);
        let identity = state
            .auth
            .authenticate(&headers)
            .map_err(|e| AppError::from(e).correlated(&ctx))?;
        let issued = state
            .credential_issuer
            .issue_credential(&ctx, &name, &request, &identity)
            .await
            .map_err(|e| AppError::from(e).correlated(&ctx))?;
        Ok(Json(issued).into_response())
    }

    // =====================
    // Verifier Handlers
    // =====================

    /// Wallet callback carrying the presentation
    ///
    /// # Endpoint
    /// GET /verifier/oauth2/cb/vpToken?vp_token=...
    ///
    /// # Responses
    /// - 302 Found: To the success URL when the presentation was accepted,
    ///   otherwise to the failure URL. The reason is only logged.
    async fn vp_token_handler(
        Query(query): Query<VpTokenQuery>,
        headers: HeaderMap,
        State(state): State<Arc<ApiServer>>,
    ) -> Response {
        let ctx = RequestContext::from_headers(&headers);
        let token = query.vp_token.unwrap_or_default();
        let target = if token.trim().is_empty() {
            warn!("verify_presentation: {} - callback without vp_token", ctx.correlation_id);
            &state.failure_url
        } else {
            match state.verifier.evaluate(&ctx, token.trim()).await {
                Ok(_) => &state.success_url,
                Err(e) => {
                    warn!("verify_presentation: {} - redirecting to failure: {}", ctx.correlation_id, e);
                    &state.failure_url
                }
            }
        };
        (StatusCode::FOUND, [(header::LOCATION, target.clone())]).into_response()
    }

    /// Lists the most recently verified presentations
    ///
    /// # Endpoint
    /// GET /verifier/list
    ///
    /// # Responses
    /// - 200 OK: Sanitized records, newest first
    /// - 500 Internal Server Error: Store failure
    async fn list_verified_handler(
        headers: HeaderMap,
        State(state): State<Arc<ApiServer>>,
    ) -> Result<Response, ApiError> {
        let ctx = RequestContext::from_headers(&headers);
        let records = state
            .verifier
            .list()
            .map_err(|e| AppError::from(e).correlated(&ctx))?;
        Ok(Json(records).into_response())
    }

    /// Subscribes to newly verified presentations
    ///
    /// # Endpoint
    /// GET /verifier/ws (WebSocket)
    ///
    /// Every verified presentation is pushed as
    /// `{ "event": "vp_inserted", "data": record }`. Nothing is replayed.
    async fn notifications_handler(ws: WebSocketUpgrade, State(state): State<Arc<ApiServer>>) -> Response {
        let notifications = state.verifier.hub().subscribe();
        ws.on_upgrade(move |socket| Self::stream_notifications(socket, notifications))
    }

    async fn stream_notifications(socket: WebSocket, mut notifications: broadcast::Receiver<Notification>) {
        let (mut sender, mut receiver) = socket.split();
        debug!("notifications: subscriber connected");

        loop {
            tokio::select! {
                notification = notifications.recv() => match notification {
                    Ok(notification) => {
                        let frame = match serde_json::to_string(&notification) {
                            Ok(frame) => frame,
                            Err(e) => {
                                warn!("notifications: failed to serialize frame: {}", e);
                                continue;
                            }
                        };
                        if sender.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("notifications: subscriber lagged, skipped {} frames", skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                incoming = receiver.next() => match incoming {
                    Some(Ok(Message::Ping(payload))) => {
                        if sender.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }
        debug!("notifications: subscriber disconnected");
    }

    // =====================
    // Ledger Handlers
    // =====================

    /// Queries the transaction mirror
    ///
    /// # Endpoint
    /// GET /transactions?recordId=&did1=&did2=&transactionHash=
    ///
    /// # Responses
    /// - 200 OK: `{ success, count, data }`, newest first
    /// - 500 Internal Server Error: Store failure
    /// - 503 Service Unavailable: No ledger configured
    async fn find_transactions_handler(
        Query(criteria): Query<TransactionCriteria>,
        headers: HeaderMap,
        State(state): State<Arc<ApiServer>>,
    ) -> Result<Response, ApiError> {
        let ctx = RequestContext::from_headers(&headers);
        let criteria = TransactionCriteria {
            record_id: non_empty(criteria.record_id),
            did1: non_empty(criteria.did1),
            did2: non_empty(criteria.did2),
            transaction_hash: non_empty(criteria.transaction_hash),
        };
        let records = state
            .db
            .with_conn(|c| transactions::find(c, &criteria))
            .map_err(|e| AppError::from(e).correlated(&ctx))?;
        Ok(Json(json!({
            "success": true,
            "count": records.len(),
            "data": records,
        }))
        .into_response())
    }

    /// Anchors a record on the ledger and mirrors it
    ///
    /// # Endpoint
    /// POST /add-record
    ///
    /// # Request Body
    /// `{ did1, hash, did2 }`
    ///
    /// # Responses
    /// - 200 OK: `{ success, data }` with the mirrored transaction
    /// - 400 Bad Request: Missing field
    /// - 502 Bad Gateway: Submission failed
    /// - 503 Service Unavailable: No ledger configured
    async fn add_record_handler(
        headers: HeaderMap,
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<AddRecordRequest>,
    ) -> Result<Response, ApiError> {
        let ctx = RequestContext::from_headers(&headers);
        let anchoring = state.require_anchoring().map_err(|e| e.correlated(&ctx))?;
        let record = anchoring
            .anchor(
                &ctx,
                payload.did1.as_deref().unwrap_or_default(),
                payload.hash.as_deref().unwrap_or_default(),
                payload.did2.as_deref().unwrap_or_default(),
            )
            .await
            .map_err(|e| AppError::from(e).correlated(&ctx))?;
        Ok(Json(json!({
            "success": true,
            "data": record,
        }))
        .into_response())
    }

    /// Reads the raw on-chain registry
    ///
    /// # Endpoint
    /// GET /ledger/records
    ///
    /// # Responses
    /// - 200 OK: `{ success, count, data: [{ entry, record }] }` in append order
    /// - 502 Bad Gateway: Ledger query failed
    /// - 503 Service Unavailable: No ledger configured
    async fn ledger_records_handler(
        headers: HeaderMap,
        State(state): State<Arc<ApiServer>>,
    ) -> Result<Response, ApiError> {
        let ctx = RequestContext::from_headers(&headers);
        let anchoring = state.require_anchoring().map_err(|e| e.correlated(&ctx))?;
        let entries = anchoring
            .entries()
            .await
            .map_err(|e| AppError::from(e).correlated(&ctx))?;
        let data: Vec<LedgerRecordResponse> = entries
            .into_iter()
            .map(|entry| LedgerRecordResponse {
                record: RegistryEntry::parse(&entry),
                entry,
            })
            .collect();
        Ok(Json(json!({
            "success": true,
            "count": data.len(),
            "data": data,
        }))
        .into_response())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::ledger::memory::MemoryLedger;
    use crate::did::ResolverRegistry;
    use crate::jwt::signing::decode_unverified;
    use crate::jwt::verification::ProofVerifier;
    use crate::models::credential::JwtCredentialPayload;
    use crate::services::auth::tests::{bearer, SECRET};
    use crate::services::credential_issuer::tests::{proof_jwt, CHAIN};
    use crate::services::issuer_registry::{IssuerProfile, IssuerRegistry};
    use crate::services::notifications::NotificationHub;
    use crate::services::verifier::tests::vp_token;
    use crate::services::verifier::PresentationVerifier;
    use crate::settings::{IssuerDisplaySettings, LedgerSettings, Settings};
    use crate::storage::transactions::tests::record;
    use crate::utils::crypto::content_hash;
    use crate::wallet::key_management::KeyManager;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    const SUCCESS_URL: &str = "http://localhost:5173/congrats?close=1";
    const FAILURE_URL: &str = "http://localhost:5173/failed-share?close=1";

    fn server_with_ledger(with_ledger: bool) -> (ApiServer, Arc<Database>) {
        let profile = IssuerProfile::new(
            "melon_university",
            KeyManager::new(),
            CHAIN,
            "AcmeAccreditation",
            IssuerDisplaySettings::default(),
        );
        let registry = Arc::new(IssuerRegistry::new(profile, "http://localhost:3000"));
        let resolvers = Arc::new(ResolverRegistry::from_settings(&Settings::default()).unwrap());
        let proofs = ProofVerifier::new(resolvers);
        let db = Arc::new(Database::open_in_memory().unwrap());
        let anchoring = with_ledger.then(|| {
            Arc::new(AnchoringClient::new(
                Arc::new(MemoryLedger::new()),
                db.clone(),
                &LedgerSettings::default(),
            ))
        });
        let verifier = VerifierService::new(
            PresentationVerifier::new(proofs.clone(), "AcmeAccreditation"),
            db.clone(),
            Arc::new(NotificationHub::default()),
            None,
            30,
        );
        let server = ApiServer::new(
            Arc::new(CredentialIssuer::new(registry, proofs)),
            Arc::new(verifier),
            db.clone(),
            BearerAuth::new(Some(SECRET)),
            anchoring,
            SUCCESS_URL.to_string(),
            FAILURE_URL.to_string(),
            Vec::new(),
        );
        (server, db)
    }

    fn server() -> ApiServer {
        server_with_ledger(true).0
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value, authorization: Option<String>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-correlation-id", "test-correlation");
        if let Some(authorization) = authorization {
            builder = builder.header(header::AUTHORIZATION, authorization);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn issue_body(jwt: String) -> Value {
        json!({
            "types": ["VerifiableCredential", "AcmeAccreditation"],
            "format": "jwt_vc",
            "proof": {"proof_type": "jwt", "jwt": jwt}
        })
    }

    async fn issue(app: Router, holder: &KeyManager) -> String {
        let (status, body) = send(
            app,
            post_json(
                "/issuer/melon_university/credential/issue",
                issue_body(proof_jwt(holder)),
                Some(bearer("user-1", Some("Ada Lovelace"), Some("ada@example.com"))),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["credential"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_issuer_metadata_and_offer() {
        let app = server().router();
        let (status, body) = send(
            app.clone(),
            get_request("/issuer/melon_university/.well-known/openid-credential-issuer"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["credential_issuer"], "http://localhost:3000/issuer/melon_university");
        assert_eq!(body["credentials_supported"][0]["display"]["locale"], "en-US");

        let (status, body) = send(app.clone(), get_request("/issuer/default/credential-offer")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["credentials"][0]["format"], "jwt_vc");

        let (status, body) = send(app, get_request("/issuer/acme/credential-offer")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_description"], "Issuer not found: acme (E8091000)");
    }

    #[tokio::test]
    async fn test_issue_credential_to_proven_holder() {
        let app = server().router();
        let holder = KeyManager::new();
        let credential = issue(app, &holder).await;

        let payload: JwtCredentialPayload = decode_unverified(&credential).unwrap().claims().unwrap();
        assert_eq!(payload.vc.credential_subject.id, Some(holder.ethr_did(CHAIN)));
        assert_eq!(payload.vc.credential_subject.name.as_deref(), Some("Ada Lovelace"));
    }

    #[tokio::test]
    async fn test_issue_credential_errors() {
        let app = server().router();
        let holder = KeyManager::new();

        let (status, body) = send(
            app.clone(),
            post_json("/issuer/melon_university/credential/issue", issue_body(proof_jwt(&holder)), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["correlation_id"], "test-correlation");

        let mut invalid = issue_body(proof_jwt(&holder));
        invalid["proofs"] = json!({"jwt": ["a.b.c"]});
        let (status, body) = send(
            app.clone(),
            post_json(
                "/issuer/melon_university/credential/issue",
                invalid,
                Some(bearer("user-1", None, None)),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_credential_request");
        let description = body["error_description"].as_str().unwrap();
        assert!(description.contains("'proofs' not supported"));
        assert!(description.ends_with("(E8091005)"));

        let forged = proof_jwt(&KeyManager::new()).replace('.', ".x");
        let (status, body) = send(
            app,
            post_json(
                "/issuer/melon_university/credential/issue",
                issue_body(forged),
                Some(bearer("user-1", None, None)),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_proof");
        assert_eq!(body["error_description"], "The proof could not be verified");
    }

    #[tokio::test]
    async fn test_presentation_round_trip_redirects_to_success() {
        let app = server().router();
        let holder = KeyManager::new();
        let credential = issue(app.clone(), &holder).await;
        let token = vp_token(&holder, vec![credential]);

        let response = app
            .clone()
            .oneshot(get_request(&format!("/verifier/oauth2/cb/vpToken?vp_token={}", token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], SUCCESS_URL);

        let (status, body) = send(app, get_request("/verifier/list")).await;
        assert_eq!(status, StatusCode::OK);
        let records = body.as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["name"], "Ada Lovelace");
        assert_eq!(records[0]["did"], holder.ethr_did(CHAIN));
        assert_eq!(records[0]["vpHash"], content_hash(token.as_bytes()));
        assert!(records[0].get("email").is_none());
    }

    #[tokio::test]
    async fn test_rejected_presentation_redirects_to_failure() {
        let app = server().router();
        let holder = KeyManager::new();
        let token = vp_token(&holder, vec![]);

        for uri in [
            format!("/verifier/oauth2/cb/vpToken?vp_token={}", token),
            "/verifier/oauth2/cb/vpToken".to_string(),
        ] {
            let response = app.clone().oneshot(get_request(&uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::FOUND);
            assert_eq!(response.headers()[header::LOCATION], FAILURE_URL);
        }

        let (_, body) = send(app, get_request("/verifier/list")).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_add_record_and_query_mirror() {
        let app = server().router();
        let hash = content_hash(b"sale #7");
        let (status, body) = send(
            app.clone(),
            post_json(
                "/add-record",
                json!({"did1": "did:near:seller.testnet", "hash": hash, "did2": "did:near:buyer.testnet"}),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "SUCCESS");
        let record_id = body["data"]["recordId"].as_str().unwrap().to_string();

        let (status, body) = send(app.clone(), get_request(&format!("/transactions?recordId={}", record_id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["dataHash"], hash);

        let (_, body) = send(app.clone(), get_request("/transactions?did1=did:near:nobody&recordId=")).await;
        assert_eq!(body["count"], 0);

        let (status, body) = send(app, get_request("/ledger/records")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["record"]["hash"], hash);
        assert_eq!(body["data"][0]["record"]["did2"], "did:near:buyer.testnet");
    }

    #[tokio::test]
    async fn test_add_record_missing_field() {
        let app = server().router();
        let (status, body) = send(
            app,
            post_json("/add-record", json!({"did1": "did:near:a.testnet", "hash": "abc"}), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_description"], "bad request: did2 is required");
    }

    #[tokio::test]
    async fn test_ledger_routes_without_ledger() {
        let (server, db) = server_with_ledger(false);
        db.with_conn(|c| transactions::insert(c, &record("X", "0x01", "did:ethr:0xseller", "2024-01-01T00:00:00.000Z")))
            .unwrap();
        let app = server.router();

        let (status, body) = send(app.clone(), get_request("/transactions?recordId=X")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["transactionHash"], "0x01");

        let (status, _) = send(
            app.clone(),
            post_json(
                "/add-record",
                json!({"did1": "did:near:a.testnet", "hash": "a".repeat(64), "did2": "did:near:b.testnet"}),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let (status, _) = send(app, get_request("/ledger/records")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
