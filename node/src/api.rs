//! # REST API
//!
//! Builds the axum router that exposes the authenticator over HTTP. All
//! endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path            | Description                              |
//! |--------|-----------------|------------------------------------------|
//! | GET    | `/health`       | Liveness probe                           |
//! | POST   | `/decrypt-seed` | Unseal and persist a delivered secret    |
//! | GET    | `/generate-2fa` | Current code and seconds it stays valid  |
//! | POST   | `/verify-2fa`   | Check a code against the verify window   |
//! | GET    | `/metrics`      | Prometheus exposition                    |
//!
//! ## Errors
//!
//! Failures come back as `{"error": "...", "kind": "..."}` where `kind` is
//! [`KeywardError::kind`]. Bad request data is a 400; everything the caller
//! can't fix (nothing provisioned yet, wrong key, unreadable store) is a 500.

use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use keyward_protocol::authenticator::{Authenticator, Clock, GeneratedCode, Provisioner};
use keyward_protocol::config::TotpPolicy;
use keyward_protocol::crypto::PrivateKey;
use keyward_protocol::error::KeywardError;
use keyward_protocol::store::SecretStore;

use crate::metrics::{self, SharedMetrics};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

pub type SharedStore = Arc<dyn SecretStore>;
pub type SharedClock = Arc<dyn Clock>;
pub type ServiceAuthenticator = Authenticator<SharedStore, SharedClock>;

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub provisioner: Arc<Provisioner<SharedStore>>,
    pub authenticator: Arc<ServiceAuthenticator>,
    /// Key that delivered secrets are sealed to. Loaded once at startup.
    pub private_key: Arc<PrivateKey>,
    pub metrics: SharedMetrics,
}

impl AppState {
    pub fn new(
        store: SharedStore,
        clock: SharedClock,
        private_key: PrivateKey,
        policy: TotpPolicy,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            provisioner: Arc::new(Provisioner::new(Arc::clone(&store))),
            authenticator: Arc::new(Authenticator::with_clock(store, policy, clock)),
            private_key: Arc::new(private_key),
            metrics,
        }
    }
}

impl FromRef<AppState> for SharedMetrics {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.metrics)
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/decrypt-seed", post(decrypt_seed_handler))
        .route("/generate-2fa", get(generate_handler))
        .route("/verify-2fa", post(verify_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body of `POST /decrypt-seed`.
#[derive(Debug, Deserialize)]
pub struct DecryptSeedRequest {
    /// Base64 RSA-OAEP ciphertext. Absent and empty are both "missing".
    #[serde(default)]
    pub encrypted_seed: String,
}

/// Body of `POST /verify-2fa`.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
}

/// Error payload returned on any failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

// ---------------------------------------------------------------------------
// Error Mapping
// ---------------------------------------------------------------------------

/// A [`KeywardError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    kind: &'static str,
}

impl ApiError {
    /// Mapping for failures that originate in the persisted secret rather
    /// than the request. A corrupt store is the server's problem.
    fn stored(err: KeywardError) -> Self {
        match err {
            KeywardError::Format(_) => {
                tracing::error!(error = %err, "persisted secret is unreadable");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    error: "Stored seed is invalid".into(),
                    kind: err.kind(),
                }
            }
            other => other.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: message.into(),
            kind: "internal",
        }
    }
}

impl From<KeywardError> for ApiError {
    fn from(err: KeywardError) -> Self {
        let kind = err.kind();
        let (status, error) = match &err {
            KeywardError::MissingInput(field) => {
                (StatusCode::BAD_REQUEST, format!("Missing {field}"))
            }
            KeywardError::Format(_) => (StatusCode::BAD_REQUEST, err.to_string()),
            KeywardError::NotProvisioned => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Seed not decrypted yet".to_string(),
            ),
            KeywardError::Crypto(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Decryption failed".to_string(),
            ),
            KeywardError::Storage(_) => {
                tracing::error!(error = %err, "secret store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Secret storage unavailable".to_string(),
                )
            }
        };
        Self {
            status,
            error,
            kind,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: rejection.body_text(),
            kind: "format",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.error,
            kind: self.kind.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the process is alive.
///
/// Deliberately does not look at the store; an unprovisioned service is
/// still healthy.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `POST /decrypt-seed` — unseal `encrypted_seed` with the service key and
/// replace the persisted secret. Nothing is written on failure.
async fn decrypt_seed_handler(
    State(state): State<AppState>,
    payload: Result<Json<DecryptSeedRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(req) = payload?;
    let AppState {
        provisioner,
        private_key,
        metrics,
        ..
    } = state;

    // RSA private-key work stays off the async workers.
    let outcome =
        tokio::task::spawn_blocking(move || provisioner.provision(&req.encrypted_seed, &private_key))
            .await
            .map_err(|e| ApiError::internal(format!("provisioning task failed: {e}")))?;

    let label = match &outcome {
        Ok(()) => "ok",
        Err(e) => e.kind(),
    };
    metrics.provisioning_total.with_label_values(&[label]).inc();

    if let Err(e) = &outcome {
        tracing::warn!(kind = e.kind(), "provisioning rejected");
    }
    outcome?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /generate-2fa` — the code for the current 30-second bucket.
///
/// The store may hit the filesystem, so reads run on the blocking pool.
async fn generate_handler(
    State(state): State<AppState>,
) -> Result<Json<GeneratedCode>, ApiError> {
    let authenticator = Arc::clone(&state.authenticator);
    let generated = tokio::task::spawn_blocking(move || authenticator.current_code())
        .await
        .map_err(|e| ApiError::internal(format!("code task failed: {e}")))?
        .map_err(ApiError::stored)?;
    state.metrics.codes_generated_total.inc();
    Ok(Json(generated))
}

/// `POST /verify-2fa` — `{"valid": bool}`. A malformed code is simply not
/// valid; only an empty one is a client error.
async fn verify_handler(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let Json(req) = payload?;
    let authenticator = Arc::clone(&state.authenticator);
    let valid = tokio::task::spawn_blocking(move || authenticator.verify(&req.code))
        .await
        .map_err(|e| ApiError::internal(format!("verification task failed: {e}")))?
        .map_err(ApiError::stored)?;
    state.metrics.record_verification(valid);
    Ok(Json(VerifyResponse { valid }))
}
