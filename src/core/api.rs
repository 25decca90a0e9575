//! HTTP API for SmartCAPTCHA
//!
//! Endpoints:
//! - GET  /              - Banner
//! - GET  /health        - Health check (+ model status)
//! - POST /verify        - Score a feature map, maybe issue a proof token
//! - POST /verify/events - Same, from raw pointer telemetry
//! - POST /validate      - Redeem a proof token (single use)

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, Method},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::CorsConfig;
use crate::core::{extract_features, VerificationService};
use crate::error::{ValidationError, VerifyError};
use crate::types::{InteractionSession, RawFeatures, ReasonCode, VerificationResult, Verdict};

/// App state
#[derive(Debug)]
pub struct AppState {
    pub service: Arc<VerificationService>,
    pub started_at: DateTime<Utc>,
}

/// Verify response
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub verdict: Verdict,
    pub is_human: bool,
    pub confidence: f64,
    /// Empty when no token was issued
    pub token: String,
    pub reason: ReasonCode,
}

impl From<VerificationResult> for VerifyResponse {
    fn from(result: VerificationResult) -> Self {
        Self {
            verdict: result.verdict,
            is_human: result.is_human,
            confidence: result.confidence,
            token: result.token,
            reason: result.reason,
        }
    }
}

/// Validate token request
#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub token: String,
}

/// Validate token response
#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub model_digest: Option<String>,
    pub version: String,
    pub tokens_tracked: usize,
    pub uptime_secs: i64,
}

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: String,
}

impl IntoResponse for VerifyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code().to_string(),
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Unparseable bodies, wrong content type, non-object payloads: all 400
impl From<JsonRejection> for VerifyError {
    fn from(rejection: JsonRejection) -> Self {
        VerifyError::Validation(ValidationError::MalformedBody(rejection.body_text()))
    }
}

/// Create the API router
pub fn create_router(service: Arc<VerificationService>, cors: &CorsConfig) -> Router {
    let state = Arc::new(AppState {
        service,
        started_at: Utc::now(),
    });

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/verify", post(verify))
        .route("/verify/events", post(verify_events))
        .route("/validate", post(validate))
        .layer(cors_layer(cors))
        .with_state(state)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    if config.is_wildcard() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let origins: Vec<HeaderValue> = config
        .allow_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Banner endpoint
async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "SmartCAPTCHA backend running" }))
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let service = &state.service;
    Json(HealthResponse {
        status: "ok".to_string(),
        model_loaded: service.model_loaded(),
        model_digest: service.model_digest().map(str::to_string),
        version: crate::VERSION.to_string(),
        tokens_tracked: service.tokens().len(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

/// Score a feature map
async fn verify(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RawFeatures>, JsonRejection>,
) -> Result<Json<VerifyResponse>, VerifyError> {
    let Json(raw) = payload?;
    let service = state.service.clone();
    let result = run_blocking(move || service.verify(&raw)).await?;
    Ok(Json(result.into()))
}

/// Score raw pointer telemetry
async fn verify_events(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<InteractionSession>, JsonRejection>,
) -> Result<Json<VerifyResponse>, VerifyError> {
    let Json(session) = payload?;
    let service = state.service.clone();
    let result = run_blocking(move || {
        let features = extract_features(&session)?;
        service.verify_features_at(&features, Utc::now())
    })
    .await?;
    Ok(Json(result.into()))
}

/// Redeem a proof token
async fn validate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<ValidateResponse>, VerifyError> {
    let Json(req) = payload?;
    Ok(Json(ValidateResponse {
        valid: state.service.redeem(&req.token),
    }))
}

/// Classifier inference is CPU-bound; keep it off the reactor threads
async fn run_blocking<F>(f: F) -> Result<VerificationResult, VerifyError>
where
    F: FnOnce() -> Result<VerificationResult, VerifyError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| VerifyError::Internal(format!("verification task failed: {e}")))?
}

/// Periodic token sweep; `None` when disabled
pub fn spawn_sweeper(service: Arc<VerificationService>, every_secs: u64) -> Option<JoinHandle<()>> {
    if every_secs == 0 {
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(every_secs));
        // first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = service.tokens().cleanup(Utc::now());
            tracing::debug!(removed, remaining = service.tokens().len(), "token sweeper pass");
        }
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

/// Run the API server until ctrl-c
pub async fn run_server(
    addr: &str,
    service: Arc<VerificationService>,
    cors: &CorsConfig,
    sweep_interval_secs: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let router = create_router(service.clone(), cors);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let sweeper = spawn_sweeper(service.clone(), sweep_interval_secs);

    tracing::info!(%addr, model_loaded = service.model_loaded(), "SmartCAPTCHA API running");
    tracing::info!("  GET  /              - Banner");
    tracing::info!("  GET  /health        - Health check");
    tracing::info!("  POST /verify        - Verify feature map");
    tracing::info!("  POST /verify/events - Verify raw telemetry");
    tracing::info!("  POST /validate      - Redeem proof token");

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    // tokens are in-memory only; outstanding ones die with the process
    tracing::info!(outstanding = service.tokens().len(), "server stopped");

    served?;
    Ok(())
}
