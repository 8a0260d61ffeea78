mod auth;
mod error;
mod transfers;

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{any, get, post};
use axum::{Json, Router};
use eyre::WrapErr;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};

use kinscribe_core::{Address, NetworkId, TransferOrchestrator};

use self::transfers::SessionEntry;

// ==============================================================================
// Application State
// ==============================================================================

pub struct AppState {
    pub orchestrator: TransferOrchestrator,
    /// P2PK address of the signing key; funds every transfer.
    pub sender: Address,
    pub network: NetworkId,
    pub api_token: String,
    pub sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

impl AppState {
    pub fn new(
        orchestrator: TransferOrchestrator,
        sender: Address,
        api_token: String,
    ) -> Self {
        Self {
            network: orchestrator.config().network,
            orchestrator,
            sender,
            api_token,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

type SharedState = Arc<AppState>;

// ==============================================================================
// Router
// ==============================================================================

pub fn build_router(state: AppState, origin: &str) -> eyre::Result<Router> {
    // Only reflect the allowed origin when the request's Origin header
    // actually matches.
    let allowed: axum::http::HeaderValue = origin
        .parse()
        .wrap_err_with(|| format!("invalid origin header value `{origin}`"))?;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |request_origin: &axum::http::HeaderValue, _| *request_origin == allowed,
        ))
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::HeaderName::from_static(auth::API_TOKEN_HEADER),
        ]);

    let shared = Arc::new(state);

    let public_api = Router::new().route("/api/v1/health", get(health));

    // Transfer requests are a few short strings.
    const TRANSFER_BODY_LIMIT: usize = 16 * 1024;

    let protected_api = Router::new()
        .route(
            "/api/v1/transfers",
            get(transfers::list_transfers).post(transfers::create_transfer),
        )
        .route("/api/v1/transfers/{session_id}", get(transfers::get_transfer))
        .route(
            "/api/v1/transfers/{session_id}/cancel",
            post(transfers::cancel_transfer),
        )
        .route(
            "/api/v1/transfers/{session_id}/resume",
            post(transfers::resume_transfer),
        )
        .layer(DefaultBodyLimit::max(TRANSFER_BODY_LIMIT));

    Ok(Router::new()
        .merge(public_api)
        .merge(protected_api)
        .route("/api", any(api_not_found))
        .route("/api/{*path}", any(api_not_found))
        .layer(cors)
        .with_state(shared))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn api_not_found() -> error::AppError {
    error::AppError::NotFound("API route not found".to_string())
}
