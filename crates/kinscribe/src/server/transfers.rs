use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use kinscribe_core::address::parse_address_for_network;
use kinscribe_core::inscription::{parse_token_amount, Operation, DEFAULT_TOKEN_DECIMALS};
use kinscribe_core::transfer::{FailureReason, SessionState, TransferHandle};
use kinscribe_core::{InscriptionPayload, TransferRequest, TransferSession};

use super::auth::check_auth;
use super::error::{map_core_error, AppError};
use super::SharedState;

/// A session tracked by the server.
pub struct SessionEntry {
    pub handle: TransferHandle,
    pub created_at: String,
}

// ==============================================================================
// DTOs
// ==============================================================================

#[derive(Deserialize)]
pub(super) struct CreateTransferRequest {
    to: String,
    ticker: String,
    /// Human-readable token amount, e.g. `"12.5"`.
    amount: String,
    decimals: Option<u8>,
}

#[derive(Serialize)]
pub(super) struct SessionCreated {
    session_id: String,
}

#[derive(Serialize)]
pub(super) struct SessionView {
    session_id: String,
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<FailureReason>,
    running: bool,
    sender: String,
    script_address: String,
    ticker: String,
    op: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<String>,
    commit_tx_id: Option<String>,
    reveal_tx_id: Option<String>,
    attempts: u32,
    last_error: Option<String>,
    created_at: String,
}

#[derive(Serialize)]
pub(super) struct SessionList {
    sessions: Vec<SessionView>,
}

impl SessionView {
    fn new(session: &TransferSession, running: bool, created_at: &str) -> Self {
        let (amount, to) = match &session.payload.operation {
            Operation::Transfer { amount, recipient } => {
                (Some(amount.clone()), Some(recipient.to_string()))
            }
            Operation::Mint { recipient } => (None, recipient.as_ref().map(|a| a.to_string())),
        };
        let failure = match &session.state {
            SessionState::Failed(reason) => Some(reason.clone()),
            _ => None,
        };
        Self {
            session_id: session.id.to_string(),
            state: session.state.name(),
            failure,
            running,
            sender: session.sender.to_string(),
            script_address: session.address.to_string(),
            ticker: session.payload.ticker.clone(),
            op: session.payload.operation.name(),
            amount,
            to,
            commit_tx_id: session.commit_tx_id.map(|id| id.to_string()),
            reveal_tx_id: session.reveal_tx_id.map(|id| id.to_string()),
            attempts: session.attempts,
            last_error: session.last_error.clone(),
            created_at: created_at.to_owned(),
        }
    }

    fn of(entry: &SessionEntry) -> Self {
        Self::new(
            &entry.handle.snapshot(),
            !entry.handle.is_finished(),
            &entry.created_at,
        )
    }
}

// ==============================================================================
// Handlers
// ==============================================================================

pub(super) async fn create_transfer(
    State(state): State<SharedState>,
    headers: HeaderMap,
    req: Result<Json<CreateTransferRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionCreated>), AppError> {
    check_auth(&state.api_token, &headers)?;
    let Json(req) = req.map_err(|e| AppError::BadRequest(e.to_string()))?;

    let recipient = parse_address_for_network(req.to.trim(), state.network).map_err(map_core_error)?;
    let amount = parse_token_amount(&req.amount, req.decimals.unwrap_or(DEFAULT_TOKEN_DECIMALS))
        .map_err(map_core_error)?;
    let request = TransferRequest {
        sender: state.sender.clone(),
        payload: InscriptionPayload::transfer(req.ticker.trim(), amount, recipient),
    };

    let created_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| AppError::Internal(format!("format session timestamp: {e}")))?;
    let handle = state.orchestrator.start(request).map_err(map_core_error)?;
    let session_id = handle.session_id().to_string();
    tracing::info!(session_id = %session_id, ticker = %req.ticker, "transfer started");

    state
        .sessions
        .write()
        .await
        .insert(session_id.clone(), SessionEntry { handle, created_at });

    Ok((StatusCode::ACCEPTED, Json(SessionCreated { session_id })))
}

pub(super) async fn list_transfers(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<SessionList>, AppError> {
    check_auth(&state.api_token, &headers)?;

    let sessions = state.sessions.read().await;
    let mut views: Vec<SessionView> = sessions.values().map(SessionView::of).collect();

    // RFC3339 UTC strings are lexicographically sortable by recency.
    views.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });

    Ok(Json(SessionList { sessions: views }))
}

pub(super) async fn get_transfer(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    check_auth(&state.api_token, &headers)?;

    let sessions = state.sessions.read().await;
    let entry = sessions.get(&session_id).ok_or_else(|| not_found(&session_id))?;
    Ok(Json(SessionView::of(entry)))
}

pub(super) async fn cancel_transfer(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    check_auth(&state.api_token, &headers)?;

    let sessions = state.sessions.read().await;
    let entry = sessions.get(&session_id).ok_or_else(|| not_found(&session_id))?;
    if entry.handle.is_finished() {
        return Err(AppError::Conflict(format!(
            "session {session_id} has already finished"
        )));
    }
    entry.handle.cancel();
    tracing::info!(session_id = %session_id, "cancellation requested");
    Ok(Json(SessionView::of(entry)))
}

pub(super) async fn resume_transfer(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<(StatusCode, Json<SessionCreated>), AppError> {
    check_auth(&state.api_token, &headers)?;

    let mut sessions = state.sessions.write().await;
    let entry = sessions
        .get_mut(&session_id)
        .ok_or_else(|| not_found(&session_id))?;
    if !entry.handle.is_finished() {
        return Err(AppError::Conflict(format!(
            "session {session_id} is still running"
        )));
    }

    let session = entry.handle.snapshot();
    entry.handle = state.orchestrator.resume(session).map_err(map_core_error)?;

    Ok((StatusCode::ACCEPTED, Json(SessionCreated { session_id })))
}

fn not_found(session_id: &str) -> AppError {
    AppError::NotFound(format!("session not found: {session_id}"))
}
