//! Transfer session record and its state machine.

use std::fmt;

use kaspa_consensus_core::tx::{Transaction, TransactionId};
use serde::Serialize;
use tracing::{info, warn};

use crate::address::Address;
use crate::envelope::ScriptEnvelope;
use crate::error::CoreError;
use crate::inscription::InscriptionPayload;

// ==============================================================================
// Session Id
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn random() -> Self {
        Self(hex::encode(rand::random::<[u8; 16]>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ==============================================================================
// Failure Reasons
// ==============================================================================

/// Why a session ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    InvalidPayload { message: String },
    PayloadTooLarge { len: usize, max: usize },
    UnsupportedNetwork { network: String },
    InsufficientFunds { required: u64, available: u64 },
    AnchorNotFound { attempts: u32 },
    SubmissionError { message: String },
    NodeUnavailable { message: String },
    SigningError { message: String },
    Cancelled,
}

impl FailureReason {
    /// Map a core error into the reason recorded on the session. Broadcast
    /// failures are reported as submission errors.
    pub fn from_error(err: &CoreError) -> Self {
        match err {
            CoreError::InvalidPayload(message) | CoreError::InvalidAddress(message) => {
                Self::InvalidPayload {
                    message: message.clone(),
                }
            }
            CoreError::PayloadTooLarge { len, max } => Self::PayloadTooLarge {
                len: *len,
                max: *max,
            },
            CoreError::UnsupportedNetwork(network) => Self::UnsupportedNetwork {
                network: network.clone(),
            },
            CoreError::InsufficientFunds {
                required,
                available,
            } => Self::InsufficientFunds {
                required: *required,
                available: *available,
            },
            CoreError::AnchorNotFound { attempts } => Self::AnchorNotFound {
                attempts: *attempts,
            },
            CoreError::RejectedByNode(message) => Self::SubmissionError {
                message: message.clone(),
            },
            CoreError::Signing(message) => Self::SigningError {
                message: message.clone(),
            },
            CoreError::Cancelled => Self::Cancelled,
            other => Self::NodeUnavailable {
                message: other.to_string(),
            },
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPayload { message } => write!(f, "invalid payload: {message}"),
            Self::PayloadTooLarge { len, max } => {
                write!(f, "payload too large: {len} bytes exceeds {max}")
            }
            Self::UnsupportedNetwork { network } => write!(f, "unsupported network: {network}"),
            Self::InsufficientFunds {
                required,
                available,
            } => write!(
                f,
                "insufficient funds: required {required} sompi, available {available} sompi"
            ),
            Self::AnchorNotFound { attempts } => {
                write!(f, "anchor output not found after {attempts} attempts")
            }
            Self::SubmissionError { message } => write!(f, "submission rejected: {message}"),
            Self::NodeUnavailable { message } => write!(f, "node unavailable: {message}"),
            Self::SigningError { message } => write!(f, "signing failed: {message}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Terminal failure of a transfer, carrying the partial progress made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transfer failed: {reason}")]
pub struct TransferFailure {
    pub reason: FailureReason,
    pub commit_tx_id: Option<TransactionId>,
}

// ==============================================================================
// States
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    CommitBuilding,
    CommitSubmitted,
    AwaitingAnchor,
    RevealBuilding,
    RevealSubmitted,
    Completed,
    Failed(FailureReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StateKind {
    Idle,
    CommitBuilding,
    CommitSubmitted,
    AwaitingAnchor,
    RevealBuilding,
    RevealSubmitted,
    Completed,
    Failed,
}

const VALID_TRANSITIONS: &[(StateKind, StateKind)] = &[
    (StateKind::Idle, StateKind::CommitBuilding),
    (StateKind::CommitBuilding, StateKind::CommitSubmitted),
    (StateKind::CommitSubmitted, StateKind::AwaitingAnchor),
    (StateKind::AwaitingAnchor, StateKind::RevealBuilding),
    (StateKind::RevealBuilding, StateKind::RevealSubmitted),
    (StateKind::RevealSubmitted, StateKind::Completed),
    // Resumption after a failure.
    (StateKind::Failed, StateKind::CommitBuilding),
    (StateKind::Failed, StateKind::AwaitingAnchor),
];

impl SessionState {
    fn kind(&self) -> StateKind {
        match self {
            Self::Idle => StateKind::Idle,
            Self::CommitBuilding => StateKind::CommitBuilding,
            Self::CommitSubmitted => StateKind::CommitSubmitted,
            Self::AwaitingAnchor => StateKind::AwaitingAnchor,
            Self::RevealBuilding => StateKind::RevealBuilding,
            Self::RevealSubmitted => StateKind::RevealSubmitted,
            Self::Completed => StateKind::Completed,
            Self::Failed(_) => StateKind::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CommitBuilding => "commit_building",
            Self::CommitSubmitted => "commit_submitted",
            Self::AwaitingAnchor => "awaiting_anchor",
            Self::RevealBuilding => "reveal_building",
            Self::RevealSubmitted => "reveal_submitted",
            Self::Completed => "completed",
            Self::Failed(_) => "failed",
        }
    }

    fn can_transition_to(&self, next: &SessionState) -> bool {
        let (from, to) = (self.kind(), next.kind());
        if to == StateKind::Failed {
            return !self.is_terminal();
        }
        VALID_TRANSITIONS.contains(&(from, to))
    }
}

// ==============================================================================
// Session
// ==============================================================================

/// Orchestration record for one transfer. Mutated only by the orchestrator.
#[derive(Debug, Clone)]
pub struct TransferSession {
    pub id: SessionId,
    pub sender: Address,
    pub payload: InscriptionPayload,
    pub envelope: ScriptEnvelope,
    /// Script-hash address the commit funds.
    pub address: Address,
    pub commit_tx: Option<Transaction>,
    pub commit_tx_id: Option<TransactionId>,
    pub reveal_tx: Option<Transaction>,
    pub reveal_tx_id: Option<TransactionId>,
    pub state: SessionState,
    /// Anchor poll attempts made in the current (or last) wait.
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl TransferSession {
    pub fn new(
        sender: Address,
        payload: InscriptionPayload,
        envelope: ScriptEnvelope,
        address: Address,
    ) -> Self {
        Self {
            id: SessionId::random(),
            sender,
            payload,
            envelope,
            address,
            commit_tx: None,
            commit_tx_id: None,
            reveal_tx: None,
            reveal_tx_id: None,
            state: SessionState::Idle,
            attempts: 0,
            last_error: None,
        }
    }

    pub fn transition(&mut self, next: SessionState) -> Result<(), CoreError> {
        if !self.state.can_transition_to(&next) {
            return Err(CoreError::InvalidState(format!(
                "session {} cannot move from {} to {}",
                self.id,
                self.state.name(),
                next.name()
            )));
        }
        info!(
            session_id = %self.id,
            from = self.state.name(),
            to = next.name(),
            "session transition"
        );
        self.state = next;
        Ok(())
    }

    /// Record a terminal failure. Identifiers gathered so far are kept.
    pub fn fail(&mut self, err: &CoreError) {
        let reason = FailureReason::from_error(err);
        warn!(
            session_id = %self.id,
            state = self.state.name(),
            commit_tx_id = ?self.commit_tx_id.map(|id| id.to_string()),
            error = %err,
            "session failed"
        );
        self.last_error = Some(err.to_string());
        if self.state.is_terminal() {
            return;
        }
        self.state = SessionState::Failed(reason);
    }

    pub fn failure(&self) -> Option<TransferFailure> {
        match &self.state {
            SessionState::Failed(reason) => Some(TransferFailure {
                reason: reason.clone(),
                commit_tx_id: self.commit_tx_id,
            }),
            _ => None,
        }
    }
}
