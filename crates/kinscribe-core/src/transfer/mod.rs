//! Commit/reveal transfer sessions.

pub mod config;
pub mod orchestrator;
pub mod session;

pub use config::TransferConfig;
pub use orchestrator::{TransferHandle, TransferOrchestrator, TransferRequest};
pub use session::{FailureReason, SessionId, SessionState, TransferFailure, TransferSession};
