//! Drives a transfer session from request to a terminal state.
//!
//! A session commits funds to the envelope's script-hash address, polls for
//! the resulting anchor output, then spends it with a reveal transaction
//! that exposes the inscription. Broadcasts are never retried. The commit id
//! is recorded before the commit is broadcast and is only dropped when the
//! node definitely rejected it, so a resumed session never funds twice.

use std::sync::Arc;

use kaspa_consensus_core::tx::{TransactionId, TransactionOutpoint};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::address::{network_of, pay_to_address_script, Address};
use crate::envelope::{EnvelopeKey, ScriptEnvelope};
use crate::error::{CoreError, RpcError};
use crate::inscription::{encode, InscriptionPayload};
use crate::reservation::ReservationRegistry;
use crate::rpc::{Broadcaster, UtxoSource};
use crate::signer::{SignedTransaction, Signer};
use crate::tx::{build_commit, build_reveal, ANCHOR_INPUT_INDEX, ANCHOR_OUTPUT_INDEX};
use crate::types::UtxoWithOutpoint;

use super::config::TransferConfig;
use super::session::{SessionId, SessionState, TransferSession};

/// A request to inscribe `payload` funded by `sender`.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub sender: Address,
    pub payload: InscriptionPayload,
}

#[derive(Clone)]
pub struct TransferOrchestrator {
    utxos: Arc<dyn UtxoSource>,
    broadcaster: Arc<dyn Broadcaster>,
    signer: Arc<dyn Signer>,
    registry: Arc<ReservationRegistry>,
    config: TransferConfig,
}

/// A running session. Dropping the handle detaches the task without
/// cancelling it.
pub struct TransferHandle {
    session_id: SessionId,
    progress: watch::Receiver<TransferSession>,
    cancel: watch::Sender<bool>,
    task: JoinHandle<TransferSession>,
}

impl TransferHandle {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// The session as of its last state change.
    pub fn snapshot(&self) -> TransferSession {
        self.progress.borrow().clone()
    }

    /// Request cancellation. Takes effect before the commit is built or
    /// while the anchor is awaited; a broadcast commit is never undone.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to reach a terminal state.
    pub async fn join(self) -> Result<TransferSession, CoreError> {
        self.task
            .await
            .map_err(|e| CoreError::InvalidState(format!("session {} task failed: {e}", self.session_id)))
    }
}

impl TransferOrchestrator {
    pub fn new(
        utxos: Arc<dyn UtxoSource>,
        broadcaster: Arc<dyn Broadcaster>,
        signer: Arc<dyn Signer>,
        registry: Arc<ReservationRegistry>,
        config: TransferConfig,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            utxos,
            broadcaster,
            signer,
            registry,
            config,
        })
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Validate and encode a request into a fresh session. Performs no I/O.
    pub fn prepare(&self, request: TransferRequest) -> Result<TransferSession, CoreError> {
        let network = self.config.network;
        if network_of(&request.sender) != network {
            return Err(CoreError::UnsupportedNetwork(format!(
                "sender {} is not a {network} address",
                request.sender
            )));
        }
        let bytes = encode(&request.payload, network)?;
        let envelope = ScriptEnvelope::build(EnvelopeKey::Schnorr(self.signer.public_key()), &bytes)?;
        let address = envelope.derive_address(network)?;
        let session = TransferSession::new(request.sender, request.payload, envelope, address);
        debug!(
            session_id = %session.id,
            address = %session.address,
            payload_len = bytes.len(),
            "prepared transfer"
        );
        Ok(session)
    }

    pub fn start(&self, request: TransferRequest) -> Result<TransferHandle, CoreError> {
        let session = self.prepare(request)?;
        Ok(self.spawn(session))
    }

    /// Restart a failed or never-started session from its last successful
    /// state.
    pub fn resume(&self, session: TransferSession) -> Result<TransferHandle, CoreError> {
        match &session.state {
            SessionState::Idle | SessionState::Failed(_) => {}
            SessionState::Completed => {
                return Err(CoreError::InvalidState(format!(
                    "session {} is already completed",
                    session.id
                )))
            }
            other => {
                return Err(CoreError::InvalidState(format!(
                    "session {} is still {}",
                    session.id,
                    other.name()
                )))
            }
        }
        info!(
            session_id = %session.id,
            commit_tx_id = ?session.commit_tx_id.map(|id| id.to_string()),
            "resuming session"
        );
        Ok(self.spawn(session))
    }

    fn spawn(&self, session: TransferSession) -> TransferHandle {
        let (cancel, cancel_rx) = watch::channel(false);
        let (progress_tx, progress) = watch::channel(session.clone());
        let session_id = session.id.clone();
        let this = self.clone();
        let task = tokio::spawn(async move { this.drive(session, cancel_rx, &progress_tx).await });
        TransferHandle {
            session_id,
            progress,
            cancel,
            task,
        }
    }

    /// Drive `session` to `Completed` or `Failed`.
    pub async fn run(&self, session: TransferSession, cancel: watch::Receiver<bool>) -> TransferSession {
        let (progress, _) = watch::channel(session.clone());
        self.drive(session, cancel, &progress).await
    }

    async fn drive(
        &self,
        mut session: TransferSession,
        mut cancel: watch::Receiver<bool>,
        progress: &watch::Sender<TransferSession>,
    ) -> TransferSession {
        if let Err(err) = self.advance(&mut session, &mut cancel, progress).await {
            session.fail(&err);
        }
        self.registry.release(&session.id).await;
        progress.send_replace(session.clone());
        info!(
            session_id = %session.id,
            state = session.state.name(),
            commit_tx_id = ?session.commit_tx_id.map(|id| id.to_string()),
            reveal_tx_id = ?session.reveal_tx_id.map(|id| id.to_string()),
            "session finished"
        );
        session
    }

    async fn advance(
        &self,
        session: &mut TransferSession,
        cancel: &mut watch::Receiver<bool>,
        progress: &watch::Sender<TransferSession>,
    ) -> Result<(), CoreError> {
        if *cancel.borrow() {
            return Err(CoreError::Cancelled);
        }
        if session.commit_tx_id.is_none() {
            self.commit(session, progress).await?;
        }
        let anchor = self.await_anchor(session, cancel, progress).await?;
        self.reveal(session, anchor, progress).await
    }

    fn step(
        &self,
        session: &mut TransferSession,
        next: SessionState,
        progress: &watch::Sender<TransferSession>,
    ) -> Result<(), CoreError> {
        session.transition(next)?;
        progress.send_replace(session.clone());
        Ok(())
    }

    async fn commit(
        &self,
        session: &mut TransferSession,
        progress: &watch::Sender<TransferSession>,
    ) -> Result<(), CoreError> {
        self.step(session, SessionState::CommitBuilding, progress)?;
        let config = &self.config;

        let candidates = self.utxos.get_utxos_by_address(&session.sender).await?;
        let unsigned = self
            .registry
            .select_and_reserve(&session.sender, &session.id, &candidates, |available| {
                build_commit(
                    available,
                    config.anchor_amount,
                    config.priority_fee,
                    &session.sender,
                    &session.address,
                    config.dust_threshold,
                )
            })
            .await?;
        debug!(
            session_id = %session.id,
            inputs = unsigned.entries.len(),
            fee = unsigned.fee,
            change = ?unsigned.change,
            "built commit"
        );

        let signed = self.signer.sign_full(&unsigned.tx, &unsigned.entries).await?;
        session.commit_tx = Some(signed.tx.clone());
        session.commit_tx_id = Some(signed.id());
        progress.send_replace(session.clone());

        match self.broadcast(&signed).await {
            Ok(commit_tx_id) => session.commit_tx_id = Some(commit_tx_id),
            Err(err) if is_definite_rejection(&err) => {
                session.commit_tx = None;
                session.commit_tx_id = None;
                return Err(submission_error(err));
            }
            Err(err) => {
                warn!(
                    session_id = %session.id,
                    commit_tx_id = %signed.id(),
                    error = %err,
                    "commit outcome unknown, keeping its id for resume"
                );
                return Err(submission_error(err));
            }
        }
        self.step(session, SessionState::CommitSubmitted, progress)
    }

    /// Poll the script-hash address until the commit's anchor output shows
    /// up, the attempts run out, or the session is cancelled.
    async fn await_anchor(
        &self,
        session: &mut TransferSession,
        cancel: &mut watch::Receiver<bool>,
        progress: &watch::Sender<TransferSession>,
    ) -> Result<UtxoWithOutpoint, CoreError> {
        self.step(session, SessionState::AwaitingAnchor, progress)?;
        let commit_tx_id = session.commit_tx_id.ok_or_else(|| {
            CoreError::InvalidState(format!("session {} has no commit transaction", session.id))
        })?;
        let anchor = TransactionOutpoint::new(commit_tx_id, ANCHOR_OUTPUT_INDEX);
        let expected_script = pay_to_address_script(&session.address);
        let max_attempts = self.config.poll_attempts;

        session.attempts = 0;
        for attempt in 1..=max_attempts {
            if *cancel.borrow() {
                return Err(CoreError::Cancelled);
            }
            session.attempts = attempt;
            progress.send_replace(session.clone());

            match self.utxos.get_utxos_by_address(&session.address).await {
                Ok(entries) => {
                    if let Some(entry) = entries
                        .into_iter()
                        .find(|e| e.outpoint == anchor && e.script_public_key() == &expected_script)
                    {
                        debug!(session_id = %session.id, attempt, amount = entry.amount(), "anchor found");
                        return Ok(entry);
                    }
                    debug!(session_id = %session.id, attempt, max_attempts, "anchor not yet visible");
                }
                Err(err) => {
                    warn!(session_id = %session.id, attempt, error = %err, "anchor poll failed");
                }
            }

            if attempt < max_attempts {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                    _ = wait_cancelled(cancel) => return Err(CoreError::Cancelled),
                }
            }
        }
        Err(CoreError::AnchorNotFound {
            attempts: max_attempts,
        })
    }

    async fn reveal(
        &self,
        session: &mut TransferSession,
        anchor: UtxoWithOutpoint,
        progress: &watch::Sender<TransferSession>,
    ) -> Result<(), CoreError> {
        self.step(session, SessionState::RevealBuilding, progress)?;
        let config = &self.config;

        // Outputs fetched before the commit may have been spent by it.
        let candidates = self.utxos.get_utxos_by_address(&session.sender).await?;
        let unsigned = self
            .registry
            .select_and_reserve(&session.sender, &session.id, &candidates, |available| {
                build_reveal(
                    &anchor,
                    anchor.outpoint,
                    available,
                    config.priority_fee,
                    &session.sender,
                    &session.envelope,
                    config.dust_threshold,
                )
            })
            .await?;
        debug!(
            session_id = %session.id,
            inputs = unsigned.entries.len(),
            fee = unsigned.fee,
            change = ?unsigned.change,
            "built reveal"
        );

        let signed = self
            .signer
            .sign_script_path(
                &unsigned.tx,
                &unsigned.entries,
                ANCHOR_INPUT_INDEX,
                session.envelope.to_bytes(),
            )
            .await?;
        let reveal_tx_id = self.broadcast(&signed).await.map_err(submission_error)?;
        session.reveal_tx = Some(signed.tx);
        session.reveal_tx_id = Some(reveal_tx_id);
        self.step(session, SessionState::RevealSubmitted, progress)?;
        self.step(session, SessionState::Completed, progress)
    }

    /// Submit once.
    async fn broadcast(&self, signed: &SignedTransaction) -> Result<TransactionId, CoreError> {
        let id = self.broadcaster.submit(signed).await?;
        info!(tx_id = %id, mode = ?signed.mode, "transaction submitted");
        Ok(id)
    }
}

/// The node answered and refused the transaction. Any other failure leaves
/// open whether it was accepted.
fn is_definite_rejection(err: &CoreError) -> bool {
    matches!(
        err,
        CoreError::RejectedByNode(_) | CoreError::Rpc(RpcError::ServerError { .. })
    )
}

/// Every broadcast failure ends the session as a submission error.
fn submission_error(err: CoreError) -> CoreError {
    match err {
        CoreError::RejectedByNode(message) => CoreError::RejectedByNode(message),
        CoreError::Rpc(RpcError::ServerError { message, .. }) => CoreError::RejectedByNode(message),
        other => CoreError::RejectedByNode(other.to_string()),
    }
}

/// Resolves once cancellation is requested. A dropped sender never cancels.
async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}
