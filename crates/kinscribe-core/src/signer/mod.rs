//! Transaction signing.
//!
//! Two modes are used by a transfer:
//!
//! - **Full**: every input signs with `SIGHASH_ALL` (commit transaction).
//! - **Script path**: one input spends a pay-to-script-hash output by
//!   revealing its redeem script and signs with `ALL | ANYONECANPAY`, so the
//!   signature covers its own input only. Remaining inputs are signed in
//!   full mode (reveal transaction).

mod local;
#[cfg(test)]
pub mod mock;

pub use local::LocalSigner;

use std::iter;

use async_trait::async_trait;
use kaspa_consensus_core::tx::{Transaction, TransactionId};
use kaspa_txscript::opcodes::codes::OpData65;
use kaspa_txscript::script_builder::ScriptBuilder;
use serde::Serialize;

use crate::error::CoreError;
use crate::types::{outpoint_label, UtxoWithOutpoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SigningMode {
    Full,
    ScriptPath { input_index: usize },
}

#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub tx: Transaction,
    pub mode: SigningMode,
}

impl SignedTransaction {
    pub fn id(&self) -> TransactionId {
        self.tx.id()
    }
}

/// Key custody seam. `entries` are the outputs spent by `tx`, in input
/// order.
#[async_trait]
pub trait Signer: Send + Sync {
    /// 32-byte x-only public key embedded in envelopes and sender addresses.
    fn public_key(&self) -> [u8; 32];

    async fn sign_full(
        &self,
        tx: &Transaction,
        entries: &[UtxoWithOutpoint],
    ) -> Result<SignedTransaction, CoreError>;

    async fn sign_script_path(
        &self,
        tx: &Transaction,
        entries: &[UtxoWithOutpoint],
        input_index: usize,
        redeem_script: &[u8],
    ) -> Result<SignedTransaction, CoreError>;
}

fn check_entries(tx: &Transaction, entries: &[UtxoWithOutpoint]) -> Result<(), CoreError> {
    if tx.inputs.len() != entries.len() {
        return Err(CoreError::Signing(format!(
            "{} inputs but {} spent entries",
            tx.inputs.len(),
            entries.len()
        )));
    }
    for (index, (input, entry)) in tx.inputs.iter().zip(entries).enumerate() {
        if input.previous_outpoint != entry.outpoint {
            return Err(CoreError::Signing(format!(
                "input {index} spends {} but entry is {}",
                outpoint_label(&input.previous_outpoint),
                outpoint_label(&entry.outpoint)
            )));
        }
    }
    Ok(())
}

/// Signature script spending a pay-to-public-key output.
fn full_signature_script(signature: &[u8; 65]) -> Vec<u8> {
    iter::once(OpData65).chain(signature.iter().copied()).collect()
}

/// `<signature> <redeem script>` spending a pay-to-script-hash output.
fn script_path_signature_script(signature: &[u8; 65], redeem_script: &[u8]) -> Result<Vec<u8>, CoreError> {
    let mut builder = ScriptBuilder::new();
    builder
        .add_data(signature)
        .and_then(|b| b.add_data(redeem_script))
        .map_err(|e| CoreError::Signing(format!("build signature script: {e}")))?;
    Ok(builder.drain())
}
