use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use kaspa_consensus_core::tx::{ScriptPublicKey, TransactionId, TransactionOutpoint, UtxoEntry};
use kaspa_txscript::opcodes::codes::OpBlake2b;

use crate::address::{pay_to_address_script, Address};
use crate::error::CoreError;
use crate::signer::SignedTransaction;
use crate::types::{outpoint_key, outpoint_label, script_public_key_hex, UtxoWithOutpoint};

use super::{Broadcaster, UtxoSource};

/// A mock Kaspa node for testing: a tiny in-memory ledger populated via the
/// builder pattern.
///
/// Submitted transactions spend their inputs and add their outputs. Outputs
/// paying to a script hash stay hidden until the configured number of
/// queries for their address has been made, which models confirmation lag
/// of the commit anchor.
pub struct MockNode {
    state: Mutex<LedgerState>,
    anchor_visible_on_attempt: Option<u32>,
    rejections: HashMap<usize, String>,
    unavailable: bool,
}

#[derive(Default)]
struct LedgerState {
    utxos: BTreeMap<([u8; 32], u32), UtxoWithOutpoint>,
    /// Hidden script-hash outputs and the queries seen since submission.
    pending: Vec<(UtxoWithOutpoint, u32)>,
    submitted: Vec<SignedTransaction>,
    /// Query counts keyed by hex-encoded locking script.
    queries: HashMap<String, u32>,
}

impl MockNode {
    pub fn builder() -> MockNodeBuilder {
        MockNodeBuilder {
            utxos: Vec::new(),
            anchor_visible_on_attempt: Some(1),
            rejections: HashMap::new(),
            unavailable: false,
        }
    }

    /// Every transaction accepted so far, in submission order.
    pub fn submitted(&self) -> Vec<SignedTransaction> {
        self.lock().submitted.clone()
    }

    /// Number of UTXO queries made for `address`.
    pub fn queries(&self, address: &Address) -> u32 {
        self.lock()
            .queries
            .get(&script_public_key_hex(&pay_to_address_script(address)))
            .copied()
            .unwrap_or(0)
    }

    /// Add an output to the visible ledger after construction.
    pub fn add_utxo(&self, entry: UtxoWithOutpoint) {
        self.lock().utxos.insert(outpoint_key(&entry.outpoint), entry);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct MockNodeBuilder {
    utxos: Vec<UtxoWithOutpoint>,
    anchor_visible_on_attempt: Option<u32>,
    rejections: HashMap<usize, String>,
    unavailable: bool,
}

impl MockNodeBuilder {
    pub fn with_utxo(mut self, entry: UtxoWithOutpoint) -> Self {
        self.utxos.push(entry);
        self
    }

    /// Script-hash outputs become visible on the `attempt`-th query of their
    /// address after submission. `None` keeps them hidden forever.
    pub fn anchor_visible_on_attempt(mut self, attempt: Option<u32>) -> Self {
        self.anchor_visible_on_attempt = attempt;
        self
    }

    /// Reject the `nth` submission (1-based) with `message`.
    pub fn reject_submission(mut self, nth: usize, message: &str) -> Self {
        self.rejections.insert(nth, message.to_owned());
        self
    }

    /// Fail every call with `NodeUnavailable`.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn build(self) -> MockNode {
        let state = LedgerState {
            utxos: self.utxos.into_iter().map(|e| (outpoint_key(&e.outpoint), e)).collect(),
            ..LedgerState::default()
        };
        MockNode {
            state: Mutex::new(state),
            anchor_visible_on_attempt: self.anchor_visible_on_attempt,
            rejections: self.rejections,
            unavailable: self.unavailable,
        }
    }
}

fn is_script_hash(spk: &ScriptPublicKey) -> bool {
    spk.script().first() == Some(&OpBlake2b)
}

#[async_trait]
impl UtxoSource for MockNode {
    async fn get_utxos_by_address(&self, address: &Address) -> Result<Vec<UtxoWithOutpoint>, CoreError> {
        if self.unavailable {
            return Err(CoreError::NodeUnavailable("mock node is down".into()));
        }
        let spk = pay_to_address_script(address);
        let mut state = self.lock();
        *state.queries.entry(script_public_key_hex(&spk)).or_default() += 1;

        let threshold = self.anchor_visible_on_attempt;
        let mut revealed = Vec::new();
        state.pending.retain_mut(|(entry, seen)| {
            if entry.script_public_key() != &spk {
                return true;
            }
            *seen += 1;
            match threshold {
                Some(n) if *seen >= n => {
                    revealed.push(entry.clone());
                    false
                }
                _ => true,
            }
        });
        for entry in revealed {
            state.utxos.insert(outpoint_key(&entry.outpoint), entry);
        }

        Ok(state
            .utxos
            .values()
            .filter(|e| e.script_public_key() == &spk)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Broadcaster for MockNode {
    async fn submit(&self, tx: &SignedTransaction) -> Result<TransactionId, CoreError> {
        if self.unavailable {
            return Err(CoreError::NodeUnavailable("mock node is down".into()));
        }
        let mut state = self.lock();
        let nth = state.submitted.len() + 1;
        if let Some(message) = self.rejections.get(&nth) {
            return Err(CoreError::RejectedByNode(message.clone()));
        }
        for input in &tx.tx.inputs {
            if !state.utxos.contains_key(&outpoint_key(&input.previous_outpoint)) {
                return Err(CoreError::RejectedByNode(format!(
                    "input {} is missing or already spent",
                    outpoint_label(&input.previous_outpoint)
                )));
            }
        }
        for input in &tx.tx.inputs {
            state.utxos.remove(&outpoint_key(&input.previous_outpoint));
        }

        let id = tx.id();
        for (index, output) in tx.tx.outputs.iter().enumerate() {
            let entry = UtxoWithOutpoint::new(
                TransactionOutpoint::new(id, index as u32),
                UtxoEntry::new(output.value, output.script_public_key.clone(), 0, false),
            );
            if is_script_hash(entry.script_public_key()) {
                state.pending.push((entry, 0));
            } else {
                state.utxos.insert(outpoint_key(&entry.outpoint), entry);
            }
        }
        state.submitted.push(tx.clone());
        Ok(id)
    }
}
