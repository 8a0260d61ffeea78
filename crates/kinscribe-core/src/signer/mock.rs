use std::sync::Mutex;

use async_trait::async_trait;
use kaspa_consensus_core::tx::Transaction;

use crate::error::CoreError;
use crate::test_util::TEST_X_ONLY;
use crate::types::UtxoWithOutpoint;

use super::{
    check_entries, full_signature_script, script_path_signature_script, SignedTransaction, Signer,
    SigningMode,
};

/// A signer that fills signature scripts with placeholder bytes and records
/// the mode of every call.
#[derive(Default)]
pub struct MockSigner {
    modes: Mutex<Vec<SigningMode>>,
    fail_with: Option<String>,
}

impl MockSigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            modes: Mutex::new(Vec::new()),
            fail_with: Some(message.to_owned()),
        }
    }

    pub fn modes(&self) -> Vec<SigningMode> {
        self.modes.lock().expect("mock lock").clone()
    }

    fn record(&self, mode: SigningMode) -> Result<(), CoreError> {
        self.modes.lock().expect("mock lock").push(mode);
        match &self.fail_with {
            Some(message) => Err(CoreError::Signing(message.clone())),
            None => Ok(()),
        }
    }
}

fn placeholder_script() -> Vec<u8> {
    let mut sig = [0u8; 65];
    sig[64] = 0x01;
    full_signature_script(&sig)
}

#[async_trait]
impl Signer for MockSigner {
    fn public_key(&self) -> [u8; 32] {
        TEST_X_ONLY
    }

    async fn sign_full(
        &self,
        tx: &Transaction,
        entries: &[UtxoWithOutpoint],
    ) -> Result<SignedTransaction, CoreError> {
        check_entries(tx, entries)?;
        self.record(SigningMode::Full)?;
        let mut signed = tx.clone();
        for input in &mut signed.inputs {
            input.signature_script = placeholder_script();
        }
        Ok(SignedTransaction {
            tx: signed,
            mode: SigningMode::Full,
        })
    }

    async fn sign_script_path(
        &self,
        tx: &Transaction,
        entries: &[UtxoWithOutpoint],
        input_index: usize,
        redeem_script: &[u8],
    ) -> Result<SignedTransaction, CoreError> {
        check_entries(tx, entries)?;
        let mode = SigningMode::ScriptPath { input_index };
        self.record(mode)?;
        let mut signed = tx.clone();
        for (index, input) in signed.inputs.iter_mut().enumerate() {
            input.signature_script = if index == input_index {
                let mut sig = [0u8; 65];
                sig[64] = 0x81;
                script_path_signature_script(&sig, redeem_script)?
            } else {
                placeholder_script()
            };
        }
        Ok(SignedTransaction { tx: signed, mode })
    }
}
