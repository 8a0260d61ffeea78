//! Construction and signature hashing of consensus transactions.
//!
//! Every transaction built here is a version-0 native transaction with no
//! lock time, gas or payload. Inputs use sequence 0 and one signature
//! operation.

use kaspa_consensus_core::constants::TX_VERSION;
use kaspa_consensus_core::hashing::sighash::{calc_schnorr_signature_hash, SigHashReusedValues};
use kaspa_consensus_core::hashing::sighash_type::SigHashType;
use kaspa_consensus_core::subnets::SUBNETWORK_ID_NATIVE;
use kaspa_consensus_core::tx::{
    SignableTransaction, Transaction, TransactionInput, TransactionOutpoint, TransactionOutput, UtxoEntry,
};

use crate::error::CoreError;

/// Signature operations attributed to a single-signature input.
pub const DEFAULT_SIG_OP_COUNT: u8 = 1;

/// `SIGHASH_ALL | SIGHASH_ANYONECANPAY`.
const SIG_HASH_ALL_ANYONE_CAN_PAY: u8 = 0x81;

pub fn unsigned_input(previous_outpoint: TransactionOutpoint, signature_script: Vec<u8>) -> TransactionInput {
    TransactionInput::new(previous_outpoint, signature_script, 0, DEFAULT_SIG_OP_COUNT)
}

pub fn new_transaction(inputs: Vec<TransactionInput>, outputs: Vec<TransactionOutput>) -> Transaction {
    Transaction::new(TX_VERSION, inputs, outputs, 0, SUBNETWORK_ID_NATIVE, 0, Vec::new())
}

pub fn total_output(tx: &Transaction) -> u64 {
    tx.outputs.iter().map(|o| o.value).sum()
}

/// Hash type for an input that signs only itself and every output.
pub fn sig_hash_all_anyone_can_pay() -> Result<SigHashType, CoreError> {
    SigHashType::from_u8(SIG_HASH_ALL_ANYONE_CAN_PAY)
        .map_err(|e| CoreError::Signing(format!("sighash type: {e}")))
}

/// Schnorr signature hash of input `input_index`. `entries` are the outputs
/// spent by `tx`, in input order.
pub fn schnorr_sighash(
    tx: &Transaction,
    entries: &[UtxoEntry],
    input_index: usize,
    hash_type: SigHashType,
) -> [u8; 32] {
    let signable = SignableTransaction::with_entries(tx.clone(), entries.to_vec());
    let mut reused_values = SigHashReusedValues::new();
    let hash = calc_schnorr_signature_hash(&signable.as_verifiable(), input_index, hash_type, &mut reused_values);
    hash.as_bytes()
}
