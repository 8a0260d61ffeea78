//! Commit and reveal transaction builders.
//!
//! Funding selection is greedy largest-first: candidates are ordered by
//! amount descending, ties broken by outpoint ascending, and taken until the
//! requirement is met. Leftover below the dust threshold is added to the fee
//! instead of producing a change output.

use kaspa_consensus_core::tx::{Transaction, TransactionOutpoint, TransactionOutput};

use crate::address::{p2sh_script_public_key, pay_to_address_script, Address};
use crate::envelope::ScriptEnvelope;
use crate::error::CoreError;
use crate::types::{outpoint_key, UtxoWithOutpoint};

use super::transaction::{new_transaction, unsigned_input};

/// Index of the anchor output in every commit transaction.
pub const ANCHOR_OUTPUT_INDEX: u32 = 0;

/// Index of the anchor input in every reveal transaction.
pub const ANCHOR_INPUT_INDEX: usize = 0;

/// An unsigned transaction together with the outputs its inputs spend, in
/// input order.
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    pub tx: Transaction,
    pub entries: Vec<UtxoWithOutpoint>,
    pub fee: u64,
    pub change: Option<u64>,
}

/// Pick the fewest largest outputs covering `required`.
pub fn select_funding(
    candidates: &[UtxoWithOutpoint],
    required: u64,
) -> Result<Vec<UtxoWithOutpoint>, CoreError> {
    let mut ordered: Vec<&UtxoWithOutpoint> = candidates.iter().collect();
    ordered.sort_by(|a, b| {
        b.amount()
            .cmp(&a.amount())
            .then_with(|| outpoint_key(&a.outpoint).cmp(&outpoint_key(&b.outpoint)))
    });

    let mut selected = Vec::new();
    let mut total: u64 = 0;
    for utxo in ordered {
        if total >= required {
            break;
        }
        total = total.saturating_add(utxo.amount());
        selected.push(utxo.clone());
    }

    if total < required {
        return Err(CoreError::InsufficientFunds {
            required,
            available: total,
        });
    }
    Ok(selected)
}

/// Change output for `leftover`, or `None` when it is folded into the fee.
fn change_output(leftover: u64, dust_threshold: u64, change_address: &Address) -> Option<TransactionOutput> {
    (leftover > 0 && leftover >= dust_threshold)
        .then(|| TransactionOutput::new(leftover, pay_to_address_script(change_address)))
}

fn sum_amounts(utxos: &[UtxoWithOutpoint]) -> u64 {
    utxos.iter().map(UtxoWithOutpoint::amount).fold(0u64, u64::saturating_add)
}

/// Build the commit transaction paying `anchor_amount` to the envelope's
/// script-hash address at output 0.
pub fn build_commit(
    funding_utxos: &[UtxoWithOutpoint],
    anchor_amount: u64,
    priority_fee: u64,
    change_address: &Address,
    script_hash_address: &Address,
    dust_threshold: u64,
) -> Result<UnsignedTransaction, CoreError> {
    let required = anchor_amount
        .checked_add(priority_fee)
        .ok_or_else(|| CoreError::InvalidConfig("anchor amount plus fee overflows".into()))?;
    let selected = select_funding(funding_utxos, required).map_err(|err| match err {
        CoreError::InsufficientFunds { required, .. } => CoreError::InsufficientFunds {
            required,
            available: sum_amounts(funding_utxos),
        },
        other => other,
    })?;

    let total_in = sum_amounts(&selected);
    let leftover = total_in - required;

    let mut outputs = vec![TransactionOutput::new(
        anchor_amount,
        pay_to_address_script(script_hash_address),
    )];
    let change = change_output(leftover, dust_threshold, change_address);
    let fee = match &change {
        Some(_) => priority_fee,
        None => priority_fee + leftover,
    };
    let change_amount = change.as_ref().map(|o| o.value);
    outputs.extend(change);

    let inputs = selected
        .iter()
        .map(|utxo| unsigned_input(utxo.outpoint, Vec::new()))
        .collect();

    Ok(UnsignedTransaction {
        tx: new_transaction(inputs, outputs),
        entries: selected,
        fee,
        change: change_amount,
    })
}

/// Build the reveal transaction spending the anchor through the envelope
/// script. The anchor is always input 0 and carries the full redeem script
/// as its signature script until signed.
///
/// # Panics
///
/// Panics if `priority_input` is not the anchor at `expected_anchor`, or if
/// it does not pay to the envelope's script hash.
pub fn build_reveal(
    priority_input: &UtxoWithOutpoint,
    expected_anchor: TransactionOutpoint,
    funding_utxos: &[UtxoWithOutpoint],
    priority_fee: u64,
    change_address: &Address,
    envelope: &ScriptEnvelope,
    dust_threshold: u64,
) -> Result<UnsignedTransaction, CoreError> {
    assert_eq!(
        priority_input.outpoint, expected_anchor,
        "reveal must spend the commit anchor output"
    );
    assert_eq!(
        priority_input.script_public_key(),
        &p2sh_script_public_key(envelope.to_bytes()),
        "anchor output must pay to the envelope script hash"
    );

    let anchor_amount = priority_input.amount();
    let extra = if anchor_amount >= priority_fee {
        Vec::new()
    } else {
        let shortfall = priority_fee - anchor_amount;
        let funding: Vec<UtxoWithOutpoint> = funding_utxos
            .iter()
            .filter(|u| u.outpoint != expected_anchor)
            .cloned()
            .collect();
        select_funding(&funding, shortfall).map_err(|_| CoreError::InsufficientFunds {
            required: priority_fee,
            available: anchor_amount.saturating_add(sum_amounts(&funding)),
        })?
    };

    let mut entries = Vec::with_capacity(1 + extra.len());
    entries.push(priority_input.clone());
    entries.extend(extra);

    let total_in = sum_amounts(&entries);
    let leftover = total_in - priority_fee;
    let change = change_output(leftover, dust_threshold, change_address);
    let fee = match &change {
        Some(_) => priority_fee,
        None => priority_fee + leftover,
    };

    let change_amount = change.as_ref().map(|o| o.value);

    let mut inputs = Vec::with_capacity(entries.len());
    inputs.push(unsigned_input(
        priority_input.outpoint,
        envelope.to_bytes().to_vec(),
    ));
    inputs.extend(
        entries[1..]
            .iter()
            .map(|utxo| unsigned_input(utxo.outpoint, Vec::new())),
    );

    Ok(UnsignedTransaction {
        tx: new_transaction(inputs, change.into_iter().collect()),
        entries,
        fee,
        change: change_amount,
    })
}
