use kaspa_consensus_core::tx::{ScriptPublicKey, Transaction, TransactionId, TransactionOutpoint, UtxoEntry};

use crate::error::{CoreError, RpcError};
use crate::types::{self, script_public_key_from_hex, UtxoWithOutpoint};

fn invalid(msg: String) -> CoreError {
    RpcError::InvalidResponse(msg).into()
}

/// Accept an unsigned integer as a JSON number or a decimal string.
pub(super) fn parse_u64(value: Option<&serde_json::Value>, field: &str) -> Result<u64, CoreError> {
    match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| invalid(format!("{field} out of range: {n}"))),
        Some(serde_json::Value::String(s)) => s
            .parse::<u64>()
            .map_err(|e| invalid(format!("invalid {field} `{s}`: {e}"))),
        Some(other) => Err(invalid(format!("expected integer {field}, got: {other}"))),
        None => Err(invalid(format!("missing {field}"))),
    }
}

fn parse_u32(value: Option<&serde_json::Value>, field: &str) -> Result<u32, CoreError> {
    let n = parse_u64(value, field)?;
    u32::try_from(n).map_err(|_| invalid(format!("{field} out of range: {n}")))
}

pub(super) fn parse_transaction_id(
    value: Option<&serde_json::Value>,
    field: &str,
) -> Result<TransactionId, CoreError> {
    let value = value
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| invalid(format!("missing {field}")))?;
    types::parse_transaction_id(value).map_err(|e| invalid(format!("invalid {field}: {e}")))
}

/// A script public key is either `{version, script}` or a hex string whose
/// first two bytes are the big-endian version.
fn parse_script_public_key(value: Option<&serde_json::Value>) -> Result<ScriptPublicKey, CoreError> {
    match value {
        Some(serde_json::Value::String(s)) => {
            script_public_key_from_hex(s).map_err(|e| invalid(e.to_string()))
        }
        Some(obj @ serde_json::Value::Object(_)) => {
            let version = parse_u64(obj.get("version"), "scriptPublicKey.version")?;
            let version = u16::try_from(version)
                .map_err(|_| invalid(format!("scriptPublicKey.version out of range: {version}")))?;
            let script_hex = obj
                .get("script")
                .or_else(|| obj.get("scriptPublicKey"))
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| invalid("missing scriptPublicKey.script".into()))?;
            let script = hex::decode(script_hex)
                .map_err(|e| invalid(format!("invalid scriptPublicKey hex: {e}")))?;
            Ok(ScriptPublicKey::from_vec(version, script))
        }
        Some(other) => Err(invalid(format!("unexpected scriptPublicKey: {other}"))),
        None => Err(invalid("missing scriptPublicKey".into())),
    }
}

fn parse_entry(raw: &serde_json::Value) -> Result<UtxoWithOutpoint, CoreError> {
    let outpoint = raw
        .get("outpoint")
        .ok_or_else(|| invalid("missing outpoint".into()))?;
    let utxo = raw
        .get("utxoEntry")
        .ok_or_else(|| invalid("missing utxoEntry".into()))?;

    let outpoint = TransactionOutpoint::new(
        parse_transaction_id(outpoint.get("transactionId"), "outpoint.transactionId")?,
        parse_u32(outpoint.get("index"), "outpoint.index")?,
    );
    let entry = UtxoEntry::new(
        parse_u64(utxo.get("amount"), "utxoEntry.amount")?,
        parse_script_public_key(utxo.get("scriptPublicKey"))?,
        parse_u64(utxo.get("blockDaaScore"), "utxoEntry.blockDaaScore")?,
        utxo.get("isCoinbase")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false),
    );
    Ok(UtxoWithOutpoint::new(outpoint, entry))
}

/// Parse a `getUtxosByAddresses` result. A null result or a missing
/// `entries` array means no outputs.
pub(super) fn parse_utxos_result(raw: &serde_json::Value) -> Result<Vec<UtxoWithOutpoint>, CoreError> {
    if raw.is_null() {
        return Ok(Vec::new());
    }
    let Some(entries) = raw.get("entries") else {
        return Ok(Vec::new());
    };
    let entries = entries
        .as_array()
        .ok_or_else(|| invalid("entries is not an array".into()))?;
    entries.iter().map(parse_entry).collect()
}

/// `submitTransaction` encoding of `tx`: byte fields are hex, amounts are
/// `value`.
pub(super) fn transaction_json(tx: &Transaction) -> serde_json::Value {
    let inputs: Vec<serde_json::Value> = tx
        .inputs
        .iter()
        .map(|input| {
            serde_json::json!({
                "previousOutpoint": {
                    "transactionId": input.previous_outpoint.transaction_id.to_string(),
                    "index": input.previous_outpoint.index,
                },
                "signatureScript": hex::encode(&input.signature_script),
                "sequence": input.sequence,
                "sigOpCount": input.sig_op_count,
            })
        })
        .collect();
    let outputs: Vec<serde_json::Value> = tx
        .outputs
        .iter()
        .map(|output| {
            serde_json::json!({
                "value": output.value,
                "scriptPublicKey": {
                    "version": output.script_public_key.version(),
                    "script": hex::encode(output.script_public_key.script()),
                },
            })
        })
        .collect();
    serde_json::json!({
        "version": tx.version,
        "inputs": inputs,
        "outputs": outputs,
        "lockTime": tx.lock_time,
        "subnetworkId": tx.subnetwork_id.to_string(),
        "gas": tx.gas,
        "payload": hex::encode(&tx.payload),
    })
}
