//! Shared ledger types. Transactions, outpoints and script public keys are
//! the consensus types; this module adds the node-facing UTXO pairing and
//! a few rendering helpers.

use kaspa_consensus_core::tx::{ScriptPublicKey, TransactionId, TransactionOutpoint, UtxoEntry};

use crate::error::CoreError;

pub use kaspa_consensus_core::constants::SOMPI_PER_KASPA;

/// A spendable output as reported by the node: where it lives and what it
/// holds. Read-only snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoWithOutpoint {
    pub outpoint: TransactionOutpoint,
    pub entry: UtxoEntry,
}

impl UtxoWithOutpoint {
    pub fn new(outpoint: TransactionOutpoint, entry: UtxoEntry) -> Self {
        Self { outpoint, entry }
    }

    pub fn amount(&self) -> u64 {
        self.entry.amount
    }

    pub fn script_public_key(&self) -> &ScriptPublicKey {
        &self.entry.script_public_key
    }
}

/// Total order on outpoints: transaction id bytes, then index.
pub fn outpoint_key(outpoint: &TransactionOutpoint) -> ([u8; 32], u32) {
    (outpoint.transaction_id.as_bytes(), outpoint.index)
}

/// `<txid>:<index>`.
pub fn outpoint_label(outpoint: &TransactionOutpoint) -> String {
    format!("{}:{}", outpoint.transaction_id, outpoint.index)
}

pub fn parse_transaction_id(s: &str) -> Result<TransactionId, CoreError> {
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(s, &mut bytes)
        .map_err(|e| CoreError::InvalidPayload(format!("invalid transaction id `{s}`: {e}")))?;
    Ok(TransactionId::from_bytes(bytes))
}

/// Node-style hex form: big-endian version followed by the script.
pub fn script_public_key_hex(spk: &ScriptPublicKey) -> String {
    let mut bytes = Vec::with_capacity(2 + spk.script().len());
    bytes.extend_from_slice(&spk.version().to_be_bytes());
    bytes.extend_from_slice(spk.script());
    hex::encode(bytes)
}

pub fn script_public_key_from_hex(s: &str) -> Result<ScriptPublicKey, CoreError> {
    let bytes = hex::decode(s)
        .map_err(|e| CoreError::InvalidPayload(format!("invalid script public key hex: {e}")))?;
    if bytes.len() < 2 {
        return Err(CoreError::InvalidPayload(
            "script public key hex must include a 2-byte version".into(),
        ));
    }
    Ok(ScriptPublicKey::from_vec(
        u16::from_be_bytes([bytes[0], bytes[1]]),
        bytes[2..].to_vec(),
    ))
}

/// Format a sompi amount as KAS with eight decimals.
pub fn format_kaspa(sompi: u64) -> String {
    format!(
        "{}.{:08}",
        sompi / SOMPI_PER_KASPA,
        sompi % SOMPI_PER_KASPA
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_id_hex_preserves_byte_order() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xab;
        bytes[31] = 0x01;
        let rendered = TransactionId::from_bytes(bytes).to_string();
        assert!(rendered.starts_with("ab"));
        assert!(rendered.ends_with("01"));
        assert_eq!(
            parse_transaction_id(&rendered).expect("must parse").as_bytes(),
            bytes
        );
    }

    #[test]
    fn transaction_id_rejects_short_hex() {
        assert!(parse_transaction_id("abcd").is_err());
    }

    #[test]
    fn script_public_key_hex_carries_big_endian_version() {
        let spk = ScriptPublicKey::from_vec(0, vec![0xaa, 0x20]);
        assert_eq!(script_public_key_hex(&spk), "0000aa20");
        let parsed = script_public_key_from_hex("0001ac").expect("must parse");
        assert_eq!(parsed.version(), 1);
        assert_eq!(parsed.script(), &[0xac]);
    }

    #[test]
    fn outpoints_order_by_id_then_index() {
        let low = TransactionOutpoint::new(TransactionId::from_bytes([1; 32]), 5);
        let high = TransactionOutpoint::new(TransactionId::from_bytes([2; 32]), 0);
        assert!(outpoint_key(&low) < outpoint_key(&high));
        assert_eq!(outpoint_label(&high), format!("{}:0", "02".repeat(32)));
    }

    #[test]
    fn format_kaspa_pads_fraction() {
        assert_eq!(format_kaspa(30_000_000), "0.30000000");
        assert_eq!(format_kaspa(123 * SOMPI_PER_KASPA + 5), "123.00000005");
    }
}
