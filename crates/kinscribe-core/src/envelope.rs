//! Redeem-script envelope carrying an inscription payload.
//!
//! Layout (indexers parse by position):
//!
//! ```text
//! <pubkey> OP_CHECKSIG OP_FALSE OP_IF "kasplex" OP_0 <payload> OP_ENDIF
//! ```
//!
//! The unexecuted `OP_IF` branch keeps the payload inert during script
//! evaluation while still exposing it in the spending transaction.

use std::fmt;

use kaspa_txscript::opcodes::codes::{
    Op16, Op1Negate, OpCheckSig, OpCheckSigECDSA, OpEndIf, OpFalse, OpIf, OpPushData1, OpPushData2, OpTrue,
};
use kaspa_txscript::script_builder::ScriptBuilder;

use crate::address::{p2sh_address, Address, NetworkId};
use crate::error::CoreError;

/// Protocol marker pushed at the start of the envelope branch.
pub const PROTOCOL_MARKER: &[u8] = b"kasplex";

/// Envelope version pushed after the marker.
pub const ENVELOPE_VERSION: i64 = 0;

/// Largest payload accepted inside an envelope.
pub const MAX_ENVELOPE_PAYLOAD: usize = 255;

/// Largest direct push opcode (`OP_DATA_75`).
const MAX_DIRECT_PUSH: u8 = 0x4b;

/// Key committed by the envelope's signature check.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKey {
    /// 32-byte x-only key checked with `OP_CHECKSIG`.
    Schnorr([u8; 32]),
    /// 33-byte compressed key checked with `OP_CHECKSIG_ECDSA`.
    Ecdsa([u8; 33]),
}

impl EnvelopeKey {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        if let Ok(key) = <[u8; 32]>::try_from(bytes) {
            return Ok(Self::Schnorr(key));
        }
        if let Ok(key) = <[u8; 33]>::try_from(bytes) {
            return Ok(Self::Ecdsa(key));
        }
        Err(CoreError::InvalidPayload(format!(
            "public key must be 32 or 33 bytes, got {}",
            bytes.len()
        )))
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Schnorr(key) => key,
            Self::Ecdsa(key) => key,
        }
    }

    fn check_sig_opcode(&self) -> u8 {
        match self {
            Self::Schnorr(_) => OpCheckSig,
            Self::Ecdsa(_) => OpCheckSigECDSA,
        }
    }
}

impl fmt::Debug for EnvelopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schnorr(_) => write!(f, "Schnorr({})", hex::encode(self.as_bytes())),
            Self::Ecdsa(_) => write!(f, "Ecdsa({})", hex::encode(self.as_bytes())),
        }
    }
}

fn script_error(err: impl fmt::Display) -> CoreError {
    CoreError::InvalidPayload(format!("build envelope script: {err}"))
}

/// A fully serialized redeem script together with the parts it was built
/// from. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEnvelope {
    public_key: EnvelopeKey,
    payload: Vec<u8>,
    script: Vec<u8>,
}

impl ScriptEnvelope {
    pub fn build(public_key: EnvelopeKey, payload: &[u8]) -> Result<Self, CoreError> {
        if payload.len() > MAX_ENVELOPE_PAYLOAD {
            return Err(CoreError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_ENVELOPE_PAYLOAD,
            });
        }

        let mut builder = ScriptBuilder::new();
        builder
            .add_data(public_key.as_bytes())
            .and_then(|b| b.add_op(public_key.check_sig_opcode()))
            .and_then(|b| b.add_op(OpFalse))
            .and_then(|b| b.add_op(OpIf))
            .and_then(|b| b.add_data(PROTOCOL_MARKER))
            .and_then(|b| b.add_i64(ENVELOPE_VERSION))
            .and_then(|b| b.add_data(payload))
            .and_then(|b| b.add_op(OpEndIf))
            .map_err(script_error)?;

        Ok(Self {
            public_key,
            payload: payload.to_vec(),
            script: builder.drain(),
        })
    }

    /// Recover an envelope from its serialized script, rejecting anything
    /// that does not follow the fixed layout.
    pub fn parse(script: &[u8]) -> Result<Self, CoreError> {
        let malformed = |what: &str| CoreError::InvalidPayload(format!("malformed envelope: {what}"));

        let parsed = read_instructions(script)?;
        let [Instruction::Push(key), Instruction::Op(check_sig), Instruction::Push(falsy), Instruction::Op(OpIf), Instruction::Push(marker), Instruction::Push(version), Instruction::Push(payload), Instruction::Op(OpEndIf)] =
            parsed.as_slice()
        else {
            return Err(malformed("unexpected instruction sequence"));
        };

        let public_key = EnvelopeKey::from_slice(key)?;
        if *check_sig != public_key.check_sig_opcode() {
            return Err(malformed("signature check does not match key type"));
        }
        if !falsy.is_empty() || !version.is_empty() {
            return Err(malformed("expected OP_FALSE and version 0"));
        }
        if marker.as_slice() != PROTOCOL_MARKER {
            return Err(malformed("unknown protocol marker"));
        }

        let envelope = Self::build(public_key, payload)?;
        if envelope.script != script {
            return Err(malformed("non-canonical push encoding"));
        }
        Ok(envelope)
    }

    pub fn public_key(&self) -> &EnvelopeKey {
        &self.public_key
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn to_bytes(&self) -> &[u8] {
        &self.script
    }

    /// Pay-to-script-hash address committing to this envelope.
    pub fn derive_address(&self, network: NetworkId) -> Result<Address, CoreError> {
        p2sh_address(network, &self.script)
    }
}

/// Derive the script-hash address for `envelope` on the named network.
pub fn derive(envelope: &ScriptEnvelope, network: &str) -> Result<Address, CoreError> {
    let network: NetworkId = network.parse()?;
    envelope.derive_address(network)
}

// ==============================================================================
// Push Reader
// ==============================================================================

/// One decoded script element. Small-integer opcodes decode to the single
/// byte they push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Instruction {
    Push(Vec<u8>),
    Op(u8),
}

/// Decode `script` into pushes and opcodes. Pushes longer than
/// `OP_PUSHDATA2` allows are not produced by any envelope and are rejected.
pub(crate) fn read_instructions(script: &[u8]) -> Result<Vec<Instruction>, CoreError> {
    let truncated = || CoreError::InvalidPayload("truncated push in script".into());

    let mut out = Vec::new();
    let mut rest = script;
    while let Some((&op, tail)) = rest.split_first() {
        rest = tail;
        let len = match op {
            OpFalse => 0,
            1..=MAX_DIRECT_PUSH => usize::from(op),
            OpPushData1 => {
                let (&n, tail) = rest.split_first().ok_or_else(truncated)?;
                rest = tail;
                usize::from(n)
            }
            OpPushData2 => {
                let (n, tail) = rest.split_at_checked(2).ok_or_else(truncated)?;
                rest = tail;
                usize::from(u16::from_le_bytes([n[0], n[1]]))
            }
            Op1Negate => {
                out.push(Instruction::Push(vec![0x81]));
                continue;
            }
            OpTrue..=Op16 => {
                out.push(Instruction::Push(vec![op - OpTrue + 1]));
                continue;
            }
            other => {
                out.push(Instruction::Op(other));
                continue;
            }
        };
        let (data, tail) = rest.split_at_checked(len).ok_or_else(truncated)?;
        rest = tail;
        out.push(Instruction::Push(data.to_vec()));
    }
    Ok(out)
}
