//! KRC-20 inscription payloads and their canonical JSON encoding.

use serde::Serialize;

use crate::address::{network_of, Address, NetworkId};
use crate::error::CoreError;

pub const KRC20_PROTOCOL: &str = "krc-20";

/// Default number of decimals for KRC-20 token amounts.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Operation {
    Transfer {
        amount: String,
        recipient: Address,
    },
    Mint {
        recipient: Option<Address>,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Transfer { .. } => "transfer",
            Self::Mint { .. } => "mint",
        }
    }
}

/// An application payload to be committed on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InscriptionPayload {
    pub protocol: String,
    pub ticker: String,
    pub operation: Operation,
}

impl InscriptionPayload {
    pub fn transfer(ticker: impl Into<String>, amount: impl Into<String>, recipient: Address) -> Self {
        Self {
            protocol: KRC20_PROTOCOL.to_owned(),
            ticker: ticker.into(),
            operation: Operation::Transfer {
                amount: amount.into(),
                recipient,
            },
        }
    }

    pub fn mint(ticker: impl Into<String>, recipient: Option<Address>) -> Self {
        Self {
            protocol: KRC20_PROTOCOL.to_owned(),
            ticker: ticker.into(),
            operation: Operation::Mint { recipient },
        }
    }

    pub fn validate(&self, network: NetworkId) -> Result<(), CoreError> {
        if self.protocol.is_empty() {
            return Err(CoreError::InvalidPayload("protocol must not be empty".into()));
        }
        if self.ticker.is_empty() {
            return Err(CoreError::InvalidPayload("ticker must not be empty".into()));
        }
        if !self.ticker.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidPayload(format!(
                "ticker `{}` must be ASCII alphanumeric",
                self.ticker
            )));
        }

        let recipient = match &self.operation {
            Operation::Transfer { amount, recipient } => {
                validate_integer_amount(amount)?;
                Some(recipient)
            }
            Operation::Mint { recipient } => recipient.as_ref(),
        };
        if let Some(recipient) = recipient {
            if network_of(recipient) != network {
                return Err(CoreError::InvalidPayload(format!(
                    "recipient {recipient} is not a {network} address"
                )));
            }
        }
        Ok(())
    }
}

/// Wire layout: `p`, `op`, `tick`, `amt`, `to`, in that order.
#[derive(Serialize)]
struct WirePayload<'a> {
    p: &'a str,
    op: &'a str,
    tick: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    amt: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<String>,
}

/// Serialize a payload to its canonical JSON bytes.
pub fn encode(payload: &InscriptionPayload, network: NetworkId) -> Result<Vec<u8>, CoreError> {
    payload.validate(network)?;

    let (amt, to) = match &payload.operation {
        Operation::Transfer { amount, recipient } => (Some(amount.as_str()), Some(recipient.to_string())),
        Operation::Mint { recipient } => (None, recipient.as_ref().map(|a| a.to_string())),
    };
    let wire = WirePayload {
        p: &payload.protocol,
        op: payload.operation.name(),
        tick: &payload.ticker,
        amt,
        to,
    };
    serde_json::to_vec(&wire).map_err(|e| CoreError::InvalidPayload(format!("serialize payload: {e}")))
}

fn validate_integer_amount(amount: &str) -> Result<(), CoreError> {
    if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::InvalidPayload(format!(
            "amount `{amount}` must be a non-negative base-10 integer"
        )));
    }
    Ok(())
}

/// Convert a human-readable decimal token amount into a base-unit integer
/// string, e.g. `"12.5"` with 8 decimals becomes `"1250000000"`.
pub fn parse_token_amount(human: &str, decimals: u8) -> Result<String, CoreError> {
    let invalid = || CoreError::InvalidPayload(format!("invalid token amount `{human}`"));

    let trimmed = human.trim();
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if fraction.len() > decimals as usize {
        return Err(CoreError::InvalidPayload(format!(
            "token amount `{human}` has more than {decimals} fractional digits"
        )));
    }

    let mut digits = String::with_capacity(whole.len() + decimals as usize);
    digits.push_str(whole);
    digits.push_str(fraction);
    digits.extend(std::iter::repeat('0').take(decimals as usize - fraction.len()));

    let normalized = digits.trim_start_matches('0');
    Ok(if normalized.is_empty() {
        "0".to_owned()
    } else {
        normalized.to_owned()
    })
}
