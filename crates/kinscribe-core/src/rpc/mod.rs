//! Kaspa node RPC abstraction layer.
//!
//! Defines the [`UtxoSource`] and [`Broadcaster`] traits and provides an
//! HTTP JSON-RPC implementation ([`HttpNodeClient`]) plus a test mock
//! (`mock::MockNode`).

mod http_adapter;
#[cfg(test)]
pub mod mock;

pub use http_adapter::HttpNodeClient;

use async_trait::async_trait;
use kaspa_consensus_core::tx::TransactionId;

use crate::address::Address;
use crate::error::CoreError;
use crate::signer::SignedTransaction;
use crate::types::UtxoWithOutpoint;

/// Supplies spendable outputs for an address.
#[async_trait]
pub trait UtxoSource: Send + Sync {
    /// Every spendable output currently locked to `address`. An empty list
    /// means none exist; node failures surface as `NodeUnavailable`.
    async fn get_utxos_by_address(&self, address: &Address) -> Result<Vec<UtxoWithOutpoint>, CoreError>;
}

/// Submits signed transactions to the network.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Broadcast `tx` and return the id the node accepted it under. Node
    /// rejections surface as `RejectedByNode`.
    async fn submit(&self, tx: &SignedTransaction) -> Result<TransactionId, CoreError>;
}
