//! JSON-RPC client for Kaspa node endpoints.
//!
//! Implements [`UtxoSource`](super::UtxoSource) and
//! [`Broadcaster`](super::Broadcaster) over HTTP JSON-RPC using `reqwest`,
//! with optional request rate limiting and basic auth.

mod client;
mod connection;
mod parsing;
mod protocol;

pub use client::HttpNodeClient;
