use std::time::Duration;

use clap::Parser;

use kinscribe_core::transfer::config::{
    DEFAULT_ANCHOR_AMOUNT, DEFAULT_DUST_THRESHOLD, DEFAULT_POLL_ATTEMPTS, DEFAULT_PRIORITY_FEE,
};
use kinscribe_core::{NetworkId, TransferConfig};

/// Kinscribe: KRC-20 token transfers on Kaspa via commit/reveal inscriptions.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Kaspa node JSON-RPC URL.
    #[arg(long, default_value = "http://127.0.0.1:16110", env = "KINSCRIBE_RPC_URL")]
    pub rpc_url: String,

    /// RPC username (optional).
    #[arg(long, env = "KINSCRIBE_RPC_USER")]
    pub rpc_user: Option<String>,

    /// RPC password (optional).
    #[arg(long, env = "KINSCRIBE_RPC_PASS")]
    pub rpc_pass: Option<String>,

    /// Maximum outbound RPC requests per second (unlimited if omitted).
    #[arg(long, env = "KINSCRIBE_RPC_REQUESTS_PER_SECOND")]
    pub rpc_requests_per_second: Option<u32>,

    /// Network: mainnet, testnet, testnet-<n>, simnet or devnet.
    #[arg(long, default_value = "mainnet", env = "KINSCRIBE_NETWORK")]
    pub network: String,

    /// Hex-encoded 32-byte secret key of the sending wallet. Prefer the
    /// environment variable over the command line.
    #[arg(long, env = "KINSCRIBE_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,

    /// API token for the HTTP API. A random token is generated if omitted.
    #[arg(long, env = "KINSCRIBE_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Address to bind the web server to.
    #[arg(long, default_value = "127.0.0.1", env = "KINSCRIBE_BIND")]
    pub bind: String,

    /// Port to listen on.
    #[arg(long, default_value = "3090", env = "KINSCRIBE_PORT")]
    pub port: u16,

    /// Sompi locked in each commit's script-hash output.
    #[arg(long, default_value_t = DEFAULT_ANCHOR_AMOUNT, env = "KINSCRIBE_ANCHOR_AMOUNT")]
    pub anchor_amount: u64,

    /// Fee in sompi paid by each commit and reveal transaction.
    #[arg(long, default_value_t = DEFAULT_PRIORITY_FEE, env = "KINSCRIBE_PRIORITY_FEE")]
    pub priority_fee: u64,

    /// Change below this many sompi is added to the fee.
    #[arg(long, default_value_t = DEFAULT_DUST_THRESHOLD, env = "KINSCRIBE_DUST_THRESHOLD")]
    pub dust_threshold: u64,

    /// Seconds between anchor polls.
    #[arg(long, default_value = "3", env = "KINSCRIBE_POLL_INTERVAL_SECS")]
    pub poll_interval_secs: u64,

    /// Anchor polls before a session fails.
    #[arg(long, default_value_t = DEFAULT_POLL_ATTEMPTS, env = "KINSCRIBE_POLL_ATTEMPTS")]
    pub poll_attempts: u32,

    /// Seconds before an unreleased UTXO reservation expires.
    #[arg(long, default_value = "600", env = "KINSCRIBE_RESERVATION_TIMEOUT_SECS")]
    pub reservation_timeout_secs: u64,
}

impl Cli {
    pub fn transfer_config(&self, network: NetworkId) -> TransferConfig {
        TransferConfig {
            network,
            anchor_amount: self.anchor_amount,
            priority_fee: self.priority_fee,
            dust_threshold: self.dust_threshold,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            poll_attempts: self.poll_attempts,
            reservation_timeout: Duration::from_secs(self.reservation_timeout_secs),
        }
    }
}
