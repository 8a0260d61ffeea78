use std::time::Duration;

use crate::address::NetworkId;
use crate::error::CoreError;

pub const DEFAULT_ANCHOR_AMOUNT: u64 = 30_000_000;
pub const DEFAULT_PRIORITY_FEE: u64 = 1_000_000;
pub const DEFAULT_DUST_THRESHOLD: u64 = 1_000;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_POLL_ATTEMPTS: u32 = 10;
pub const DEFAULT_RESERVATION_TIMEOUT: Duration = Duration::from_secs(600);

/// Amounts are in sompi.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    pub network: NetworkId,
    /// Value locked in the commit's script-hash output.
    pub anchor_amount: u64,
    /// Whole fee of each transaction. There is no mass-based estimation.
    pub priority_fee: u64,
    pub dust_threshold: u64,
    pub poll_interval: Duration,
    pub poll_attempts: u32,
    pub reservation_timeout: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            network: NetworkId::Mainnet,
            anchor_amount: DEFAULT_ANCHOR_AMOUNT,
            priority_fee: DEFAULT_PRIORITY_FEE,
            dust_threshold: DEFAULT_DUST_THRESHOLD,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
            reservation_timeout: DEFAULT_RESERVATION_TIMEOUT,
        }
    }
}

impl TransferConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.anchor_amount == 0 || self.anchor_amount < self.dust_threshold {
            return Err(CoreError::InvalidConfig(format!(
                "anchor amount {} must be positive and at least the dust threshold {}",
                self.anchor_amount, self.dust_threshold
            )));
        }
        if self.anchor_amount.checked_add(self.priority_fee).is_none() {
            return Err(CoreError::InvalidConfig(
                "anchor amount plus priority fee overflows".into(),
            ));
        }
        if self.poll_attempts == 0 {
            return Err(CoreError::InvalidConfig(
                "poll attempts must be at least 1".into(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(CoreError::InvalidConfig(
                "poll interval must be non-zero".into(),
            ));
        }
        if self.reservation_timeout.is_zero() {
            return Err(CoreError::InvalidConfig(
                "reservation timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
