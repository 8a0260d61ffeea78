/// Structured RPC failure, separating transport problems from
/// node-reported JSON-RPC errors.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server error {code}: {message}")]
    ServerError { code: i64, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("response id {found} does not match request id {expected}")]
    UnexpectedResponseId { expected: u64, found: String },
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("payload too large: {len} bytes exceeds {max}")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("insufficient funds: required {required} sompi, available {available} sompi")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("anchor output not found after {attempts} attempts")]
    AnchorNotFound { attempts: u32 },

    #[error("node unavailable: {0}")]
    NodeUnavailable(String),

    #[error("transaction rejected by node: {0}")]
    RejectedByNode(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("transfer cancelled")]
    Cancelled,

    #[error("invalid session state: {0}")]
    InvalidState(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("RPC communication failure: {0}")]
    Rpc(#[from] RpcError),
}

impl CoreError {
    /// Validation failures are detected before any network I/O and are
    /// never retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidPayload(_)
                | Self::PayloadTooLarge { .. }
                | Self::UnsupportedNetwork(_)
                | Self::InvalidAddress(_)
        )
    }
}
