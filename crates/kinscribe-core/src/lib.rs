pub mod address;
pub mod envelope;
pub mod error;
pub mod inscription;
pub mod reservation;
pub mod rpc;
pub mod signer;
pub mod transfer;
pub mod tx;
pub mod types;

#[cfg(test)]
mod test_util;

pub use address::{Address, NetworkId};
pub use envelope::ScriptEnvelope;
pub use error::CoreError;
pub use inscription::InscriptionPayload;
pub use transfer::{TransferConfig, TransferOrchestrator, TransferRequest, TransferSession};
