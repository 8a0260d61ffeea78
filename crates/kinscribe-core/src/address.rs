//! Kaspa network ids and address helpers.
//!
//! Address encoding itself comes from `kaspa-addresses`; this module maps
//! the service's network names onto address prefixes and applies the
//! stricter parsing rules the service needs.

use std::fmt;
use std::str::FromStr;

use kaspa_addresses::{Prefix, Version};
use kaspa_consensus_core::tx::ScriptPublicKey;
use kaspa_txscript::standard::{extract_script_pub_key_address, pay_to_script_hash_script};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub use kaspa_addresses::Address;
pub use kaspa_txscript::pay_to_address_script;

// ==============================================================================
// Network Id
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    Mainnet,
    Testnet,
    Simnet,
    Devnet,
}

impl NetworkId {
    pub fn prefix(self) -> Prefix {
        match self {
            Self::Mainnet => Prefix::Mainnet,
            Self::Testnet => Prefix::Testnet,
            Self::Simnet => Prefix::Simnet,
            Self::Devnet => Prefix::Devnet,
        }
    }

    pub fn address_prefix(self) -> &'static str {
        match self {
            Self::Mainnet => "kaspa",
            Self::Testnet => "kaspatest",
            Self::Simnet => "kaspasim",
            Self::Devnet => "kaspadev",
        }
    }
}

impl From<Prefix> for NetworkId {
    fn from(prefix: Prefix) -> Self {
        match prefix {
            Prefix::Mainnet => Self::Mainnet,
            Prefix::Testnet => Self::Testnet,
            Prefix::Simnet => Self::Simnet,
            Prefix::Devnet => Self::Devnet,
        }
    }
}

impl FromStr for NetworkId {
    type Err = CoreError;

    /// Accepts `mainnet`, `testnet`, `testnet-<suffix>`, `simnet`, `devnet`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "simnet" => Ok(Self::Simnet),
            "devnet" => Ok(Self::Devnet),
            "testnet" => Ok(Self::Testnet),
            other => match other.strip_prefix("testnet-") {
                Some(suffix) if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) => {
                    Ok(Self::Testnet)
                }
                _ => Err(CoreError::UnsupportedNetwork(s.to_owned())),
            },
        }
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
            Self::Simnet => write!(f, "simnet"),
            Self::Devnet => write!(f, "devnet"),
        }
    }
}

// ==============================================================================
// Address Helpers
// ==============================================================================

pub fn network_of(address: &Address) -> NetworkId {
    address.prefix.into()
}

fn payload_len(version: Version) -> usize {
    match version {
        Version::PubKey | Version::ScriptHash => 32,
        Version::PubKeyECDSA => 33,
    }
}

/// Pay-to-public-key address for a 32-byte x-only Schnorr key.
pub fn p2pk_address(network: NetworkId, x_only: &[u8; 32]) -> Address {
    Address::new(network.prefix(), Version::PubKey, x_only)
}

/// Pay-to-script-hash address committing to `redeem_script`.
pub fn p2sh_address(network: NetworkId, redeem_script: &[u8]) -> Result<Address, CoreError> {
    let spk = pay_to_script_hash_script(redeem_script);
    extract_script_pub_key_address(&spk, network.prefix())
        .map_err(|e| CoreError::InvalidAddress(format!("derive script-hash address: {e}")))
}

/// Locking script of a pay-to-script-hash output for `redeem_script`.
pub fn p2sh_script_public_key(redeem_script: &[u8]) -> ScriptPublicKey {
    pay_to_script_hash_script(redeem_script)
}

/// Decode an address string. Only the canonical encoding is accepted: the
/// payload must have the length its version implies and re-encoding must
/// reproduce the input exactly, which rules out non-zero padding bits.
pub fn parse_address(s: &str) -> Result<Address, CoreError> {
    let invalid = |msg: String| CoreError::InvalidAddress(format!("`{s}`: {msg}"));

    let address = Address::try_from(s).map_err(|e| invalid(e.to_string()))?;
    let expected = payload_len(address.version);
    if address.payload.len() != expected {
        return Err(invalid(format!(
            "{:?} payload must be {expected} bytes, got {}",
            address.version,
            address.payload.len()
        )));
    }
    if address.to_string() != s {
        return Err(invalid("non-canonical encoding".into()));
    }
    Ok(address)
}

/// Parse an address and require it to belong to `network`.
pub fn parse_address_for_network(s: &str, network: NetworkId) -> Result<Address, CoreError> {
    let address = parse_address(s)?;
    let found = network_of(&address);
    if found != network {
        return Err(CoreError::InvalidAddress(format!(
            "address `{s}` belongs to {found} but {network} was expected"
        )));
    }
    Ok(address)
}

#[cfg(test)]
mod tests {
    use kaspa_txscript::opcodes::codes::{OpBlake2b, OpCheckSig, OpData32, OpEqual};

    use super::*;

    const SENDER: &str = "kaspa:qp4dgqnu0y4zrqfam76v5qnxrgh5sxveud89wucx2a6h08amw6psx2u6qvs87";

    #[test]
    fn decodes_known_mainnet_address() {
        let address = parse_address(SENDER).expect("address must parse");
        assert_eq!(network_of(&address), NetworkId::Mainnet);
        assert_eq!(address.version, Version::PubKey);
        assert_eq!(
            hex::encode(&address.payload[..]),
            "6ad4027c792a21813ddfb4ca02661a2f481999e34e5773065775779fbb768303"
        );
        assert_eq!(address.to_string(), SENDER);
    }

    #[test]
    fn rejects_corrupted_checksum() {
        let mut corrupted = SENDER.to_owned();
        corrupted.pop();
        corrupted.push('q');
        let err = parse_address(&corrupted).expect_err("must reject");
        assert!(matches!(err, CoreError::InvalidAddress(_)));
    }

    #[test]
    fn rejects_unknown_prefix_and_characters() {
        assert!(parse_address("bitcoin:qqqq").is_err());
        assert!(parse_address("kaspa:qp4dgqnu0y4zrqfam76v5qnxrgh5sxveud89wucx2a6h08amw6psx2u6qvsb1").is_err());
    }

    #[test]
    fn rejects_non_zero_padding_bits() {
        // SENDER with the single padding bit of its last data word set and
        // the checksum recomputed, so only the padding is wrong.
        let padded = "kaspa:qp4dgqnu0y4zrqfam76v5qnxrgh5sxveud89wucx2a6h08amw6ps8elrt4n5l";
        let err = parse_address(padded).expect_err("must reject");
        assert!(matches!(err, CoreError::InvalidAddress(_)));
    }

    #[test]
    fn network_mismatch_is_rejected() {
        let err = parse_address_for_network(SENDER, NetworkId::Testnet).expect_err("must reject");
        assert!(matches!(err, CoreError::InvalidAddress(_)));
        assert!(parse_address_for_network(SENDER, NetworkId::Mainnet).is_ok());
    }

    #[test]
    fn script_hash_address_roundtrips_on_every_network() {
        for network in [
            NetworkId::Mainnet,
            NetworkId::Testnet,
            NetworkId::Simnet,
            NetworkId::Devnet,
        ] {
            let address = p2sh_address(network, b"redeem").expect("derive");
            let rendered = address.to_string();
            assert!(rendered.starts_with(network.address_prefix()));
            assert_eq!(parse_address(&rendered).expect("must parse"), address);
            assert_eq!(network_of(&address), network);
        }
    }

    #[test]
    fn script_public_key_shapes() {
        let p2pk = parse_address(SENDER).expect("address must parse");
        let spk = pay_to_address_script(&p2pk);
        assert_eq!(spk.script().len(), 34);
        assert_eq!(spk.script()[0], OpData32);
        assert_eq!(spk.script()[33], OpCheckSig);

        let p2sh = p2sh_address(NetworkId::Mainnet, b"redeem").expect("derive");
        let spk = pay_to_address_script(&p2sh);
        assert_eq!(spk, p2sh_script_public_key(b"redeem"));
        assert_eq!(spk.script().len(), 35);
        assert_eq!(&spk.script()[..2], &[OpBlake2b, OpData32]);
        assert_eq!(&spk.script()[2..34], &p2sh.payload[..]);
        assert_eq!(spk.script()[34], OpEqual);
    }

    #[test]
    fn public_key_address_golden_value() {
        let mut x_only = [0u8; 32];
        hex::decode_to_slice(
            "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
            &mut x_only,
        )
        .expect("static key hex");
        assert_eq!(
            p2pk_address(NetworkId::Mainnet, &x_only).to_string(),
            "kaspa:qpumuen7l8wthtz45p3ftn58pvrs9xlumvkuu2xet8egzkcklqtes4ypce9sf"
        );
    }

    #[test]
    fn parses_network_ids() {
        assert_eq!("mainnet".parse::<NetworkId>().expect("ok"), NetworkId::Mainnet);
        assert_eq!("testnet-10".parse::<NetworkId>().expect("ok"), NetworkId::Testnet);
        assert_eq!("Testnet-11".parse::<NetworkId>().expect("ok"), NetworkId::Testnet);
        assert!(matches!(
            "regtest".parse::<NetworkId>(),
            Err(CoreError::UnsupportedNetwork(_))
        ));
        assert!("testnet-".parse::<NetworkId>().is_err());
        assert_eq!(NetworkId::from(NetworkId::Devnet.prefix()), NetworkId::Devnet);
    }
}
