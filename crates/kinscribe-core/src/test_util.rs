//! Shared test helpers for `kinscribe-core` unit tests.

use kaspa_consensus_core::tx::{ScriptPublicKey, TransactionId, TransactionOutpoint, UtxoEntry};

use crate::address::{p2pk_address, parse_address, pay_to_address_script, Address, NetworkId};
use crate::types::UtxoWithOutpoint;

/// Secret key `1`; its x-only public key is the curve generator's x.
pub const TEST_SECRET_KEY: [u8; 32] = {
    let mut key = [0u8; 32];
    key[31] = 1;
    key
};

pub const TEST_X_ONLY: [u8; 32] = [
    0x79, 0xbe, 0x66, 0x7e, 0xf9, 0xdc, 0xbb, 0xac, 0x55, 0xa0, 0x62, 0x95, 0xce, 0x87, 0x0b, 0x07,
    0x02, 0x9b, 0xfc, 0xdb, 0x2d, 0xce, 0x28, 0xd9, 0x59, 0xf2, 0x81, 0x5b, 0x16, 0xf8, 0x17, 0x98,
];

pub const RECIPIENT: &str = "kaspa:qqev4q2sya03t59de53rmlxtgvpfy84p0ftukg6yrdnwz29vcph2x9sqah2h5";

/// A deterministic transaction id from a single distinguishing byte.
pub fn txid_from_byte(b: u8) -> TransactionId {
    let mut bytes = [0u8; 32];
    bytes[0] = b;
    TransactionId::from_bytes(bytes)
}

pub fn sender_address() -> Address {
    p2pk_address(NetworkId::Mainnet, &TEST_X_ONLY)
}

pub fn sender_script() -> ScriptPublicKey {
    pay_to_address_script(&sender_address())
}

pub fn recipient_address() -> Address {
    parse_address(RECIPIENT).expect("static recipient must parse")
}

pub fn test_entry(outpoint: TransactionOutpoint, amount: u64, script_public_key: ScriptPublicKey) -> UtxoWithOutpoint {
    UtxoWithOutpoint::new(outpoint, UtxoEntry::new(amount, script_public_key, 1_000, false))
}

/// A spendable output owned by the test sender.
pub fn sender_entry(txid_byte: u8, index: u32, amount: u64) -> UtxoWithOutpoint {
    test_entry(
        TransactionOutpoint::new(txid_from_byte(txid_byte), index),
        amount,
        sender_script(),
    )
}
