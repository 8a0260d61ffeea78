//! Transaction construction, signature hashing and the commit / reveal
//! builders.

pub mod builder;
pub mod transaction;

pub use builder::{
    build_commit, build_reveal, select_funding, UnsignedTransaction, ANCHOR_INPUT_INDEX,
    ANCHOR_OUTPUT_INDEX,
};
pub use transaction::{
    new_transaction, schnorr_sighash, sig_hash_all_anyone_can_pay, total_output, unsigned_input,
    DEFAULT_SIG_OP_COUNT,
};
