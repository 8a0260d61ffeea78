use std::fmt;

use async_trait::async_trait;
use bitcoin::secp256k1::{All, Keypair, Message, Secp256k1};
use kaspa_consensus_core::hashing::sighash_type::{SigHashType, SIG_HASH_ALL};
use kaspa_consensus_core::tx::{ScriptPublicKey, Transaction, UtxoEntry};

use crate::address::{p2pk_address, p2sh_script_public_key, pay_to_address_script, NetworkId};
use crate::envelope::{EnvelopeKey, ScriptEnvelope};
use crate::error::CoreError;
use crate::tx::{schnorr_sighash, sig_hash_all_anyone_can_pay};
use crate::types::{outpoint_label, UtxoWithOutpoint};

use super::{
    check_entries, full_signature_script, script_path_signature_script, SignedTransaction, Signer,
    SigningMode,
};

/// In-process Schnorr signer holding a single secret key.
pub struct LocalSigner {
    secp: Secp256k1<All>,
    keypair: Keypair,
    x_only: [u8; 32],
    /// Pay-to-public-key script of `x_only`; identical on every network.
    own_script: ScriptPublicKey,
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("public_key", &hex::encode(self.x_only))
            .finish_non_exhaustive()
    }
}

impl LocalSigner {
    pub fn from_secret_bytes(secret: &[u8]) -> Result<Self, CoreError> {
        let secp = Secp256k1::new();
        let keypair = Keypair::from_seckey_slice(&secp, secret)
            .map_err(|e| CoreError::Signing(format!("invalid secret key: {e}")))?;
        let (x_only, _parity) = keypair.x_only_public_key();
        let x_only = x_only.serialize();
        let own_script = pay_to_address_script(&p2pk_address(NetworkId::Mainnet, &x_only));
        Ok(Self {
            secp,
            keypair,
            x_only,
            own_script,
        })
    }

    pub fn from_hex(secret_hex: &str) -> Result<Self, CoreError> {
        let mut secret = [0u8; 32];
        hex::decode_to_slice(secret_hex.trim(), &mut secret)
            .map_err(|e| CoreError::Signing(format!("invalid secret key hex: {e}")))?;
        Self::from_secret_bytes(&secret)
    }

    /// 64-byte Schnorr signature followed by the sighash type byte.
    fn sign_input(
        &self,
        tx: &Transaction,
        entries: &[UtxoEntry],
        input_index: usize,
        hash_type: SigHashType,
    ) -> [u8; 65] {
        let digest = schnorr_sighash(tx, entries, input_index, hash_type);
        let message = Message::from_digest(digest);
        let signature = self.secp.sign_schnorr_no_aux_rand(&message, &self.keypair);

        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&signature.serialize());
        out[64] = hash_type.to_u8();
        out
    }

    fn ensure_own_entry(&self, index: usize, utxo: &UtxoWithOutpoint) -> Result<(), CoreError> {
        if utxo.script_public_key() != &self.own_script {
            return Err(CoreError::Signing(format!(
                "input {index} ({}) is not locked to this signer's key",
                outpoint_label(&utxo.outpoint)
            )));
        }
        Ok(())
    }

    fn embeds_own_key(&self, redeem_script: &[u8]) -> bool {
        ScriptEnvelope::parse(redeem_script)
            .map(|envelope| *envelope.public_key() == EnvelopeKey::Schnorr(self.x_only))
            .unwrap_or(false)
    }
}

fn spent_entries(entries: &[UtxoWithOutpoint]) -> Vec<UtxoEntry> {
    entries.iter().map(|utxo| utxo.entry.clone()).collect()
}

#[async_trait]
impl Signer for LocalSigner {
    fn public_key(&self) -> [u8; 32] {
        self.x_only
    }

    async fn sign_full(
        &self,
        tx: &Transaction,
        entries: &[UtxoWithOutpoint],
    ) -> Result<SignedTransaction, CoreError> {
        check_entries(tx, entries)?;
        let spent = spent_entries(entries);
        let mut signed = tx.clone();
        for (index, utxo) in entries.iter().enumerate() {
            self.ensure_own_entry(index, utxo)?;
            let signature = self.sign_input(tx, &spent, index, SIG_HASH_ALL);
            signed.inputs[index].signature_script = full_signature_script(&signature);
        }
        Ok(SignedTransaction {
            tx: signed,
            mode: SigningMode::Full,
        })
    }

    async fn sign_script_path(
        &self,
        tx: &Transaction,
        entries: &[UtxoWithOutpoint],
        input_index: usize,
        redeem_script: &[u8],
    ) -> Result<SignedTransaction, CoreError> {
        check_entries(tx, entries)?;
        let anchor = entries.get(input_index).ok_or_else(|| {
            CoreError::Signing(format!(
                "script-path input {input_index} out of range for {} inputs",
                entries.len()
            ))
        })?;
        if anchor.script_public_key() != &p2sh_script_public_key(redeem_script) {
            return Err(CoreError::Signing(format!(
                "redeem script does not hash to the output spent by input {input_index}"
            )));
        }
        if !self.embeds_own_key(redeem_script) {
            return Err(CoreError::Signing(
                "redeem script does not commit to this signer's key".into(),
            ));
        }

        let spent = spent_entries(entries);
        let anyone_can_pay = sig_hash_all_anyone_can_pay()?;
        let mut signed = tx.clone();
        for (index, utxo) in entries.iter().enumerate() {
            signed.inputs[index].signature_script = if index == input_index {
                let signature = self.sign_input(tx, &spent, index, anyone_can_pay);
                script_path_signature_script(&signature, redeem_script)?
            } else {
                self.ensure_own_entry(index, utxo)?;
                let signature = self.sign_input(tx, &spent, index, SIG_HASH_ALL);
                full_signature_script(&signature)
            };
        }
        Ok(SignedTransaction {
            tx: signed,
            mode: SigningMode::ScriptPath { input_index },
        })
    }
}
