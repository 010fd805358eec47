//! Per-input PSBT signing with keys exported from a [`KeySource`]

use super::KeySource;
use crate::error::{WalletError, WalletResult};
use crate::psbt::{spent_output, ToSignInput};
use bitcoin::hashes::Hash;
use bitcoin::key::{CompressedPublicKey, Keypair, TapTweak, TweakedPublicKey};
use bitcoin::psbt::Input;
use bitcoin::secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, Prevouts, SighashCache, TapSighashType};
use bitcoin::taproot::{LeafVersion, TapLeafHash};
use bitcoin::{ecdsa, taproot, Psbt, ScriptBuf, Transaction, TxOut};
use std::str::FromStr;
use tracing::debug;

/// Sign exactly `inputs` of `psbt`, ascending by input index.
///
/// Signatures land in `tap_key_sig`, `tap_script_sigs` or `partial_sigs`; nothing is finalized.
pub fn sign_inputs<K: KeySource + ?Sized>(source: &K, psbt: &mut Psbt, inputs: &[ToSignInput]) -> WalletResult<()> {
    let mut ordered: Vec<&ToSignInput> = inputs.iter().collect();
    ordered.sort_by_key(|input| input.index);

    let secp = Secp256k1::new();
    let tx = psbt.unsigned_tx.clone();
    let prevouts: Option<Vec<TxOut>> = (0..psbt.inputs.len()).map(|i| spent_output(psbt, i)).collect();

    for to_sign in ordered {
        let index = to_sign.index;
        if index >= psbt.inputs.len() {
            return Err(WalletError::InvalidIndex(format!("{} (psbt has {} inputs)", index, psbt.inputs.len())));
        }
        let pubkey = PublicKey::from_str(&to_sign.public_key)
            .map_err(|e| WalletError::InvalidPublicKey(format!("{}: {}", to_sign.public_key, e)))?;
        let secret = source.export_secret(&pubkey)?;
        let prevout = spent_output(psbt, index).ok_or_else(|| signing_error(index, "missing spent output"))?;

        let mut signer = InputSigner {
            secp: &secp,
            cache: SighashCache::new(&tx),
            index,
            secret,
            pubkey,
            prevout,
            allowed: to_sign.sighash_types.as_deref(),
        };
        let input = &mut psbt.inputs[index];
        let script = signer.prevout.script_pubkey.clone();

        if script.is_p2tr() {
            let all = prevouts.as_deref().ok_or_else(|| signing_error(index, "missing spent output of another input"))?;
            signer.sign_taproot(input, all, to_sign.disable_tweak_signer)?;
        } else if script.is_p2wpkh() {
            signer.sign_p2wpkh(input)?;
        } else if script.is_p2sh() {
            signer.sign_p2sh_p2wpkh(input)?;
        } else if script.is_p2pkh() {
            signer.sign_p2pkh(input)?;
        } else {
            return Err(signing_error(index, "unsupported output script"));
        }
        debug!(index, pubkey = %pubkey, "signed input");
    }
    Ok(())
}

fn signing_error(index: usize, reason: impl ToString) -> WalletError {
    WalletError::Signing { index, reason: reason.to_string() }
}

struct InputSigner<'a> {
    secp: &'a Secp256k1<All>,
    cache: SighashCache<&'a Transaction>,
    index: usize,
    secret: SecretKey,
    pubkey: PublicKey,
    prevout: TxOut,
    allowed: Option<&'a [u32]>,
}

impl InputSigner<'_> {
    fn check_allowed(&self, sighash: u32, default: u32) -> WalletResult<()> {
        let permitted = match self.allowed {
            Some(types) => types.contains(&sighash),
            None => sighash == default,
        };
        if permitted {
            Ok(())
        } else {
            Err(signing_error(self.index, format!("sighash type {} not allowed", sighash)))
        }
    }

    fn ecdsa_sighash_type(&self, input: &Input) -> WalletResult<EcdsaSighashType> {
        let sighash_type = input
            .sighash_type
            .map(|t| t.ecdsa_hash_ty())
            .transpose()
            .map_err(|e| signing_error(self.index, e))?
            .unwrap_or(EcdsaSighashType::All);
        self.check_allowed(sighash_type.to_u32(), EcdsaSighashType::All.to_u32())?;
        Ok(sighash_type)
    }

    fn wpkh_script(&self) -> ScriptBuf {
        ScriptBuf::new_p2wpkh(&CompressedPublicKey(self.pubkey).wpubkey_hash())
    }

    fn sign_taproot(&mut self, input: &mut Input, prevouts: &[TxOut], disable_tweak: bool) -> WalletResult<()> {
        let sighash_type = input
            .sighash_type
            .map(|t| t.taproot_hash_ty())
            .transpose()
            .map_err(|e| signing_error(self.index, e))?
            .unwrap_or(TapSighashType::Default);
        self.check_allowed(sighash_type as u32, TapSighashType::Default as u32)?;

        let prevouts = match sighash_type {
            TapSighashType::AllPlusAnyoneCanPay
            | TapSighashType::NonePlusAnyoneCanPay
            | TapSighashType::SinglePlusAnyoneCanPay => Prevouts::One(self.index, self.prevout.clone()),
            _ => Prevouts::All(prevouts),
        };
        let keypair = Keypair::from_secret_key(self.secp, &self.secret);
        let (xonly, _) = keypair.x_only_public_key();

        if !disable_tweak {
            let merkle_root = input.tap_merkle_root;
            if ScriptBuf::new_p2tr(self.secp, xonly, merkle_root) != self.prevout.script_pubkey {
                return Err(signing_error(self.index, "tweaked key does not match input script"));
            }
            let tweaked = keypair.tap_tweak(self.secp, merkle_root).to_keypair();
            let sighash = self
                .cache
                .taproot_key_spend_signature_hash(self.index, &prevouts, sighash_type)
                .map_err(|e| signing_error(self.index, e))?;
            let signature = self.secp.sign_schnorr_no_aux_rand(&Message::from_digest(sighash.to_byte_array()), &tweaked);
            input.tap_key_sig = Some(taproot::Signature { signature, sighash_type });
            return Ok(());
        }

        // Untweaked key: sign every leaf that commits to it, else a raw key spend
        let xonly_bytes = xonly.serialize();
        let leaves: Vec<(ScriptBuf, LeafVersion)> = input
            .tap_scripts
            .values()
            .filter(|(leaf, _)| leaf.as_bytes().windows(32).any(|w| w == &xonly_bytes[..]))
            .cloned()
            .collect();

        if leaves.is_empty() {
            if ScriptBuf::new_p2tr_tweaked(TweakedPublicKey::dangerous_assume_tweaked(xonly)) != self.prevout.script_pubkey {
                return Err(signing_error(self.index, "untweaked key does not match input script"));
            }
            let sighash = self
                .cache
                .taproot_key_spend_signature_hash(self.index, &prevouts, sighash_type)
                .map_err(|e| signing_error(self.index, e))?;
            let signature = self.secp.sign_schnorr_no_aux_rand(&Message::from_digest(sighash.to_byte_array()), &keypair);
            input.tap_key_sig = Some(taproot::Signature { signature, sighash_type });
            return Ok(());
        }

        for (leaf, version) in leaves {
            let leaf_hash = TapLeafHash::from_script(&leaf, version);
            let sighash = self
                .cache
                .taproot_script_spend_signature_hash(self.index, &prevouts, leaf_hash, sighash_type)
                .map_err(|e| signing_error(self.index, e))?;
            let signature = self.secp.sign_schnorr_no_aux_rand(&Message::from_digest(sighash.to_byte_array()), &keypair);
            input.tap_script_sigs.insert((xonly, leaf_hash), taproot::Signature { signature, sighash_type });
        }
        Ok(())
    }

    fn sign_p2wpkh(&mut self, input: &mut Input) -> WalletResult<()> {
        let script = self.wpkh_script();
        if script != self.prevout.script_pubkey {
            return Err(signing_error(self.index, "key does not match witness program"));
        }
        self.sign_segwit_v0(input, &script)
    }

    fn sign_p2sh_p2wpkh(&mut self, input: &mut Input) -> WalletResult<()> {
        let redeem = self.wpkh_script();
        if ScriptBuf::new_p2sh(&redeem.script_hash()) != self.prevout.script_pubkey {
            return Err(signing_error(self.index, "key does not match p2sh-p2wpkh script"));
        }
        match &input.redeem_script {
            Some(existing) if *existing != redeem => {
                return Err(signing_error(self.index, "redeem script does not match key"));
            }
            Some(_) => {}
            None => input.redeem_script = Some(redeem.clone()),
        }
        self.sign_segwit_v0(input, &redeem)
    }

    fn sign_segwit_v0(&mut self, input: &mut Input, wpkh: &ScriptBuf) -> WalletResult<()> {
        let sighash_type = self.ecdsa_sighash_type(input)?;
        let sighash = self
            .cache
            .p2wpkh_signature_hash(self.index, wpkh, self.prevout.value, sighash_type)
            .map_err(|e| signing_error(self.index, e))?;
        let signature = self.secp.sign_ecdsa(&Message::from_digest(sighash.to_byte_array()), &self.secret);
        input
            .partial_sigs
            .insert(bitcoin::PublicKey::new(self.pubkey), ecdsa::Signature { signature, sighash_type });
        Ok(())
    }

    fn sign_p2pkh(&mut self, input: &mut Input) -> WalletResult<()> {
        if input.non_witness_utxo.is_none() {
            return Err(signing_error(self.index, "legacy input requires the full previous transaction"));
        }
        let key = bitcoin::PublicKey::new(self.pubkey);
        if ScriptBuf::new_p2pkh(&key.pubkey_hash()) != self.prevout.script_pubkey {
            return Err(signing_error(self.index, "key does not match p2pkh script"));
        }
        let sighash_type = self.ecdsa_sighash_type(input)?;
        let sighash = self
            .cache
            .legacy_signature_hash(self.index, &self.prevout.script_pubkey, sighash_type.to_u32())
            .map_err(|e| signing_error(self.index, e))?;
        let signature = self.secp.sign_ecdsa(&Message::from_digest(sighash.to_byte_array()), &self.secret);
        input.partial_sigs.insert(key, ecdsa::Signature { signature, sighash_type });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyring::SimpleKeyring;
    use crate::psbt::finalize_input;
    use bitcoin::absolute::LockTime;
    use bitcoin::psbt::PsbtSighashType;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, OutPoint, Sequence, TxIn, Witness};

    const SECRET: &str = "0000000000000000000000000000000000000000000000000000000000000003";

    fn keyring() -> (SimpleKeyring, PublicKey) {
        let keyring = SimpleKeyring::import(&[SECRET]).unwrap();
        let pk = keyring.public_keys()[0];
        (keyring, pk)
    }

    fn psbt_spending(script_pubkey: ScriptBuf) -> Psbt {
        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                witness: Witness::new(),
            }],
            output: vec![TxOut { value: Amount::from_sat(9_000), script_pubkey: script_pubkey.clone() }],
        };
        let mut psbt = Psbt::from_unsigned_tx(tx).unwrap();
        psbt.inputs[0].witness_utxo = Some(TxOut { value: Amount::from_sat(10_000), script_pubkey });
        psbt
    }

    #[test]
    fn signs_taproot_key_path() {
        let (keyring, pk) = keyring();
        let secp = Secp256k1::new();
        let mut psbt = psbt_spending(ScriptBuf::new_p2tr(&secp, pk.x_only_public_key().0, None));
        sign_inputs(&keyring, &mut psbt, &[ToSignInput::new(0, pk.to_string())]).unwrap();
        let sig = psbt.inputs[0].tap_key_sig.unwrap();
        assert_eq!(sig.sighash_type, TapSighashType::Default);
        finalize_input(&mut psbt, 0).unwrap();
        assert_eq!(psbt.inputs[0].final_script_witness.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn signs_native_segwit() {
        let (keyring, pk) = keyring();
        let mut psbt = psbt_spending(ScriptBuf::new_p2wpkh(&CompressedPublicKey(pk).wpubkey_hash()));
        sign_inputs(&keyring, &mut psbt, &[ToSignInput::new(0, pk.to_string())]).unwrap();
        assert_eq!(psbt.inputs[0].partial_sigs.len(), 1);
        finalize_input(&mut psbt, 0).unwrap();
        assert_eq!(psbt.inputs[0].final_script_witness.as_ref().unwrap().len(), 2);
        assert!(psbt.inputs[0].partial_sigs.is_empty());
    }

    #[test]
    fn signs_wrapped_segwit_and_attaches_redeem_script() {
        let (keyring, pk) = keyring();
        let redeem = ScriptBuf::new_p2wpkh(&CompressedPublicKey(pk).wpubkey_hash());
        let mut psbt = psbt_spending(ScriptBuf::new_p2sh(&redeem.script_hash()));
        sign_inputs(&keyring, &mut psbt, &[ToSignInput::new(0, pk.to_string())]).unwrap();
        assert_eq!(psbt.inputs[0].redeem_script.as_ref(), Some(&redeem));
        finalize_input(&mut psbt, 0).unwrap();
        assert!(psbt.inputs[0].final_script_sig.is_some());
    }

    #[test]
    fn sighash_outside_whitelist_is_refused() {
        let (keyring, pk) = keyring();
        let secp = Secp256k1::new();
        let mut psbt = psbt_spending(ScriptBuf::new_p2tr(&secp, pk.x_only_public_key().0, None));
        psbt.inputs[0].sighash_type = Some(PsbtSighashType::from(TapSighashType::AllPlusAnyoneCanPay));

        let err = sign_inputs(&keyring, &mut psbt, &[ToSignInput::new(0, pk.to_string())]).unwrap_err();
        assert!(matches!(err, WalletError::Signing { index: 0, .. }));

        let mut allowed = ToSignInput::new(0, pk.to_string());
        allowed.sighash_types = Some(vec![TapSighashType::AllPlusAnyoneCanPay as u32]);
        sign_inputs(&keyring, &mut psbt, &[allowed]).unwrap();
        assert!(psbt.inputs[0].tap_key_sig.is_some());
    }

    #[test]
    fn untweaked_signer_needs_untweaked_output() {
        let (keyring, pk) = keyring();
        let secp = Secp256k1::new();
        let mut psbt = psbt_spending(ScriptBuf::new_p2tr(&secp, pk.x_only_public_key().0, None));
        let mut input = ToSignInput::new(0, pk.to_string());
        input.disable_tweak_signer = true;
        assert!(sign_inputs(&keyring, &mut psbt, &[input.clone()]).is_err());

        let raw = TweakedPublicKey::dangerous_assume_tweaked(pk.x_only_public_key().0);
        let mut psbt = psbt_spending(ScriptBuf::new_p2tr_tweaked(raw));
        sign_inputs(&keyring, &mut psbt, &[input]).unwrap();
        assert!(psbt.inputs[0].tap_key_sig.is_some());
    }

    #[test]
    fn foreign_key_and_bad_index() {
        let (keyring, pk) = keyring();
        let other = SimpleKeyring::import(&["0000000000000000000000000000000000000000000000000000000000000004"]).unwrap();
        let mut psbt = psbt_spending(ScriptBuf::new_p2wpkh(&CompressedPublicKey(pk).wpubkey_hash()));
        let err = sign_inputs(&other, &mut psbt, &[ToSignInput::new(0, pk.to_string())]).unwrap_err();
        assert!(matches!(err, WalletError::SigningKeyUnavailable { .. }));

        let err = sign_inputs(&keyring, &mut psbt, &[ToSignInput::new(7, pk.to_string())]).unwrap_err();
        assert!(matches!(err, WalletError::InvalidIndex(_)));
    }
}
