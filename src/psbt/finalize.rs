//! Input finalization: partial signatures → final script_sig / witness

use super::spent_output;
use crate::error::{WalletError, WalletResult};
use bitcoin::psbt::Input;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::taproot::TapLeafHash;
use bitcoin::{ecdsa, Psbt, PublicKey, Script, ScriptBuf, Witness};

pub fn is_finalized(input: &Input) -> bool {
    input.final_script_sig.is_some() || input.final_script_witness.is_some()
}

/// Assemble the final script/witness of input `index` and clear its signing metadata.
///
/// Supports single-key P2TR (key or script path), P2WPKH, P2SH-P2WPKH and P2PKH.
pub fn finalize_input(psbt: &mut Psbt, index: usize) -> WalletResult<()> {
    let fail = |reason: &str| WalletError::FinalizationFailed { index, reason: reason.to_string() };

    let prevout = spent_output(psbt, index).ok_or_else(|| fail("missing spent output"))?;
    let input = psbt.inputs.get_mut(index).ok_or_else(|| fail("no such input"))?;
    if is_finalized(input) {
        return Err(fail("already finalized"));
    }
    let script = prevout.script_pubkey.as_script();

    if script.is_p2tr() {
        input.final_script_witness = Some(taproot_witness(input).ok_or_else(|| fail("no taproot signature"))?);
    } else if script.is_p2wpkh() {
        let (pk, sig) = ecdsa_sig_for(input, script, wpkh_script).ok_or_else(|| fail("no signature for witness key"))?;
        input.final_script_witness = Some(Witness::p2wpkh(&sig, &pk.inner));
    } else if script.is_p2sh() {
        let redeem = input.redeem_script.clone().ok_or_else(|| fail("missing redeem script"))?;
        if !redeem.is_p2wpkh() || ScriptBuf::new_p2sh(&redeem.script_hash()).as_script() != script {
            return Err(fail("unsupported p2sh redeem script"));
        }
        let (pk, sig) = ecdsa_sig_for(input, &redeem, wpkh_script).ok_or_else(|| fail("no signature for witness key"))?;
        let push = PushBytesBuf::try_from(redeem.to_bytes()).map_err(|e| fail(&e.to_string()))?;
        input.final_script_sig = Some(Builder::new().push_slice(push).into_script());
        input.final_script_witness = Some(Witness::p2wpkh(&sig, &pk.inner));
    } else if script.is_p2pkh() {
        let (pk, sig) = ecdsa_sig_for(input, script, pkh_script).ok_or_else(|| fail("no signature for key hash"))?;
        input.final_script_sig = Some(Builder::new().push_slice(sig.serialize()).push_key(&pk).into_script());
    } else {
        return Err(fail("unsupported output script"));
    }

    clear_signing_data(input);
    Ok(())
}

fn taproot_witness(input: &Input) -> Option<Witness> {
    if let Some(sig) = input.tap_key_sig {
        return Some(Witness::from_slice(&[sig.to_vec()]));
    }
    input.tap_script_sigs.iter().find_map(|((_, leaf_hash), sig)| {
        input.tap_scripts.iter().find_map(|(control_block, (leaf_script, version))| {
            (TapLeafHash::from_script(leaf_script, *version) == *leaf_hash).then(|| {
                Witness::from_slice(&[sig.to_vec(), leaf_script.to_bytes(), control_block.serialize()])
            })
        })
    })
}

fn wpkh_script(pk: &PublicKey) -> Option<ScriptBuf> {
    pk.wpubkey_hash().ok().map(|hash| ScriptBuf::new_p2wpkh(&hash))
}

fn pkh_script(pk: &PublicKey) -> Option<ScriptBuf> {
    Some(ScriptBuf::new_p2pkh(&pk.pubkey_hash()))
}

/// Partial signature whose key produces `script`
fn ecdsa_sig_for(
    input: &Input,
    script: &Script,
    script_for: fn(&PublicKey) -> Option<ScriptBuf>,
) -> Option<(PublicKey, ecdsa::Signature)> {
    input
        .partial_sigs
        .iter()
        .find(|(pk, _)| script_for(pk).as_deref() == Some(script))
        .map(|(pk, sig)| (*pk, *sig))
}

fn clear_signing_data(input: &mut Input) {
    input.partial_sigs.clear();
    input.sighash_type = None;
    input.redeem_script = None;
    input.witness_script = None;
    input.bip32_derivation.clear();
    input.tap_key_sig = None;
    input.tap_script_sigs.clear();
    input.tap_scripts.clear();
    input.tap_key_origins.clear();
    input.tap_internal_key = None;
    input.tap_merkle_root = None;
}
