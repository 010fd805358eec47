//! Signing orchestration for the current account

use super::{decode_psbt_hex, encode_psbt_hex, finalize_input, is_finalized, resolve_implicit, resolve_sign_inputs};
use super::{ToSignInput, UserToSignInput};
use crate::address::x_only_hex;
use crate::core::AddressType;
use crate::error::WalletResult;
use crate::keyring::{KeySource, Keyring};
use crate::session::{SigningContext, WalletSession};
use bitcoin::secp256k1::Secp256k1;
use bitcoin::{Psbt, ScriptBuf};
use tracing::{debug, info};

/// Sign `psbt` with the current account.
///
/// Without inputs (or with an empty list) the inputs are resolved by scanning the PSBT and
/// finalization is forced on. Work happens on a copy; `psbt` is only replaced once every
/// input has been signed and, if requested, finalized.
pub fn sign_psbt(
    session: &WalletSession,
    psbt: &mut Psbt,
    inputs: Option<Vec<ToSignInput>>,
    auto_finalize: bool,
) -> WalletResult<Vec<ToSignInput>> {
    session.with_signing_keyring(|context, keyring| {
        let (inputs, auto_finalize) = match inputs {
            Some(inputs) if !inputs.is_empty() => (inputs, auto_finalize),
            _ => (resolve_implicit(&context.account, psbt, context.network), true),
        };
        sign_resolved(context, keyring, psbt, inputs, auto_finalize)
    })
}

/// Resolve caller instructions against the current account, then sign.
pub fn sign_psbt_with_options(
    session: &WalletSession,
    psbt: &mut Psbt,
    inputs: Option<&[UserToSignInput]>,
    auto_finalize: bool,
) -> WalletResult<Vec<ToSignInput>> {
    session.with_signing_keyring(|context, keyring| {
        let explicit = inputs.map_or(false, |inputs| !inputs.is_empty());
        let resolved = resolve_sign_inputs(&context.account, psbt, inputs, context.network)?;
        sign_resolved(context, keyring, psbt, resolved, auto_finalize || !explicit)
    })
}

/// Hex in, hex out variant of [`sign_psbt_with_options`]
pub fn sign_psbt_hex(
    session: &WalletSession,
    psbt_hex: &str,
    inputs: Option<&[UserToSignInput]>,
    auto_finalize: bool,
) -> WalletResult<String> {
    let mut psbt = decode_psbt_hex(psbt_hex)?;
    sign_psbt_with_options(session, &mut psbt, inputs, auto_finalize)?;
    Ok(encode_psbt_hex(&psbt))
}

fn sign_resolved(
    context: &SigningContext,
    keyring: &Keyring,
    psbt: &mut Psbt,
    inputs: Vec<ToSignInput>,
    auto_finalize: bool,
) -> WalletResult<Vec<ToSignInput>> {
    let mut working = psbt.clone();
    let fixed = apply_taproot_internal_key_fixup(&mut working, &context.account.pubkey, context.keyring.address_type)?;
    if fixed > 0 {
        debug!(inputs = fixed, "attached missing taproot internal keys");
    }

    keyring.sign(&mut working, &inputs)?;

    if auto_finalize {
        let mut indexes: Vec<usize> = inputs.iter().map(|input| input.index).collect();
        indexes.sort_unstable();
        indexes.dedup();
        for index in indexes {
            finalize_input(&mut working, index)?;
        }
    }

    *psbt = working;
    info!(
        account = %context.account.address,
        inputs = inputs.len(),
        finalized = auto_finalize,
        "psbt signed"
    );
    Ok(inputs)
}

/// Attach the account's x-only key as `tap_internal_key` on unfinalized inputs that lack
/// one and whose witness UTXO is the single-key P2TR output of that key.
///
/// Only applies to taproot address types. Returns the number of inputs changed; a
/// second application changes nothing.
pub fn apply_taproot_internal_key_fixup(psbt: &mut Psbt, account_pubkey: &str, address_type: AddressType) -> WalletResult<usize> {
    if !address_type.is_taproot() {
        return Ok(0);
    }
    let internal_key = x_only_hex(account_pubkey)?;
    let expected = ScriptBuf::new_p2tr(&Secp256k1::verification_only(), internal_key, None);

    let mut fixed = 0;
    for input in psbt.inputs.iter_mut() {
        if is_finalized(input) || input.tap_internal_key.is_some() {
            continue;
        }
        if input.witness_utxo.as_ref().map(|utxo| &utxo.script_pubkey) == Some(&expected) {
            input.tap_internal_key = Some(internal_key);
            fixed += 1;
        }
    }
    Ok(fixed)
}
