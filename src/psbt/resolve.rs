//! Sign-input resolution: which inputs may the current account sign?

use super::{is_finalized, spent_output, ToSignInput, UserToSignInput};
use crate::address::script_to_address;
use crate::core::NetworkType;
use crate::error::{WalletError, WalletResult};
use crate::session::Account;
use bitcoin::Psbt;
use serde_json::Value;
use tracing::{debug, warn};

/// Explicit instructions when given and non-empty, otherwise a scan of `psbt`.
pub fn resolve_sign_inputs(
    account: &Account,
    psbt: &Psbt,
    inputs: Option<&[UserToSignInput]>,
    network: NetworkType,
) -> WalletResult<Vec<ToSignInput>> {
    match inputs {
        Some(inputs) if !inputs.is_empty() => resolve_explicit(account, inputs),
        _ => Ok(resolve_implicit(account, psbt, network)),
    }
}

/// Validate caller instructions against `account`.
///
/// Every entry must name the account by address and/or public key. The output always
/// carries the account's canonical public key.
pub fn resolve_explicit(account: &Account, inputs: &[UserToSignInput]) -> WalletResult<Vec<ToSignInput>> {
    inputs
        .iter()
        .map(|input| {
            let index = parse_index(&input.index)?;
            let address = input.address.as_deref().filter(|a| !a.is_empty());
            let public_key = input.public_key.as_deref().filter(|p| !p.is_empty());

            if address.is_none() && public_key.is_none() {
                return Err(WalletError::MissingIdentifier { index });
            }
            if let Some(address) = address {
                if address != account.address {
                    warn!(index, address, "toSignInput address does not belong to current account");
                    return Err(WalletError::AddressMismatch { index, address: address.to_string() });
                }
            }
            if let Some(pubkey) = public_key {
                if pubkey != account.pubkey {
                    warn!(index, pubkey, "toSignInput public key does not belong to current account");
                    return Err(WalletError::PubkeyMismatch { index, pubkey: pubkey.to_string() });
                }
            }
            let sighash_types = input
                .sighash_types
                .as_ref()
                .map(|types| types.iter().map(|t| parse_sighash(index, t)).collect::<WalletResult<Vec<_>>>())
                .transpose()?;

            Ok(ToSignInput {
                index,
                public_key: account.pubkey.clone(),
                sighash_types,
                disable_tweak_signer: input.disable_tweak_signer.unwrap_or(false),
            })
        })
        .collect()
}

/// Every unfinalized input whose spent output pays to the account's address, in input order.
///
/// The input's own sighash type, if any, is carried through unvalidated.
pub fn resolve_implicit(account: &Account, psbt: &Psbt, network: NetworkType) -> Vec<ToSignInput> {
    let mut resolved = Vec::new();
    for (index, input) in psbt.inputs.iter().enumerate() {
        let Some(prevout) = spent_output(psbt, index) else { continue };
        if is_finalized(input) {
            continue;
        }
        let Some(address) = script_to_address(&prevout.script_pubkey, network) else {
            debug!(index, "prevout script has no address form");
            continue;
        };
        if address != account.address {
            continue;
        }
        let sighash_types = input.sighash_type.map(|t| t.to_u32()).filter(|t| *t != 0).map(|t| vec![t]);
        resolved.push(ToSignInput {
            index,
            public_key: account.pubkey.clone(),
            sighash_types,
            disable_tweak_signer: false,
        });
    }
    debug!(count = resolved.len(), address = %account.address, "resolved inputs by scan");
    resolved
}

fn parse_index(value: &Value) -> WalletResult<usize> {
    let parsed = match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| WalletError::InvalidIndex(value.to_string()))
}

fn parse_sighash(index: usize, value: &Value) -> WalletResult<u32> {
    let parsed = match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| WalletError::InvalidSighashType { index, value: value.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::address_to_script;
    use crate::keyring::KeyringKind;
    use bitcoin::absolute::LockTime;
    use bitcoin::hashes::Hash;
    use bitcoin::psbt::PsbtSighashType;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
    use serde_json::json;

    fn account() -> Account {
        Account {
            kind: KeyringKind::Simple,
            pubkey: "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798".into(),
            address: "bc1pmfr3p9j00pfxjh0zmgp99y8zftmd3s5pmedqhyptwy6lm87hf5sspknck9".into(),
            label: "Private Key 1".into(),
            index: 0,
            key: "keyring_0#0".into(),
        }
    }

    #[test]
    fn address_only_entry_gets_canonical_pubkey() {
        let acct = account();
        let resolved = resolve_explicit(&acct, &[UserToSignInput::with_address(2, acct.address.clone())]).unwrap();
        assert_eq!(resolved, vec![ToSignInput::new(2, acct.pubkey.clone())]);
    }

    #[test]
    fn both_identifiers_allowed_when_consistent() {
        let acct = account();
        let mut entry = UserToSignInput::with_address(0, acct.address.clone());
        entry.public_key = Some(acct.pubkey.clone());
        entry.sighash_types = Some(vec![json!(1), json!("131")]);
        entry.disable_tweak_signer = Some(true);
        let resolved = resolve_explicit(&acct, &[entry]).unwrap();
        assert_eq!(resolved[0].sighash_types, Some(vec![1, 131]));
        assert!(resolved[0].disable_tweak_signer);
    }

    #[test]
    fn mismatches_fail_instead_of_dropping() {
        let acct = account();
        let err = resolve_explicit(&acct, &[UserToSignInput::with_address(0, "bc1qother")]).unwrap_err();
        assert!(matches!(err, WalletError::AddressMismatch { index: 0, .. }));

        let err = resolve_explicit(&acct, &[UserToSignInput::with_public_key(1, "03ff")]).unwrap_err();
        assert!(matches!(err, WalletError::PubkeyMismatch { index: 1, .. }));

        let err = resolve_explicit(&acct, &[UserToSignInput { index: json!(3), ..Default::default() }]).unwrap_err();
        assert!(matches!(err, WalletError::MissingIdentifier { index: 3 }));
    }

    #[test]
    fn malformed_index_and_sighash() {
        let acct = account();
        let mut entry = UserToSignInput::with_address(0, acct.address.clone());
        entry.index = json!("first");
        assert!(matches!(resolve_explicit(&acct, &[entry.clone()]), Err(WalletError::InvalidIndex(_))));

        entry.index = json!("4");
        entry.sighash_types = Some(vec![json!("all")]);
        assert!(matches!(
            resolve_explicit(&acct, &[entry]),
            Err(WalletError::InvalidSighashType { index: 4, .. })
        ));
    }

    fn transaction(inputs: usize, outputs: Vec<TxOut>) -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: (0..inputs)
                .map(|i| TxIn {
                    previous_output: OutPoint::new(Txid::from_byte_array([i as u8 + 1; 32]), 0),
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                    witness: Witness::new(),
                })
                .collect(),
            output: outputs,
        }
    }

    /// 0: ours via previous transaction, SINGLE|ANYONECANPAY
    /// 1: ours, already finalized
    /// 2: ours via witness utxo
    /// 3: someone else's
    /// 4: no spent output at all
    fn mixed_psbt(acct: &Account) -> Psbt {
        let ours = address_to_script(&acct.address, NetworkType::Mainnet).unwrap();
        let theirs = address_to_script("bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu", NetworkType::Mainnet).unwrap();
        let owned = |sats| TxOut { value: Amount::from_sat(sats), script_pubkey: ours.clone() };

        let mut psbt = Psbt::from_unsigned_tx(transaction(5, vec![])).unwrap();
        psbt.inputs[0].non_witness_utxo = Some(transaction(1, vec![owned(1_000)]));
        psbt.inputs[0].sighash_type = Some(PsbtSighashType::from_u32(0x83));
        psbt.inputs[1].witness_utxo = Some(owned(2_000));
        psbt.inputs[1].final_script_witness = Some(Witness::from_slice(&[[7u8; 64]]));
        psbt.inputs[2].witness_utxo = Some(owned(3_000));
        psbt.inputs[3].witness_utxo = Some(TxOut { value: Amount::from_sat(4_000), script_pubkey: theirs });
        psbt
    }

    #[test]
    fn scan_picks_unfinalized_inputs_paying_to_account() {
        let acct = account();
        let psbt = mixed_psbt(&acct);

        let mut from_prev_tx = ToSignInput::new(0, acct.pubkey.clone());
        from_prev_tx.sighash_types = Some(vec![0x83]);
        let expected = vec![from_prev_tx, ToSignInput::new(2, acct.pubkey.clone())];
        assert_eq!(resolve_implicit(&acct, &psbt, NetworkType::Mainnet), expected);
    }

    #[test]
    fn empty_instructions_fall_back_to_scan() {
        let acct = account();
        let psbt = mixed_psbt(&acct);
        let scanned = resolve_implicit(&acct, &psbt, NetworkType::Mainnet);
        assert_eq!(resolve_sign_inputs(&acct, &psbt, Some(&[]), NetworkType::Mainnet).unwrap(), scanned);
        assert_eq!(resolve_sign_inputs(&acct, &psbt, None, NetworkType::Mainnet).unwrap(), scanned);
    }

    #[test]
    fn scan_uses_active_network() {
        let acct = account();
        let psbt = mixed_psbt(&acct);
        assert!(resolve_implicit(&acct, &psbt, NetworkType::Testnet).is_empty());
    }
}
