//! PSBT handling: sign-input resolution, signing orchestration, finalization
//!
//! ```text
//! UserToSignInput[] ──resolve──► ToSignInput[] ──sign_psbt──► KeySource::sign ──► finalize
//!        (none) ──implicit scan──┘
//! ```

mod finalize;
mod resolve;
mod sign;

pub use finalize::{finalize_input, is_finalized};
pub use resolve::{resolve_explicit, resolve_implicit, resolve_sign_inputs};
pub use sign::{apply_taproot_internal_key_fixup, sign_psbt, sign_psbt_hex, sign_psbt_with_options};

use crate::error::{WalletError, WalletResult};
use bitcoin::{Psbt, TxOut};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input the current account is authorized to sign. The only shape signing accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToSignInput {
    pub index: usize,
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sighash_types: Option<Vec<u32>>,
    #[serde(default)]
    pub disable_tweak_signer: bool,
}

impl ToSignInput {
    pub fn new(index: usize, public_key: impl Into<String>) -> Self {
        Self { index, public_key: public_key.into(), sighash_types: None, disable_tweak_signer: false }
    }
}

/// Caller-supplied signing instruction, loosely typed as received from a dapp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserToSignInput {
    /// Number or numeric string
    pub index: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sighash_types: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_tweak_signer: Option<bool>,
}

impl UserToSignInput {
    pub fn with_address(index: usize, address: impl Into<String>) -> Self {
        Self { index: Value::from(index), address: Some(address.into()), ..Default::default() }
    }

    pub fn with_public_key(index: usize, public_key: impl Into<String>) -> Self {
        Self { index: Value::from(index), public_key: Some(public_key.into()), ..Default::default() }
    }
}

/// Output spent by input `index`, from the witness UTXO or the full previous transaction.
pub fn spent_output(psbt: &Psbt, index: usize) -> Option<TxOut> {
    let input = psbt.inputs.get(index)?;
    if let Some(utxo) = &input.witness_utxo {
        return Some(utxo.clone());
    }
    let prev_tx = input.non_witness_utxo.as_ref()?;
    let vout = psbt.unsigned_tx.input.get(index)?.previous_output.vout as usize;
    prev_tx.output.get(vout).cloned()
}

pub fn decode_psbt_hex(psbt_hex: &str) -> WalletResult<Psbt> {
    let bytes = hex::decode(psbt_hex.trim()).map_err(|e| WalletError::InvalidPsbt(e.to_string()))?;
    Psbt::deserialize(&bytes).map_err(|e| WalletError::InvalidPsbt(e.to_string()))
}

pub fn encode_psbt_hex(psbt: &Psbt) -> String {
    hex::encode(psbt.serialize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::absolute::LockTime;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, Witness};

    fn tx(inputs: Vec<OutPoint>, outputs: Vec<TxOut>) -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: inputs
                .into_iter()
                .map(|previous_output| TxIn {
                    previous_output,
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                    witness: Witness::new(),
                })
                .collect(),
            output: outputs,
        }
    }

    #[test]
    fn spent_output_reads_previous_transaction() {
        let funding = tx(
            vec![OutPoint::null()],
            vec![
                TxOut { value: Amount::from_sat(1_000), script_pubkey: ScriptBuf::new() },
                TxOut { value: Amount::from_sat(2_000), script_pubkey: ScriptBuf::new() },
            ],
        );
        let spend = tx(vec![OutPoint::new(funding.compute_txid(), 1)], vec![]);
        let mut psbt = Psbt::from_unsigned_tx(spend).unwrap();
        psbt.inputs[0].non_witness_utxo = Some(funding);

        assert_eq!(spent_output(&psbt, 0).unwrap().value, Amount::from_sat(2_000));
        assert!(spent_output(&psbt, 1).is_none());
    }

    #[test]
    fn hex_round_trip_and_garbage() {
        let psbt = Psbt::from_unsigned_tx(tx(vec![OutPoint::null()], vec![])).unwrap();
        let encoded = encode_psbt_hex(&psbt);
        assert_eq!(decode_psbt_hex(&encoded).unwrap(), psbt);
        assert!(matches!(decode_psbt_hex("70736274ff"), Err(WalletError::InvalidPsbt(_))));
        assert!(matches!(decode_psbt_hex("xyz"), Err(WalletError::InvalidPsbt(_))));
    }

    #[test]
    fn user_input_accepts_dapp_json() {
        let parsed: Vec<UserToSignInput> = serde_json::from_value(serde_json::json!([
            {"index": "1", "publicKey": "02ab", "sighashTypes": [1, "131"]},
            {"index": 0, "address": "bc1q", "disableTweakSigner": true}
        ]))
        .unwrap();
        assert_eq!(parsed[0].index, Value::from("1"));
        assert_eq!(parsed[1].disable_tweak_signer, Some(true));
    }
}
