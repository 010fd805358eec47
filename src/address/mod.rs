//! Address derivation: (public key, address type, network) → address string
//!
//! | Address type | Encoding | Key |
//! |---|---|---|
//! | `P2PKH` | base58 pay-to-pubkey-hash | compressed |
//! | `P2WPKH`, `M44_P2WPKH` | bech32 v0 | compressed |
//! | `P2SH_P2WPKH` | base58 p2sh wrapping p2wpkh | compressed |
//! | `P2TR`, `M44_P2TR` | bech32m v1, key-path only | compressed or x-only |

use crate::core::{AddressType, NetworkType};
use crate::error::{WalletError, WalletResult};
use bitcoin::key::{CompressedPublicKey, Secp256k1, XOnlyPublicKey};
use bitcoin::{Address, Script, ScriptBuf};
use std::str::FromStr;

/// Derive the address of `pubkey_hex` under `address_type` on `network`.
pub fn derive_address(pubkey_hex: &str, address_type: AddressType, network: NetworkType) -> WalletResult<String> {
    let bytes = hex::decode(pubkey_hex.trim())?;
    Ok(address_for_key(&bytes, address_type, network)?.to_string())
}

/// Output script paying to `pubkey_hex` under `address_type`.
pub fn derive_script(pubkey_hex: &str, address_type: AddressType) -> WalletResult<ScriptBuf> {
    let bytes = hex::decode(pubkey_hex.trim())?;
    // Network does not influence the script
    Ok(address_for_key(&bytes, address_type, NetworkType::Mainnet)?.script_pubkey())
}

fn address_for_key(bytes: &[u8], address_type: AddressType, network: NetworkType) -> WalletResult<Address> {
    let network = network.to_bitcoin();
    match address_type {
        AddressType::P2pkh => Ok(Address::p2pkh(compressed(bytes)?, network)),
        AddressType::P2wpkh | AddressType::M44P2wpkh => Ok(Address::p2wpkh(&compressed(bytes)?, network)),
        AddressType::P2shP2wpkh => Ok(Address::p2shwpkh(&compressed(bytes)?, network)),
        AddressType::P2tr | AddressType::M44P2tr => {
            let secp = Secp256k1::verification_only();
            Ok(Address::p2tr(&secp, x_only(bytes)?, None, network))
        }
    }
}

fn compressed(bytes: &[u8]) -> WalletResult<CompressedPublicKey> {
    CompressedPublicKey::from_slice(bytes)
        .map_err(|e| WalletError::InvalidPublicKey(format!("{} ({} bytes)", e, bytes.len())))
}

/// x-only form of a compressed or already x-only key
pub fn x_only(bytes: &[u8]) -> WalletResult<XOnlyPublicKey> {
    match bytes.len() {
        32 => XOnlyPublicKey::from_slice(bytes).map_err(|e| WalletError::InvalidPublicKey(e.to_string())),
        33 => Ok(compressed(bytes)?.0.x_only_public_key().0),
        n => Err(WalletError::InvalidPublicKey(format!("expected 32 or 33 bytes, got {}", n))),
    }
}

/// x-only form of a hex key
pub fn x_only_hex(pubkey_hex: &str) -> WalletResult<XOnlyPublicKey> {
    x_only(&hex::decode(pubkey_hex.trim())?)
}

/// Address for an output script, `None` when the script has no address form.
pub fn script_to_address(script: &Script, network: NetworkType) -> Option<String> {
    Address::from_script(script, network.to_bitcoin()).ok().map(|a| a.to_string())
}

/// Output script for an address, checked against `network`.
pub fn address_to_script(address: &str, network: NetworkType) -> WalletResult<ScriptBuf> {
    let address = Address::from_str(address)
        .map_err(|e| WalletError::InvalidAddress(format!("{}: {}", address, e)))?
        .require_network(network.to_bitcoin())
        .map_err(|e| WalletError::InvalidAddress(e.to_string()))?;
    Ok(address.script_pubkey())
}
