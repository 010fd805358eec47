//! Address-type and network enums shared by every component

use crate::core::paths::hd;
use crate::error::WalletError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NetworkType {
    #[default]
    Mainnet,
    Testnet,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self { NetworkType::Mainnet => "livenet", NetworkType::Testnet => "testnet" }
    }

    pub fn to_bitcoin(&self) -> bitcoin::Network {
        match self { NetworkType::Mainnet => bitcoin::Network::Bitcoin, NetworkType::Testnet => bitcoin::Network::Testnet }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for NetworkType {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "livenet" | "mainnet" | "bitcoin" => Ok(NetworkType::Mainnet),
            "testnet" => Ok(NetworkType::Testnet),
            other => Err(WalletError::UnknownNetwork(other.to_string())),
        }
    }
}

/// Address encoding scheme of a keyring.
///
/// `M44P2wpkh` and `M44P2tr` are legacy layouts that derive from the BIP44 path
/// but encode as native segwit / taproot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressType {
    #[serde(rename = "P2PKH")]
    P2pkh,
    #[serde(rename = "P2WPKH")]
    P2wpkh,
    #[serde(rename = "P2TR")]
    P2tr,
    #[serde(rename = "P2SH_P2WPKH")]
    P2shP2wpkh,
    #[serde(rename = "M44_P2WPKH")]
    M44P2wpkh,
    #[serde(rename = "M44_P2TR")]
    M44P2tr,
}

impl AddressType {
    /// Display order used when enumerating every address of an account.
    pub const ALL: [AddressType; 6] = [
        AddressType::P2wpkh,
        AddressType::P2shP2wpkh,
        AddressType::P2tr,
        AddressType::P2pkh,
        AddressType::M44P2wpkh,
        AddressType::M44P2tr,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AddressType::P2pkh => "P2PKH",
            AddressType::P2wpkh | AddressType::M44P2wpkh => "P2WPKH",
            AddressType::P2tr | AddressType::M44P2tr => "P2TR",
            AddressType::P2shP2wpkh => "P2SH-P2WPKH",
        }
    }

    pub fn hd_path(&self) -> &'static str {
        match self {
            AddressType::P2pkh | AddressType::M44P2wpkh | AddressType::M44P2tr => hd::BIP44,
            AddressType::P2wpkh => hd::BIP84,
            AddressType::P2tr => hd::BIP86,
            AddressType::P2shP2wpkh => hd::BIP49,
        }
    }

    pub fn is_taproot(&self) -> bool { matches!(self, AddressType::P2tr | AddressType::M44P2tr) }

    /// Legacy m/44 variants kept only for wallets created by older releases.
    pub fn is_legacy_layout(&self) -> bool { matches!(self, AddressType::M44P2wpkh | AddressType::M44P2tr) }
}
