//! Keyrings - key sources held in memory while the wallet is unlocked
//!
//! Every kind implements [`KeySource`]; [`Keyring`] is the closed set of kinds.
//!
//! | Kind | Stored as | Derive | Export | Sign |
//! |------|-----------|--------|--------|------|
//! | HD | mnemonic + path + active indexes | yes | yes | yes |
//! | Simple | private keys | no | yes | yes |
//! | Hardware | account xpub + path | yes | no | no |
//! | Watch | public keys | no | no | no |
//! | Empty | placeholder for a removed keyring | no | no | no |

mod hd;
mod signer;
mod simple;
mod store;
mod watch;

pub use hd::HdKeyring;
pub use signer::sign_inputs;
pub use simple::SimpleKeyring;
pub use store::{KeyMaterialStore, StoredKeyring, TempKeyringHandle};
pub use watch::{HardwareKeyring, WatchKeyring};

use crate::core::paths::keyring_type;
use crate::core::AddressType;
use crate::error::{WalletError, WalletResult};
use crate::psbt::ToSignInput;
use bitcoin::secp256k1::{PublicKey, SecretKey};
use bitcoin::Psbt;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyringKind {
    Hd,
    Simple,
    Hardware,
    Watch,
    Empty,
}

impl KeyringKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyringKind::Hd => keyring_type::HD,
            KeyringKind::Simple => keyring_type::SIMPLE,
            KeyringKind::Hardware => keyring_type::HARDWARE,
            KeyringKind::Watch => keyring_type::WATCH,
            KeyringKind::Empty => keyring_type::EMPTY,
        }
    }

    /// Prefix of generated account labels, `"<prefix> <n>"`
    pub fn account_label(&self) -> &'static str {
        match self {
            KeyringKind::Hd => "Account",
            KeyringKind::Simple => "Private Key",
            KeyringKind::Hardware => "Hardware",
            KeyringKind::Watch => "Watch",
            KeyringKind::Empty => "",
        }
    }

    /// Prefix of generated keyring labels, `"<prefix> #<index+1>"`
    pub fn keyring_label(&self) -> &'static str {
        match self {
            KeyringKind::Hd => "HD Wallet",
            KeyringKind::Simple => "Single Wallet",
            KeyringKind::Hardware => "Hardware Wallet",
            KeyringKind::Watch => "Watch Wallet",
            KeyringKind::Empty => "",
        }
    }
}

/// Capability interface shared by every keyring kind.
pub trait KeySource {
    fn kind(&self) -> KeyringKind;

    /// Account public keys in account order
    fn public_keys(&self) -> Vec<PublicKey>;

    /// Append the next account and return its key. Accounts are never reordered.
    fn derive_account(&mut self) -> WalletResult<PublicKey>;

    /// Secret for one of this keyring's accounts
    fn export_secret(&self, pubkey: &PublicKey) -> WalletResult<SecretKey>;

    /// HD path template, empty for kinds without one
    fn hd_path(&self) -> &str { "" }

    /// Sign exactly `inputs` of `psbt`
    fn sign(&self, psbt: &mut Psbt, inputs: &[ToSignInput]) -> WalletResult<()> {
        sign_inputs(self, psbt, inputs)
    }

    fn controls(&self, pubkey: &PublicKey) -> bool {
        self.public_keys().iter().any(|pk| pk == pubkey)
    }
}

/// Closed set of keyring kinds
pub enum Keyring {
    Hd(HdKeyring),
    Simple(SimpleKeyring),
    Hardware(HardwareKeyring),
    Watch(WatchKeyring),
    Empty,
}

impl Keyring {
    fn source(&self) -> Option<&dyn KeySource> {
        match self {
            Keyring::Hd(k) => Some(k),
            Keyring::Simple(k) => Some(k),
            Keyring::Hardware(k) => Some(k),
            Keyring::Watch(k) => Some(k),
            Keyring::Empty => None,
        }
    }

    fn source_mut(&mut self) -> Option<&mut dyn KeySource> {
        match self {
            Keyring::Hd(k) => Some(k),
            Keyring::Simple(k) => Some(k),
            Keyring::Hardware(k) => Some(k),
            Keyring::Watch(k) => Some(k),
            Keyring::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool { matches!(self, Keyring::Empty) }

    pub fn from_blob(blob: &KeyringBlob) -> WalletResult<Self> {
        Ok(match blob {
            KeyringBlob::Hd { mnemonic, passphrase, hd_path, active_indexes } => {
                Keyring::Hd(HdKeyring::restore(mnemonic, hd_path, passphrase, active_indexes)?)
            }
            KeyringBlob::Simple { private_keys } => Keyring::Simple(SimpleKeyring::import(private_keys)?),
            KeyringBlob::Hardware { xpub, hd_path, active_indexes } => {
                Keyring::Hardware(HardwareKeyring::restore(xpub, hd_path, active_indexes)?)
            }
            KeyringBlob::Watch { pubkeys } => Keyring::Watch(WatchKeyring::new(pubkeys)?),
            KeyringBlob::Empty => Keyring::Empty,
        })
    }

    pub fn to_blob(&self) -> KeyringBlob {
        match self {
            Keyring::Hd(k) => k.to_blob(),
            Keyring::Simple(k) => k.to_blob(),
            Keyring::Hardware(k) => k.to_blob(),
            Keyring::Watch(k) => k.to_blob(),
            Keyring::Empty => KeyringBlob::Empty,
        }
    }
}

impl KeySource for Keyring {
    fn kind(&self) -> KeyringKind {
        self.source().map(|s| s.kind()).unwrap_or(KeyringKind::Empty)
    }

    fn public_keys(&self) -> Vec<PublicKey> {
        self.source().map(|s| s.public_keys()).unwrap_or_default()
    }

    fn derive_account(&mut self) -> WalletResult<PublicKey> {
        self.source_mut()
            .ok_or(WalletError::Unsupported { kind: keyring_type::EMPTY, operation: "account derivation" })?
            .derive_account()
    }

    fn export_secret(&self, pubkey: &PublicKey) -> WalletResult<SecretKey> {
        self.source()
            .ok_or_else(|| WalletError::SigningKeyUnavailable { pubkey: pubkey.to_string() })?
            .export_secret(pubkey)
    }

    fn hd_path(&self) -> &str {
        self.source().map(|s| s.hd_path()).unwrap_or("")
    }
}

/// Serialized keyring as exchanged with secure storage. Secrets are wiped on drop.
#[derive(Clone, PartialEq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(tag = "type")]
pub enum KeyringBlob {
    #[serde(rename = "HD Key Tree", rename_all = "camelCase")]
    Hd { mnemonic: String, passphrase: String, hd_path: String, active_indexes: Vec<u32> },
    #[serde(rename = "Simple Key Pair", rename_all = "camelCase")]
    Simple { private_keys: Vec<String> },
    #[serde(rename = "Hardware Keyring", rename_all = "camelCase")]
    Hardware { xpub: String, hd_path: String, active_indexes: Vec<u32> },
    #[serde(rename = "Watch Address Keyring")]
    Watch { pubkeys: Vec<String> },
    #[serde(rename = "Empty")]
    Empty,
}

impl std::fmt::Debug for KeyringBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyringBlob::Hd { hd_path, active_indexes, .. } => {
                f.debug_struct("Hd").field("hd_path", hd_path).field("active_indexes", active_indexes).finish_non_exhaustive()
            }
            KeyringBlob::Simple { private_keys } => f.debug_struct("Simple").field("keys", &private_keys.len()).finish_non_exhaustive(),
            KeyringBlob::Hardware { xpub, hd_path, .. } => f.debug_struct("Hardware").field("xpub", xpub).field("hd_path", hd_path).finish(),
            KeyringBlob::Watch { pubkeys } => f.debug_struct("Watch").field("pubkeys", pubkeys).finish(),
            KeyringBlob::Empty => f.write_str("Empty"),
        }
    }
}

/// One persisted keyring slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultEntry {
    pub address_type: AddressType,
    pub keyring: KeyringBlob,
}
