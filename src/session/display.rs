//! Displayable keyrings and accounts

use crate::address::derive_address;
use crate::core::paths::{KEYRING_KEY_PREFIX, TEMPORARY_INDEX};
use crate::core::{AddressType, NetworkType};
use crate::error::WalletResult;
use crate::keyring::{KeySource, Keyring, KeyringKind, TempKeyringHandle};
use serde::Serialize;
use std::collections::HashMap;

/// Where a keyring lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyringRef {
    Stored(usize),
    Temporary(TempKeyringHandle),
}

impl KeyringRef {
    /// Registry index, `-1` for temporary keyrings
    pub fn index(&self) -> i64 {
        match self {
            KeyringRef::Stored(index) => *index as i64,
            KeyringRef::Temporary(_) => TEMPORARY_INDEX,
        }
    }

    /// `keyring_<index>`
    pub fn key(&self) -> String {
        format!("{}{}", KEYRING_KEY_PREFIX, self.index())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(rename = "type")]
    pub kind: KeyringKind,
    pub pubkey: String,
    pub address: String,
    pub label: String,
    pub index: usize,
    /// `keyring_<index>#<accountIndex>`
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayKeyring {
    pub reference: KeyringRef,
    pub key: String,
    pub kind: KeyringKind,
    pub address_type: AddressType,
    pub accounts: Vec<Account>,
    pub label: String,
    /// Empty for non-HD kinds
    pub hd_path: String,
}

impl DisplayKeyring {
    pub fn stored_index(&self) -> Option<usize> {
        match self.reference {
            KeyringRef::Stored(index) => Some(index),
            KeyringRef::Temporary(_) => None,
        }
    }
}

/// Alias lookup owned by the host's contact book.
pub trait ContactBook: Send + Sync {
    fn alias_for(&self, pubkey: &str) -> Option<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoContacts;

impl ContactBook for NoContacts {
    fn alias_for(&self, _pubkey: &str) -> Option<String> { None }
}

/// Sources for account and keyring labels, highest priority first
pub(crate) struct Labels<'a> {
    pub keyring_overrides: &'a HashMap<String, String>,
    pub account_overrides: &'a HashMap<String, String>,
    pub contacts: &'a dyn ContactBook,
}

pub(crate) fn generated_account_label(kind: KeyringKind, position: usize) -> String {
    format!("{} {}", kind.account_label(), position)
}

/// Materialize `keyring` for display. Addresses are derived fresh for `network`.
pub(crate) fn display_for_keyring(
    keyring: &Keyring,
    address_type: AddressType,
    reference: KeyringRef,
    network: NetworkType,
    labels: &Labels<'_>,
    init_label: bool,
) -> WalletResult<DisplayKeyring> {
    let kind = keyring.kind();
    let key = reference.key();
    let accounts = keyring
        .public_keys()
        .iter()
        .enumerate()
        .map(|(index, pk)| {
            let pubkey = pk.to_string();
            let account_key = format!("{}#{}", key, index);
            let label = labels
                .account_overrides
                .get(&account_key)
                .cloned()
                .or_else(|| labels.contacts.alias_for(&pubkey))
                .unwrap_or_else(|| generated_account_label(kind, index + 1));
            Ok(Account {
                kind,
                address: derive_address(&pubkey, address_type, network)?,
                pubkey,
                label,
                index,
                key: account_key,
            })
        })
        .collect::<WalletResult<Vec<_>>>()?;

    let label = match labels.keyring_overrides.get(&key) {
        Some(label) => label.clone(),
        None if init_label => format!("{} #{}", kind.keyring_label(), reference.index() + 1),
        None => String::new(),
    };
    let hd_path = if kind == KeyringKind::Hd { keyring.hd_path().to_string() } else { String::new() };

    Ok(DisplayKeyring { reference, key, kind, address_type, accounts, label, hd_path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyring::SimpleKeyring;

    struct OneAlias;

    impl ContactBook for OneAlias {
        fn alias_for(&self, pubkey: &str) -> Option<String> {
            pubkey.starts_with("0279be").then(|| "Satoshi".to_string())
        }
    }

    fn keyring() -> Keyring {
        Keyring::Simple(
            SimpleKeyring::import(&[
                "0000000000000000000000000000000000000000000000000000000000000001",
                "0000000000000000000000000000000000000000000000000000000000000002",
            ])
            .unwrap(),
        )
    }

    #[test]
    fn labels_prefer_override_then_contact_then_generated() {
        let keyring_overrides = HashMap::new();
        let mut account_overrides = HashMap::new();
        let labels = Labels { keyring_overrides: &keyring_overrides, account_overrides: &account_overrides, contacts: &OneAlias };
        let display =
            display_for_keyring(&keyring(), AddressType::P2wpkh, KeyringRef::Stored(2), NetworkType::Mainnet, &labels, true)
                .unwrap();
        assert_eq!(display.key, "keyring_2");
        assert_eq!(display.label, "Single Wallet #3");
        assert_eq!(display.accounts[0].label, "Satoshi");
        assert_eq!(display.accounts[1].label, "Private Key 2");
        assert_eq!(display.accounts[1].key, "keyring_2#1");
        assert!(display.hd_path.is_empty());

        account_overrides.insert("keyring_2#0".to_string(), "Cold".to_string());
        let labels = Labels { keyring_overrides: &keyring_overrides, account_overrides: &account_overrides, contacts: &OneAlias };
        let display =
            display_for_keyring(&keyring(), AddressType::P2wpkh, KeyringRef::Stored(2), NetworkType::Mainnet, &labels, false)
                .unwrap();
        assert_eq!(display.accounts[0].label, "Cold");
        assert_eq!(display.label, "");
    }

    #[test]
    fn addresses_follow_network() {
        let empty = HashMap::new();
        let labels = Labels { keyring_overrides: &empty, account_overrides: &empty, contacts: &NoContacts };
        let main = display_for_keyring(&keyring(), AddressType::P2tr, KeyringRef::Stored(0), NetworkType::Mainnet, &labels, true)
            .unwrap();
        let test = display_for_keyring(&keyring(), AddressType::P2tr, KeyringRef::Stored(0), NetworkType::Testnet, &labels, true)
            .unwrap();
        assert!(main.accounts[0].address.starts_with("bc1p"));
        assert!(test.accounts[0].address.starts_with("tb1p"));
        assert_eq!(main.accounts[0].pubkey, test.accounts[0].pubkey);
    }
}
