//! Wallet session - keyring/account registry and current selection
//!
//! One `WalletSession` per wallet. It owns the key material store, the network, the
//! current keyring/account selection and label overrides. Every call re-resolves the
//! selection; nothing is cached between calls.
//!
//! | Operation | Events |
//! |-----------|--------|
//! | `unlock` | `unlock` |
//! | `lock` | `accountsChanged([])`, `lock` |
//! | `select` and everything that selects | `accountsChanged([address])`, `activeAddress` |
//! | `current_account` | `activeAddress` |
//! | `set_network` | `networkChanged`, then as `select` |

mod display;

pub use display::{Account, ContactBook, DisplayKeyring, KeyringRef, NoContacts};

use crate::config::WalletConfig;
use crate::core::{AddressType, EventBus, EventSink, NetworkType, NoopSink, WalletEvent};
use crate::address::derive_address;
use crate::error::{WalletError, WalletResult};
use crate::keyring::{HdKeyring, KeyMaterialStore, KeySource, Keyring, KeyringKind, SimpleKeyring, TempKeyringHandle, VaultEntry};
use display::{display_for_keyring, generated_account_label, Labels};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Private key export, `hex` and network-specific WIF
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ExportedKey {
    pub hex: String,
    pub wif: String,
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ExportedMnemonic {
    pub mnemonic: String,
    pub hd_path: String,
    pub passphrase: String,
}

/// Everything signing needs, resolved under one lock
pub struct SigningContext {
    pub account: Account,
    pub keyring: DisplayKeyring,
    pub network: NetworkType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SelectedAccount {
    kind: KeyringKind,
    pubkey: String,
}

struct SessionState {
    store: KeyMaterialStore,
    network: NetworkType,
    current_keyring: Option<usize>,
    current_account: Option<SelectedAccount>,
    keyring_labels: HashMap<String, String>,
    account_labels: HashMap<String, String>,
}

impl SessionState {
    fn labels<'a>(&'a self, contacts: &'a dyn ContactBook) -> Labels<'a> {
        Labels { keyring_overrides: &self.keyring_labels, account_overrides: &self.account_labels, contacts }
    }

    fn display_stored(&self, index: usize, contacts: &dyn ContactBook) -> WalletResult<DisplayKeyring> {
        let stored = self.store.get(index)?;
        display_for_keyring(&stored.keyring, stored.address_type, KeyringRef::Stored(index), self.network, &self.labels(contacts), true)
    }

    fn keyrings(&self, contacts: &dyn ContactBook) -> WalletResult<Vec<DisplayKeyring>> {
        if !self.store.is_unlocked() {
            return Err(WalletError::Locked);
        }
        self.store.active_indexes().into_iter().map(|index| self.display_stored(index, contacts)).collect()
    }

    /// Stored index, else the keyring holding the stored account, else 0. An empty or
    /// missing slot advances to the first non-empty keyring and persists that choice.
    fn current_keyring(&mut self, contacts: &dyn ContactBook) -> WalletResult<DisplayKeyring> {
        if !self.store.is_unlocked() {
            return Err(WalletError::Locked);
        }
        let active = self.store.active_indexes();
        let mut index = self.current_keyring.unwrap_or_else(|| {
            self.current_account
                .as_ref()
                .and_then(|selected| {
                    active.iter().copied().find(|&i| {
                        self.store.get(i).map_or(false, |stored| {
                            stored.keyring.kind() == selected.kind
                                && stored.keyring.public_keys().iter().any(|pk| pk.to_string() == selected.pubkey)
                        })
                    })
                })
                .unwrap_or(0)
        });

        if !active.contains(&index) {
            index = *active.first().ok_or(WalletError::NoCurrentKeyring)?;
            debug!(index, "current keyring advanced to first non-empty keyring");
            self.current_keyring = Some(index);
        }
        self.display_stored(index, contacts)
    }

    fn current_account(&mut self, contacts: &dyn ContactBook) -> WalletResult<(DisplayKeyring, Account)> {
        let keyring = self.current_keyring(contacts)?;
        let selected = self.current_account.as_ref().map(|s| s.pubkey.as_str());
        let account = keyring
            .accounts
            .iter()
            .find(|account| Some(account.pubkey.as_str()) == selected)
            .or_else(|| keyring.accounts.first())
            .cloned()
            .ok_or(WalletError::NoCurrentAccount)?;
        Ok((keyring, account))
    }

    fn select(&mut self, index: usize, account_index: usize, contacts: &dyn ContactBook) -> WalletResult<Account> {
        let keyring = self.display_stored(index, contacts)?;
        let account = keyring
            .accounts
            .get(account_index)
            .cloned()
            .ok_or_else(|| WalletError::AccountNotFound { keyring: keyring.key.clone(), account: account_index })?;
        self.current_keyring = Some(index);
        self.current_account = Some(SelectedAccount { kind: account.kind, pubkey: account.pubkey.clone() });
        Ok(account)
    }
}

pub struct WalletSession {
    state: RwLock<SessionState>,
    events: Arc<dyn EventSink>,
    contacts: Arc<dyn ContactBook>,
    config: WalletConfig,
}

impl WalletSession {
    pub fn new(config: WalletConfig) -> Self {
        let state = SessionState {
            store: KeyMaterialStore::new(),
            network: config.network,
            current_keyring: None,
            current_account: None,
            keyring_labels: HashMap::new(),
            account_labels: HashMap::new(),
        };
        Self { state: RwLock::new(state), events: Arc::new(NoopSink), contacts: Arc::new(NoContacts), config }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self { self.events = events; self }
    pub fn with_contacts(mut self, contacts: Arc<dyn ContactBook>) -> Self { self.contacts = contacts; self }

    /// Attach a broadcast bus sized by `event_capacity`, returned for subscribing.
    pub fn with_event_bus(self) -> (Self, EventBus) {
        let bus = EventBus::new(self.config.event_capacity);
        (self.with_events(Arc::new(bus.clone())), bus)
    }

    pub fn config(&self) -> &WalletConfig { &self.config }

    fn read(&self) -> WalletResult<RwLockReadGuard<'_, SessionState>> {
        self.state.read().map_err(|_| WalletError::Internal("session lock".into()))
    }

    fn write(&self) -> WalletResult<RwLockWriteGuard<'_, SessionState>> {
        self.state.write().map_err(|_| WalletError::Internal("session lock".into()))
    }

    fn announce_selection(&self, account: &Account) {
        self.events.emit(WalletEvent::AccountsChanged { accounts: vec![account.address.clone()] });
        self.events.emit(WalletEvent::ActiveAddress { address: account.address.clone() });
    }

    // Lifecycle

    pub fn is_unlocked(&self) -> bool {
        self.read().map(|state| state.store.is_unlocked()).unwrap_or(false)
    }

    /// Load decrypted keyrings from secure storage.
    pub fn unlock(&self, entries: &[VaultEntry]) -> WalletResult<()> {
        self.write()?.store.unlock(entries)?;
        info!(keyrings = entries.len(), "wallet unlocked");
        self.events.emit(WalletEvent::Unlock);
        Ok(())
    }

    /// Drop all key material.
    pub fn lock(&self) -> WalletResult<()> {
        self.write()?.store.lock();
        info!("wallet locked");
        self.events.emit(WalletEvent::AccountsChanged { accounts: Vec::new() });
        self.events.emit(WalletEvent::Lock);
        Ok(())
    }

    /// Serialized keyrings for secure storage, removed slots included
    pub fn export_vault(&self) -> WalletResult<Vec<VaultEntry>> {
        self.read()?.store.export()
    }

    // Network

    pub fn network(&self) -> WalletResult<NetworkType> {
        Ok(self.read()?.network)
    }

    /// Switch network and re-select so every address is recomputed.
    pub fn set_network(&self, network: NetworkType) -> WalletResult<()> {
        let reselected = {
            let mut state = self.write()?;
            state.network = network;
            if state.store.is_unlocked() && !state.store.is_empty() {
                let contacts = self.contacts.as_ref();
                let (keyring, account) = state.current_account(contacts)?;
                let index = keyring.stored_index().ok_or(WalletError::NoCurrentKeyring)?;
                Some(state.select(index, account.index, contacts)?)
            } else {
                None
            }
        };
        info!(network = network.as_str(), "network changed");
        self.events.emit(WalletEvent::NetworkChanged { network: network.as_str().to_string() });
        if let Some(account) = reselected {
            self.announce_selection(&account);
        }
        Ok(())
    }

    // Registry queries

    /// Non-empty keyrings in registry order
    pub fn keyrings(&self) -> WalletResult<Vec<DisplayKeyring>> {
        self.read()?.keyrings(self.contacts.as_ref())
    }

    pub fn keyring(&self, index: usize) -> WalletResult<DisplayKeyring> {
        self.read()?.display_stored(index, self.contacts.as_ref())
    }

    pub fn current_keyring(&self) -> WalletResult<DisplayKeyring> {
        self.write()?.current_keyring(self.contacts.as_ref())
    }

    pub fn current_account(&self) -> WalletResult<Account> {
        let (_, account) = self.write()?.current_account(self.contacts.as_ref())?;
        self.events.emit(WalletEvent::ActiveAddress { address: account.address.clone() });
        Ok(account)
    }

    /// Every account of every keyring
    pub fn accounts(&self) -> WalletResult<Vec<Account>> {
        Ok(self.keyrings()?.into_iter().flat_map(|keyring| keyring.accounts).collect())
    }

    pub fn accounts_count(&self) -> WalletResult<usize> {
        let state = self.read()?;
        if !state.store.is_unlocked() {
            return Err(WalletError::Locked);
        }
        Ok(state
            .store
            .active_indexes()
            .into_iter()
            .filter_map(|index| state.store.get(index).ok())
            .map(|stored| stored.keyring.public_keys().len())
            .sum())
    }

    /// Addresses of one account under every displayable address type.
    ///
    /// HD keyrings derive the account under each type's own path; other kinds reuse the
    /// account key and skip the legacy m/44 layouts.
    pub fn all_addresses(&self, index: usize, account_index: usize) -> WalletResult<Vec<String>> {
        let state = self.read()?;
        let stored = state.store.get(index)?;
        let not_found = || WalletError::AccountNotFound { keyring: KeyringRef::Stored(index).key(), account: account_index };
        match &stored.keyring {
            Keyring::Hd(hd) => {
                let child = *hd.active_indexes().get(account_index).ok_or_else(not_found)?;
                AddressType::ALL
                    .iter()
                    .map(|&address_type| {
                        let pubkey = hd.public_key_by_path(address_type.hd_path(), child)?;
                        derive_address(&pubkey.to_string(), address_type, state.network)
                    })
                    .collect()
            }
            keyring => {
                let pubkey = keyring.public_keys().get(account_index).ok_or_else(not_found)?.to_string();
                AddressType::ALL
                    .iter()
                    .filter(|address_type| !address_type.is_legacy_layout())
                    .map(|&address_type| derive_address(&pubkey, address_type, state.network))
                    .collect()
            }
        }
    }

    // Selection

    /// Make `account_index` of keyring `index` current.
    pub fn select(&self, index: usize, account_index: usize) -> WalletResult<Account> {
        let account = self.write()?.select(index, account_index, self.contacts.as_ref())?;
        info!(keyring = index, account = account_index, "selection changed");
        self.announce_selection(&account);
        Ok(account)
    }

    /// Remove keyring `index`; the last remaining keyring becomes current.
    pub fn remove_keyring(&self, index: usize) -> WalletResult<Option<DisplayKeyring>> {
        let next = {
            let mut state = self.write()?;
            state.store.remove(index)?;
            let contacts = self.contacts.as_ref();
            match state.store.active_indexes().last().copied() {
                Some(last) => {
                    let account = state.select(last, 0, contacts)?;
                    Some((state.display_stored(last, contacts)?, account))
                }
                None => {
                    state.current_keyring = None;
                    state.current_account = None;
                    None
                }
            }
        };
        info!(index, "keyring removed");
        Ok(next.map(|(keyring, account)| {
            self.announce_selection(&account);
            keyring
        }))
    }

    // Keyring creation

    fn add_and_select(&self, keyring: Keyring, address_type: AddressType, first_label: Option<&str>) -> WalletResult<DisplayKeyring> {
        let (shown, account) = {
            let mut state = self.write()?;
            let index = state.store.add(keyring, address_type)?;
            if let Some(label) = first_label.filter(|l| !l.is_empty()) {
                let key = format!("{}#0", KeyringRef::Stored(index).key());
                state.account_labels.insert(key, label.to_string());
            }
            let contacts = self.contacts.as_ref();
            let account = state.select(index, 0, contacts)?;
            (state.display_stored(index, contacts)?, account)
        };
        info!(key = %shown.key, kind = shown.kind.as_str(), "keyring added");
        self.announce_selection(&account);
        Ok(shown)
    }

    /// Import a private key (hex or WIF) as a new keyring and select it.
    pub fn import_private_key(&self, key: &str, address_type: AddressType, label: Option<&str>) -> WalletResult<DisplayKeyring> {
        let keyring = Keyring::Simple(SimpleKeyring::import(&[key])?);
        self.add_and_select(keyring, address_type, label)
    }

    /// New HD keyring with accounts `0..account_count`, selected.
    pub fn create_keyring_with_mnemonic(
        &self,
        mnemonic: &str,
        hd_path: &str,
        passphrase: &str,
        address_type: AddressType,
        account_count: u32,
    ) -> WalletResult<DisplayKeyring> {
        let hd_path = if hd_path.is_empty() { self.config.default_hd_path.as_str() } else { hd_path };
        let keyring = Keyring::Hd(HdKeyring::new(mnemonic, hd_path, passphrase, account_count)?);
        self.add_and_select(keyring, address_type, None)
    }

    fn stash(&self, keyring: Keyring, address_type: AddressType) -> WalletResult<DisplayKeyring> {
        let mut state = self.write()?;
        let handle = state.store.stash(keyring, address_type)?;
        self.display_temporary(&state, handle)
    }

    fn display_temporary(&self, state: &SessionState, handle: TempKeyringHandle) -> WalletResult<DisplayKeyring> {
        let stored = state.store.temporary(handle)?;
        display_for_keyring(
            &stored.keyring,
            stored.address_type,
            KeyringRef::Temporary(handle),
            state.network,
            &state.labels(self.contacts.as_ref()),
            false,
        )
    }

    /// Preview an HD keyring without persisting it.
    pub fn create_temp_keyring_with_mnemonic(
        &self,
        mnemonic: &str,
        hd_path: &str,
        passphrase: &str,
        address_type: AddressType,
        account_count: u32,
    ) -> WalletResult<DisplayKeyring> {
        self.stash(Keyring::Hd(HdKeyring::new(mnemonic, hd_path, passphrase, account_count)?), address_type)
    }

    /// Preview a private-key keyring without persisting it.
    pub fn create_temp_keyring_with_private_key(&self, key: &str, address_type: AddressType) -> WalletResult<DisplayKeyring> {
        self.stash(Keyring::Simple(SimpleKeyring::import(&[key])?), address_type)
    }

    pub fn temp_keyring(&self, handle: TempKeyringHandle) -> WalletResult<DisplayKeyring> {
        let state = self.read()?;
        self.display_temporary(&state, handle)
    }

    /// Persist a previewed keyring and select it.
    pub fn persist_temp_keyring(&self, handle: TempKeyringHandle) -> WalletResult<DisplayKeyring> {
        let (shown, account) = {
            let mut state = self.write()?;
            let index = state.store.promote(handle)?;
            let contacts = self.contacts.as_ref();
            let account = state.select(index, 0, contacts)?;
            (state.display_stored(index, contacts)?, account)
        };
        info!(key = %shown.key, "temporary keyring persisted");
        self.announce_selection(&account);
        Ok(shown)
    }

    pub fn release_temp_keyring(&self, handle: TempKeyringHandle) -> WalletResult<bool> {
        Ok(self.write()?.store.release(handle))
    }

    // Keyring mutation

    /// Append the next account to keyring `index` and select it.
    pub fn derive_new_account(&self, index: usize, label: Option<&str>) -> WalletResult<Account> {
        let account = {
            let mut state = self.write()?;
            let stored = state.store.get_mut(index)?;
            stored.keyring.derive_account()?;
            let position = stored.keyring.public_keys().len() - 1;
            if let Some(label) = label.filter(|l| !l.is_empty()) {
                let key = format!("{}#{}", KeyringRef::Stored(index).key(), position);
                state.account_labels.insert(key, label.to_string());
            }
            state.select(index, position, self.contacts.as_ref())?
        };
        info!(key = %account.key, "account derived");
        self.announce_selection(&account);
        Ok(account)
    }

    /// Change the current keyring's address type, keeping the selected account position.
    /// HD keyrings move to the new type's derivation path.
    pub fn change_address_type(&self, address_type: AddressType) -> WalletResult<DisplayKeyring> {
        let (shown, account) = {
            let mut state = self.write()?;
            let contacts = self.contacts.as_ref();
            let (keyring, account) = state.current_account(contacts)?;
            let index = keyring.stored_index().ok_or(WalletError::NoCurrentKeyring)?;
            let stored = state.store.get_mut(index)?;
            if let Keyring::Hd(hd) = &mut stored.keyring {
                hd.change_hd_path(address_type.hd_path())?;
            }
            stored.address_type = address_type;
            let account = state.select(index, account.index, contacts)?;
            (state.display_stored(index, contacts)?, account)
        };
        info!(key = %shown.key, address_type = address_type.label(), "address type changed");
        self.announce_selection(&account);
        Ok(shown)
    }

    // Labels

    pub fn set_keyring_label(&self, index: usize, label: &str) -> WalletResult<()> {
        let mut state = self.write()?;
        state.store.get(index)?;
        state.keyring_labels.insert(KeyringRef::Stored(index).key(), label.to_string());
        Ok(())
    }

    /// Label for account `key` (`keyring_<index>#<accountIndex>`)
    pub fn set_account_label(&self, account_key: &str, label: &str) -> WalletResult<()> {
        self.write()?.account_labels.insert(account_key.to_string(), label.to_string());
        Ok(())
    }

    /// Generated label the next derived account of keyring `index` would get
    pub fn next_account_label(&self, index: usize) -> WalletResult<String> {
        let state = self.read()?;
        let stored = state.store.get(index)?;
        Ok(generated_account_label(stored.keyring.kind(), stored.keyring.public_keys().len() + 1))
    }

    // Export

    pub fn export_private_key(&self, pubkey: &str) -> WalletResult<ExportedKey> {
        let state = self.read()?;
        let pk = bitcoin::secp256k1::PublicKey::from_str(pubkey)
            .map_err(|e| WalletError::InvalidPublicKey(e.to_string()))?;
        let index = state
            .store
            .find_for_pubkey(&pk)
            .ok_or_else(|| WalletError::SigningKeyUnavailable { pubkey: pubkey.to_string() })?;
        let secret = state.store.get(index)?.keyring.export_secret(&pk)?;
        let wif = bitcoin::PrivateKey::new(secret, state.network.to_bitcoin()).to_wif();
        Ok(ExportedKey { hex: hex::encode(secret.secret_bytes()), wif })
    }

    pub fn export_mnemonic(&self, index: usize) -> WalletResult<ExportedMnemonic> {
        let state = self.read()?;
        match &state.store.get(index)?.keyring {
            Keyring::Hd(hd) => Ok(ExportedMnemonic {
                mnemonic: hd.mnemonic().to_string(),
                hd_path: hd.hd_path().to_string(),
                passphrase: hd.passphrase().to_string(),
            }),
            other => Err(WalletError::Unsupported { kind: other.kind().as_str(), operation: "mnemonic export" }),
        }
    }

    // Signing

    /// Run `f` with the current selection and its keyring, under a single lock.
    pub(crate) fn with_signing_keyring<R>(
        &self,
        f: impl FnOnce(&SigningContext, &Keyring) -> WalletResult<R>,
    ) -> WalletResult<R> {
        let mut state = self.write()?;
        let (keyring, account) = state.current_account(self.contacts.as_ref())?;
        let index = keyring.stored_index().ok_or(WalletError::NoCurrentKeyring)?;
        let context = SigningContext { account, keyring, network: state.network };
        let stored = state.store.get(index)?;
        f(&context, &stored.keyring)
    }
}
