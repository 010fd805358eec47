//! In-memory key material, populated on unlock and wiped on lock

use super::{KeySource, Keyring, VaultEntry};
use crate::core::AddressType;
use crate::error::{WalletError, WalletResult};
use bitcoin::secp256k1::PublicKey;
use std::collections::HashMap;

/// A keyring together with the address type its accounts are shown as
pub struct StoredKeyring {
    pub keyring: Keyring,
    pub address_type: AddressType,
}

impl StoredKeyring {
    pub fn new(keyring: Keyring, address_type: AddressType) -> Self {
        Self { keyring, address_type }
    }

    pub fn to_entry(&self) -> VaultEntry {
        VaultEntry { address_type: self.address_type, keyring: self.keyring.to_blob() }
    }
}

/// Opaque reference to a keyring that is never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TempKeyringHandle(u64);

impl TempKeyringHandle {
    pub fn id(&self) -> u64 { self.0 }
}

/// Ordered keyring slots plus temporary keyrings.
///
/// Slot positions are stable: removing a keyring leaves an `Empty` placeholder so
/// every other keyring keeps its index.
#[derive(Default)]
pub struct KeyMaterialStore {
    slots: Vec<StoredKeyring>,
    temporary: HashMap<TempKeyringHandle, StoredKeyring>,
    next_handle: u64,
    unlocked: bool,
}

impl KeyMaterialStore {
    pub fn new() -> Self { Self::default() }

    pub fn is_unlocked(&self) -> bool { self.unlocked }

    /// Rebuild every keyring from `entries`. Nothing changes if any entry is invalid.
    pub fn unlock(&mut self, entries: &[VaultEntry]) -> WalletResult<()> {
        let slots = entries
            .iter()
            .map(|entry| Ok(StoredKeyring::new(Keyring::from_blob(&entry.keyring)?, entry.address_type)))
            .collect::<WalletResult<Vec<_>>>()?;
        self.slots = slots;
        self.temporary.clear();
        self.unlocked = true;
        Ok(())
    }

    pub fn lock(&mut self) {
        self.slots.clear();
        self.temporary.clear();
        self.unlocked = false;
    }

    fn ensure_unlocked(&self) -> WalletResult<()> {
        if self.unlocked { Ok(()) } else { Err(WalletError::Locked) }
    }

    pub fn add(&mut self, keyring: Keyring, address_type: AddressType) -> WalletResult<usize> {
        self.ensure_unlocked()?;
        self.slots.push(StoredKeyring::new(keyring, address_type));
        Ok(self.slots.len() - 1)
    }

    /// Non-empty keyring at `index`
    pub fn get(&self, index: usize) -> WalletResult<&StoredKeyring> {
        self.ensure_unlocked()?;
        self.slots
            .get(index)
            .filter(|slot| !slot.keyring.is_empty())
            .ok_or_else(|| WalletError::KeyringNotFound(index.to_string()))
    }

    pub fn get_mut(&mut self, index: usize) -> WalletResult<&mut StoredKeyring> {
        self.ensure_unlocked()?;
        self.slots
            .get_mut(index)
            .filter(|slot| !slot.keyring.is_empty())
            .ok_or_else(|| WalletError::KeyringNotFound(index.to_string()))
    }

    /// Replace the keyring at `index` with an `Empty` placeholder.
    pub fn remove(&mut self, index: usize) -> WalletResult<()> {
        let slot = self.get_mut(index)?;
        slot.keyring = Keyring::Empty;
        Ok(())
    }

    /// Indexes of non-empty keyrings in slot order
    pub fn active_indexes(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.keyring.is_empty())
            .map(|(index, _)| index)
            .collect()
    }

    /// Number of slots including removed ones
    pub fn len(&self) -> usize { self.slots.len() }

    pub fn is_empty(&self) -> bool { self.active_indexes().is_empty() }

    pub fn stash(&mut self, keyring: Keyring, address_type: AddressType) -> WalletResult<TempKeyringHandle> {
        self.ensure_unlocked()?;
        let handle = TempKeyringHandle(self.next_handle);
        self.next_handle += 1;
        self.temporary.insert(handle, StoredKeyring::new(keyring, address_type));
        Ok(handle)
    }

    pub fn temporary(&self, handle: TempKeyringHandle) -> WalletResult<&StoredKeyring> {
        self.ensure_unlocked()?;
        self.temporary
            .get(&handle)
            .ok_or_else(|| WalletError::KeyringNotFound(format!("temporary #{}", handle.id())))
    }

    /// Drop a temporary keyring. Returns whether it existed.
    pub fn release(&mut self, handle: TempKeyringHandle) -> bool {
        self.temporary.remove(&handle).is_some()
    }

    /// Move a temporary keyring into the persisted slots.
    pub fn promote(&mut self, handle: TempKeyringHandle) -> WalletResult<usize> {
        self.ensure_unlocked()?;
        let stored = self
            .temporary
            .remove(&handle)
            .ok_or_else(|| WalletError::KeyringNotFound(format!("temporary #{}", handle.id())))?;
        self.slots.push(stored);
        Ok(self.slots.len() - 1)
    }

    /// Serialized form of every slot, placeholders included
    pub fn export(&self) -> WalletResult<Vec<VaultEntry>> {
        self.ensure_unlocked()?;
        Ok(self.slots.iter().map(StoredKeyring::to_entry).collect())
    }

    /// First keyring holding an account for `pubkey`
    pub fn find_for_pubkey(&self, pubkey: &PublicKey) -> Option<usize> {
        self.slots.iter().position(|slot| slot.keyring.controls(pubkey))
    }
}
