//! HD keyring - BIP39 mnemonic, BIP32 path template, active account indexes

use super::{KeySource, KeyringBlob, KeyringKind};
use crate::error::{WalletError, WalletResult};
use bip39::Mnemonic;
use bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv};
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use bitcoin::NetworkKind;
use std::str::FromStr;
use zeroize::Zeroizing;

pub struct HdKeyring {
    mnemonic: Zeroizing<String>,
    passphrase: Zeroizing<String>,
    seed: Zeroizing<[u8; 64]>,
    hd_path: String,
    path: DerivationPath,
    active_indexes: Vec<u32>,
    pubkeys: Vec<PublicKey>,
}

impl HdKeyring {
    /// Create a keyring with accounts `0..account_count`.
    pub fn new(mnemonic: &str, hd_path: &str, passphrase: &str, account_count: u32) -> WalletResult<Self> {
        let indexes: Vec<u32> = (0..account_count.max(1)).collect();
        Self::restore(mnemonic, hd_path, passphrase, &indexes)
    }

    pub fn restore(mnemonic: &str, hd_path: &str, passphrase: &str, active_indexes: &[u32]) -> WalletResult<Self> {
        let parsed = Mnemonic::parse_normalized(mnemonic).map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
        let path = DerivationPath::from_str(hd_path)
            .map_err(|e| WalletError::InvalidDerivationPath(format!("{}: {}", hd_path, e)))?;
        let mut keyring = Self {
            mnemonic: Zeroizing::new(parsed.to_string()),
            passphrase: Zeroizing::new(passphrase.to_string()),
            seed: Zeroizing::new(parsed.to_seed(passphrase)),
            hd_path: hd_path.to_string(),
            path,
            active_indexes: Vec::with_capacity(active_indexes.len()),
            pubkeys: Vec::with_capacity(active_indexes.len()),
        };
        for &index in active_indexes {
            keyring.activate(index)?;
        }
        Ok(keyring)
    }

    fn activate(&mut self, index: u32) -> WalletResult<PublicKey> {
        let pubkey = self.public_key_at(&self.path, index)?;
        self.active_indexes.push(index);
        self.pubkeys.push(pubkey);
        Ok(pubkey)
    }

    fn derive_secret(&self, path: &DerivationPath, index: u32) -> WalletResult<SecretKey> {
        let secp = Secp256k1::signing_only();
        let child = ChildNumber::from_normal_idx(index)?;
        let master = Xpriv::new_master(NetworkKind::Main, self.seed.as_ref())?;
        Ok(master.derive_priv(&secp, &path.child(child))?.private_key)
    }

    fn public_key_at(&self, path: &DerivationPath, index: u32) -> WalletResult<PublicKey> {
        let secp = Secp256k1::signing_only();
        Ok(self.derive_secret(path, index)?.public_key(&secp))
    }

    /// Key of account `index` under a different path template, without activating it.
    pub fn public_key_by_path(&self, hd_path: &str, index: u32) -> WalletResult<PublicKey> {
        let path = DerivationPath::from_str(hd_path)
            .map_err(|e| WalletError::InvalidDerivationPath(format!("{}: {}", hd_path, e)))?;
        self.public_key_at(&path, index)
    }

    /// Re-derive every active account under a new path template.
    pub fn change_hd_path(&mut self, hd_path: &str) -> WalletResult<()> {
        if hd_path == self.hd_path {
            return Ok(());
        }
        let path = DerivationPath::from_str(hd_path)
            .map_err(|e| WalletError::InvalidDerivationPath(format!("{}: {}", hd_path, e)))?;
        let pubkeys = self
            .active_indexes
            .iter()
            .map(|&index| self.public_key_at(&path, index))
            .collect::<WalletResult<Vec<_>>>()?;
        self.hd_path = hd_path.to_string();
        self.path = path;
        self.pubkeys = pubkeys;
        Ok(())
    }

    pub fn mnemonic(&self) -> &str { &self.mnemonic }
    pub fn passphrase(&self) -> &str { &self.passphrase }
    pub fn active_indexes(&self) -> &[u32] { &self.active_indexes }

    pub fn to_blob(&self) -> KeyringBlob {
        KeyringBlob::Hd {
            mnemonic: self.mnemonic.to_string(),
            passphrase: self.passphrase.to_string(),
            hd_path: self.hd_path.clone(),
            active_indexes: self.active_indexes.clone(),
        }
    }
}

impl KeySource for HdKeyring {
    fn kind(&self) -> KeyringKind { KeyringKind::Hd }

    fn public_keys(&self) -> Vec<PublicKey> { self.pubkeys.clone() }

    fn derive_account(&mut self) -> WalletResult<PublicKey> {
        let next = self.active_indexes.iter().max().map(|i| i + 1).unwrap_or(0);
        self.activate(next)
    }

    fn export_secret(&self, pubkey: &PublicKey) -> WalletResult<SecretKey> {
        let position = self
            .pubkeys
            .iter()
            .position(|pk| pk == pubkey)
            .ok_or_else(|| WalletError::SigningKeyUnavailable { pubkey: pubkey.to_string() })?;
        self.derive_secret(&self.path, self.active_indexes[position])
    }

    fn hd_path(&self) -> &str { &self.hd_path }
}
