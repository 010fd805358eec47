//! Keyrings without local secrets: hardware-backed (xpub) and watch-only (pubkeys)

use super::{KeySource, KeyringBlob, KeyringKind};
use crate::error::{WalletError, WalletResult};
use bitcoin::bip32::{ChildNumber, Xpub};
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use std::str::FromStr;

/// Account xpub exported by a signing device; accounts are its non-hardened children.
pub struct HardwareKeyring {
    xpub: Xpub,
    hd_path: String,
    active_indexes: Vec<u32>,
    pubkeys: Vec<PublicKey>,
}

impl HardwareKeyring {
    pub fn restore(xpub: &str, hd_path: &str, active_indexes: &[u32]) -> WalletResult<Self> {
        let xpub = Xpub::from_str(xpub.trim()).map_err(|e| WalletError::InvalidPublicKey(format!("xpub: {}", e)))?;
        let mut keyring = Self { xpub, hd_path: hd_path.to_string(), active_indexes: Vec::new(), pubkeys: Vec::new() };
        for &index in active_indexes {
            keyring.activate(index)?;
        }
        Ok(keyring)
    }

    fn activate(&mut self, index: u32) -> WalletResult<PublicKey> {
        let secp = Secp256k1::verification_only();
        let child = self.xpub.derive_pub(&secp, &[ChildNumber::from_normal_idx(index)?])?;
        self.active_indexes.push(index);
        self.pubkeys.push(child.public_key);
        Ok(child.public_key)
    }

    pub fn to_blob(&self) -> KeyringBlob {
        KeyringBlob::Hardware {
            xpub: self.xpub.to_string(),
            hd_path: self.hd_path.clone(),
            active_indexes: self.active_indexes.clone(),
        }
    }
}

impl KeySource for HardwareKeyring {
    fn kind(&self) -> KeyringKind { KeyringKind::Hardware }

    fn public_keys(&self) -> Vec<PublicKey> { self.pubkeys.clone() }

    fn derive_account(&mut self) -> WalletResult<PublicKey> {
        let next = self.active_indexes.iter().max().map(|i| i + 1).unwrap_or(0);
        self.activate(next)
    }

    fn export_secret(&self, pubkey: &PublicKey) -> WalletResult<SecretKey> {
        Err(WalletError::SigningKeyUnavailable { pubkey: format!("{} (held by hardware device)", pubkey) })
    }

    fn hd_path(&self) -> &str { &self.hd_path }
}

pub struct WatchKeyring {
    pubkeys: Vec<PublicKey>,
}

impl WatchKeyring {
    pub fn new<S: AsRef<str>>(pubkeys: &[S]) -> WalletResult<Self> {
        let pubkeys = pubkeys
            .iter()
            .map(|pk| PublicKey::from_str(pk.as_ref().trim()).map_err(|e| WalletError::InvalidPublicKey(e.to_string())))
            .collect::<WalletResult<Vec<_>>>()?;
        Ok(Self { pubkeys })
    }

    pub fn to_blob(&self) -> KeyringBlob {
        KeyringBlob::Watch { pubkeys: self.pubkeys.iter().map(|pk| pk.to_string()).collect() }
    }
}

impl KeySource for WatchKeyring {
    fn kind(&self) -> KeyringKind { KeyringKind::Watch }

    fn public_keys(&self) -> Vec<PublicKey> { self.pubkeys.clone() }

    fn derive_account(&mut self) -> WalletResult<PublicKey> {
        Err(WalletError::Unsupported { kind: KeyringKind::Watch.as_str(), operation: "account derivation" })
    }

    fn export_secret(&self, pubkey: &PublicKey) -> WalletResult<SecretKey> {
        Err(WalletError::SigningKeyUnavailable { pubkey: format!("{} (watch-only)", pubkey) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bip39::Mnemonic;
    use bitcoin::bip32::{DerivationPath, Xpriv};
    use bitcoin::NetworkKind;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn receive_chain_xpub() -> String {
        let seed = Mnemonic::parse_normalized(TEST_MNEMONIC).unwrap().to_seed("");
        let secp = Secp256k1::new();
        let master = Xpriv::new_master(NetworkKind::Main, &seed).unwrap();
        let path = DerivationPath::from_str("m/84'/0'/0'/0").unwrap();
        Xpub::from_priv(&secp, &master.derive_priv(&secp, &path).unwrap()).to_string()
    }

    #[test]
    fn hardware_derives_receive_chain_children() {
        let mut keyring = HardwareKeyring::restore(&receive_chain_xpub(), "m/84'/0'/0'/0", &[0]).unwrap();
        assert_eq!(
            keyring.public_keys()[0].to_string(),
            "0330d54fd0dd420a6e5f8d3624f5f3482cae350f79d5f0753bf5beef9c2d91af3c"
        );
        keyring.derive_account().unwrap();
        assert_eq!(keyring.public_keys().len(), 2);
        assert_eq!(keyring.hd_path(), "m/84'/0'/0'/0");
    }

    #[test]
    fn hardware_never_exposes_secrets() {
        let keyring = HardwareKeyring::restore(&receive_chain_xpub(), "m/84'/0'/0'/0", &[0]).unwrap();
        let pk = keyring.public_keys()[0];
        assert!(matches!(keyring.export_secret(&pk), Err(WalletError::SigningKeyUnavailable { .. })));
        assert!(HardwareKeyring::restore("xpub-garbage", "m/84'/0'/0'/0", &[0]).is_err());
    }

    #[test]
    fn watch_only_holds_given_keys() {
        let pk = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
        let mut keyring = WatchKeyring::new(&[pk]).unwrap();
        assert_eq!(keyring.public_keys()[0].to_string(), pk);
        assert!(keyring.derive_account().is_err());
        assert!(keyring.export_secret(&keyring.public_keys()[0]).is_err());
        assert!(WatchKeyring::new(&["02abc"]).is_err());
    }
}
