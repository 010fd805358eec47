//! Simple keyring - imported private keys (hex or WIF)

use super::{KeySource, KeyringBlob, KeyringKind};
use crate::error::{WalletError, WalletResult};
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use bitcoin::PrivateKey;
use zeroize::Zeroizing;

pub struct SimpleKeyring {
    secrets: Vec<Zeroizing<[u8; 32]>>,
    pubkeys: Vec<PublicKey>,
}

impl SimpleKeyring {
    pub fn import<S: AsRef<str>>(keys: &[S]) -> WalletResult<Self> {
        if keys.is_empty() {
            return Err(WalletError::InvalidPrivateKey("no private key".into()));
        }
        let secp = Secp256k1::signing_only();
        let mut secrets = Vec::with_capacity(keys.len());
        let mut pubkeys = Vec::with_capacity(keys.len());
        for key in keys {
            let secret = parse_secret(key.as_ref())?;
            pubkeys.push(secret.public_key(&secp));
            secrets.push(Zeroizing::new(secret.secret_bytes()));
        }
        Ok(Self { secrets, pubkeys })
    }

    pub fn to_blob(&self) -> KeyringBlob {
        KeyringBlob::Simple { private_keys: self.secrets.iter().map(|s| hex::encode(&s[..])).collect() }
    }
}

fn parse_secret(key: &str) -> WalletResult<SecretKey> {
    let key = key.trim();
    if key.len() == 64 && key.chars().all(|c| c.is_ascii_hexdigit()) {
        let bytes = Zeroizing::new(hex::decode(key).map_err(|e| WalletError::InvalidPrivateKey(e.to_string()))?);
        return SecretKey::from_slice(&bytes).map_err(|e| WalletError::InvalidPrivateKey(e.to_string()));
    }
    PrivateKey::from_wif(key)
        .map(|pk| pk.inner)
        .map_err(|_| WalletError::InvalidPrivateKey("The private key is invalid".into()))
}

impl KeySource for SimpleKeyring {
    fn kind(&self) -> KeyringKind { KeyringKind::Simple }

    fn public_keys(&self) -> Vec<PublicKey> { self.pubkeys.clone() }

    fn derive_account(&mut self) -> WalletResult<PublicKey> {
        Err(WalletError::Unsupported { kind: KeyringKind::Simple.as_str(), operation: "account derivation" })
    }

    fn export_secret(&self, pubkey: &PublicKey) -> WalletResult<SecretKey> {
        let position = self
            .pubkeys
            .iter()
            .position(|pk| pk == pubkey)
            .ok_or_else(|| WalletError::SigningKeyUnavailable { pubkey: pubkey.to_string() })?;
        SecretKey::from_slice(&self.secrets[position][..]).map_err(|e| WalletError::Derivation(e.to_string()))
    }
}
