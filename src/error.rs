//! Error types for wallet operations

use thiserror::Error;

/// Broad failure class. Callers use it to decide whether to re-prompt, re-select or report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed caller input. Never retried.
    Validation,
    /// Selection or lifecycle problem. Re-initialize selection before retrying.
    State,
    /// Key, derivation, signing or finalization failure for one operation.
    Crypto,
    /// Non-success answer from a remote collaborator. No automatic retry.
    Remote,
}

#[derive(Error, Debug)]
pub enum WalletError {
    // Validation
    #[error("invalid index in toSignInput: {0}")]
    InvalidIndex(String),

    #[error("no address or public key in toSignInput #{index}")]
    MissingIdentifier { index: usize },

    #[error("invalid address in toSignInput #{index}: {address}")]
    AddressMismatch { index: usize, address: String },

    #[error("invalid public key in toSignInput #{index}: {pubkey}")]
    PubkeyMismatch { index: usize, pubkey: String },

    #[error("invalid sighash type in toSignInput #{index}: {value}")]
    InvalidSighashType { index: usize, value: String },

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("invalid derivation path: {0}")]
    InvalidDerivationPath(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid psbt: {0}")]
    InvalidPsbt(String),

    #[error("invalid inscription request: {0}")]
    InvalidInscription(String),

    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    // State
    #[error("no current keyring")]
    NoCurrentKeyring,

    #[error("no current account")]
    NoCurrentAccount,

    #[error("keyring not found: {0}")]
    KeyringNotFound(String),

    #[error("account #{account} not found in keyring {keyring}")]
    AccountNotFound { keyring: String, account: usize },

    #[error("wallet is locked")]
    Locked,

    #[error("{0}")]
    UtxoUnavailable(String),

    // Crypto
    #[error("signing key unavailable for {pubkey}")]
    SigningKeyUnavailable { pubkey: String },

    #[error("{kind} keyring does not support {operation}")]
    Unsupported { kind: &'static str, operation: &'static str },

    #[error("key derivation failed: {0}")]
    Derivation(String),

    #[error("cannot sign input #{index}: {reason}")]
    Signing { index: usize, reason: String },

    #[error("cannot finalize input #{index}: {reason}")]
    FinalizationFailed { index: usize, reason: String },

    // Remote
    #[error("order rejected: {0}")]
    OrderRejected(String),

    #[error("remote error: {0}")]
    Remote(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        use WalletError::*;
        match self {
            InvalidIndex(_)
            | MissingIdentifier { .. }
            | AddressMismatch { .. }
            | PubkeyMismatch { .. }
            | InvalidSighashType { .. }
            | InvalidPublicKey(_)
            | InvalidPrivateKey(_)
            | InvalidMnemonic(_)
            | InvalidDerivationPath(_)
            | InvalidAddress(_)
            | InvalidPsbt(_)
            | InvalidInscription(_)
            | UnknownNetwork(_) => ErrorKind::Validation,
            NoCurrentKeyring
            | NoCurrentAccount
            | KeyringNotFound(_)
            | AccountNotFound { .. }
            | Locked
            | UtxoUnavailable(_)
            | Internal(_) => ErrorKind::State,
            SigningKeyUnavailable { .. }
            | Unsupported { .. }
            | Derivation(_)
            | Signing { .. }
            | FinalizationFailed { .. } => ErrorKind::Crypto,
            OrderRejected(_) | Remote(_) | Transport(_) => ErrorKind::Remote,
        }
    }
}

impl From<hex::FromHexError> for WalletError {
    fn from(err: hex::FromHexError) -> Self {
        WalletError::InvalidPublicKey(format!("hex decode error: {}", err))
    }
}

impl From<bitcoin::bip32::Error> for WalletError {
    fn from(err: bitcoin::bip32::Error) -> Self {
        WalletError::Derivation(err.to_string())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::Remote(format!("json: {}", err))
    }
}

pub type WalletResult<T> = std::result::Result<T, WalletError>;
