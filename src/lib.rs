//! Orcwallet: wallet core for an ordinals-aware Bitcoin extension.
//!
//! # Architecture
//!
//! ```text
//! WalletSession (registry: keyrings, accounts, selection, labels, network)
//!   │
//!   ├── KeyMaterialStore (keyring slots + temporary arena, unlocked secrets)
//!   │     └── Keyring: Hd | Simple | Hardware | Watch | Empty
//!   │
//!   ├── psbt::resolve  (which inputs may the current account sign?)
//!   │     └── psbt::sign  (taproot fix-up → KeySource::sign → finalize)
//!   │
//!   └── events (EventSink: NetworkChanged, AccountsChanged, Lock, Unlock, ActiveAddress)
//!
//! address (pure): pubkey × AddressType × NetworkType → address
//! inscribe:       OrderRequest → InscribeApi → InscribeOrder
//! ```
//!
//! # Modules
//!
//! | Module | Role |
//! |--------|------|
//! | `address` | Address and script derivation |
//! | `keyring` | Key sources, vault blobs, input signing |
//! | `session` | Keyring/account registry and selection |
//! | `psbt` | Sign-input resolution, signing, finalization |
//! | `inscribe` | Inscription fee calculation and orders |
//! | `config` | `WalletConfig` builder |
//!
//! # Features
//!
//! - `http` (default) - `OrcApiClient`, reqwest client for the inscription service
//!
//! # Usage
//!
//! ```ignore
//! use orcwallet::{AddressType, WalletConfig, WalletSession};
//!
//! let session = WalletSession::new(WalletConfig::mainnet());
//! session.unlock(&[])?;
//! session.import_private_key(wif, AddressType::P2tr, None)?;
//! let signed = orcwallet::sign_psbt_hex(&session, &psbt_hex, None, true)?;
//! ```

pub mod address;
pub mod config;
pub mod core;
pub mod error;
pub mod inscribe;
pub mod keyring;
pub mod logging;
pub mod psbt;
pub mod session;

pub use address::derive_address;
pub use config::{OrcApiConfig, ServiceFees, WalletConfig};
pub use crate::core::{AddressType, EventBus, EventSink, NetworkType, WalletEvent};
pub use error::{ErrorKind, WalletError, WalletResult};
pub use inscribe::{calculate_fees, create_order, FeeBreakdown, InscribeApi, InscribeOrder, InscribeProtocol, OrderRequest};
#[cfg(feature = "http")]
pub use inscribe::OrcApiClient;
pub use keyring::{KeySource, Keyring, KeyringBlob, KeyringKind, VaultEntry};
pub use logging::{init_logging, init_logging_with, LogFormat};
pub use psbt::{sign_psbt, sign_psbt_hex, sign_psbt_with_options, ToSignInput, UserToSignInput};
pub use session::{Account, DisplayKeyring, KeyringRef, WalletSession};
