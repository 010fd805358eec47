//! Path and label constants
//!
//! Centralized registry for derivation paths, keyring labels and remote routes.

/// HD derivation path templates (account index is appended as the last component)
pub mod hd {
    pub const BIP44: &str = "m/44'/0'/0'/0";
    pub const BIP49: &str = "m/49'/0'/0'/0";
    pub const BIP84: &str = "m/84'/0'/0'/0";
    pub const BIP86: &str = "m/86'/0'/0'/0";

    pub const DEFAULT: &str = BIP84;
}

/// Keyring type identifiers as stored in serialized vault blobs
pub mod keyring_type {
    pub const HD: &str = "HD Key Tree";
    pub const SIMPLE: &str = "Simple Key Pair";
    pub const HARDWARE: &str = "Hardware Keyring";
    pub const WATCH: &str = "Watch Address Keyring";
    pub const EMPTY: &str = "Empty";
}

/// Keyring key prefix, `keyring_<index>` and `keyring_<index>#<account>`
pub const KEYRING_KEY_PREFIX: &str = "keyring_";

/// Index rendered into keys of temporary keyrings
pub const TEMPORARY_INDEX: i64 = -1;

/// Inscription service routes
pub mod inscribe {
    pub const DATA_SIZE: &str = "/inscribe/dataSize";
    pub const DISCOUNT: &str = "/inscribe/discount";
    pub const ORDER: &str = "/inscribe/order";
    pub const ORDER_LIST: &str = "/inscribe/orderList";

    /// Success code in the `{code, msg, data}` envelope
    pub const SUCCESS_CODE: &str = "000";
}
