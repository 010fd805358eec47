//! Shared vocabulary: address types, networks, constants, events

pub mod events;
pub mod paths;
pub mod types;

pub use events::{EventBus, EventSink, NoopSink, WalletEvent};
pub use types::{AddressType, NetworkType};
