//! Wallet notifications for the host (tabs, popup, network client)

use serde_json::{json, Value};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    NetworkChanged { network: String },
    AccountsChanged { accounts: Vec<String> },
    Lock,
    Unlock,
    /// Address the network client should attribute requests to
    ActiveAddress { address: String },
}

impl WalletEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WalletEvent::NetworkChanged { .. } => "networkChanged",
            WalletEvent::AccountsChanged { .. } => "accountsChanged",
            WalletEvent::Lock => "lock",
            WalletEvent::Unlock => "unlock",
            WalletEvent::ActiveAddress { .. } => "activeAddress",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            WalletEvent::NetworkChanged { network } => json!({"network": network}),
            WalletEvent::AccountsChanged { accounts } => json!(accounts),
            WalletEvent::Lock | WalletEvent::Unlock => Value::Null,
            WalletEvent::ActiveAddress { address } => json!({"address": address}),
        }
    }
}

/// Delivery of notifications is the sink's concern; the wallet only emits.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: WalletEvent);
}

/// Sink that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: WalletEvent) {}
}

/// Broadcast fan-out to any number of listeners
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<WalletEvent>,
}

impl Default for EventBus {
    fn default() -> Self { Self::new(64) }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: WalletEvent) {
        tracing::debug!(event = event.name(), "wallet event");
        // No listeners is fine
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_delivers_in_emit_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.emit(WalletEvent::Unlock);
        bus.emit(WalletEvent::AccountsChanged { accounts: vec!["bc1q".into()] });

        assert_eq!(rx.try_recv().unwrap(), WalletEvent::Unlock);
        let next = rx.try_recv().unwrap();
        assert_eq!(next.name(), "accountsChanged");
        assert_eq!(next.payload(), json!(["bc1q"]));
    }

    #[test]
    fn emit_without_listeners_is_silent() {
        EventBus::new(0).emit(WalletEvent::Lock);
    }
}
