//! Wallet configuration - passed in by the host application

use crate::core::paths::hd;
use crate::core::NetworkType;

/// Inscription service fee in sats, by discount status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceFees {
    pub base: u64,
    /// Charged when the address is on the service's discount ("OG") list
    pub og: u64,
}

impl Default for ServiceFees {
    fn default() -> Self { Self { base: 2000, og: 1000 } }
}

impl ServiceFees {
    pub fn for_discount(&self, is_og: bool) -> u64 {
        if is_og { self.og } else { self.base }
    }
}

/// Inscription service hosts per network
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrcApiConfig {
    pub mainnet_host: String,
    pub testnet_host: String,
}

impl OrcApiConfig {
    pub fn new(mainnet_host: impl Into<String>, testnet_host: impl Into<String>) -> Self {
        Self { mainnet_host: mainnet_host.into(), testnet_host: testnet_host.into() }
    }

    pub fn host_for(&self, network: NetworkType) -> &str {
        match network {
            NetworkType::Mainnet => &self.mainnet_host,
            NetworkType::Testnet => &self.testnet_host,
        }
    }

    /// A persisted host is kept only if it is one of ours; anything else falls back to mainnet.
    pub fn sanitize_host<'a>(&'a self, stored: &'a str) -> &'a str {
        if stored == self.mainnet_host || stored == self.testnet_host { stored } else { &self.mainnet_host }
    }
}

#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub network: NetworkType,
    pub service_fees: ServiceFees,
    pub orc_api: OrcApiConfig,
    /// Hosts used for orc-cash orders
    pub orc_cash_api: OrcApiConfig,
    pub default_hd_path: String,
    pub event_capacity: usize,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: NetworkType::default(),
            service_fees: ServiceFees::default(),
            orc_api: OrcApiConfig::default(),
            orc_cash_api: OrcApiConfig::default(),
            default_hd_path: hd::DEFAULT.to_string(),
            event_capacity: 64,
        }
    }
}

impl WalletConfig {
    pub fn new() -> Self { Self::default() }
    pub fn mainnet() -> Self { Self { network: NetworkType::Mainnet, ..Default::default() } }
    pub fn testnet() -> Self { Self { network: NetworkType::Testnet, ..Default::default() } }
    pub fn with_network(mut self, network: NetworkType) -> Self { self.network = network; self }
    pub fn with_service_fees(mut self, base: u64, og: u64) -> Self { self.service_fees = ServiceFees { base, og }; self }
    pub fn with_api_host(mut self, api: OrcApiConfig) -> Self { self.orc_api = api; self }
    pub fn with_cash_api_host(mut self, api: OrcApiConfig) -> Self { self.orc_cash_api = api; self }
    pub fn with_default_hd_path(mut self, path: impl Into<String>) -> Self { self.default_hd_path = path.into(); self }
    pub fn with_event_capacity(mut self, capacity: usize) -> Self { self.event_capacity = capacity; self }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = WalletConfig::testnet()
            .with_service_fees(3000, 1500)
            .with_api_host(OrcApiConfig::new("https://main.example", "https://test.example"));
        assert_eq!(config.network, NetworkType::Testnet);
        assert_eq!(config.service_fees.for_discount(true), 1500);
        assert_eq!(config.orc_api.host_for(config.network), "https://test.example");
        assert_eq!(config.default_hd_path, "m/84'/0'/0'/0");
    }

    #[test]
    fn unknown_host_falls_back_to_mainnet() {
        let api = OrcApiConfig::new("https://main.example", "https://test.example");
        assert_eq!(api.sanitize_host("https://test.example"), "https://test.example");
        assert_eq!(api.sanitize_host("https://old.example"), "https://main.example");
    }
}
