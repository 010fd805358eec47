//! HTTP client for the inscription order service

use super::api::{ApiEnvelope, InscribeApi, OrderReceipt, OrderSubmission};
use super::InscribeProtocol;
use crate::config::{OrcApiConfig, WalletConfig};
use crate::core::paths::inscribe as routes;
use crate::core::NetworkType;
use crate::error::{WalletError, WalletResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn service(config: &WalletConfig, protocol: InscribeProtocol) -> &OrcApiConfig {
    match protocol {
        InscribeProtocol::OrcCash => &config.orc_cash_api,
        InscribeProtocol::Brc20 | InscribeProtocol::Orc20 => &config.orc_api,
    }
}

/// Any non-empty `data` marks the address as discounted, list or string.
fn has_discount(data: Option<&Value>) -> bool {
    match data {
        Some(Value::Array(list)) => !list.is_empty(),
        Some(Value::String(s)) => !s.is_empty(),
        _ => false,
    }
}

pub struct OrcApiClient {
    client: reqwest::Client,
    host: String,
}

impl OrcApiClient {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            host: host.into().trim_end_matches('/').to_string(),
        }
    }

    /// Client for `protocol` on `network`. orc-cash orders go to their own service.
    pub fn for_protocol(config: &WalletConfig, protocol: InscribeProtocol, network: NetworkType) -> Self {
        Self::new(service(config, protocol).host_for(network))
    }

    /// Client for a host persisted by an earlier session. Hosts no longer configured
    /// fall back to the mainnet service.
    pub fn for_stored_host(config: &WalletConfig, protocol: InscribeProtocol, stored: &str) -> Self {
        Self::new(service(config, protocol).sanitize_host(stored.trim_end_matches('/')))
    }

    pub fn host(&self) -> &str { &self.host }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.host, route)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> WalletResult<ApiEnvelope<T>> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WalletError::Transport(format!("http {}: {}", status, body)));
        }
        response
            .json()
            .await
            .map_err(|e| WalletError::Remote(format!("unreadable response: {}", e)))
    }

    async fn get<T: DeserializeOwned>(&self, route: &str, query: &[(&str, &str)]) -> WalletResult<ApiEnvelope<T>> {
        debug!(route, "orc api get");
        let response = self
            .client
            .get(self.url(route))
            .header("Accept-Language", "en-US")
            .query(query)
            .send()
            .await
            .map_err(|e| WalletError::Transport(e.to_string()))?;
        Self::read(response).await
    }

    async fn post<T: DeserializeOwned>(&self, route: &str, body: &Value) -> WalletResult<ApiEnvelope<T>> {
        debug!(route, "orc api post");
        let response = self
            .client
            .post(self.url(route))
            .header("Accept-Language", "en-US")
            .json(body)
            .send()
            .await
            .map_err(|e| WalletError::Transport(e.to_string()))?;
        Self::read(response).await
    }
}

#[async_trait]
impl InscribeApi for OrcApiClient {
    async fn data_size(&self, content_list: &[String]) -> WalletResult<u64> {
        let envelope: ApiEnvelope<u64> = self.post(routes::DATA_SIZE, &json!({ "data": content_list })).await?;
        envelope.into_data(WalletError::Remote)
    }

    async fn discount_eligible(&self, address: &str) -> WalletResult<bool> {
        let envelope: ApiEnvelope<Value> = self.get(routes::DISCOUNT, &[("data", ""), ("address", address)]).await?;
        if !envelope.is_success() {
            return envelope.into_data(WalletError::Remote).map(|_| false);
        }
        Ok(has_discount(envelope.data.as_ref()))
    }

    async fn submit_order(&self, order: &OrderSubmission) -> WalletResult<OrderReceipt> {
        let body = serde_json::to_value(order)?;
        let envelope: ApiEnvelope<OrderReceipt> = self.post(routes::ORDER, &body).await?;
        envelope.into_data(WalletError::OrderRejected)
    }

    async fn order_result(&self, order_id: &str) -> WalletResult<Value> {
        let envelope: ApiEnvelope<Vec<Value>> = self.get(routes::ORDER_LIST, &[("orderIds", order_id)]).await?;
        envelope
            .into_data(WalletError::Remote)?
            .into_iter()
            .next()
            .ok_or_else(|| WalletError::Remote(format!("order {} not found", order_id)))
    }
}
