//! Remote collaborators of the inscription flow

use crate::core::paths::inscribe::SUCCESS_CODE;
use crate::error::{WalletError, WalletResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inscription order service
#[async_trait]
pub trait InscribeApi: Send + Sync {
    /// Inscribed byte size of `content_list`
    async fn data_size(&self, content_list: &[String]) -> WalletResult<u64>;
    /// Whether `address` is on the discount ("OG") list
    async fn discount_eligible(&self, address: &str) -> WalletResult<bool>;
    async fn submit_order(&self, order: &OrderSubmission) -> WalletResult<OrderReceipt>;
    /// First entry of the order list for `order_id`, as returned by the service
    async fn order_result(&self, order_id: &str) -> WalletResult<Value>;
}

/// UTXO index
#[async_trait]
pub trait UtxoApi: Send + Sync {
    async fn address_utxos(&self, address: &str) -> WalletResult<Vec<Utxo>>;
    async fn inscription_utxo(&self, inscription_id: &str) -> WalletResult<Option<Utxo>>;
}

/// Body of `POST /inscribe/order`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSubmission {
    pub receive_address: String,
    pub fee_rate: f64,
    pub content_list: Vec<String>,
    pub sats_in_inscription: u64,
    /// Decimal string of the rounded total
    pub total_amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    #[serde(rename = "orderID")]
    pub order_id: String,
    #[serde(rename = "orderPayAddress")]
    pub pay_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InscriptionRef {
    #[serde(alias = "inscriptionId")]
    pub id: String,
    #[serde(default)]
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    pub tx_id: String,
    pub output_index: u32,
    pub satoshis: u64,
    #[serde(default)]
    pub script_pk: String,
    #[serde(default)]
    pub inscriptions: Vec<InscriptionRef>,
}

/// `{code, msg, data}` wrapper around every service response
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: String,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub fn is_success(&self) -> bool { self.code == SUCCESS_CODE }

    /// Unwrap `data`, mapping a non-success code through `rejected` with the service message.
    pub fn into_data(self, rejected: fn(String) -> WalletError) -> WalletResult<T> {
        if !self.is_success() {
            let message = self.msg.filter(|m| !m.is_empty()).unwrap_or_else(|| format!("code {}", self.code));
            return Err(rejected(message));
        }
        self.data.ok_or_else(|| WalletError::Remote("response without data".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_maps_codes() {
        let ok: ApiEnvelope<u64> = serde_json::from_str(r#"{"code":"000","msg":"","data":120}"#).unwrap();
        assert_eq!(ok.into_data(WalletError::Remote).unwrap(), 120);

        let rejected: ApiEnvelope<u64> = serde_json::from_str(r#"{"code":"500","msg":"tick not found"}"#).unwrap();
        let err = rejected.into_data(WalletError::OrderRejected).unwrap_err();
        assert_eq!(err.to_string(), "order rejected: tick not found");

        let silent: ApiEnvelope<u64> = serde_json::from_str(r#"{"code":"404"}"#).unwrap();
        assert!(matches!(silent.into_data(WalletError::Remote), Err(WalletError::Remote(m)) if m == "code 404"));

        let empty: ApiEnvelope<u64> = serde_json::from_str(r#"{"code":"000","data":null}"#).unwrap();
        assert!(matches!(empty.into_data(WalletError::Remote), Err(WalletError::Remote(_))));
    }

    #[test]
    fn receipt_and_utxo_wire_names() {
        let receipt: OrderReceipt =
            serde_json::from_str(r#"{"orderID":"o-1","orderPayAddress":"bc1qpay"}"#).unwrap();
        assert_eq!(receipt.order_id, "o-1");
        assert_eq!(receipt.pay_address, "bc1qpay");

        let utxo: Utxo = serde_json::from_value(serde_json::json!({
            "txId": "ab".repeat(32),
            "outputIndex": 1,
            "satoshis": 546,
            "scriptPk": "5120",
            "addressType": 2,
            "inscriptions": [{"inscriptionId": "abi0", "offset": 0}]
        }))
        .unwrap();
        assert_eq!(utxo.output_index, 1);
        assert_eq!(utxo.inscriptions[0].id, "abi0");
    }

    #[test]
    fn submission_uses_camel_case() {
        let body = serde_json::to_value(OrderSubmission {
            receive_address: "bc1q".into(),
            fee_rate: 10.0,
            content_list: vec!["{}".into()],
            sats_in_inscription: 546,
            total_amount: "3000".into(),
        })
        .unwrap();
        assert_eq!(body["receiveAddress"], "bc1q");
        assert_eq!(body["satsInInscription"], 546);
        assert_eq!(body["totalAmount"], "3000");
    }
}
