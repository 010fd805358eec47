//! Inscription orders against a scripted service
//!
//! These tests verify:
//! 1. The submitted order carries the rounded total and the exact content list
//! 2. Discount status switches the service fee
//! 3. Service rejections surface the provider's message
//! 4. Fees that cannot be represented are refused before submission
//! 5. Order results are passed through untouched

use async_trait::async_trait;
use orcwallet::inscribe::{OrderReceipt, OrderSubmission};
use orcwallet::{create_order, ErrorKind, InscribeApi, InscribeProtocol, OrderRequest, ServiceFees, WalletError, WalletResult};
use serde_json::{json, Value};
use std::sync::Mutex;

const RECEIVER: &str = "bc1pmfr3p9j00pfxjh0zmgp99y8zftmd3s5pmedqhyptwy6lm87hf5sspknck9";

struct ScriptedService {
    byte_size: u64,
    og: bool,
    reject_with: Option<&'static str>,
    sized: Mutex<Vec<Vec<String>>>,
    submitted: Mutex<Vec<OrderSubmission>>,
}

impl ScriptedService {
    fn new(byte_size: u64, og: bool) -> Self {
        Self { byte_size, og, reject_with: None, sized: Mutex::new(Vec::new()), submitted: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl InscribeApi for ScriptedService {
    async fn data_size(&self, content_list: &[String]) -> WalletResult<u64> {
        self.sized.lock().unwrap().push(content_list.to_vec());
        Ok(self.byte_size)
    }

    async fn discount_eligible(&self, _address: &str) -> WalletResult<bool> {
        Ok(self.og)
    }

    async fn submit_order(&self, order: &OrderSubmission) -> WalletResult<OrderReceipt> {
        if let Some(message) = self.reject_with {
            return Err(WalletError::OrderRejected(message.to_string()));
        }
        self.submitted.lock().unwrap().push(order.clone());
        Ok(OrderReceipt { order_id: "order-1".into(), pay_address: "bc1qpay".into() })
    }

    async fn order_result(&self, order_id: &str) -> WalletResult<Value> {
        Ok(json!({"orderId": order_id, "status": "pending"}))
    }
}

fn run<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::runtime::Runtime::new().unwrap().block_on(future)
}

#[test]
fn order_submits_rounded_total() {
    let service = ScriptedService::new(100, false);
    let request = OrderRequest::new(InscribeProtocol::Orc20, RECEIVER, "orc", "100", 10.0).with_token_id("1");

    let order = run(create_order(&service, &ServiceFees::default(), &request)).unwrap();
    assert_eq!(order.order_id, "order-1");
    assert_eq!(order.pay_address, "bc1qpay");
    assert_eq!(order.miner_fee, 1050);
    assert_eq!(order.service_fee, 2000);
    assert_eq!(order.origin_service_fee, 2000);
    assert_eq!(order.output_value, 546);
    assert_eq!(order.total_fee, 3000);
    assert_eq!(order.total_fee % 1000, 0);
    assert!(order.total_fee <= order.miner_fee + order.service_fee + order.output_value);

    let content = vec![r#"{"p":"orc-20","op":"send","tick":"orc","amt":"100","id":"1"}"#.to_string()];
    assert_eq!(service.sized.lock().unwrap().as_slice(), &[content.clone()]);

    let submitted = service.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].receive_address, RECEIVER);
    assert_eq!(submitted[0].content_list, content);
    assert_eq!(submitted[0].sats_in_inscription, 546);
    assert_eq!(submitted[0].total_amount, "3000");
    assert_eq!(submitted[0].fee_rate, 10.0);
}

#[test]
fn discount_lowers_service_fee() {
    let service = ScriptedService::new(100, true);
    let request = OrderRequest::new(InscribeProtocol::Brc20, RECEIVER, "ordi", "1", 10.0);
    let fees = ServiceFees { base: 5000, og: 1500 };

    let order = run(create_order(&service, &fees, &request)).unwrap();
    assert_eq!(order.service_fee, 1500);
    assert_eq!(order.total_fee, 3000);
    assert_eq!(
        service.sized.lock().unwrap()[0],
        vec![r#"{"p":"brc-20","op":"transfer","tick":"ordi","amt":"1"}"#.to_string()]
    );
}

#[test]
fn rejection_carries_provider_message() {
    let mut service = ScriptedService::new(100, false);
    service.reject_with = Some("insufficient inscribe balance");
    let request = OrderRequest::new(InscribeProtocol::OrcCash, RECEIVER, "cash", "5", 3.0);

    let err = run(create_order(&service, &ServiceFees::default(), &request)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Remote);
    assert_eq!(err.to_string(), "order rejected: insufficient inscribe balance");
}

#[test]
fn invalid_request_never_reaches_service() {
    let service = ScriptedService::new(100, false);
    let request = OrderRequest::new(InscribeProtocol::Orc20, RECEIVER, "", "5", 3.0);

    let err = run(create_order(&service, &ServiceFees::default(), &request)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(service.sized.lock().unwrap().is_empty());
}

#[test]
fn unpayable_size_is_refused_before_submission() {
    let service = ScriptedService::new(u64::MAX, false);
    let request = OrderRequest::new(InscribeProtocol::Orc20, RECEIVER, "orc", "1", 1e6);

    let err = run(create_order(&service, &ServiceFees::default(), &request)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(service.sized.lock().unwrap().len(), 1);
    assert!(service.submitted.lock().unwrap().is_empty());
}

#[test]
fn order_result_passes_through() {
    let service = ScriptedService::new(0, false);
    let result = run(service.order_result("order-9")).unwrap();
    assert_eq!(result["orderId"], "order-9");
}

#[test]
fn order_serializes_camel_case() {
    let service = ScriptedService::new(250, false);
    let request = OrderRequest::new(InscribeProtocol::Orc20, RECEIVER, "orc", "1", 2.0);
    let order = run(create_order(&service, &ServiceFees::default(), &request)).unwrap();

    let value = serde_json::to_value(&order).unwrap();
    assert_eq!(value["orderId"], "order-1");
    assert_eq!(value["payAddress"], "bc1qpay");
    assert_eq!(value["minerFee"], 525);
    assert_eq!(value["originServiceFee"], 2000);
}
