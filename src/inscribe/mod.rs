//! Inscription orders for token transfers
//!
//! ```text
//! OrderRequest ──payload──► data_size ─┐
//!              ──address──► discount ──┼─► calculate_fees ──► submit_order ──► InscribeOrder
//! ```
//!
//! Fees are in sats. The miner fee carries a 5% margin and the total is rounded
//! down to a whole thousand before it is sent to the service.

mod api;
#[cfg(feature = "http")]
mod client;
mod utxo;

pub use api::{ApiEnvelope, InscribeApi, InscriptionRef, OrderReceipt, OrderSubmission, Utxo, UtxoApi};
#[cfg(feature = "http")]
pub use client::OrcApiClient;
pub use utxo::gather_inscription_utxos;

use crate::config::ServiceFees;
use crate::error::{WalletError, WalletResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Sats locked in the inscription output
pub const INSCRIPTION_OUTPUT_VALUE: u64 = 546;
const MINER_FEE_MARGIN: f64 = 1.05;
const TOTAL_FEE_STEP: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InscribeProtocol {
    #[serde(rename = "brc-20")]
    Brc20,
    #[serde(rename = "orc-20")]
    Orc20,
    #[serde(rename = "orc-cash")]
    OrcCash,
}

impl InscribeProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            InscribeProtocol::Brc20 => "brc-20",
            InscribeProtocol::Orc20 => "orc-20",
            InscribeProtocol::OrcCash => "orc-cash",
        }
    }

    /// Operation name of a transfer inscription
    pub fn transfer_op(&self) -> &'static str {
        match self {
            InscribeProtocol::Brc20 => "transfer",
            InscribeProtocol::Orc20 | InscribeProtocol::OrcCash => "send",
        }
    }
}

impl fmt::Display for InscribeProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for InscribeProtocol {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brc-20" => Ok(InscribeProtocol::Brc20),
            "orc-20" => Ok(InscribeProtocol::Orc20),
            "orc-cash" => Ok(InscribeProtocol::OrcCash),
            other => Err(WalletError::InvalidInscription(format!("unknown protocol {}", other))),
        }
    }
}

/// JSON body of the inscription, `{p, op, tick, amt[, id]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InscriptionPayload {
    pub p: String,
    pub op: String,
    pub tick: String,
    pub amt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl InscriptionPayload {
    /// Transfer payload. `token_id` is only carried for orc protocols.
    pub fn transfer(protocol: InscribeProtocol, tick: &str, amount: &str, token_id: Option<&str>) -> Self {
        Self {
            p: protocol.as_str().to_string(),
            op: protocol.transfer_op().to_string(),
            tick: tick.to_string(),
            amt: amount.to_string(),
            id: match protocol {
                InscribeProtocol::Brc20 => None,
                InscribeProtocol::Orc20 | InscribeProtocol::OrcCash => token_id.map(str::to_string),
            },
        }
    }

    /// Single-entry content list as the service expects it
    pub fn content_list(&self) -> WalletResult<Vec<String>> {
        Ok(vec![serde_json::to_string(self)?])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeBreakdown {
    pub miner_fee: u64,
    pub service_fee: u64,
    pub origin_service_fee: u64,
    pub output_value: u64,
    /// Miner + service + output value, before rounding
    pub raw_total: u64,
    pub total_fee: u64,
}

/// Fails when the fee does not fit in a u64 of sats.
pub fn calculate_fees(byte_size: u64, fee_rate: f64, is_og: bool, fees: &ServiceFees) -> WalletResult<FeeBreakdown> {
    let miner = (byte_size as f64 * fee_rate * MINER_FEE_MARGIN).floor();
    // u64::MAX as f64 rounds up to 2^64
    if !miner.is_finite() || miner < 0.0 || miner >= u64::MAX as f64 {
        return Err(WalletError::InvalidInscription(format!("miner fee out of range: {} bytes at {} sat/vB", byte_size, fee_rate)));
    }
    let miner_fee = miner as u64;
    let service_fee = fees.for_discount(is_og);
    let raw_total = miner_fee
        .checked_add(service_fee)
        .and_then(|total| total.checked_add(INSCRIPTION_OUTPUT_VALUE))
        .ok_or_else(|| WalletError::InvalidInscription(format!("total fee overflows, miner fee {}", miner_fee)))?;
    Ok(FeeBreakdown {
        miner_fee,
        service_fee,
        origin_service_fee: service_fee,
        output_value: INSCRIPTION_OUTPUT_VALUE,
        raw_total,
        total_fee: raw_total / TOTAL_FEE_STEP * TOTAL_FEE_STEP,
    })
}

/// Transfer inscription to order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    /// Receives the inscription
    pub address: String,
    pub tick: String,
    pub amount: String,
    /// sat/vB
    pub fee_rate: f64,
    pub protocol: InscribeProtocol,
    pub token_id: Option<String>,
}

impl OrderRequest {
    pub fn new(protocol: InscribeProtocol, address: impl Into<String>, tick: impl Into<String>, amount: impl Into<String>, fee_rate: f64) -> Self {
        Self { address: address.into(), tick: tick.into(), amount: amount.into(), fee_rate, protocol, token_id: None }
    }

    pub fn with_token_id(mut self, token_id: impl Into<String>) -> Self { self.token_id = Some(token_id.into()); self }

    fn validate(&self) -> WalletResult<()> {
        if self.address.trim().is_empty() {
            return Err(WalletError::InvalidInscription("empty receive address".into()));
        }
        if self.tick.trim().is_empty() {
            return Err(WalletError::InvalidInscription("empty tick".into()));
        }
        if self.amount.trim().is_empty() {
            return Err(WalletError::InvalidInscription("empty amount".into()));
        }
        if !self.fee_rate.is_finite() || self.fee_rate <= 0.0 {
            return Err(WalletError::InvalidInscription(format!("fee rate {}", self.fee_rate)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InscribeOrder {
    pub order_id: String,
    pub pay_address: String,
    pub total_fee: u64,
    pub miner_fee: u64,
    pub service_fee: u64,
    pub origin_service_fee: u64,
    pub output_value: u64,
}

/// Price and place a transfer inscription order.
pub async fn create_order(api: &dyn InscribeApi, fees: &ServiceFees, request: &OrderRequest) -> WalletResult<InscribeOrder> {
    request.validate()?;
    let payload = InscriptionPayload::transfer(request.protocol, &request.tick, &request.amount, request.token_id.as_deref());
    let content_list = payload.content_list()?;

    let byte_size = api.data_size(&content_list).await?;
    let is_og = api.discount_eligible(&request.address).await?;
    let breakdown = calculate_fees(byte_size, request.fee_rate, is_og, fees)?;

    let receipt = api
        .submit_order(&OrderSubmission {
            receive_address: request.address.clone(),
            fee_rate: request.fee_rate,
            content_list,
            sats_in_inscription: INSCRIPTION_OUTPUT_VALUE,
            total_amount: breakdown.total_fee.to_string(),
        })
        .await?;

    info!(
        order = %receipt.order_id,
        protocol = %request.protocol,
        total_fee = breakdown.total_fee,
        og = is_og,
        "inscription order created"
    );
    Ok(InscribeOrder {
        order_id: receipt.order_id,
        pay_address: receipt.pay_address,
        total_fee: breakdown.total_fee,
        miner_fee: breakdown.miner_fee,
        service_fee: breakdown.service_fee,
        origin_service_fee: breakdown.origin_service_fee,
        output_value: breakdown.output_value,
    })
}
