use crate::core::{AppError, Currency};
use crate::modules::gateways::models::{GatewayTransactionStatus, WebhookPayload};
use crate::modules::payments::models::Customer;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Failures talking to the payment gateway
///
/// Kept apart from `AppError` so the gateway client stays independent of the
/// HTTP layer; services convert at the boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("{gateway} unreachable: {message}")]
    Unavailable { gateway: String, message: String },

    #[error("{gateway} rejected the request ({code}): {message}")]
    Rejected {
        gateway: String,
        code: String,
        message: String,
    },

    #[error("{gateway} returned an unreadable response: {message}")]
    InvalidResponse { gateway: String, message: String },
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::Gateway(err.to_string())
    }
}

/// Payment gateway operations used by the payment flow
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a hosted checkout session for a pending payment
    async fn initiate_payment(&self, request: PaymentRequest) -> GatewayResult<PaymentSession>;

    /// Ask the gateway for the authoritative state of a transaction
    async fn check_payment_status(&self, transaction_id: &str) -> GatewayResult<StatusReport>;

    /// Check the signature carried by an inbound notification
    fn verify_webhook_signature(&self, payload: &WebhookPayload) -> bool;

    /// Get gateway name
    fn name(&self) -> &str;

    /// Check if gateway supports a currency
    fn supports_currency(&self, currency: Currency) -> bool;
}

/// Checkout request sent to the gateway
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRequest {
    pub transaction_id: String,
    pub amount: i64,
    pub currency: Currency,
    pub description: String,
    pub customer: Customer,
    pub notify_url: String,
    pub return_url: String,
    /// Channel selector, e.g. `ALL` or `MOBILE_MONEY`
    pub channels: String,
    /// Opaque value echoed back on notifications
    pub metadata: Option<String>,
}

/// Hosted checkout session
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSession {
    pub payment_url: String,
    pub payment_token: String,
    pub raw: Value,
}

/// Result of a status query
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub status: GatewayTransactionStatus,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub payment_method: Option<String>,
    pub operator_id: Option<String>,
    pub payment_date: Option<String>,
    pub raw: Value,
}
