use crate::core::{AppError, Currency, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Column width of `payments.failure_reason`, in characters
pub const MAX_FAILURE_REASON_CHARS: usize = 512;

/// Payment attempt status. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "PENDING"),
            PaymentStatus::Completed => write!(f, "COMPLETED"),
            PaymentStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "COMPLETED" => Ok(PaymentStatus::Completed),
            "FAILED" => Ok(PaymentStatus::Failed),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

/// Integration a payment attempt went through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentGatewayKind {
    CinetPay,
    /// Demo/test path, settled synchronously without any gateway call
    Simulator,
}

impl fmt::Display for PaymentGatewayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentGatewayKind::CinetPay => write!(f, "CINETPAY"),
            PaymentGatewayKind::Simulator => write!(f, "SIMULATOR"),
        }
    }
}

impl FromStr for PaymentGatewayKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "CINETPAY" => Ok(PaymentGatewayKind::CinetPay),
            "SIMULATOR" => Ok(PaymentGatewayKind::Simulator),
            _ => Err(format!("Invalid payment gateway: {}", s)),
        }
    }
}

/// One attempt to pay for an enrollment
///
/// `transaction_id` is unique and is the correlation key with the gateway.
/// `payment_data` keeps the last raw gateway payload for audit only; state
/// transitions never read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub transaction_id: String,
    pub enrollment_id: String,
    pub user_id: String,
    pub amount: i64,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub gateway: PaymentGatewayKind,
    pub payment_method: Option<String>,
    pub operator_id: Option<String>,
    pub payment_url: Option<String>,
    pub payment_token: Option<String>,
    pub payment_data: Option<serde_json::Value>,
    pub failure_reason: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

/// Request metadata captured at initiation time
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Payment {
    /// Create a new pending payment attempt
    pub fn new(
        transaction_id: String,
        enrollment_id: String,
        user_id: String,
        amount: i64,
        currency: Currency,
        gateway: PaymentGatewayKind,
        client: ClientContext,
    ) -> Result<Self> {
        if transaction_id.trim().is_empty() {
            return Err(AppError::validation("Transaction ID cannot be empty"));
        }
        if enrollment_id.trim().is_empty() {
            return Err(AppError::validation("Enrollment ID cannot be empty"));
        }
        currency.validate_amount(amount).map_err(AppError::Validation)?;

        let now = Utc::now();
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            transaction_id,
            enrollment_id,
            user_id,
            amount,
            currency,
            status: PaymentStatus::Pending,
            gateway,
            payment_method: None,
            operator_id: None,
            payment_url: None,
            payment_token: None,
            payment_data: None,
            failure_reason: None,
            ip_address: client.ip_address,
            user_agent: client.user_agent,
            created_at: now,
            updated_at: now,
            completed_at: None,
            failed_at: None,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_simulated(&self) -> bool {
        self.gateway == PaymentGatewayKind::Simulator
    }

    fn ensure_pending(&self) -> Result<()> {
        if self.is_terminal() {
            return Err(AppError::business_rule(format!(
                "Payment '{}' is already {}",
                self.transaction_id, self.status
            )));
        }
        Ok(())
    }

    /// PENDING -> COMPLETED
    pub fn complete(
        &mut self,
        payment_method: Option<String>,
        operator_id: Option<String>,
        payment_data: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_pending()?;
        self.status = PaymentStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
        if payment_method.is_some() {
            self.payment_method = payment_method;
        }
        if operator_id.is_some() {
            self.operator_id = operator_id;
        }
        if payment_data.is_some() {
            self.payment_data = payment_data;
        }
        Ok(())
    }

    /// PENDING -> FAILED
    pub fn fail(
        &mut self,
        reason: impl Into<String>,
        payment_data: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_pending()?;
        self.status = PaymentStatus::Failed;
        self.failed_at = Some(now);
        self.updated_at = now;
        self.failure_reason = Some(truncate_reason(reason.into()));
        if payment_data.is_some() {
            self.payment_data = payment_data;
        }
        Ok(())
    }
}

/// Gateway and transport error text is unbounded; keep what fits the column.
fn truncate_reason(mut reason: String) -> String {
    if let Some((cut, _)) = reason.char_indices().nth(MAX_FAILURE_REASON_CHARS) {
        reason.truncate(cut);
    }
    reason
}
