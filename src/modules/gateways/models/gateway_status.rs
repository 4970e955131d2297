use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction status as reported by the gateway
///
/// Parsing never fails: values this service does not know are kept in
/// `Unknown` and handled as pending, never as success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayTransactionStatus {
    Accepted,
    Refused,
    /// Customer abandoned or cancelled the checkout
    Cancelled,
    /// Waiting for the customer to pay or confirm (OTP, USSD push, ...)
    WaitingForCustomer,
    Unknown(String),
}

/// The three categories the reconciler acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CanonicalStatus {
    /// Maps to a completed payment
    Accepted,
    /// Maps to a failed payment
    Refused,
    /// No transition
    Pending,
}

impl GatewayTransactionStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "ACCEPTED" => Self::Accepted,
            "REFUSED" => Self::Refused,
            "CANCELED" | "CANCELLED" => Self::Cancelled,
            "PENDING"
            | "WAITING_FOR_CUSTOMER"
            | "WAITING_CUSTOMER_PAYMENT"
            | "WAITING_CUSTOMER_TO_VALIDATE"
            | "WAITING_CUSTOMER_OTP_CODE" => Self::WaitingForCustomer,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    pub fn canonical(&self) -> CanonicalStatus {
        match self {
            Self::Accepted => CanonicalStatus::Accepted,
            Self::Refused | Self::Cancelled => CanonicalStatus::Refused,
            Self::WaitingForCustomer | Self::Unknown(_) => CanonicalStatus::Pending,
        }
    }
}

impl fmt::Display for GatewayTransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "ACCEPTED"),
            Self::Refused => write!(f, "REFUSED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::WaitingForCustomer => write!(f, "WAITING_FOR_CUSTOMER"),
            Self::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalStatus::Accepted => write!(f, "ACCEPTED"),
            CanonicalStatus::Refused => write!(f, "REFUSED"),
            CanonicalStatus::Pending => write!(f, "PENDING"),
        }
    }
}
