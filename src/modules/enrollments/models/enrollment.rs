use crate::core::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Enrollment lifecycle status
///
/// `Pending -> Confirmed -> Completed`, with `Cancelled` reachable only from
/// `Pending` while the enrollment is unpaid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EnrollmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrollmentStatus::Pending => write!(f, "PENDING"),
            EnrollmentStatus::Confirmed => write!(f, "CONFIRMED"),
            EnrollmentStatus::Completed => write!(f, "COMPLETED"),
            EnrollmentStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl FromStr for EnrollmentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(EnrollmentStatus::Pending),
            "CONFIRMED" => Ok(EnrollmentStatus::Confirmed),
            "COMPLETED" => Ok(EnrollmentStatus::Completed),
            "CANCELLED" => Ok(EnrollmentStatus::Cancelled),
            _ => Err(format!("Invalid enrollment status: {}", s)),
        }
    }
}

/// Payment status of an enrollment. One-way: `Unpaid -> Paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EnrollmentPaymentStatus {
    Unpaid,
    Paid,
}

impl fmt::Display for EnrollmentPaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrollmentPaymentStatus::Unpaid => write!(f, "UNPAID"),
            EnrollmentPaymentStatus::Paid => write!(f, "PAID"),
        }
    }
}

impl FromStr for EnrollmentPaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "UNPAID" => Ok(EnrollmentPaymentStatus::Unpaid),
            "PAID" => Ok(EnrollmentPaymentStatus::Paid),
            _ => Err(format!("Invalid enrollment payment status: {}", s)),
        }
    }
}

/// A user's registration for a training offering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: String,
    pub user_id: String,
    pub training_id: String,
    /// Title of the training, used as the payment description
    pub training_title: String,
    /// Price in minor currency units
    pub amount: i64,
    pub status: EnrollmentStatus,
    pub payment_status: EnrollmentPaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Enrollment {
    /// Create a fresh, unpaid enrollment
    pub fn new(
        user_id: impl Into<String>,
        training_id: impl Into<String>,
        training_title: impl Into<String>,
        amount: i64,
    ) -> Result<Self> {
        if amount <= 0 {
            return Err(AppError::validation("Enrollment amount must be positive"));
        }

        let now = Utc::now();
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            training_id: training_id.into(),
            training_title: training_title.into(),
            amount,
            status: EnrollmentStatus::Pending,
            payment_status: EnrollmentPaymentStatus::Unpaid,
            paid_at: None,
            cancelled_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == EnrollmentPaymentStatus::Paid
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == EnrollmentStatus::Cancelled
    }

    /// Reject payment initiation for enrollments that cannot take a payment
    pub fn ensure_payable(&self) -> Result<()> {
        if self.is_paid() {
            return Err(AppError::business_rule(format!(
                "Enrollment '{}' is already paid",
                self.id
            )));
        }
        if self.is_cancelled() {
            return Err(AppError::business_rule(format!(
                "Enrollment '{}' is cancelled",
                self.id
            )));
        }
        Ok(())
    }

    /// Confirm the enrollment after a completed payment
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_payable()?;
        if self.status != EnrollmentStatus::Pending {
            return Err(AppError::business_rule(format!(
                "Enrollment '{}' cannot be confirmed from status {}",
                self.id, self.status
            )));
        }

        self.payment_status = EnrollmentPaymentStatus::Paid;
        self.status = EnrollmentStatus::Confirmed;
        self.paid_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Cancel an unpaid, pending enrollment
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.is_paid() {
            return Err(AppError::business_rule(format!(
                "Enrollment '{}' is already paid and cannot be cancelled",
                self.id
            )));
        }
        if self.is_cancelled() {
            return Err(AppError::business_rule(format!(
                "Enrollment '{}' is already cancelled",
                self.id
            )));
        }
        if self.status != EnrollmentStatus::Pending {
            return Err(AppError::business_rule(format!(
                "Enrollment '{}' cannot be cancelled from status {}",
                self.id, self.status
            )));
        }

        self.status = EnrollmentStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Mark a confirmed, paid enrollment as completed
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !self.is_paid() || self.status != EnrollmentStatus::Confirmed {
            return Err(AppError::business_rule(format!(
                "Enrollment '{}' must be confirmed and paid before completion (status {}, payment {})",
                self.id, self.status, self.payment_status
            )));
        }

        self.status = EnrollmentStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}
