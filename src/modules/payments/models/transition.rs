use super::payment::Payment;
use crate::core::Result;
use crate::modules::enrollments::models::Enrollment;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Failure reason recorded when the gateway accepted a payment for an
/// enrollment that already has a completed payment.
pub const REASON_ENROLLMENT_ALREADY_PAID: &str = "ENROLLMENT_ALREADY_PAID";
/// Failure reason recorded when the gateway accepted a payment for an
/// enrollment cancelled in the meantime.
pub const REASON_ENROLLMENT_CANCELLED: &str = "ENROLLMENT_CANCELLED";
/// Failure reason recorded when the accepted amount differs from the payment.
pub const REASON_AMOUNT_MISMATCH: &str = "AMOUNT_MISMATCH";

/// Terminal transition requested for a pending payment
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Complete {
        payment_method: Option<String>,
        operator_id: Option<String>,
        payment_data: Option<Value>,
    },
    Fail {
        reason: String,
        payment_data: Option<Value>,
    },
}

/// What the store did with a requested transition
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// The payment moved to a terminal state; `enrollment` is set when the
    /// enrollment was confirmed in the same unit of work.
    Applied {
        payment: Payment,
        enrollment: Option<Enrollment>,
    },
    /// The gateway accepted the payment but the enrollment could not take it;
    /// the payment was recorded as failed with `reason`.
    Superseded { payment: Payment, reason: String },
    /// The payment was already terminal; nothing changed.
    Replayed(Payment),
    /// No payment carries this transaction id.
    NotFound,
}

/// Records to persist for one transition, computed while the rows are locked
#[derive(Debug, Clone)]
pub struct TransitionPlan {
    pub payment: Payment,
    pub enrollment: Option<Enrollment>,
    pub superseded_reason: Option<String>,
}

impl TransitionPlan {
    pub fn into_outcome(self) -> TransitionOutcome {
        match self.superseded_reason {
            Some(reason) => TransitionOutcome::Superseded {
                payment: self.payment,
                reason,
            },
            None => TransitionOutcome::Applied {
                payment: self.payment,
                enrollment: self.enrollment,
            },
        }
    }
}

/// Compute the new payment/enrollment records for `transition`.
///
/// The caller must hold both rows locked and must already have handled a
/// terminal `payment` as a replay. `enrollment` is only consulted for
/// `Transition::Complete`; a refusal never touches the enrollment.
pub fn plan_transition(
    payment: &Payment,
    enrollment: Option<&Enrollment>,
    transition: &Transition,
    now: DateTime<Utc>,
) -> Result<TransitionPlan> {
    let mut next_payment = payment.clone();

    match transition {
        Transition::Fail {
            reason,
            payment_data,
        } => {
            next_payment.fail(reason.clone(), payment_data.clone(), now)?;
            Ok(TransitionPlan {
                payment: next_payment,
                enrollment: None,
                superseded_reason: None,
            })
        }
        Transition::Complete {
            payment_method,
            operator_id,
            payment_data,
        } => {
            let enrollment = enrollment.ok_or_else(|| {
                crate::core::AppError::internal(format!(
                    "Enrollment '{}' of payment '{}' is missing",
                    payment.enrollment_id, payment.transaction_id
                ))
            })?;

            let blocked = if enrollment.is_paid() {
                Some(REASON_ENROLLMENT_ALREADY_PAID)
            } else if enrollment.is_cancelled() {
                Some(REASON_ENROLLMENT_CANCELLED)
            } else {
                None
            };

            if let Some(reason) = blocked {
                next_payment.payment_method = payment_method.clone().or(next_payment.payment_method);
                next_payment.operator_id = operator_id.clone().or(next_payment.operator_id);
                next_payment.fail(reason, payment_data.clone(), now)?;
                return Ok(TransitionPlan {
                    payment: next_payment,
                    enrollment: None,
                    superseded_reason: Some(reason.to_string()),
                });
            }

            let mut next_enrollment = enrollment.clone();
            next_enrollment.mark_paid(now)?;
            next_payment.complete(
                payment_method.clone(),
                operator_id.clone(),
                payment_data.clone(),
                now,
            )?;

            Ok(TransitionPlan {
                payment: next_payment,
                enrollment: Some(next_enrollment),
                superseded_reason: None,
            })
        }
    }
}
