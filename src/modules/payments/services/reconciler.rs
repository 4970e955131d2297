use super::notifier::PaymentNotifier;
use crate::core::Result;
use crate::modules::enrollments::models::Enrollment;
use crate::modules::gateways::models::{CanonicalStatus, GatewayTransactionStatus, WebhookPayload};
use crate::modules::gateways::services::{GatewayError, StatusReport};
use crate::modules::payments::models::transition::REASON_AMOUNT_MISMATCH;
use crate::modules::payments::models::{Payment, Transition, TransitionOutcome};
use crate::modules::payments::repositories::PaymentStore;
use chrono::Utc;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Where a gateway outcome came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeSource {
    Webhook,
    Verification,
    Initiation,
    Simulation,
}

impl fmt::Display for OutcomeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeSource::Webhook => write!(f, "webhook"),
            OutcomeSource::Verification => write!(f, "verification"),
            OutcomeSource::Initiation => write!(f, "initiation"),
            OutcomeSource::Simulation => write!(f, "simulation"),
        }
    }
}

/// Gateway verdict on one transaction, stripped of gateway payload shapes
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayOutcome {
    pub status: GatewayTransactionStatus,
    pub source: OutcomeSource,
    /// Amount the gateway reports as paid, when it reports one
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub payment_method: Option<String>,
    pub operator_id: Option<String>,
    /// Reason recorded on refusal; defaults to the gateway status
    pub failure_reason: Option<String>,
    /// Audit snapshot, never read for decisions
    pub payment_data: Option<Value>,
}

impl GatewayOutcome {
    pub fn from_webhook(payload: &WebhookPayload, status: GatewayTransactionStatus) -> Self {
        Self {
            status,
            source: OutcomeSource::Webhook,
            amount: payload.amount(),
            currency: payload.cpm_currency.clone(),
            payment_method: payload.payment_method.clone().filter(|m| !m.is_empty()),
            operator_id: payload.operator_id.clone().filter(|o| !o.is_empty()),
            failure_reason: payload.cpm_error_message.clone().filter(|m| !m.is_empty()),
            payment_data: Some(payload.audit_snapshot()),
        }
    }

    pub fn from_report(report: StatusReport, source: OutcomeSource) -> Self {
        Self {
            status: report.status,
            source,
            amount: report.amount,
            currency: report.currency,
            payment_method: report.payment_method,
            operator_id: report.operator_id,
            failure_reason: None,
            payment_data: Some(report.raw),
        }
    }

    /// Acceptance produced locally in simulation mode
    pub fn simulated() -> Self {
        Self {
            status: GatewayTransactionStatus::Accepted,
            source: OutcomeSource::Simulation,
            amount: None,
            currency: None,
            payment_method: Some("SIMULATION".to_string()),
            operator_id: None,
            failure_reason: None,
            payment_data: Some(serde_json::json!({ "simulated": true })),
        }
    }

    /// Refusal recorded when the checkout could not be opened
    pub fn initiation_failed(err: &GatewayError) -> Self {
        Self {
            status: GatewayTransactionStatus::Refused,
            source: OutcomeSource::Initiation,
            amount: None,
            currency: None,
            payment_method: None,
            operator_id: None,
            failure_reason: Some(err.to_string()),
            payment_data: None,
        }
    }

    fn failure_reason(&self) -> String {
        self.failure_reason
            .clone()
            .unwrap_or_else(|| self.status.to_string())
    }
}

/// Result of reconciling one gateway outcome
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Payment moved to a terminal state
    Applied {
        payment: Payment,
        enrollment: Option<Enrollment>,
    },
    /// Accepted by the gateway but recorded as failed; needs a refund
    Superseded { payment: Payment, reason: String },
    /// Already terminal before this outcome
    Replayed(Payment),
    /// Gateway has no verdict yet
    StillPending(Payment),
    NotFound,
}

impl Reconciliation {
    pub fn payment(&self) -> Option<&Payment> {
        match self {
            Reconciliation::Applied { payment, .. }
            | Reconciliation::Superseded { payment, .. }
            | Reconciliation::Replayed(payment)
            | Reconciliation::StillPending(payment) => Some(payment),
            Reconciliation::NotFound => None,
        }
    }
}

/// Drives payment and enrollment records to agree with the gateway
///
/// Both the webhook and the verification path end up here, as does
/// simulation mode; every status change goes through
/// [`PaymentStore::apply_transition`].
#[derive(Clone)]
pub struct EnrollmentReconciler {
    store: Arc<dyn PaymentStore>,
    notifier: Arc<dyn PaymentNotifier>,
}

impl EnrollmentReconciler {
    pub fn new(store: Arc<dyn PaymentStore>, notifier: Arc<dyn PaymentNotifier>) -> Self {
        Self { store, notifier }
    }

    pub async fn reconcile(
        &self,
        transaction_id: &str,
        outcome: GatewayOutcome,
    ) -> Result<Reconciliation> {
        let canonical = outcome.status.canonical();

        let Some(payment) = self.store.find_payment(transaction_id).await? else {
            warn!(
                transaction_id = %transaction_id,
                source = %outcome.source,
                gateway_status = %outcome.status,
                "Gateway outcome for unknown transaction"
            );
            return Ok(Reconciliation::NotFound);
        };

        if payment.is_terminal() {
            info!(
                transaction_id = %transaction_id,
                source = %outcome.source,
                status = %payment.status,
                "Payment already terminal, replay ignored"
            );
            return Ok(Reconciliation::Replayed(payment));
        }

        let transition = match canonical {
            CanonicalStatus::Pending => {
                info!(
                    transaction_id = %transaction_id,
                    source = %outcome.source,
                    gateway_status = %outcome.status,
                    "Gateway reports payment still pending"
                );
                return Ok(Reconciliation::StillPending(payment));
            }
            CanonicalStatus::Refused => Transition::Fail {
                reason: outcome.failure_reason(),
                payment_data: outcome.payment_data,
            },
            CanonicalStatus::Accepted => match mismatch(&payment, &outcome) {
                Some(detail) => {
                    error!(
                        transaction_id = %transaction_id,
                        source = %outcome.source,
                        expected_amount = payment.amount,
                        expected_currency = %payment.currency,
                        reported_amount = ?outcome.amount,
                        reported_currency = ?outcome.currency,
                        "Accepted payment does not match the recorded {}",
                        detail
                    );
                    Transition::Fail {
                        reason: REASON_AMOUNT_MISMATCH.to_string(),
                        payment_data: outcome.payment_data,
                    }
                }
                None => Transition::Complete {
                    payment_method: outcome.payment_method,
                    operator_id: outcome.operator_id,
                    payment_data: outcome.payment_data,
                },
            },
        };

        let applied = self
            .store
            .apply_transition(transaction_id, &transition, Utc::now())
            .await?;

        Ok(match applied {
            TransitionOutcome::Applied {
                payment,
                enrollment,
            } => {
                info!(
                    transaction_id = %transaction_id,
                    enrollment_id = %payment.enrollment_id,
                    source = %outcome.source,
                    status = %payment.status,
                    "Payment transition applied"
                );
                if let Some(enrollment) = &enrollment {
                    self.notify(&payment, enrollment).await;
                }
                Reconciliation::Applied {
                    payment,
                    enrollment,
                }
            }
            TransitionOutcome::Superseded { payment, reason } => {
                warn!(
                    transaction_id = %transaction_id,
                    enrollment_id = %payment.enrollment_id,
                    reason = %reason,
                    refund_required = true,
                    "Accepted payment could not be applied to its enrollment"
                );
                Reconciliation::Superseded { payment, reason }
            }
            TransitionOutcome::Replayed(payment) => {
                info!(
                    transaction_id = %transaction_id,
                    status = %payment.status,
                    "Concurrent transition won, replay ignored"
                );
                Reconciliation::Replayed(payment)
            }
            TransitionOutcome::NotFound => Reconciliation::NotFound,
        })
    }

    /// Confirm a simulated payment through the regular acceptance path
    pub async fn settle_simulated(&self, transaction_id: &str) -> Result<Reconciliation> {
        self.reconcile(transaction_id, GatewayOutcome::simulated())
            .await
    }

    async fn notify(&self, payment: &Payment, enrollment: &Enrollment) {
        if let Err(e) = self.notifier.payment_confirmed(payment, enrollment).await {
            warn!(
                transaction_id = %payment.transaction_id,
                error = %e,
                "Payment notification failed"
            );
        }
    }
}

fn mismatch(payment: &Payment, outcome: &GatewayOutcome) -> Option<&'static str> {
    if let Some(amount) = outcome.amount {
        if amount != payment.amount {
            return Some("amount");
        }
    }
    if let Some(currency) = outcome.currency.as_deref() {
        if !currency.eq_ignore_ascii_case(&payment.currency.to_string()) {
            return Some("currency");
        }
    }
    None
}
