use super::reconciler::{EnrollmentReconciler, GatewayOutcome, OutcomeSource, Reconciliation};
use crate::core::{AppError, Result};
use crate::modules::gateways::models::{GatewayTransactionStatus, WebhookPayload};
use crate::modules::gateways::services::PaymentGateway;
use std::sync::Arc;
use tracing::{info, warn};

/// Authenticates gateway callbacks and feeds them to the reconciler
#[derive(Clone)]
pub struct WebhookService {
    gateway: Arc<dyn PaymentGateway>,
    reconciler: EnrollmentReconciler,
}

impl WebhookService {
    pub fn new(gateway: Arc<dyn PaymentGateway>, reconciler: EnrollmentReconciler) -> Self {
        Self {
            gateway,
            reconciler,
        }
    }

    /// Process one delivery.
    ///
    /// Nothing is read from or written to the store before the signature
    /// has been checked. A callback without a status triggers a status pull.
    pub async fn handle(&self, payload: WebhookPayload, peer: &str) -> Result<Reconciliation> {
        let transaction_id = required(&payload.cpm_trans_id, "cpm_trans_id")?.to_string();
        required(&payload.cpm_amount, "cpm_amount")?;
        required(&payload.cpm_currency, "cpm_currency")?;
        required(&payload.signature, "signature")?;

        if !self.gateway.verify_webhook_signature(&payload) {
            warn!(
                security_event = true,
                transaction_id = %transaction_id,
                peer = %peer,
                "Webhook signature mismatch"
            );
            return Err(AppError::unauthorized("Invalid webhook signature"));
        }

        let outcome = match payload.cpm_trans_status.as_deref().filter(|s| !s.is_empty()) {
            Some(status) => {
                GatewayOutcome::from_webhook(&payload, GatewayTransactionStatus::parse(status))
            }
            None => {
                info!(
                    transaction_id = %transaction_id,
                    "Webhook carries no status, querying gateway"
                );
                let report = self.gateway.check_payment_status(&transaction_id).await?;
                GatewayOutcome::from_report(report, OutcomeSource::Webhook)
            }
        };

        self.reconciler.reconcile(&transaction_id, outcome).await
    }
}

fn required<'a>(field: &'a Option<String>, name: &str) -> Result<&'a str> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::validation(format!("{} is required", name)))
}
