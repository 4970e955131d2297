use super::reconciler::{EnrollmentReconciler, GatewayOutcome, OutcomeSource, Reconciliation};
use crate::config::PaymentsConfig;
use crate::core::{AppError, Result};
use crate::middleware::Caller;
use crate::modules::gateways::models::CanonicalStatus;
use crate::modules::gateways::services::{PaymentGateway, PaymentRequest};
use crate::modules::payments::models::transaction_id::is_well_formed;
use crate::modules::payments::models::{
    generate_transaction_id, ClientContext, Customer, Payment, PaymentGatewayKind,
};
use crate::modules::payments::repositories::PaymentStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Initiation request after HTTP decoding
#[derive(Debug, Clone, Default)]
pub struct InitiatePayment {
    pub enrollment_id: String,
    /// Overrides the phone number on file for mobile money prompts
    pub phone: Option<String>,
    pub is_simulation: bool,
}

#[derive(Debug, Clone)]
pub struct InitiatedPayment {
    pub payment: Payment,
    pub payment_url: Option<String>,
    pub is_simulation: bool,
}

#[derive(Debug, Clone)]
pub struct VerifiedPayment {
    pub payment: Payment,
    /// Set when the gateway was consulted
    pub gateway_status: Option<CanonicalStatus>,
}

/// Payment initiation and pull-based verification
#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    reconciler: EnrollmentReconciler,
    settings: PaymentsConfig,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        reconciler: EnrollmentReconciler,
        settings: PaymentsConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            reconciler,
            settings,
        }
    }

    /// Open a payment attempt for an enrollment.
    ///
    /// The pending payment is stored before the gateway is called, so a fast
    /// notification always finds its transaction.
    pub async fn initiate(
        &self,
        caller: &Caller,
        request: InitiatePayment,
        client: ClientContext,
    ) -> Result<InitiatedPayment> {
        let enrollment_id = request.enrollment_id.trim();
        if enrollment_id.is_empty() {
            return Err(AppError::validation("enrollmentId is required"));
        }
        let phone = request.phone.as_deref().map(normalize_phone).transpose()?;

        let enrollment = self
            .store
            .find_enrollment(enrollment_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Enrollment '{}' not found", enrollment_id)))?;
        caller.ensure_can_access(&enrollment.user_id)?;
        enrollment.ensure_payable()?;

        if request.is_simulation && !self.settings.simulation_enabled {
            return Err(AppError::forbidden("Payment simulation is disabled"));
        }

        let currency = self.settings.currency;
        currency
            .validate_amount(enrollment.amount)
            .map_err(AppError::Validation)?;
        if !request.is_simulation && !self.gateway.supports_currency(currency) {
            return Err(AppError::validation(format!(
                "{} does not support {}",
                self.gateway.name(),
                currency
            )));
        }

        let gateway_kind = if request.is_simulation {
            PaymentGatewayKind::Simulator
        } else {
            PaymentGatewayKind::CinetPay
        };
        let mut payment = Payment::new(
            generate_transaction_id(),
            enrollment.id.clone(),
            enrollment.user_id.clone(),
            enrollment.amount,
            currency,
            gateway_kind,
            client,
        )?;
        self.store.insert_payment(&payment).await?;

        info!(
            transaction_id = %payment.transaction_id,
            enrollment_id = %enrollment.id,
            amount = payment.amount,
            gateway = %payment.gateway,
            "Payment initiated"
        );

        if request.is_simulation {
            return self.settle_simulation(&payment.transaction_id).await;
        }

        let mut customer = self
            .store
            .find_customer(&enrollment.user_id)
            .await?
            .unwrap_or_else(|| Customer::anonymous(&enrollment.user_id));
        if phone.is_some() {
            customer.phone_number = phone;
        }

        let gateway_request = PaymentRequest {
            transaction_id: payment.transaction_id.clone(),
            amount: payment.amount,
            currency,
            description: format!("Inscription {}", enrollment.training_title),
            customer,
            notify_url: self.settings.notify_url.clone(),
            return_url: self.settings.return_url.clone(),
            channels: self.settings.channels.clone(),
            metadata: Some(enrollment.id.clone()),
        };

        match self.gateway.initiate_payment(gateway_request).await {
            Ok(session) => {
                self.store
                    .record_gateway_session(
                        &payment.transaction_id,
                        &session.payment_url,
                        &session.payment_token,
                        Some(session.raw),
                    )
                    .await?;
                payment.payment_url = Some(session.payment_url.clone());
                payment.payment_token = Some(session.payment_token);

                Ok(InitiatedPayment {
                    payment,
                    payment_url: Some(session.payment_url),
                    is_simulation: false,
                })
            }
            Err(err) => {
                warn!(
                    transaction_id = %payment.transaction_id,
                    gateway = %self.gateway.name(),
                    error = %err,
                    "Gateway rejected payment initiation"
                );
                self.reconciler
                    .reconcile(
                        &payment.transaction_id,
                        GatewayOutcome::initiation_failed(&err),
                    )
                    .await?;
                Err(err.into())
            }
        }
    }

    async fn settle_simulation(&self, transaction_id: &str) -> Result<InitiatedPayment> {
        match self.reconciler.settle_simulated(transaction_id).await? {
            Reconciliation::Applied { payment, .. } => Ok(InitiatedPayment {
                payment,
                payment_url: None,
                is_simulation: true,
            }),
            Reconciliation::Superseded { reason, .. } => Err(AppError::business_rule(format!(
                "Simulated payment was not applied: {}",
                reason
            ))),
            _ => Err(AppError::internal(format!(
                "Simulated payment '{}' was not applied",
                transaction_id
            ))),
        }
    }

    /// Re-check a transaction with the gateway and reconcile the result.
    ///
    /// Terminal and simulated payments are answered from local state.
    pub async fn verify(&self, caller: &Caller, transaction_id: &str) -> Result<VerifiedPayment> {
        let transaction_id = transaction_id.trim();
        if !is_well_formed(transaction_id) {
            return Err(AppError::validation("Malformed transaction id"));
        }

        let payment = self
            .store
            .find_payment(transaction_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Transaction '{}' not found", transaction_id))
            })?;
        caller.ensure_can_access(&payment.user_id)?;

        if payment.is_terminal() || payment.is_simulated() {
            return Ok(VerifiedPayment {
                payment,
                gateway_status: None,
            });
        }

        let report = self
            .gateway
            .check_payment_status(transaction_id)
            .await
            .map_err(|err| {
                warn!(
                    transaction_id = %transaction_id,
                    error = %err,
                    "Gateway status check failed"
                );
                AppError::from(err)
            })?;
        let gateway_status = report.status.canonical();

        let reconciled = self
            .reconciler
            .reconcile(
                transaction_id,
                GatewayOutcome::from_report(report, OutcomeSource::Verification),
            )
            .await?;

        let payment = reconciled.payment().cloned().ok_or_else(|| {
            AppError::not_found(format!("Transaction '{}' not found", transaction_id))
        })?;
        Ok(VerifiedPayment {
            payment,
            gateway_status: Some(gateway_status),
        })
    }
}

/// Keep digits and a leading `+`; mobile money numbers are 8 to 15 digits
fn normalize_phone(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let (plus, digits) = match trimmed.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", trimmed),
    };
    let digits: String = digits
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.'))
        .collect();

    if digits.len() < 8 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::validation("phone must contain 8 to 15 digits"));
    }
    Ok(format!("{}{}", plus, digits))
}
