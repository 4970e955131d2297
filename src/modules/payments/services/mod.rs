pub mod notifier;
pub mod payment_service;
pub mod reconciler;
pub mod webhook_service;

pub use notifier::{LogNotifier, PaymentNotifier};
pub use payment_service::{InitiatePayment, InitiatedPayment, PaymentService, VerifiedPayment};
pub use reconciler::{EnrollmentReconciler, GatewayOutcome, OutcomeSource, Reconciliation};
pub use webhook_service::WebhookService;
