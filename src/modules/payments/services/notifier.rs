use crate::core::Result;
use crate::modules::enrollments::models::Enrollment;
use crate::modules::payments::models::Payment;
use async_trait::async_trait;
use tracing::info;

/// Downstream hook invoked after an enrollment is confirmed
///
/// Called outside the store transaction. Errors are logged by the caller and
/// never undo the payment.
#[async_trait]
pub trait PaymentNotifier: Send + Sync {
    async fn payment_confirmed(&self, payment: &Payment, enrollment: &Enrollment) -> Result<()>;
}

/// Emits a structured event that the mail relay tails
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl PaymentNotifier for LogNotifier {
    async fn payment_confirmed(&self, payment: &Payment, enrollment: &Enrollment) -> Result<()> {
        info!(
            notification = "payment_receipt",
            transaction_id = %payment.transaction_id,
            enrollment_id = %enrollment.id,
            user_id = %enrollment.user_id,
            training = %enrollment.training_title,
            amount = %payment.currency.format_amount(payment.amount),
            "Payment receipt queued"
        );
        Ok(())
    }
}
