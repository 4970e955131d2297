use crate::core::{AppError, Result};
use crate::middleware::Caller;
use crate::modules::enrollments::models::Enrollment;
use crate::modules::payments::models::Payment;
use crate::modules::payments::repositories::{EnrollmentChange, PaymentStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Enrollment lifecycle actions outside the payment flow
#[derive(Clone)]
pub struct EnrollmentService {
    store: Arc<dyn PaymentStore>,
}

impl EnrollmentService {
    pub fn new(store: Arc<dyn PaymentStore>) -> Self {
        Self { store }
    }

    async fn load(&self, id: &str) -> Result<Enrollment> {
        self.store
            .find_enrollment(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Enrollment '{}' not found", id)))
    }

    pub async fn get(&self, caller: &Caller, id: &str) -> Result<Enrollment> {
        let enrollment = self.load(id).await?;
        caller.ensure_can_access(&enrollment.user_id)?;
        Ok(enrollment)
    }

    /// Cancel an unpaid enrollment (owner or admin)
    pub async fn cancel(&self, caller: &Caller, id: &str) -> Result<Enrollment> {
        self.get(caller, id).await?;
        let enrollment = self
            .store
            .update_enrollment(id, EnrollmentChange::Cancel, Utc::now())
            .await?;
        info!(enrollment_id = %id, by = %caller.user_id, "Enrollment cancelled");
        Ok(enrollment)
    }

    /// Mark a confirmed enrollment as completed (admin only)
    pub async fn complete(&self, caller: &Caller, id: &str) -> Result<Enrollment> {
        caller.ensure_admin()?;
        let enrollment = self
            .store
            .update_enrollment(id, EnrollmentChange::Complete, Utc::now())
            .await?;
        info!(enrollment_id = %id, by = %caller.user_id, "Enrollment completed");
        Ok(enrollment)
    }

    /// Payment attempts of an enrollment, newest first
    pub async fn payments(&self, caller: &Caller, id: &str) -> Result<Vec<Payment>> {
        self.get(caller, id).await?;
        self.store.list_payments_for_enrollment(id).await
    }
}
