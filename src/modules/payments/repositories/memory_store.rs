use super::payment_store::{EnrollmentChange, PaymentStore};
use crate::core::{AppError, Result};
use crate::modules::enrollments::models::Enrollment;
use crate::modules::payments::models::{
    plan_transition, Customer, Payment, Transition, TransitionOutcome,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    enrollments: HashMap<String, Enrollment>,
    /// Keyed by transaction id
    payments: HashMap<String, Payment>,
    customers: HashMap<String, Customer>,
}

/// Process-local store used for demo mode and tests
///
/// One mutex guards all tables, so every operation is a single critical
/// section and multi-record updates are trivially all-or-nothing.
#[derive(Debug, Default)]
pub struct InMemoryPaymentStore {
    state: Mutex<MemoryState>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register payer details for a user
    pub fn insert_customer(&self, customer: Customer) -> Result<()> {
        let mut state = self.lock()?;
        state.customers.insert(customer.user_id.clone(), customer);
        Ok(())
    }

    /// Number of stored payments, for assertions
    pub fn payment_count(&self) -> Result<usize> {
        Ok(self.lock()?.payments.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| AppError::internal("In-memory store lock poisoned"))
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }

    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<()> {
        let mut state = self.lock()?;
        if state.enrollments.contains_key(&enrollment.id) {
            return Err(AppError::validation(format!(
                "Enrollment '{}' already exists",
                enrollment.id
            )));
        }
        state
            .enrollments
            .insert(enrollment.id.clone(), enrollment.clone());
        Ok(())
    }

    async fn find_enrollment(&self, id: &str) -> Result<Option<Enrollment>> {
        Ok(self.lock()?.enrollments.get(id).cloned())
    }

    async fn update_enrollment(
        &self,
        id: &str,
        change: EnrollmentChange,
        now: DateTime<Utc>,
    ) -> Result<Enrollment> {
        let mut state = self.lock()?;
        let enrollment = state
            .enrollments
            .get_mut(id)
            .ok_or_else(|| AppError::not_found(format!("Enrollment '{}' not found", id)))?;

        let mut next = enrollment.clone();
        match change {
            EnrollmentChange::Cancel => next.cancel(now)?,
            EnrollmentChange::Complete => next.complete(now)?,
        }
        *enrollment = next.clone();
        Ok(next)
    }

    async fn find_customer(&self, user_id: &str) -> Result<Option<Customer>> {
        Ok(self.lock()?.customers.get(user_id).cloned())
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        let mut state = self.lock()?;
        if state.payments.contains_key(&payment.transaction_id) {
            return Err(AppError::internal(format!(
                "Duplicate transaction id '{}'",
                payment.transaction_id
            )));
        }
        if !state.enrollments.contains_key(&payment.enrollment_id) {
            return Err(AppError::not_found(format!(
                "Enrollment '{}' not found",
                payment.enrollment_id
            )));
        }
        state
            .payments
            .insert(payment.transaction_id.clone(), payment.clone());
        Ok(())
    }

    async fn find_payment(&self, transaction_id: &str) -> Result<Option<Payment>> {
        Ok(self.lock()?.payments.get(transaction_id).cloned())
    }

    async fn list_payments_for_enrollment(&self, enrollment_id: &str) -> Result<Vec<Payment>> {
        let state = self.lock()?;
        let mut payments: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| p.enrollment_id == enrollment_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    async fn record_gateway_session(
        &self,
        transaction_id: &str,
        payment_url: &str,
        payment_token: &str,
        payment_data: Option<Value>,
    ) -> Result<()> {
        let mut state = self.lock()?;
        let payment = state.payments.get_mut(transaction_id).ok_or_else(|| {
            AppError::not_found(format!("Payment '{}' not found", transaction_id))
        })?;

        if payment.is_terminal() {
            return Ok(());
        }
        payment.payment_url = Some(payment_url.to_string());
        payment.payment_token = Some(payment_token.to_string());
        if payment_data.is_some() {
            payment.payment_data = payment_data;
        }
        payment.updated_at = Utc::now();
        Ok(())
    }

    async fn apply_transition(
        &self,
        transaction_id: &str,
        transition: &Transition,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let mut state = self.lock()?;

        let Some(payment) = state.payments.get(transaction_id) else {
            return Ok(TransitionOutcome::NotFound);
        };
        if payment.is_terminal() {
            return Ok(TransitionOutcome::Replayed(payment.clone()));
        }

        let enrollment = state.enrollments.get(&payment.enrollment_id);
        let plan = plan_transition(payment, enrollment, transition, now)?;

        // Both writes happen under the same guard after planning succeeded.
        state
            .payments
            .insert(plan.payment.transaction_id.clone(), plan.payment.clone());
        if let Some(enrollment) = &plan.enrollment {
            state
                .enrollments
                .insert(enrollment.id.clone(), enrollment.clone());
        }

        Ok(plan.into_outcome())
    }
}
