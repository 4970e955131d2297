use super::super::models::{Customer, Payment, Transition, TransitionOutcome};
use crate::core::Result;
use crate::modules::enrollments::models::Enrollment;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Enrollment mutations owned by the enrollment service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentChange {
    Cancel,
    Complete,
}

/// Transactional store for payments and the enrollment fields they drive
///
/// Every mutation that touches a status field is a single atomic
/// read-modify-write: implementations lock the affected rows, re-check the
/// current state, and write all records or none.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Connectivity probe for readiness checks
    async fn ping(&self) -> Result<()>;

    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<()>;

    async fn find_enrollment(&self, id: &str) -> Result<Option<Enrollment>>;

    /// Apply `change` to the enrollment if its current state allows it.
    ///
    /// Returns `NotFound` for an unknown id and `BusinessRule` when the
    /// lifecycle forbids the change.
    async fn update_enrollment(
        &self,
        id: &str,
        change: EnrollmentChange,
        now: DateTime<Utc>,
    ) -> Result<Enrollment>;

    async fn find_customer(&self, user_id: &str) -> Result<Option<Customer>>;

    /// Insert a new payment attempt. Fails if the transaction id exists.
    async fn insert_payment(&self, payment: &Payment) -> Result<()>;

    async fn find_payment(&self, transaction_id: &str) -> Result<Option<Payment>>;

    /// Payment attempts of an enrollment, newest first
    async fn list_payments_for_enrollment(&self, enrollment_id: &str) -> Result<Vec<Payment>>;

    /// Store the checkout session returned by the gateway on a pending payment
    async fn record_gateway_session(
        &self,
        transaction_id: &str,
        payment_url: &str,
        payment_token: &str,
        payment_data: Option<Value>,
    ) -> Result<()>;

    /// Atomically move a pending payment to a terminal state, confirming
    /// its enrollment in the same unit of work on completion.
    async fn apply_transition(
        &self,
        transaction_id: &str,
        transition: &Transition,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome>;
}
