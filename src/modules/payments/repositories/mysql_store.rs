use super::payment_store::{EnrollmentChange, PaymentStore};
use crate::core::{AppError, Currency, Result};
use crate::modules::enrollments::models::{Enrollment, EnrollmentPaymentStatus, EnrollmentStatus};
use crate::modules::payments::models::{
    plan_transition, Customer, Payment, PaymentGatewayKind, PaymentStatus, Transition,
    TransitionOutcome,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, MySqlConnection, MySqlPool};
use std::str::FromStr;

const ENROLLMENT_COLUMNS: &str = r#"
    e.id, e.user_id, e.training_id, t.title AS training_title, e.amount,
    e.status, e.payment_status, e.paid_at, e.cancelled_at, e.completed_at,
    e.created_at, e.updated_at
"#;

const PAYMENT_COLUMNS: &str = r#"
    id, transaction_id, enrollment_id, user_id, amount, currency, status, gateway,
    payment_method, operator_id, payment_url, payment_token, payment_data,
    failure_reason, ip_address, user_agent, created_at, updated_at,
    completed_at, failed_at
"#;

#[derive(Debug, FromRow)]
struct EnrollmentRow {
    id: String,
    user_id: String,
    training_id: String,
    training_title: String,
    amount: i64,
    status: String,
    payment_status: String,
    paid_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EnrollmentRow> for Enrollment {
    type Error = AppError;

    fn try_from(row: EnrollmentRow) -> Result<Self> {
        Ok(Enrollment {
            id: row.id,
            user_id: row.user_id,
            training_id: row.training_id,
            training_title: row.training_title,
            amount: row.amount,
            status: EnrollmentStatus::from_str(&row.status).map_err(AppError::Internal)?,
            payment_status: EnrollmentPaymentStatus::from_str(&row.payment_status)
                .map_err(AppError::Internal)?,
            paid_at: row.paid_at,
            cancelled_at: row.cancelled_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: String,
    transaction_id: String,
    enrollment_id: String,
    user_id: String,
    amount: i64,
    currency: String,
    status: String,
    gateway: String,
    payment_method: Option<String>,
    operator_id: Option<String>,
    payment_url: Option<String>,
    payment_token: Option<String>,
    payment_data: Option<Json<Value>>,
    failure_reason: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    failed_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> Result<Self> {
        Ok(Payment {
            id: row.id,
            transaction_id: row.transaction_id,
            enrollment_id: row.enrollment_id,
            user_id: row.user_id,
            amount: row.amount,
            currency: Currency::from_str(&row.currency).map_err(AppError::Internal)?,
            status: PaymentStatus::from_str(&row.status).map_err(AppError::Internal)?,
            gateway: PaymentGatewayKind::from_str(&row.gateway).map_err(AppError::Internal)?,
            payment_method: row.payment_method,
            operator_id: row.operator_id,
            payment_url: row.payment_url,
            payment_token: row.payment_token,
            payment_data: row.payment_data.map(|json| json.0),
            failure_reason: row.failure_reason,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
            failed_at: row.failed_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct CustomerRow {
    id: String,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    city: Option<String>,
    country: Option<String>,
    zip_code: Option<String>,
}

/// MySQL-backed payment store
///
/// Transitions run in one database transaction: the payment row and its
/// enrollment are locked with `SELECT ... FOR UPDATE`, the terminal check is
/// repeated under the lock, and the payment update is additionally guarded by
/// `WHERE status = 'PENDING'` so a racing writer can never overwrite a
/// terminal state.
#[derive(Clone)]
pub struct MySqlPaymentStore {
    pool: MySqlPool,
}

impl MySqlPaymentStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn lock_enrollment(conn: &mut MySqlConnection, id: &str) -> Result<Option<Enrollment>> {
        let sql = format!(
            "SELECT {} FROM enrollments e JOIN trainings t ON t.id = e.training_id WHERE e.id = ? FOR UPDATE OF e",
            ENROLLMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, EnrollmentRow>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        row.map(Enrollment::try_from).transpose()
    }

    async fn lock_payment(conn: &mut MySqlConnection, transaction_id: &str) -> Result<Option<Payment>> {
        let sql = format!(
            "SELECT {} FROM payments WHERE transaction_id = ? FOR UPDATE",
            PAYMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(transaction_id)
            .fetch_optional(conn)
            .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn write_enrollment_status(conn: &mut MySqlConnection, enrollment: &Enrollment) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE enrollments
            SET status = ?, payment_status = ?, paid_at = ?, cancelled_at = ?,
                completed_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(enrollment.status.to_string())
        .bind(enrollment.payment_status.to_string())
        .bind(enrollment.paid_at)
        .bind(enrollment.cancelled_at)
        .bind(enrollment.completed_at)
        .bind(enrollment.updated_at)
        .bind(&enrollment.id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    async fn write_terminal_payment(conn: &mut MySqlConnection, payment: &Payment) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?, payment_method = ?, operator_id = ?, payment_data = ?,
                failure_reason = ?, completed_at = ?, failed_at = ?, updated_at = ?
            WHERE transaction_id = ? AND status = 'PENDING'
            "#,
        )
        .bind(payment.status.to_string())
        .bind(&payment.payment_method)
        .bind(&payment.operator_id)
        .bind(payment.payment_data.as_ref().map(Json))
        .bind(&payment.failure_reason)
        .bind(payment.completed_at)
        .bind(payment.failed_at)
        .bind(payment.updated_at)
        .bind(&payment.transaction_id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl PaymentStore for MySqlPaymentStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO enrollments (
                id, user_id, training_id, amount, status, payment_status,
                paid_at, cancelled_at, completed_at, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&enrollment.id)
        .bind(&enrollment.user_id)
        .bind(&enrollment.training_id)
        .bind(enrollment.amount)
        .bind(enrollment.status.to_string())
        .bind(enrollment.payment_status.to_string())
        .bind(enrollment.paid_at)
        .bind(enrollment.cancelled_at)
        .bind(enrollment.completed_at)
        .bind(enrollment.created_at)
        .bind(enrollment.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_enrollment(&self, id: &str) -> Result<Option<Enrollment>> {
        let sql = format!(
            "SELECT {} FROM enrollments e JOIN trainings t ON t.id = e.training_id WHERE e.id = ?",
            ENROLLMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, EnrollmentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Enrollment::try_from).transpose()
    }

    async fn update_enrollment(
        &self,
        id: &str,
        change: EnrollmentChange,
        now: DateTime<Utc>,
    ) -> Result<Enrollment> {
        let mut tx = self.pool.begin().await?;

        let mut enrollment = Self::lock_enrollment(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Enrollment '{}' not found", id)))?;

        match change {
            EnrollmentChange::Cancel => enrollment.cancel(now)?,
            EnrollmentChange::Complete => enrollment.complete(now)?,
        }

        Self::write_enrollment_status(&mut *tx, &enrollment).await?;
        tx.commit().await?;

        Ok(enrollment)
    }

    async fn find_customer(&self, user_id: &str) -> Result<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT id, first_name, last_name, email, phone, address, city, country, zip_code
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Customer {
            user_id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone_number: row.phone,
            address: row.address,
            city: row.city,
            country: row.country,
            zip_code: row.zip_code,
        }))
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, transaction_id, enrollment_id, user_id, amount, currency,
                status, gateway, payment_method, operator_id, payment_url,
                payment_token, payment_data, failure_reason, ip_address,
                user_agent, created_at, updated_at, completed_at, failed_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.transaction_id)
        .bind(&payment.enrollment_id)
        .bind(&payment.user_id)
        .bind(payment.amount)
        .bind(payment.currency.to_string())
        .bind(payment.status.to_string())
        .bind(payment.gateway.to_string())
        .bind(&payment.payment_method)
        .bind(&payment.operator_id)
        .bind(&payment.payment_url)
        .bind(&payment.payment_token)
        .bind(payment.payment_data.as_ref().map(Json))
        .bind(&payment.failure_reason)
        .bind(&payment.ip_address)
        .bind(&payment.user_agent)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .bind(payment.completed_at)
        .bind(payment.failed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_payment(&self, transaction_id: &str) -> Result<Option<Payment>> {
        let sql = format!(
            "SELECT {} FROM payments WHERE transaction_id = ?",
            PAYMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn list_payments_for_enrollment(&self, enrollment_id: &str) -> Result<Vec<Payment>> {
        let sql = format!(
            "SELECT {} FROM payments WHERE enrollment_id = ? ORDER BY created_at DESC",
            PAYMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(enrollment_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn record_gateway_session(
        &self,
        transaction_id: &str,
        payment_url: &str,
        payment_token: &str,
        payment_data: Option<Value>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE payments
            SET payment_url = ?, payment_token = ?,
                payment_data = COALESCE(?, payment_data), updated_at = ?
            WHERE transaction_id = ? AND status = 'PENDING'
            "#,
        )
        .bind(payment_url)
        .bind(payment_token)
        .bind(payment_data.map(Json))
        .bind(Utc::now())
        .bind(transaction_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn apply_transition(
        &self,
        transaction_id: &str,
        transition: &Transition,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let mut tx = self.pool.begin().await?;

        let Some(payment) = Self::lock_payment(&mut *tx, transaction_id).await? else {
            tx.rollback().await?;
            return Ok(TransitionOutcome::NotFound);
        };
        if payment.is_terminal() {
            tx.rollback().await?;
            return Ok(TransitionOutcome::Replayed(payment));
        }

        let enrollment = match transition {
            Transition::Complete { .. } => {
                Self::lock_enrollment(&mut *tx, &payment.enrollment_id).await?
            }
            Transition::Fail { .. } => None,
        };

        let plan = plan_transition(&payment, enrollment.as_ref(), transition, now)?;

        if Self::write_terminal_payment(&mut *tx, &plan.payment).await? == 0 {
            // Lost a race despite the row lock; report the winner's state.
            tx.rollback().await?;
            return match self.find_payment(transaction_id).await? {
                Some(current) => Ok(TransitionOutcome::Replayed(current)),
                None => Ok(TransitionOutcome::NotFound),
            };
        }

        if let Some(enrollment) = &plan.enrollment {
            Self::write_enrollment_status(&mut *tx, enrollment).await?;
        }

        tx.commit().await?;
        Ok(plan.into_outcome())
    }
}
