use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{error::AppError, Currency};
use crate::middleware::Caller;
use crate::modules::enrollments::services::EnrollmentService;
use crate::modules::payments::models::{Payment, PaymentGatewayKind, PaymentStatus};

/// Payment attempt as exposed to enrollment owners
///
/// Gateway tokens, raw payloads and client metadata stay internal.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummary {
    pub id: String,
    pub transaction_id: String,
    pub amount: i64,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub gateway: PaymentGatewayKind,
    pub payment_method: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl From<Payment> for PaymentSummary {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            transaction_id: p.transaction_id,
            amount: p.amount,
            currency: p.currency,
            status: p.status,
            gateway: p.gateway,
            payment_method: p.payment_method,
            failure_reason: p.failure_reason,
            created_at: p.created_at,
            completed_at: p.completed_at,
            failed_at: p.failed_at,
        }
    }
}

/// Cancel an unpaid enrollment
/// POST /enrollments/{id}/cancel
pub async fn cancel_enrollment(
    service: web::Data<Arc<EnrollmentService>>,
    caller: Caller,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let enrollment = service.cancel(&caller, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(enrollment))
}

/// Mark a confirmed enrollment as completed
/// POST /enrollments/{id}/complete
pub async fn complete_enrollment(
    service: web::Data<Arc<EnrollmentService>>,
    caller: Caller,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let enrollment = service.complete(&caller, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(enrollment))
}

/// List payment attempts, newest first
/// GET /enrollments/{id}/payments
pub async fn list_enrollment_payments(
    service: web::Data<Arc<EnrollmentService>>,
    caller: Caller,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let payments: Vec<PaymentSummary> = service
        .payments(&caller, &path.into_inner())
        .await?
        .into_iter()
        .map(PaymentSummary::from)
        .collect();
    Ok(HttpResponse::Ok().json(payments))
}

/// Configure enrollment routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/enrollments")
            .route("/{id}/cancel", web::post().to(cancel_enrollment))
            .route("/{id}/complete", web::post().to(complete_enrollment))
            .route("/{id}/payments", web::get().to(list_enrollment_payments)),
    );
}
