use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::core::error::AppError;
use crate::middleware::Caller;
use crate::modules::gateways::models::CanonicalStatus;
use crate::modules::payments::models::{ClientContext, PaymentStatus};
use crate::modules::payments::services::{InitiatePayment, PaymentService};

/// Body of `POST /payments/initiate`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    #[serde(default)]
    pub enrollment_id: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_simulation: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentResponse {
    pub payment_id: String,
    pub payment_url: Option<String>,
    pub transaction_id: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_simulation: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    pub transaction_id: String,
    pub status: PaymentStatus,
    pub amount: i64,
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_status: Option<CanonicalStatus>,
}

pub(crate) fn client_context(req: &HttpRequest) -> ClientContext {
    ClientContext {
        ip_address: req
            .connection_info()
            .realip_remote_addr()
            .map(|ip| ip.to_string()),
        user_agent: req
            .headers()
            .get("User-Agent")
            .and_then(|h| h.to_str().ok())
            .map(|ua| ua.chars().take(255).collect()),
    }
}

/// Start a payment for an enrollment
/// POST /payments/initiate
pub async fn initiate_payment(
    service: web::Data<Arc<PaymentService>>,
    caller: Caller,
    req: HttpRequest,
    body: web::Json<InitiatePaymentRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let initiated = service
        .initiate(
            &caller,
            InitiatePayment {
                enrollment_id: body.enrollment_id,
                phone: body.phone,
                is_simulation: body.is_simulation,
            },
            client_context(&req),
        )
        .await?;

    Ok(HttpResponse::Ok().json(InitiatePaymentResponse {
        payment_id: initiated.payment.id,
        payment_url: initiated.payment_url,
        transaction_id: initiated.payment.transaction_id,
        is_simulation: initiated.is_simulation,
    }))
}

/// Re-check a transaction against the gateway
/// GET /payments/verify/{transaction_id}
pub async fn verify_payment(
    service: web::Data<Arc<PaymentService>>,
    caller: Caller,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let verified = service.verify(&caller, &path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(VerifyPaymentResponse {
        transaction_id: verified.payment.transaction_id,
        status: verified.payment.status,
        amount: verified.payment.amount,
        payment_method: verified.payment.payment_method,
        gateway_status: verified.gateway_status,
    }))
}
