use std::sync::Arc;

use actix_web::{web, Either, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::core::error::AppError;
use crate::modules::gateways::models::WebhookPayload;
use crate::modules::payments::models::PaymentStatus;
use crate::modules::payments::services::{Reconciliation, WebhookService};

/// Acknowledgement returned to the gateway
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct WebhookAck {
    pub success: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub acknowledged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl WebhookAck {
    fn from_reconciliation(result: &Reconciliation) -> Self {
        match result {
            Reconciliation::NotFound => Self {
                success: false,
                acknowledged: true,
                status: None,
                reason: Some("unknown_transaction".to_string()),
            },
            other => Self {
                success: true,
                acknowledged: false,
                status: other.payment().map(|p| p.status),
                reason: None,
            },
        }
    }
}

/// Gateway notification callback
/// POST /payments/webhook
///
/// The gateway posts form data; JSON is accepted for manual replays.
/// Responds 200 once the signature is valid, whether or not anything changed,
/// and 5xx when the store fails so the gateway re-delivers.
pub async fn receive_webhook(
    service: web::Data<Arc<WebhookService>>,
    req: HttpRequest,
    body: Either<web::Json<WebhookPayload>, web::Form<WebhookPayload>>,
) -> Result<HttpResponse, AppError> {
    let payload = match body {
        Either::Left(json) => json.into_inner(),
        Either::Right(form) => form.into_inner(),
    };
    let peer = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();
    let transaction_id = payload.cpm_trans_id.clone().unwrap_or_default();

    let result = service.handle(payload, &peer).await.map_err(|e| {
        if matches!(e, AppError::Database(_) | AppError::Internal(_)) {
            error!(
                transaction_id = %transaction_id,
                error = %e,
                "Webhook processing failed, gateway will retry"
            );
        }
        e
    })?;

    let ack = WebhookAck::from_reconciliation(&result);
    info!(
        transaction_id = %transaction_id,
        success = ack.success,
        status = ?ack.status,
        "Webhook acknowledged"
    );
    Ok(HttpResponse::Ok().json(ack))
}
