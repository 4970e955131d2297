use actix_web::{error, web, Error, HttpRequest};

use crate::core::AppError;

/// Body size cap for API and webhook payloads
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Malformed JSON bodies answer with the regular validation error shape
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(MAX_BODY_BYTES)
        .error_handler(|err, req| payload_error(err.to_string(), req))
}

/// Same for form-encoded bodies (gateway callbacks)
pub fn form_config() -> web::FormConfig {
    web::FormConfig::default()
        .limit(MAX_BODY_BYTES)
        .error_handler(|err, req| payload_error(err.to_string(), req))
}

fn payload_error(message: String, req: &HttpRequest) -> Error {
    tracing::debug!(path = %req.path(), error = %message, "Rejected request body");
    error::Error::from(AppError::Validation(format!("Invalid request body: {}", message)))
}
