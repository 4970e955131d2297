pub mod payment_controller;
pub mod webhook_controller;

use crate::middleware::RateLimiter;
use actix_web::web;

pub use payment_controller::{initiate_payment, verify_payment};
pub use webhook_controller::receive_webhook;

/// Configure payment routes
///
/// The webhook resource carries its own limiter; authentication is skipped
/// for it by the token middleware.
pub fn configure(cfg: &mut web::ServiceConfig, webhook_limiter: RateLimiter) {
    cfg.service(
        web::scope("/payments")
            .route("/initiate", web::post().to(initiate_payment))
            .route("/verify/{transaction_id}", web::get().to(verify_payment))
            .service(
                web::resource("/webhook")
                    .wrap(webhook_limiter)
                    .route(web::post().to(receive_webhook)),
            ),
    );
}
