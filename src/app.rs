use std::sync::Arc;

use actix_web::web;

use crate::config::PaymentsConfig;
use crate::core::Result;
use crate::middleware::{form_config, json_config, RateLimiter, TokenVerifier};
use crate::modules::enrollments::{self, EnrollmentService};
use crate::modules::gateways::PaymentGateway;
use crate::modules::health;
use crate::modules::payments::services::{
    EnrollmentReconciler, PaymentNotifier, PaymentService, WebhookService,
};
use crate::modules::payments::{self, PaymentStore};

/// Services shared by every worker
///
/// Built once before the server starts; each worker clones the `Arc`s, and
/// the webhook limiter quota is global across workers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PaymentStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub reconciler: EnrollmentReconciler,
    pub payments: Arc<PaymentService>,
    pub webhooks: Arc<WebhookService>,
    pub enrollments: Arc<EnrollmentService>,
    pub token_verifier: TokenVerifier,
    webhook_limiter: RateLimiter,
}

impl AppState {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn PaymentNotifier>,
        settings: PaymentsConfig,
        token_verifier: TokenVerifier,
        webhook_rate_limit_per_minute: u32,
    ) -> Result<Self> {
        let reconciler = EnrollmentReconciler::new(store.clone(), notifier);
        let payments = Arc::new(PaymentService::new(
            store.clone(),
            gateway.clone(),
            reconciler.clone(),
            settings,
        ));
        let webhooks = Arc::new(WebhookService::new(gateway.clone(), reconciler.clone()));
        let enrollments = Arc::new(EnrollmentService::new(store.clone()));

        Ok(Self {
            store,
            gateway,
            reconciler,
            payments,
            webhooks,
            enrollments,
            token_verifier,
            webhook_limiter: RateLimiter::new(webhook_rate_limit_per_minute)?,
        })
    }

    /// Register shared data and every route
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(json_config())
            .app_data(form_config())
            .app_data(web::Data::new(self.store.clone()))
            .app_data(web::Data::new(self.payments.clone()))
            .app_data(web::Data::new(self.webhooks.clone()))
            .app_data(web::Data::new(self.enrollments.clone()))
            .configure(health::configure)
            .configure(|cfg| payments::configure(cfg, self.webhook_limiter.clone()))
            .configure(enrollments::configure);
    }
}
