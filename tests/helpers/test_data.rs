// Test Data Factory
//
// Builds an application state on the in-memory store and seeds it with
// enrollments, payers and bearer tokens. Every enrollment gets a fresh UUID
// so tests never share rows.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use enrollpay::config::PaymentsConfig;
use enrollpay::core::{Currency, Result};
use enrollpay::enrollments::Enrollment;
use enrollpay::middleware::{Role, TokenVerifier};
use enrollpay::payments::models::{
    generate_transaction_id, ClientContext, Customer, Payment, PaymentGatewayKind,
};
use enrollpay::payments::services::PaymentNotifier;
use enrollpay::payments::{InMemoryPaymentStore, PaymentStore};
use enrollpay::AppState;

use super::fake_gateway::FakeGateway;

pub const TEST_TOKEN_SECRET: &str = "integration-token-secret-0123456789abcdef";
pub const TEST_USER_ID: &str = "user-42";
pub const OTHER_USER_ID: &str = "user-77";
pub const ADMIN_ID: &str = "admin-1";
pub const DEFAULT_AMOUNT: i64 = 25_000;

/// Counts confirmation notifications
#[derive(Default)]
pub struct RecordingNotifier {
    calls: AtomicUsize,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentNotifier for RecordingNotifier {
    async fn payment_confirmed(&self, _payment: &Payment, _enrollment: &Enrollment) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn payments_config(simulation_enabled: bool) -> PaymentsConfig {
    PaymentsConfig {
        currency: Currency::XOF,
        notify_url: "https://api.test/payments/webhook".to_string(),
        return_url: "https://app.test/payments/return".to_string(),
        channels: "ALL".to_string(),
        simulation_enabled,
    }
}

/// Everything an integration test needs, wired like `main` does
pub struct TestContext {
    pub store: Arc<InMemoryPaymentStore>,
    pub gateway: Arc<FakeGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub state: AppState,
}

impl TestContext {
    pub fn new() -> Self {
        Self::build(false, 1_000)
    }

    pub fn with_simulation() -> Self {
        Self::build(true, 1_000)
    }

    pub fn with_webhook_limit(per_minute: u32) -> Self {
        Self::build(false, per_minute)
    }

    fn build(simulation_enabled: bool, webhook_rate_limit_per_minute: u32) -> Self {
        let store = Arc::new(InMemoryPaymentStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let notifier = Arc::new(RecordingNotifier::default());

        let state = AppState::new(
            store.clone(),
            gateway.clone(),
            notifier.clone(),
            payments_config(simulation_enabled),
            TokenVerifier::new(TEST_TOKEN_SECRET),
            webhook_rate_limit_per_minute,
        )
        .expect("app state should build");

        Self {
            store,
            gateway,
            notifier,
            state,
        }
    }

    /// Insert an unpaid enrollment owned by `user_id`
    pub async fn seed_enrollment(&self, user_id: &str, amount: i64) -> Enrollment {
        let enrollment = Enrollment::new(user_id, "training-rust", "Rust pour les services", amount)
            .expect("valid enrollment");
        self.store
            .insert_enrollment(&enrollment)
            .await
            .expect("enrollment should insert");
        self.store
            .insert_customer(Customer {
                user_id: user_id.to_string(),
                first_name: Some("Awa".to_string()),
                last_name: Some("Kone".to_string()),
                email: Some(format!("{}@example.test", user_id)),
                phone_number: Some("+2250700000001".to_string()),
                country: Some("CI".to_string()),
                ..Customer::default()
            })
            .expect("customer should insert");
        enrollment
    }

    /// Insert a pending CinetPay attempt for `enrollment`, as initiation would
    pub async fn seed_pending_payment(&self, enrollment: &Enrollment) -> Payment {
        let payment = Payment::new(
            generate_transaction_id(),
            enrollment.id.clone(),
            enrollment.user_id.clone(),
            enrollment.amount,
            Currency::XOF,
            PaymentGatewayKind::CinetPay,
            ClientContext::default(),
        )
        .expect("valid payment");
        self.store
            .insert_payment(&payment)
            .await
            .expect("payment should insert");
        payment
    }

    pub async fn enrollment(&self, id: &str) -> Enrollment {
        self.store
            .find_enrollment(id)
            .await
            .unwrap()
            .expect("enrollment should exist")
    }

    pub async fn payment(&self, transaction_id: &str) -> Payment {
        self.store
            .find_payment(transaction_id)
            .await
            .unwrap()
            .expect("payment should exist")
    }

    pub fn bearer(&self, user_id: &str, role: Role) -> String {
        let token = self
            .state
            .token_verifier
            .issue(user_id, role, Utc::now() + Duration::hours(1))
            .expect("token should issue");
        format!("Bearer {}", token)
    }

    pub fn user_bearer(&self) -> String {
        self.bearer(TEST_USER_ID, Role::User)
    }

    pub fn admin_bearer(&self) -> String {
        self.bearer(ADMIN_ID, Role::Admin)
    }
}
