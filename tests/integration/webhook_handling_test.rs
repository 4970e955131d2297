/// Gateway callback handling
///
/// Covers authentication of callbacks, duplicate deliveries, unknown
/// transactions and store outages, which must surface as 5xx so the gateway
/// keeps retrying.
#[path = "../helpers/mod.rs"]
mod helpers;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use actix_web::test;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use enrollpay::core::{AppError, Result};
use enrollpay::enrollments::{Enrollment, EnrollmentPaymentStatus};
use enrollpay::middleware::TokenVerifier;
use enrollpay::payments::models::{Customer, Payment, Transition, TransitionOutcome};
use enrollpay::payments::repositories::EnrollmentChange;
use enrollpay::payments::{InMemoryPaymentStore, PaymentStatus, PaymentStore};
use enrollpay::AppState;
use helpers::*;
use serde_json::{json, Value};

/// Same delivery N times: one transition, one notification
#[actix_web::test]
async fn test_duplicate_deliveries_apply_once() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let enrollment = ctx.seed_enrollment(TEST_USER_ID, DEFAULT_AMOUNT).await;
    let transaction_id = ctx.seed_pending_payment(&enrollment).await.transaction_id;

    let mut completed_at = None;
    for _ in 0..5 {
        let req = test::TestRequest::post()
            .uri("/payments/webhook")
            .set_form(signed_webhook(&transaction_id, DEFAULT_AMOUNT, "ACCEPTED"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["status"], "COMPLETED");

        let payment = ctx.payment(&transaction_id).await;
        assert_eq!(payment.status, PaymentStatus::Completed);
        match completed_at {
            None => completed_at = payment.completed_at,
            Some(first) => assert_eq!(payment.completed_at, Some(first)),
        }
    }

    assert_eq!(ctx.notifier.count(), 1);
    assert_eq!(
        ctx.enrollment(&enrollment.id).await.payment_status,
        EnrollmentPaymentStatus::Paid
    );
}

/// A late refusal cannot undo a completed payment
#[actix_web::test]
async fn test_refusal_after_completion_is_ignored() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let enrollment = ctx.seed_enrollment(TEST_USER_ID, DEFAULT_AMOUNT).await;
    let transaction_id = ctx.seed_pending_payment(&enrollment).await.transaction_id;

    for status in ["ACCEPTED", "REFUSED"] {
        let req = test::TestRequest::post()
            .uri("/payments/webhook")
            .set_form(signed_webhook(&transaction_id, DEFAULT_AMOUNT, status))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);
    }

    assert_eq!(
        ctx.payment(&transaction_id).await.status,
        PaymentStatus::Completed
    );
}

#[actix_web::test]
async fn test_tampered_amount_is_rejected() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let enrollment = ctx.seed_enrollment(TEST_USER_ID, DEFAULT_AMOUNT).await;
    let transaction_id = ctx.seed_pending_payment(&enrollment).await.transaction_id;

    let mut forged = signed_webhook(&transaction_id, DEFAULT_AMOUNT, "ACCEPTED");
    forged.cpm_amount = Some("5".to_string());

    let req = test::TestRequest::post()
        .uri("/payments/webhook")
        .set_form(forged)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let payment = ctx.payment(&transaction_id).await;
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert!(payment.payment_data.is_none());
}

#[actix_web::test]
async fn test_foreign_site_id_is_rejected() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let enrollment = ctx.seed_enrollment(TEST_USER_ID, DEFAULT_AMOUNT).await;
    let transaction_id = ctx.seed_pending_payment(&enrollment).await.transaction_id;

    let mut foreign = signed_webhook(&transaction_id, DEFAULT_AMOUNT, "ACCEPTED");
    foreign.cpm_site_id = Some("999999".to_string());

    let req = test::TestRequest::post()
        .uri("/payments/webhook")
        .set_form(foreign)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
}

#[actix_web::test]
async fn test_missing_fields_are_rejected() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);

    let mut unsigned = signed_webhook("TRX1700000000000123456789", DEFAULT_AMOUNT, "ACCEPTED");
    unsigned.signature = None;

    let req = test::TestRequest::post()
        .uri("/payments/webhook")
        .set_form(unsigned)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

/// Unknown transactions are acknowledged so the gateway stops retrying
#[actix_web::test]
async fn test_unknown_transaction_is_acknowledged() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/payments/webhook")
        .set_form(signed_webhook(
            "TRX1700000000000123456789",
            DEFAULT_AMOUNT,
            "ACCEPTED",
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({ "success": false, "acknowledged": true, "reason": "unknown_transaction" })
    );
    assert_eq!(ctx.store.payment_count().unwrap(), 0);
}

/// Accepted with a signed but different amount: never credited
#[actix_web::test]
async fn test_amount_mismatch_fails_payment() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let enrollment = ctx.seed_enrollment(TEST_USER_ID, DEFAULT_AMOUNT).await;
    let transaction_id = ctx.seed_pending_payment(&enrollment).await.transaction_id;

    let req = test::TestRequest::post()
        .uri("/payments/webhook")
        .set_form(signed_webhook(&transaction_id, 100, "ACCEPTED"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let payment = ctx.payment(&transaction_id).await;
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert_eq!(payment.failure_reason.as_deref(), Some("AMOUNT_MISMATCH"));
    assert_eq!(
        ctx.enrollment(&enrollment.id).await.payment_status,
        EnrollmentPaymentStatus::Unpaid
    );
    assert_eq!(ctx.notifier.count(), 0);
}

/// JSON replays with numeric fields are accepted like form posts
#[actix_web::test]
async fn test_json_replay_is_accepted() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let enrollment = ctx.seed_enrollment(TEST_USER_ID, DEFAULT_AMOUNT).await;
    let transaction_id = ctx.seed_pending_payment(&enrollment).await.transaction_id;
    let signature = test_signer().sign(&transaction_id, "25000", "XOF");

    let req = test::TestRequest::post()
        .uri("/payments/webhook")
        .set_json(json!({
            "cpm_site_id": 445160,
            "cpm_trans_id": transaction_id,
            "cpm_amount": 25000,
            "cpm_currency": "XOF",
            "cpm_trans_status": "ACCEPTED",
            "signature": signature
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    assert_eq!(
        ctx.payment(&transaction_id).await.status,
        PaymentStatus::Completed
    );
}

/// No status on the callback: the gateway is asked directly
#[actix_web::test]
async fn test_missing_status_pulls_gateway() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let enrollment = ctx.seed_enrollment(TEST_USER_ID, DEFAULT_AMOUNT).await;
    let transaction_id = ctx.seed_pending_payment(&enrollment).await.transaction_id;
    ctx.gateway.report_status(
        enrollpay::gateways::GatewayTransactionStatus::Accepted,
        Some(DEFAULT_AMOUNT),
    );

    let mut bare = signed_webhook(&transaction_id, DEFAULT_AMOUNT, "");
    bare.cpm_trans_status = None;

    let req = test::TestRequest::post()
        .uri("/payments/webhook")
        .set_form(bare)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    assert_eq!(ctx.gateway.status_calls(), 1);
    assert_eq!(
        ctx.payment(&transaction_id).await.status,
        PaymentStatus::Completed
    );
}

#[actix_web::test]
async fn test_webhook_rate_limit() {
    let ctx = TestContext::with_webhook_limit(2);
    let app = init_app!(ctx);

    let mut statuses = Vec::new();
    for _ in 0..3 {
        let req = test::TestRequest::post()
            .uri("/payments/webhook")
            .set_form(signed_webhook(
                "TRX1700000000000123456789",
                DEFAULT_AMOUNT,
                "ACCEPTED",
            ))
            .to_request();
        statuses.push(test::call_service(&app, req).await.status().as_u16());
    }
    assert_eq!(statuses, vec![200, 200, 429]);
}

/// Delegates to the in-memory store, failing transitions on demand
struct FlakyStore {
    inner: InMemoryPaymentStore,
    fail_transitions: AtomicBool,
}

#[async_trait]
impl PaymentStore for FlakyStore {
    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<()> {
        self.inner.insert_enrollment(enrollment).await
    }

    async fn find_enrollment(&self, id: &str) -> Result<Option<Enrollment>> {
        self.inner.find_enrollment(id).await
    }

    async fn update_enrollment(
        &self,
        id: &str,
        change: EnrollmentChange,
        now: DateTime<Utc>,
    ) -> Result<Enrollment> {
        self.inner.update_enrollment(id, change, now).await
    }

    async fn find_customer(&self, user_id: &str) -> Result<Option<Customer>> {
        self.inner.find_customer(user_id).await
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        self.inner.insert_payment(payment).await
    }

    async fn find_payment(&self, transaction_id: &str) -> Result<Option<Payment>> {
        self.inner.find_payment(transaction_id).await
    }

    async fn list_payments_for_enrollment(&self, enrollment_id: &str) -> Result<Vec<Payment>> {
        self.inner.list_payments_for_enrollment(enrollment_id).await
    }

    async fn record_gateway_session(
        &self,
        transaction_id: &str,
        payment_url: &str,
        payment_token: &str,
        payment_data: Option<Value>,
    ) -> Result<()> {
        self.inner
            .record_gateway_session(transaction_id, payment_url, payment_token, payment_data)
            .await
    }

    async fn apply_transition(
        &self,
        transaction_id: &str,
        transition: &Transition,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        if self.fail_transitions.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner
            .apply_transition(transaction_id, transition, now)
            .await
    }
}

/// Store outage: 5xx, nothing written, and the retry succeeds
#[actix_web::test]
async fn test_store_failure_returns_server_error() {
    let store = Arc::new(FlakyStore {
        inner: InMemoryPaymentStore::new(),
        fail_transitions: AtomicBool::new(true),
    });
    let gateway = Arc::new(FakeGateway::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let state = AppState::new(
        store.clone(),
        gateway.clone(),
        notifier.clone(),
        payments_config(false),
        TokenVerifier::new(TEST_TOKEN_SECRET),
        100,
    )
    .unwrap();
    let app = test::init_service(actix_web::App::new().configure(|cfg| state.configure(cfg))).await;

    let enrollment = Enrollment::new(TEST_USER_ID, "training-rust", "Rust", DEFAULT_AMOUNT).unwrap();
    store.insert_enrollment(&enrollment).await.unwrap();
    let payment = Payment::new(
        "TRX1700000000000123456789".to_string(),
        enrollment.id.clone(),
        enrollment.user_id.clone(),
        DEFAULT_AMOUNT,
        enrollpay::core::Currency::XOF,
        enrollpay::payments::models::PaymentGatewayKind::CinetPay,
        Default::default(),
    )
    .unwrap();
    store.insert_payment(&payment).await.unwrap();

    let delivery = || {
        test::TestRequest::post()
            .uri("/payments/webhook")
            .set_form(signed_webhook(
                &payment.transaction_id,
                DEFAULT_AMOUNT,
                "ACCEPTED",
            ))
            .to_request()
    };

    let resp = test::call_service(&app, delivery()).await;
    assert_eq!(resp.status(), 500);

    let stored = store
        .find_payment(&payment.transaction_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
    assert_eq!(
        store
            .find_enrollment(&enrollment.id)
            .await
            .unwrap()
            .unwrap()
            .payment_status,
        EnrollmentPaymentStatus::Unpaid
    );
    assert_eq!(notifier.count(), 0);

    store.fail_transitions.store(false, Ordering::SeqCst);
    let resp = test::call_service(&app, delivery()).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(notifier.count(), 1);
}
