/// Enrollment lifecycle guards around payments
///
/// Paid enrollments cannot be cancelled or paid again, cancelled ones cannot
/// take a payment, and an acceptance that arrives too late is recorded as a
/// failed attempt rather than silently credited.
#[path = "../helpers/mod.rs"]
mod helpers;

use actix_web::test;
use enrollpay::enrollments::{EnrollmentPaymentStatus, EnrollmentStatus};
use enrollpay::middleware::Role;
use enrollpay::payments::PaymentStatus;
use helpers::*;
use serde_json::{json, Value};

/// Settle a pending attempt through the callback endpoint
macro_rules! accept {
    ($app:expr, $transaction_id:expr) => {{
        let req = test::TestRequest::post()
            .uri("/payments/webhook")
            .set_form(signed_webhook($transaction_id, DEFAULT_AMOUNT, "ACCEPTED"))
            .to_request();
        test::call_service(&$app, req).await
    }};
}

#[actix_web::test]
async fn test_paid_enrollment_cannot_be_cancelled() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let enrollment = ctx.seed_enrollment(TEST_USER_ID, DEFAULT_AMOUNT).await;
    let payment = ctx.seed_pending_payment(&enrollment).await;
    assert_eq!(accept!(app, &payment.transaction_id).status(), 200);

    let req = test::TestRequest::post()
        .uri(&format!("/enrollments/{}/cancel", enrollment.id))
        .insert_header(("Authorization", ctx.user_bearer()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("already paid"));

    let enrollment = ctx.enrollment(&enrollment.id).await;
    assert_eq!(enrollment.status, EnrollmentStatus::Confirmed);
    assert!(enrollment.cancelled_at.is_none());
}

#[actix_web::test]
async fn test_paid_enrollment_rejects_new_initiation() {
    let ctx = TestContext::with_simulation();
    let app = init_app!(ctx);
    let enrollment = ctx.seed_enrollment(TEST_USER_ID, DEFAULT_AMOUNT).await;
    let payment = ctx.seed_pending_payment(&enrollment).await;
    assert_eq!(accept!(app, &payment.transaction_id).status(), 200);

    for body in [
        json!({ "enrollmentId": enrollment.id }),
        json!({ "enrollmentId": enrollment.id, "isSimulation": true }),
    ] {
        let req = test::TestRequest::post()
            .uri("/payments/initiate")
            .insert_header(("Authorization", ctx.user_bearer()))
            .set_json(body)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);
    }

    assert_eq!(ctx.gateway.initiate_calls(), 0);
    assert_eq!(ctx.store.payment_count().unwrap(), 1);
}

/// Cancelled while the customer was paying: the acceptance is not credited
#[actix_web::test]
async fn test_acceptance_after_cancellation_is_superseded() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let enrollment = ctx.seed_enrollment(TEST_USER_ID, DEFAULT_AMOUNT).await;
    let payment = ctx.seed_pending_payment(&enrollment).await;

    let req = test::TestRequest::post()
        .uri(&format!("/enrollments/{}/cancel", enrollment.id))
        .insert_header(("Authorization", ctx.user_bearer()))
        .to_request();
    let cancelled: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(cancelled["status"], "CANCELLED");

    let resp = accept!(app, &payment.transaction_id);
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "FAILED");

    let payment = ctx.payment(&payment.transaction_id).await;
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert_eq!(
        payment.failure_reason.as_deref(),
        Some("ENROLLMENT_CANCELLED")
    );

    let enrollment = ctx.enrollment(&enrollment.id).await;
    assert_eq!(enrollment.status, EnrollmentStatus::Cancelled);
    assert_eq!(enrollment.payment_status, EnrollmentPaymentStatus::Unpaid);
    assert_eq!(ctx.notifier.count(), 0);

    let req = test::TestRequest::post()
        .uri("/payments/initiate")
        .insert_header(("Authorization", ctx.user_bearer()))
        .set_json(json!({ "enrollmentId": enrollment.id }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}

#[actix_web::test]
async fn test_completion_is_admin_only_and_requires_payment() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let enrollment = ctx.seed_enrollment(TEST_USER_ID, DEFAULT_AMOUNT).await;
    let complete = |bearer: String| {
        test::TestRequest::post()
            .uri(&format!("/enrollments/{}/complete", enrollment.id))
            .insert_header(("Authorization", bearer))
            .to_request()
    };

    // Unpaid
    assert_eq!(
        test::call_service(&app, complete(ctx.admin_bearer()))
            .await
            .status(),
        400
    );

    let payment = ctx.seed_pending_payment(&enrollment).await;
    assert_eq!(accept!(app, &payment.transaction_id).status(), 200);

    assert_eq!(
        test::call_service(&app, complete(ctx.user_bearer()))
            .await
            .status(),
        403
    );

    let body: Value = test::call_and_read_body_json(&app, complete(ctx.admin_bearer())).await;
    assert_eq!(body["status"], "COMPLETED");
    assert_eq!(body["paymentStatus"], "PAID");
    assert!(!body["completedAt"].is_null());
}

#[actix_web::test]
async fn test_other_users_cannot_touch_enrollment() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let enrollment = ctx.seed_enrollment(TEST_USER_ID, DEFAULT_AMOUNT).await;
    let payment = ctx.seed_pending_payment(&enrollment).await;
    let stranger = ctx.bearer(OTHER_USER_ID, Role::User);

    let req = test::TestRequest::post()
        .uri(&format!("/enrollments/{}/cancel", enrollment.id))
        .insert_header(("Authorization", stranger.clone()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::get()
        .uri(&format!("/enrollments/{}/payments", enrollment.id))
        .insert_header(("Authorization", stranger.clone()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::get()
        .uri(&format!("/payments/verify/{}", payment.transaction_id))
        .insert_header(("Authorization", stranger))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);
    assert_eq!(ctx.gateway.status_calls(), 0);

    assert_eq!(
        ctx.enrollment(&enrollment.id).await.status,
        EnrollmentStatus::Pending
    );
}

#[actix_web::test]
async fn test_admin_can_cancel_and_list() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let enrollment = ctx.seed_enrollment(TEST_USER_ID, DEFAULT_AMOUNT).await;
    ctx.seed_pending_payment(&enrollment).await;

    let req = test::TestRequest::get()
        .uri(&format!("/enrollments/{}/payments", enrollment.id))
        .insert_header(("Authorization", ctx.admin_bearer()))
        .to_request();
    let payments: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0]["status"], "PENDING");
    assert_eq!(payments[0]["gateway"], "CINETPAY");

    let req = test::TestRequest::post()
        .uri(&format!("/enrollments/{}/cancel", enrollment.id))
        .insert_header(("Authorization", ctx.admin_bearer()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    // Second cancellation is a lifecycle violation
    let req = test::TestRequest::post()
        .uri(&format!("/enrollments/{}/cancel", enrollment.id))
        .insert_header(("Authorization", ctx.admin_bearer()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}
