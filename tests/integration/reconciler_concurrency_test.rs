/// Concurrent reconciliation
///
/// Callbacks and verification requests for the same transaction can arrive
/// at the same time; whatever the interleaving, a payment reaches exactly one
/// terminal state and an enrollment is paid at most once.
#[path = "../helpers/mod.rs"]
mod helpers;

use enrollpay::enrollments::EnrollmentPaymentStatus;
use enrollpay::gateways::GatewayTransactionStatus;
use enrollpay::payments::services::{GatewayOutcome, Reconciliation};
use enrollpay::payments::PaymentStatus;
use helpers::*;

fn outcome(transaction_id: &str, amount: i64, status: &str) -> GatewayOutcome {
    let payload = signed_webhook(transaction_id, amount, status);
    GatewayOutcome::from_webhook(&payload, GatewayTransactionStatus::parse(status))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_accept_and_refuse_race_settles_once() {
    for _ in 0..50 {
        let ctx = TestContext::new();
        let enrollment = ctx.seed_enrollment(TEST_USER_ID, DEFAULT_AMOUNT).await;
        let transaction_id = ctx.seed_pending_payment(&enrollment).await.transaction_id;

        let accept = {
            let reconciler = ctx.state.reconciler.clone();
            let outcome = outcome(&transaction_id, DEFAULT_AMOUNT, "ACCEPTED");
            let tx = transaction_id.clone();
            tokio::spawn(async move { reconciler.reconcile(&tx, outcome).await })
        };
        let refuse = {
            let reconciler = ctx.state.reconciler.clone();
            let outcome = outcome(&transaction_id, DEFAULT_AMOUNT, "REFUSED");
            let tx = transaction_id.clone();
            tokio::spawn(async move { reconciler.reconcile(&tx, outcome).await })
        };

        let (accepted, refused) = tokio::join!(accept, refuse);
        let results = [accepted.unwrap().unwrap(), refused.unwrap().unwrap()];

        let applied = results
            .iter()
            .filter(|r| matches!(r, Reconciliation::Applied { .. }))
            .count();
        let replayed = results
            .iter()
            .filter(|r| matches!(r, Reconciliation::Replayed(_)))
            .count();
        assert_eq!((applied, replayed), (1, 1));

        let payment = ctx.payment(&transaction_id).await;
        let enrollment = ctx.enrollment(&enrollment.id).await;
        match payment.status {
            PaymentStatus::Completed => {
                assert_eq!(enrollment.payment_status, EnrollmentPaymentStatus::Paid);
                assert_eq!(ctx.notifier.count(), 1);
            }
            PaymentStatus::Failed => {
                assert_eq!(enrollment.payment_status, EnrollmentPaymentStatus::Unpaid);
                assert_eq!(ctx.notifier.count(), 0);
            }
            PaymentStatus::Pending => panic!("payment left pending"),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_acceptances_apply_once() {
    let ctx = TestContext::new();
    let enrollment = ctx.seed_enrollment(TEST_USER_ID, DEFAULT_AMOUNT).await;
    let transaction_id = ctx.seed_pending_payment(&enrollment).await.transaction_id;

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let reconciler = ctx.state.reconciler.clone();
            let outcome = outcome(&transaction_id, DEFAULT_AMOUNT, "ACCEPTED");
            let tx = transaction_id.clone();
            tokio::spawn(async move { reconciler.reconcile(&tx, outcome).await })
        })
        .collect();

    let mut applied = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            Reconciliation::Applied { .. } => applied += 1,
            Reconciliation::Replayed(payment) => {
                assert_eq!(payment.status, PaymentStatus::Completed)
            }
            other => panic!("unexpected reconciliation {:?}", other),
        }
    }

    assert_eq!(applied, 1);
    assert_eq!(ctx.notifier.count(), 1);
}

/// Two attempts for one enrollment both accepted: only one may pay it
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_competing_attempts_pay_enrollment_once() {
    for _ in 0..25 {
        let ctx = TestContext::new();
        let enrollment = ctx.seed_enrollment(TEST_USER_ID, DEFAULT_AMOUNT).await;
        let first = ctx.seed_pending_payment(&enrollment).await.transaction_id;
        let second = ctx.seed_pending_payment(&enrollment).await.transaction_id;

        let spawn_accept = |tx: String| {
            let reconciler = ctx.state.reconciler.clone();
            let outcome = outcome(&tx, DEFAULT_AMOUNT, "ACCEPTED");
            tokio::spawn(async move { reconciler.reconcile(&tx, outcome).await })
        };
        let (a, b) = tokio::join!(spawn_accept(first.clone()), spawn_accept(second.clone()));
        let results = [a.unwrap().unwrap(), b.unwrap().unwrap()];

        let superseded: Vec<_> = results
            .iter()
            .filter_map(|r| match r {
                Reconciliation::Superseded { reason, .. } => Some(reason.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(superseded, vec!["ENROLLMENT_ALREADY_PAID"]);

        let statuses = [
            ctx.payment(&first).await.status,
            ctx.payment(&second).await.status,
        ];
        assert_eq!(
            statuses
                .iter()
                .filter(|s| **s == PaymentStatus::Completed)
                .count(),
            1
        );
        assert_eq!(
            statuses
                .iter()
                .filter(|s| **s == PaymentStatus::Failed)
                .count(),
            1
        );
        assert_eq!(ctx.notifier.count(), 1);
    }
}
