/// Property-based tests for gateway callback signatures
///
/// A callback is only trusted when its digest covers the exact transaction,
/// amount and currency it carries.
use enrollpay::gateways::{WebhookPayload, WebhookSigner};
use proptest::prelude::*;

fn signer() -> WebhookSigner {
    WebhookSigner::new("api-key", "445160", "secret-key")
}

fn payload(transaction_id: &str, amount: &str, currency: &str, signature: String) -> WebhookPayload {
    WebhookPayload {
        cpm_site_id: Some("445160".to_string()),
        cpm_trans_id: Some(transaction_id.to_string()),
        cpm_amount: Some(amount.to_string()),
        cpm_currency: Some(currency.to_string()),
        cpm_trans_status: Some("ACCEPTED".to_string()),
        signature: Some(signature),
        ..WebhookPayload::default()
    }
}

#[test]
fn test_other_credentials_do_not_verify() {
    let signature = WebhookSigner::new("api-key", "445160", "another-secret")
        .sign("TRX1", "25000", "XOF");
    assert!(!signer().verify(&payload("TRX1", "25000", "XOF", signature)));
}

#[test]
fn test_missing_signature_is_rejected() {
    let mut unsigned = payload("TRX1", "25000", "XOF", String::new());
    unsigned.signature = None;
    assert!(!signer().verify(&unsigned));
}

proptest! {
    /// Property: a signature produced for a payload verifies it, in any case
    #[test]
    fn test_signed_payload_verifies(
        transaction_id in "TRX[0-9]{13,25}",
        amount in 5i64..10_000_000i64,
        uppercase in any::<bool>(),
    ) {
        let amount = amount.to_string();
        let mut signature = signer().sign(&transaction_id, &amount, "XOF");
        if uppercase {
            signature = signature.to_uppercase();
        }
        prop_assert!(signer().verify(&payload(&transaction_id, &amount, "XOF", signature)));
    }

    /// Property: changing the amount after signing breaks verification
    #[test]
    fn test_tampered_amount_is_rejected(
        transaction_id in "TRX[0-9]{13,25}",
        amount in 5i64..10_000_000i64,
        delta in 1i64..1_000_000i64,
    ) {
        let signature = signer().sign(&transaction_id, &amount.to_string(), "XOF");
        let tampered = (amount + delta).to_string();
        prop_assert!(!signer().verify(&payload(&transaction_id, &tampered, "XOF", signature)));
    }

    /// Property: a signature cannot be replayed onto another transaction
    #[test]
    fn test_signature_bound_to_transaction(
        first in "TRX[0-9]{13,25}",
        second in "TRX[0-9]{13,25}",
    ) {
        prop_assume!(first != second);
        let signature = signer().sign(&first, "25000", "XOF");
        prop_assert!(!signer().verify(&payload(&second, "25000", "XOF", signature)));
    }

    /// Property: currency is covered by the digest
    #[test]
    fn test_currency_swap_is_rejected(
        currency in prop::sample::select(vec!["XAF", "USD", "CDF", "GNF"]),
    ) {
        let signature = signer().sign("TRX1700000000000123456789", "25000", "XOF");
        prop_assert!(!signer().verify(&payload("TRX1700000000000123456789", "25000", currency, signature)));
    }
}
