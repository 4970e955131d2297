use crate::modules::gateways::models::WebhookPayload;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Signs and verifies gateway notifications
///
/// The digest is SHA-256 hex over `api_key || site_id || cpm_trans_id ||
/// cpm_amount || cpm_currency || secret_key`, computed over the raw strings as
/// received so formatting differences never alter the input.
#[derive(Clone)]
pub struct WebhookSigner {
    api_key: String,
    site_id: String,
    secret_key: String,
}

impl WebhookSigner {
    pub fn new(
        api_key: impl Into<String>,
        site_id: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            site_id: site_id.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn sign(&self, transaction_id: &str, amount: &str, currency: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.api_key.as_bytes());
        hasher.update(self.site_id.as_bytes());
        hasher.update(transaction_id.as_bytes());
        hasher.update(amount.as_bytes());
        hasher.update(currency.as_bytes());
        hasher.update(self.secret_key.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// False when any signed field or the signature itself is missing
    pub fn verify(&self, payload: &WebhookPayload) -> bool {
        let (Some(trans_id), Some(amount), Some(currency), Some(signature)) = (
            payload.cpm_trans_id.as_deref(),
            payload.cpm_amount.as_deref(),
            payload.cpm_currency.as_deref(),
            payload.signature.as_deref(),
        ) else {
            return false;
        };

        let expected = self.sign(trans_id, amount, currency);
        let provided = signature.trim().to_ascii_lowercase();
        expected.as_bytes().ct_eq(provided.as_bytes()).into()
    }
}

impl std::fmt::Debug for WebhookSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSigner")
            .field("site_id", &self.site_id)
            .finish_non_exhaustive()
    }
}
