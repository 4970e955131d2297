use chrono::Utc;
use rand::rngs::OsRng;
use rand::Rng;

/// Namespace prefix of every transaction id issued by this service
pub const TRANSACTION_ID_PREFIX: &str = "TRX";

const RANDOM_SUFFIX_DIGITS: usize = 9;
const RANDOM_SUFFIX_BOUND: u32 = 1_000_000_000;

/// Issue a new transaction id: prefix, millisecond timestamp, then a
/// zero-padded random suffix drawn from the OS CSPRNG.
///
/// Only ASCII alphanumerics are used; the gateway rejects ids containing
/// separators such as `#`, `/` or `_`.
pub fn generate_transaction_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: u32 = OsRng.gen_range(0..RANDOM_SUFFIX_BOUND);
    format!(
        "{}{}{:0width$}",
        TRANSACTION_ID_PREFIX,
        millis,
        suffix,
        width = RANDOM_SUFFIX_DIGITS
    )
}

/// Cheap shape check applied to ids arriving from outside (webhooks, URLs)
pub fn is_well_formed(transaction_id: &str) -> bool {
    transaction_id.len() <= 64
        && transaction_id.starts_with(TRANSACTION_ID_PREFIX)
        && transaction_id[TRANSACTION_ID_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_digit())
        && transaction_id.len() > TRANSACTION_ID_PREFIX.len() + RANDOM_SUFFIX_DIGITS
}
