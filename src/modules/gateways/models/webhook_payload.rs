use serde::{Deserialize, Deserializer, Serialize};

/// Callback body posted by the gateway to the notify URL
///
/// The gateway posts form data where every field is a string; JSON callbacks
/// replayed by operators may carry numbers, so scalar fields accept both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default, deserialize_with = "loose_string")]
    pub cpm_site_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub cpm_trans_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub cpm_trans_date: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub cpm_amount: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub cpm_currency: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub cpm_trans_status: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub cpm_error_message: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub cpm_custom: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub payment_method: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub operator_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub cel_phone_num: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub signature: Option<String>,
}

impl WebhookPayload {
    /// Reported amount, if present and numeric
    pub fn amount(&self) -> Option<i64> {
        parse_amount(self.cpm_amount.as_deref()?)
    }

    /// Snapshot kept on the payment for audit; the signature is dropped.
    pub fn audit_snapshot(&self) -> serde_json::Value {
        let mut snapshot = self.clone();
        snapshot.signature = None;
        serde_json::to_value(snapshot).unwrap_or(serde_json::Value::Null)
    }
}

/// Parse a gateway amount such as `"25000"` or `"25000.00"` into minor units
pub fn parse_amount(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    // Integral decimals only; a fractional franc is not a valid amount.
    match raw.split_once('.') {
        Some((whole, fraction)) if fraction.chars().all(|c| c == '0') => whole.parse().ok(),
        _ => None,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
}

fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Loose> = Option::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        Loose::Text(s) => s,
        Loose::Integer(i) => i.to_string(),
        Loose::Float(f) => f.to_string(),
        Loose::Flag(b) => b.to_string(),
    }))
}
