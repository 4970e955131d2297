use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::gateway_trait::{
    GatewayError, GatewayResult, PaymentGateway, PaymentRequest, PaymentSession, StatusReport,
};
use super::signature::WebhookSigner;
use crate::config::{CinetPayConfig, MAX_GATEWAY_TIMEOUT_SECS};
use crate::core::{AppError, Currency, Result};
use crate::modules::gateways::models::{parse_amount, GatewayTransactionStatus, WebhookPayload};

const GATEWAY_NAME: &str = "cinetpay";
const CODE_CREATED: &str = "201";
const CODE_SUCCESS: &str = "00";

/// CinetPay checkout API client
pub struct CinetPayClient {
    client: Client,
    api_key: String,
    site_id: String,
    base_url: String,
    signer: WebhookSigner,
}

#[derive(Debug, Serialize)]
struct InitiationBody<'a> {
    apikey: &'a str,
    site_id: &'a str,
    transaction_id: &'a str,
    amount: i64,
    currency: String,
    description: String,
    notify_url: &'a str,
    return_url: &'a str,
    channels: &'a str,
    lang: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a str>,
    customer_id: &'a str,
    customer_name: &'a str,
    customer_surname: &'a str,
    customer_email: &'a str,
    customer_phone_number: &'a str,
    customer_address: &'a str,
    customer_city: &'a str,
    customer_country: &'a str,
    customer_state: &'a str,
    customer_zip_code: &'a str,
}

#[derive(Debug, Serialize)]
struct CheckBody<'a> {
    apikey: &'a str,
    site_id: &'a str,
    transaction_id: &'a str,
}

/// Envelope shared by every CinetPay response
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    code: Value,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

impl Envelope {
    /// Codes are strings, but older endpoints send numbers
    fn code(&self) -> String {
        match &self.code {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => String::new(),
        }
    }

    fn error_message(&self) -> String {
        self.description
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "no message".to_string())
    }
}

impl CinetPayClient {
    pub fn new(config: &CinetPayConfig) -> Result<Self> {
        let timeout = config.timeout_secs.clamp(1, MAX_GATEWAY_TIMEOUT_SECS);
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .connect_timeout(Duration::from_secs(timeout.min(5)))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            site_id: config.site_id.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            signer: WebhookSigner::new(&config.api_key, &config.site_id, &config.secret_key),
        })
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> GatewayResult<String> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        // Error codes arrive in the body even on 4xx, so the status is not checked here.
        let status = response.status();
        let text = response.text().await.map_err(|e| unavailable(e.to_string()))?;
        if status.is_server_error() {
            return Err(unavailable(format!("HTTP {}", status)));
        }
        Ok(text)
    }

    fn initiation_body<'a>(&'a self, request: &'a PaymentRequest) -> InitiationBody<'a> {
        let customer = &request.customer;
        InitiationBody {
            apikey: &self.api_key,
            site_id: &self.site_id,
            transaction_id: &request.transaction_id,
            amount: request.amount,
            currency: request.currency.to_string(),
            description: sanitize_description(&request.description),
            notify_url: &request.notify_url,
            return_url: &request.return_url,
            channels: &request.channels,
            lang: "fr",
            metadata: request.metadata.as_deref(),
            customer_id: &customer.user_id,
            customer_name: customer.last_name.as_deref().unwrap_or(""),
            customer_surname: customer.first_name.as_deref().unwrap_or(""),
            customer_email: customer.email.as_deref().unwrap_or(""),
            customer_phone_number: customer.phone_number.as_deref().unwrap_or(""),
            customer_address: customer.address.as_deref().unwrap_or(""),
            customer_city: customer.city.as_deref().unwrap_or(""),
            customer_country: customer.country.as_deref().unwrap_or(""),
            // Only required for US and CA payers, which are not collected
            customer_state: "",
            customer_zip_code: customer.zip_code.as_deref().unwrap_or(""),
        }
    }
}

#[async_trait]
impl PaymentGateway for CinetPayClient {
    async fn initiate_payment(&self, request: PaymentRequest) -> GatewayResult<PaymentSession> {
        let body = self.initiation_body(&request);

        tracing::debug!(
            transaction_id = %request.transaction_id,
            amount = request.amount,
            currency = %request.currency,
            "Creating CinetPay checkout"
        );

        let text = self.post("/v2/payment", &body).await?;
        parse_initiation(&text)
    }

    async fn check_payment_status(&self, transaction_id: &str) -> GatewayResult<StatusReport> {
        let body = CheckBody {
            apikey: &self.api_key,
            site_id: &self.site_id,
            transaction_id,
        };
        let text = self.post("/v2/payment/check", &body).await?;
        parse_status_report(&text)
    }

    fn verify_webhook_signature(&self, payload: &WebhookPayload) -> bool {
        if let Some(site_id) = payload.cpm_site_id.as_deref() {
            if site_id != self.site_id {
                return false;
            }
        }
        self.signer.verify(payload)
    }

    fn name(&self) -> &str {
        GATEWAY_NAME
    }

    fn supports_currency(&self, currency: Currency) -> bool {
        matches!(
            currency,
            Currency::XOF | Currency::XAF | Currency::CDF | Currency::GNF | Currency::USD
        )
    }
}

fn unavailable(message: String) -> GatewayError {
    GatewayError::Unavailable {
        gateway: GATEWAY_NAME.to_string(),
        message,
    }
}

fn invalid(message: impl Into<String>) -> GatewayError {
    GatewayError::InvalidResponse {
        gateway: GATEWAY_NAME.to_string(),
        message: message.into(),
    }
}

fn string_field(data: &Value, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse the body of a payment creation call
pub(crate) fn parse_initiation(body: &str) -> GatewayResult<PaymentSession> {
    let raw: Value = serde_json::from_str(body).map_err(|e| invalid(e.to_string()))?;
    let envelope: Envelope = serde_json::from_value(raw.clone()).map_err(|e| invalid(e.to_string()))?;

    let code = envelope.code();
    if code != CODE_CREATED {
        return Err(GatewayError::Rejected {
            gateway: GATEWAY_NAME.to_string(),
            message: envelope.error_message(),
            code,
        });
    }

    let data = envelope
        .data
        .as_ref()
        .ok_or_else(|| invalid("missing data block"))?;
    let payment_url =
        string_field(data, "payment_url").ok_or_else(|| invalid("missing payment_url"))?;
    let payment_token =
        string_field(data, "payment_token").ok_or_else(|| invalid("missing payment_token"))?;

    Ok(PaymentSession {
        payment_url,
        payment_token,
        raw,
    })
}

/// Parse the body of a status check
///
/// Refused payments come back with a non-success code but still carry a
/// `data.status`, so the data block wins over the envelope code.
pub(crate) fn parse_status_report(body: &str) -> GatewayResult<StatusReport> {
    let raw: Value = serde_json::from_str(body).map_err(|e| invalid(e.to_string()))?;
    let envelope: Envelope = serde_json::from_value(raw.clone()).map_err(|e| invalid(e.to_string()))?;

    let Some(status) = envelope
        .data
        .as_ref()
        .and_then(|data| string_field(data, "status"))
    else {
        let code = envelope.code();
        if code == CODE_SUCCESS {
            return Err(invalid("missing data.status"));
        }
        return Err(GatewayError::Rejected {
            gateway: GATEWAY_NAME.to_string(),
            message: envelope.error_message(),
            code,
        });
    };

    let data = envelope.data.as_ref().unwrap_or(&Value::Null);
    Ok(StatusReport {
        status: GatewayTransactionStatus::parse(&status),
        amount: string_field(data, "amount").and_then(|a| parse_amount(&a)),
        currency: string_field(data, "currency"),
        payment_method: string_field(data, "payment_method"),
        operator_id: string_field(data, "operator_id"),
        payment_date: string_field(data, "payment_date"),
        raw,
    })
}

/// The checkout rejects `#`, `$`, `&`, `_` and `/` in descriptions
fn sanitize_description(description: &str) -> String {
    let cleaned: String = description
        .chars()
        .map(|c| if matches!(c, '#' | '$' | '&' | '_' | '/') { ' ' } else { c })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
