pub mod gateway_status;
pub mod webhook_payload;

pub use gateway_status::{CanonicalStatus, GatewayTransactionStatus};
pub use webhook_payload::{parse_amount, WebhookPayload};
