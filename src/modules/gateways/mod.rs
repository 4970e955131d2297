pub mod models;
pub mod services;

pub use models::{CanonicalStatus, GatewayTransactionStatus, WebhookPayload};
pub use services::{
    CinetPayClient, GatewayError, GatewayResult, PaymentGateway, PaymentRequest, PaymentSession,
    StatusReport, WebhookSigner,
};
