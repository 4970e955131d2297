pub mod cinetpay;
pub mod gateway_trait;
pub mod signature;

pub use cinetpay::CinetPayClient;
pub use gateway_trait::{
    GatewayError, GatewayResult, PaymentGateway, PaymentRequest, PaymentSession, StatusReport,
};
pub use signature::WebhookSigner;
