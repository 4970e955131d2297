pub mod auth;
pub mod error_handler;
pub mod rate_limit;
pub mod request_id;

pub use auth::{Caller, Role, TokenAuth, TokenVerifier};
pub use error_handler::{form_config, json_config};
pub use rate_limit::RateLimiter;
pub use request_id::{RequestId, RequestIdValue};
