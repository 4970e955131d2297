// Test Helper Modules
//
// Shared fixtures for the integration suites: a scripted gateway double,
// enrollment seeding, bearer tokens and signed callbacks.
//
// Usage:
//   #[path = "../helpers/mod.rs"]
//   mod helpers;
//   use helpers::*;

#![allow(dead_code)]

pub mod test_data;

pub use fake_gateway::*;
pub use test_data::*;

/// Initialise the full application around a `TestContext`, with bearer
/// authentication mounted as `main` does
#[macro_export]
macro_rules! init_app {
    ($ctx:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(enrollpay::middleware::TokenAuth::new(
                    $ctx.state.token_verifier.clone(),
                ))
                .configure(|cfg| $ctx.state.configure(cfg)),
        )
        .await
    };
}
