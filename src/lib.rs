//! Enrollment payment service
//!
//! Payment initiation, gateway webhook reconciliation and manual verification
//! for training enrollments.

pub mod app;
pub mod config;
pub mod core;
pub mod middleware;
pub mod modules;
pub mod telemetry;

// Re-export commonly used types
pub use app::AppState;
pub use modules::enrollments;
pub use modules::gateways;
pub use modules::payments;
