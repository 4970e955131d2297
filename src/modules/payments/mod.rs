pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use controllers::configure;
pub use models::{Payment, PaymentStatus};
pub use repositories::{InMemoryPaymentStore, MySqlPaymentStore, PaymentStore};
pub use services::{EnrollmentReconciler, PaymentService, WebhookService};
