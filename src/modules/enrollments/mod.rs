pub mod controllers;
pub mod models;
pub mod services;

pub use controllers::configure;
pub use models::{Enrollment, EnrollmentPaymentStatus, EnrollmentStatus};
pub use services::EnrollmentService;
