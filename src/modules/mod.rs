pub mod enrollments;
pub mod gateways;
pub mod health;
pub mod payments;
