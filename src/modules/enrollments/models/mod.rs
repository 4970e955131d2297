pub mod enrollment;

pub use enrollment::{Enrollment, EnrollmentPaymentStatus, EnrollmentStatus};
