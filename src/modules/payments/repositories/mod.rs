pub mod memory_store;
pub mod mysql_store;
pub mod payment_store;

pub use memory_store::InMemoryPaymentStore;
pub use mysql_store::MySqlPaymentStore;
pub use payment_store::{EnrollmentChange, PaymentStore};
