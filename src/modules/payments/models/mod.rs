pub mod customer;
pub mod payment;
pub mod transaction_id;
pub mod transition;

pub use customer::Customer;
pub use payment::{ClientContext, Payment, PaymentGatewayKind, PaymentStatus};
pub use transaction_id::generate_transaction_id;
pub use transition::{plan_transition, Transition, TransitionOutcome, TransitionPlan};
