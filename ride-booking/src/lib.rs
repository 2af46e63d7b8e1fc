pub mod payment;
pub mod state_machine;

pub use payment::{MockPaymentGateway, PaymentReconciler};
pub use state_machine::BookingStateMachine;
