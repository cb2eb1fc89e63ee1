//! Domain models for the payment server.

pub mod payment_order;

pub use payment_order::{NewPaymentOrder, PaymentOrder, TransitionError};
