//! Business logic services for the payment server.
//!
//! # Services
//!
//! - `payments` - Order creation and checkout verification
//! - `notifications` - Fire-and-forget outbound events
//! - `validation` - Field-level validation errors shared with the routes

pub mod notifications;
pub mod payments;
pub mod validation;

pub use notifications::{LogNotifier, NotificationQueue, Notifier, NotifyError, OutboundEvent};
pub use payments::{
    CallerContext, CheckoutOptions, CreateOrderInput, CreatedOrder, PaymentError, PaymentService,
    VerifiedPayment, VerifyInput,
};
pub use validation::ValidationErrors;
