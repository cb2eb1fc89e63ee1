//! Core types for Payflow.
//!
//! This module provides type-safe wrappers for payment domain concepts.

pub mod id;
pub mod metadata;
pub mod money;
pub mod receipt;
pub mod status;

pub use id::*;
pub use metadata::Metadata;
pub use money::{AmountError, CurrencyCode, MinorUnits, Money};
pub use receipt::Receipt;
pub use status::PaymentStatus;
