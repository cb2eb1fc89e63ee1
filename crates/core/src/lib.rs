//! Payflow Core - Shared domain types.
//!
//! This crate provides the types shared by the payment server, the CLI and
//! the integration tests:
//! - `server` - Payment order HTTP service
//! - `cli` - Migrations, seeding and order inspection
//!
//! # Architecture
//!
//! The core crate contains only types and their invariants - no database
//! access, no HTTP clients. Amount conversion and status transitions live
//! here so every component applies the same rules.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, money, statuses, receipts and metadata

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
