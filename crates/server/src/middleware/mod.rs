//! HTTP middleware and extractors for the payment server.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. CORS (browser checkout origins)
//! 3. `TraceLayer` (request tracing)
//! 4. Request ID (add unique ID to each request)
//!
//! # Extractors
//!
//! - [`ClientIp`] - caller address behind Cloudflare or a load balancer
//! - [`OptionalUser`] - user id from the trusted proxy header
//! - [`RequestId`] - id assigned by [`request_id_middleware`]

pub mod auth;
pub mod client_ip;
pub mod request_id;

pub use auth::OptionalUser;
pub use client_ip::ClientIp;
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
