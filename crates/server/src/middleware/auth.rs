//! Caller identity extractors.
//!
//! Authentication happens upstream. When `PAYFLOW_TRUSTED_USER_HEADER` is
//! configured, the auth proxy in front of this service puts the signed-in
//! user's id in that header and [`OptionalUser`] reads it. The header must
//! be stripped from client traffic by the proxy.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use payflow_core::UserId;

use crate::error::set_sentry_user;
use crate::state::AppState;

/// Extractor that optionally gets the initiating user.
///
/// Never rejects: a missing, unconfigured or malformed header yields `None`.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(OptionalUser(user_id): OptionalUser) -> impl IntoResponse {
///     match user_id {
///         Some(id) => format!("Hello, user {id}!"),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionalUser(pub Option<UserId>);

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(header) = state.trusted_user_header() else {
            return Ok(Self(None));
        };

        let Some(raw) = parts.headers.get(header) else {
            return Ok(Self(None));
        };

        let parsed = raw
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|id| *id > 0);

        match parsed {
            Some(id) => {
                let user_id = UserId::new(id);
                set_sentry_user(&user_id);
                Ok(Self(Some(user_id)))
            }
            None => {
                warn!(header = %header, "Ignoring malformed trusted user header");
                Ok(Self(None))
            }
        }
    }
}
