//! Locally generated receipt tokens.
//!
//! A receipt correlates a local payment order with the gateway's order. It is
//! generated before the gateway call and stored under a unique constraint.

use std::fmt;

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

/// Prefix on every generated receipt.
pub const RECEIPT_PREFIX: &str = "rcpt_";

/// Random alphanumeric characters after the prefix (62^14 possibilities).
const RECEIPT_RANDOM_LEN: usize = 14;

/// Receipt token sent with the gateway create-order call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Receipt(String);

impl Receipt {
    /// Generate a fresh receipt from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(RECEIPT_RANDOM_LEN)
            .map(char::from)
            .collect();
        Self(format!("{RECEIPT_PREFIX}{suffix}"))
    }

    /// Wrap a receipt read back from storage.
    #[must_use]
    pub const fn from_stored(receipt: String) -> Self {
        Self(receipt)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
