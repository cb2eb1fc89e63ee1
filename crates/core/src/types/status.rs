//! Payment order status and its forward-only transition rule.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Status of a local payment order.
///
/// Mirrors the payment statuses reported by the gateway. Statuses the gateway
/// introduces later are kept verbatim in [`PaymentStatus::Other`] instead of
/// being rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentStatus {
    /// Order raised with the gateway, no payment attempted yet.
    #[default]
    Created,
    /// Payment authorized but not yet captured.
    Authorized,
    /// Payment captured; funds will settle.
    Captured,
    /// Payment refunded after capture.
    Refunded,
    /// Payment failed.
    Failed,
    /// Any status the gateway reports that is not listed above.
    Other(String),
}

impl PaymentStatus {
    /// The status string as stored and as reported by the gateway.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "created",
            Self::Authorized => "authorized",
            Self::Captured => "captured",
            Self::Refunded => "refunded",
            Self::Failed => "failed",
            Self::Other(status) => status,
        }
    }

    /// Whether no further transition may leave this status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Captured | Self::Refunded | Self::Failed)
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Authorized | Self::Other(_) => 1,
            Self::Captured | Self::Refunded | Self::Failed => 2,
        }
    }

    /// Whether an order in this status may move to `next`.
    ///
    /// Terminal statuses never move. Otherwise the status may stay as it is
    /// or advance to a later stage. Two different intermediate statuses may
    /// not replace each other.
    #[must_use]
    pub fn can_transition_to(&self, next: &Self) -> bool {
        !self.is_terminal() && (next == self || next.rank() > self.rank())
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for PaymentStatus {
    fn from(s: &str) -> Self {
        match s {
            "created" => Self::Created,
            "authorized" => Self::Authorized,
            "captured" => Self::Captured,
            "refunded" => Self::Refunded,
            "failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<PaymentStatus> for String {
    fn from(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Other(status) => status,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}
