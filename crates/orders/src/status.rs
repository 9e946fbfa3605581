//! Customer order line lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a customer order line, derived from its timestamps.
///
/// ```text
/// Pending ──► Placed ──► Received ──► Collected
/// ```
///
/// The ordinals are persisted by clients and must not change.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[repr(u8)]
pub enum OrderLineStatus {
    #[default]
    Pending = 0,
    Placed = 1,
    Received = 2,
    Collected = 3,
}

impl OrderLineStatus {
    /// Picks the furthest stage whose timestamp is set.
    pub fn derive(
        placed: Option<DateTime<Utc>>,
        received: Option<DateTime<Utc>>,
        collected: Option<DateTime<Utc>>,
    ) -> Self {
        if collected.is_some() {
            OrderLineStatus::Collected
        } else if received.is_some() {
            OrderLineStatus::Received
        } else if placed.is_some() {
            OrderLineStatus::Placed
        } else {
            OrderLineStatus::Pending
        }
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderLineStatus::Pending => "Pending",
            OrderLineStatus::Placed => "Placed",
            OrderLineStatus::Received => "Received",
            OrderLineStatus::Collected => "Collected",
        }
    }
}

impl std::fmt::Display for OrderLineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
