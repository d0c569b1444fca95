//! Identifiers for tracked tickets.

use serde::{Deserialize, Serialize};

/// Identifier of a ticket.
///
/// Ticket ids come from the external tracker and are treated as opaque. Ids
/// order numerically when they are numbers, and numeric ids sort before the
/// rest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    /// Create a ticket id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id as a number, if the tracker uses numeric ids.
    pub fn numeric(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl Ord for TicketId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let key = |id: &Self| (id.numeric().is_none(), id.numeric());
        key(self).cmp(&key(other)).then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for TicketId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TicketId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TicketId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u64> for TicketId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl From<i64> for TicketId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl std::str::FromStr for TicketId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}
