//! Change-log and ticket source abstractions.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tickethistory_core::{ChangeEvent, Ticket, TicketId, MILESTONE_FIELD};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Field name that is not a plain identifier
    #[error("invalid field name: {0:?}")]
    InvalidField(String),

    /// Stored timestamp that cannot be converted
    #[error("invalid timestamp {raw} for ticket {ticket}")]
    InvalidTimestamp {
        /// Ticket the change belongs to
        ticket: TicketId,
        /// Raw stored value
        raw: i64,
    },

    /// Database backend error
    #[error("database error: {0}")]
    Database(String),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Whether `name` may be used as a field name in a backing query.
pub fn is_valid_field_name(name: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9._]+$").expect("field name regex should be valid"))
        .is_match(name)
}

/// A validated set of field names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet(BTreeSet<String>);

impl FieldSet {
    /// Validate and collect field names.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = BTreeSet::new();
        for name in names {
            let name = name.into();
            if !is_valid_field_name(&name) {
                return Err(StorageError::InvalidField(name));
            }
            set.insert(name);
        }
        Ok(Self(set))
    }

    /// Whether the set contains `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// Field names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Selection of tickets to load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketQuery {
    /// Only tickets that belong, or at any time belonged, to this milestone
    pub milestone: Option<String>,

    /// Only tickets with these ids
    pub ids: Option<Vec<TicketId>>,
}

impl TicketQuery {
    /// Query for tickets that were ever part of `milestone`.
    pub fn milestone(name: impl Into<String>) -> Self {
        Self {
            milestone: Some(name.into()),
            ids: None,
        }
    }

    /// Whether `ticket` matches, given its recorded changes.
    pub fn matches(&self, ticket: &Ticket, changes: &[ChangeEvent]) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&ticket.id) {
                return false;
            }
        }
        let Some(milestone) = self.milestone.as_deref() else {
            return true;
        };
        ticket.field(MILESTONE_FIELD).as_str() == Some(milestone)
            || changes.iter().any(|c| {
                c.field == MILESTONE_FIELD
                    && (c.old_value.as_str() == Some(milestone) || c.new_value.as_str() == Some(milestone))
            })
    }
}

/// Ordering of tickets returned by sources: numeric ids first, in numeric order.
pub fn sort_tickets(tickets: &mut [Ticket]) {
    tickets.sort_by(|a, b| a.id.cmp(&b.id));
}

/// Source of recorded field changes.
#[async_trait]
pub trait ChangeLogProvider: Send + Sync {
    /// All recorded changes of `fields` on `ticket`, oldest first.
    async fn changes(&self, ticket: &TicketId, fields: &FieldSet) -> Result<Vec<ChangeEvent>>;
}

/// Source of ticket baselines.
#[async_trait]
pub trait TicketSource: Send + Sync {
    /// Tickets matching `query`, with their current field values.
    async fn list_tickets(&self, query: &TicketQuery) -> Result<Vec<Ticket>>;
}
