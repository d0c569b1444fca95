//! Ticket baselines and change events.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::TicketId;
use crate::value::FieldValue;
use crate::Time;

/// Name of the status field.
pub const STATUS_FIELD: &str = "status";
/// Name of the milestone (iteration) field.
pub const MILESTONE_FIELD: &str = "milestone";
/// Name of the identifier field.
pub const ID_FIELD: &str = "id";

/// A ticket as it exists now: the baseline that history is replayed against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket identifier
    pub id: TicketId,

    /// When the ticket was created
    pub created_at: Time,

    /// Current field values
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl Ticket {
    /// Create a ticket with no fields.
    pub fn new(id: impl Into<TicketId>, created_at: Time) -> Self {
        Self {
            id: id.into(),
            created_at,
            fields: BTreeMap::new(),
        }
    }

    /// Set a field value (builder style).
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Current value of a field; [`FieldValue::Absent`] when unknown.
    pub fn field(&self, name: &str) -> &FieldValue {
        const ABSENT: &FieldValue = &FieldValue::Absent;
        self.fields.get(name).unwrap_or(ABSENT)
    }
}

/// A single recorded change of one ticket field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Changed field
    pub field: String,

    /// When the change happened
    pub time: Time,

    /// Value before the change
    #[serde(default)]
    pub old_value: FieldValue,

    /// Value after the change
    #[serde(default)]
    pub new_value: FieldValue,
}

impl ChangeEvent {
    /// Create a change event.
    pub fn new(
        field: impl Into<String>,
        time: Time,
        old_value: impl Into<FieldValue>,
        new_value: impl Into<FieldValue>,
    ) -> Self {
        Self {
            field: field.into(),
            time,
            old_value: old_value.into(),
            new_value: new_value.into(),
        }
    }
}
