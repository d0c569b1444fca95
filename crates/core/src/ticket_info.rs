//! Per-bucket ticket snapshots.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::id::TicketId;
use crate::ticket::{Ticket, MILESTONE_FIELD, STATUS_FIELD};
use crate::value::FieldValue;
use crate::Time;

/// State of one ticket as of one timetable bucket.
///
/// Snapshots are never mutated once they are placed into an entry. Forward
/// filling clones them; the baseline ticket is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketInfo {
    /// Baseline of the ticket this snapshot belongs to
    pub ticket: Arc<Ticket>,

    /// Time of the last change folded into this snapshot
    pub time: Time,

    /// Status at snapshot time
    pub status: Option<String>,

    /// Milestone at snapshot time
    pub milestone: Option<String>,

    /// Other tracked fields at snapshot time
    pub values: BTreeMap<String, FieldValue>,
}

impl TicketInfo {
    /// Build a snapshot from an accumulated field state. `status` and
    /// `milestone` are lifted out of the map.
    pub fn from_state(
        ticket: Arc<Ticket>,
        time: Time,
        mut state: BTreeMap<String, FieldValue>,
    ) -> Self {
        let status = state.remove(STATUS_FIELD).and_then(FieldValue::into_text);
        let milestone = state.remove(MILESTONE_FIELD).and_then(FieldValue::into_text);
        Self {
            ticket,
            time,
            status,
            milestone,
            values: state,
        }
    }

    /// Ticket id.
    pub fn id(&self) -> &TicketId {
        &self.ticket.id
    }

    /// Value of a field at snapshot time, falling back to the ticket's current
    /// value for fields that were not tracked. A tracked field that was empty
    /// at snapshot time has no value.
    pub fn value(&self, name: &str) -> Option<FieldValue> {
        if let Some(v) = self.values.get(name) {
            return Some(v.clone()).filter(|v| !v.is_absent());
        }
        match name {
            STATUS_FIELD => self.status.clone().map(FieldValue::Text),
            MILESTONE_FIELD => self.milestone.clone().map(FieldValue::Text),
            _ => Some(self.ticket.field(name).clone()).filter(|v| !v.is_absent()),
        }
    }

    /// Value of a field, or `default` when the field is unknown or empty.
    pub fn value_or(&self, name: &str, default: impl Into<FieldValue>) -> FieldValue {
        self.value(name).unwrap_or_else(|| default.into())
    }

    /// Numeric value of a field, or `default` when it is missing or not a number.
    pub fn number_or(&self, name: &str, default: f64) -> f64 {
        self.value(name).and_then(|v| v.as_f64()).unwrap_or(default)
    }

    /// Whether the status is one of `states`.
    pub fn status_in(&self, states: &[String]) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| states.iter().any(|st| st == s))
    }
}
