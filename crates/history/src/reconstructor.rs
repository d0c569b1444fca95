//! Replays a ticket's change log into chronological field-state deltas.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tickethistory_core::{BaselineCheck, ChangeEvent, FieldValue, Ticket, Time};
use tickethistory_storage::{ChangeLogProvider, FieldSet};
use tracing::{debug, warn};

use crate::error::{HistoryError, Result};

/// Field values changed at one instant.
pub type FieldDelta = BTreeMap<String, FieldValue>;

/// Complete field values at one instant.
pub type FieldState = BTreeMap<String, FieldValue>;

/// Chronological deltas of one ticket, seeded at creation time with its
/// reconstructed baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketHistory {
    ticket: Arc<Ticket>,
    deltas: BTreeMap<Time, FieldDelta>,
}

impl TicketHistory {
    /// The ticket this history belongs to.
    pub fn ticket(&self) -> &Arc<Ticket> {
        &self.ticket
    }

    /// Deltas keyed by time.
    pub fn deltas(&self) -> &BTreeMap<Time, FieldDelta> {
        &self.deltas
    }

    /// Field state right after each delta, oldest first.
    pub fn states(&self) -> impl Iterator<Item = (Time, FieldState)> + '_ {
        self.deltas.iter().scan(FieldState::new(), |state, (time, delta)| {
            state.extend(delta.iter().map(|(k, v)| (k.clone(), v.clone())));
            Some((*time, state.clone()))
        })
    }
}

/// Builds [`TicketHistory`] values from a change-log provider.
pub struct HistoryReconstructor<P: ?Sized> {
    provider: Arc<P>,
    baseline_check: BaselineCheck,
}

impl<P: ChangeLogProvider + ?Sized> HistoryReconstructor<P> {
    /// Create a reconstructor reading from `provider`.
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            baseline_check: BaselineCheck::default(),
        }
    }

    /// Set how gaps in the change log are handled.
    pub fn with_baseline_check(mut self, check: BaselineCheck) -> Self {
        self.baseline_check = check;
        self
    }

    /// Reconstruct the history of `fields` on `ticket`.
    ///
    /// The value of a field at creation time is the old value of its earliest
    /// recorded change; a field that never changed is assumed to have held its
    /// current value since creation. Changes sharing a timestamp form one delta.
    pub async fn build_history(&self, ticket: Arc<Ticket>, fields: &FieldSet) -> Result<TicketHistory> {
        let mut events = self.provider.changes(&ticket.id, fields).await?;
        events.sort_by_key(|e| e.time);

        if self.baseline_check != BaselineCheck::Assume {
            self.check_change_chains(&ticket, fields, &events)?;
        }

        let mut deltas: BTreeMap<Time, FieldDelta> = BTreeMap::new();
        deltas.insert(ticket.created_at, FieldDelta::new());
        let mut earliest: HashMap<&str, &FieldValue> = HashMap::new();
        for event in &events {
            deltas
                .entry(event.time)
                .or_default()
                .insert(event.field.clone(), event.new_value.clone());
            if !event.old_value.is_absent() {
                earliest.entry(event.field.as_str()).or_insert(&event.old_value);
            }
        }

        let baseline = deltas.entry(ticket.created_at).or_default();
        for field in fields.iter() {
            if baseline.get(field).is_some_and(|v| !v.is_absent()) {
                continue;
            }
            let value = earliest
                .get(field)
                .map(|v| (*v).clone())
                .unwrap_or_else(|| ticket.field(field).clone());
            baseline.insert(field.to_string(), value);
        }

        debug!(ticket = %ticket.id, changes = events.len(), deltas = deltas.len(), "Reconstructed ticket history");
        Ok(TicketHistory { ticket, deltas })
    }

    /// A field's changes must link up (each old value is the previous new
    /// value) and end at the ticket's current value.
    fn check_change_chains(&self, ticket: &Ticket, fields: &FieldSet, events: &[ChangeEvent]) -> Result<()> {
        for field in fields.iter() {
            let mut chain = events.iter().filter(|e| e.field == field).peekable();
            if chain.peek().is_none() {
                continue;
            }
            let mut previous: Option<&FieldValue> = None;
            let mut broken = false;
            for event in chain {
                if previous.is_some_and(|p| !same_value(p, &event.old_value)) {
                    broken = true;
                }
                previous = Some(&event.new_value);
            }
            let current = ticket.field(field);
            if !current.is_absent() && previous.is_some_and(|p| !same_value(p, current)) {
                broken = true;
            }
            if !broken {
                continue;
            }
            match self.baseline_check {
                BaselineCheck::Assume => {}
                BaselineCheck::Warn => {
                    warn!(ticket = %ticket.id, field, "Change log looks incomplete; baseline may be wrong")
                }
                BaselineCheck::Strict => {
                    return Err(HistoryError::IncompleteLog {
                        ticket: ticket.id.clone(),
                        field: field.to_string(),
                    })
                }
            }
        }
        Ok(())
    }
}

/// Trackers store "no value" as either NULL or an empty string, and numbers
/// as text.
fn same_value(a: &FieldValue, b: &FieldValue) -> bool {
    let empty = |v: &FieldValue| v.is_absent() || v.as_str() == Some("");
    if empty(a) || empty(b) {
        return empty(a) && empty(b);
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use tickethistory_core::TicketId;
    use tickethistory_storage::{MemoryStorage, StorageError};

    fn created() -> Time {
        Utc.with_ymd_and_hms(2017, 3, 6, 9, 0, 0).unwrap()
    }

    fn fields() -> FieldSet {
        FieldSet::new(["status", "milestone", "tm_estimate"]).unwrap()
    }

    fn ticket() -> Arc<Ticket> {
        Arc::new(
            Ticket::new(1u64, created())
                .with_field("status", "closed")
                .with_field("milestone", "sprint-1")
                .with_field("tm_estimate", "5"),
        )
    }

    fn storage() -> MemoryStorage {
        let t = created();
        MemoryStorage::new()
            .with_change(1u64, ChangeEvent::new("status", t + Duration::hours(2), "new", "assigned"))
            .with_change(1u64, ChangeEvent::new("tm_estimate", t + Duration::hours(2), "3", "5"))
            .with_change(1u64, ChangeEvent::new("status", t + Duration::hours(6), "assigned", "closed"))
    }

    #[tokio::test]
    async fn test_baseline_from_earliest_old_value() {
        let reconstructor = HistoryReconstructor::new(Arc::new(storage()));
        let history = reconstructor.build_history(ticket(), &fields()).await.unwrap();

        let baseline = &history.deltas()[&created()];
        assert_eq!(baseline["status"], FieldValue::text("new"));
        assert_eq!(baseline["tm_estimate"], FieldValue::text("3"));
        // never changed: current value held since creation
        assert_eq!(baseline["milestone"], FieldValue::text("sprint-1"));
    }

    #[tokio::test]
    async fn test_same_timestamp_coalesces() {
        let reconstructor = HistoryReconstructor::new(Arc::new(storage()));
        let history = reconstructor.build_history(ticket(), &fields()).await.unwrap();

        assert_eq!(history.deltas().len(), 3);
        let both = &history.deltas()[&(created() + Duration::hours(2))];
        assert_eq!(both.len(), 2);
    }

    #[tokio::test]
    async fn test_states_accumulate() {
        let reconstructor = HistoryReconstructor::new(Arc::new(storage()));
        let history = reconstructor.build_history(ticket(), &fields()).await.unwrap();

        let states: Vec<(Time, FieldState)> = history.states().collect();
        assert_eq!(states.len(), 3);
        assert_eq!(states[1].1["status"], FieldValue::text("assigned"));
        assert_eq!(states[1].1["milestone"], FieldValue::text("sprint-1"));
        assert_eq!(states[2].1["status"], FieldValue::text("closed"));
        assert_eq!(states[2].1["tm_estimate"], FieldValue::text("5"));
    }

    #[tokio::test]
    async fn test_change_at_creation_wins() {
        let storage = MemoryStorage::new()
            .with_change(1u64, ChangeEvent::new("status", created(), "", "assigned"))
            .with_change(1u64, ChangeEvent::new("status", created() + Duration::hours(1), "assigned", "closed"));
        let reconstructor = HistoryReconstructor::new(Arc::new(storage));
        let history = reconstructor.build_history(ticket(), &fields()).await.unwrap();
        assert_eq!(history.deltas()[&created()]["status"], FieldValue::text("assigned"));
    }

    #[tokio::test]
    async fn test_strict_rejects_broken_chain() {
        let storage = storage().with_change(
            1u64,
            ChangeEvent::new("status", created() + Duration::hours(9), "reopened", "closed"),
        );
        let reconstructor = HistoryReconstructor::new(Arc::new(storage.clone()))
            .with_baseline_check(BaselineCheck::Strict);
        let err = reconstructor.build_history(ticket(), &fields()).await.unwrap_err();
        assert!(matches!(err, HistoryError::IncompleteLog { ref field, .. } if field == "status"));

        // other modes still reconstruct
        for check in [BaselineCheck::Assume, BaselineCheck::Warn] {
            let reconstructor = HistoryReconstructor::new(Arc::new(storage.clone())).with_baseline_check(check);
            assert!(reconstructor.build_history(ticket(), &fields()).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_strict_accepts_consistent_log() {
        let reconstructor =
            HistoryReconstructor::new(Arc::new(storage())).with_baseline_check(BaselineCheck::Strict);
        assert!(reconstructor.build_history(ticket(), &fields()).await.is_ok());
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        struct Unavailable;

        #[async_trait]
        impl ChangeLogProvider for Unavailable {
            async fn changes(&self, _ticket: &TicketId, _fields: &FieldSet) -> tickethistory_storage::Result<Vec<ChangeEvent>> {
                Err(StorageError::Database("connection refused".to_string()))
            }
        }

        let reconstructor = HistoryReconstructor::new(Arc::new(Unavailable));
        let err = reconstructor.build_history(ticket(), &fields()).await.unwrap_err();
        assert!(matches!(err, HistoryError::Storage(StorageError::Database(_))));
    }

    #[test]
    fn test_same_value() {
        assert!(same_value(&FieldValue::Absent, &FieldValue::text("")));
        assert!(same_value(&FieldValue::text("3"), &FieldValue::Number(3.0)));
        assert!(!same_value(&FieldValue::text("new"), &FieldValue::Absent));
        assert!(!same_value(&FieldValue::text("new"), &FieldValue::text("closed")));
    }
}
