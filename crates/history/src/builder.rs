//! Fills a timetable with per-bucket ticket snapshots.
//!
//! Each ticket's history is walked in time order. Whenever the walk crosses
//! into a later bucket, the state accumulated so far is emitted into the
//! bucket being left; the final state goes into the last bucket reached.
//! Changes after the last bucket are dropped. Afterwards every ticket is
//! carried forward through buckets in which it did not change, and the
//! optional snapshot filter is applied.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tickethistory_core::{
    Ticket, TicketInfo, Time, Timetable, TimetableConfig, ID_FIELD, MILESTONE_FIELD, STATUS_FIELD,
};
use tickethistory_storage::{ChangeLogProvider, FieldSet};
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::reconstructor::{FieldState, HistoryReconstructor, TicketHistory};

/// Predicate deciding whether a snapshot stays in the timetable.
pub type SnapshotFilter = Arc<dyn Fn(&TicketInfo) -> bool + Send + Sync>;

/// Populates timetables from ticket histories.
pub struct TimetableBuilder<P: ?Sized> {
    reconstructor: HistoryReconstructor<P>,
    concurrency: usize,
    filter: Option<SnapshotFilter>,
}

impl<P: ChangeLogProvider + ?Sized> TimetableBuilder<P> {
    /// Create a builder reading change logs from `provider`.
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            reconstructor: HistoryReconstructor::new(provider),
            concurrency: 1,
            filter: None,
        }
    }

    /// Create a builder using the concurrency and baseline settings of `config`.
    pub fn from_config(provider: Arc<P>, config: &TimetableConfig) -> Self {
        Self {
            reconstructor: HistoryReconstructor::new(provider).with_baseline_check(config.baseline_check),
            concurrency: config.history_concurrency.max(1),
            filter: None,
        }
    }

    /// Number of tickets whose history is fetched concurrently.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Keep only snapshots accepted by `filter`.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&TicketInfo) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Fill `timetable` with snapshots of `tickets`.
    ///
    /// `field_names` lists the fields to track; status and milestone are
    /// always tracked and the id is never tracked. Does nothing when either
    /// the tickets or the timetable are empty. If any history cannot be
    /// reconstructed the error is returned and `timetable` is left as it was.
    pub async fn fill_ticket_timetable<S: AsRef<str>>(
        &self,
        tickets: &[Ticket],
        timetable: &mut Timetable,
        field_names: &[S],
    ) -> Result<()> {
        if tickets.is_empty() || timetable.is_empty() {
            return Ok(());
        }
        let fields = tracked_fields(field_names)?;

        let mut seen = HashSet::new();
        let unique: Vec<Arc<Ticket>> = tickets
            .iter()
            .filter(|t| {
                let first = seen.insert(t.id.clone());
                if !first {
                    warn!(ticket = %t.id, "Ignoring duplicate ticket");
                }
                first
            })
            .map(|t| Arc::new(t.clone()))
            .collect();

        let histories: Vec<TicketHistory> = stream::iter(unique)
            .map(|ticket| self.reconstructor.build_history(ticket, &fields))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        timetable.sort();

        let mut placed = 0usize;
        for history in &histories {
            for (idx, info) in place_history(history, timetable) {
                timetable.entries_mut()[idx].tickets.push(info);
                placed += 1;
            }
        }

        timetable.propagate_forward();
        if let Some(filter) = &self.filter {
            timetable.retain_tickets(|info| filter(info));
        }

        debug!(
            tickets = histories.len(),
            snapshots = placed,
            entries = timetable.entries().len(),
            "Filled ticket timetable"
        );
        Ok(())
    }
}

/// Field set for a fill pass.
pub fn tracked_fields<S: AsRef<str>>(field_names: &[S]) -> Result<FieldSet> {
    let mut names: BTreeSet<String> = field_names.iter().map(|s| s.as_ref().to_string()).collect();
    names.insert(STATUS_FIELD.to_string());
    names.insert(MILESTONE_FIELD.to_string());
    names.remove(ID_FIELD);
    Ok(FieldSet::new(names)?)
}

/// Snapshots of one ticket and the indices of the entries they belong to.
///
/// The timetable must be sorted.
pub fn place_history(history: &TicketHistory, timetable: &Timetable) -> Vec<(usize, TicketInfo)> {
    let snapshot = |time: Time, state: FieldState| TicketInfo::from_state(history.ticket().clone(), time, state);

    let mut placed = Vec::new();
    let mut current: Option<(usize, Time, FieldState)> = None;
    for (time, state) in history.states() {
        let Some(idx) = timetable.entry_index_for_time(time) else {
            trace!(ticket = %history.ticket().id, %time, "Dropping changes after the last entry");
            break;
        };
        if let Some((prev_idx, prev_time, prev_state)) = current.take() {
            if prev_idx != idx {
                placed.push((prev_idx, snapshot(prev_time, prev_state)));
            }
        }
        current = Some((idx, time, state));
    }
    if let Some((idx, time, state)) = current {
        placed.push((idx, snapshot(time, state)));
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HistoryError;
    use crate::filter::in_milestone;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use tickethistory_core::{BaselineCheck, ChangeEvent, FieldValue, TicketId, TimetableEntry};
    use tickethistory_storage::{MemoryStorage, StorageError};

    fn at(day: u32, hour: u32) -> Time {
        Utc.with_ymd_and_hms(2017, 3, day, hour, 0, 0).unwrap()
    }

    /// Monday 2017-03-06 through Friday 2017-03-10, one bucket per day.
    fn week() -> Timetable {
        Timetable::daily(
            NaiveDate::from_ymd_opt(2017, 3, 6).unwrap(),
            NaiveDate::from_ymd_opt(2017, 3, 10).unwrap(),
        )
    }

    fn id(n: u64) -> TicketId {
        TicketId::from(n)
    }

    /// 1: created Tuesday, never changed.
    /// 2: created Monday in sprint-1, moved to sprint-2 on Wednesday.
    /// 3: created Monday, assigned and closed on Monday, reopened on Saturday.
    fn fixture() -> (Vec<Ticket>, MemoryStorage) {
        let tickets = vec![
            Ticket::new(1u64, at(7, 10))
                .with_field("status", "new")
                .with_field("milestone", "sprint-1")
                .with_field("tm_estimate", "2"),
            Ticket::new(2u64, at(6, 9))
                .with_field("status", "assigned")
                .with_field("milestone", "sprint-2")
                .with_field("tm_estimate", "3"),
            Ticket::new(3u64, at(6, 9))
                .with_field("status", "reopened")
                .with_field("milestone", "sprint-1")
                .with_field("summary", "Flaky test"),
        ];
        let storage = MemoryStorage::new()
            .with_change(2u64, ChangeEvent::new("milestone", at(8, 12), "sprint-1", "sprint-2"))
            .with_change(2u64, ChangeEvent::new("status", at(9, 8), "new", "assigned"))
            .with_change(3u64, ChangeEvent::new("status", at(6, 10), "new", "assigned"))
            .with_change(3u64, ChangeEvent::new("status", at(6, 15), "assigned", "closed"))
            .with_change(3u64, ChangeEvent::new("status", at(11, 9), "closed", "reopened"));
        (tickets, storage)
    }

    async fn filled(builder: &TimetableBuilder<MemoryStorage>) -> Timetable {
        let (tickets, _) = fixture();
        let mut timetable = week();
        builder
            .fill_ticket_timetable(&tickets, &mut timetable, &["tm_estimate"])
            .await
            .unwrap();
        timetable
    }

    fn status(timetable: &Timetable, entry: usize, ticket: u64) -> Option<String> {
        timetable.entries()[entry].ticket(&id(ticket)).and_then(|t| t.status.clone())
    }

    #[tokio::test]
    async fn test_unchanged_ticket_single_snapshot() {
        let (tickets, storage) = fixture();
        let reconstructor = HistoryReconstructor::new(Arc::new(storage));
        let fields = tracked_fields(&["tm_estimate"]).unwrap();
        let history = reconstructor
            .build_history(Arc::new(tickets[0].clone()), &fields)
            .await
            .unwrap();

        let placed = place_history(&history, &week());
        assert_eq!(placed.len(), 1);
        let (idx, info) = &placed[0];
        assert_eq!(*idx, 1);
        assert_eq!(info.status.as_deref(), Some("new"));
        assert_eq!(info.milestone.as_deref(), Some("sprint-1"));
        assert_eq!(info.values["tm_estimate"], FieldValue::text("2"));
    }

    #[tokio::test]
    async fn test_unchanged_ticket_in_single_bucket_timetable() {
        let (tickets, storage) = fixture();
        let builder = TimetableBuilder::new(Arc::new(storage));
        let mut timetable = Timetable::at(at(7, 23));
        builder
            .fill_ticket_timetable(&tickets[..1], &mut timetable, &["tm_estimate"])
            .await
            .unwrap();

        let snapshots: Vec<&TicketInfo> = timetable.entries().iter().flat_map(|e| &e.tickets).collect();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].values["tm_estimate"], FieldValue::text("2"));
    }

    #[tokio::test]
    async fn test_fill_places_and_forward_fills() {
        let (_, storage) = fixture();
        let timetable = filled(&TimetableBuilder::new(Arc::new(storage))).await;
        let e = timetable.entries();

        // ticket 1 appears from its creation day on
        assert!(!e[0].contains(&id(1)));
        assert!((1..5).all(|i| e[i].contains(&id(1))));

        // ticket 3 is closed by the end of Monday; Saturday's reopen is dropped
        assert_eq!(status(&timetable, 0, 3).as_deref(), Some("closed"));
        assert_eq!(status(&timetable, 4, 3).as_deref(), Some("closed"));

        // ticket 2 moves on Wednesday and is assigned on Thursday
        assert_eq!(e[1].ticket(&id(2)).and_then(|t| t.milestone.as_deref()), Some("sprint-1"));
        assert_eq!(e[2].ticket(&id(2)).and_then(|t| t.milestone.as_deref()), Some("sprint-2"));
        assert_eq!(status(&timetable, 2, 2).as_deref(), Some("new"));
        assert_eq!(status(&timetable, 3, 2).as_deref(), Some("assigned"));

        // untracked fields fall back to the current ticket
        assert_eq!(
            e[0].ticket(&id(3)).map(|t| t.value_or("summary", "")),
            Some(FieldValue::text("Flaky test"))
        );
    }

    #[tokio::test]
    async fn test_cleared_field_does_not_show_current_value() {
        let ticket = Ticket::new(4u64, at(6, 9))
            .with_field("status", "new")
            .with_field("tm_estimate", "5");
        let storage = MemoryStorage::new()
            .with_change(4u64, ChangeEvent::new("tm_estimate", at(7, 10), "3", FieldValue::Absent))
            .with_change(4u64, ChangeEvent::new("tm_estimate", at(9, 10), FieldValue::Absent, "5"));
        let builder = TimetableBuilder::new(Arc::new(storage));
        let mut timetable = week();
        builder
            .fill_ticket_timetable(&[ticket], &mut timetable, &["tm_estimate"])
            .await
            .unwrap();

        let estimate = |entry: usize| {
            timetable.entries()[entry]
                .ticket(&id(4))
                .map(|t| t.value_or("tm_estimate", "default"))
        };
        assert_eq!(estimate(0), Some(FieldValue::text("3")));
        assert_eq!(estimate(1), Some(FieldValue::text("default")));
        assert_eq!(estimate(2), Some(FieldValue::text("default")));
        assert_eq!(estimate(3), Some(FieldValue::text("5")));
    }

    #[tokio::test]
    async fn test_milestone_filter_keeps_history_until_move() {
        let (_, storage) = fixture();
        let builder = TimetableBuilder::new(Arc::new(storage)).with_filter(in_milestone("sprint-1"));
        let timetable = filled(&builder).await;
        let e = timetable.entries();

        assert!(e[0].contains(&id(2)));
        assert!(e[1].contains(&id(2)));
        assert!((2..5).all(|i| !e[i].contains(&id(2))));
        // unaffected tickets stay
        assert!((0..5).all(|i| e[i].contains(&id(3))));
    }

    #[tokio::test]
    async fn test_contiguity_and_forward_fill_law() {
        let (_, storage) = fixture();
        let timetable = filled(&TimetableBuilder::new(Arc::new(storage))).await;

        for pair in timetable.entries().windows(2) {
            for earlier in &pair[0].tickets {
                let later = pair[1].ticket(earlier.id()).expect("ticket carried forward");
                if later.time == earlier.time {
                    assert_eq!(later.status, earlier.status);
                    assert_eq!(later.milestone, earlier.milestone);
                    assert_eq!(later.values, earlier.values);
                }
            }
            let ids: HashSet<&TicketId> = pair[1].tickets.iter().map(|t| t.id()).collect();
            assert_eq!(ids.len(), pair[1].tickets.len(), "one snapshot per ticket");
        }
    }

    #[tokio::test]
    async fn test_fill_is_idempotent() {
        let (_, storage) = fixture();
        let builder = TimetableBuilder::new(Arc::new(storage)).with_concurrency(4);
        let first = filled(&builder).await;
        let second = filled(&builder).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_ticket_created_after_end_is_absent() {
        let (_, storage) = fixture();
        let builder = TimetableBuilder::new(Arc::new(storage));
        let late = vec![Ticket::new(9u64, at(13, 9)).with_field("status", "new")];
        let mut timetable = week();
        builder
            .fill_ticket_timetable(&late, &mut timetable, &["tm_estimate"])
            .await
            .unwrap();
        assert!(timetable.entries().iter().all(|e| e.tickets.is_empty()));
    }

    #[tokio::test]
    async fn test_changes_before_start_clamp_to_first_entry() {
        let storage = MemoryStorage::new()
            .with_change(4u64, ChangeEvent::new("status", at(2, 9), "new", "assigned"))
            .with_change(4u64, ChangeEvent::new("status", at(7, 9), "assigned", "closed"));
        let tickets = vec![Ticket::new(4u64, at(1, 9)).with_field("status", "closed")];
        let builder = TimetableBuilder::new(Arc::new(storage));
        let mut timetable = week();
        builder
            .fill_ticket_timetable(&tickets, &mut timetable, &["status"])
            .await
            .unwrap();

        assert_eq!(status(&timetable, 0, 4).as_deref(), Some("assigned"));
        assert_eq!(status(&timetable, 1, 4).as_deref(), Some("closed"));
    }

    #[tokio::test]
    async fn test_empty_inputs_are_noop() {
        let (tickets, storage) = fixture();
        let builder = TimetableBuilder::new(Arc::new(storage));

        let mut empty = Timetable::new(None);
        builder.fill_ticket_timetable(&tickets, &mut empty, &["tm_estimate"]).await.unwrap();
        assert!(empty.is_empty());

        let mut timetable = week();
        builder.fill_ticket_timetable(&[], &mut timetable, &["tm_estimate"]).await.unwrap();
        assert!(timetable.entries().iter().all(|e| e.tickets.is_empty()));
    }

    #[tokio::test]
    async fn test_duplicate_tickets_placed_once() {
        let (tickets, storage) = fixture();
        let builder = TimetableBuilder::new(Arc::new(storage));
        let doubled: Vec<Ticket> = tickets.iter().chain(tickets.iter()).cloned().collect();
        let mut timetable = week();
        builder
            .fill_ticket_timetable(&doubled, &mut timetable, &["tm_estimate"])
            .await
            .unwrap();
        assert_eq!(timetable.entries()[4].tickets.len(), 3);
    }

    #[tokio::test]
    async fn test_failure_leaves_timetable_untouched() {
        struct FailsOn(TicketId);

        #[async_trait]
        impl ChangeLogProvider for FailsOn {
            async fn changes(
                &self,
                ticket: &TicketId,
                _fields: &FieldSet,
            ) -> tickethistory_storage::Result<Vec<ChangeEvent>> {
                if *ticket == self.0 {
                    Err(StorageError::Database("disk I/O error".to_string()))
                } else {
                    Ok(Vec::new())
                }
            }
        }

        let (tickets, _) = fixture();
        let builder = TimetableBuilder::new(Arc::new(FailsOn(id(3))));
        // unsorted, with a duplicate end time that sorting would merge
        let mut timetable = Timetable::new(Some(at(6, 0)));
        for end in [at(8, 23), at(7, 23), at(8, 23)] {
            timetable.push_entry(TimetableEntry::new(end));
        }
        let before = timetable.clone();
        let err = builder
            .fill_ticket_timetable(&tickets, &mut timetable, &["tm_estimate"])
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryError::Storage(_)));
        assert_eq!(timetable, before);
    }

    #[tokio::test]
    async fn test_strict_config_fails_batch() {
        let (tickets, storage) = fixture();
        let storage = storage.with_change(1u64, ChangeEvent::new("status", at(8, 9), "assigned", "closed"));
        let config = TimetableConfig {
            baseline_check: BaselineCheck::Strict,
            ..Default::default()
        };
        let builder = TimetableBuilder::from_config(Arc::new(storage), &config);
        let mut timetable = week();
        let err = builder
            .fill_ticket_timetable(&tickets, &mut timetable, &["tm_estimate"])
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryError::IncompleteLog { .. }));
    }

    #[tokio::test]
    async fn test_invalid_field_name_rejected() {
        let (tickets, storage) = fixture();
        let builder = TimetableBuilder::new(Arc::new(storage));
        let mut timetable = Timetable::new(None);
        timetable.push_entry(TimetableEntry::new(at(8, 23)));
        timetable.push_entry(TimetableEntry::new(at(7, 23)));
        let before = timetable.clone();
        let err = builder
            .fill_ticket_timetable(&tickets, &mut timetable, &["owner; DROP TABLE ticket"])
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryError::Storage(StorageError::InvalidField(_))));
        assert_eq!(timetable, before);
    }

    #[test]
    fn test_tracked_fields() {
        let fields = tracked_fields(&["id", "owner"]).unwrap();
        let names: Vec<&str> = fields.iter().collect();
        assert_eq!(names, vec!["milestone", "owner", "status"]);
    }
}
