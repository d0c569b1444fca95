//! Timetable model - ordered time buckets holding ticket snapshots.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate, NaiveTime};

use crate::id::TicketId;
use crate::ticket_info::TicketInfo;
use crate::Time;

/// A time bucket `(previous end, end_time]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimetableEntry {
    /// End of the period
    pub end_time: Time,

    /// Snapshots of the tickets alive at the end of the period
    pub tickets: Vec<TicketInfo>,
}

impl TimetableEntry {
    /// Create an empty entry.
    pub fn new(end_time: Time) -> Self {
        Self {
            end_time,
            tickets: Vec::new(),
        }
    }

    /// Snapshot of a ticket, if it is present in this entry.
    pub fn ticket(&self, id: &TicketId) -> Option<&TicketInfo> {
        self.tickets.iter().find(|t| t.id() == id)
    }

    /// Whether a ticket is present in this entry.
    pub fn contains(&self, id: &TicketId) -> bool {
        self.ticket(id).is_some()
    }
}

/// Ordered sequence of time buckets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timetable {
    start_time: Option<Time>,
    end_time: Option<Time>,
    entries: Vec<TimetableEntry>,
}

impl Timetable {
    /// Create an empty timetable with an optional configured start.
    pub fn new(start_time: Option<Time>) -> Self {
        Self {
            start_time,
            end_time: None,
            entries: Vec::new(),
        }
    }

    /// Create a timetable from bucket end times. The result is sorted.
    pub fn with_end_times(start_time: Option<Time>, end_times: impl IntoIterator<Item = Time>) -> Self {
        let mut timetable = Self::new(start_time);
        timetable.entries = end_times.into_iter().map(TimetableEntry::new).collect();
        timetable.sort();
        timetable
    }

    /// One bucket per calendar day (UTC) from `start` through `end`.
    ///
    /// The timetable starts at `start 00:00:00` and every bucket ends at the
    /// last microsecond of its day.
    pub fn daily(start: NaiveDate, end: NaiveDate) -> Self {
        let start_time = start.and_time(NaiveTime::MIN).and_utc();
        let end_times = start
            .iter_days()
            .take_while(|d| *d <= end)
            .map(|d| d.and_time(NaiveTime::MIN).and_utc() + Duration::days(1) - Duration::microseconds(1));
        Self::with_end_times(Some(start_time), end_times)
    }

    /// A single bucket ending at `time`, starting one day earlier.
    pub fn at(time: Time) -> Self {
        Self::with_end_times(Some(time - Duration::days(1)), [time])
    }

    /// Add a bucket. Call [`Timetable::sort`] before lookups.
    pub fn push_entry(&mut self, entry: TimetableEntry) {
        self.entries.push(entry);
    }

    /// Sort entries by end time, collapse duplicate end times and derive the
    /// start and end of the timetable.
    pub fn sort(&mut self) {
        self.entries.sort_by_key(|e| e.end_time);
        self.entries.dedup_by(|later, earlier| {
            if later.end_time == earlier.end_time {
                earlier.tickets.append(&mut later.tickets);
                true
            } else {
                false
            }
        });

        self.end_time = self.entries.last().map(|e| e.end_time);
        if let Some(first) = self.entries.first().map(|e| e.end_time) {
            self.start_time = Some(match self.start_time {
                Some(start) if start <= first => start,
                _ => first,
            });
        }
    }

    /// Start of the timetable.
    pub fn start_time(&self) -> Option<Time> {
        self.start_time
    }

    /// End of the last bucket.
    pub fn end_time(&self) -> Option<Time> {
        self.end_time
    }

    /// Entries in ascending end-time order.
    pub fn entries(&self) -> &[TimetableEntry] {
        &self.entries
    }

    /// Mutable access to the entries.
    pub fn entries_mut(&mut self) -> &mut [TimetableEntry] {
        &mut self.entries
    }

    /// Whether the timetable has no buckets.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the bucket containing `time`.
    ///
    /// Times before the start fall into the first bucket. Times after the last
    /// bucket have no entry.
    pub fn entry_index_for_time(&self, time: Time) -> Option<usize> {
        let (start, end) = (self.start_time?, self.end_time?);
        if time < start {
            return Some(0);
        }
        if time > end {
            return None;
        }
        let idx = self.entries.partition_point(|e| e.end_time < time);
        (idx < self.entries.len()).then_some(idx)
    }

    /// Bucket containing `time`.
    pub fn entry_for_time(&self, time: Time) -> Option<&TimetableEntry> {
        self.entry_index_for_time(time).map(|i| &self.entries[i])
    }

    /// Carry every ticket present in an entry into the next one when it is
    /// missing there. Runs front to back, so a ticket is carried across any
    /// number of quiet buckets.
    pub fn propagate_forward(&mut self) {
        for i in 1..self.entries.len() {
            let (done, rest) = self.entries.split_at_mut(i);
            let prev = &done[i - 1];
            let curr = &mut rest[0];
            let present: HashSet<TicketId> = curr.tickets.iter().map(|t| t.id().clone()).collect();
            let carried: Vec<TicketInfo> = prev
                .tickets
                .iter()
                .filter(|t| !present.contains(t.id()))
                .cloned()
                .collect();
            curr.tickets.extend(carried);
        }
    }

    /// Drop every snapshot rejected by `keep`.
    pub fn retain_tickets<F>(&mut self, mut keep: F)
    where
        F: FnMut(&TicketInfo) -> bool,
    {
        for entry in &mut self.entries {
            entry.tickets.retain(|t| keep(t));
        }
    }
}
