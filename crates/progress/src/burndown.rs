//! Burndown table.
//!
//! One row per timetable entry: the weight of all tickets, split by status
//! category, with the projected completion dates at that point in time.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use serde::Serialize;
use tickethistory_core::{StatusCategory, Time, TicketInfo, Timetable, TimetableConfig};

use crate::error::{ProgressError, Result};
use crate::estimator::CompletionEstimator;

/// Requested burndown period, as given by the user.
#[derive(Debug, Clone, Default)]
pub struct BurndownOptions {
    /// First day
    pub start: Option<NaiveDate>,
    /// Last day; defaults to today
    pub end: Option<NaiveDate>,
    /// Day to highlight; defaults to today
    pub today: Option<NaiveDate>,
}

impl BurndownOptions {
    /// Validate the options against the current date.
    ///
    /// A start date is required. An end date not after the start becomes the
    /// day after the start.
    pub fn resolve(&self, current_date: NaiveDate) -> Result<BurndownRange> {
        let start = self.start.ok_or(ProgressError::MissingStartDate)?;
        let mut end = self.end.unwrap_or(current_date);
        if end <= start {
            end = start + Duration::days(1);
        }
        Ok(BurndownRange {
            start,
            end,
            today: self.today.unwrap_or(current_date),
        })
    }
}

/// Validated burndown period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurndownRange {
    /// First day
    pub start: NaiveDate,
    /// Last day, after `start`
    pub end: NaiveDate,
    /// Highlighted day
    pub today: NaiveDate,
}

impl BurndownRange {
    /// Start of the first day.
    pub fn start_time(&self) -> Time {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    /// An empty timetable with one entry per day of the range.
    pub fn timetable(&self) -> Timetable {
        Timetable::daily(self.start, self.end)
    }
}

/// One day of the burndown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BurndownRow {
    /// Day of the entry
    pub date: NaiveDate,
    /// Weight of all tickets
    pub total: f64,
    /// Weight not yet closed
    pub remaining: f64,
    /// Weight in new states
    pub new: f64,
    /// Weight in progress
    pub in_progress: f64,
    /// Weight closed
    pub done: f64,
    /// Projected completion in wall-clock time
    pub end: Option<NaiveDate>,
    /// Projected completion in business days; not computed on weekends
    pub workday_end: Option<NaiveDate>,
    /// Days from `date` to `workday_end`
    pub delta_days: Option<i64>,
    /// Entry falls on a weekend
    pub weekend: bool,
    /// Entry is the highlighted day
    pub today: bool,
}

/// Burndown rows for a filled timetable.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BurndownTable {
    /// Rows in timetable order
    pub rows: Vec<BurndownRow>,
}

impl BurndownTable {
    /// Build the rows for `timetable`, projecting from `start_time`.
    pub fn build(timetable: &Timetable, config: &TimetableConfig, start_time: Time, today: NaiveDate) -> Self {
        let estimator = CompletionEstimator;
        let rows: Vec<BurndownRow> = timetable
            .entries()
            .iter()
            .map(|entry| {
                let date = entry.end_time.date_naive();
                let weekend = date.weekday().num_days_from_monday() > 4;
                let weights = Weights::sum(&entry.tickets, config);
                let remaining = weights.total - weights.done;

                let end = estimator
                    .estimate_linear_completion(start_time, entry.end_time, weights.total, remaining)
                    .map(|t| t.date_naive());
                let workday_end = if weekend {
                    None
                } else {
                    estimator
                        .estimate_workday_completion(start_time, entry.end_time, weights.total, remaining)
                        .map(|t| t.date_naive())
                };

                BurndownRow {
                    date,
                    total: weights.total,
                    remaining,
                    new: weights.new,
                    in_progress: weights.total - weights.new - weights.done,
                    done: weights.done,
                    end,
                    workday_end,
                    delta_days: workday_end.map(|d| (d - date).num_days()),
                    weekend,
                    today: date == today,
                }
            })
            .collect();

        tracing::debug!(rows = rows.len(), "Built burndown table");
        Self { rows }
    }

    /// Smallest and largest workday projection offset over weekday rows.
    ///
    /// Both bounds start at 0.
    pub fn delta_range(&self) -> (i64, i64) {
        self.rows
            .iter()
            .filter(|r| !r.weekend)
            .filter_map(|r| r.delta_days)
            .fold((0, 0), |(lo, hi), d| (lo.min(d), hi.max(d)))
    }
}

#[derive(Default)]
struct Weights {
    total: f64,
    new: f64,
    done: f64,
}

impl Weights {
    fn sum(tickets: &[TicketInfo], config: &TimetableConfig) -> Self {
        let mut weights = Self::default();
        for info in tickets {
            let estimate = info.value(&config.estimation_field).and_then(|v| v.as_f64());
            let weight = config.weight(estimate);
            weights.total += weight;
            match config.category(info.status.as_deref()) {
                StatusCategory::New => weights.new += weight,
                StatusCategory::Closed => weights.done += weight,
                StatusCategory::InProgress => {}
            }
        }
        weights
    }
}
