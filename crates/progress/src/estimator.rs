//! Completion time estimation.
//!
//! Both estimators derive a rate from the work done between `start` and `now`
//! and extrapolate the remaining work. `None` means there is not enough data
//! for an estimate: nothing has been completed yet, or too little time passed.

use chrono::Duration;
use tickethistory_core::Time;

use crate::workdays::{add_workdays, adjusted_end, adjusted_start, workday_duration};

/// Completion time estimator.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionEstimator;

impl CompletionEstimator {
    /// Estimate completion in wall-clock time.
    ///
    /// The rate is work done per elapsed hour; fewer than one elapsed hour
    /// gives no estimate. The result is `now` plus the remaining hours,
    /// rounded up.
    pub fn estimate_linear_completion(&self, start: Time, now: Time, total: f64, remaining: f64) -> Option<Time> {
        let done = total - remaining;
        if !(done > 0.0) {
            return None;
        }
        let hours = (now - start).num_seconds() as f64 / 3600.0;
        if !(hours >= 1.0) {
            return None;
        }
        let per_hour = done / hours;
        let more_hours = (remaining / per_hour).ceil().max(0.0);
        now.checked_add_signed(Duration::try_hours(more_hours as i64)?)
    }

    /// Estimate completion in business days.
    ///
    /// The rate is work done per elapsed business day between the adjusted
    /// `start` and `now`; a non-positive elapsed time gives no estimate. The
    /// remaining business days are counted from `now` (moved off a weekend).
    pub fn estimate_workday_completion(&self, start: Time, now: Time, total: f64, remaining: f64) -> Option<Time> {
        let done = total - remaining;
        if !(done > 0.0) {
            return None;
        }
        let days = workday_duration(adjusted_start(start), adjusted_end(now));
        if !(days > 0.0) {
            return None;
        }
        let per_day = done / days;
        let more_days = (remaining / per_day).max(0.0);
        add_workdays(adjusted_start(now), more_days)
    }
}
