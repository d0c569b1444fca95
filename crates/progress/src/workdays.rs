//! Business-day calendar arithmetic.
//!
//! Weekdays (Monday to Friday) are business days. Durations are measured in
//! days with the time of day as a fraction.

use chrono::{Datelike, Duration, NaiveTime};
use tickethistory_core::Time;

const SECONDS_PER_DAY: f64 = 86_400.0;
const MILLIS_PER_DAY: i64 = 86_400_000;
const LAST_WORKDAY: i64 = 4;

fn weekday(t: Time) -> i64 {
    i64::from(t.weekday().num_days_from_monday())
}

fn midnight(t: Time) -> Time {
    t.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Whether `t` falls on a Saturday or Sunday.
pub fn is_weekend(t: Time) -> bool {
    weekday(t) > LAST_WORKDAY
}

/// Move a weekend instant forward to the following Monday 00:00:00.
pub fn adjusted_start(t: Time) -> Time {
    if !is_weekend(t) {
        return t;
    }
    midnight(t) + Duration::days(7 - weekday(t))
}

/// Move a weekend instant back to the preceding Friday 23:59:59.
pub fn adjusted_end(t: Time) -> Time {
    if !is_weekend(t) {
        return t;
    }
    midnight(t) - Duration::days(weekday(t) - LAST_WORKDAY) + Duration::seconds(86_399)
}

/// Calendar days covering `workdays` business days counted from `from_weekday`.
///
/// Every full block of five business days takes a calendar week; a remainder
/// that runs past Friday also skips the weekend.
fn calendar_days(from_weekday: i64, workdays: i64) -> i64 {
    let (weeks, rest) = (workdays / 5, workdays % 5);
    let weekend = if from_weekday + rest > LAST_WORKDAY { 2 } else { 0 };
    weeks * 7 + rest + weekend
}

/// Business days in `calendar` days counted from `from_weekday`.
fn business_days(from_weekday: i64, calendar: i64) -> i64 {
    let (weeks, rest) = (calendar / 7, calendar % 7);
    let weekend = if from_weekday + rest > LAST_WORKDAY { 2 } else { 0 };
    weeks * 5 + rest - weekend
}

/// Business days between two adjusted instants.
///
/// Both instants are expected to be weekdays, as produced by
/// [`adjusted_start`] and [`adjusted_end`]. Returns 0 when `end` precedes
/// `start`.
pub fn workday_duration(start: Time, end: Time) -> f64 {
    if start > end {
        return 0.0;
    }
    let calendar = (end.date_naive() - start.date_naive()).num_days();
    let time_of_day = (end.time() - start.time()).num_seconds() as f64 / SECONDS_PER_DAY;
    business_days(weekday(start), calendar) as f64 + time_of_day
}

/// The instant `workdays` business days after `start`.
///
/// A weekend `start` counts from the following Monday. The fractional part of
/// `workdays` becomes a time of day on the final day; time that runs past
/// Friday midnight continues on Monday. Returns `None` when the result is out
/// of range.
pub fn add_workdays(start: Time, workdays: f64) -> Option<Time> {
    if !workdays.is_finite() || workdays < 0.0 {
        return None;
    }
    // Round to milliseconds first so 4.9999.. counts as five whole days.
    let millis = (workdays * SECONDS_PER_DAY * 1000.0).round();
    if millis >= i64::MAX as f64 {
        return None;
    }
    let millis = millis as i64;
    let whole = millis / MILLIS_PER_DAY;
    let fraction = Duration::try_milliseconds(millis % MILLIS_PER_DAY)?;

    let start = adjusted_start(start);
    let days = Duration::try_days(calendar_days(weekday(start), whole))?;
    let end = start.checked_add_signed(days)?.checked_add_signed(fraction)?;
    if is_weekend(end) {
        // less than a day past a weekday, so this is Saturday
        return end.checked_add_signed(Duration::try_days(2)?);
    }
    Some(end)
}
