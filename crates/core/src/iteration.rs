//! Iterations (time-boxed milestones) read from a wiki table.
//!
//! The table lives in the first preformatted block of a wiki page: it starts
//! on a line beginning with `{{{` and ends at a line containing only `}}}`.
//! Rows are comma separated with `"` quoting and the columns
//! `name,startdate,enddate`; extra columns are ignored. The first row is a
//! header. Rows with fewer than three columns or invalid dates are skipped.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A named iteration and its date range (both ends inclusive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationInfo {
    /// Iteration name, matching the milestone field
    pub name: String,

    /// First day
    pub start_date: NaiveDate,

    /// Last day
    pub end_date: NaiveDate,
}

impl IterationInfo {
    /// Create an iteration from ISO dates.
    pub fn parse(name: impl Into<String>, start: &str, end: &str) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            start_date: parse_date(start)?,
            end_date: parse_date(end)?,
        })
    }

    /// Whether `date` falls inside the iteration.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

/// Parse an ISO `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| CoreError::InvalidDate(s.to_string()))
}

/// Extract the iteration table from wiki text.
///
/// Rows need a name and two ISO dates; anything else, a header included, is
/// skipped.
pub fn extract_iterations(text: &str) -> Vec<IterationInfo> {
    let mut rows = Vec::new();
    let mut in_block = false;
    for line in text.lines().map(str::trim) {
        if !in_block {
            in_block = line.starts_with("{{{");
            continue;
        }
        if line == "}}}" {
            break;
        }
        if !line.is_empty() {
            rows.push(line);
        }
    }

    rows.into_iter()
        .map(split_csv_row)
        .filter(|cols| cols.len() >= 3)
        .filter_map(|cols| IterationInfo::parse(cols[0].clone(), &cols[1], &cols[2]).ok())
        .collect()
}

/// Iterations covering `date`.
pub fn iterations_by_date(iterations: &[IterationInfo], date: NaiveDate) -> Vec<&IterationInfo> {
    iterations.iter().filter(|i| i.contains(date)).collect()
}

/// Iteration named `name`.
pub fn iteration_by_name<'a>(iterations: &'a [IterationInfo], name: &str) -> Option<&'a IterationInfo> {
    iterations.iter().find(|i| i.name == name)
}

fn split_csv_row(line: &str) -> Vec<String> {
    let mut cols = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => cols.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    cols.push(current);
    cols
}
