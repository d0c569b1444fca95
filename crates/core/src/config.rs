//! Timetable configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How to treat gaps in a ticket's change log when backfilling its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineCheck {
    /// Trust the log; the earliest old value is the creation-time value.
    Assume,
    /// Log a warning when a field's change chain is broken.
    #[default]
    Warn,
    /// Fail reconstruction when a field's change chain is broken.
    Strict,
}

/// Classification of statuses and the fields used for analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimetableConfig {
    /// Statuses counted as "new"
    pub new_states: Vec<String>,

    /// Statuses counted as "closed"; everything else is in progress
    pub closed_states: Vec<String>,

    /// Numeric field holding the work estimate
    pub estimation_field: String,

    /// Extra fields needed by iteration-membership filters
    pub iteration_fields: Vec<String>,

    /// Weight of a ticket without a usable estimate
    pub default_estimate: f64,

    /// Lower bound applied to every ticket weight
    pub minimum_estimate: f64,

    /// Number of tickets reconstructed concurrently
    pub history_concurrency: usize,

    /// Baseline backfill check
    pub baseline_check: BaselineCheck,
}

impl Default for TimetableConfig {
    fn default() -> Self {
        Self {
            new_states: vec!["new".to_string()],
            closed_states: vec!["closed".to_string()],
            estimation_field: "tm_estimate".to_string(),
            iteration_fields: Vec::new(),
            default_estimate: 1.0,
            minimum_estimate: 0.0,
            history_concurrency: 8,
            baseline_check: BaselineCheck::default(),
        }
    }
}

/// Status category of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCategory {
    /// Not started
    New,
    /// Started but not closed
    InProgress,
    /// Closed
    Closed,
}

impl TimetableConfig {
    /// Load configuration from a JSON file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Classify a status. Unknown or missing statuses are in progress.
    pub fn category(&self, status: Option<&str>) -> StatusCategory {
        match status {
            Some(s) if self.new_states.iter().any(|n| n == s) => StatusCategory::New,
            Some(s) if self.closed_states.iter().any(|c| c == s) => StatusCategory::Closed,
            _ => StatusCategory::InProgress,
        }
    }

    /// Fields the timetable must track for analytics.
    pub fn tracked_fields(&self) -> Vec<String> {
        let mut fields = vec![self.estimation_field.clone()];
        fields.extend(self.iteration_fields.iter().cloned());
        fields
    }

    /// Effective weight of an estimate.
    pub fn weight(&self, estimate: Option<f64>) -> f64 {
        estimate
            .filter(|e| e.is_finite())
            .unwrap_or(self.default_estimate)
            .max(self.minimum_estimate)
    }
}
