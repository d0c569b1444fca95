//! Progress Analytics (Layer 3)
//!
//! Business-day calendar, completion estimates, burndown tables and task
//! boards computed from filled timetables.

#![warn(missing_docs)]

pub mod board;
pub mod burndown;
pub mod error;
pub mod estimator;
pub mod workdays;

pub use board::{BoardColumn, ColumnInfo, ColumnStates, TaskBoard};
pub use burndown::{BurndownOptions, BurndownRange, BurndownRow, BurndownTable};
pub use error::{ProgressError, Result};
pub use estimator::CompletionEstimator;
pub use workdays::{add_workdays, adjusted_end, adjusted_start, is_weekend, workday_duration};
