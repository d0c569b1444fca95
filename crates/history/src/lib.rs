//! Ticket history reconstruction.
//!
//! Replays change logs into per-ticket field-state deltas and places the
//! resulting snapshots into timetable buckets.

#![warn(missing_docs)]

pub mod builder;
pub mod error;
pub mod filter;
pub mod reconstructor;

pub use builder::{place_history, tracked_fields, SnapshotFilter, TimetableBuilder};
pub use error::{HistoryError, Result};
pub use filter::{field_equals, in_any_milestone, in_milestone};
pub use reconstructor::{FieldDelta, FieldState, HistoryReconstructor, TicketHistory};
