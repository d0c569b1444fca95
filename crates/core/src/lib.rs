//! Core data models for ticket history analytics.
//!
//! This crate defines tickets, their change events, per-bucket snapshots and
//! the timetable that groups snapshots into time windows.

#![warn(missing_docs)]

mod id;
mod value;
mod ticket;
mod ticket_info;
mod timetable;
mod config;
mod error;

pub mod iteration;

pub use id::TicketId;
pub use value::FieldValue;
pub use ticket::{ChangeEvent, Ticket, ID_FIELD, MILESTONE_FIELD, STATUS_FIELD};
pub use ticket_info::TicketInfo;
pub use timetable::{Timetable, TimetableEntry};
pub use config::{BaselineCheck, StatusCategory, TimetableConfig};
pub use error::{CoreError, Result};
pub use iteration::IterationInfo;

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
