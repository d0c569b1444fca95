//! Storage abstraction and implementations for ticket history.
//!
//! This crate provides the change-log and ticket-source traits consumed by
//! history reconstruction, with in-memory, JSON file and Trac SQLite backends.

#![warn(missing_docs)]

pub mod trait_;
pub mod memory_storage;
pub mod json_storage;
#[cfg(feature = "sqlite")]
pub mod sqlite_storage;

pub use trait_::{
    is_valid_field_name, ChangeLogProvider, FieldSet, Result, StorageError, TicketQuery, TicketSource,
};
pub use memory_storage::MemoryStorage;
pub use json_storage::JsonStorage;
#[cfg(feature = "sqlite")]
pub use sqlite_storage::TracSqliteStorage;
