//! Errors raised while reconstructing ticket history.

use tickethistory_core::TicketId;
use tickethistory_storage::StorageError;

/// Result alias for history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Errors that abort a reconstruction batch.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// The change log could not be read
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A field's change chain has a gap, so its baseline cannot be trusted
    #[error("change log of ticket {ticket} is incomplete for field '{field}'")]
    IncompleteLog {
        /// Affected ticket
        ticket: TicketId,
        /// Affected field
        field: String,
    },
}
