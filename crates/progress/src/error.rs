//! Errors for progress analytics.

/// Result alias for progress operations.
pub type Result<T> = std::result::Result<T, ProgressError>;

/// Errors raised while preparing progress reports.
#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    /// A burndown needs a start date
    #[error("no start date specified")]
    MissingStartDate,
}
