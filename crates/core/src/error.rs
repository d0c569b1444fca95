//! Errors for the core models.

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while loading configuration or parsing model input.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A date could not be parsed
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}
