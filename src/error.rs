use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid priority level: {0}")]
    InvalidPriority(i64),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A field that was present in the previous resolved value is absent now.
    /// Indicates a bug in whichever source produced the value.
    #[error("Invariant violation: field `{field}` regressed from present to absent")]
    InvariantViolation { field: &'static str },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Audio error: {0}")]
    AudioError(String),

    #[error("Video error: {0}")]
    VideoError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    /// Whether the caller may retry the same operation later
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AppError::ServiceUnavailable(_))
    }
}

/// Result type alias used across the crate
pub type Result<T> = std::result::Result<T, AppError>;
