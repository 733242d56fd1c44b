//! Error types for the delayed-action scheduler.

use thiserror::Error;

/// Errors that can occur during scheduler operations
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Invalid state transition attempted
    #[error("Invalid state transition")]
    InvalidStateTransition,

    /// Scheduled task not found
    #[error("Scheduled task not found: {0}")]
    NotFound(String),

    /// Generic error
    #[error("Scheduler error: {0}")]
    Other(String),
}

/// Convert a string into a ScheduleError
impl From<String> for ScheduleError {
    fn from(message: String) -> Self {
        Self::Other(message)
    }
}

/// Result type for scheduler operations
pub type ScheduleResult<T> = Result<T, ScheduleError>;
