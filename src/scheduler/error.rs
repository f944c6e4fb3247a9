//! Error types for the scheduler module

use std::fmt;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// No task with this id was ever submitted
    TaskNotFound {
        id: String,
    },

    /// The scheduler was built without an execution callback
    MissingExecutor,

    /// Concurrency limit must be at least one
    InvalidConcurrency {
        value: usize,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TaskNotFound { id } => write!(f, "Task not found: {}", id),
            Self::MissingExecutor => {
                write!(f, "No execution callback registered on the scheduler")
            }
            Self::InvalidConcurrency { value } => {
                write!(f, "Invalid concurrency limit '{}'. Must be at least 1", value)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl SchedulerError {
    /// Create a task-not-found error
    pub fn task_not_found(id: impl Into<String>) -> Self {
        Self::TaskNotFound { id: id.into() }
    }

    /// Configuration problems are never retried
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingExecutor | Self::InvalidConcurrency { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_not_found_error() {
        let err = SchedulerError::task_not_found("abc");
        assert!(err.to_string().contains("abc"));
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_missing_executor_is_configuration() {
        assert!(SchedulerError::MissingExecutor.is_configuration());
        assert!(SchedulerError::InvalidConcurrency { value: 0 }.is_configuration());
    }
}
