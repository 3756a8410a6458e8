use uuid::Uuid;

/// Failures reported by an LLM backend.
///
/// Every variant is recoverable from the simulator's point of view: the task
/// that issued the call goes back to `pending` instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The provider rejected the call because of rate limiting.
    #[error("rate limited")]
    RateLimited,

    /// The call did not finish within the configured deadline.
    #[error("timed out")]
    Timeout,

    /// The backend could not be reached at all.
    #[error("backend unavailable")]
    Unavailable,

    /// Any other provider-side failure.
    #[error("provider error: {0}")]
    Provider(String),
}

impl BackendError {
    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited | Self::Timeout | Self::Unavailable => true,
            Self::Provider(msg) => {
                let lower = msg.to_lowercase();
                lower.contains("overloaded") || lower.contains("503") || lower.contains("502")
            }
        }
    }
}

/// Top-level error type for the Brigade simulator.
#[derive(Debug, thiserror::Error)]
pub enum BrigadeError {
    /// The agent's role has no handler for this task type.
    #[error("{role} cannot handle task type '{task_type}'")]
    UnsupportedTaskType {
        /// Role of the agent that received the task.
        role: String,
        /// The unrecognized task type.
        task_type: String,
    },

    /// The agent lacks the permission required by the task.
    #[error("{role} lacks permission '{permission}'")]
    PermissionDenied {
        /// Role of the agent that attempted the task.
        role: String,
        /// The missing permission.
        permission: String,
    },

    /// No candidate in the pool scored above zero.
    #[error("no suitable assignee for task type '{task_type}'")]
    NoSuitableAssignee {
        /// Task type that could not be placed.
        task_type: String,
    },

    /// One or more critical quality checks failed.
    #[error("quality check failed for order {order_id}: {}", failures.join("; "))]
    QualityCheckFailed {
        /// The order under inspection.
        order_id: Uuid,
        /// One message per failed critical check.
        failures: Vec<String>,
    },

    /// An LLM backend call failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// A task could not be completed, e.g. because persistence failed.
    #[error("Task failed: {0}")]
    TaskFailed(String),

    /// A staff member could not be released from a station.
    #[error("release of {member} blocked: {reason}")]
    ReleaseBlocked {
        /// The member that stays on the station.
        member: Uuid,
        /// Why the release could not proceed.
        reason: String,
    },

    /// A state machine was asked to make an illegal move.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: String,
        /// Requested state.
        to: String,
    },

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BrigadeError {
    /// Whether the error came from the LLM backend and the task may be retried.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

/// A convenience `Result` alias using [`BrigadeError`].
pub type BrigadeResult<T> = Result<T, BrigadeError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_errors_are_retryable() {
        assert!(BackendError::RateLimited.is_retryable());
        assert!(BackendError::Timeout.is_retryable());
        assert!(BackendError::Unavailable.is_retryable());
        assert!(BackendError::Provider("503 Service Unavailable".into()).is_retryable());
        assert!(!BackendError::Provider("invalid api key".into()).is_retryable());
    }

    #[test]
    fn test_quality_failure_message_aggregates() {
        let err = BrigadeError::QualityCheckFailed {
            order_id: Uuid::nil(),
            failures: vec!["temperature".into(), "portion".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("temperature; portion"));
    }

    #[test]
    fn test_backend_conversion() {
        let err: BrigadeError = BackendError::Timeout.into();
        assert!(err.is_backend());
        assert_eq!(err.to_string(), "Backend error: timed out");
    }
}
