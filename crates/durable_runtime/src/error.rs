//! Runtime error types

use core_kernel::PortError;
use thiserror::Error;

/// Failure reported by a single activity attempt
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActivityError {
    /// The attempt failed but a later attempt may succeed
    #[error("{0}")]
    Retryable(String),

    /// The attempt failed in a way retrying cannot fix
    #[error("{0}")]
    NonRetryable(String),
}

impl ActivityError {
    pub fn retryable(message: impl Into<String>) -> Self {
        ActivityError::Retryable(message.into())
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        ActivityError::NonRetryable(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ActivityError::Retryable(_))
    }
}

impl From<PortError> for ActivityError {
    fn from(error: PortError) -> Self {
        if error.is_permanent() {
            ActivityError::NonRetryable(error.to_string())
        } else {
            ActivityError::Retryable(error.to_string())
        }
    }
}

/// Instance-level fault
///
/// A fault stops the instance. The signal being handled stays unacknowledged
/// in the journal and is replayed when the instance is started again.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowFault {
    #[error("Activity '{activity}' failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        activity: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Activity '{activity}' did not complete within {timeout_ms}ms")]
    Timeout {
        activity: String,
        timeout_ms: u64,
    },

    #[error("Activity '{activity}' failed permanently: {message}")]
    NonRetryable {
        activity: String,
        message: String,
    },

    #[error("Workflow error: {0}")]
    Internal(String),
}

impl WorkflowFault {
    /// Name of the activity that caused the fault, if any
    pub fn activity(&self) -> Option<&str> {
        match self {
            WorkflowFault::RetriesExhausted { activity, .. }
            | WorkflowFault::Timeout { activity, .. }
            | WorkflowFault::NonRetryable { activity, .. } => Some(activity),
            WorkflowFault::Internal(_) => None,
        }
    }
}

/// Errors returned by the engine's control surface
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Instance already running: {0}")]
    AlreadyRunning(String),

    #[error("Instance not running: {0}")]
    InstanceNotRunning(String),

    #[error("Signal payload could not be encoded: {0}")]
    Serialization(String),

    #[error("Signal journal error: {0}")]
    Journal(#[from] PortError),

    #[error("Workflow engine unavailable")]
    Unavailable,

    #[error("Workflow engine already installed")]
    AlreadyInstalled,
}

impl From<serde_json::Error> for EngineError {
    fn from(error: serde_json::Error) -> Self {
        EngineError::Serialization(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_error_maps_to_retryability() {
        let transient: ActivityError = PortError::connection("refused").into();
        assert!(transient.is_retryable());

        let permanent: ActivityError = PortError::validation("currency mismatch").into();
        assert!(!permanent.is_retryable());
    }

    #[test]
    fn test_fault_names_activity() {
        let fault = WorkflowFault::Timeout {
            activity: "finalize-bill".to_string(),
            timeout_ms: 300_000,
        };
        assert_eq!(fault.activity(), Some("finalize-bill"));
        assert!(WorkflowFault::Internal("x".into()).activity().is_none());
    }
}
