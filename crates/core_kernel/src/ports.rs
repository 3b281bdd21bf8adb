//! Ports and Adapters Infrastructure
//!
//! Foundational types for the hexagonal layout used by the billing crates.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │   BillingService / BillWorkflow (domain)     │
//! └──────────────────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────┐
//! │   Port traits (LedgerPort, SignalJournal)    │
//! └──────────────────────────────────────────────┘
//!            ▲                      ▲
//!   ┌────────┴────────┐    ┌────────┴────────┐
//!   │   PostgreSQL    │    │    In-memory    │
//!   │    adapters     │    │ (tests, embed)  │
//!   └─────────────────┘    └─────────────────┘
//! ```
//!
//! Every port returns [`PortError`], so callers classify failures the same
//! way regardless of which adapter is plugged in.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a port
///
/// Variants split into two retry classes. [`PortError::is_permanent`] marks
/// the ones a retry can never fix; everything else may be retried.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("{entity_type} {id} does not exist")]
    NotFound { entity_type: String, id: String },

    /// Input or stored state breaks a domain rule
    #[error("invalid input: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// The write collides with a row that already exists
    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("storage unreachable: {message}")]
    Connection { message: String },

    /// Backend is up but refusing work, e.g. an exhausted pool
    #[error("{service} is unavailable")]
    ServiceUnavailable { service: String },

    /// A stored value has no domain representation
    #[error("cannot map stored value: {message}")]
    Transformation { message: String },

    #[error("internal failure: {message}")]
    Internal { message: String },
}

impl PortError {
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Validation failure pinned to one input field
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn transformation(message: impl Into<String>) -> Self {
        Self::Transformation {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The backend could not be reached at all
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ServiceUnavailable { .. }
        )
    }

    /// Retrying the same call can never succeed
    ///
    /// `Internal` is not listed: aborted transactions surface there
    /// and may pass on a later attempt.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Validation { .. }
                | Self::Conflict { .. }
                | Self::Transformation { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Marker for port traits; implementors can be shared across tasks.
pub trait DomainPort: Send + Sync + 'static {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Outcome of one adapter health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub adapter_id: String,
    pub status: AdapterHealth,
    /// Round trip of the check query
    pub latency_ms: u64,
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthCheckResult {
    pub fn healthy(adapter_id: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            status: AdapterHealth::Healthy,
            latency_ms,
            message: None,
            checked_at: Utc::now(),
        }
    }

    pub fn unhealthy(
        adapter_id: impl Into<String>,
        latency_ms: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            status: AdapterHealth::Unhealthy,
            latency_ms,
            message: Some(message.into()),
            checked_at: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.status == AdapterHealth::Healthy
    }
}

/// Adapters that can check their backend
#[async_trait::async_trait]
pub trait HealthCheckable: Send + Sync {
    async fn health_check(&self) -> HealthCheckResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_permanent() {
        let error = PortError::not_found("Bill", "123");
        assert!(error.is_not_found());
        assert!(error.is_permanent());
        assert!(!error.is_transient());
        assert_eq!(error.to_string(), "Bill 123 does not exist");
    }

    #[test]
    fn test_retry_classes() {
        let unavailable = PortError::ServiceUnavailable {
            service: "postgres".to_string(),
        };
        assert!(unavailable.is_transient());
        assert!(!unavailable.is_permanent());

        assert!(PortError::connection("reset by peer").is_transient());
        assert!(PortError::validation("amount out of range").is_permanent());
        assert!(PortError::conflict("bill exists").is_permanent());
    }

    #[test]
    fn test_internal_error_is_retryable() {
        let internal = PortError::internal("transaction aborted");
        assert!(!internal.is_permanent());
        assert!(!internal.is_transient());
    }

    #[test]
    fn test_validation_field_is_kept() {
        match PortError::validation_field("too long", "description") {
            PortError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("description")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_health_constructors() {
        let up = HealthCheckResult::healthy("ledger", 3);
        assert!(up.is_healthy());
        assert!(up.message.is_none());

        let down = HealthCheckResult::unhealthy("ledger", 12, "refused");
        assert_eq!(down.status, AdapterHealth::Unhealthy);
        assert_eq!(down.message.as_deref(), Some("refused"));
    }
}
