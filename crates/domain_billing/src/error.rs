//! Billing domain errors

use core_kernel::{BillId, MoneyError, PortError};
use durable_runtime::EngineError;
use thiserror::Error;

/// Errors returned by the billing service
#[derive(Debug, Error)]
pub enum BillingError {
    /// Bill not found
    #[error("Bill not found: {0}")]
    BillNotFound(BillId),

    /// Mutation attempted on a closed bill
    #[error("Bill is not open: {0}")]
    BillNotOpen(BillId),

    /// Caller input failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Status filter other than OPEN or CLOSED
    #[error("Invalid status filter: {0}")]
    InvalidStatus(String),

    /// Money construction or arithmetic failed
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    /// Ledger store failure
    #[error("Ledger error: {0}")]
    Ledger(PortError),

    /// Workflow engine failure
    #[error("Workflow engine error: {0}")]
    Engine(#[from] EngineError),
}

impl BillingError {
    /// Maps a ledger error, turning a missing bill into `BillNotFound`
    pub fn from_ledger(error: PortError, bill_id: BillId) -> Self {
        if error.is_not_found() {
            BillingError::BillNotFound(bill_id)
        } else {
            BillingError::Ledger(error)
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BillingError::BillNotFound(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BillingError::Validation(_) | BillingError::InvalidStatus(_)
        )
    }
}

impl From<PortError> for BillingError {
    fn from(error: PortError) -> Self {
        BillingError::Ledger(error)
    }
}

impl From<validator::ValidationErrors> for BillingError {
    fn from(errors: validator::ValidationErrors) -> Self {
        BillingError::Validation(errors.to_string())
    }
}
