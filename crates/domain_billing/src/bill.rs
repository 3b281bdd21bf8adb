//! Bill and line item model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BillId, Currency, LineItemId, Money};

use crate::error::BillingError;

/// Bill status
///
/// `Open` is the initial state and `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BillStatus {
    /// Accepting line items
    Open,
    /// Finalized, no further changes
    Closed,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Open => "OPEN",
            BillStatus::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(BillStatus::Open),
            "CLOSED" => Ok(BillStatus::Closed),
            other => Err(BillingError::InvalidStatus(other.to_string())),
        }
    }
}

/// A bill
///
/// # Invariants
///
/// - `status == Closed` exactly when `closed_at` is set
/// - The total's currency is fixed at creation
/// - The total equals the sum of the bill's committed line items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    /// Unique identifier
    pub id: BillId,
    /// Lifecycle status
    pub status: BillStatus,
    /// Running total
    pub total: Money,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Close time, set only once the bill is closed
    pub closed_at: Option<DateTime<Utc>>,
}

impl Bill {
    /// Creates an open bill with a zero total
    pub fn open(id: BillId, currency: Currency, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: BillStatus::Open,
            total: Money::zero(currency),
            created_at,
            closed_at: None,
        }
    }

    pub fn currency(&self) -> Currency {
        self.total.currency()
    }

    pub fn is_open(&self) -> bool {
        self.status == BillStatus::Open
    }

    /// Rejects mutations on a bill that is not open
    pub fn ensure_open(&self) -> Result<(), BillingError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(BillingError::BillNotOpen(self.id))
        }
    }

    /// Checks that status and close time agree
    pub fn is_consistent(&self) -> bool {
        match self.status {
            BillStatus::Open => self.closed_at.is_none(),
            BillStatus::Closed => self.closed_at.is_some(),
        }
    }
}

/// A single charge on a bill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Unique identifier, also the deduplication key
    pub id: LineItemId,
    /// Owning bill
    pub bill_id: BillId,
    /// Amount in the bill's currency
    pub amount: Money,
    /// Trimmed description
    pub description: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_bill() {
        let bill = Bill::open(BillId::new_v7(), Currency::GEL, Utc::now());

        assert!(bill.is_open());
        assert!(bill.total.is_zero());
        assert_eq!(bill.currency(), Currency::GEL);
        assert!(bill.is_consistent());
        assert!(bill.ensure_open().is_ok());
    }

    #[test]
    fn test_closed_bill_rejects_mutation() {
        let mut bill = Bill::open(BillId::new_v7(), Currency::USD, Utc::now());
        bill.status = BillStatus::Closed;
        assert!(!bill.is_consistent());

        bill.closed_at = Some(Utc::now());
        assert!(bill.is_consistent());
        assert!(matches!(bill.ensure_open(), Err(BillingError::BillNotOpen(id)) if id == bill.id));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("OPEN".parse::<BillStatus>().unwrap(), BillStatus::Open);
        assert_eq!("CLOSED".parse::<BillStatus>().unwrap(), BillStatus::Closed);
        assert!("open".parse::<BillStatus>().is_err());
        assert!("PAID".parse::<BillStatus>().is_err());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&BillStatus::Closed).unwrap();
        assert_eq!(json, "\"CLOSED\"");
    }
}
