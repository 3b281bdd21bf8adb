//! Test Data Builders
//!
//! Builders for bills and line items with sensible defaults, so tests only
//! spell out the fields they care about.

use chrono::{DateTime, Utc};
use core_kernel::{BillId, Currency, LineItemId, Money};
use domain_billing::{Bill, BillStatus, LineItem};

use crate::fixtures::{IdFixtures, StringFixtures, TemporalFixtures};

/// Builder for test bills
pub struct TestBillBuilder {
    id: BillId,
    currency: Currency,
    total: i64,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl Default for TestBillBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestBillBuilder {
    /// Creates a builder for an empty open USD bill
    pub fn new() -> Self {
        Self {
            id: IdFixtures::bill_id(),
            currency: Currency::USD,
            total: 0,
            created_at: TemporalFixtures::created_at(),
            closed_at: None,
        }
    }

    pub fn with_id(mut self, id: BillId) -> Self {
        self.id = id;
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Sets the total in minor units
    pub fn with_total(mut self, total: i64) -> Self {
        self.total = total;
        self
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    /// Marks the bill closed at the given instant
    pub fn closed_at(mut self, at: DateTime<Utc>) -> Self {
        self.closed_at = Some(at);
        self
    }

    /// Builds the bill
    ///
    /// # Panics
    ///
    /// Panics if the total is negative
    pub fn build(self) -> Bill {
        let total = Money::new(self.total, self.currency).expect("builder total must be non-negative");
        Bill {
            id: self.id,
            status: if self.closed_at.is_some() {
                BillStatus::Closed
            } else {
                BillStatus::Open
            },
            total,
            created_at: self.created_at,
            closed_at: self.closed_at,
        }
    }
}

/// Builder for test line items
pub struct TestLineItemBuilder {
    id: LineItemId,
    bill_id: BillId,
    amount: i64,
    currency: Currency,
    description: String,
    created_at: DateTime<Utc>,
}

impl TestLineItemBuilder {
    /// Creates a builder for a $5.00 "coffee" item on the given bill
    pub fn for_bill(bill: &Bill) -> Self {
        Self {
            id: IdFixtures::line_item_id(),
            bill_id: bill.id,
            amount: 500,
            currency: bill.currency(),
            description: StringFixtures::coffee().to_string(),
            created_at: TemporalFixtures::item_at(),
        }
    }

    pub fn with_id(mut self, id: LineItemId) -> Self {
        self.id = id;
        self
    }

    /// Sets the amount in minor units
    pub fn with_amount(mut self, amount: i64) -> Self {
        self.amount = amount;
        self
    }

    /// Overrides the item currency, e.g. for mismatch tests
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    /// Builds the line item
    ///
    /// # Panics
    ///
    /// Panics if the amount is negative
    pub fn build(self) -> LineItem {
        LineItem {
            id: self.id,
            bill_id: self.bill_id,
            amount: Money::new(self.amount, self.currency).expect("builder amount must be non-negative"),
            description: self.description,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bill_is_open_and_empty() {
        let bill = TestBillBuilder::new().build();
        assert!(bill.is_open());
        assert!(bill.total.is_zero());
        assert!(bill.is_consistent());
    }

    #[test]
    fn test_closed_bill() {
        let bill = TestBillBuilder::new()
            .with_total(800)
            .closed_at(TemporalFixtures::closed_at())
            .build();
        assert_eq!(bill.status, BillStatus::Closed);
        assert!(bill.is_consistent());
    }

    #[test]
    fn test_line_item_follows_bill_currency() {
        let bill = TestBillBuilder::new().with_currency(Currency::GEL).build();
        let item = TestLineItemBuilder::for_bill(&bill).with_amount(100).build();
        assert_eq!(item.bill_id, bill.id);
        assert_eq!(item.amount.currency(), Currency::GEL);
    }
}
