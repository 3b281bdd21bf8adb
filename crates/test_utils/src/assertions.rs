//! Custom Test Assertions
//!
//! Assertion helpers for bills that give more meaningful failure messages
//! than plain `assert_eq!`.

use core_kernel::{Currency, Money};
use domain_billing::{Bill, BillStatus, LineItem};

/// Asserts a Money value by amount and currency
pub fn assert_money_eq(actual: &Money, amount: i64, currency: Currency) {
    assert_eq!(
        (actual.amount(), actual.currency()),
        (amount, currency),
        "Expected {} {}, got {}",
        amount,
        currency,
        actual
    );
}

/// Asserts that a bill is open with no close time
pub fn assert_bill_open(bill: &Bill) {
    assert_eq!(bill.status, BillStatus::Open, "Bill {} should be OPEN", bill.id);
    assert!(
        bill.closed_at.is_none(),
        "Open bill {} has close time {:?}",
        bill.id,
        bill.closed_at
    );
}

/// Asserts that a bill is closed with a close time no earlier than creation
pub fn assert_bill_closed(bill: &Bill) {
    assert_eq!(bill.status, BillStatus::Closed, "Bill {} should be CLOSED", bill.id);
    let closed_at = bill
        .closed_at
        .unwrap_or_else(|| panic!("Closed bill {} has no close time", bill.id));
    assert!(
        closed_at >= bill.created_at,
        "Bill {} closed at {} before it was created at {}",
        bill.id,
        closed_at,
        bill.created_at
    );
}

/// Asserts that the bill total equals the sum of its items
///
/// # Panics
///
/// Panics if any item belongs to another bill, uses another currency,
/// or the sums differ
pub fn assert_total_matches_items(bill: &Bill, items: &[LineItem]) {
    for item in items {
        assert_eq!(item.bill_id, bill.id, "Item {} belongs to another bill", item.id);
        assert_eq!(
            item.amount.currency(),
            bill.currency(),
            "Item {} currency differs from bill",
            item.id
        );
    }
    let sum: i64 = items.iter().map(|i| i.amount.amount()).sum();
    assert_eq!(
        bill.total.amount(),
        sum,
        "Bill {} total {} does not match item sum {}",
        bill.id,
        bill.total,
        sum
    );
}

/// Asserts that item ids are unique within a bill
pub fn assert_unique_items(items: &[LineItem]) {
    let mut ids: Vec<_> = items.iter().map(|i| i.id).collect();
    ids.sort_by_key(|id| *id.as_uuid());
    ids.dedup();
    assert_eq!(ids.len(), items.len(), "Duplicate line item ids stored");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{TestBillBuilder, TestLineItemBuilder};
    use crate::fixtures::TemporalFixtures;

    #[test]
    fn test_total_matches_items() {
        let bill = TestBillBuilder::new().with_total(800).build();
        let items = vec![
            TestLineItemBuilder::for_bill(&bill).with_amount(500).build(),
            TestLineItemBuilder::for_bill(&bill).with_amount(300).build(),
        ];
        assert_total_matches_items(&bill, &items);
        assert_unique_items(&items);
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn test_total_mismatch_panics() {
        let bill = TestBillBuilder::new().with_total(100).build();
        let items = vec![TestLineItemBuilder::for_bill(&bill).with_amount(500).build()];
        assert_total_matches_items(&bill, &items);
    }

    #[test]
    fn test_open_and_closed() {
        assert_bill_open(&TestBillBuilder::new().build());
        assert_bill_closed(&TestBillBuilder::new().closed_at(TemporalFixtures::closed_at()).build());
    }
}
