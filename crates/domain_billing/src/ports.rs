//! Billing Domain Ports
//!
//! The `LedgerPort` trait is the ledger store seen from the billing domain:
//! the durable home of bills and line items and the single source of truth
//! for whether a line item has already been applied.
//!
//! Adapters:
//!
//! - **PostgreSQL**: `infra_db::PostgresLedgerAdapter`
//! - **Mock**: [`mock::MockLedgerPort`], in memory, for tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{BillId, DomainPort, HealthCheckable, Money, PortError};

use crate::bill::{Bill, BillStatus, LineItem};

/// Result of inserting a line item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The item was stored and the bill total updated in the same transaction
    Inserted {
        /// Bill total after the insert
        new_total: Money,
    },
    /// An item with this id was already stored for the bill; nothing changed
    Duplicate,
}

/// Port for the ledger store
///
/// All methods return `Result<T, PortError>`. Transient errors
/// (`PortError::is_transient`) are retried by the workflow; permanent ones
/// fault the instance.
#[async_trait]
pub trait LedgerPort: DomainPort + HealthCheckable {
    /// Stores a new bill
    ///
    /// # Errors
    ///
    /// `PortError::Conflict` if a bill with the same id exists
    async fn create_bill(&self, bill: &Bill) -> Result<(), PortError>;

    /// Retrieves a bill by ID
    ///
    /// # Returns
    ///
    /// The bill if found, or `PortError::NotFound`
    async fn get_bill(&self, id: BillId) -> Result<Bill, PortError>;

    /// Lists bills, newest first, optionally filtered by status
    async fn list_bills(&self, status: Option<BillStatus>) -> Result<Vec<Bill>, PortError>;

    /// Lists a bill's line items, oldest first
    async fn list_line_items(&self, bill_id: BillId) -> Result<Vec<LineItem>, PortError>;

    /// Stores a line item and adds its amount to the bill total, atomically
    ///
    /// If an item with the same id is already stored for the bill, nothing
    /// changes and `InsertOutcome::Duplicate` is returned.
    ///
    /// # Errors
    ///
    /// * `PortError::NotFound` if the bill does not exist
    /// * `PortError::Validation` on currency mismatch or total overflow
    async fn insert_line_item_and_update_total(
        &self,
        item: &LineItem,
    ) -> Result<InsertOutcome, PortError>;

    /// Sets status and close time without touching the total
    ///
    /// # Errors
    ///
    /// * `PortError::NotFound` if the bill does not exist
    /// * `PortError::Validation` if `closed_at` does not agree with `status`
    async fn update_bill_status(
        &self,
        bill_id: BillId,
        status: BillStatus,
        closed_at: Option<DateTime<Utc>>,
    ) -> Result<(), PortError>;
}

/// Rejects a status/close-time combination that breaks the bill invariant
pub fn check_status_transition(
    status: BillStatus,
    closed_at: Option<DateTime<Utc>>,
) -> Result<(), PortError> {
    match (status, closed_at) {
        (BillStatus::Open, None) | (BillStatus::Closed, Some(_)) => Ok(()),
        (BillStatus::Open, Some(_)) => Err(PortError::validation_field(
            "an open bill cannot have a close time",
            "closed_at",
        )),
        (BillStatus::Closed, None) => Err(PortError::validation_field(
            "a closed bill requires a close time",
            "closed_at",
        )),
    }
}

/// Mock implementation of LedgerPort for testing
///
/// Stores bills and line items in memory. Transient failures can be injected
/// to exercise activity retries.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::RwLock;

    use core_kernel::HealthCheckResult;

    #[derive(Debug, Default)]
    struct Store {
        bills: HashMap<BillId, Bill>,
        items: HashMap<BillId, Vec<LineItem>>,
    }

    /// In-memory mock implementation of LedgerPort
    #[derive(Debug, Default)]
    pub struct MockLedgerPort {
        store: RwLock<Store>,
        insert_failures: AtomicU32,
        status_failures: AtomicU32,
        insert_calls: AtomicU32,
        status_calls: AtomicU32,
    }

    impl MockLedgerPort {
        /// Creates a new mock port
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates with bills for testing
        pub async fn with_bills(bills: Vec<Bill>) -> Self {
            let port = Self::new();
            {
                let mut store = port.store.write().await;
                for bill in bills {
                    store.bills.insert(bill.id, bill);
                }
            }
            port
        }

        /// Makes the next `count` item inserts fail with a connection error
        pub fn fail_next_inserts(&self, count: u32) {
            self.insert_failures.store(count, Ordering::SeqCst);
        }

        /// Makes the next `count` status updates fail with a connection error
        pub fn fail_next_status_updates(&self, count: u32) {
            self.status_failures.store(count, Ordering::SeqCst);
        }

        /// Number of insert calls, failed ones included
        pub fn insert_calls(&self) -> u32 {
            self.insert_calls.load(Ordering::SeqCst)
        }

        /// Number of status update calls, failed ones included
        pub fn status_calls(&self) -> u32 {
            self.status_calls.load(Ordering::SeqCst)
        }

        fn take_failure(counter: &AtomicU32) -> bool {
            counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    impl DomainPort for MockLedgerPort {}

    #[async_trait]
    impl HealthCheckable for MockLedgerPort {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("mock-ledger-port", 0).with_message("Mock adapter always healthy")
        }
    }

    #[async_trait]
    impl LedgerPort for MockLedgerPort {
        async fn create_bill(&self, bill: &Bill) -> Result<(), PortError> {
            let mut store = self.store.write().await;
            if store.bills.contains_key(&bill.id) {
                return Err(PortError::conflict(format!("Bill {} already exists", bill.id)));
            }
            store.bills.insert(bill.id, bill.clone());
            Ok(())
        }

        async fn get_bill(&self, id: BillId) -> Result<Bill, PortError> {
            self.store
                .read()
                .await
                .bills
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Bill", id))
        }

        async fn list_bills(&self, status: Option<BillStatus>) -> Result<Vec<Bill>, PortError> {
            let store = self.store.read().await;
            let mut bills: Vec<Bill> = store
                .bills
                .values()
                .filter(|b| status.map_or(true, |s| b.status == s))
                .cloned()
                .collect();
            bills.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(bills)
        }

        async fn list_line_items(&self, bill_id: BillId) -> Result<Vec<LineItem>, PortError> {
            let store = self.store.read().await;
            let mut items = store.items.get(&bill_id).cloned().unwrap_or_default();
            items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            Ok(items)
        }

        async fn insert_line_item_and_update_total(
            &self,
            item: &LineItem,
        ) -> Result<InsertOutcome, PortError> {
            self.insert_calls.fetch_add(1, Ordering::SeqCst);
            if Self::take_failure(&self.insert_failures) {
                return Err(PortError::connection("injected insert failure"));
            }

            let mut store = self.store.write().await;
            let bill = store
                .bills
                .get(&item.bill_id)
                .ok_or_else(|| PortError::not_found("Bill", item.bill_id))?;

            let already_applied = store
                .items
                .get(&item.bill_id)
                .is_some_and(|items| items.iter().any(|i| i.id == item.id));
            if already_applied {
                return Ok(InsertOutcome::Duplicate);
            }

            let new_total = bill
                .total
                .checked_add(&item.amount)
                .map_err(|e| PortError::validation_field(e.to_string(), "amount"))?;

            store.items.entry(item.bill_id).or_default().push(item.clone());
            if let Some(bill) = store.bills.get_mut(&item.bill_id) {
                bill.total = new_total;
            }
            Ok(InsertOutcome::Inserted { new_total })
        }

        async fn update_bill_status(
            &self,
            bill_id: BillId,
            status: BillStatus,
            closed_at: Option<DateTime<Utc>>,
        ) -> Result<(), PortError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            if Self::take_failure(&self.status_failures) {
                return Err(PortError::connection("injected status update failure"));
            }
            check_status_transition(status, closed_at)?;

            let mut store = self.store.write().await;
            let bill = store
                .bills
                .get_mut(&bill_id)
                .ok_or_else(|| PortError::not_found("Bill", bill_id))?;
            bill.status = status;
            bill.closed_at = closed_at;
            Ok(())
        }
    }
}
