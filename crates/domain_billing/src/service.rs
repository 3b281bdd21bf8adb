//! Billing service
//!
//! Entry points for callers. Mutations are validated here, checked against
//! the stored bill status, and then sent to the bill's workflow instance as
//! signals. Reads go straight to the ledger store.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};
use validator::Validate;

use core_kernel::{BillId, Currency, HealthCheckResult, LineItemId};
use durable_runtime::{ActivityOptions, EngineError, WorkflowEngine};

use crate::activities::BillActivities;
use crate::bill::{Bill, BillStatus, LineItem};
use crate::error::BillingError;
use crate::ports::LedgerPort;
use crate::signal::{AddItemSignal, CloseBillSignal, ADD_ITEM_SIGNAL, CLOSE_BILL_SIGNAL};
use crate::workflow::BillWorkflow;

/// Caller input for adding a line item
///
/// The description is trimmed on construction; the length bounds apply to the
/// trimmed text.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct AddItemRequest {
    #[validate(range(min = 1, max = 100000000))]
    pub amount: i64,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
}

impl AddItemRequest {
    pub fn new(amount: i64, description: &str) -> Self {
        Self {
            amount,
            description: description.trim().to_string(),
        }
    }
}

/// A bill together with its line items
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillWithItems {
    pub bill: Bill,
    pub items: Vec<LineItem>,
}

/// Service facade over the ledger store and the workflow engine
pub struct BillingService {
    ledger: Arc<dyn LedgerPort>,
    engine: Arc<WorkflowEngine>,
    activities: BillActivities,
}

impl BillingService {
    /// Creates the service
    ///
    /// # Arguments
    ///
    /// * `ledger` - Ledger store adapter
    /// * `engine` - Engine that runs the bill workflows
    /// * `activity_options` - Timeout and retry policy for ledger activities
    pub fn new(
        ledger: Arc<dyn LedgerPort>,
        engine: Arc<WorkflowEngine>,
        activity_options: ActivityOptions,
    ) -> Self {
        let activities = BillActivities::new(Arc::clone(&ledger), activity_options);
        Self {
            ledger,
            engine,
            activities,
        }
    }

    pub fn engine(&self) -> &Arc<WorkflowEngine> {
        &self.engine
    }

    /// Creates an open bill and starts its workflow
    ///
    /// The bill row is written before the instance starts. If starting fails,
    /// the error is returned and the instance is started by the next mutation
    /// or by [`recover_open_bills`](Self::recover_open_bills).
    #[instrument(skip(self))]
    pub async fn create_bill(&self, currency: Currency) -> Result<Bill, BillingError> {
        let bill = Bill::open(BillId::new_v7(), currency, self.engine.now());
        self.ledger.create_bill(&bill).await?;

        let workflow = BillWorkflow::new(bill.id, currency, self.activities.clone());
        self.engine
            .start_instance(&bill.id.instance_key(), workflow)
            .await?;

        info!(bill_id = %bill.id, %currency, "Bill created");
        Ok(bill)
    }

    /// Creates a bill from an ISO currency code such as `"USD"`
    pub async fn create_bill_for_code(&self, currency_code: &str) -> Result<Bill, BillingError> {
        let currency: Currency = currency_code.parse()?;
        self.create_bill(currency).await
    }

    /// Adds a line item under a freshly minted item id
    ///
    /// # Returns
    ///
    /// The id of the item. The item is applied asynchronously by the bill's
    /// workflow.
    ///
    /// # Errors
    ///
    /// * `BillingError::Validation` for an out-of-range amount or description
    /// * `BillingError::BillNotFound` if the bill does not exist
    /// * `BillingError::BillNotOpen` if the bill is closed
    pub async fn add_line_item(
        &self,
        bill_id: BillId,
        amount: i64,
        description: &str,
    ) -> Result<LineItemId, BillingError> {
        self.add_line_item_with_id(bill_id, LineItemId::new(), amount, description)
            .await
    }

    /// Adds a line item under a caller-supplied id
    ///
    /// Resending the same id is safe; the item is applied once.
    #[instrument(skip(self, description))]
    pub async fn add_line_item_with_id(
        &self,
        bill_id: BillId,
        item_id: LineItemId,
        amount: i64,
        description: &str,
    ) -> Result<LineItemId, BillingError> {
        let request = AddItemRequest::new(amount, description);
        request.validate()?;

        let bill = self.get_bill(bill_id).await?;
        bill.ensure_open()?;

        let signal = AddItemSignal::new(item_id, request.amount, request.description);
        self.deliver(bill_id, ADD_ITEM_SIGNAL, &signal).await?;

        Ok(item_id)
    }

    /// Requests that a bill be closed
    #[instrument(skip(self))]
    pub async fn close_bill(&self, bill_id: BillId) -> Result<(), BillingError> {
        let bill = self.get_bill(bill_id).await?;
        bill.ensure_open()?;

        self.deliver(bill_id, CLOSE_BILL_SIGNAL, &CloseBillSignal::default())
            .await
    }

    /// Sends a signal to an open bill's workflow
    ///
    /// An instance that is not running (it faulted, or its start failed) is
    /// resumed from the stored bill first. Journaled signals it had not
    /// handled are replayed ahead of this one.
    async fn deliver<P: Serialize>(
        &self,
        bill_id: BillId,
        signal_name: &str,
        payload: &P,
    ) -> Result<(), BillingError> {
        let key = bill_id.instance_key();
        match self.engine.signal_instance(&key, signal_name, payload).await {
            Ok(_) => return Ok(()),
            Err(EngineError::InstanceNotRunning(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let bill = self.get_bill(bill_id).await?;
        bill.ensure_open()?;

        let workflow = BillWorkflow::resume(&bill, self.activities.clone());
        match self.engine.start_instance(&key, workflow).await {
            Ok(replayed) => warn!(%bill_id, replayed, "Bill workflow was not running, resumed"),
            Err(EngineError::AlreadyRunning(_)) => {}
            Err(e) => return Err(e.into()),
        }

        match self.engine.signal_instance(&key, signal_name, payload).await {
            Ok(_) => Ok(()),
            Err(EngineError::InstanceNotRunning(key)) => {
                // The replayed backlog may have closed the bill.
                self.get_bill(bill_id).await?.ensure_open()?;
                Err(EngineError::InstanceNotRunning(key).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_bill(&self, bill_id: BillId) -> Result<Bill, BillingError> {
        self.ledger
            .get_bill(bill_id)
            .await
            .map_err(|e| BillingError::from_ledger(e, bill_id))
    }

    pub async fn get_bill_with_items(&self, bill_id: BillId) -> Result<BillWithItems, BillingError> {
        let bill = self.get_bill(bill_id).await?;
        let items = self.ledger.list_line_items(bill_id).await?;
        Ok(BillWithItems { bill, items })
    }

    /// Lists a bill's line items, oldest first
    pub async fn list_line_items(&self, bill_id: BillId) -> Result<Vec<LineItem>, BillingError> {
        self.get_bill(bill_id).await?;
        Ok(self.ledger.list_line_items(bill_id).await?)
    }

    /// Lists bills, newest first
    ///
    /// `status_filter` must be `"OPEN"`, `"CLOSED"` or absent.
    pub async fn list_bills(&self, status_filter: Option<&str>) -> Result<Vec<Bill>, BillingError> {
        let status = status_filter.map(str::parse::<BillStatus>).transpose()?;
        self.list_bills_by_status(status).await
    }

    pub async fn list_bills_by_status(
        &self,
        status: Option<BillStatus>,
    ) -> Result<Vec<Bill>, BillingError> {
        Ok(self.ledger.list_bills(status).await?)
    }

    /// Restarts workflows after a process restart
    ///
    /// Every open bill without an active instance is resumed from its stored
    /// total, and its journaled signals are replayed. Closed bills that still
    /// have journaled signals get those signals discarded.
    ///
    /// # Returns
    ///
    /// The number of instances resumed
    #[instrument(skip(self))]
    pub async fn recover_open_bills(&self) -> Result<usize, BillingError> {
        let mut resumed = 0;

        for bill in self.ledger.list_bills(Some(BillStatus::Open)).await? {
            let key = bill.id.instance_key();
            if self.engine.is_running(&key).await {
                continue;
            }

            let workflow = BillWorkflow::resume(&bill, self.activities.clone());
            match self.engine.start_instance(&key, workflow).await {
                Ok(replayed) => {
                    resumed += 1;
                    info!(bill_id = %bill.id, replayed, "Bill workflow resumed");
                }
                Err(EngineError::AlreadyRunning(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        for key in self.engine.pending_instances().await? {
            if self.engine.is_running(&key).await {
                continue;
            }
            let bill_id = match BillId::from_instance_key(&key) {
                Ok(id) => id,
                Err(e) => {
                    warn!(error = %e, "Pending signals for unrecognized instance");
                    continue;
                }
            };

            match self.ledger.get_bill(bill_id).await {
                Ok(bill) if bill.is_open() => {}
                Ok(_) => {
                    self.engine.discard_pending(&key).await?;
                }
                Err(e) if e.is_not_found() => {
                    warn!(%bill_id, "Pending signals for unknown bill");
                    self.engine.discard_pending(&key).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(resumed, "Recovery finished");
        Ok(resumed)
    }

    /// Health of the ledger adapter
    pub async fn health(&self) -> HealthCheckResult {
        self.ledger.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_trimmed_before_validation() {
        let request = AddItemRequest::new(500, "   coffee  ");
        assert_eq!(request.description, "coffee");
        assert!(request.validate().is_ok());

        assert!(AddItemRequest::new(500, "    ").validate().is_err());
    }

    #[test]
    fn test_request_amount_bounds() {
        assert!(AddItemRequest::new(0, "a").validate().is_err());
        assert!(AddItemRequest::new(-1, "a").validate().is_err());
        assert!(AddItemRequest::new(100_000_000, "a").validate().is_ok());
        assert!(AddItemRequest::new(100_000_001, "a").validate().is_err());
    }

    #[test]
    fn test_request_description_bounds() {
        assert!(AddItemRequest::new(1, &"d".repeat(500)).validate().is_ok());
        assert!(AddItemRequest::new(1, &"d".repeat(501)).validate().is_err());
    }
}
