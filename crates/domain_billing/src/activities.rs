//! Bill activities
//!
//! The side effects of the bill workflow. Each call goes through
//! [`run_activity`], so transient ledger failures are retried with backoff and
//! permanent ones fault the instance.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use core_kernel::BillId;
use durable_runtime::{run_activity, ActivityError, ActivityOptions, WorkflowFault};

use crate::bill::{BillStatus, LineItem};
use crate::ports::{InsertOutcome, LedgerPort};

pub const INSERT_LINE_ITEM_ACTIVITY: &str = "insert-line-item";
pub const FINALIZE_BILL_ACTIVITY: &str = "finalize-bill";

/// Ledger activities shared by all bill workflows
#[derive(Clone)]
pub struct BillActivities {
    ledger: Arc<dyn LedgerPort>,
    options: ActivityOptions,
}

impl BillActivities {
    pub fn new(ledger: Arc<dyn LedgerPort>, options: ActivityOptions) -> Self {
        Self { ledger, options }
    }

    pub fn options(&self) -> &ActivityOptions {
        &self.options
    }

    /// Persists a line item and updates the bill total.
    ///
    /// Safe to repeat: a second call with the same item id reports
    /// `InsertOutcome::Duplicate` without changing anything.
    pub async fn add_line_item(&self, item: &LineItem) -> Result<InsertOutcome, WorkflowFault> {
        let ledger = &self.ledger;
        run_activity(INSERT_LINE_ITEM_ACTIVITY, &self.options, move |attempt| async move {
            debug!(bill_id = %item.bill_id, item_id = %item.id, attempt, "Inserting line item");
            ledger
                .insert_line_item_and_update_total(item)
                .await
                .map_err(ActivityError::from)
        })
        .await
    }

    /// Marks a bill closed at `closed_at`, leaving the stored total as is.
    pub async fn finalize_bill(
        &self,
        bill_id: BillId,
        closed_at: DateTime<Utc>,
    ) -> Result<(), WorkflowFault> {
        let ledger = &self.ledger;
        run_activity(FINALIZE_BILL_ACTIVITY, &self.options, move |attempt| async move {
            debug!(bill_id = %bill_id, attempt, "Finalizing bill");
            ledger
                .update_bill_status(bill_id, BillStatus::Closed, Some(closed_at))
                .await
                .map_err(ActivityError::from)
        })
        .await
    }
}

impl std::fmt::Debug for BillActivities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillActivities")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
