//! Bill lifecycle workflow
//!
//! One instance per bill. Handles `add-item` and `close-bill` signals one at a
//! time, in journal order.
//!
//! # Add-item handling
//!
//! 1. Decode and validate the payload; invalid signals are logged and dropped
//! 2. Drop the signal if the bill is already closed
//! 3. Persist the item and the new total through the insert activity
//! 4. Advance the in-memory total only if the store reports a fresh insert
//!
//! Close sets a one-way latch. The engine then finalizes the instance, which
//! marks the bill closed at the close signal's logical time.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use core_kernel::{BillId, Currency, Money};
use durable_runtime::{Envelope, Workflow, WorkflowContext, WorkflowFault};

use crate::activities::BillActivities;
use crate::bill::{Bill, LineItem};
use crate::ports::InsertOutcome;
use crate::signal::{AddItemSignal, SignalValidator, ADD_ITEM_SIGNAL, CLOSE_BILL_SIGNAL};

/// In-memory state of a running bill instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillState {
    pub bill_id: BillId,
    pub running_total: Money,
    pub closed: bool,
}

/// The workflow driving a single bill
#[derive(Debug)]
pub struct BillWorkflow {
    state: BillState,
    activities: BillActivities,
}

impl BillWorkflow {
    /// Creates the workflow for a freshly created bill
    pub fn new(bill_id: BillId, currency: Currency, activities: BillActivities) -> Self {
        Self {
            state: BillState {
                bill_id,
                running_total: Money::zero(currency),
                closed: false,
            },
            activities,
        }
    }

    /// Creates the workflow for an existing bill, starting from its stored total
    pub fn resume(bill: &Bill, activities: BillActivities) -> Self {
        Self {
            state: BillState {
                bill_id: bill.id,
                running_total: bill.total,
                closed: !bill.is_open(),
            },
            activities,
        }
    }

    pub fn state(&self) -> &BillState {
        &self.state
    }

    async fn handle_add_item(
        &mut self,
        ctx: &WorkflowContext,
        envelope: &Envelope,
    ) -> Result<(), WorkflowFault> {
        let bill_id = self.state.bill_id;

        let signal: AddItemSignal = match envelope.decode() {
            Ok(signal) => signal,
            Err(e) => {
                warn!(%bill_id, seq = envelope.seq, error = %e, "Dropping undecodable add-item signal");
                return Ok(());
            }
        };

        let item = match SignalValidator::validate(&signal) {
            Ok(item) => item,
            Err(rejection) => {
                warn!(%bill_id, seq = envelope.seq, reasons = %rejection, "Dropping invalid add-item signal");
                return Ok(());
            }
        };

        if self.state.closed {
            warn!(%bill_id, item_id = %item.item_id, "Dropping add-item signal for closed bill");
            return Ok(());
        }

        let amount = match Money::new(item.amount, self.state.running_total.currency()) {
            Ok(amount) => amount,
            Err(e) => {
                warn!(%bill_id, item_id = %item.item_id, error = %e, "Dropping add-item signal");
                return Ok(());
            }
        };

        let line_item = LineItem {
            id: item.item_id,
            bill_id,
            amount,
            description: item.description,
            created_at: ctx.now(),
        };

        match self.activities.add_line_item(&line_item).await? {
            InsertOutcome::Inserted { new_total } => {
                let advanced = self
                    .state
                    .running_total
                    .checked_add(&amount)
                    .map_err(|e| WorkflowFault::Internal(e.to_string()))?;

                if advanced != new_total {
                    warn!(
                        %bill_id,
                        in_memory = advanced.amount(),
                        stored = new_total.amount(),
                        "Running total diverged from store, using stored total"
                    );
                }
                self.state.running_total = new_total;

                info!(
                    %bill_id,
                    item_id = %line_item.id,
                    amount = amount.amount(),
                    total = new_total.amount(),
                    "Line item added"
                );
            }
            InsertOutcome::Duplicate => {
                debug!(%bill_id, item_id = %line_item.id, "Line item already applied");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Workflow for BillWorkflow {
    async fn on_signal(
        &mut self,
        ctx: &WorkflowContext,
        envelope: &Envelope,
    ) -> Result<(), WorkflowFault> {
        match envelope.name.as_str() {
            ADD_ITEM_SIGNAL => self.handle_add_item(ctx, envelope).await,
            CLOSE_BILL_SIGNAL => {
                if !self.state.closed {
                    self.state.closed = true;
                    info!(bill_id = %self.state.bill_id, "Close requested");
                }
                Ok(())
            }
            other => {
                warn!(bill_id = %self.state.bill_id, signal = other, "Ignoring unknown signal");
                Ok(())
            }
        }
    }

    fn is_complete(&self) -> bool {
        self.state.closed
    }

    async fn finalize(&mut self, ctx: &WorkflowContext) -> Result<(), WorkflowFault> {
        self.activities
            .finalize_bill(self.state.bill_id, ctx.now())
            .await?;

        info!(
            bill_id = %self.state.bill_id,
            total = self.state.running_total.amount(),
            "Bill closed"
        );
        Ok(())
    }
}
