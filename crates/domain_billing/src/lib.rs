//! Billing Domain - Bill Lifecycle
//!
//! A bill accumulates line items while it is open and is closed exactly once.
//! Every bill is driven by its own durable workflow instance, so concurrent
//! requests against the same bill are applied one at a time, in delivery
//! order.
//!
//! # Lifecycle
//!
//! ```text
//!   create_bill ──► OPEN ──add-item──► OPEN ──close-bill──► CLOSED
//!                    ▲                  │
//!                    └──────────────────┘
//! ```
//!
//! # Correctness
//!
//! - A line item is persisted together with the new total in one transaction,
//!   and at most once per item id
//! - The in-memory running total only advances after the store commits
//! - Finalization updates status and close time only; the stored total is
//!   never overwritten
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::BillingService;
//!
//! let service = BillingService::new(ledger, engine, ActivityOptions::default());
//! let bill = service.create_bill(Currency::USD).await?;
//! service.add_line_item(bill.id, 500, "coffee").await?;
//! service.close_bill(bill.id).await?;
//! ```

pub mod bill;
pub mod signal;
pub mod ports;
pub mod activities;
pub mod workflow;
pub mod service;
pub mod error;

pub use bill::{Bill, BillStatus, LineItem};
pub use signal::{AddItemSignal, SignalRejection, SignalValidator, SignalViolation, ValidatedItem};
pub use ports::{InsertOutcome, LedgerPort};
pub use activities::BillActivities;
pub use workflow::{BillState, BillWorkflow};
pub use service::{AddItemRequest, BillWithItems, BillingService};
pub use error::BillingError;
