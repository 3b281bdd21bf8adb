//! PostgreSQL Ledger Adapter
//!
//! Implements the billing domain's `LedgerPort` on top of [`BillRepository`].
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresLedgerAdapter;
//! use domain_billing::LedgerPort;
//! use std::sync::Arc;
//!
//! let ledger: Arc<dyn LedgerPort> = Arc::new(PostgresLedgerAdapter::new(pool));
//! let bill = ledger.get_bill(bill_id).await?;
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument, warn};

use core_kernel::{
    BillId, DomainPort, HealthCheckResult, HealthCheckable, LineItemId, Money,
    PortError,
};
use domain_billing::ports::check_status_transition;
use domain_billing::{Bill, BillStatus, InsertOutcome, LedgerPort, LineItem};

use crate::error::DatabaseError;
use crate::repositories::bill::{
    BillRepository, BillRow, BillStatus as DbBillStatus, LineItemInsert, LineItemRow,
};

const ADAPTER_ID: &str = "postgres-ledger-adapter";

/// PostgreSQL-backed implementation of the LedgerPort trait
///
/// # Error Handling
///
/// Database errors are translated to `PortError` variants:
/// - `DatabaseError::NotFound` -> `PortError::NotFound` naming the bill
/// - constraint violations -> `PortError::Validation`
/// - connection problems -> `PortError::Connection` (retried by activities)
#[derive(Debug, Clone)]
pub struct PostgresLedgerAdapter {
    repository: BillRepository,
    pool: PgPool,
}

impl PostgresLedgerAdapter {
    /// Creates a new PostgreSQL ledger adapter
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: BillRepository::new(pool.clone()),
            pool,
        }
    }

    /// Returns a reference to the underlying repository
    pub fn repository(&self) -> &BillRepository {
        &self.repository
    }
}

impl DomainPort for PostgresLedgerAdapter {}

#[async_trait]
impl HealthCheckable for PostgresLedgerAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult::healthy(ADAPTER_ID, latency_ms),
            Err(e) => HealthCheckResult::unhealthy(ADAPTER_ID, latency_ms, format!("Database error: {}", e)),
        }
    }
}

#[async_trait]
impl LedgerPort for PostgresLedgerAdapter {
    #[instrument(skip(self, bill), fields(bill_id = %bill.id, currency = %bill.currency()))]
    async fn create_bill(&self, bill: &Bill) -> Result<(), PortError> {
        debug!("Creating bill");
        self.repository
            .insert_bill(&bill_to_row(bill))
            .await
            .map_err(|e| bill_error(e, bill.id))
    }

    #[instrument(skip(self), fields(bill_id = %id))]
    async fn get_bill(&self, id: BillId) -> Result<Bill, PortError> {
        let row = self
            .repository
            .get_bill(id.into())
            .await
            .map_err(|e| bill_error(e, id))?;
        Bill::try_from(row)
    }

    #[instrument(skip(self))]
    async fn list_bills(&self, status: Option<BillStatus>) -> Result<Vec<Bill>, PortError> {
        let rows = self
            .repository
            .list_bills(status.map(DbBillStatus::from))
            .await?;
        debug!(count = rows.len(), "Listed bills");
        rows.into_iter().map(Bill::try_from).collect()
    }

    #[instrument(skip(self), fields(bill_id = %bill_id))]
    async fn list_line_items(&self, bill_id: BillId) -> Result<Vec<LineItem>, PortError> {
        let rows = self.repository.list_line_items(bill_id.into()).await?;
        rows.into_iter().map(LineItem::try_from).collect()
    }

    #[instrument(skip(self, item), fields(bill_id = %item.bill_id, item_id = %item.id, amount = %item.amount))]
    async fn insert_line_item_and_update_total(
        &self,
        item: &LineItem,
    ) -> Result<InsertOutcome, PortError> {
        let outcome = self
            .repository
            .insert_line_item_and_update_total(&line_item_to_row(item))
            .await
            .map_err(|e| bill_error(e, item.bill_id))?;

        match outcome {
            LineItemInsert::Inserted { new_total } => {
                let new_total = Money::new(new_total, item.amount.currency())
                    .map_err(|e| PortError::transformation(e.to_string()))?;
                debug!(%new_total, "Line item stored");
                Ok(InsertOutcome::Inserted { new_total })
            }
            LineItemInsert::Duplicate => {
                warn!("Line item already stored, skipping");
                Ok(InsertOutcome::Duplicate)
            }
        }
    }

    #[instrument(skip(self), fields(bill_id = %bill_id, status = %status))]
    async fn update_bill_status(
        &self,
        bill_id: BillId,
        status: BillStatus,
        closed_at: Option<DateTime<Utc>>,
    ) -> Result<(), PortError> {
        check_status_transition(status, closed_at)?;
        self.repository
            .update_bill_status(bill_id.into(), status.into(), closed_at)
            .await
            .map_err(|e| bill_error(e, bill_id))
    }
}

/// Maps a repository error, naming the bill when it is missing
fn bill_error(error: DatabaseError, bill_id: BillId) -> PortError {
    if error.is_not_found() {
        PortError::not_found("Bill", bill_id)
    } else {
        error.into()
    }
}

impl From<BillStatus> for DbBillStatus {
    fn from(status: BillStatus) -> Self {
        match status {
            BillStatus::Open => DbBillStatus::Open,
            BillStatus::Closed => DbBillStatus::Closed,
        }
    }
}

impl From<DbBillStatus> for BillStatus {
    fn from(status: DbBillStatus) -> Self {
        match status {
            DbBillStatus::Open => BillStatus::Open,
            DbBillStatus::Closed => BillStatus::Closed,
        }
    }
}

fn bill_to_row(bill: &Bill) -> BillRow {
    BillRow {
        id: bill.id.into(),
        currency: bill.currency().code().to_string(),
        status: bill.status.into(),
        total_amount: bill.total.amount(),
        created_at: bill.created_at,
        closed_at: bill.closed_at,
    }
}

fn line_item_to_row(item: &LineItem) -> LineItemRow {
    LineItemRow {
        id: item.id.into(),
        bill_id: item.bill_id.into(),
        amount: item.amount.amount(),
        currency: item.amount.currency().code().to_string(),
        description: item.description.clone(),
        created_at: item.created_at,
    }
}

impl TryFrom<BillRow> for Bill {
    type Error = PortError;

    fn try_from(row: BillRow) -> Result<Self, Self::Error> {
        let total = Money::from_code(row.total_amount, &row.currency).map_err(|e| {
            PortError::transformation(format!("bill {}: {}", row.id, e))
        })?;
        Ok(Bill {
            id: BillId::from_uuid(row.id),
            status: row.status.into(),
            total,
            created_at: row.created_at,
            closed_at: row.closed_at,
        })
    }
}

impl TryFrom<LineItemRow> for LineItem {
    type Error = PortError;

    fn try_from(row: LineItemRow) -> Result<Self, Self::Error> {
        let amount = Money::from_code(row.amount, &row.currency).map_err(|e| {
            PortError::transformation(format!("line item {}: {}", row.id, e))
        })?;
        Ok(LineItem {
            id: LineItemId::from_uuid(row.id),
            bill_id: BillId::from_uuid(row.bill_id),
            amount,
            description: row.description,
            created_at: row.created_at,
        })
    }
}
