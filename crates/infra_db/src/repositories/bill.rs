//! Bill repository implementation
//!
//! Database access for bills and line items. Inserting a line item and
//! updating the bill total happen in one transaction with the bill row locked.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use core_kernel::Money;

use crate::error::DatabaseError;

/// Repository for bills and their line items
#[derive(Debug, Clone)]
pub struct BillRepository {
    pool: PgPool,
}

/// Result of a line item insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineItemInsert {
    /// Inserted; carries the new bill total in minor units
    Inserted { new_total: i64 },
    /// A line item with the same id already exists for the bill
    Duplicate,
}

impl BillRepository {
    /// Creates a new BillRepository with the given connection pool
    ///
    /// # Arguments
    ///
    /// * `pool` - The PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a new bill
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::DuplicateEntry` if the id is taken
    pub async fn insert_bill(&self, bill: &BillRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO bills (id, currency, status, total_amount, created_at, closed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(bill.id)
        .bind(&bill.currency)
        .bind(bill.status)
        .bind(bill.total_amount)
        .bind(bill.created_at)
        .bind(bill.closed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Retrieves a bill by its identifier
    pub async fn get_bill(&self, id: Uuid) -> Result<BillRow, DatabaseError> {
        sqlx::query_as::<_, BillRow>(
            r#"
            SELECT id, currency, status, total_amount, created_at, closed_at
            FROM bills
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Bill", id))
    }

    /// Lists bills newest first, optionally filtered by status
    pub async fn list_bills(&self, status: Option<BillStatus>) -> Result<Vec<BillRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, BillRow>(
            r#"
            SELECT id, currency, status, total_amount, created_at, closed_at
            FROM bills
            WHERE $1::bill_status IS NULL OR status = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Lists a bill's line items oldest first
    pub async fn list_line_items(&self, bill_id: Uuid) -> Result<Vec<LineItemRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, LineItemRow>(
            r#"
            SELECT id, bill_id, amount, currency, description, created_at
            FROM line_items
            WHERE bill_id = $1
            ORDER BY created_at ASC, inserted_seq ASC
            "#,
        )
        .bind(bill_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Inserts a line item and adds its amount to the bill total
    ///
    /// Runs in one transaction. The bill row is locked before the duplicate
    /// check, so the check and the total update see a stable total.
    ///
    /// # Returns
    ///
    /// `LineItemInsert::Duplicate` if the item was already stored, otherwise
    /// the new total
    ///
    /// # Errors
    ///
    /// * `DatabaseError::NotFound` if the bill does not exist
    /// * `DatabaseError::ConstraintViolation` on currency mismatch or overflow
    pub async fn insert_line_item_and_update_total(
        &self,
        item: &LineItemRow,
    ) -> Result<LineItemInsert, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let bill = sqlx::query_as::<_, (String, i64)>(
            "SELECT currency, total_amount FROM bills WHERE id = $1 FOR UPDATE",
        )
        .bind(item.bill_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Bill", item.bill_id))?;

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM line_items WHERE bill_id = $1 AND id = $2)",
        )
        .bind(item.bill_id)
        .bind(item.id)
        .fetch_one(&mut *tx)
        .await?;

        if exists {
            tx.commit().await?;
            debug!(bill_id = %item.bill_id, item_id = %item.id, "Line item already stored");
            return Ok(LineItemInsert::Duplicate);
        }

        let (currency, total_amount) = bill;
        let current = Money::from_code(total_amount, &currency)
            .map_err(|e| DatabaseError::InvalidData(e.to_string()))?;
        let amount = Money::from_code(item.amount, &item.currency)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;
        let new_total = current
            .checked_add(&amount)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO line_items (id, bill_id, amount, currency, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(item.id)
        .bind(item.bill_id)
        .bind(item.amount)
        .bind(&item.currency)
        .bind(&item.description)
        .bind(item.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE bills SET total_amount = $2 WHERE id = $1")
            .bind(item.bill_id)
            .bind(new_total.amount())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(LineItemInsert::Inserted {
            new_total: new_total.amount(),
        })
    }

    /// Sets status and close time, leaving the total untouched
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if the bill does not exist
    pub async fn update_bill_status(
        &self,
        id: Uuid,
        status: BillStatus,
        closed_at: Option<DateTime<Utc>>,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE bills SET status = $2, closed_at = $3 WHERE id = $1")
            .bind(id)
            .bind(status)
            .bind(closed_at)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Bill", id));
        }
        Ok(())
    }
}

/// Bill status as stored in PostgreSQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "bill_status", rename_all = "UPPERCASE")]
pub enum BillStatus {
    Open,
    Closed,
}

/// Database row for a bill
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct BillRow {
    pub id: Uuid,
    pub currency: String,
    pub status: BillStatus,
    pub total_amount: i64,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Database row for a line item
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LineItemRow {
    pub id: Uuid,
    pub bill_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
