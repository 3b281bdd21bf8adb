//! Workflow signal repository
//!
//! Append-only journal of signals. Rows are never deleted; acknowledging a
//! signal stamps `acknowledged_at`.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::error::DatabaseError;

/// Repository for the `workflow_signals` table
#[derive(Debug, Clone)]
pub struct SignalRepository {
    pool: PgPool,
}

impl SignalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends a signal and returns the stored row
    pub async fn append(
        &self,
        instance_id: &str,
        name: &str,
        payload: &Value,
        received_at: DateTime<Utc>,
    ) -> Result<SignalRow, DatabaseError> {
        let row = sqlx::query_as::<_, SignalRow>(
            r#"
            INSERT INTO workflow_signals (instance_id, name, payload, received_at)
            VALUES ($1, $2, $3, $4)
            RETURNING seq, instance_id, name, payload, received_at
            "#,
        )
        .bind(instance_id)
        .bind(name)
        .bind(payload)
        .bind(received_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Unacknowledged signals of one instance in `seq` order
    pub async fn pending(&self, instance_id: &str) -> Result<Vec<SignalRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, SignalRow>(
            r#"
            SELECT seq, instance_id, name, payload, received_at
            FROM workflow_signals
            WHERE instance_id = $1 AND acknowledged_at IS NULL
            ORDER BY seq ASC
            "#,
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Marks a signal handled; repeating the call is a no-op
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` for an unknown `seq`
    pub async fn acknowledge(&self, seq: i64) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_signals
            SET acknowledged_at = NOW()
            WHERE seq = $1 AND acknowledged_at IS NULL
            "#,
        )
        .bind(seq)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM workflow_signals WHERE seq = $1)")
                    .bind(seq)
                    .fetch_one(&self.pool)
                    .await?;
            if !exists {
                return Err(DatabaseError::not_found("Signal", seq));
            }
        }
        Ok(())
    }

    /// Instance ids that have at least one unacknowledged signal
    pub async fn instances_with_pending(&self) -> Result<Vec<String>, DatabaseError> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT instance_id
            FROM workflow_signals
            WHERE acknowledged_at IS NULL
            ORDER BY instance_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

/// Database row for a journaled signal
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SignalRow {
    pub seq: i64,
    pub instance_id: String,
    pub name: String,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}
