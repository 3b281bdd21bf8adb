//! PostgreSQL Signal Journal
//!
//! Durable `SignalJournal` for the workflow engine, backed by the
//! `workflow_signals` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{DomainPort, HealthCheckResult, HealthCheckable, PortError};
use durable_runtime::{Envelope, SignalJournal};

use crate::repositories::signal::{SignalRepository, SignalRow};

const ADAPTER_ID: &str = "postgres-signal-journal";

/// PostgreSQL-backed signal journal
#[derive(Debug, Clone)]
pub struct PostgresSignalJournal {
    repository: SignalRepository,
    pool: PgPool,
}

impl PostgresSignalJournal {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: SignalRepository::new(pool.clone()),
            pool,
        }
    }
}

impl DomainPort for PostgresSignalJournal {}

#[async_trait]
impl HealthCheckable for PostgresSignalJournal {
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
impl SignalJournal for PostgresSignalJournal {
    #[instrument(skip(self, payload), fields(instance = %instance_key, signal = %name))]
    async fn append(
        &self,
        instance_key: &str,
        name: &str,
        payload: Value,
        received_at: DateTime<Utc>,
    ) -> Result<Envelope, PortError> {
        let row = self
            .repository
            .append(instance_key, name, &payload, received_at)
            .await?;
        debug!(seq = row.seq, "Signal journaled");
        Ok(row.into())
    }

    async fn pending(&self, instance_key: &str) -> Result<Vec<Envelope>, PortError> {
        let rows = self.repository.pending(instance_key).await?;
        Ok(rows.into_iter().map(Envelope::from).collect())
    }

    #[instrument(skip(self))]
    async fn acknowledge(&self, seq: i64) -> Result<(), PortError> {
        self.repository.acknowledge(seq).await.map_err(|e| {
            if e.is_not_found() {
                PortError::not_found("Signal", seq)
            } else {
                e.into()
            }
        })
    }

    async fn instances_with_pending(&self) -> Result<Vec<String>, PortError> {
        Ok(self.repository.instances_with_pending().await?)
    }
}

impl From<SignalRow> for Envelope {
    fn from(row: SignalRow) -> Self {
        Envelope {
            seq: row.seq,
            instance_key: row.instance_id,
            name: row.name,
            payload: row.payload,
            received_at: row.received_at,
        }
    }
}
