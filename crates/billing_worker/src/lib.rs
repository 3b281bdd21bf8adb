//! Billing Worker
//!
//! Process wiring for the bill workflows: configuration, tracing, the
//! PostgreSQL adapters and the workflow engine.

pub mod config;
pub mod telemetry;

use std::sync::Arc;

use core_kernel::SystemClock;
use domain_billing::BillingService;
use durable_runtime::{global, ActivityOptions, EngineError, WorkflowEngine};
use infra_db::{DatabasePool, PostgresLedgerAdapter, PostgresSignalJournal};

pub use config::{LogFormat, WorkerConfig};

/// Engine that journals signals in the same database as the ledger
pub fn build_engine(pool: DatabasePool) -> Arc<WorkflowEngine> {
    let journal = Arc::new(PostgresSignalJournal::new(pool));
    Arc::new(WorkflowEngine::new(journal, Arc::new(SystemClock)))
}

/// Builds a private engine and a billing service over it
///
/// For embedding and tests; the worker binary uses
/// [`build_installed_service`] instead.
pub fn build_service(
    pool: DatabasePool,
    options: ActivityOptions,
) -> (BillingService, Arc<WorkflowEngine>) {
    let engine = build_engine(pool.clone());
    let ledger = Arc::new(PostgresLedgerAdapter::new(pool));
    let service = BillingService::new(ledger, engine.clone(), options);
    (service, engine)
}

/// Installs a process-wide engine and builds the service on it
///
/// # Errors
///
/// `EngineError::AlreadyInstalled` if an engine is already installed
pub fn build_installed_service(
    pool: DatabasePool,
    options: ActivityOptions,
) -> Result<BillingService, EngineError> {
    global::install(build_engine(pool.clone()))?;
    let engine = global::engine()?;
    let ledger = Arc::new(PostgresLedgerAdapter::new(pool));
    Ok(BillingService::new(ledger, engine, options))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_installed_service_shares_global_engine() {
        let pool = DatabasePool::connect_lazy("postgres://localhost/billing").unwrap();
        let options = WorkerConfig::default().activity_options();

        let service = build_installed_service(pool.clone(), options.clone()).unwrap();
        let installed = global::engine().unwrap();
        assert!(Arc::ptr_eq(service.engine(), &installed));

        assert!(matches!(
            build_installed_service(pool, options),
            Err(EngineError::AlreadyInstalled)
        ));

        global::teardown().await;
        assert!(matches!(global::engine(), Err(EngineError::Unavailable)));
    }
}
