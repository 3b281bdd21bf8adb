//! Billing Worker Binary
//!
//! Hosts the bill workflows. On start it resumes every open bill and replays
//! journaled signals, then runs until Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! BILLING_DATABASE_URL=postgres://... cargo run --bin billing-worker
//! ```
//!
//! # Environment Variables
//!
//! * `BILLING_DATABASE_URL` - PostgreSQL connection string
//! * `BILLING_LOG_LEVEL` - trace, debug, info, warn, error (default: info)
//! * `BILLING_LOG_FORMAT` - pretty or json (default: pretty)
//! * `BILLING_RETRY_MAX_ATTEMPTS` - attempts per activity (default: 5)
//! * `BILLING_ACTIVITY_TIMEOUT_SECS` - time budget per activity (default: 300)

use anyhow::Context;
use tracing::{info, warn};

use billing_worker::{build_installed_service, telemetry, WorkerConfig};
use core_kernel::AdapterHealth;
use durable_runtime::global;
use infra_db::{create_pool, run_migrations};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env().context("invalid BILLING_* configuration")?;
    telemetry::init_tracing(&config.log_level, config.log_format)?;

    info!(
        max_attempts = config.retry_max_attempts,
        activity_timeout_secs = config.activity_timeout_secs,
        "Starting billing worker"
    );

    let pool = create_pool(config.database_config())
        .await
        .context("connecting to database")?;
    run_migrations(&pool).await.context("running migrations")?;

    let service = build_installed_service(pool.clone(), config.activity_options())?;

    let resumed = service
        .recover_open_bills()
        .await
        .context("recovering open bills")?;
    info!(resumed, "Open bills recovered");

    let health = service.health().await;
    match health.status {
        AdapterHealth::Healthy => info!(latency_ms = health.latency_ms, "Ledger healthy"),
        status => warn!(?status, message = ?health.message, "Ledger not healthy"),
    }

    tokio::signal::ctrl_c()
        .await
        .context("installing Ctrl+C handler")?;
    info!("Received Ctrl+C, shutting down");

    global::teardown().await;
    pool.close().await;

    info!("Billing worker stopped");
    Ok(())
}
