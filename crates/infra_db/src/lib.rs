//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the billing ledger and the workflow signal
//! journal, using SQLx.
//!
//! # Architecture
//!
//! Repositories own the SQL and work in row types. Adapters implement the
//! domain ports on top of them and translate [`DatabaseError`] into
//! `PortError`.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresLedgerAdapter};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/billing")).await?;
//! run_migrations(&pool).await?;
//! let ledger = PostgresLedgerAdapter::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool};
pub use error::DatabaseError;
pub use adapters::{PostgresLedgerAdapter, PostgresSignalJournal};
