//! Domain Adapters
//!
//! Adapter implementations for domain ports, connecting them to PostgreSQL.
//!
//! Each adapter:
//! - Implements a port trait (`LedgerPort`, `SignalJournal`)
//! - Translates between domain models and database row types
//! - Uses the repository layer for database operations
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::{PostgresLedgerAdapter, PostgresSignalJournal};
//!
//! let ledger = Arc::new(PostgresLedgerAdapter::new(pool.clone()));
//! let journal = Arc::new(PostgresSignalJournal::new(pool));
//! ```

pub mod ledger;
pub mod signal_journal;

pub use ledger::PostgresLedgerAdapter;
pub use signal_journal::PostgresSignalJournal;
