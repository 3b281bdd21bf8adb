//! Repository implementations
//!
//! Repositories encapsulate SQL and work in database row types. Adapters in
//! [`crate::adapters`] map rows to domain types.
//!
//! # Architecture
//!
//! Each repository follows these principles:
//! - Runtime-checked queries with bound parameters
//! - One transaction per multi-statement operation
//! - Row locks (`FOR UPDATE`) where a read feeds a write

pub mod bill;
pub mod signal;

pub use bill::{BillRepository, BillRow, LineItemInsert, LineItemRow};
pub use signal::{SignalRepository, SignalRow};
