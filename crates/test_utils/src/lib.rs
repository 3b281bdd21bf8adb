//! Test Utilities Crate
//!
//! Shared test infrastructure, fixtures, and helpers for the billing test
//! suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built test data for money, times and ids
//! - `builders`: Builders for bills and line items
//! - `database`: PostgreSQL testcontainer management
//! - `assertions`: Assertion helpers for bills

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
