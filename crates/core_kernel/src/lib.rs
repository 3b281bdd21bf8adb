//! Core Kernel - Foundational types for the billing ledger
//!
//! This crate provides the building blocks shared by every other crate:
//! - Money as integer minor units with checked arithmetic
//! - Strongly-typed identifiers for bills and line items
//! - A replay-safe clock abstraction
//! - Port error types and adapter seams

pub mod money;
pub mod identifiers;
pub mod clock;
pub mod ports;
pub mod error;

pub use money::{Money, Currency, MoneyError};
pub use identifiers::{BillId, LineItemId};
pub use clock::{Clock, SystemClock, ManualClock};
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth,
};
pub use error::CoreError;
