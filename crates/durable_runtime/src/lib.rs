//! Durable Runtime - the execution substrate for long-lived workflows
//!
//! This crate runs one cooperative instance per workflow key and gives each
//! instance the guarantees a billing lifecycle needs:
//!
//! - **Single instance**: at most one active instance per key
//! - **Durable signals**: every signal is journaled before delivery and is
//!   acknowledged only after it has been handled to completion, so signals
//!   survive restarts and are delivered at least once
//! - **Retried activities**: side effects run through [`run_activity`] with
//!   exponential backoff inside a total completion timeout
//! - **Replay-safe time**: the instance's "now" is the journal stamp of the
//!   signal being handled
//!
//! ```text
//! caller ──signal_instance──► SignalJournal.append ──► inbox (FIFO)
//!                                                        │
//!                                                        ▼
//!                                          Workflow::on_signal (one at a time)
//!                                                        │
//!                                            run_activity (retry/backoff)
//!                                                        │
//!                                                        ▼
//!                                          SignalJournal.acknowledge
//! ```

pub mod error;
pub mod retry;
pub mod journal;
pub mod workflow;
pub mod engine;
pub mod global;

pub use error::{ActivityError, EngineError, WorkflowFault};
pub use retry::{run_activity, ActivityOptions, RetryPolicy};
pub use journal::{Envelope, InMemorySignalJournal, SignalJournal};
pub use workflow::{InstanceOutcome, Workflow, WorkflowContext};
pub use engine::WorkflowEngine;
