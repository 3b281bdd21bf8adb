//! Workflow contract

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::WorkflowFault;
use crate::journal::Envelope;

/// Deterministic context handed to a workflow for each signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowContext {
    instance_key: String,
    seq: i64,
    now: DateTime<Utc>,
    replaying: bool,
}

impl WorkflowContext {
    pub fn new(instance_key: impl Into<String>, seq: i64, now: DateTime<Utc>, replaying: bool) -> Self {
        Self {
            instance_key: instance_key.into(),
            seq,
            now,
            replaying,
        }
    }

    /// Builds the context for handling an envelope
    pub fn for_envelope(envelope: &Envelope, replaying: bool) -> Self {
        Self::new(
            envelope.instance_key.clone(),
            envelope.seq,
            envelope.received_at,
            replaying,
        )
    }

    pub fn instance_key(&self) -> &str {
        &self.instance_key
    }

    /// Journal sequence of the signal being handled
    pub fn seq(&self) -> i64 {
        self.seq
    }

    /// Replay-safe current time
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// True while re-handling signals that were journaled before this instance started
    pub fn is_replaying(&self) -> bool {
        self.replaying
    }
}

/// A long-lived, signal-driven workflow
///
/// The engine calls `on_signal` once per journaled signal, in journal order,
/// never concurrently. After each successful call it checks `is_complete`; the
/// first time it returns true the engine calls `finalize` before the signal
/// that caused completion is acknowledged.
#[async_trait]
pub trait Workflow: Send + 'static {
    /// Handles one signal. Unknown signal names should be ignored.
    async fn on_signal(&mut self, ctx: &WorkflowContext, envelope: &Envelope) -> Result<(), WorkflowFault>;

    /// Whether the workflow has reached its terminal state
    fn is_complete(&self) -> bool;

    /// Runs once after completion
    async fn finalize(&mut self, ctx: &WorkflowContext) -> Result<(), WorkflowFault>;
}

/// How an instance ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceOutcome {
    /// The workflow completed and finalized
    Completed,
    /// A signal could not be handled; unacknowledged signals remain journaled
    Faulted(WorkflowFault),
    /// The engine shut down before the workflow completed
    Aborted,
}

impl InstanceOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, InstanceOutcome::Completed)
    }
}
