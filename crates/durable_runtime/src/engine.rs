//! Workflow engine
//!
//! Owns the registry of running instances. Each instance is a tokio task that
//! drains a FIFO inbox: first the signals already pending in the journal when
//! the instance started, then the signals delivered through
//! [`WorkflowEngine::signal_instance`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use core_kernel::{Clock, SystemClock};
use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{EngineError, WorkflowFault};
use crate::journal::{Envelope, InMemorySignalJournal, SignalJournal};
use crate::workflow::{InstanceOutcome, Workflow, WorkflowContext};

struct InstanceHandle {
    sender: mpsc::UnboundedSender<Envelope>,
    outcome: watch::Receiver<Option<InstanceOutcome>>,
    task: JoinHandle<()>,
}

/// Serializes journal access for one instance key
type Gate = Arc<Mutex<()>>;

#[derive(Default)]
struct Registry {
    running: HashMap<String, InstanceHandle>,
    finished: HashMap<String, InstanceOutcome>,
    gates: HashMap<String, Gate>,
    shut_down: bool,
}

impl Registry {
    fn ensure_accepting(&self) -> Result<(), EngineError> {
        if self.shut_down {
            return Err(EngineError::Unavailable);
        }
        Ok(())
    }
}

/// Runs durable workflow instances
///
/// The registry lock is only held for map updates. Journal I/O runs under a
/// per-key gate, so a slow append for one instance never delays another.
pub struct WorkflowEngine {
    journal: Arc<dyn SignalJournal>,
    clock: Arc<dyn Clock>,
    registry: Arc<Mutex<Registry>>,
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine").finish_non_exhaustive()
    }
}

impl WorkflowEngine {
    /// Creates an engine over a journal and a time source
    pub fn new(journal: Arc<dyn SignalJournal>, clock: Arc<dyn Clock>) -> Self {
        Self {
            journal,
            clock,
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Creates an engine with an in-memory journal and the system clock
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemorySignalJournal::new()), Arc::new(SystemClock))
    }

    pub fn journal(&self) -> Arc<dyn SignalJournal> {
        Arc::clone(&self.journal)
    }

    /// Current time according to the engine's clock
    ///
    /// Use this outside of workflow code only. Inside a workflow, use
    /// [`WorkflowContext::now`].
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Starts an instance under `instance_key`.
    ///
    /// Signals already pending in the journal for this key are handed to the
    /// instance first, in journal order.
    ///
    /// # Returns
    ///
    /// The number of pending signals that will be replayed
    ///
    /// # Errors
    ///
    /// * `EngineError::AlreadyRunning` if an instance with this key is active
    /// * `EngineError::Unavailable` after shutdown
    /// * `EngineError::Journal` if pending signals cannot be loaded
    #[instrument(skip(self, workflow))]
    pub async fn start_instance<W: Workflow>(
        &self,
        instance_key: &str,
        workflow: W,
    ) -> Result<usize, EngineError> {
        let gate = self.gate(instance_key).await;
        let started = {
            let _turn = gate.lock().await;
            self.start_gated(instance_key, workflow).await
        };
        self.release_gate(instance_key, gate).await;
        started
    }

    async fn start_gated<W: Workflow>(
        &self,
        instance_key: &str,
        workflow: W,
    ) -> Result<usize, EngineError> {
        {
            let registry = self.registry.lock().await;
            registry.ensure_accepting()?;
            if registry.running.contains_key(instance_key) {
                return Err(EngineError::AlreadyRunning(instance_key.to_string()));
            }
        }

        // No append for this key can land between here and the insert below.
        let backlog = self.journal.pending(instance_key).await?;
        let replayed = backlog.len();

        let (sender, inbox) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let runner = InstanceRunner {
            instance_key: instance_key.to_string(),
            journal: Arc::clone(&self.journal),
            registry: Arc::clone(&self.registry),
            outcome: outcome_tx,
        };

        let mut registry = self.registry.lock().await;
        registry.ensure_accepting()?;
        // Spawned under the registry lock so the runner cannot finish before
        // its handle is registered.
        let task = tokio::spawn(runner.run(workflow, backlog, inbox));
        registry.finished.remove(instance_key);
        registry.running.insert(
            instance_key.to_string(),
            InstanceHandle {
                sender,
                outcome: outcome_rx,
                task,
            },
        );

        info!(instance = instance_key, replayed, "Workflow instance started");
        Ok(replayed)
    }

    /// Journals a signal and delivers it to a running instance.
    ///
    /// The signal is durable once this returns `Ok`, even if the instance
    /// faults before handling it.
    ///
    /// # Errors
    ///
    /// * `EngineError::InstanceNotRunning` if no active instance has this key
    /// * `EngineError::Serialization` if the payload cannot be encoded
    /// * `EngineError::Journal` if the signal cannot be journaled
    #[instrument(skip(self, payload))]
    pub async fn signal_instance<P: Serialize + ?Sized>(
        &self,
        instance_key: &str,
        signal_name: &str,
        payload: &P,
    ) -> Result<Envelope, EngineError> {
        let payload = serde_json::to_value(payload)?;

        let gate = self.gate(instance_key).await;
        let delivered = {
            let _turn = gate.lock().await;
            self.signal_gated(instance_key, signal_name, payload).await
        };
        self.release_gate(instance_key, gate).await;
        delivered
    }

    async fn signal_gated(
        &self,
        instance_key: &str,
        signal_name: &str,
        payload: serde_json::Value,
    ) -> Result<Envelope, EngineError> {
        let sender = {
            let registry = self.registry.lock().await;
            registry.ensure_accepting()?;
            registry
                .running
                .get(instance_key)
                .map(|handle| handle.sender.clone())
                .ok_or_else(|| EngineError::InstanceNotRunning(instance_key.to_string()))?
        };

        let envelope = self
            .journal
            .append(instance_key, signal_name, payload, self.clock.now())
            .await?;

        if sender.send(envelope.clone()).is_err() {
            warn!(instance = instance_key, seq = envelope.seq, "Instance inbox closed, discarding signal");
            self.journal.acknowledge(envelope.seq).await?;
            return Err(EngineError::InstanceNotRunning(instance_key.to_string()));
        }

        debug!(instance = instance_key, seq = envelope.seq, signal = signal_name, "Signal delivered");
        Ok(envelope)
    }

    async fn gate(&self, instance_key: &str) -> Gate {
        let mut registry = self.registry.lock().await;
        Arc::clone(registry.gates.entry(instance_key.to_string()).or_default())
    }

    /// Drops the key's gate once no caller holds it
    async fn release_gate(&self, instance_key: &str, gate: Gate) {
        drop(gate);
        let mut registry = self.registry.lock().await;
        if registry
            .gates
            .get(instance_key)
            .is_some_and(|held| Arc::strong_count(held) == 1)
        {
            registry.gates.remove(instance_key);
        }
    }

    /// Whether an instance with this key is active
    pub async fn is_running(&self, instance_key: &str) -> bool {
        self.registry.lock().await.running.contains_key(instance_key)
    }

    /// Keys of all active instances
    pub async fn active_instances(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.registry.lock().await.running.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Waits for an instance to end.
    ///
    /// Returns `None` if no instance with this key was started by this engine.
    pub async fn wait_for(&self, instance_key: &str) -> Option<InstanceOutcome> {
        let mut receiver = {
            let registry = self.registry.lock().await;
            if let Some(outcome) = registry.finished.get(instance_key) {
                return Some(outcome.clone());
            }
            registry.running.get(instance_key)?.outcome.clone()
        };

        let outcome = match receiver.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => Some(InstanceOutcome::Aborted),
        };
        outcome
    }

    /// Keys of instances that have unacknowledged signals in the journal
    pub async fn pending_instances(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.journal.instances_with_pending().await?)
    }

    /// Acknowledges every pending signal of an instance that is not running.
    ///
    /// # Returns
    ///
    /// The number of signals discarded
    pub async fn discard_pending(&self, instance_key: &str) -> Result<usize, EngineError> {
        let gate = self.gate(instance_key).await;
        let discarded = {
            let _turn = gate.lock().await;
            self.discard_gated(instance_key).await
        };
        self.release_gate(instance_key, gate).await;
        discarded
    }

    async fn discard_gated(&self, instance_key: &str) -> Result<usize, EngineError> {
        if self.registry.lock().await.running.contains_key(instance_key) {
            return Err(EngineError::AlreadyRunning(instance_key.to_string()));
        }

        let pending = self.journal.pending(instance_key).await?;
        for envelope in &pending {
            self.journal.acknowledge(envelope.seq).await?;
        }
        if !pending.is_empty() {
            warn!(instance = instance_key, discarded = pending.len(), "Discarded pending signals");
        }
        Ok(pending.len())
    }

    /// Stops all instances.
    ///
    /// Signals being handled at this point stay unacknowledged and are
    /// replayed when their instance is started again.
    pub async fn shutdown(&self) {
        let handles: Vec<(String, InstanceHandle)> = {
            let mut registry = self.registry.lock().await;
            registry.shut_down = true;
            registry.running.drain().collect()
        };

        let count = handles.len();
        for (key, handle) in handles {
            handle.task.abort();
            let _ = handle.task.await;
            self.registry
                .lock()
                .await
                .finished
                .insert(key, InstanceOutcome::Aborted);
        }
        info!(aborted = count, "Workflow engine shut down");
    }
}

struct InstanceRunner {
    instance_key: String,
    journal: Arc<dyn SignalJournal>,
    registry: Arc<Mutex<Registry>>,
    outcome: watch::Sender<Option<InstanceOutcome>>,
}

impl InstanceRunner {
    async fn run<W: Workflow>(
        self,
        mut workflow: W,
        backlog: Vec<Envelope>,
        mut inbox: mpsc::UnboundedReceiver<Envelope>,
    ) {
        let mut backlog = backlog.into_iter();

        loop {
            let (envelope, replaying) = match backlog.next() {
                Some(envelope) => (envelope, true),
                None => match inbox.recv().await {
                    Some(envelope) => (envelope, false),
                    None => {
                        self.finish(InstanceOutcome::Aborted).await;
                        return;
                    }
                },
            };

            match self.handle(&mut workflow, &envelope, replaying).await {
                Ok(false) => {}
                Ok(true) => {
                    self.complete(backlog.collect(), inbox).await;
                    return;
                }
                Err(fault) => {
                    error!(
                        instance = %self.instance_key,
                        seq = envelope.seq,
                        signal = %envelope.name,
                        error = %fault,
                        "Workflow instance faulted"
                    );
                    self.finish(InstanceOutcome::Faulted(fault)).await;
                    return;
                }
            }
        }
    }

    /// Handles one envelope and reports whether the workflow completed.
    async fn handle<W: Workflow>(
        &self,
        workflow: &mut W,
        envelope: &Envelope,
        replaying: bool,
    ) -> Result<bool, WorkflowFault> {
        let ctx = WorkflowContext::for_envelope(envelope, replaying);
        workflow.on_signal(&ctx, envelope).await?;

        let completed = workflow.is_complete();
        if completed {
            workflow.finalize(&ctx).await?;
        }

        self.acknowledge(envelope.seq).await;
        Ok(completed)
    }

    async fn acknowledge(&self, seq: i64) {
        if let Err(e) = self.journal.acknowledge(seq).await {
            warn!(instance = %self.instance_key, seq, error = %e, "Failed to acknowledge signal");
        }
    }

    async fn complete(&self, rest: Vec<Envelope>, mut inbox: mpsc::UnboundedReceiver<Envelope>) {
        {
            let mut registry = self.registry.lock().await;
            registry.running.remove(&self.instance_key);
            registry
                .finished
                .insert(self.instance_key.clone(), InstanceOutcome::Completed);
        }
        inbox.close();

        let mut dropped = rest;
        while let Ok(envelope) = inbox.try_recv() {
            dropped.push(envelope);
        }
        for envelope in &dropped {
            warn!(
                instance = %self.instance_key,
                seq = envelope.seq,
                signal = %envelope.name,
                "Dropping signal received after completion"
            );
            self.acknowledge(envelope.seq).await;
        }

        self.outcome.send_replace(Some(InstanceOutcome::Completed));
        info!(instance = %self.instance_key, "Workflow instance completed");
    }

    async fn finish(&self, outcome: InstanceOutcome) {
        let mut registry = self.registry.lock().await;
        registry.running.remove(&self.instance_key);
        registry
            .finished
            .insert(self.instance_key.clone(), outcome.clone());
        self.outcome.send_replace(Some(outcome));
    }
}
