//! Process-wide engine handle
//!
//! Lets components that are not wired through constructors (background
//! tasks, signal handlers) reach the engine. The handle is explicitly installed
//! at startup and torn down at shutdown.

use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use tracing::info;

use crate::engine::WorkflowEngine;
use crate::error::EngineError;

static ENGINE: Lazy<RwLock<Option<Arc<WorkflowEngine>>>> = Lazy::new(|| RwLock::new(None));

/// Installs the process-wide engine.
///
/// # Errors
///
/// Returns `EngineError::AlreadyInstalled` if an engine is already installed.
pub fn install(engine: Arc<WorkflowEngine>) -> Result<(), EngineError> {
    let mut slot = ENGINE.write().unwrap_or_else(|e| e.into_inner());
    if slot.is_some() {
        return Err(EngineError::AlreadyInstalled);
    }
    *slot = Some(engine);
    info!("Workflow engine installed");
    Ok(())
}

/// Returns the installed engine.
///
/// # Errors
///
/// Returns `EngineError::Unavailable` if no engine is installed.
pub fn engine() -> Result<Arc<WorkflowEngine>, EngineError> {
    ENGINE
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
        .ok_or(EngineError::Unavailable)
}

/// Removes the installed engine and shuts it down.
pub async fn teardown() {
    let engine = ENGINE.write().unwrap_or_else(|e| e.into_inner()).take();
    if let Some(engine) = engine {
        engine.shutdown().await;
        info!("Workflow engine torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_install_lifecycle() {
        teardown().await;
        assert!(matches!(engine(), Err(EngineError::Unavailable)));

        install(Arc::new(WorkflowEngine::in_memory())).unwrap();
        assert!(engine().is_ok());
        assert!(matches!(
            install(Arc::new(WorkflowEngine::in_memory())),
            Err(EngineError::AlreadyInstalled)
        ));

        teardown().await;
        assert!(matches!(engine(), Err(EngineError::Unavailable)));
    }
}
