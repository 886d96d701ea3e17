//! Application state

use std::sync::Arc;

use gt_core::gate::{CreateGate, EditGate};
use gt_core::task::{FileTaskStore, TaskRepository};
use gt_core::worker::WorkerPool;

use crate::config::ServerConfig;

/// Shared application state
///
/// The gates and the worker pool are process-wide singletons; every handler
/// invocation sees the same instances through this state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    task_store: Arc<dyn TaskRepository>,
    create_gate: CreateGate,
    edit_gate: EditGate,
    workers: WorkerPool,
}

impl AppState {
    /// Create a new AppState backed by the file store
    pub async fn new(config: &ServerConfig) -> gt_core::Result<Self> {
        let tasks_path = config.data_dir.join("tasks.json");
        let task_store = Arc::new(FileTaskStore::new(tasks_path).await?);
        Ok(Self::with_store(
            task_store,
            config.create_gate_capacity,
            config.worker_pool_size,
        ))
    }

    /// Build state around an injected repository (used by tests)
    pub fn with_store(
        task_store: Arc<dyn TaskRepository>,
        create_gate_capacity: usize,
        worker_pool_size: usize,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                task_store,
                create_gate: CreateGate::new(create_gate_capacity),
                edit_gate: EditGate::new(),
                workers: WorkerPool::new(worker_pool_size),
            }),
        }
    }

    pub fn task_store(&self) -> &Arc<dyn TaskRepository> {
        &self.inner.task_store
    }

    pub fn create_gate(&self) -> &CreateGate {
        &self.inner.create_gate
    }

    pub fn edit_gate(&self) -> &EditGate {
        &self.inner.edit_gate
    }

    pub fn workers(&self) -> &WorkerPool {
        &self.inner.workers
    }
}
