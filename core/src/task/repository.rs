//! Task repository trait
//!
//! Defines the interface for task storage operations. The admission layer
//! treats the store as an external collaborator behind this trait.

use async_trait::async_trait;

use super::model::Task;
use crate::Result;

/// Repository interface for task CRUD operations
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Get all tasks
    async fn find_all(&self) -> Result<Vec<Task>>;

    /// Get a task by ID
    async fn find_by_id(&self, id: i64) -> Result<Option<Task>>;

    /// Check whether a task with the given ID is persisted
    async fn exists_by_id(&self, id: i64) -> Result<bool>;

    /// Insert or update a task
    ///
    /// A task without an id is assigned one; the saved task is returned.
    async fn save(&self, task: Task) -> Result<Task>;

    /// Delete a task by ID; absent ids are a no-op
    async fn delete_by_id(&self, id: i64) -> Result<()>;
}
