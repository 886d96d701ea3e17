//! File-based task storage implementation
//!
//! Stores tasks as JSON in a file on disk.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::model::Task;
use super::repository::TaskRepository;
use crate::Result;

/// File-based task store using JSON
pub struct FileTaskStore {
    /// Path to the JSON file
    path: PathBuf,
    /// In-memory cache of tasks
    cache: RwLock<HashMap<i64, Task>>,
    /// Next identifier handed out by `save`
    next_id: AtomicI64,
}

impl FileTaskStore {
    /// Create a new FileTaskStore
    ///
    /// If the file doesn't exist, it will be created on first write.
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let cache: HashMap<i64, Task> = if path.exists() {
            let content = tokio::fs::read_to_string(&path).await?;
            let tasks: Vec<Task> = serde_json::from_str(&content)?;
            tasks
                .into_iter()
                .filter_map(|t| t.id.map(|id| (id, t)))
                .collect()
        } else {
            HashMap::new()
        };

        let next_id = cache.keys().max().copied().unwrap_or(0) + 1;

        Ok(Self {
            path,
            cache: RwLock::new(cache),
            next_id: AtomicI64::new(next_id),
        })
    }

    /// Persist the cache to disk
    async fn persist(&self) -> Result<()> {
        let cache = self.cache.read().await;
        let mut tasks: Vec<&Task> = cache.values().collect();
        tasks.sort_by_key(|t| t.id);
        let content = serde_json::to_string_pretty(&tasks)?;

        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for FileTaskStore {
    async fn find_all(&self) -> Result<Vec<Task>> {
        let cache = self.cache.read().await;
        let mut tasks: Vec<Task> = cache.values().cloned().collect();
        tasks.sort_by_key(|t| t.id);
        Ok(tasks)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Task>> {
        let cache = self.cache.read().await;
        Ok(cache.get(&id).cloned())
    }

    async fn exists_by_id(&self, id: i64) -> Result<bool> {
        let cache = self.cache.read().await;
        Ok(cache.contains_key(&id))
    }

    async fn save(&self, mut task: Task) -> Result<Task> {
        task.updated_at = Utc::now();
        {
            let mut cache = self.cache.write().await;
            let id = match task.id {
                Some(id) => {
                    // Keep next_id ahead of externally supplied ids
                    self.next_id.fetch_max(id + 1, Ordering::SeqCst);
                    id
                }
                None => self.next_id.fetch_add(1, Ordering::SeqCst),
            };
            task.id = Some(id);
            if let Some(existing) = cache.get(&id) {
                task.created_at = existing.created_at;
            }
            cache.insert(id, task.clone());
        }
        self.persist().await?;
        Ok(task)
    }

    async fn delete_by_id(&self, id: i64) -> Result<()> {
        let removed = {
            let mut cache = self.cache.write().await;
            cache.remove(&id).is_some()
        };
        if removed {
            self.persist().await?;
        }
        Ok(())
    }
}
