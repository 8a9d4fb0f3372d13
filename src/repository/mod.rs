//! Persistence for task rows.
//!
//! The store owns identity and timestamps: `insert` assigns `id`,
//! `created_at` and `updated_at`; `save` refreshes `updated_at`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{NewTask, Task};

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryTaskRepository;
pub use sqlite::SqliteTaskRepository;

#[derive(Debug, Error, Clone)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(String),

    /// A stored row could not be mapped back to a task.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(error: sqlx::Error) -> Self {
        RepositoryError::Database(error.to_string())
    }
}

/// `updated_at` must move forward even when the clock has not ticked.
pub(crate) fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + chrono::Duration::microseconds(1)
    }
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Rows matching `completed` (all rows when `None`), newest first.
    async fn find(&self, completed: Option<bool>) -> Result<Vec<Task>, RepositoryError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Task>, RepositoryError>;

    async fn insert(&self, task: NewTask) -> Result<Task, RepositoryError>;

    /// Writes every mutable field of `task` back to its row.
    ///
    /// Returns `None` when the row no longer exists.
    async fn save(&self, task: &Task) -> Result<Option<Task>, RepositoryError>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: i64) -> Result<bool, RepositoryError>;
}
