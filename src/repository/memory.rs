use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{next_timestamp, RepositoryError, TaskRepository};
use crate::models::{NewTask, Task};

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<i64, Task>,
    last_id: i64,
}

/// Task rows kept in process memory. Ids are never reused.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    table: Arc<RwLock<Table>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn find(&self, completed: Option<bool>) -> Result<Vec<Task>, RepositoryError> {
        let table = self.table.read().await;
        let mut tasks: Vec<Task> = table
            .rows
            .values()
            .filter(|task| completed.map_or(true, |completed| task.completed == completed))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tasks)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Task>, RepositoryError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn insert(&self, task: NewTask) -> Result<Task, RepositoryError> {
        let mut table = self.table.write().await;
        table.last_id += 1;
        let now = Utc::now();
        let row = Task {
            id: table.last_id,
            title: task.title,
            description: task.description,
            due_date: task.due_date,
            completed: task.completed.unwrap_or(false),
            priority: task.priority,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn save(&self, task: &Task) -> Result<Option<Task>, RepositoryError> {
        let mut table = self.table.write().await;
        let Some(row) = table.rows.get_mut(&task.id) else {
            return Ok(None);
        };
        row.title = task.title.clone();
        row.description = task.description.clone();
        row.due_date = task.due_date;
        row.completed = task.completed;
        row.priority = task.priority;
        row.updated_at = next_timestamp(row.updated_at);
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }
}
