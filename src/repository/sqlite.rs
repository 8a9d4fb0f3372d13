//! SQLite-backed repository using `sqlx`.
//!
//! The `tasks` table is created on connect when missing.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use super::{next_timestamp, RepositoryError, TaskRepository};
use crate::models::{NewTask, Task};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title VARCHAR(255) NOT NULL,
    description TEXT,
    due_date DATE NOT NULL,
    completed BOOLEAN NOT NULL DEFAULT 0,
    priority VARCHAR(50) NOT NULL CHECK (priority IN ('low', 'medium', 'high')),
    created_at DATETIME NOT NULL,
    updated_at DATETIME NOT NULL
)
"#;

const COLUMNS: &str =
    "id, title, description, due_date, completed, priority, created_at, updated_at";

#[derive(Debug, FromRow)]
struct TaskRow {
    id: i64,
    title: String,
    description: Option<String>,
    due_date: NaiveDate,
    completed: bool,
    priority: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = RepositoryError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let priority = row
            .priority
            .parse()
            .map_err(|error| RepositoryError::Corrupt(format!("task {}: {}", row.id, error)))?;
        Ok(Task {
            id: row.id,
            title: row.title,
            description: row.description,
            due_date: row.due_date,
            completed: row.completed,
            priority,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    /// Opens (creating if needed) the database at `url` and ensures the schema.
    ///
    /// `sqlite::memory:` gets a single long-lived connection, since every
    /// connection to an in-memory database sees its own empty database.
    pub async fn connect(url: &str) -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new();
        if url.contains(":memory:") {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        }

        let pool = pool_options.connect_with(options).await?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> Result<Self, RepositoryError> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn find(&self, completed: Option<bool>) -> Result<Vec<Task>, RepositoryError> {
        let rows: Vec<TaskRow> = match completed {
            Some(completed) => {
                let sql = format!(
                    "SELECT {COLUMNS} FROM tasks WHERE completed = ? ORDER BY created_at DESC, id DESC"
                );
                sqlx::query_as(&sql)
                    .bind(completed)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("SELECT {COLUMNS} FROM tasks ORDER BY created_at DESC, id DESC");
                sqlx::query_as(&sql).fetch_all(&self.pool).await?
            }
        };
        rows.into_iter().map(Task::try_from).collect()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Task>, RepositoryError> {
        let sql = format!("SELECT {COLUMNS} FROM tasks WHERE id = ?");
        let row: Option<TaskRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Task::try_from).transpose()
    }

    async fn insert(&self, task: NewTask) -> Result<Task, RepositoryError> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO tasks (title, description, due_date, completed, priority, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {COLUMNS}"
        );
        let row: TaskRow = sqlx::query_as(&sql)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.due_date)
            .bind(task.completed.unwrap_or(false))
            .bind(task.priority.as_str())
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
        Task::try_from(row)
    }

    async fn save(&self, task: &Task) -> Result<Option<Task>, RepositoryError> {
        let sql = format!(
            "UPDATE tasks SET title = ?, description = ?, due_date = ?, completed = ?, priority = ?, updated_at = ? \
             WHERE id = ? RETURNING {COLUMNS}"
        );
        let row: Option<TaskRow> = sqlx::query_as(&sql)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.due_date)
            .bind(task.completed)
            .bind(task.priority.as_str())
            .bind(next_timestamp(task.updated_at))
            .bind(task.id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Task::try_from).transpose()
    }

    async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
