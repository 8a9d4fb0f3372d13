//! Task operations on top of a [`TaskRepository`].

use std::sync::Arc;

use thiserror::Error;

use crate::models::{NewTask, StatusFilter, Task, TaskPatch};
use crate::repository::{RepositoryError, TaskRepository};

#[derive(Debug, Error, Clone)]
pub enum ServiceError {
    #[error("Task with ID {0} not found")]
    NotFound(i64),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Clone)]
pub struct TaskService {
    repository: Arc<dyn TaskRepository>,
}

impl TaskService {
    pub fn new(repository: Arc<dyn TaskRepository>) -> Self {
        Self { repository }
    }

    /// Tasks passing `filter`, newest first.
    pub async fn list_tasks(&self, filter: StatusFilter) -> Result<Vec<Task>, ServiceError> {
        let tasks = self.repository.find(filter.completed()).await?;
        tracing::debug!(%filter, count = tasks.len(), "listed tasks");
        Ok(tasks)
    }

    pub async fn get_task(&self, id: i64) -> Result<Task, ServiceError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound(id))
    }

    pub async fn create_task(&self, new_task: NewTask) -> Result<Task, ServiceError> {
        let task = self.repository.insert(new_task).await?;
        tracing::info!(id = task.id, title = %task.title, "task created");
        Ok(task)
    }

    /// Merges `patch` over the stored row; fields it leaves out stay as they are.
    pub async fn update_task(&self, id: i64, patch: TaskPatch) -> Result<Task, ServiceError> {
        let mut task = self.get_task(id).await?;
        patch.apply_to(&mut task);
        // the row may have been deleted between the read and the write
        let task = self
            .repository
            .save(&task)
            .await?
            .ok_or(ServiceError::NotFound(id))?;
        tracing::info!(id, "task updated");
        Ok(task)
    }

    pub async fn delete_task(&self, id: i64) -> Result<(), ServiceError> {
        let task = self.get_task(id).await?;
        if !self.repository.delete(task.id).await? {
            return Err(ServiceError::NotFound(id));
        }
        tracing::info!(id, "task deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use crate::repository::InMemoryTaskRepository;
    use chrono::{NaiveDate, Utc};
    use rstest::rstest;

    fn service() -> TaskService {
        TaskService::new(Arc::new(InMemoryTaskRepository::new()))
    }

    fn due() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    async fn seed(service: &TaskService) -> Vec<Task> {
        let mut tasks = Vec::new();
        for (title, completed) in [("a", false), ("b", true), ("c", false), ("d", true)] {
            let new_task = NewTask::new(title, due(), Priority::Medium).with_completed(completed);
            tasks.push(service.create_task(new_task).await.unwrap());
        }
        tasks
    }

    #[rstest]
    #[case(Priority::Low)]
    #[case(Priority::Medium)]
    #[case(Priority::High)]
    #[tokio::test]
    async fn test_create_defaults_completed_and_keeps_priority(#[case] priority: Priority) {
        let before = Utc::now();
        let task = service()
            .create_task(NewTask::new("Buy milk", due(), priority))
            .await
            .unwrap();
        assert!(!task.completed);
        assert_eq!(task.priority, priority);
        assert!(task.created_at >= before);
    }

    #[tokio::test]
    async fn test_missing_ids_are_not_found() {
        let service = service();
        assert!(matches!(
            service.get_task(42).await,
            Err(ServiceError::NotFound(42))
        ));
        assert!(matches!(
            service.update_task(42, TaskPatch::completed(true)).await,
            Err(ServiceError::NotFound(42))
        ));
        assert!(matches!(
            service.delete_task(42).await,
            Err(ServiceError::NotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_list_partitions_by_status() {
        let service = service();
        seed(&service).await;

        let completed = service.list_tasks(StatusFilter::Completed).await.unwrap();
        assert_eq!(completed.len(), 2);
        assert!(completed.iter().all(|task| task.completed));

        let pending = service.list_tasks(StatusFilter::Pending).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|task| !task.completed));

        let all = service.list_tasks(StatusFilter::All).await.unwrap();
        let titles: Vec<&str> = all.iter().map(|task| task.title.as_str()).collect();
        assert_eq!(titles, vec!["d", "c", "b", "a"]);
        assert!(all
            .windows(2)
            .all(|pair| pair[0].created_at >= pair[1].created_at));
    }

    #[tokio::test]
    async fn test_update_completed_leaves_other_fields() {
        let service = service();
        let created = service
            .create_task(NewTask::new("Buy milk", due(), Priority::Low).with_description("oat"))
            .await
            .unwrap();

        let updated = service
            .update_task(created.id, TaskPatch::completed(true))
            .await
            .unwrap();

        assert!(updated.completed);
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.title, created.title);
        assert_eq!(updated.description, created.description);
        assert_eq!(updated.due_date, created.due_date);
        assert_eq!(updated.priority, created.priority);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
    }

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let service = service();
        let created = service
            .create_task(
                NewTask::new("Write report", due(), Priority::High)
                    .with_description("quarterly")
                    .with_completed(true),
            )
            .await
            .unwrap();
        let fetched = service.get_task(created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_delete_is_permanent() {
        let service = service();
        let created = service
            .create_task(NewTask::new("Buy milk", due(), Priority::Low))
            .await
            .unwrap();
        service.delete_task(created.id).await.unwrap();
        assert!(matches!(
            service.get_task(created.id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(service.list_tasks(StatusFilter::All).await.unwrap().is_empty());
    }
}
