//! Client-side cache of the task list.
//!
//! State lives in a `watch` channel: every change is published, and any
//! number of subscribers can observe it. Mutations patch the cached list
//! from the server's response instead of re-fetching the collection.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::api::{ClientError, TaskGateway};
use crate::models::{NewTask, StatusFilter, Task, TaskPatch};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskState {
    pub tasks: Vec<Task>,
    pub loading: bool,
    pub error: Option<String>,
    pub filter: StatusFilter,
}

impl TaskState {
    /// Tasks passing the active filter, in list order. Computed on every call.
    pub fn filtered(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| self.filter.matches(task))
            .collect()
    }

    pub fn total(&self) -> usize {
        self.tasks.len()
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|task| task.completed).count()
    }

    pub fn pending_count(&self) -> usize {
        self.total() - self.completed_count()
    }

    pub fn find(&self, id: i64) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }
}

/// Handle to the shared cache. Clones see and publish the same state.
pub struct TaskStore<G> {
    gateway: Arc<G>,
    state: Arc<watch::Sender<TaskState>>,
}

impl<G> Clone for TaskStore<G> {
    fn clone(&self) -> Self {
        TaskStore {
            gateway: Arc::clone(&self.gateway),
            state: Arc::clone(&self.state),
        }
    }
}

impl<G: TaskGateway> TaskStore<G> {
    pub fn new(gateway: G) -> Self {
        let (state, _) = watch::channel(TaskState::default());
        TaskStore {
            gateway: Arc::new(gateway),
            state: Arc::new(state),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskState> {
        self.state.subscribe()
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> TaskState {
        self.state.borrow().clone()
    }

    pub fn filtered_tasks(&self) -> Vec<Task> {
        self.state.borrow().filtered().into_iter().cloned().collect()
    }

    pub fn filter(&self) -> StatusFilter {
        self.state.borrow().filter
    }

    pub fn set_filter(&self, filter: StatusFilter) {
        self.state.send_if_modified(|state| {
            let changed = state.filter != filter;
            state.filter = filter;
            changed
        });
    }

    /// Dismisses the current error message, if any.
    pub fn clear_error(&self) {
        self.state.send_if_modified(|state| state.error.take().is_some());
    }

    /// Runs one server call with the loading flag raised, then applies
    /// `on_success` or records `failure` as the error message.
    async fn run<T, F>(
        &self,
        failure: &str,
        call: F,
        on_success: impl FnOnce(&mut TaskState, &T),
    ) -> Result<T, ClientError>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });

        let result = call.await;

        self.state.send_modify(|state| {
            state.loading = false;
            match &result {
                Ok(value) => on_success(state, value),
                Err(_) => state.error = Some(failure.to_string()),
            }
        });

        if let Err(error) = &result {
            tracing::warn!(%error, "{}", failure);
        }
        result
    }

    /// Replaces the cache with the full list from the server.
    pub async fn load(&self) -> Result<(), ClientError> {
        self.run(
            "Failed to load tasks",
            self.gateway.fetch_tasks(StatusFilter::All),
            |state, tasks: &Vec<Task>| state.tasks = tasks.clone(),
        )
        .await
        .map(|_| ())
    }

    /// Creates a task and prepends the server's copy to the cache.
    pub async fn create(&self, task: NewTask) -> Result<Task, ClientError> {
        self.run(
            "Failed to create task",
            self.gateway.create_task(&task),
            |state, created: &Task| state.tasks.insert(0, created.clone()),
        )
        .await
    }

    /// Patches a task and swaps the server's copy into the cache.
    pub async fn update(&self, id: i64, patch: TaskPatch) -> Result<Task, ClientError> {
        self.run(
            "Failed to update task",
            self.gateway.update_task(id, &patch),
            |state, updated: &Task| {
                for task in state.tasks.iter_mut().filter(|task| task.id == id) {
                    *task = updated.clone();
                }
            },
        )
        .await
    }

    /// Deletes a task and drops every cached entry with its id.
    pub async fn delete(&self, id: i64) -> Result<(), ClientError> {
        self.run(
            "Failed to delete task",
            self.gateway.delete_task(id),
            |state, _: &()| state.tasks.retain(|task| task.id != id),
        )
        .await
    }

    /// Fetches one task for pre-filling a form. Failures read as "unavailable".
    pub async fn get_task(&self, id: i64) -> Option<Task> {
        match self.gateway.fetch_task(id).await {
            Ok(task) => Some(task),
            Err(error) => {
                tracing::warn!(id, %error, "could not fetch task");
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process gateway double.

    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::models::Priority;

    #[derive(Default)]
    struct Backend {
        tasks: Vec<Task>,
        next_id: i64,
        offline: bool,
        calls: Vec<String>,
    }

    #[derive(Clone, Default)]
    pub struct FakeGateway {
        backend: Arc<Mutex<Backend>>,
        gate: Arc<tokio::sync::Mutex<()>>,
    }

    pub fn task(id: i64, title: &str, completed: bool) -> Task {
        let now = Utc::now();
        Task {
            id,
            title: title.to_string(),
            description: None,
            due_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            completed,
            priority: Priority::Medium,
            created_at: now,
            updated_at: now,
        }
    }

    impl FakeGateway {
        pub fn with_tasks(tasks: Vec<Task>) -> Self {
            let next_id = tasks.iter().map(|task| task.id).max().unwrap_or(0) + 1;
            let gateway = FakeGateway::default();
            {
                let mut backend = gateway.backend.lock().unwrap();
                backend.tasks = tasks;
                backend.next_id = next_id;
            }
            gateway
        }

        /// Holds every call until the returned guard is dropped.
        pub async fn pause(&self) -> tokio::sync::OwnedMutexGuard<()> {
            Arc::clone(&self.gate).lock_owned().await
        }

        pub fn set_offline(&self, offline: bool) {
            self.backend.lock().unwrap().offline = offline;
        }

        pub fn calls(&self) -> Vec<String> {
            self.backend.lock().unwrap().calls.clone()
        }

        pub fn server_tasks(&self) -> Vec<Task> {
            self.backend.lock().unwrap().tasks.clone()
        }

        async fn enter(
            &self,
            call: String,
        ) -> Result<std::sync::MutexGuard<'_, Backend>, ClientError> {
            drop(self.gate.lock().await);
            let mut backend = self.backend.lock().unwrap();
            backend.calls.push(call);
            if backend.offline {
                return Err(ClientError::Server {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            Ok(backend)
        }
    }

    fn not_found(id: i64) -> ClientError {
        ClientError::NotFound(format!("Task with ID {id} not found"))
    }

    #[async_trait]
    impl TaskGateway for FakeGateway {
        async fn fetch_tasks(&self, filter: StatusFilter) -> Result<Vec<Task>, ClientError> {
            let backend = self.enter(format!("list {filter}")).await?;
            Ok(backend
                .tasks
                .iter()
                .filter(|task| filter.matches(task))
                .cloned()
                .collect())
        }

        async fn fetch_task(&self, id: i64) -> Result<Task, ClientError> {
            let backend = self.enter(format!("get {id}")).await?;
            backend
                .tasks
                .iter()
                .find(|task| task.id == id)
                .cloned()
                .ok_or_else(|| not_found(id))
        }

        async fn create_task(&self, new_task: &NewTask) -> Result<Task, ClientError> {
            let mut backend = self.enter("create".to_string()).await?;
            let id = backend.next_id.max(1);
            backend.next_id = id + 1;
            let now = Utc::now();
            let created = Task {
                id,
                title: new_task.title.clone(),
                description: new_task.description.clone(),
                due_date: new_task.due_date,
                completed: new_task.completed.unwrap_or(false),
                priority: new_task.priority,
                created_at: now,
                updated_at: now,
            };
            backend.tasks.insert(0, created.clone());
            Ok(created)
        }

        async fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<Task, ClientError> {
            let mut backend = self.enter(format!("update {id}")).await?;
            let task = backend
                .tasks
                .iter_mut()
                .find(|task| task.id == id)
                .ok_or_else(|| not_found(id))?;
            patch.apply_to(task);
            task.updated_at = Utc::now();
            Ok(task.clone())
        }

        async fn delete_task(&self, id: i64) -> Result<(), ClientError> {
            let mut backend = self.enter(format!("delete {id}")).await?;
            let before = backend.tasks.len();
            backend.tasks.retain(|task| task.id != id);
            if backend.tasks.len() == before {
                return Err(not_found(id));
            }
            Ok(())
        }
    }
}
