use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::{NewTask, StatusFilter, Task, TaskPatch};
use crate::server::ApiError;
use crate::validation::FieldError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<FieldError>,
    },

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}

/// The calls the client task store makes against the backend.
#[async_trait]
pub trait TaskGateway: Send + Sync {
    async fn fetch_tasks(&self, filter: StatusFilter) -> Result<Vec<Task>, ClientError>;

    async fn fetch_task(&self, id: i64) -> Result<Task, ClientError>;

    async fn create_task(&self, task: &NewTask) -> Result<Task, ClientError>;

    async fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<Task, ClientError>;

    async fn delete_task(&self, id: i64) -> Result<(), ClientError>;
}

/// reqwest-backed client for the `/tasks` API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        ApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn tasks_url(&self) -> String {
        format!("{}/tasks", self.base_url)
    }

    fn task_url(&self, id: i64) -> String {
        format!("{}/tasks/{}", self.base_url, id)
    }
}

/// Turns a non-success response into the matching [`ClientError`].
async fn error_from(res: Response) -> ClientError {
    let status = res.status();
    let error_text = match res.text().await {
        Ok(text) => text,
        Err(err) => return ClientError::Transport(err),
    };
    let body: Option<ApiError> = serde_json::from_str(&error_text).ok();
    let message = body
        .as_ref()
        .map(|body| body.message.clone())
        .unwrap_or_else(|| error_text.clone());

    match status {
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        StatusCode::BAD_REQUEST => ClientError::Validation {
            message,
            details: body.and_then(|body| body.details).unwrap_or_default(),
        },
        _ => ClientError::Server {
            status: status.as_u16(),
            message,
        },
    }
}

async fn decode<T: DeserializeOwned>(res: Response) -> Result<T, ClientError> {
    if res.status().is_success() {
        Ok(res.json::<T>().await?)
    } else {
        Err(error_from(res).await)
    }
}

#[async_trait]
impl TaskGateway for ApiClient {
    async fn fetch_tasks(&self, filter: StatusFilter) -> Result<Vec<Task>, ClientError> {
        let url = format!("{}?status={}", self.tasks_url(), filter);
        let res = self.client.get(&url).send().await?;
        decode(res).await
    }

    async fn fetch_task(&self, id: i64) -> Result<Task, ClientError> {
        let res = self.client.get(self.task_url(id)).send().await?;
        decode(res).await
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task, ClientError> {
        let res = self.client.post(self.tasks_url()).json(task).send().await?;
        decode(res).await
    }

    async fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<Task, ClientError> {
        let res = self
            .client
            .patch(self.task_url(id))
            .json(patch)
            .send()
            .await?;
        decode(res).await
    }

    async fn delete_task(&self, id: i64) -> Result<(), ClientError> {
        let res = self.client.delete(self.task_url(id)).send().await?;

        if res.status().is_success() {
            Ok(())
        } else {
            Err(error_from(res).await)
        }
    }
}
