use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;

/// Failures surfaced to the dashboard. Every variant is recoverable by the user retrying.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Image host or AI service failed.
    #[error("Error: {0}")]
    Remote(String),

    /// The store rejected a read or write.
    #[error("Error saving activity: {0}")]
    Persist(String),

    /// Another analysis or persistence step is in flight for this dashboard.
    #[error("Another request is still in progress")]
    Busy,

    #[error("Not signed in")]
    Unauthorized,
}

impl WorkflowError {
    pub fn remote(err: &anyhow::Error) -> Self {
        WorkflowError::Remote(format!("{:#}", err))
    }

    pub fn persist(err: &anyhow::Error) -> Self {
        WorkflowError::Persist(format!("{:#}", err))
    }
}

impl ResponseError for WorkflowError {
    fn status_code(&self) -> StatusCode {
        match self {
            WorkflowError::Remote(_) | WorkflowError::Persist(_) => StatusCode::BAD_GATEWAY,
            WorkflowError::Busy => StatusCode::CONFLICT,
            WorkflowError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
