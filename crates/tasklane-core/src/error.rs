use thiserror::Error;

use crate::task::TaskId;

pub type TaskResult<T> = Result<T, TaskError>;

/// Failures produced by the task core. None of them is fatal: every
/// operation can be retried by invoking it again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// Rejected locally before any network call.
    #[error("{0}")]
    Validation(String),

    /// 401/403 from the backend, or rejected credentials.
    #[error("{0}")]
    AuthFailure(String),

    /// The backend answered with a body of an unexpected shape.
    #[error("unexpected response: {0}")]
    MalformedResponse(String),

    /// Transport failure (`status` is `None`) or a non-success status.
    #[error("{message}")]
    NetworkFailure { status: Option<u16>, message: String },

    /// The task no longer exists. Callers treat this as a silent no-op.
    #[error("task not found: {0}")]
    NotFound(TaskId),
}

impl TaskError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkFailure {
            status: None,
            message: message.into(),
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::NetworkFailure {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Banner text shown to the user when `op` fails.
    pub fn user_message(&self, op: Operation) -> String {
        match self {
            Self::Validation(message) | Self::AuthFailure(message) => message.clone(),
            _ => op.failure_banner().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Load,
    Add,
    Update,
    Delete,
}

impl Operation {
    pub fn failure_banner(self) -> &'static str {
        match self {
            Self::Load => "Failed to load tasks. Please try again.",
            Self::Add => "Failed to add task. Please try again.",
            Self::Update => "Failed to update task. Please try again.",
            Self::Delete => "Failed to delete task. Please try again.",
        }
    }

    /// Generic message used when the backend gives no decodable reason.
    pub fn fallback_message(self) -> &'static str {
        match self {
            Self::Load => "Failed to fetch tasks",
            Self::Add => "Failed to create task",
            Self::Update => "Failed to update task",
            Self::Delete => "Failed to delete task",
        }
    }
}
