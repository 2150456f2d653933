use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Error taxonomy shared by the pipeline stages and the task manager.
///
/// Variants are cloneable so a failed task can hold on to the originating
/// stage error and replay it to every later `result` call.
#[derive(Debug, Clone, Error)]
pub enum ReviewError {
    #[error("no movie matched \"{0}\"")]
    NotFound(String),

    #[error("upstream failure: {message}")]
    Upstream { message: String, timed_out: bool },

    #[error("could not interpret upstream payload: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("task has not finished yet")]
    NotReady,

    #[error("unknown task id")]
    TaskNotFound,
}

impl ReviewError {
    pub fn upstream(message: impl Into<String>) -> Self {
        ReviewError::Upstream {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn upstream_timeout(message: impl Into<String>) -> Self {
        ReviewError::Upstream {
            message: message.into(),
            timed_out: true,
        }
    }

    /// Stable machine-readable kind used in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ReviewError::NotFound(_) => "not_found",
            ReviewError::Upstream { .. } => "upstream_error",
            ReviewError::Parse(_) => "parse_error",
            ReviewError::Validation(_) => "validation_error",
            ReviewError::NotReady => "not_ready",
            ReviewError::TaskNotFound => "task_not_found",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            ReviewError::NotFound(_) | ReviewError::TaskNotFound => StatusCode::NOT_FOUND,
            ReviewError::Upstream { timed_out: true, .. } => StatusCode::GATEWAY_TIMEOUT,
            ReviewError::Upstream { .. } | ReviewError::Parse(_) => StatusCode::BAD_GATEWAY,
            ReviewError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ReviewError::NotReady => StatusCode::CONFLICT,
        }
    }
}

/// Serializable capture of a stage error, stored on failed tasks.
#[derive(Debug, Clone, Serialize)]
pub struct CapturedError {
    pub kind: String,
    pub message: String,
}

impl From<&ReviewError> for CapturedError {
    fn from(err: &ReviewError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Maps a reqwest transport error onto the taxonomy, keeping timeouts
/// distinguishable for the 504 mapping.
pub fn from_reqwest(context: &str, err: reqwest::Error) -> ReviewError {
    if err.is_timeout() {
        ReviewError::upstream_timeout(format!("{context} timed out"))
    } else {
        ReviewError::upstream(format!("{context} failed: {err}"))
    }
}
