use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ReviewError;

/// Canonical JSON payload for error responses. Names the error kind so
/// clients can branch without string matching.
#[derive(Debug, Serialize, Clone)]
pub struct ApiError {
    pub kind: String,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Standard task submission response.
#[derive(Debug, Serialize, Clone)]
pub struct JobSubmission {
    pub task_id: Uuid,
    pub status_url: String,
}

impl JobSubmission {
    pub fn new(task_id: Uuid, status_url: impl Into<String>) -> Self {
        Self {
            task_id,
            status_url: status_url.into(),
        }
    }
}

/// Maps a `ReviewError` onto its HTTP status and structured body.
pub fn review_error(err: &ReviewError) -> (StatusCode, Json<ApiError>) {
    (
        err.http_status(),
        Json(ApiError::new(err.kind(), err.to_string())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_names_the_kind() {
        let (status, Json(body)) = review_error(&ReviewError::TaskNotFound);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.kind, "task_not_found");
        assert!(!body.message.is_empty());
    }
}
