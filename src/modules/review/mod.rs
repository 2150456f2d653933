use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    agent::ReviewRequest,
    error::{CapturedError, ReviewError},
    sentiment::Polarity,
    tasks::{Task, TaskState},
    web::{
        AppState,
        responses::{ApiError, JobSubmission, review_error},
    },
};

const MAX_BATCH_MOVIES: usize = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/review", post(create_review))
        .route("/api/review/batch", post(create_batch))
        .route("/api/review/status/:id", get(review_status))
        .route("/api/review/result/:id", get(review_result))
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

async fn create_review(
    State(state): State<AppState>,
    Json(request): Json<ReviewRequest>,
) -> ApiResult<(StatusCode, Json<JobSubmission>)> {
    let task_id = state
        .tasks()
        .submit(request)
        .await
        .map_err(|err| review_error(&err))?;

    Ok((StatusCode::ACCEPTED, Json(submission(task_id))))
}

#[derive(Debug, Deserialize)]
struct BatchReviewRequest {
    movies: Vec<ReviewRequest>,
}

#[derive(Debug, Serialize)]
struct BatchSubmission {
    submissions: Vec<JobSubmission>,
}

async fn create_batch(
    State(state): State<AppState>,
    Json(batch): Json<BatchReviewRequest>,
) -> ApiResult<(StatusCode, Json<BatchSubmission>)> {
    validate_batch(&batch.movies).map_err(|err| review_error(&err))?;

    let mut submissions = Vec::with_capacity(batch.movies.len());
    for movie in batch.movies {
        let task_id = state
            .tasks()
            .submit(movie)
            .await
            .map_err(|err| review_error(&err))?;
        submissions.push(submission(task_id));
    }

    Ok((StatusCode::ACCEPTED, Json(BatchSubmission { submissions })))
}

/// Every entry is validated before any task is registered, so a bad
/// entry rejects the whole batch instead of half-submitting it.
fn validate_batch(movies: &[ReviewRequest]) -> Result<(), ReviewError> {
    if movies.is_empty() {
        return Err(ReviewError::Validation(
            "batch must contain at least one movie".into(),
        ));
    }
    if movies.len() > MAX_BATCH_MOVIES {
        return Err(ReviewError::Validation(format!(
            "batch must contain at most {MAX_BATCH_MOVIES} movies"
        )));
    }
    for movie in movies {
        movie.validate()?;
    }
    Ok(())
}

fn submission(task_id: Uuid) -> JobSubmission {
    JobSubmission::new(task_id, format!("/api/review/status/{task_id}"))
}

#[derive(Debug, Serialize)]
struct TaskStatusResponse {
    task_id: Uuid,
    state: TaskState,
    title: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<CapturedError>,
}

fn status_body(task: &Task) -> TaskStatusResponse {
    TaskStatusResponse {
        task_id: task.id,
        state: task.state,
        title: task.request.title.clone(),
        created_at: task.created_at,
        updated_at: task.updated_at,
        error: task.error.as_ref().map(CapturedError::from),
    }
}

async fn review_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskStatusResponse>> {
    let task = state
        .tasks()
        .snapshot(id)
        .await
        .map_err(|err| review_error(&err))?;

    Ok(Json(status_body(&task)))
}

#[derive(Debug, Serialize)]
struct ReviewResultResponse {
    task_id: Uuid,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    year: Option<i32>,
    review: String,
    composite_score: f64,
    word_count: usize,
    polarity: Polarity,
    themes: Vec<String>,
    generated_at: DateTime<Utc>,
}

async fn review_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReviewResultResponse>> {
    let result = state
        .tasks()
        .result(id)
        .await
        .map_err(|err| review_error(&err))?;
    let task = state
        .tasks()
        .snapshot(id)
        .await
        .map_err(|err| review_error(&err))?;

    Ok(Json(ReviewResultResponse {
        task_id: id,
        title: task.request.title,
        year: task.request.year,
        review: result.text,
        composite_score: result.composite_score,
        word_count: result.word_count,
        polarity: result.polarity,
        themes: result.themes,
        generated_at: result.generated_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_for(title: &str) -> ReviewRequest {
        ReviewRequest {
            title: title.to_string(),
            year: None,
            target_audience: Default::default(),
            review_style: Default::default(),
            max_length: 1000,
            include_spoilers: false,
        }
    }

    #[test]
    fn submission_points_at_the_status_route() {
        let id = Uuid::new_v4();
        let body = submission(id);
        assert_eq!(body.status_url, format!("/api/review/status/{id}"));
    }

    #[test]
    fn batch_bounds_are_enforced() {
        assert_eq!(
            validate_batch(&[]).unwrap_err().kind(),
            "validation_error"
        );

        let oversized: Vec<ReviewRequest> =
            (0..11).map(|idx| request_for(&format!("Movie {idx}"))).collect();
        assert_eq!(
            validate_batch(&oversized).unwrap_err().kind(),
            "validation_error"
        );

        let bad_entry = vec![request_for("Fine"), request_for("   ")];
        assert_eq!(
            validate_batch(&bad_entry).unwrap_err().kind(),
            "validation_error"
        );

        assert!(validate_batch(&[request_for("Fine")]).is_ok());
    }
}
