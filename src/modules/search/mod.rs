use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;

use crate::{
    error::ReviewError,
    tmdb::MovieMetadata,
    web::{
        AppState,
        responses::{ApiError, review_error},
    },
};

const MAX_POPULAR_PAGE: u32 = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/search", get(search))
        .route("/api/popular", get(popular))
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[derive(Debug, Deserialize)]
struct SearchQuery {
    query: String,
    #[serde(default)]
    year: Option<i32>,
}

/// Synchronous passthrough to the metadata client.
async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Json<MovieMetadata>> {
    validate_search(&params).map_err(|err| review_error(&err))?;

    let metadata = state
        .tmdb()
        .lookup(params.query.trim(), params.year)
        .await
        .map_err(|err| review_error(&err))?;

    Ok(Json(metadata))
}

fn validate_search(params: &SearchQuery) -> Result<(), ReviewError> {
    if params.query.trim().is_empty() {
        return Err(ReviewError::Validation("query must not be empty".into()));
    }
    if let Some(year) = params.year {
        if !(1888..=2100).contains(&year) {
            return Err(ReviewError::Validation(
                "year must be between 1888 and 2100".into(),
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct PopularQuery {
    #[serde(default = "default_page")]
    page: u32,
}

fn default_page() -> u32 {
    1
}

async fn popular(
    State(state): State<AppState>,
    Query(params): Query<PopularQuery>,
) -> ApiResult<Json<Vec<MovieMetadata>>> {
    validate_page(params.page).map_err(|err| review_error(&err))?;

    let movies = state
        .tmdb()
        .popular(params.page)
        .await
        .map_err(|err| review_error(&err))?;

    Ok(Json(movies))
}

fn validate_page(page: u32) -> Result<(), ReviewError> {
    if page == 0 || page > MAX_POPULAR_PAGE {
        return Err(ReviewError::Validation(format!(
            "page must be between 1 and {MAX_POPULAR_PAGE}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_requires_a_non_empty_query() {
        let params = SearchQuery {
            query: "  ".into(),
            year: None,
        };
        assert_eq!(
            validate_search(&params).unwrap_err().kind(),
            "validation_error"
        );

        let params = SearchQuery {
            query: "Heat".into(),
            year: Some(1995),
        };
        assert!(validate_search(&params).is_ok());
    }

    #[test]
    fn search_year_must_be_plausible() {
        let params = SearchQuery {
            query: "Heat".into(),
            year: Some(1500),
        };
        assert_eq!(
            validate_search(&params).unwrap_err().kind(),
            "validation_error"
        );
    }

    #[test]
    fn popular_page_bounds() {
        assert!(validate_page(1).is_ok());
        assert!(validate_page(MAX_POPULAR_PAGE).is_ok());
        assert!(validate_page(0).is_err());
        assert!(validate_page(MAX_POPULAR_PAGE + 1).is_err());
    }
}
