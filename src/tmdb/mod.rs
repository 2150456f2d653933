use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    config::TmdbSettings,
    error::{ReviewError, from_reqwest},
};

const MAX_CAST_MEMBERS: usize = 10;
const MAX_REVIEW_SNIPPETS: usize = 12;
const MAX_SNIPPET_CHARS: usize = 600;

/// Normalized movie record assembled from TMDB search/detail payloads.
#[derive(Debug, Clone, Serialize)]
pub struct MovieMetadata {
    pub tmdb_id: u64,
    pub title: String,
    pub year: Option<i32>,
    pub synopsis: Option<String>,
    pub directors: Vec<String>,
    pub cast: Vec<String>,
    pub genres: Vec<String>,
    pub runtime_minutes: Option<u32>,
    pub external_rating: Option<f64>,
    pub vote_count: Option<u64>,
    pub popularity: Option<f64>,
    pub release_date: Option<String>,
    pub poster_url: Option<String>,
}

/// Thin client over TMDB v3. One timeout-bounded attempt per call, no
/// retries; the caller decides what a failure means for its pipeline.
#[derive(Clone)]
pub struct TmdbClient {
    http: Client,
    settings: TmdbSettings,
}

impl TmdbClient {
    pub fn new(settings: TmdbSettings) -> Result<Self, ReviewError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|err| ReviewError::upstream(format!("failed to build TMDB client: {err}")))?;
        Ok(Self { http, settings })
    }

    /// Resolve a title (and optional year) to a full metadata record.
    pub async fn lookup(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<MovieMetadata, ReviewError> {
        let mut query = vec![
            ("api_key", self.settings.api_key.clone()),
            ("query", title.to_string()),
            ("language", self.settings.language.clone()),
            ("page", "1".to_string()),
        ];
        if let Some(year) = year {
            query.push(("year", year.to_string()));
        }

        let search: SearchPayload = self.get_json("search/movie", &query).await?;
        let hit = search
            .results
            .into_iter()
            .next()
            .ok_or_else(|| ReviewError::NotFound(title.to_string()))?;

        let details: DetailsPayload = self
            .get_json(
                &format!("movie/{}", hit.id),
                &[
                    ("api_key", self.settings.api_key.clone()),
                    ("language", self.settings.language.clone()),
                    ("append_to_response", "credits".to_string()),
                ],
            )
            .await?;

        Ok(build_metadata(details, &self.settings.image_base_url))
    }

    /// First page of audience reviews, trimmed for prompt use. Best
    /// effort: callers treat failure as "no snippets", not a fatal error.
    pub async fn review_snippets(&self, movie_id: u64) -> Result<Vec<String>, ReviewError> {
        let payload: ReviewsPayload = self
            .get_json(
                &format!("movie/{movie_id}/reviews"),
                &[
                    ("api_key", self.settings.api_key.clone()),
                    ("language", self.settings.language.clone()),
                    ("page", "1".to_string()),
                ],
            )
            .await?;

        Ok(payload
            .results
            .into_iter()
            .filter_map(|entry| {
                let trimmed = entry.content.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(truncate_chars(trimmed, MAX_SNIPPET_CHARS))
                }
            })
            .take(MAX_REVIEW_SNIPPETS)
            .collect())
    }

    /// Popular-movies listing. Lighter records: list payloads carry no
    /// credits, so directors/cast stay empty.
    pub async fn popular(&self, page: u32) -> Result<Vec<MovieMetadata>, ReviewError> {
        let payload: PopularPayload = self
            .get_json(
                "movie/popular",
                &[
                    ("api_key", self.settings.api_key.clone()),
                    ("language", self.settings.language.clone()),
                    ("page", page.to_string()),
                ],
            )
            .await?;

        Ok(payload
            .results
            .into_iter()
            .map(|entry| entry.into_metadata(&self.settings.image_base_url))
            .collect())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ReviewError> {
        let url = format!("{}/{}", self.settings.base_url, path);
        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|err| from_reqwest("TMDB request", err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReviewError::upstream(format!(
                "TMDB {path} returned status {status}"
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|err| ReviewError::upstream(format!("TMDB {path} payload malformed: {err}")))
    }
}

fn build_metadata(details: DetailsPayload, image_base_url: &str) -> MovieMetadata {
    let directors = details
        .credits
        .as_ref()
        .map(|credits| {
            credits
                .crew
                .iter()
                .filter(|member| member.job.as_deref() == Some("Director"))
                .filter_map(|member| member.name.clone())
                .collect()
        })
        .unwrap_or_default();

    let cast = details
        .credits
        .as_ref()
        .map(|credits| {
            credits
                .cast
                .iter()
                .filter_map(|member| member.name.clone())
                .take(MAX_CAST_MEMBERS)
                .collect()
        })
        .unwrap_or_default();

    let genres = details
        .genres
        .into_iter()
        .filter_map(|genre| genre.name)
        .collect();

    MovieMetadata {
        tmdb_id: details.id,
        title: details.title,
        year: year_from_release_date(details.release_date.as_deref()),
        synopsis: details.overview.filter(|text| !text.trim().is_empty()),
        directors,
        cast,
        genres,
        runtime_minutes: details.runtime,
        external_rating: details.vote_average,
        vote_count: details.vote_count,
        popularity: details.popularity,
        release_date: details.release_date,
        poster_url: poster_url(details.poster_path.as_deref(), image_base_url),
    }
}

fn year_from_release_date(release_date: Option<&str>) -> Option<i32> {
    release_date?.split('-').next()?.parse().ok()
}

fn poster_url(poster_path: Option<&str>, image_base_url: &str) -> Option<String> {
    poster_path.map(|path| format!("{image_base_url}{path}"))
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct DetailsPayload {
    id: u64,
    title: String,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    runtime: Option<u32>,
    #[serde(default)]
    vote_average: Option<f64>,
    #[serde(default)]
    vote_count: Option<u64>,
    #[serde(default)]
    popularity: Option<f64>,
    #[serde(default)]
    poster_path: Option<String>,
    #[serde(default)]
    genres: Vec<GenreEntry>,
    #[serde(default)]
    credits: Option<CreditsPayload>,
}

#[derive(Debug, Deserialize)]
struct GenreEntry {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreditsPayload {
    #[serde(default)]
    cast: Vec<CreditEntry>,
    #[serde(default)]
    crew: Vec<CreditEntry>,
}

#[derive(Debug, Deserialize)]
struct CreditEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    job: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReviewsPayload {
    #[serde(default)]
    results: Vec<ReviewEntry>,
}

#[derive(Debug, Deserialize)]
struct ReviewEntry {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct PopularPayload {
    #[serde(default)]
    results: Vec<PopularEntry>,
}

#[derive(Debug, Deserialize)]
struct PopularEntry {
    id: u64,
    title: String,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    vote_average: Option<f64>,
    #[serde(default)]
    vote_count: Option<u64>,
    #[serde(default)]
    popularity: Option<f64>,
    #[serde(default)]
    poster_path: Option<String>,
}

impl PopularEntry {
    fn into_metadata(self, image_base_url: &str) -> MovieMetadata {
        MovieMetadata {
            tmdb_id: self.id,
            title: self.title,
            year: year_from_release_date(self.release_date.as_deref()),
            synopsis: self.overview.filter(|text| !text.trim().is_empty()),
            directors: Vec::new(),
            cast: Vec::new(),
            genres: Vec::new(),
            runtime_minutes: None,
            external_rating: self.vote_average,
            vote_count: self.vote_count,
            popularity: self.popularity,
            release_date: self.release_date,
            poster_url: poster_url(self.poster_path.as_deref(), image_base_url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_details() -> DetailsPayload {
        serde_json::from_value(serde_json::json!({
            "id": 278,
            "title": "The Shawshank Redemption",
            "overview": "Two imprisoned men bond over a number of years.",
            "release_date": "1994-09-23",
            "runtime": 142,
            "vote_average": 8.7,
            "vote_count": 26000,
            "popularity": 94.1,
            "poster_path": "/q6y0Go1tsGEsmtFryDOJo3dEmqu.jpg",
            "genres": [{"id": 18, "name": "Drama"}, {"id": 80, "name": "Crime"}],
            "credits": {
                "cast": [
                    {"name": "Tim Robbins", "character": "Andy"},
                    {"name": "Morgan Freeman", "character": "Red"}
                ],
                "crew": [
                    {"name": "Frank Darabont", "job": "Director"},
                    {"name": "Roger Deakins", "job": "Director of Photography"}
                ]
            }
        }))
        .expect("fixture should deserialize")
    }

    #[test]
    fn builds_metadata_from_details_payload() {
        let metadata = build_metadata(sample_details(), "https://img.example/w500");

        assert_eq!(metadata.tmdb_id, 278);
        assert_eq!(metadata.year, Some(1994));
        assert_eq!(metadata.directors, vec!["Frank Darabont"]);
        assert_eq!(metadata.cast, vec!["Tim Robbins", "Morgan Freeman"]);
        assert_eq!(metadata.genres, vec!["Drama", "Crime"]);
        assert_eq!(metadata.external_rating, Some(8.7));
        assert_eq!(
            metadata.poster_url.as_deref(),
            Some("https://img.example/w500/q6y0Go1tsGEsmtFryDOJo3dEmqu.jpg")
        );
    }

    #[test]
    fn year_parsing_tolerates_missing_or_odd_dates() {
        assert_eq!(year_from_release_date(Some("1994-09-23")), Some(1994));
        assert_eq!(year_from_release_date(Some("")), None);
        assert_eq!(year_from_release_date(Some("soon")), None);
        assert_eq!(year_from_release_date(None), None);
    }

    #[test]
    fn cast_is_capped() {
        let mut details = sample_details();
        let cast: Vec<CreditEntry> = (0..20)
            .map(|idx| CreditEntry {
                name: Some(format!("Actor {idx}")),
                job: None,
            })
            .collect();
        details.credits.as_mut().unwrap().cast = cast;

        let metadata = build_metadata(details, "base");
        assert_eq!(metadata.cast.len(), MAX_CAST_MEMBERS);
    }

    #[test]
    fn empty_synopsis_becomes_none() {
        let mut details = sample_details();
        details.overview = Some("   ".to_string());
        let metadata = build_metadata(details, "base");
        assert!(metadata.synopsis.is_none());
    }

    #[test]
    fn snippet_truncation_respects_char_boundaries() {
        let long: String = "é".repeat(700);
        let truncated = truncate_chars(&long, MAX_SNIPPET_CHARS);
        assert_eq!(truncated.chars().count(), MAX_SNIPPET_CHARS);

        let short = "fine as is";
        assert_eq!(truncate_chars(short, MAX_SNIPPET_CHARS), short);
    }
}
