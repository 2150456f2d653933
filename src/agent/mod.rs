use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    config::ScoreWeights,
    error::ReviewError,
    llm::{ChatMessage, LlmClient, LlmRequest, MessageRole},
    sentiment::{Polarity, SentimentExtractor, SentimentResult},
    tmdb::{MovieMetadata, TmdbClient},
};

const MIN_REVIEW_WORDS: u32 = 100;
const MAX_REVIEW_WORDS: u32 = 2500;
const MIN_YEAR: i32 = 1888;
const MAX_YEAR: i32 = 2100;
const MAX_TITLE_CHARS: usize = 200;
const REVIEW_TEMPERATURE: f64 = 0.7;

/// One review-generation request. Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub target_audience: TargetAudience,
    #[serde(default)]
    pub review_style: ReviewStyle,
    #[serde(default = "default_max_length")]
    pub max_length: u32,
    #[serde(default)]
    pub include_spoilers: bool,
}

fn default_max_length() -> u32 {
    1000
}

impl ReviewRequest {
    pub fn validate(&self) -> Result<(), ReviewError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ReviewError::Validation("title must not be empty".into()));
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(ReviewError::Validation(format!(
                "title must be at most {MAX_TITLE_CHARS} characters"
            )));
        }
        if let Some(year) = self.year {
            if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
                return Err(ReviewError::Validation(format!(
                    "year must be between {MIN_YEAR} and {MAX_YEAR}"
                )));
            }
        }
        if !(MIN_REVIEW_WORDS..=MAX_REVIEW_WORDS).contains(&self.max_length) {
            return Err(ReviewError::Validation(format!(
                "max_length must be between {MIN_REVIEW_WORDS} and {MAX_REVIEW_WORDS} words"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStyle {
    #[default]
    Professional,
    Casual,
    Academic,
    Entertaining,
    Brief,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetAudience {
    #[default]
    General,
    Enthusiast,
    Critic,
    Student,
    Family,
}

/// Terminal artifact of a finished review task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewResult {
    pub text: String,
    pub composite_score: f64,
    pub word_count: usize,
    pub polarity: Polarity,
    pub themes: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// The unit of work the task manager wraps: one full review pipeline run.
#[async_trait]
pub trait ReviewPipeline: Send + Sync {
    async fn run(&self, request: &ReviewRequest) -> Result<ReviewResult, ReviewError>;
}

/// Composes the review prompt from metadata, sentiment, and request
/// settings, performs the final LLM call, and computes the composite
/// score. No internal retries.
pub struct ReviewAgent {
    llm: LlmClient,
    tmdb: TmdbClient,
    extractor: SentimentExtractor,
    reviewer_system: String,
    weights: ScoreWeights,
}

impl ReviewAgent {
    pub fn new(
        llm: LlmClient,
        tmdb: TmdbClient,
        extractor: SentimentExtractor,
        reviewer_system: String,
        weights: ScoreWeights,
    ) -> Self {
        Self {
            llm,
            tmdb,
            extractor,
            reviewer_system,
            weights,
        }
    }

    pub async fn generate(
        &self,
        request: &ReviewRequest,
        metadata: &MovieMetadata,
        sentiment: &SentimentResult,
    ) -> Result<ReviewResult, ReviewError> {
        let prompt = build_review_prompt(request, metadata, sentiment);
        let llm_request = LlmRequest::new(vec![
            ChatMessage::new(MessageRole::System, self.reviewer_system.clone()),
            ChatMessage::new(MessageRole::User, prompt),
        ])
        .with_temperature(REVIEW_TEMPERATURE)
        .with_max_tokens(max_tokens_for(request.max_length));

        let response = self.llm.execute(llm_request).await?;
        info!(
            movie = %metadata.title,
            model = %response.model,
            tokens = response.token_usage.total_tokens,
            "review generated"
        );

        let text = response.text.trim().to_string();
        if text.is_empty() {
            return Err(ReviewError::upstream("LLM returned an empty review"));
        }

        let word_count = text.split_whitespace().count();
        let composite_score =
            composite_score(&self.weights, metadata.external_rating, sentiment.polarity);

        Ok(ReviewResult {
            text,
            composite_score,
            word_count,
            polarity: sentiment.polarity,
            themes: sentiment.themes.clone(),
            generated_at: Utc::now(),
        })
    }
}

#[async_trait]
impl ReviewPipeline for ReviewAgent {
    async fn run(&self, request: &ReviewRequest) -> Result<ReviewResult, ReviewError> {
        let metadata = self.tmdb.lookup(request.title.trim(), request.year).await?;

        // Snippet fetch is best effort; the synopsis stands in when TMDB
        // has no reviews or the call fails.
        let snippets = match self.tmdb.review_snippets(metadata.tmdb_id).await {
            Ok(snippets) => snippets,
            Err(err) => {
                warn!(%err, movie = %metadata.title, "review snippet fetch failed");
                Vec::new()
            }
        };
        let corpus = if snippets.is_empty() {
            metadata.synopsis.clone().unwrap_or_default()
        } else {
            snippets.join("\n\n")
        };

        let sentiment = self.extractor.extract(&corpus).await?;
        self.generate(request, &metadata, &sentiment).await
    }
}

/// Deterministic composite of the external rating and the extracted
/// polarity: a weighted mean on the 0-10 scale, one decimal. When TMDB
/// supplies no usable rating the polarity value stands alone.
pub fn composite_score(
    weights: &ScoreWeights,
    external_rating: Option<f64>,
    polarity: Polarity,
) -> f64 {
    let sentiment = polarity_value(polarity);
    let raw = match external_rating.filter(|rating| rating.is_finite()) {
        Some(rating) => {
            let rating = rating.clamp(0.0, 10.0);
            (weights.rating * rating + weights.sentiment * sentiment)
                / (weights.rating + weights.sentiment)
        }
        None => sentiment,
    };
    (raw.clamp(0.0, 10.0) * 10.0).round() / 10.0
}

fn polarity_value(polarity: Polarity) -> f64 {
    match polarity {
        Polarity::Positive => 8.5,
        Polarity::Mixed => 5.5,
        Polarity::Negative => 2.5,
    }
}

fn max_tokens_for(max_length: u32) -> u32 {
    (max_length * 2).clamp(512, 4096)
}

fn style_instruction(style: ReviewStyle) -> &'static str {
    match style {
        ReviewStyle::Professional => {
            "Write with the measured, authoritative voice of a newspaper film critic."
        }
        ReviewStyle::Casual => {
            "Write in a relaxed, conversational voice, as if recommending a film to a friend."
        }
        ReviewStyle::Academic => {
            "Write as formal film scholarship, attending to cinematic technique, form, and context."
        }
        ReviewStyle::Entertaining => {
            "Write with wit and energy; the review itself should be fun to read."
        }
        ReviewStyle::Brief => {
            "Write a compact review that reaches a clear verdict quickly."
        }
    }
}

fn audience_instruction(audience: TargetAudience) -> &'static str {
    match audience {
        TargetAudience::General => "Address a general audience deciding whether to watch it.",
        TargetAudience::Enthusiast => {
            "Address committed film enthusiasts; references to craft and comparable films are welcome."
        }
        TargetAudience::Critic => {
            "Address fellow critics; assume deep familiarity with film history and criticism."
        }
        TargetAudience::Student => {
            "Address film students; highlight what the film teaches about the medium."
        }
        TargetAudience::Family => {
            "Address parents choosing family viewing; note suitability and tone."
        }
    }
}

fn spoiler_instruction(include_spoilers: bool) -> &'static str {
    if include_spoilers {
        "You may discuss key plot turns, including the ending."
    } else {
        "Do not reveal major plot twists or the ending."
    }
}

/// Assemble the user prompt. Deterministic in its inputs: the same
/// request, metadata, and sentiment always produce the same prompt.
pub fn build_review_prompt(
    request: &ReviewRequest,
    metadata: &MovieMetadata,
    sentiment: &SentimentResult,
) -> String {
    let mut facts = String::new();
    facts.push_str(&format!("Title: {}", metadata.title));
    if let Some(year) = metadata.year {
        facts.push_str(&format!(" ({year})"));
    }
    facts.push('\n');
    if !metadata.directors.is_empty() {
        facts.push_str(&format!("Directed by: {}\n", metadata.directors.join(", ")));
    }
    if !metadata.cast.is_empty() {
        facts.push_str(&format!("Starring: {}\n", metadata.cast.join(", ")));
    }
    if !metadata.genres.is_empty() {
        facts.push_str(&format!("Genres: {}\n", metadata.genres.join(", ")));
    }
    if let Some(runtime) = metadata.runtime_minutes {
        facts.push_str(&format!("Runtime: {runtime} minutes\n"));
    }
    if let Some(rating) = metadata.external_rating {
        match metadata.vote_count {
            Some(votes) => {
                facts.push_str(&format!("TMDB rating: {rating:.1}/10 from {votes} votes\n"))
            }
            None => facts.push_str(&format!("TMDB rating: {rating:.1}/10\n")),
        }
    }
    if let Some(synopsis) = &metadata.synopsis {
        facts.push_str(&format!("Synopsis: {synopsis}\n"));
    }

    let polarity = match sentiment.polarity {
        Polarity::Positive => "largely positive",
        Polarity::Negative => "largely negative",
        Polarity::Mixed => "mixed",
    };
    let mut reception = format!("Audience reception is {polarity}.");
    if !sentiment.themes.is_empty() {
        reception.push_str(&format!(
            " Recurring themes in audience reactions: {}.",
            sentiment.themes.join(", ")
        ));
    }

    format!(
        "Write a review of the film below.\n\n{facts}\n{reception}\n\n{style}\n{audience}\n{spoilers}\nKeep the review under {max_length} words of flowing prose.",
        facts = facts,
        reception = reception,
        style = style_instruction(request.review_style),
        audience = audience_instruction(request.target_audience),
        spoilers = spoiler_instruction(request.include_spoilers),
        max_length = request.max_length,
    )
}
