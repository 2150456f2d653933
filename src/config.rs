use std::env;

use anyhow::{Context, Result, bail};

pub const DEFAULT_KIMI_BASE_URL: &str = "https://api.moonshot.cn/v1";
pub const DEFAULT_CHAT_MODEL: &str = "moonshot-v1-8k";
pub const DEFAULT_TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_TMDB_IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/w500";

const REVIEWER_SYSTEM_PROMPT: &str = "You are a professional film critic who writes grounded, balanced reviews from verified information. Base every claim on the movie facts and audience signals you are given. Analyze plot, direction, performances, craft, and thematic depth. Offer a clear point of view with concrete examples, acknowledge weaknesses alongside strengths, and keep the language vivid without hyperbole. Write plain prose with no markdown headings, lists, or emojis.";

const SENTIMENT_SYSTEM_PROMPT: &str = "You analyze audience reactions to a film. Read the provided text and respond with a single JSON object of the form {\"polarity\": \"positive|negative|mixed\", \"themes\": [\"...\"]}. The polarity reflects the overall reception; themes are short noun phrases naming what viewers talk about most, strongest first, at most eight. Respond with the JSON object only, no commentary and no code fences.";

/// Process configuration, resolved once at startup from the environment.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmSettings,
    pub tmdb: TmdbSettings,
    pub runtime: RuntimeSettings,
    pub scoring: ScoreWeights,
    pub prompts: ReviewPrompts,
}

#[derive(Clone, Debug)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TmdbSettings {
    pub api_key: String,
    pub base_url: String,
    pub image_base_url: String,
    pub language: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RuntimeSettings {
    pub max_concurrent_tasks: usize,
    pub task_retention_hours: i64,
}

/// Weighting of the composite score; see `agent::composite_score`.
#[derive(Clone, Copy, Debug)]
pub struct ScoreWeights {
    pub rating: f64,
    pub sentiment: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            rating: 0.7,
            sentiment: 0.3,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ReviewPrompts {
    pub reviewer_system: String,
    pub sentiment_system: String,
}

impl Default for ReviewPrompts {
    fn default() -> Self {
        Self {
            reviewer_system: REVIEWER_SYSTEM_PROMPT.to_string(),
            sentiment_system: SENTIMENT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let llm = LlmSettings {
            api_key: env::var("KIMI_API_KEY").context("KIMI_API_KEY env var is missing")?,
            base_url: env_or("KIMI_BASE_URL", DEFAULT_KIMI_BASE_URL),
            chat_model: env_or("KIMI_CHAT_MODEL", DEFAULT_CHAT_MODEL),
            timeout_secs: env_parse("LLM_TIMEOUT_SECS", 45)?,
        };

        let tmdb = TmdbSettings {
            api_key: env::var("TMDB_API_KEY").context("TMDB_API_KEY env var is missing")?,
            base_url: env_or("TMDB_BASE_URL", DEFAULT_TMDB_BASE_URL),
            image_base_url: env_or("TMDB_IMAGE_BASE_URL", DEFAULT_TMDB_IMAGE_BASE_URL),
            language: env_or("TMDB_LANGUAGE", "en-US"),
            timeout_secs: env_parse("TMDB_TIMEOUT_SECS", 15)?,
        };

        let runtime = RuntimeSettings {
            max_concurrent_tasks: env_parse("MAX_CONCURRENT_TASKS", 4)?,
            task_retention_hours: env_parse("TASK_RETENTION_HOURS", 24)?,
        };

        if runtime.max_concurrent_tasks == 0 {
            bail!("MAX_CONCURRENT_TASKS must be at least 1");
        }

        let scoring = ScoreWeights {
            rating: env_parse("SCORE_RATING_WEIGHT", ScoreWeights::default().rating)?,
            sentiment: env_parse("SCORE_SENTIMENT_WEIGHT", ScoreWeights::default().sentiment)?,
        };
        validate_weights(&scoring)?;

        Ok(Self {
            llm,
            tmdb,
            runtime,
            scoring,
            prompts: ReviewPrompts::default(),
        })
    }
}

fn validate_weights(weights: &ScoreWeights) -> Result<()> {
    if !weights.rating.is_finite() || !weights.sentiment.is_finite() {
        bail!("score weights must be finite numbers");
    }
    if weights.rating < 0.0 || weights.sentiment < 0.0 {
        bail!("score weights must not be negative");
    }
    if weights.rating + weights.sentiment <= 0.0 {
        bail!("score weights must not both be zero");
    }
    Ok(())
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|err| anyhow::anyhow!("invalid {key}: {err}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_are_valid() {
        assert!(validate_weights(&ScoreWeights::default()).is_ok());
    }

    #[test]
    fn rejects_negative_and_zero_sum_weights() {
        assert!(
            validate_weights(&ScoreWeights {
                rating: -0.1,
                sentiment: 0.5,
            })
            .is_err()
        );
        assert!(
            validate_weights(&ScoreWeights {
                rating: 0.0,
                sentiment: 0.0,
            })
            .is_err()
        );
    }

    #[test]
    fn default_prompts_request_strict_json() {
        let prompts = ReviewPrompts::default();
        assert!(prompts.sentiment_system.contains("polarity"));
        assert!(prompts.sentiment_system.contains("themes"));
    }
}
