use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    error::ReviewError,
    llm::{ChatMessage, LlmClient, LlmRequest, MessageRole},
};

const MAX_THEMES: usize = 8;
const SENTIMENT_TEMPERATURE: f64 = 0.3;
const SENTIMENT_MAX_TOKENS: u32 = 400;

const POSITIVE_MARKERS: &[&str] = &[
    "masterpiece",
    "excellent",
    "brilliant",
    "moving",
    "gripping",
    "stunning",
    "superb",
    "wonderful",
    "powerful",
    "unforgettable",
    "loved",
    "great",
];

const NEGATIVE_MARKERS: &[&str] = &[
    "boring",
    "terrible",
    "awful",
    "disappointing",
    "bland",
    "mess",
    "waste",
    "predictable",
    "shallow",
    "tedious",
    "hated",
    "worst",
];

/// Overall reception signal extracted from audience text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Negative,
    Mixed,
}

/// Fixed-shape result of the extraction stage. Read-only once created.
#[derive(Debug, Clone, Serialize)]
pub struct SentimentResult {
    pub polarity: Polarity,
    pub themes: Vec<String>,
}

impl SentimentResult {
    fn neutral() -> Self {
        Self {
            polarity: Polarity::Mixed,
            themes: Vec::new(),
        }
    }
}

/// Sends audience text to the LLM and decodes the reply leniently: the
/// model is asked for strict JSON, but fences, prose padding, and field
/// aliases are tolerated, and a keyword scan stands in when the reply is
/// not JSON at all.
#[derive(Clone)]
pub struct SentimentExtractor {
    llm: LlmClient,
    system_prompt: String,
}

impl SentimentExtractor {
    pub fn new(llm: LlmClient, system_prompt: String) -> Self {
        Self { llm, system_prompt }
    }

    pub async fn extract(&self, text: &str) -> Result<SentimentResult, ReviewError> {
        if text.trim().is_empty() {
            return Ok(SentimentResult::neutral());
        }

        let request = LlmRequest::new(vec![
            ChatMessage::new(MessageRole::System, self.system_prompt.clone()),
            ChatMessage::new(MessageRole::User, text.to_string()),
        ])
        .with_temperature(SENTIMENT_TEMPERATURE)
        .with_max_tokens(SENTIMENT_MAX_TOKENS);

        let response = self.llm.execute(request).await?;
        parse_sentiment_reply(&response.text)
    }
}

/// Decode the model's reply into a `SentimentResult`.
///
/// An empty reply is a `Parse` error; a reply that is not valid JSON
/// degrades to the keyword-scan fallback rather than failing the stage.
pub fn parse_sentiment_reply(reply: &str) -> Result<SentimentResult, ReviewError> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return Err(ReviewError::Parse(
            "sentiment reply was empty".to_string(),
        ));
    }

    let cleaned = strip_code_fences(trimmed);
    if let Some(slice) = brace_slice(&cleaned) {
        if let Ok(payload) = serde_json::from_str::<SentimentPayload>(slice) {
            return Ok(payload.into_result());
        }
    }

    warn!("sentiment reply was not JSON, falling back to keyword scan");
    Ok(fallback_scan(trimmed))
}

#[derive(Debug, Deserialize)]
struct SentimentPayload {
    #[serde(default, alias = "sentiment")]
    polarity: Option<String>,
    #[serde(default, alias = "key_themes", alias = "keywords")]
    themes: Vec<String>,
}

impl SentimentPayload {
    fn into_result(self) -> SentimentResult {
        SentimentResult {
            polarity: self
                .polarity
                .as_deref()
                .map(parse_polarity)
                .unwrap_or(Polarity::Mixed),
            themes: normalize_themes(self.themes),
        }
    }
}

fn parse_polarity(raw: &str) -> Polarity {
    match raw.trim().to_lowercase().as_str() {
        "positive" | "pos" => Polarity::Positive,
        "negative" | "neg" => Polarity::Negative,
        _ => Polarity::Mixed,
    }
}

fn normalize_themes(themes: Vec<String>) -> Vec<String> {
    let mut seen = Vec::new();
    let mut out = Vec::new();
    for theme in themes {
        let trimmed = theme.trim();
        if trimmed.is_empty() {
            continue;
        }
        let key = trimmed.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(trimmed.to_string());
        if out.len() == MAX_THEMES {
            break;
        }
    }
    out
}

/// Last-resort polarity guess over the raw reply text.
fn fallback_scan(text: &str) -> SentimentResult {
    let lowered = text.to_lowercase();
    let positive = POSITIVE_MARKERS
        .iter()
        .filter(|word| lowered.contains(*word))
        .count();
    let negative = NEGATIVE_MARKERS
        .iter()
        .filter(|word| lowered.contains(*word))
        .count();

    let polarity = if positive > negative {
        Polarity::Positive
    } else if negative > positive {
        Polarity::Negative
    } else {
        Polarity::Mixed
    };

    SentimentResult {
        polarity,
        themes: Vec::new(),
    }
}

fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "")
}

fn brace_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json_reply() {
        let result = parse_sentiment_reply(
            r#"{"polarity": "positive", "themes": ["friendship", "hope"]}"#,
        )
        .unwrap();
        assert_eq!(result.polarity, Polarity::Positive);
        assert_eq!(result.themes, vec!["friendship", "hope"]);
    }

    #[test]
    fn tolerates_code_fences_and_prose_padding() {
        let reply = "Sure, here is the analysis:\n```json\n{\"polarity\": \"negative\", \"themes\": [\"pacing\"]}\n```";
        let result = parse_sentiment_reply(reply).unwrap();
        assert_eq!(result.polarity, Polarity::Negative);
        assert_eq!(result.themes, vec!["pacing"]);
    }

    #[test]
    fn accepts_field_aliases() {
        let result =
            parse_sentiment_reply(r#"{"sentiment": "Positive", "key_themes": ["redemption"]}"#)
                .unwrap();
        assert_eq!(result.polarity, Polarity::Positive);
        assert_eq!(result.themes, vec!["redemption"]);
    }

    #[test]
    fn unknown_polarity_maps_to_mixed() {
        let result = parse_sentiment_reply(r#"{"polarity": "lukewarm", "themes": []}"#).unwrap();
        assert_eq!(result.polarity, Polarity::Mixed);
    }

    #[test]
    fn themes_are_trimmed_deduplicated_and_capped() {
        let themes: Vec<String> = (0..12)
            .map(|idx| format!(" theme {} ", idx % 6))
            .collect();
        let normalized = normalize_themes(themes);
        assert_eq!(normalized.len(), 6);
        assert_eq!(normalized[0], "theme 0");
    }

    #[test]
    fn non_json_reply_falls_back_to_keyword_scan() {
        let result =
            parse_sentiment_reply("Audiences found it a moving, brilliant masterpiece.").unwrap();
        assert_eq!(result.polarity, Polarity::Positive);
        assert!(result.themes.is_empty());

        let result = parse_sentiment_reply("A boring, tedious mess from start to end.").unwrap();
        assert_eq!(result.polarity, Polarity::Negative);
    }

    #[test]
    fn balanced_or_unmarked_text_scans_as_mixed() {
        let result = parse_sentiment_reply("Some thoughts about the film.").unwrap();
        assert_eq!(result.polarity, Polarity::Mixed);
    }

    #[test]
    fn empty_reply_is_a_parse_error() {
        let err = parse_sentiment_reply("   \n").unwrap_err();
        assert_eq!(err.kind(), "parse_error");
    }
}
