use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::{
    config::LlmSettings,
    error::{ReviewError, from_reqwest},
};

/// Defines the shape of a chat-style interaction with the LLM.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl LlmRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: 0.7,
            max_tokens: 2048,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Individual chat message, compatible with OpenAI compliant providers.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub text: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// Captures basic token usage metrics associated with a call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub response_tokens: usize,
    pub total_tokens: usize,
}

/// Full response surface returned to callers.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub token_usage: TokenUsage,
    pub model: String,
}

/// Client for one OpenAI-compatible chat-completion endpoint
/// (Kimi/Moonshot by default). Each call is a single timeout-bounded
/// attempt; retry policy belongs to callers.
#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    settings: LlmSettings,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Result<Self, ReviewError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|err| ReviewError::upstream(format!("failed to build LLM client: {err}")))?;
        Ok(Self { http, settings })
    }

    pub async fn execute(&self, request: LlmRequest) -> Result<LlmResponse, ReviewError> {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|msg| {
                serde_json::json!({
                    "role": msg.role.as_str(),
                    "content": msg.text,
                })
            })
            .collect();

        let payload = serde_json::json!({
            "model": self.settings.chat_model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let url = format!("{}/chat/completions", self.settings.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| from_reqwest("LLM chat completion", err))?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|err| from_reqwest("reading LLM response body", err))?;

        if !status.is_success() {
            return Err(ReviewError::upstream(format!(
                "LLM chat completion returned status {status}"
            )));
        }

        let body: serde_json::Value = serde_json::from_str(&body_text).map_err(|err| {
            ReviewError::upstream(format!("LLM response body was not JSON: {err}"))
        })?;

        let prompt_tokens = approximate_token_count(
            &request
                .messages
                .iter()
                .map(|m| m.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        );

        let (text, usage) = extract_text_and_usage(&body).ok_or_else(|| {
            ReviewError::upstream("unexpected chat completion payload shape".to_string())
        })?;

        let mut token_usage = usage.unwrap_or_else(|| TokenUsage {
            prompt_tokens,
            response_tokens: approximate_token_count(&text),
            total_tokens: 0,
        });
        if token_usage.prompt_tokens == 0 {
            token_usage.prompt_tokens = prompt_tokens;
        }
        if token_usage.response_tokens == 0 {
            token_usage.response_tokens = approximate_token_count(&text);
        }
        token_usage.total_tokens = token_usage.prompt_tokens + token_usage.response_tokens;

        Ok(LlmResponse {
            text,
            token_usage,
            model: self.settings.chat_model.clone(),
        })
    }
}

/// Extract assistant text and optional usage metrics from a chat
/// completion payload.
fn extract_text_and_usage(value: &serde_json::Value) -> Option<(String, Option<TokenUsage>)> {
    let chat: ChatCompletionPayload = serde_json::from_value(value.clone()).ok()?;

    let text = chat
        .choices
        .into_iter()
        .find_map(|choice| choice.message.content)?;

    let usage = chat.usage.map(|usage| TokenUsage {
        prompt_tokens: usage.prompt_tokens.unwrap_or_default(),
        response_tokens: usage.completion_tokens.unwrap_or_default(),
        total_tokens: usage.total_tokens.unwrap_or_default(),
    });

    Some((text, usage))
}

fn approximate_token_count(input: &str) -> usize {
    if input.trim().is_empty() {
        return 0;
    }
    input
        .split_whitespace()
        .filter(|segment| !segment.is_empty())
        .count()
}

#[derive(Debug, Deserialize)]
struct ChatCompletionPayload {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<UsagePayload>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    #[serde(default)]
    prompt_tokens: Option<usize>,
    #[serde(default)]
    completion_tokens: Option<usize>,
    #[serde(default)]
    total_tokens: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_and_usage_from_chat_payload() {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "A fine film."}}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 30, "total_tokens": 150}
        });

        let (text, usage) = extract_text_and_usage(&body).expect("payload should parse");
        assert_eq!(text, "A fine film.");
        let usage = usage.expect("usage should be present");
        assert_eq!(usage.prompt_tokens, 120);
        assert_eq!(usage.response_tokens, 30);
        assert_eq!(usage.total_tokens, 150);
    }

    #[test]
    fn missing_choices_yield_none() {
        let body = serde_json::json!({"error": {"message": "overloaded"}});
        assert!(extract_text_and_usage(&body).is_none());
    }

    #[test]
    fn usage_is_optional() {
        let body = serde_json::json!({
            "choices": [{"message": {"content": "ok"}}]
        });
        let (text, usage) = extract_text_and_usage(&body).expect("payload should parse");
        assert_eq!(text, "ok");
        assert!(usage.is_none());
    }

    #[test]
    fn token_count_ignores_extra_whitespace() {
        assert_eq!(approximate_token_count("  a  b\n c "), 3);
        assert_eq!(approximate_token_count("   "), 0);
    }
}
