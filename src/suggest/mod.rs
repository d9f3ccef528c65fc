//! Prompt suggestions
//!
//! Short, evocative evolutions of a base prompt. A curated set of style
//! variations is always available; when a backend API key is configured the
//! engine asks a chat model first and falls back to the curated set on any
//! failure or unusable answer, so callers never see an error from here.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::BackendConfig;
use crate::error::{AppError, Result};

pub const MAX_SUGGESTIONS: usize = 8;
pub const DEFAULT_SUGGESTIONS: usize = 3;

const DEFAULT_BASE: &str = "soft gradient abstract composition";

const STYLE_VARIATIONS: &[&str] = &[
    "at golden hour, watercolor wash",
    "as minimalist line art, high-key background",
    "nocturne palette, moody cinematic lighting",
    "macro detail, shallow depth of field",
    "dreamlike haze, pastel tones",
    "bold chiaroscuro, dramatic contrast",
];

const SYSTEM_PROMPT: &str = "You suggest short, evocative image prompts. \
Return one suggestion per line, each under 80 characters, no numbering.";

/// Produces prompt suggestions, model-backed when a key is configured
pub struct SuggestionEngine {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: String,
}

impl SuggestionEngine {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.suggest_model.clone(),
        })
    }

    /// Produce up to `limit` suggestions evolving `base`. The curated set
    /// is the floor: this never fails.
    pub async fn suggest(&self, base: &str, limit: usize) -> Vec<String> {
        let limit = limit.clamp(1, MAX_SUGGESTIONS);

        if !self.api_key.is_empty() {
            match self.from_model(base, limit).await {
                Ok(lines) if !lines.is_empty() => return lines,
                Ok(_) => debug!("Suggestion model returned nothing usable"),
                Err(e) => debug!(error = %e, "Suggestion model call failed"),
            }
        }

        curated(base, limit)
    }

    async fn from_model(&self, base: &str, limit: usize) -> Result<Vec<String>> {
        let url = format!("{}/v1/chat/completions", self.endpoint);
        let base = non_empty_or_default(base);
        let user = format!("Base prompt: {}\nSuggest {} creative evolutions.", base, limit);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: 0.8,
            max_tokens: 120,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::BackendFailure(format!(
                "Suggestion backend returned {}",
                status
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::BackendFailure(format!("Failed to parse response: {}", e)))?;

        let text = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        Ok(text.lines().filter_map(clean_line).take(limit).collect())
    }
}

fn non_empty_or_default(base: &str) -> &str {
    let trimmed = base.trim();
    if trimmed.is_empty() {
        DEFAULT_BASE
    } else {
        trimmed
    }
}

/// Strip the list markers and numbering chat models tend to prepend
fn clean_line(line: &str) -> Option<String> {
    let cleaned = line
        .trim_start_matches(|c: char| matches!(c, '-' | '*' | '.') || c.is_ascii_digit() || c.is_whitespace())
        .trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

fn curated(base: &str, limit: usize) -> Vec<String> {
    let seed = non_empty_or_default(base);
    STYLE_VARIATIONS
        .iter()
        .take(limit.min(STYLE_VARIATIONS.len()))
        .map(|style| format!("{}, {}", seed, style))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curated_evolves_the_base_prompt() {
        let suggestions = curated("a fox", 3);
        assert_eq!(suggestions.len(), 3);
        for s in &suggestions {
            assert!(s.starts_with("a fox, "));
        }
    }

    #[test]
    fn test_curated_blank_base_uses_default_seed() {
        let suggestions = curated("   ", 2);
        assert_eq!(suggestions.len(), 2);
        assert!(suggestions[0].starts_with(DEFAULT_BASE));
    }

    #[test]
    fn test_curated_is_capped_by_the_style_list() {
        assert_eq!(curated("x", 100).len(), STYLE_VARIATIONS.len());
    }

    #[test]
    fn test_clean_line_strips_markers() {
        assert_eq!(clean_line("- a fox, golden hour"), Some("a fox, golden hour".to_string()));
        assert_eq!(clean_line("3. nocturne palette"), Some("nocturne palette".to_string()));
        assert_eq!(clean_line("  * dreamy haze  "), Some("dreamy haze".to_string()));
        assert_eq!(clean_line("   "), None);
        assert_eq!(clean_line("- "), None);
    }

    #[tokio::test]
    async fn test_no_key_means_curated() {
        let config = BackendConfig {
            endpoint: "http://localhost:1".to_string(),
            api_key: String::new(),
            edit_model: "e".to_string(),
            synthesize_model: "s".to_string(),
            suggest_model: "m".to_string(),
            timeout_ms: 1_000,
        };
        let engine = SuggestionEngine::new(&config).unwrap();

        // No network call happens without a key; the endpoint is a dead port
        let suggestions = engine.suggest("a fox", 2).await;
        assert_eq!(suggestions.len(), 2);
        assert!(suggestions[0].starts_with("a fox, "));
    }
}
