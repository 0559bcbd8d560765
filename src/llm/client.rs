//! HTTP client for the external reasoning model
//!
//! Model-agnostic: speaks the Anthropic messages API and the
//! OpenAI-compatible chat completions API (DeepSeek, local servers, ...).
//! The brain never calls this directly; it goes through a
//! [`ReasoningService`](crate::llm::reasoning::ReasoningService).

use crate::core::error::{MindError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Wire format spoken by the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFormat {
    Anthropic,
    OpenAI,
}

impl ApiFormat {
    fn detect(url: &str) -> Self {
        if url.contains("anthropic.com") {
            ApiFormat::Anthropic
        } else {
            ApiFormat::OpenAI
        }
    }
}

/// Endpoint settings
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,
}

impl LlmSettings {
    /// Read settings from the environment
    ///
    /// Required: LLM_API_KEY
    /// Optional: LLM_API_URL (defaults to the Anthropic API), LLM_MODEL,
    /// LLM_MAX_TOKENS
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("LLM_API_KEY")
            .map_err(|_| MindError::LlmError("LLM_API_KEY not set".into()))?;
        let api_url = std::env::var("LLM_API_URL")
            .unwrap_or_else(|_| "https://api.anthropic.com/v1/messages".into());
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "claude-3-haiku-20240307".into());
        let max_tokens = std::env::var("LLM_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1024);

        Ok(Self { api_key, api_url, model, max_tokens })
    }
}

/// Async completion client; cheap to clone
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: Client,
    settings: LlmSettings,
    format: ApiFormat,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Self {
        let format = ApiFormat::detect(&settings.api_url);
        Self {
            http: Client::new(),
            settings,
            format,
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(LlmSettings::from_env()?))
    }

    pub fn format(&self) -> ApiFormat {
        self.format
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// Send one system + user exchange and return the model's text
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = match self.format {
            ApiFormat::Anthropic => self
                .http
                .post(&self.settings.api_url)
                .header("x-api-key", &self.settings.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&AnthropicRequest {
                    model: &self.settings.model,
                    max_tokens: self.settings.max_tokens,
                    system,
                    messages: vec![Message { role: "user", content: user }],
                }),
            ApiFormat::OpenAI => self
                .http
                .post(&self.settings.api_url)
                .bearer_auth(&self.settings.api_key)
                .json(&OpenAIRequest {
                    model: &self.settings.model,
                    max_tokens: self.settings.max_tokens,
                    messages: vec![
                        Message { role: "system", content: system },
                        Message { role: "user", content: user },
                    ],
                }),
        };

        let response = request
            .send()
            .await
            .map_err(|e| MindError::LlmError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MindError::LlmError(format!("API error {}: {}", status, body)));
        }

        let text = match self.format {
            ApiFormat::Anthropic => response
                .json::<AnthropicResponse>()
                .await
                .map_err(|e| MindError::LlmError(e.to_string()))?
                .content
                .into_iter()
                .next()
                .map(|c| c.text),
            ApiFormat::OpenAI => response
                .json::<OpenAIResponse>()
                .await
                .map_err(|e| MindError::LlmError(e.to_string()))?
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content),
        };

        text.ok_or_else(|| MindError::LlmError("Empty response".into()))
    }
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(url: &str) -> LlmSettings {
        LlmSettings {
            api_key: "test-key".into(),
            api_url: url.into(),
            model: "test-model".into(),
            max_tokens: 256,
        }
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(LlmClient::new(settings("https://api.anthropic.com/v1/messages")).format(), ApiFormat::Anthropic);
        assert_eq!(LlmClient::new(settings("http://localhost:8080/v1/chat/completions")).format(), ApiFormat::OpenAI);
    }

    #[test]
    fn test_from_env_missing_key() {
        if std::env::var("LLM_API_KEY").is_err() {
            assert!(LlmClient::from_env().is_err());
        }
    }
}
