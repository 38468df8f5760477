//! LLM backends for the narration layer
//!
//! Anthropic's Messages API is called directly; everything OpenAI-compatible
//! (OpenAI, OpenRouter, local servers) goes through `async-openai`.

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// LLM backend errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Empty response")]
    EmptyResponse,
}

/// Text generation service
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError>;

    fn model_name(&self) -> &str;
}

/// Thread-safe reference to an LLM backend
pub type SharedBackend = Arc<dyn LlmBackend>;

/// Which API family a backend speaks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmProvider {
    Anthropic,
    OpenAi,
    OpenRouter,
    /// Any OpenAI-compatible server at the given base URL
    Local(String),
}

/// Backend settings
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub provider: LlmProvider,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl BackendConfig {
    pub fn new(provider: LlmProvider, api_key: &str, model: &str) -> Self {
        Self {
            provider,
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens: 1024,
            temperature: 0.2,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn base_url(&self) -> Option<&str> {
        match &self.provider {
            LlmProvider::OpenRouter => Some("https://openrouter.ai/api/v1"),
            LlmProvider::Local(url) => Some(url),
            LlmProvider::Anthropic | LlmProvider::OpenAi => None,
        }
    }
}

/// Build a backend for the configured provider
pub fn create_backend(config: BackendConfig) -> Result<SharedBackend, LlmError> {
    if config.api_key.trim().is_empty() && !matches!(config.provider, LlmProvider::Local(_)) {
        return Err(LlmError::Config(format!(
            "API key required for {:?}",
            config.provider
        )));
    }

    let backend: SharedBackend = match config.provider {
        LlmProvider::Anthropic => Arc::new(AnthropicBackend::new(config)),
        _ => Arc::new(OpenAiCompatBackend::new(config)),
    };
    Ok(backend)
}

/// OpenAI-compatible chat completions
struct OpenAiCompatBackend {
    client: Client<OpenAIConfig>,
    config: BackendConfig,
}

impl OpenAiCompatBackend {
    fn new(config: BackendConfig) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(&config.api_key);
        if let Some(base_url) = config.base_url() {
            openai_config = openai_config.with_api_base(base_url);
        }

        Self {
            client: Client::with_config(openai_config),
            config,
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiCompatBackend {
    async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let api = |e: async_openai::error::OpenAIError| LlmError::Api(e.to_string());

        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()
                    .map_err(api)?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user)
                    .build()
                    .map_err(api)?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .messages(messages)
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens)
            .build()
            .map_err(api)?;

        let response = self.client.chat().create(request).await.map_err(api)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Anthropic Messages API
struct AnthropicBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl AnthropicBackend {
    fn new(config: BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "system": system,
            "messages": [{"role": "user", "content": user}],
        });

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("Anthropic API error {}: {}", status, text)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        json["content"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|block| block["text"].as_str())
            .next()
            .map(str::to_string)
            .ok_or(LlmError::EmptyResponse)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_rejected() {
        let config = BackendConfig::new(LlmProvider::Anthropic, "  ", "claude-sonnet-4-20250514");
        assert!(matches!(create_backend(config), Err(LlmError::Config(_))));
    }

    #[test]
    fn test_local_needs_no_key() {
        let config = BackendConfig::new(
            LlmProvider::Local("http://localhost:11434/v1".to_string()),
            "",
            "llama3",
        );
        let backend = create_backend(config).unwrap();
        assert_eq!(backend.model_name(), "llama3");
    }

    #[test]
    fn test_base_urls() {
        let router = BackendConfig::new(LlmProvider::OpenRouter, "k", "m");
        assert_eq!(router.base_url(), Some("https://openrouter.ai/api/v1"));
        let openai = BackendConfig::new(LlmProvider::OpenAi, "k", "m").with_max_tokens(64);
        assert_eq!(openai.base_url(), None);
        assert_eq!(openai.max_tokens, 64);
    }
}
