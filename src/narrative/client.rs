//! HTTP chat client for OpenAI-compatible and Ollama endpoints.

use super::Completion;
use crate::error::NarrativeError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Wire dialect of the chat endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI chat completions (`/v1/chat/completions`)
    #[value(name = "openai")]
    OpenAi,
    /// Ollama chat API (`/api/chat`)
    Ollama,
}

impl LlmProvider {
    pub fn default_base_url(self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "https://api.openai.com",
            LlmProvider::Ollama => "http://localhost:11434",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "gpt-4o",
            LlmProvider::Ollama => "llama3.2:latest",
        }
    }
}

/// Configuration for the chat client.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub provider: LlmProvider,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// No timeout beyond the HTTP client default when unset.
    pub timeout_seconds: Option<u64>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        let provider = LlmProvider::OpenAi;
        Self {
            provider,
            base_url: provider.default_base_url().to_string(),
            model: provider.default_model().to_string(),
            api_key: None,
            temperature: 0.7,
            max_tokens: 1000,
            timeout_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: ChatMessage,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

/// Chat client over reqwest.
pub struct ChatClient {
    config: ChatConfig,
    http_client: reqwest::Client,
}

impl ChatClient {
    /// Create a client. The OpenAI dialect refuses to start without a key.
    pub fn new(config: ChatConfig) -> Result<Self, NarrativeError> {
        if config.provider == LlmProvider::OpenAi
            && config.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(NarrativeError::NotConfigured(
                "no API key for the OpenAI endpoint".to_string(),
            ));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http_client = builder
            .build()
            .map_err(|e| NarrativeError::Transport(e.to_string()))?;

        info!(
            "Using {:?} model {} at {}",
            config.provider, config.model, config.base_url
        );
        Ok(Self {
            config,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        match self.config.provider {
            LlmProvider::OpenAi => format!("{}/v1/chat/completions", base),
            LlmProvider::Ollama => format!("{}/api/chat", base),
        }
    }

    fn request_body(&self, system: &str, user: &str) -> Result<serde_json::Value, NarrativeError> {
        let messages = vec![ChatMessage::new("system", system), ChatMessage::new("user", user)];
        let body = match self.config.provider {
            LlmProvider::OpenAi => serde_json::to_value(OpenAiChatRequest {
                model: self.config.model.clone(),
                messages,
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
            }),
            LlmProvider::Ollama => serde_json::to_value(OllamaChatRequest {
                model: self.config.model.clone(),
                messages,
                stream: false,
                options: OllamaOptions {
                    temperature: self.config.temperature,
                    num_predict: self.config.max_tokens,
                },
            }),
        };
        body.map_err(|e| NarrativeError::Parse(e.to_string()))
    }

    fn parse_reply(&self, body: &str) -> Result<String, NarrativeError> {
        let parse_error = |e: serde_json::Error| NarrativeError::Parse(e.to_string());
        match self.config.provider {
            LlmProvider::OpenAi => {
                let response: OpenAiChatResponse = serde_json::from_str(body).map_err(parse_error)?;
                response
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .ok_or_else(|| NarrativeError::Parse("response has no choices".to_string()))
            }
            LlmProvider::Ollama => {
                let response: OllamaChatResponse = serde_json::from_str(body).map_err(parse_error)?;
                Ok(response.message.content)
            }
        }
    }
}

#[async_trait]
impl Completion for ChatClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, NarrativeError> {
        let url = self.endpoint();
        let body = self.request_body(system, user)?;
        debug!("Sending chat request to {} ({} prompt bytes)", url, system.len() + user.len());

        let mut request = self.http_client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                NarrativeError::Timeout(self.config.timeout_seconds.unwrap_or_default())
            } else if e.is_connect() {
                NarrativeError::Connect(self.config.base_url.clone())
            } else {
                NarrativeError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| NarrativeError::Transport(e.to_string()))?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(NarrativeError::Auth(text));
        }
        if !status.is_success() {
            return Err(NarrativeError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        self.parse_reply(&text)
    }
}
