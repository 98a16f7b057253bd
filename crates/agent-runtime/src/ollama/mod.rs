//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` for local Ollama inference.
//!
//! Chat turns go straight to `POST /api/chat` so tool schemas, penalties
//! and `think` reach the server; model listing goes through `ollama-rs`.

mod wire;

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::Message,
    provider::{Completion, CompletionStream, GenerationOptions, LlmProvider, ModelInfo},
    tool::ToolSchema,
};
use async_trait::async_trait;
use futures::StreamExt;
use ollama_rs::Ollama;

use crate::ndjson;
use wire::{ChatRequest, ChatResponse, ErrorBody};

const DEFAULT_HOST: &str = "http://127.0.0.1";
const DEFAULT_PORT: u16 = 11434;

/// Ollama provider configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OllamaConfig {
    /// Ollama host URL (scheme and host, no port)
    pub host: String,

    /// Ollama port
    pub port: u16,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            timeout_secs: 120,
        }
    }
}

impl OllamaConfig {
    /// Read `OLLAMA_HOST`, `OLLAMA_PORT` and `OLLAMA_TIMEOUT_SECS`.
    ///
    /// `OLLAMA_HOST` may carry a port (`127.0.0.1:11434`), the way the
    /// ollama CLI accepts it; an explicit `OLLAMA_PORT` wins.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = std::env::var("OLLAMA_HOST")
            .map(|host| Self::from_base_url(&host))
            .unwrap_or_default();

        if let Some(port) = std::env::var("OLLAMA_PORT").ok().and_then(|p| p.parse().ok()) {
            config.port = port;
        }
        if let Some(secs) = std::env::var("OLLAMA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout_secs = secs;
        }

        config
    }

    /// Build from an address such as `http://127.0.0.1:11434` or `localhost`
    #[must_use]
    pub fn from_base_url(url: &str) -> Self {
        let (host, port) = split_host(url);
        Self {
            host,
            port: port.unwrap_or(DEFAULT_PORT),
            ..Default::default()
        }
    }

    /// `scheme://host:port`
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}:{}", self.host.trim_end_matches('/'), self.port)
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url())
    }
}

/// Split `scheme://host:port` into `scheme://host` and the port
fn split_host(raw: &str) -> (String, Option<u16>) {
    let raw = raw.trim().trim_end_matches('/');
    let (scheme, rest) = raw.split_once("://").unwrap_or(("http", raw));

    if let Some((host, port)) = rest.rsplit_once(':') {
        if let Ok(port) = port.parse::<u16>() {
            return (format!("{scheme}://{host}"), Some(port));
        }
    }

    (format!("{scheme}://{rest}"), None)
}

/// Map a reqwest failure onto the agent error taxonomy
fn transport_error(err: reqwest::Error) -> AgentError {
    if err.is_connect() || err.is_timeout() {
        AgentError::ProviderUnavailable(err.to_string())
    } else if err.is_decode() {
        AgentError::Parse(err.to_string())
    } else {
        AgentError::Provider(err.to_string())
    }
}

/// Ollama LLM provider
pub struct OllamaProvider {
    http: reqwest::Client,
    client: Ollama,
    config: OllamaConfig,
}

impl OllamaProvider {
    /// Create a new Ollama provider with custom host/port
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        Self::from_config(OllamaConfig {
            host: host.into(),
            port,
            ..Default::default()
        })
    }

    /// Create from configuration
    pub fn from_config(config: OllamaConfig) -> Result<Self> {
        reqwest::Url::parse(&config.base_url())
            .map_err(|e| AgentError::Config(format!("invalid Ollama address '{}': {e}", config.base_url())))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client: Ollama::new(&config.host, config.port),
            http,
            config,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(OllamaConfig::from_env())
    }

    /// Create with default localhost settings
    pub fn localhost() -> Result<Self> {
        Self::from_config(OllamaConfig::default())
    }

    #[must_use]
    pub const fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// POST a chat request, turning non-success statuses into errors
    async fn send(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response> {
        tracing::debug!(
            url = %self.config.chat_url(),
            model = request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            stream = request.stream,
            "Sending chat request"
        );

        let response = self
            .http
            .post(self.config.chat_url())
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);
        Err(AgentError::Provider(format!("{status}: {message}")))
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn health_check(&self) -> Result<bool> {
        match self.client.list_local_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let request = ChatRequest::new(messages, tools, options, false);
        let response = self.send(&request).await?;

        let body: ChatResponse = response.json().await.map_err(transport_error)?;
        body.into_completion(&options.model)
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<CompletionStream> {
        let request = ChatRequest::new(messages, tools, options, true);
        let response = self.send(&request).await?;

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(transport_error));
        let chunks = ndjson::decode::<_, _, ChatResponse>(Box::pin(bytes))
            .map(|line| line.and_then(ChatResponse::into_chunk));

        Ok(Box::pin(chunks))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let models = self
            .client
            .list_local_models()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

        Ok(models
            .into_iter()
            .map(|m| ModelInfo {
                id: m.name.clone(),
                name: m.name,
                size_bytes: Some(m.size),
            })
            .collect())
    }
}
