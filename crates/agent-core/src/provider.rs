//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for LLM backends so the reasoning loop works
//! with any of them without code changes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{GenerationOptions, LlmProvider};
//!
//! let provider = OllamaProvider::localhost()?;
//! let completion = provider
//!     .respond(&messages, &tools.schemas(), &GenerationOptions::default())
//!     .await?;
//! ```

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::Result;
use crate::message::Message;
use crate::tool::{ToolCall, ToolSchema};

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g. "qwen3-vl:8b", "llama3.2")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Top-p nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Penalize tokens by how often they already appeared
    #[serde(default)]
    pub frequency_penalty: f32,

    /// Penalize tokens that appeared at all
    #[serde(default)]
    pub presence_penalty: f32,

    /// Stop sequences
    #[serde(default)]
    pub stop_sequences: Vec<String>,

    /// Receive the response incrementally
    #[serde(default = "default_stream")]
    pub stream: bool,

    /// Ask the model for its reasoning trace
    #[serde(default)]
    pub think: bool,
}

pub const DEFAULT_MODEL: &str = "qwen3-vl:8b";

const fn default_temperature() -> f32 {
    0.7
}
const fn default_max_tokens() -> u32 {
    1000
}
const fn default_top_p() -> f32 {
    0.7
}
const fn default_stream() -> bool {
    true
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            stop_sequences: Vec::new(),
            stream: default_stream(),
            think: false,
        }
    }
}

/// Response from an LLM completion
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text
    pub content: String,

    /// Reasoning trace (only when thinking was requested)
    #[serde(default)]
    pub thinking: Option<String>,

    /// Requested tool invocations
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    /// Model that generated this response
    pub model: String,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,

    /// Finish reason
    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    /// Convert into the assistant message appended to the history
    #[must_use]
    pub fn into_message(self) -> Message {
        Message::Assistant {
            content: self.content,
            thinking: self.thinking,
            tool_calls: self.tool_calls,
        }
    }
}

/// Token usage statistics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    #[must_use]
    pub const fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }

    /// Accumulate; counts saturate at `u32::MAX`
    pub fn add(&mut self, other: &Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// Reason for completion finishing
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolUse,
}

/// A chunk from streaming completion
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    /// The text delta
    pub delta: String,

    /// Reasoning delta
    #[serde(default)]
    pub thinking: Option<String>,

    /// Tool calls completed in this chunk
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    /// Whether this is the final chunk
    pub done: bool,

    /// Token usage (typically only on final chunk)
    pub usage: Option<TokenUsage>,

    /// Finish reason (final chunk only)
    pub finish_reason: Option<FinishReason>,
}

/// Stream type for completion streaming
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Fold a completion stream into a single [`Completion`].
///
/// Stops at the first chunk flagged `done`; an error chunk aborts the fold.
pub async fn collect_stream(model: &str, mut stream: CompletionStream) -> Result<Completion> {
    let mut content = String::new();
    let mut thinking = String::new();
    let mut tool_calls = Vec::new();
    let mut usage = None;
    let mut finish_reason = None;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        content.push_str(&chunk.delta);
        if let Some(delta) = chunk.thinking {
            thinking.push_str(&delta);
        }
        tool_calls.extend(chunk.tool_calls);
        if chunk.usage.is_some() {
            usage = chunk.usage;
        }
        if chunk.finish_reason.is_some() {
            finish_reason = chunk.finish_reason;
        }
        if chunk.done {
            break;
        }
    }

    if !tool_calls.is_empty() {
        finish_reason = Some(FinishReason::ToolUse);
    }

    Ok(Completion {
        content,
        thinking: (!thinking.is_empty()).then_some(thinking),
        tool_calls,
        model: model.to_string(),
        usage,
        finish_reason,
    })
}

/// Information about a model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub size_bytes: Option<u64>,
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The agent works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Check if the provider is available and configured correctly
    async fn health_check(&self) -> Result<bool>;

    /// Generate one assistant turn from the history
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<Completion>;

    /// Generate one assistant turn as a stream of chunks
    async fn complete_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<CompletionStream>;

    /// List available models
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// Complete, streaming or not according to `options.stream`
    async fn respond(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        if options.stream {
            let stream = self.complete_stream(messages, tools, options).await?;
            collect_stream(&options.model, stream).await
        } else {
            self.complete(messages, tools, options).await
        }
    }
}
