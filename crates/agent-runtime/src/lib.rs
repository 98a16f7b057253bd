//! # agent-runtime
//!
//! Runtime providers for the ollama-agent system.
//!
//! ## Providers
//!
//! - **Ollama** (default): local inference through `/api/chat`, with native
//!   tool calling and newline-delimited JSON streaming
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::OllamaProvider;
//!
//! let provider = OllamaProvider::from_env()?;
//! let agent = AgentBuilder::new()
//!     .provider(Arc::new(provider))
//!     .tools(registry)
//!     .build()?;
//! ```

#[cfg(feature = "ollama")]
mod ndjson;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentBuilder, AgentError, Conversation, GenerationOptions, LlmProvider, Message,
    Result, Role, Tool, ToolRegistry,
};
