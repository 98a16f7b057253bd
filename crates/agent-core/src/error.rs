//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error (non-success response, in-stream error)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unreachable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool arguments did not match the declared schema
    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Maximum iterations reached in reasoning loop
    #[error("Maximum iterations ({0}) reached")]
    MaxIterations(usize),

    /// Message history violates a conversation invariant
    #[error("Conversation error: {0}")]
    Conversation(String),

    /// Parse error (e.g. malformed provider response)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Shorthand for an [`AgentError::InvalidArguments`]
    pub fn invalid_arguments(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_) | Self::Io(_))
    }

    /// Convert to a user-friendly message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(msg) => format!("The model server returned an error: {msg}"),
            Self::ProviderUnavailable(_) => {
                "The model server is not reachable. Is `ollama serve` running?".into()
            }
            Self::ToolNotFound(name) => format!("The model asked for an unknown tool '{name}'."),
            Self::InvalidArguments { tool, .. } => {
                format!("The model sent invalid arguments to '{tool}'.")
            }
            Self::ToolExecution(msg) => format!("Tool error: {msg}"),
            Self::MaxIterations(max) => {
                format!("The model kept calling tools after {max} turns; giving up.")
            }
            Self::Config(msg) => format!("Invalid configuration: {msg}"),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(AgentError::ProviderUnavailable("refused".into()).is_retryable());
        assert!(!AgentError::ToolNotFound("pow".into()).is_retryable());
        assert!(!AgentError::MaxIterations(3).is_retryable());
    }

    #[test]
    fn test_invalid_arguments_display() {
        let err = AgentError::invalid_arguments("divide", "missing field `b`");
        assert_eq!(
            err.to_string(),
            "Invalid arguments for tool 'divide': missing field `b`"
        );
        assert!(err.user_message().contains("divide"));
    }
}
