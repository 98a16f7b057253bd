//! Conversation Messages
//!
//! Standard message format used across the agent system. A message is a
//! tagged variant over its role; only assistant messages carry tool calls.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::provider::TokenUsage;
use crate::tool::{ToolCall, ToolResult};

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool result
    Tool,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,

        /// Reasoning trace, when the model was asked to think
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thinking: Option<String>,

        /// Requested tool invocations; empty for a final answer
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        content: String,

        /// ID of the [`ToolCall`] this message answers
        tool_call_id: String,

        /// Name of the tool that produced it
        name: String,
    },
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Create a plain assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            thinking: None,
            tool_calls: Vec::new(),
        }
    }

    /// Create an assistant message requesting tool calls
    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            content: content.into(),
            thinking: None,
            tool_calls,
        }
    }

    /// Create a tool result message
    pub fn tool(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::Tool {
            content: content.into(),
            tool_call_id: tool_call_id.into(),
            name: name.into(),
        }
    }

    /// Wrap a tool result as the answer to `call`
    #[must_use]
    pub fn tool_result(call: &ToolCall, result: ToolResult) -> Self {
        let content = if result.success {
            result.output
        } else {
            format!("Error: {}", result.output)
        };
        Self::tool(call.id.clone(), call.name.clone(), content)
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::User { .. } => Role::User,
            Self::Assistant { .. } => Role::Assistant,
            Self::Tool { .. } => Role::Tool,
        }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::System { content }
            | Self::User { content }
            | Self::Assistant { content, .. }
            | Self::Tool { content, .. } => content,
        }
    }

    /// Tool calls requested by this message (always empty unless assistant)
    #[must_use]
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }
}

impl std::fmt::Display for Message {
    /// `[role]: text`, with tool calls rendered as `name(args)`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.role(), self.content())?;

        let calls = self.tool_calls();
        if !calls.is_empty() {
            if !self.content().is_empty() {
                f.write_str(" ")?;
            }
            let rendered: Vec<String> = calls
                .iter()
                .map(|c| format!("{}({})", c.name, c.arguments))
                .collect();
            f.write_str(&rendered.join(", "))?;
        }
        Ok(())
    }
}

/// Conversation state: ordered history plus run bookkeeping
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,

    /// Model invocations so far
    #[serde(default)]
    llm_calls: u32,

    /// Token usage summed over all invocations
    #[serde(default)]
    usage: TokenUsage,

    #[serde(default = "Utc::now")]
    started_at: DateTime<Utc>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            llm_calls: 0,
            usage: TokenUsage::default(),
            started_at: Utc::now(),
        }
    }
}

impl Conversation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        let mut conv = Self::new();
        conv.push(Message::system(prompt));
        conv
    }

    /// Add a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Prepend a system prompt unless one already leads the history
    pub fn ensure_system_prompt(&mut self, prompt: impl Into<String>) {
        if self.messages.first().map(Message::role) != Some(Role::System) {
            self.messages.insert(0, Message::system(prompt));
        }
    }

    /// Get all messages
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Get the last message
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Count one model invocation
    pub fn record_llm_call(&mut self, usage: Option<&TokenUsage>) {
        self.llm_calls += 1;
        if let Some(usage) = usage {
            self.usage.add(usage);
        }
    }

    #[must_use]
    pub const fn llm_calls(&self) -> u32 {
        self.llm_calls
    }

    #[must_use]
    pub const fn usage(&self) -> &TokenUsage {
        &self.usage
    }

    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Content of the last assistant message, if any
    #[must_use]
    pub fn final_answer(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role() == Role::Assistant)
            .map(Message::content)
    }

    /// Check that every tool message answers a call from the assistant
    /// message immediately preceding its run of tool messages, at most once.
    pub fn check_tool_correlation(&self) -> Result<()> {
        let mut open: Option<&[ToolCall]> = None;
        let mut answered: HashSet<&str> = HashSet::new();

        for (pos, message) in self.messages.iter().enumerate() {
            match message {
                Message::Assistant { tool_calls, .. } => {
                    open = Some(tool_calls);
                    answered.clear();
                }
                Message::Tool { tool_call_id, .. } => {
                    let known = open
                        .is_some_and(|calls| calls.iter().any(|c| &c.id == tool_call_id));
                    if !known {
                        return Err(AgentError::Conversation(format!(
                            "tool message #{pos} answers unknown call '{tool_call_id}'"
                        )));
                    }
                    if !answered.insert(tool_call_id.as_str()) {
                        return Err(AgentError::Conversation(format!(
                            "tool message #{pos} answers call '{tool_call_id}' a second time"
                        )));
                    }
                }
                _ => open = None,
            }
        }

        Ok(())
    }

    /// Calls of the latest assistant message that no trailing tool message
    /// answers yet, in request order
    #[must_use]
    pub fn pending_tool_calls(&self) -> Vec<ToolCall> {
        let trailing = self
            .messages
            .iter()
            .rev()
            .take_while(|m| matches!(m, Message::Tool { .. }))
            .count();
        let Some(turn) = self
            .messages
            .len()
            .checked_sub(trailing + 1)
            .and_then(|i| self.messages.get(i))
        else {
            return Vec::new();
        };

        let answered: HashSet<&str> = self.messages[self.messages.len() - trailing..]
            .iter()
            .filter_map(|m| match m {
                Message::Tool { tool_call_id, .. } => Some(tool_call_id.as_str()),
                _ => None,
            })
            .collect();

        turn.tool_calls()
            .iter()
            .filter(|c| !answered.contains(c.id.as_str()))
            .cloned()
            .collect()
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
