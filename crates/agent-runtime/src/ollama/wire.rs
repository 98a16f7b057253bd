//! `/api/chat` request and response bodies

use agent_core::{
    error::{AgentError, Result},
    message::Message,
    provider::{Completion, FinishReason, GenerationOptions, StreamChunk, TokenUsage},
    tool::{ToolCall, ToolSchema},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<WireTool>,
    pub stream: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub think: bool,
    pub options: WireOptions,
}

impl<'a> ChatRequest<'a> {
    pub fn new(
        messages: &[Message],
        tools: &[ToolSchema],
        options: &'a GenerationOptions,
        stream: bool,
    ) -> Self {
        Self {
            model: &options.model,
            messages: messages.iter().map(WireMessage::from).collect(),
            tools: tools.iter().map(WireTool::from).collect(),
            stream,
            think: options.think,
            options: WireOptions {
                temperature: options.temperature,
                top_p: options.top_p,
                num_predict: options.max_tokens,
                frequency_penalty: options.frequency_penalty,
                presence_penalty: options.presence_penalty,
                stop: options.stop_sequences.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct WireOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub num_predict: u32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireTool {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: WireFunctionDef,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireFunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<&ToolSchema> for WireTool {
    fn from(schema: &ToolSchema) -> Self {
        Self {
            kind: "function",
            function: WireFunctionDef {
                name: schema.name.clone(),
                description: schema.description.clone(),
                parameters: schema.parameters_json(),
            },
        }
    }
}

/// Chat message as Ollama sends and receives it
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct WireMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<WireToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        let role = message.role().as_str().to_string();
        match message {
            Message::System { content } | Message::User { content } => Self {
                role,
                content: content.clone(),
                ..Self::default()
            },
            Message::Assistant {
                content,
                thinking,
                tool_calls,
            } => Self {
                role,
                content: content.clone(),
                thinking: thinking.clone(),
                tool_calls: tool_calls.iter().map(WireToolCall::from).collect(),
                ..Self::default()
            },
            Message::Tool {
                content,
                tool_call_id,
                name,
            } => Self {
                role,
                content: content.clone(),
                tool_name: Some(name.clone()),
                tool_call_id: Some(tool_call_id.clone()),
                ..Self::default()
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WireToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WireFunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl From<&ToolCall> for WireToolCall {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: Some(call.id.clone()),
            function: WireFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        }
    }
}

impl From<WireToolCall> for ToolCall {
    fn from(wire: WireToolCall) -> Self {
        // Some models emit the arguments as a JSON-encoded string
        let arguments = match wire.function.arguments {
            Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other,
        };

        let call = Self::new(wire.function.name, arguments);
        match wire.id {
            Some(id) if !id.is_empty() => call.with_id(id),
            _ => call,
        }
    }
}

/// One `/api/chat` response object; a streamed body is a sequence of these
#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub message: Option<WireMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub prompt_eval_count: Option<u32>,
    #[serde(default)]
    pub eval_count: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ChatResponse {
    fn usage(&self) -> Option<TokenUsage> {
        if self.prompt_eval_count.is_none() && self.eval_count.is_none() {
            return None;
        }
        Some(TokenUsage::new(
            self.prompt_eval_count.unwrap_or(0),
            self.eval_count.unwrap_or(0),
        ))
    }

    fn finish_reason(&self) -> Option<FinishReason> {
        match self.done_reason.as_deref()? {
            "length" => Some(FinishReason::Length),
            _ => Some(FinishReason::Stop),
        }
    }

    fn check_error(&self) -> Result<()> {
        match &self.error {
            Some(error) => Err(AgentError::Provider(error.clone())),
            None => Ok(()),
        }
    }

    pub fn into_chunk(self) -> Result<StreamChunk> {
        self.check_error()?;
        let usage = self.usage();
        let finish_reason = self.finish_reason();
        let message = self.message.unwrap_or_default();

        Ok(StreamChunk {
            delta: message.content,
            thinking: message.thinking.filter(|t| !t.is_empty()),
            tool_calls: message.tool_calls.into_iter().map(ToolCall::from).collect(),
            done: self.done,
            usage,
            finish_reason,
        })
    }

    pub fn into_completion(self, requested_model: &str) -> Result<Completion> {
        self.check_error()?;
        let usage = self.usage();
        let finish_reason = self.finish_reason();
        let model = if self.model.is_empty() {
            requested_model.to_string()
        } else {
            self.model
        };
        let message = self.message.unwrap_or_default();
        let tool_calls: Vec<ToolCall> = message.tool_calls.into_iter().map(ToolCall::from).collect();
        let finish_reason = if tool_calls.is_empty() {
            finish_reason
        } else {
            Some(FinishReason::ToolUse)
        };

        Ok(Completion {
            content: message.content,
            thinking: message.thinking.filter(|t| !t.is_empty()),
            tool_calls,
            model,
            usage,
            finish_reason,
        })
    }
}

/// Body of a non-success response
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}
