//! Reasoning Loop
//!
//! Implements the ReAct (Reason + Act) pattern as a small state machine:
//! the model is called, any tool calls it requests are executed and fed
//! back, and the loop ends once the model answers without tool calls.
//!
//! ```text
//!   AwaitingModel ──tool calls──▶ AwaitingTools
//!        ▲   │                         │
//!        │   └──no tool calls──▶ Done  │
//!        └─────────────────────────────┘
//! ```

use std::sync::Arc;

use futures::future::join_all;

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message};
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::{ToolCall, ToolRegistry, ToolResult};

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System prompt seeded at the head of every conversation
    pub system_prompt: String,

    /// Maximum model invocations per run before giving up
    pub max_iterations: usize,

    /// Generation options
    pub generation: GenerationOptions,

    /// Run the tool calls of one turn concurrently
    pub parallel_tools: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: 10,
            generation: GenerationOptions::default(),
            parallel_tools: false,
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. \
Use the provided tools when they help, then answer concisely.";

/// Position of the reasoning loop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// Next step is a model invocation
    AwaitingModel,
    /// The latest assistant message has tool calls to run
    AwaitingTools,
    /// The latest assistant message is a final answer
    Done,
}

impl LoopState {
    /// Where to pick up a conversation
    ///
    /// A tool turn that is only partly answered resumes with its
    /// unanswered calls.
    #[must_use]
    pub fn from_history(conversation: &Conversation) -> Self {
        if !conversation.pending_tool_calls().is_empty() {
            return Self::AwaitingTools;
        }
        match conversation.last() {
            Some(Message::Assistant { .. }) => Self::Done,
            _ => Self::AwaitingModel,
        }
    }
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Start a conversation from one user message and run it to completion.
    ///
    /// Returns the whole history, including the model invocation count.
    pub async fn invoke(&self, input: impl Into<String>) -> Result<Conversation> {
        let mut conversation = Conversation::with_system_prompt(self.config.system_prompt.clone());
        conversation.push(Message::user(input));
        self.run(&mut conversation).await?;
        Ok(conversation)
    }

    /// Run with a simple string input and return only the final answer
    pub async fn ask(&self, question: &str) -> Result<String> {
        let mut conversation = Conversation::with_system_prompt(self.config.system_prompt.clone());
        conversation.push(Message::user(question));
        self.run(&mut conversation).await
    }

    /// Drive an existing conversation until the model stops calling tools.
    ///
    /// Messages are only ever appended. Returns the final answer.
    pub async fn run(&self, conversation: &mut Conversation) -> Result<String> {
        conversation.ensure_system_prompt(self.config.system_prompt.clone());
        conversation.check_tool_correlation()?;

        let schemas = self.tools.schemas();
        let mut state = LoopState::from_history(conversation);
        let mut iterations = 0;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if iterations >= self.config.max_iterations {
                        return Err(AgentError::MaxIterations(self.config.max_iterations));
                    }
                    iterations += 1;

                    tracing::debug!(
                        iteration = iterations,
                        messages = conversation.len(),
                        model = %self.config.generation.model,
                        "Calling model"
                    );
                    let completion = self
                        .provider
                        .respond(conversation.messages(), &schemas, &self.config.generation)
                        .await?;
                    conversation.record_llm_call(completion.usage.as_ref());

                    let message = completion.into_message();
                    let next = if message.has_tool_calls() {
                        LoopState::AwaitingTools
                    } else {
                        LoopState::Done
                    };
                    conversation.push(message);
                    next
                }
                LoopState::AwaitingTools => {
                    let calls = conversation.pending_tool_calls();

                    for message in self.execute_tools(&calls).await? {
                        conversation.push(message);
                    }
                    LoopState::AwaitingModel
                }
                LoopState::Done => {
                    let elapsed = chrono::Utc::now() - conversation.started_at();
                    tracing::info!(
                        llm_calls = conversation.llm_calls(),
                        messages = conversation.len(),
                        total_tokens = conversation.usage().total_tokens,
                        elapsed_ms = elapsed.num_milliseconds(),
                        "Conversation finished"
                    );
                    return Ok(conversation.final_answer().unwrap_or_default().to_string());
                }
            };
        }
    }

    /// Execute one turn's tool calls; results come back in request order
    async fn execute_tools(&self, calls: &[ToolCall]) -> Result<Vec<Message>> {
        if self.config.parallel_tools {
            join_all(calls.iter().map(|call| self.execute_tool(call)))
                .await
                .into_iter()
                .collect()
        } else {
            let mut messages = Vec::with_capacity(calls.len());
            for call in calls {
                messages.push(self.execute_tool(call).await?);
            }
            Ok(messages)
        }
    }

    /// Execute a tool call.
    ///
    /// Execution failures are reported back to the model; unknown tools and
    /// invalid arguments abort the run.
    async fn execute_tool(&self, call: &ToolCall) -> Result<Message> {
        tracing::debug!(tool = %call.name, id = %call.id, arguments = %call.arguments, "Executing tool");

        match self.tools.execute(call).await {
            Ok(result) => Ok(Message::tool_result(call, result)),
            Err(AgentError::ToolExecution(msg)) => {
                tracing::warn!(tool = %call.name, error = %msg, "Tool failed");
                Ok(Message::tool_result(call, ToolResult::failure(&call.name, msg)))
            }
            Err(e) => Err(e),
        }
    }

    /// Get the tool registry
    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: Arc::new(ToolRegistry::new()),
            config: AgentConfig::default(),
        }
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: impl Into<Arc<ToolRegistry>>) -> Self {
        self.tools = tools.into();
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn generation(mut self, options: GenerationOptions) -> Self {
        self.config.generation = options;
        self
    }

    #[must_use]
    pub const fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    #[must_use]
    pub const fn parallel_tools(mut self, parallel: bool) -> Self {
        self.config.parallel_tools = parallel;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        if self.config.max_iterations == 0 {
            return Err(AgentError::Config("max_iterations must be at least 1".into()));
        }

        Ok(Agent::new(provider, self.tools, self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        Completion, CompletionStream, FinishReason, ModelInfo, StreamChunk,
        TokenUsage,
    };
    use crate::tool::{ParameterSchema, Tool, ToolSchema};
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Replays canned completions and records every history it was sent
    struct ScriptedProvider {
        replies: Mutex<VecDeque<Completion>>,
        seen: Mutex<Vec<Vec<Message>>>,
        streamed: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Completion>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
                streamed: AtomicUsize::new(0),
            })
        }

        fn next_reply(&self, messages: &[Message]) -> Result<Completion> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgentError::Provider("script exhausted".into()))
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            messages: &[Message],
            _tools: &[ToolSchema],
            _options: &GenerationOptions,
        ) -> Result<Completion> {
            self.next_reply(messages)
        }

        async fn complete_stream(
            &self,
            messages: &[Message],
            _tools: &[ToolSchema],
            _options: &GenerationOptions,
        ) -> Result<CompletionStream> {
            self.streamed.fetch_add(1, Ordering::SeqCst);
            let reply = self.next_reply(messages)?;
            let chunk = StreamChunk {
                delta: reply.content,
                thinking: reply.thinking,
                tool_calls: reply.tool_calls,
                done: true,
                usage: reply.usage,
                finish_reason: reply.finish_reason,
            };
            Ok(Box::pin(futures::stream::iter(vec![Ok(chunk)])))
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }
    }

    fn answer(text: &str) -> Completion {
        Completion {
            content: text.into(),
            thinking: None,
            tool_calls: Vec::new(),
            model: "scripted".into(),
            usage: Some(TokenUsage::new(10, 2)),
            finish_reason: Some(FinishReason::Stop),
        }
    }

    fn calling(calls: Vec<ToolCall>) -> Completion {
        Completion {
            tool_calls: calls,
            finish_reason: Some(FinishReason::ToolUse),
            ..answer("")
        }
    }

    #[derive(Deserialize)]
    struct Operands {
        a: f64,
        b: f64,
    }

    fn operands_schema(name: &str) -> ToolSchema {
        ToolSchema {
            name: name.into(),
            description: format!("{name} two numbers"),
            parameters: vec![
                ParameterSchema::number("a", "First number"),
                ParameterSchema::number("b", "Second number"),
            ],
        }
    }

    struct MultiplyTool;

    #[async_trait]
    impl Tool for MultiplyTool {
        fn schema(&self) -> ToolSchema {
            operands_schema("multiply")
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
            let args: Operands = call.parse_arguments()?;
            Ok(ToolResult::success("multiply", (args.a * args.b).to_string()))
        }
    }

    /// Sleeps `a` milliseconds, then echoes `b`
    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn schema(&self) -> ToolSchema {
            operands_schema("slow")
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
            let args: Operands = call.parse_arguments()?;
            tokio::time::sleep(Duration::from_millis(args.a as u64)).await;
            Ok(ToolResult::success("slow", args.b.to_string()))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn schema(&self) -> ToolSchema {
            operands_schema("fail")
        }

        async fn execute(&self, _call: &ToolCall) -> Result<ToolResult> {
            Err(AgentError::ToolExecution("always fails".into()))
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(
            ToolRegistry::new()
                .with(MultiplyTool)
                .with(SlowTool)
                .with(FailingTool),
        )
    }

    fn agent(provider: Arc<ScriptedProvider>) -> Agent {
        AgentBuilder::new()
            .provider(provider)
            .tools(registry())
            .system_prompt("You do arithmetic.")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_no_tool_calls_terminates_after_one_call() {
        let provider = ScriptedProvider::new(vec![answer("Hello!")]);
        let conversation = agent(provider.clone()).invoke("Hi").await.unwrap();

        assert_eq!(conversation.llm_calls(), 1);
        assert_eq!(provider.calls(), 1);
        assert_eq!(
            conversation.messages(),
            &[
                Message::system("You do arithmetic."),
                Message::user("Hi"),
                Message::assistant("Hello!"),
            ]
        );
        assert_eq!(conversation.usage().total_tokens, 12);
    }

    #[tokio::test]
    async fn test_tool_result_is_appended_before_next_call() {
        let call = ToolCall::new("multiply", json!({"a": 10, "b": 4})).with_id("c1");
        let provider = ScriptedProvider::new(vec![calling(vec![call]), answer("40")]);

        let conversation = agent(provider.clone())
            .invoke("Multiply 10 and 4.")
            .await
            .unwrap();

        assert_eq!(conversation.llm_calls(), 2);
        let seen = provider.seen.lock().unwrap();
        assert_eq!(
            seen[1].last(),
            Some(&Message::tool("c1", "multiply", "40"))
        );
        assert_eq!(conversation.final_answer(), Some("40"));
        assert!(!conversation.last().unwrap().has_tool_calls());
    }

    #[tokio::test]
    async fn test_tool_messages_keep_request_order() {
        for parallel in [false, true] {
            let calls = vec![
                ToolCall::new("slow", json!({"a": 40, "b": 1})).with_id("first"),
                ToolCall::new("slow", json!({"a": 0, "b": 2})).with_id("second"),
            ];
            let provider = ScriptedProvider::new(vec![calling(calls), answer("done")]);
            let agent = AgentBuilder::new()
                .provider(provider)
                .tools(registry())
                .parallel_tools(parallel)
                .build()
                .unwrap();

            let conversation = agent.invoke("go").await.unwrap();
            let tool_messages: Vec<&Message> = conversation
                .messages()
                .iter()
                .filter(|m| matches!(m, Message::Tool { .. }))
                .collect();

            assert_eq!(
                tool_messages,
                vec![
                    &Message::tool("first", "slow", "1"),
                    &Message::tool("second", "slow", "2"),
                ],
                "parallel = {parallel}"
            );
        }
    }

    #[tokio::test]
    async fn test_max_iterations() {
        let replies = (0..5)
            .map(|i| {
                calling(vec![
                    ToolCall::new("multiply", json!({"a": i, "b": 1})).with_id(format!("c{i}")),
                ])
            })
            .collect();
        let provider = ScriptedProvider::new(replies);
        let agent = AgentBuilder::new()
            .provider(provider.clone())
            .tools(registry())
            .max_iterations(3)
            .build()
            .unwrap();

        let mut conversation = Conversation::new();
        conversation.push(Message::user("loop forever"));
        let err = agent.run(&mut conversation).await.unwrap_err();

        assert!(matches!(err, AgentError::MaxIterations(3)));
        assert_eq!(conversation.llm_calls(), 3);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_unknown_tool_aborts() {
        let call = ToolCall::new("pow", json!({"a": 2, "b": 8}));
        let provider = ScriptedProvider::new(vec![calling(vec![call]), answer("unused")]);

        let err = agent(provider.clone()).invoke("2^8").await.unwrap_err();
        assert!(matches!(err, AgentError::ToolNotFound(name) if name == "pow"));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalid_arguments_abort() {
        let call = ToolCall::new("multiply", json!({"a": "ten", "b": 4}));
        let provider = ScriptedProvider::new(vec![calling(vec![call])]);

        let err = agent(provider).invoke("ten times four").await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidArguments { tool, .. } if tool == "multiply"));
    }

    #[tokio::test]
    async fn test_tool_failure_is_fed_back() {
        let call = ToolCall::new("fail", json!({"a": 1, "b": 1})).with_id("f1");
        let provider = ScriptedProvider::new(vec![calling(vec![call]), answer("sorry")]);

        let conversation = agent(provider).invoke("try").await.unwrap();
        assert!(
            conversation
                .messages()
                .contains(&Message::tool("f1", "fail", "Error: always fails"))
        );
        assert_eq!(conversation.final_answer(), Some("sorry"));
    }

    #[tokio::test]
    async fn test_resume_runs_pending_tools_first() {
        let call = ToolCall::new("multiply", json!({"a": 3, "b": 3})).with_id("p1");
        let mut conversation = Conversation::new();
        conversation.push(Message::user("3*3"));
        conversation.push(Message::assistant_with_tool_calls("", vec![call]));

        let provider = ScriptedProvider::new(vec![answer("9")]);
        let answer = agent(provider.clone()).run(&mut conversation).await.unwrap();

        assert_eq!(answer, "9");
        assert_eq!(provider.calls(), 1);
        // system prompt prepended, tool answered, final answer appended
        assert_eq!(conversation.len(), 5);
        assert_eq!(
            conversation.messages()[3],
            Message::tool("p1", "multiply", "9")
        );
    }

    #[tokio::test]
    async fn test_resume_runs_only_unanswered_calls() {
        let first = ToolCall::new("multiply", json!({"a": 2, "b": 3})).with_id("c1");
        let second = ToolCall::new("multiply", json!({"a": 4, "b": 5})).with_id("c2");
        let mut conversation = Conversation::new();
        conversation.push(Message::user("2*3 and 4*5"));
        conversation.push(Message::assistant_with_tool_calls("", vec![first, second]));
        conversation.push(Message::tool("c1", "multiply", "6"));
        assert_eq!(LoopState::from_history(&conversation), LoopState::AwaitingTools);

        let provider = ScriptedProvider::new(vec![answer("6 and 20")]);
        agent(provider.clone()).run(&mut conversation).await.unwrap();

        assert_eq!(provider.calls(), 1);
        // The model sees both answers, each exactly once
        let seen = provider.seen.lock().unwrap()[0].clone();
        let tool_messages: Vec<&Message> = seen
            .iter()
            .filter(|m| matches!(m, Message::Tool { .. }))
            .collect();
        assert_eq!(
            tool_messages,
            vec![
                &Message::tool("c1", "multiply", "6"),
                &Message::tool("c2", "multiply", "20"),
            ]
        );
    }

    #[tokio::test]
    async fn test_finished_conversation_is_not_rerun() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("hi"));
        conversation.push(Message::assistant("hello"));

        let provider = ScriptedProvider::new(Vec::new());
        let answer = agent(provider.clone()).run(&mut conversation).await.unwrap();

        assert_eq!(answer, "hello");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_orphan_tool_message_is_rejected() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("hi"));
        conversation.push(Message::tool("nope", "multiply", "1"));

        let provider = ScriptedProvider::new(vec![answer("unused")]);
        let err = agent(provider.clone()).run(&mut conversation).await.unwrap_err();

        assert!(matches!(err, AgentError::Conversation(_)));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_stream_option_selects_streaming_path() {
        for stream in [true, false] {
            let provider = ScriptedProvider::new(vec![answer("ok")]);
            let options = GenerationOptions {
                stream,
                ..GenerationOptions::default()
            };
            let agent = AgentBuilder::new()
                .provider(provider.clone())
                .generation(options)
                .build()
                .unwrap();

            assert_eq!(agent.ask("hi").await.unwrap(), "ok");
            assert_eq!(provider.streamed.load(Ordering::SeqCst), usize::from(stream));
        }
    }

    #[test]
    fn test_builder_requires_provider() {
        assert!(matches!(
            AgentBuilder::new().build(),
            Err(AgentError::Config(_))
        ));
    }

    #[test]
    fn test_loop_state_from_history() {
        let mut conversation = Conversation::new();
        assert_eq!(LoopState::from_history(&conversation), LoopState::AwaitingModel);

        conversation.push(Message::user("hi"));
        assert_eq!(LoopState::from_history(&conversation), LoopState::AwaitingModel);

        conversation.push(Message::assistant_with_tool_calls(
            "",
            vec![ToolCall::new("multiply", json!({"a": 1, "b": 1}))],
        ));
        assert_eq!(LoopState::from_history(&conversation), LoopState::AwaitingTools);

        conversation.push(Message::assistant("done"));
        assert_eq!(LoopState::from_history(&conversation), LoopState::Done);
    }
}
