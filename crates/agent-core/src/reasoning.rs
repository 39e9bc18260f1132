//! Orchestration Loop
//!
//! A small state machine that alternates between the model and the tool
//! registry until the model produces a plain answer:
//!
//! ```text
//!   AwaitingModel ──(no tool calls)──▶ Terminated
//!        ▲   │
//!        │   └──(tool calls)──▶ DispatchingTools
//!        └──────────────────────────────┘
//! ```
//!
//! After every tool round the conversation is cut back to the system
//! instruction followed by that round's tool results, so the model (and the
//! renderer) always find the latest tool output in the last message slots.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message};
use crate::provider::{Completion, GenerationOptions, LlmProvider, collect_stream};
use crate::tool::{ToolCall, ToolRegistry, ToolResult};

/// What happens to the conversation after a tool round
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HistoryPolicy {
    /// Keep only the system instruction plus the round's tool results
    #[default]
    TruncateAfterTools,
    /// Keep the full history
    Retain,
}

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Maximum model calls per turn before giving up
    pub max_iterations: usize,

    /// Generation options
    pub generation: GenerationOptions,

    /// Consume the model through its streaming interface
    pub stream: bool,

    /// Upper bound on a single model call
    pub model_timeout: Option<Duration>,

    pub history: HistoryPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            generation: GenerationOptions::default(),
            stream: false,
            model_timeout: Some(Duration::from_secs(120)),
            history: HistoryPolicy::default(),
        }
    }
}

/// Loop state for one turn
#[derive(Debug)]
enum TurnState {
    AwaitingModel,
    DispatchingTools(Vec<ToolCall>),
    Terminated(String),
}

/// Result of a completed turn
#[derive(Clone, Debug)]
pub struct TurnOutcome {
    /// Text of the final AI message
    pub answer: String,

    /// Results of the most recent tool round, in request order
    pub tool_results: Vec<ToolResult>,

    /// Number of tool rounds dispatched
    pub tool_rounds: usize,
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

    /// Create with default configuration
    pub fn with_defaults(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self::new(provider, tools, AgentConfig::default())
    }

    /// Append a human message and run the turn to completion
    pub async fn chat(&self, conversation: &mut Conversation, input: &str) -> Result<TurnOutcome> {
        conversation.push(Message::human(input));
        self.run(conversation).await
    }

    /// Run the loop on the conversation until the model answers without tools.
    ///
    /// On error the conversation keeps whatever was appended before the failure.
    pub async fn run(&self, conversation: &mut Conversation) -> Result<TurnOutcome> {
        let mut state = TurnState::AwaitingModel;
        let mut iterations = 0;
        let mut tool_rounds = 0;
        let mut last_results: Vec<ToolResult> = Vec::new();

        loop {
            state = match state {
                TurnState::AwaitingModel => {
                    iterations += 1;
                    if iterations > self.config.max_iterations {
                        return Err(AgentError::MaxIterations(self.config.max_iterations));
                    }

                    let completion = self.call_model(conversation).await?;
                    let message = completion.into_message();
                    let next = if message.tool_calls().is_empty() {
                        TurnState::Terminated(message.content().to_string())
                    } else {
                        TurnState::DispatchingTools(message.tool_calls().to_vec())
                    };
                    conversation.push(message);
                    next
                }
                TurnState::DispatchingTools(calls) => {
                    tool_rounds += 1;
                    tracing::debug!(round = tool_rounds, calls = calls.len(), "Dispatching tools");

                    let results = self.dispatch(&calls).await;
                    conversation.extend(results.iter().cloned().map(Message::tool));

                    if self.config.history == HistoryPolicy::TruncateAfterTools {
                        conversation.reset();
                        conversation.extend(results.iter().cloned().map(Message::tool));
                    }

                    last_results = results;
                    TurnState::AwaitingModel
                }
                TurnState::Terminated(answer) => {
                    return Ok(TurnOutcome {
                        answer,
                        tool_results: last_results,
                        tool_rounds,
                    });
                }
            };
        }
    }

    /// Ask the model for the next AI message
    async fn call_model(&self, conversation: &Conversation) -> Result<Completion> {
        let schemas = self.tools.schemas();
        let generation = &self.config.generation;

        let request = async {
            if self.config.stream {
                let stream = self
                    .provider
                    .complete_stream(conversation.messages(), &schemas, generation)
                    .await?;
                collect_stream(stream, &generation.model).await
            } else {
                self.provider
                    .complete(conversation.messages(), &schemas, generation)
                    .await
            }
        };

        match self.config.model_timeout {
            Some(limit) => tokio::time::timeout(limit, request).await.map_err(|_| {
                AgentError::ModelUnavailable(format!("model call exceeded {}s", limit.as_secs()))
            })?,
            None => request.await,
        }
    }

    /// Run every call of a round; failures become error results, never abort siblings
    async fn dispatch(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        join_all(calls.iter().map(|call| self.execute_tool(call))).await
    }

    /// Execute a tool call
    async fn execute_tool(&self, call: &ToolCall) -> ToolResult {
        tracing::debug!(tool = %call.name, id = %call.id, "Executing tool");

        match self.tools.execute(call).await {
            Ok(result) => result.with_id(call.id.clone()),
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool call failed");
                ToolResult::failure(call.name.clone(), format!("Error: {e}")).with_id(call.id.clone())
            }
        }
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tool<T: crate::tool::Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub const fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    pub const fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub const fn stream(mut self, stream: bool) -> Self {
        self.config.stream = stream;
        self
    }

    pub const fn history(mut self, history: HistoryPolicy) -> Self {
        self.config.history = history;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self.provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        Ok(Agent::new(provider, Arc::new(self.tools), self.config))
    }
}
