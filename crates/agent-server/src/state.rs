//! Application State

use std::sync::Arc;

use tokio::sync::Mutex;

use agent_core::{Agent, AgentConfig, Conversation, LlmProvider, ToolRegistry};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// LLM provider (Ollama, etc.)
    pub provider: Arc<dyn LlmProvider>,

    /// Orchestration loop over the registered tools
    pub agent: Arc<Agent>,

    /// The single process-wide conversation; held for the whole turn
    pub conversation: Arc<Mutex<Conversation>>,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: ToolRegistry,
        config: AgentConfig,
        system_prompt: &str,
    ) -> Self {
        let agent = Agent::new(Arc::clone(&provider), Arc::new(tools), config);
        Self {
            provider,
            agent: Arc::new(agent),
            conversation: Arc::new(Mutex::new(Conversation::with_system_prompt(system_prompt))),
        }
    }

    pub fn model(&self) -> &str {
        &self.agent.config().generation.model
    }
}
