//! # agent-runtime
//!
//! Language model providers for the agent loop.
//!
//! ## Providers
//!
//! - **Ollama** (default): local inference through the Ollama chat API, with
//!   native tool calling and NDJSON streaming
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::{OllamaConfig, OllamaProvider};
//!
//! let provider = OllamaProvider::new(OllamaConfig::new("http://localhost", 11434))?;
//! let agent = AgentBuilder::new()
//!     .provider(Arc::new(provider))
//!     .build()?;
//! ```

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentError, Conversation, LlmProvider, Message, Result, Role, Tool, ToolRegistry,
};
