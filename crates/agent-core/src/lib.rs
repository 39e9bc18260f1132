//! # agent-core
//!
//! Core agent logic: conversation state, a schema-validated tool registry, and
//! the tool-routing loop that drives a provider-agnostic language model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Agent                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │Orchestration│  │    Tools    │  │   LlmProvider       │  │
//! │  │    Loop     │──│   Registry  │──│   (Strategy)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait hides the inference backend; the loop only sees AI
//! messages that either answer or request tool calls.

pub mod provider;
pub mod tool;
pub mod reasoning;
pub mod message;
pub mod error;

pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use provider::LlmProvider;
pub use reasoning::{Agent, AgentBuilder, AgentConfig, HistoryPolicy, TurnOutcome};
pub use tool::{Tool, ToolCall, ToolResult, ToolRegistry, ToolSchema};
