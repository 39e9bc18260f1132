//! Data Summary Tool
//!
//! Condenses a blob of lookup data into a one-line, emoji-flavoured headline
//! by asking the same language model with a tight token budget.

use std::sync::Arc;
use async_trait::async_trait;

use agent_core::{
    LlmProvider, Message, Tool, ToolSchema, ToolCall, ToolResult,
    provider::GenerationOptions,
    tool::ParameterSchema,
    Result as CoreResult,
};

pub const TOOL_NAME: &str = "summarize_data";

/// Token budget for a summary
pub const SUMMARY_MAX_TOKENS: u32 = 70;

/// Placeholder replaced with the data to summarize
pub const DATA_PLACEHOLDER: &str = "{{data}}";

/// Instruction sent to the model; `{{data}}` is replaced with the tool input
pub const SUMMARIZER_PROMPT: &str = "\
You are a senior business analyst writing for a busy executive.
Summarize the data below in at most 30 words, on a single line.
Be strategic and concrete, use markdown emphasis, and add a couple of fitting emojis.

Data:
{{data}}";

/// Tool that summarizes arbitrary text through the model
pub struct SummarizeDataTool {
    provider: Arc<dyn LlmProvider>,
    options: GenerationOptions,
}

impl SummarizeDataTool {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            options: GenerationOptions {
                model: model.into(),
                max_tokens: SUMMARY_MAX_TOKENS,
                stop_sequences: vec!["\n".into()],
                ..Default::default()
            },
        }
    }

    /// Options every summary request is sent with
    pub const fn options(&self) -> &GenerationOptions {
        &self.options
    }
}

#[async_trait]
impl Tool for SummarizeDataTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: TOOL_NAME.into(),
            description: "Generate a concise executive-level summary (30 words max, one line, markdown with emojis) of the provided data, such as restaurant or movie results.".into(),
            parameters: vec![
                ParameterSchema {
                    name: "data".into(),
                    param_type: "string".into(),
                    description: "Data to be summarized, typically a string containing information about restaurants".into(),
                    required: true,
                    ..Default::default()
                },
            ],
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let data = call.str_arg("data").unwrap_or_default().trim();
        if data.is_empty() {
            return Ok(ToolResult::failure(TOOL_NAME, "Nothing to summarize"));
        }

        let prompt = SUMMARIZER_PROMPT.replace(DATA_PLACEHOLDER, data);
        let completion = self
            .provider
            .complete(&[Message::human(prompt)], &[], &self.options)
            .await?;

        // Providers that ignore stop sequences still yield a single line
        let summary = completion.content.trim().lines().next().unwrap_or_default().trim();
        tracing::debug!(chars = summary.len(), "Summary generated");

        Ok(ToolResult::success(TOOL_NAME, summary))
    }
}
