//! HTTP Handlers

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use agent_core::{AgentError, ToolResult, provider::ModelInfo};
use recommender::tools;

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub ollama_connected: bool,
    pub model: String,
    pub tools: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// What a card renders as
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    Restaurants,
    Movies,
    Summary,
    Other,
}

/// One tool result from the last round, for the renderer
#[derive(Debug, Serialize)]
pub struct Card {
    pub tool: String,
    pub kind: CardKind,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ToolResult> for Card {
    fn from(result: ToolResult) -> Self {
        let kind = match result.name.as_str() {
            tools::RESTAURANT_SEARCH => CardKind::Restaurants,
            tools::MOVIE_RECOMMENDATIONS => CardKind::Movies,
            tools::SUMMARIZE_DATA => CardKind::Summary,
            _ => CardKind::Other,
        };
        let (data, error) = if result.success {
            // Text-only results render their output
            (result.data.or(Some(Value::String(result.output))), None)
        } else {
            (None, Some(result.output))
        };
        Self {
            tool: result.name,
            kind,
            success: result.success,
            data,
            error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub cards: Vec<Card>,
    pub model: String,
    pub tool_rounds: usize,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub messages: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn agent_error(e: &AgentError) -> ApiError {
    let (status, code) = match e {
        AgentError::ModelUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "MODEL_UNAVAILABLE"),
        AgentError::Provider(_) => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "AGENT_ERROR"),
    };
    (
        status,
        Json(ErrorResponse {
            error: e.user_message(),
            code: code.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ollama_connected = state.provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        ollama_connected,
        model: state.model().to_string(),
        tools: state.agent.tools().names().into_iter().map(String::from).collect(),
    })
}

/// Models the provider can serve
pub async fn list_models(State(state): State<AppState>) -> Result<Json<Vec<ModelInfo>>, ApiError> {
    state.provider.list_models().await.map(Json).map_err(|e| {
        tracing::warn!(error = %e, "Model listing failed");
        agent_error(&e)
    })
}

/// Run one conversation turn
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = payload.message.trim();
    if message.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Message must not be empty".into(),
                code: "EMPTY_MESSAGE".into(),
            }),
        ));
    }

    // Held until the turn ends so turns never interleave
    let mut conversation = state.conversation.lock().await;

    let outcome = state.agent.chat(&mut conversation, message).await.map_err(|e| {
        tracing::error!(error = %e, "Agent turn failed");
        agent_error(&e)
    })?;

    tracing::info!(
        tool_rounds = outcome.tool_rounds,
        history = conversation.len(),
        "Turn complete"
    );

    Ok(Json(ChatResponse {
        answer: outcome.answer,
        cards: outcome.tool_results.into_iter().map(Card::from).collect(),
        model: state.model().to_string(),
        tool_rounds: outcome.tool_rounds,
    }))
}

/// Drop everything but the system instruction
pub async fn reset_handler(State(state): State<AppState>) -> Json<ResetResponse> {
    let mut conversation = state.conversation.lock().await;
    conversation.reset();
    tracing::info!("Conversation reset");

    Json(ResetResponse {
        messages: conversation.len(),
    })
}
