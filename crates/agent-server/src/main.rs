//! dine-and-watch HTTP Server
//!
//! Axum server exposing the restaurant and movie recommendation agent.
//! One conversation lives for the whole process; each POST to `/api/chat`
//! runs a single turn against it.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{routing::{get, post}, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::LlmProvider;
use agent_runtime::OllamaProvider;
use recommender::RECOMMENDER_PROMPT;

use crate::config::ServerConfig;
use crate::handlers::{chat_handler, health_check, list_models, reset_handler};
use crate::state::AppState;

/// Routes and middleware over `state`
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/models", get(list_models))

        // Agent API
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/reset", post(reset_handler))

        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment first so RUST_LOG from .env applies
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    let provider = Arc::new(OllamaProvider::new(config.ollama.clone())?);

    match provider.health_check().await {
        Ok(true) => {
            tracing::info!(url = %config.ollama.base_url(), "Connected to Ollama");
            if let Ok(models) = provider.list_models().await {
                for model in models {
                    tracing::info!("  Model: {}", model.id);
                }
            }
        }
        Ok(false) | Err(_) => {
            tracing::warn!(url = %config.ollama.base_url(), "Ollama not available, chat turns will fail");
            tracing::warn!("  Make sure Ollama is running: ollama serve");
        }
    }

    let tools = config
        .recommender
        .build_tools(provider.clone(), &config.agent.generation.model)?;
    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    let state = AppState::new(provider, tools, config.agent.clone(), RECOMMENDER_PROMPT);
    tracing::info!(model = state.model(), stream = config.agent.stream, "Agent ready");

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("dine-and-watch server running on http://{}", config.bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health          - Health check");
    tracing::info!("  GET  /api/models      - List available models");
    tracing::info!("  POST /api/chat        - Run one conversation turn");
    tracing::info!("  POST /api/chat/reset  - Clear the conversation");

    axum::serve(listener, app(state)).await?;

    Ok(())
}
