//! Movie Recommendation Tool
//!
//! Resolves a movie title and lists related movies.

use std::sync::Arc;
use async_trait::async_trait;

use agent_core::{
    Tool, ToolSchema, ToolCall, ToolResult,
    tool::ParameterSchema,
    Result as CoreResult,
};

use crate::tmdb::TmdbClient;

pub const TOOL_NAME: &str = "get_movie_recommendations";

/// Tool for movie recommendations
pub struct MovieRecommendationTool {
    client: Arc<TmdbClient>,
}

impl MovieRecommendationTool {
    pub const fn new(client: Arc<TmdbClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for MovieRecommendationTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: TOOL_NAME.into(),
            description: "Search for a movie by title and return movies recommended for people who liked it, with rating, original language and poster image. Only the first title match is used.".into(),
            parameters: vec![
                ParameterSchema {
                    name: "movie_title".into(),
                    param_type: "string".into(),
                    description: "The title of the movie to search and provide recommendations for, e.g. 'Inception'".into(),
                    required: true,
                    ..Default::default()
                },
            ],
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let title = call.str_arg("movie_title").unwrap_or_default();
        let recommendations = self.client.recommend(title).await;

        tracing::debug!(
            found = recommendations.found_title.is_some(),
            count = recommendations.recommendations.len(),
            "Movie lookup complete"
        );
        Ok(ToolResult::json(TOOL_NAME, serde_json::to_value(&recommendations)?))
    }
}
