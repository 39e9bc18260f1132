//! Restaurant Search Tool
//!
//! Finds restaurants by cuisine, location and price tier.

use std::sync::Arc;
use async_trait::async_trait;
use serde_json::json;

use agent_core::{
    AgentError, Tool, ToolSchema, ToolCall, ToolResult,
    tool::ParameterSchema,
    Result as CoreResult,
};

use crate::model::{PriceTier, RestaurantQuery};
use crate::yelp::YelpClient;

pub const TOOL_NAME: &str = "restaurant_search";

/// Tool for searching restaurants
pub struct RestaurantSearchTool {
    client: Arc<YelpClient>,
}

impl RestaurantSearchTool {
    pub const fn new(client: Arc<YelpClient>) -> Self {
        Self { client }
    }

    fn query(call: &ToolCall) -> RestaurantQuery {
        let limit = call
            .i64_arg("limit")
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(RestaurantQuery::DEFAULT_LIMIT);

        RestaurantQuery::new(
            call.str_arg("cuisine").unwrap_or_default(),
            call.str_arg("location").unwrap_or_default(),
        )
        .price_tier(call.str_arg("price_tier").unwrap_or_default())
        .limit(limit)
    }
}

#[async_trait]
impl Tool for RestaurantSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: TOOL_NAME.into(),
            description: "Search for restaurants by cuisine, location and price tier. Returns name, rating, price, address, phone and cuisine categories for each match.".into(),
            parameters: vec![
                ParameterSchema {
                    name: "cuisine".into(),
                    param_type: "string".into(),
                    description: "Cuisine to search for, e.g. 'japanese', 'indian', 'italian', 'mexican'".into(),
                    required: true,
                    ..Default::default()
                },
                ParameterSchema {
                    name: "location".into(),
                    param_type: "string".into(),
                    description: "Where to search, e.g. 'San Francisco, CA'".into(),
                    required: true,
                    ..Default::default()
                },
                ParameterSchema {
                    name: "price_tier".into(),
                    param_type: "string".into(),
                    description: "Price tier: 'cheap', 'moderate', 'expensive' or 'very_expensive'".into(),
                    required: true,
                    enum_values: Some(PriceTier::ALL.iter().map(|t| json!(t.name())).collect()),
                    // unknown tiers fall back to moderate
                    lenient: true,
                    ..Default::default()
                },
                ParameterSchema {
                    name: "limit".into(),
                    param_type: "integer".into(),
                    description: "Number of results to return (1-50)".into(),
                    required: false,
                    default: Some(json!(RestaurantQuery::DEFAULT_LIMIT)),
                    minimum: Some(1),
                    maximum: Some(50),
                    ..Default::default()
                },
            ],
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let query = Self::query(call);

        let records = self
            .client
            .search(&query)
            .await
            .map_err(|e| AgentError::ToolExecution(format!("restaurant search failed: {e}")))?;

        tracing::debug!(count = records.len(), "Restaurant search complete");
        Ok(ToolResult::json(TOOL_NAME, serde_json::to_value(&records)?))
    }
}
