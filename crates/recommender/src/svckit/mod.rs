//! Service Kit - Agent Tools
//!
//! `agent_core::Tool` implementations for dining and movie lookups, each
//! wrapping one upstream client, plus a model-backed summarizer.

pub mod restaurant_search;
pub mod movie_recommendations;
pub mod summarize_data;

pub use restaurant_search::RestaurantSearchTool;
pub use movie_recommendations::MovieRecommendationTool;
pub use summarize_data::SummarizeDataTool;
