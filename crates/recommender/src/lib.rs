//! # recommender
//!
//! Restaurant search, movie recommendation and summary tools for the agent loop.
//!
//! The two lookup tools sit on a shared [`fetch::RetryClient`] that retries
//! only on HTTP 429, with a jittered wait between attempts. A third tool asks
//! the language model itself for a one-line summary. Every optional upstream
//! field is normalized to a [`model::Reported`] value so the renderer never
//! sees `null`.
//!
//! ```rust,ignore
//! let config = RecommenderConfig::new(yelp, tmdb);
//! let tools = config.build_tools(provider.clone(), "llama3.2")?;
//! let agent = AgentBuilder::new().provider(provider).tools(tools).build()?;
//! ```

pub mod error;
pub mod fetch;
pub mod model;
pub mod svckit;
pub mod tmdb;
pub mod yelp;

use std::sync::Arc;
use std::time::Duration;

use agent_core::{LlmProvider, ToolRegistry};

pub use error::{FetchError, RecommenderError, Result};
pub use fetch::{RetryClient, RetryPolicy};
pub use svckit::{MovieRecommendationTool, RestaurantSearchTool, SummarizeDataTool};
pub use tmdb::{TmdbClient, TmdbConfig};
pub use yelp::{YelpClient, YelpConfig};

/// Tool names as the model sees them
pub mod tools {
    pub use crate::svckit::movie_recommendations::TOOL_NAME as MOVIE_RECOMMENDATIONS;
    pub use crate::svckit::restaurant_search::TOOL_NAME as RESTAURANT_SEARCH;
    pub use crate::svckit::summarize_data::TOOL_NAME as SUMMARIZE_DATA;
}

/// Default system instruction for the dining and movie assistant
pub const RECOMMENDER_PROMPT: &str = "\
You are a friendly assistant that helps people plan an evening out: where to eat and what to watch.

You have three tools:
- restaurant_search: finds restaurants by cuisine, location and price tier \
(cheap, moderate, expensive, very_expensive). Ask for the location if the user did not give one.
- get_movie_recommendations: takes a movie the user liked and returns similar movies.
- summarize_data: turns a block of results into a one-line headline. Use it only when the user \
asks for a quick summary.

Call a tool whenever the user asks for restaurants or movies instead of inventing results. \
When tool results arrive, summarize them briefly; the interface shows the full details as cards. \
If a tool reports an error or finds nothing, say so plainly and suggest another search. \
Values shown as \"not available\" are unknown; never guess them.";

/// Everything needed to build the tool set
#[derive(Clone, Debug)]
pub struct RecommenderConfig {
    pub yelp: YelpConfig,
    pub tmdb: TmdbConfig,
    pub retry: RetryPolicy,
    /// Per-request HTTP timeout
    pub timeout: Duration,
}

impl RecommenderConfig {
    pub fn new(yelp: YelpConfig, tmdb: TmdbConfig) -> Self {
        Self {
            yelp,
            tmdb,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(10),
        }
    }

    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate credentials and register every tool; the summarizer asks `provider` with `model`
    pub fn build_tools(&self, provider: Arc<dyn LlmProvider>, model: &str) -> Result<ToolRegistry> {
        self.retry.validate()?;
        let fetcher = Arc::new(RetryClient::new(self.retry.clone(), self.timeout)?);

        let yelp = YelpClient::new(&self.yelp, Arc::clone(&fetcher))?;
        let tmdb = TmdbClient::new(&self.tmdb, fetcher)?;

        let mut registry = ToolRegistry::new();
        registry.register(RestaurantSearchTool::new(Arc::new(yelp)));
        registry.register(MovieRecommendationTool::new(Arc::new(tmdb)));
        registry.register(SummarizeDataTool::new(provider, model));

        tracing::info!(tools = ?registry.names(), "Recommender tools registered");
        Ok(registry)
    }
}
