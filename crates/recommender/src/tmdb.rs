//! Movie recommendations from The Movie Database
//!
//! Two upstream calls: resolve a free-text title to a movie id (first search
//! hit wins, no disambiguation), then fetch that movie's recommendations.
//! Lookups never fail outright; a failed step yields an empty result.

use std::sync::Arc;

use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{RecommenderError, Result};
use crate::fetch::{RetryClient, bearer_headers};
use crate::model::{MovieRecommendations, MovieRecord, NOT_AVAILABLE, Reported};

pub const DEFAULT_TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_TMDB_IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/original";

/// Credentials and endpoints for the movie upstream
#[derive(Clone, Debug)]
pub struct TmdbConfig {
    pub api_key: String,
    pub base_url: String,
    /// Prefix joined with each `poster_path`
    pub image_base_url: String,
}

impl TmdbConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_TMDB_BASE_URL.into(),
            image_base_url: DEFAULT_TMDB_IMAGE_BASE_URL.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_image_base_url(mut self, image_base_url: impl Into<String>) -> Self {
        self.image_base_url = image_base_url.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(RecommenderError::Config("TMDB API key is not set".into()));
        }
        if self.base_url.trim().is_empty() {
            return Err(RecommenderError::Config("TMDB API base URL is not set".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Movie {
    id: Option<i64>,
    title: Option<String>,
    vote_average: Option<f64>,
    original_language: Option<String>,
    poster_path: Option<String>,
}

/// Poster URL, or the sentinel when the upstream gave no path
pub fn poster_url(image_base_url: &str, poster_path: Option<&str>) -> Reported<String> {
    poster_path.map_or(Reported::NotAvailable, |path| {
        Reported::Known(format!("{image_base_url}{path}"))
    })
}

/// Movie search and recommendation client
pub struct TmdbClient {
    fetcher: Arc<RetryClient>,
    base_url: String,
    image_base_url: String,
    headers: HeaderMap,
}

impl TmdbClient {
    pub fn new(config: &TmdbConfig, fetcher: Arc<RetryClient>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            fetcher,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            image_base_url: config.image_base_url.trim_end_matches('/').to_string(),
            headers: bearer_headers(&config.api_key)?,
        })
    }

    /// Resolve `movie_title` and list movies recommended alongside it
    pub async fn recommend(&self, movie_title: &str) -> MovieRecommendations {
        let title = movie_title.trim();
        if title.is_empty() {
            return MovieRecommendations::not_found();
        }

        let Some((movie_id, found_title)) = self.resolve(title).await else {
            return MovieRecommendations::not_found();
        };

        tracing::debug!(movie_id, found_title = %found_title, "Fetching recommendations");
        let url = format!("{}/movie/{movie_id}/recommendations", self.base_url);
        let params = [("language", "en-US".to_string()), ("page", "1".to_string())];

        match self.fetcher.get_json(&url, &params, &self.headers).await {
            Ok(body) => {
                let recommendations = parse_results(body)
                    .into_iter()
                    .map(|m| self.normalize(m))
                    .collect();
                MovieRecommendations::found(found_title, recommendations)
            }
            Err(e) => {
                tracing::warn!(movie_id, error = %e, "Recommendation fetch failed, returning title only");
                MovieRecommendations::found(found_title, Vec::new())
            }
        }
    }

    /// First search hit as `(id, title)`
    async fn resolve(&self, title: &str) -> Option<(i64, String)> {
        let url = format!("{}/search/movie", self.base_url);
        let body = match self
            .fetcher
            .get_json(&url, &[("query", title.to_string())], &self.headers)
            .await
        {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(title, error = %e, "Movie search failed");
                return None;
            }
        };

        let first = parse_results(body).into_iter().next()?;
        let Some(id) = first.id else {
            tracing::warn!(title, "First search result has no id");
            return None;
        };
        Some((id, first.title.unwrap_or_else(|| title.to_string())))
    }

    fn normalize(&self, movie: Movie) -> MovieRecord {
        MovieRecord {
            poster_url: poster_url(&self.image_base_url, movie.poster_path.as_deref()),
            title: movie.title.unwrap_or_else(|| NOT_AVAILABLE.into()),
            rating: movie.vote_average.into(),
            language: movie.original_language.filter(|l| !l.is_empty()).into(),
        }
    }
}

/// Movies under `results`, decoded one by one; malformed entries are skipped
fn parse_results(mut body: Value) -> Vec<Movie> {
    let items = match body.get_mut("results").map(Value::take) {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            tracing::warn!(field = %other, "Unexpected results field in movie payload");
            Vec::new()
        }
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<Movie>(item) {
            Ok(movie) => Some(movie),
            Err(e) => {
                tracing::warn!(index, error = %e, "Skipping malformed movie");
                None
            }
        })
        .collect()
}
