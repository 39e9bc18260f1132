//! Error Types for the Recommender

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecommenderError>;

/// Failures surfaced by the retry client once it stops retrying
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Still rate limited (429) after every allowed attempt
    #[error("Upstream rate limited after {attempts} attempt(s)")]
    RateLimited { attempts: u32 },

    /// Non-200, non-429 status; never retried
    #[error("Upstream returned status {status}: {body}")]
    UpstreamFatal { status: u16, body: String },

    /// Transport-level failure on every allowed attempt
    #[error("Upstream unreachable after {attempts} attempt(s): {message}")]
    Unreachable { attempts: u32, message: String },

    /// 200 response whose body was not JSON
    #[error("Upstream response could not be decoded: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum RecommenderError {
    /// Missing or malformed credential / URL
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
