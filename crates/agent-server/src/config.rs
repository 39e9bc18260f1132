//! Server Configuration
//!
//! Everything the server needs is read once at startup. Values come from a
//! lookup function so the environment stays the only global input.

use std::time::Duration;

use agent_core::{AgentConfig, provider::GenerationOptions};
use agent_runtime::OllamaConfig;
use recommender::{
    RecommenderConfig, RetryPolicy, TmdbConfig, YelpConfig,
    tmdb::{DEFAULT_TMDB_BASE_URL, DEFAULT_TMDB_IMAGE_BASE_URL},
    yelp::DEFAULT_YELP_BASE_URL,
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Resolved server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub recommender: RecommenderConfig,
    pub ollama: OllamaConfig,
    pub agent: AgentConfig,
    pub bind_addr: String,
}

impl ServerConfig {
    /// Read from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through `lookup`; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let yelp = YelpConfig::new(require("YELP_API_KEY")?)
            .with_base_url(get("YELP_BASE_URL").unwrap_or_else(|| DEFAULT_YELP_BASE_URL.into()));

        let tmdb_base = get("TMDB_BASE_URL")
            .or_else(|| get("BASE_URL"))
            .unwrap_or_else(|| DEFAULT_TMDB_BASE_URL.into());
        let tmdb = TmdbConfig::new(require("THE_MOVIE_DB_API_KEY")?)
            .with_base_url(tmdb_base)
            .with_image_base_url(
                get("TMDB_IMAGE_BASE_URL").unwrap_or_else(|| DEFAULT_TMDB_IMAGE_BASE_URL.into()),
            );

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: parse_or(&get, "RETRY_MAX_ATTEMPTS", defaults.max_attempts)?,
            min_wait: Duration::from_secs(parse_or(&get, "RETRY_MIN_WAIT_SECS", defaults.min_wait.as_secs())?),
            max_wait: Duration::from_secs(parse_or(&get, "RETRY_MAX_WAIT_SECS", defaults.max_wait.as_secs())?),
            max_retry_after: Duration::from_secs(parse_or(
                &get,
                "RETRY_AFTER_CAP_SECS",
                defaults.max_retry_after.as_secs(),
            )?),
        };
        retry.validate().map_err(|e| {
            // Blame the setting that actually broke the policy
            let (key, value) = if retry.max_attempts == 0 {
                ("RETRY_MAX_ATTEMPTS", retry.max_attempts.to_string())
            } else {
                ("RETRY_MIN_WAIT_SECS", retry.min_wait.as_secs().to_string())
            };
            ConfigError::Invalid {
                key,
                value,
                reason: e.to_string(),
            }
        })?;

        let timeout = Duration::from_secs(parse_or(&get, "HTTP_TIMEOUT_SECS", 10)?);
        let recommender = RecommenderConfig::new(yelp, tmdb)
            .with_retry(retry)
            .with_timeout(timeout);

        let ollama_defaults = OllamaConfig::default();
        let ollama = OllamaConfig::new(
            get("OLLAMA_HOST").unwrap_or(ollama_defaults.host),
            parse_or(&get, "OLLAMA_PORT", ollama_defaults.port)?,
        )
        .with_timeout_secs(parse_or(&get, "OLLAMA_TIMEOUT_SECS", ollama_defaults.timeout_secs)?);

        let agent = AgentConfig {
            generation: GenerationOptions {
                model: get("MODEL").unwrap_or_else(|| GenerationOptions::default().model),
                ..Default::default()
            },
            stream: parse_or(&get, "MODEL_STREAM", false)?,
            ..Default::default()
        };

        Ok(Self {
            recommender,
            ollama,
            agent,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into()),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const KEYS: [(&str, &str); 2] = [("YELP_API_KEY", "y"), ("THE_MOVIE_DB_API_KEY", "t")];

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&KEYS)).unwrap();

        assert_eq!(config.recommender.yelp.base_url, DEFAULT_YELP_BASE_URL);
        assert_eq!(config.recommender.tmdb.base_url, DEFAULT_TMDB_BASE_URL);
        assert_eq!(config.recommender.retry, RetryPolicy::default());
        assert_eq!(config.recommender.timeout, Duration::from_secs(10));
        assert_eq!(config.ollama.base_url(), "http://localhost:11434");
        assert_eq!(config.ollama.timeout_secs, 120);
        assert_eq!(config.agent.generation.model, "llama3.2");
        assert!(!config.agent.stream);
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
    }

    #[test]
    fn test_missing_credentials() {
        let err = ServerConfig::from_lookup(lookup(&[("THE_MOVIE_DB_API_KEY", "t")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("YELP_API_KEY"));

        let err = ServerConfig::from_lookup(lookup(&[("YELP_API_KEY", "y"), ("THE_MOVIE_DB_API_KEY", "  ")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing("THE_MOVIE_DB_API_KEY"));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = KEYS.to_vec();
        pairs.extend([
            ("BASE_URL", "http://tmdb.local/3"),
            ("RETRY_MAX_ATTEMPTS", "3"),
            ("RETRY_MIN_WAIT_SECS", "1"),
            ("RETRY_MAX_WAIT_SECS", "2"),
            ("OLLAMA_HOST", "ollama"),
            ("OLLAMA_PORT", "8080"),
            ("OLLAMA_TIMEOUT_SECS", "45"),
            ("RETRY_AFTER_CAP_SECS", "15"),
            ("MODEL", "qwen2.5"),
            ("MODEL_STREAM", "true"),
        ]);
        let config = ServerConfig::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.recommender.tmdb.base_url, "http://tmdb.local/3");
        assert_eq!(config.recommender.retry.max_attempts, 3);
        assert_eq!(config.recommender.retry.max_wait, Duration::from_secs(2));
        assert_eq!(config.recommender.retry.max_retry_after, Duration::from_secs(15));
        assert_eq!(config.ollama.base_url(), "http://ollama:8080");
        assert_eq!(config.ollama.timeout_secs, 45);
        assert_eq!(config.agent.generation.model, "qwen2.5");
        assert!(config.agent.stream);
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        let mut pairs = KEYS.to_vec();
        pairs.push(("OLLAMA_PORT", "eleven"));
        let err = ServerConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "OLLAMA_PORT", .. }));

        let mut pairs = KEYS.to_vec();
        pairs.push(("OLLAMA_TIMEOUT_SECS", "-5"));
        let err = ServerConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "OLLAMA_TIMEOUT_SECS", .. }));
    }

    #[test]
    fn test_invalid_retry_policy_names_the_right_key() {
        let mut pairs = KEYS.to_vec();
        pairs.push(("RETRY_MAX_ATTEMPTS", "0"));
        let err = ServerConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "RETRY_MAX_ATTEMPTS", ref value, .. } if value == "0"));

        let mut pairs = KEYS.to_vec();
        pairs.extend([("RETRY_MIN_WAIT_SECS", "30"), ("RETRY_MAX_WAIT_SECS", "5")]);
        let err = ServerConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "RETRY_MIN_WAIT_SECS", ref value, .. } if value == "30"));
    }
}
