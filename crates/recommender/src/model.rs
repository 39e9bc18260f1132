//! Domain Models
//!
//! Normalized records handed to the renderer. Optional upstream fields are
//! carried as [`Reported`] so they serialize as `"not available"` instead of
//! `null`.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Stand-in rendered for any absent upstream value
pub const NOT_AVAILABLE: &str = "not available";

/// A value the upstream may or may not have provided
#[derive(Clone, Debug, PartialEq)]
pub enum Reported<T> {
    Known(T),
    NotAvailable,
}

impl<T> Reported<T> {
    pub const fn as_option(&self) -> Option<&T> {
        match self {
            Reported::Known(v) => Some(v),
            Reported::NotAvailable => None,
        }
    }
}

impl<T> From<Option<T>> for Reported<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Reported::NotAvailable, Reported::Known)
    }
}

impl<T: Serialize> Serialize for Reported<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Reported::Known(v) => v.serialize(serializer),
            Reported::NotAvailable => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Reported<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reported::Known(v) => v.fmt(f),
            Reported::NotAvailable => f.write_str(NOT_AVAILABLE),
        }
    }
}

/// Restaurant price tier
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    Cheap,
    #[default]
    Moderate,
    Expensive,
    VeryExpensive,
}

impl PriceTier {
    pub const ALL: [PriceTier; 4] = [
        PriceTier::Cheap,
        PriceTier::Moderate,
        PriceTier::Expensive,
        PriceTier::VeryExpensive,
    ];

    /// Parse a tier name; anything unrecognized falls back to `Moderate`
    pub fn parse_lenient(input: &str) -> Self {
        let normalized = input.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "cheap" => PriceTier::Cheap,
            "expensive" => PriceTier::Expensive,
            "very_expensive" => PriceTier::VeryExpensive,
            "moderate" => PriceTier::Moderate,
            other => {
                tracing::debug!(tier = other, "Unknown price tier, using moderate");
                PriceTier::Moderate
            }
        }
    }

    /// Upstream tier code
    pub const fn code(self) -> &'static str {
        match self {
            PriceTier::Cheap => "1",
            PriceTier::Moderate => "2",
            PriceTier::Expensive => "3",
            PriceTier::VeryExpensive => "4",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            PriceTier::Cheap => "cheap",
            PriceTier::Moderate => "moderate",
            PriceTier::Expensive => "expensive",
            PriceTier::VeryExpensive => "very_expensive",
        }
    }
}

/// Structured restaurant search request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestaurantQuery {
    pub cuisine: String,
    pub location: String,
    pub price_tier: PriceTier,
    pub limit: u32,
}

impl RestaurantQuery {
    pub const DEFAULT_LIMIT: u32 = 5;

    pub fn new(cuisine: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            cuisine: cuisine.into(),
            location: location.into(),
            price_tier: PriceTier::default(),
            limit: Self::DEFAULT_LIMIT,
        }
    }

    pub fn price_tier(mut self, tier: &str) -> Self {
        self.price_tier = PriceTier::parse_lenient(tier);
        self
    }

    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }
}

/// Street address split into components
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Address {
    pub address1: Reported<String>,
    pub city: Reported<String>,
    pub state: Reported<String>,
    pub zip_code: Reported<String>,
}

impl Address {
    /// `"address1, city, state zip"`, skipping missing parts
    pub fn one_line(&self) -> String {
        let region = [&self.state, &self.zip_code]
            .iter()
            .filter_map(|r| r.as_option().map(String::as_str))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let line = [self.address1.as_option(), self.city.as_option(), Some(&region)]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        if line.is_empty() { NOT_AVAILABLE.to_string() } else { line }
    }
}

/// One business returned by restaurant search
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RestaurantRecord {
    pub name: String,
    pub rating: Reported<f64>,
    pub price: Reported<String>,
    pub address: Address,
    pub phone: Reported<String>,
    pub url: Reported<String>,
    pub categories: Vec<String>,
}

/// One recommended movie
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MovieRecord {
    pub title: String,
    /// Average user rating on a 0–10 scale
    pub rating: Reported<f64>,
    /// ISO 639-1 code
    pub language: Reported<String>,
    pub poster_url: Reported<String>,
}

/// Result of a movie recommendation lookup
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MovieRecommendations {
    /// Title the search resolved to, `None` when nothing matched
    pub found_title: Option<String>,
    pub recommendations: Vec<MovieRecord>,
}

impl MovieRecommendations {
    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn found(title: impl Into<String>, recommendations: Vec<MovieRecord>) -> Self {
        Self {
            found_title: Some(title.into()),
            recommendations,
        }
    }
}
