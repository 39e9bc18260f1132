//! Restaurant lookup against the Yelp business search API

use std::sync::Arc;

use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{RecommenderError, Result};
use crate::fetch::{RetryClient, bearer_headers};
use crate::model::{Address, RestaurantQuery, RestaurantRecord};

pub const DEFAULT_YELP_BASE_URL: &str = "https://api.yelp.com/v3/businesses/search";

/// Credentials and endpoint for the business search upstream
#[derive(Clone, Debug)]
pub struct YelpConfig {
    pub api_key: String,
    pub base_url: String,
}

impl YelpConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_YELP_BASE_URL.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(RecommenderError::Config("Yelp API key is not set".into()));
        }
        if self.base_url.trim().is_empty() {
            return Err(RecommenderError::Config("Yelp API base URL is not set".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Business {
    name: Option<String>,
    rating: Option<f64>,
    price: Option<String>,
    location: Option<Location>,
    display_phone: Option<String>,
    phone: Option<String>,
    url: Option<String>,
    categories: Option<Vec<Category>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Location {
    address1: Option<String>,
    city: Option<String>,
    state: Option<String>,
    zip_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Category {
    title: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl From<Business> for RestaurantRecord {
    fn from(b: Business) -> Self {
        let location = b.location.unwrap_or_default();
        Self {
            name: non_empty(b.name).unwrap_or_else(|| crate::model::NOT_AVAILABLE.into()),
            rating: b.rating.into(),
            price: non_empty(b.price).into(),
            address: Address {
                address1: non_empty(location.address1).into(),
                city: non_empty(location.city).into(),
                state: non_empty(location.state).into(),
                zip_code: non_empty(location.zip_code).into(),
            },
            phone: non_empty(b.display_phone).or_else(|| non_empty(b.phone)).into(),
            url: non_empty(b.url).into(),
            categories: b
                .categories
                .unwrap_or_default()
                .into_iter()
                .filter_map(|c| non_empty(c.title))
                .collect(),
        }
    }
}

/// Business search client
pub struct YelpClient {
    fetcher: Arc<RetryClient>,
    base_url: String,
    headers: HeaderMap,
}

impl YelpClient {
    pub fn new(config: &YelpConfig, fetcher: Arc<RetryClient>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            fetcher,
            base_url: config.base_url.clone(),
            headers: bearer_headers(&config.api_key)?,
        })
    }

    /// Query string sent upstream for a search
    pub fn query_params(query: &RestaurantQuery) -> Vec<(&'static str, String)> {
        vec![
            ("term", query.cuisine.clone()),
            ("location", query.location.clone()),
            ("limit", query.limit.to_string()),
            ("price", query.price_tier.code().to_string()),
        ]
    }

    /// Search businesses; returns at most `query.limit` records
    pub async fn search(&self, query: &RestaurantQuery) -> Result<Vec<RestaurantRecord>> {
        tracing::debug!(
            cuisine = %query.cuisine,
            location = %query.location,
            tier = query.price_tier.name(),
            limit = query.limit,
            "Searching restaurants"
        );

        let body = self
            .fetcher
            .get_json(&self.base_url, &Self::query_params(query), &self.headers)
            .await?;

        Ok(parse_businesses(body, query.limit))
    }
}

/// Each business is decoded on its own so one malformed entry only drops itself
fn parse_businesses(mut body: Value, limit: u32) -> Vec<RestaurantRecord> {
    let items = match body.get_mut("businesses").map(Value::take) {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            tracing::warn!(field = %other, "Unexpected businesses field in search payload");
            Vec::new()
        }
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<Business>(item) {
            Ok(business) => Some(business),
            Err(e) => {
                tracing::warn!(index, error = %e, "Skipping malformed business");
                None
            }
        })
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .map(RestaurantRecord::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetch::RetryPolicy;
    use crate::model::{PriceTier, Reported};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> YelpClient {
        let fetcher = RetryClient::new(RetryPolicy::immediate(3), Duration::from_secs(5)).unwrap();
        let config = YelpConfig::new("yelp-key").with_base_url(format!("{}/v3/businesses/search", server.uri()));
        YelpClient::new(&config, Arc::new(fetcher)).unwrap()
    }

    fn business(name: &str) -> Value {
        json!({
            "name": name,
            "rating": 4.5,
            "price": "$$",
            "location": {"address1": "1 Main St", "city": "Boston", "state": "MA", "zip_code": "02110"},
            "display_phone": "(617) 555-0100",
            "url": "https://www.yelp.com/biz/x",
            "categories": [{"alias": "sushi", "title": "Sushi Bars"}, {"alias": "japanese", "title": "Japanese"}]
        })
    }

    #[test]
    fn test_config_validation() {
        assert!(YelpConfig::new("").validate().is_err());
        assert!(YelpConfig::new("key").with_base_url(" ").validate().is_err());
        assert!(YelpConfig::new("key").validate().is_ok());
    }

    #[test]
    fn test_query_params_use_tier_code() {
        let query = RestaurantQuery::new("sushi", "Boston").price_tier("very expensive").limit(3);
        let params = YelpClient::query_params(&query);
        assert!(params.contains(&("price", "4".to_string())));
        assert!(params.contains(&("limit", "3".to_string())));
        assert!(params.contains(&("term", "sushi".to_string())));

        let fallback = RestaurantQuery::new("sushi", "Boston").price_tier("luxurious");
        assert_eq!(fallback.price_tier, PriceTier::Moderate);
        assert!(YelpClient::query_params(&fallback).contains(&("price", "2".to_string())));
    }

    #[test]
    fn test_missing_fields_become_sentinels() {
        let records = parse_businesses(json!({"businesses": [{"name": "Bare"}]}), 5);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.rating, Reported::NotAvailable);
        assert_eq!(r.price, Reported::NotAvailable);
        assert_eq!(r.phone, Reported::NotAvailable);
        assert_eq!(r.address.one_line(), crate::model::NOT_AVAILABLE);
        assert!(r.categories.is_empty());

        let rendered = serde_json::to_value(r).unwrap();
        assert_eq!(rendered["rating"], "not available");
        assert!(!rendered.to_string().contains("null"));
    }

    #[test]
    fn test_missing_businesses_key() {
        assert!(parse_businesses(json!({"total": 0}), 5).is_empty());
        assert!(parse_businesses(json!({"businesses": null}), 5).is_empty());
        assert!(parse_businesses(json!([business("A")]), 5).is_empty());
    }

    #[test]
    fn test_null_categories_keep_the_business() {
        let body = json!({"businesses": [
            business("First"),
            {"name": "Odd One", "categories": null},
            business("Last"),
        ]});
        let records = parse_businesses(body, 5);

        assert_eq!(records.len(), 3);
        assert_eq!(records[1].name, "Odd One");
        assert!(records[1].categories.is_empty());
    }

    #[test]
    fn test_malformed_business_only_drops_itself() {
        let body = json!({"businesses": [
            business("Good"),
            {"name": "Broken", "rating": "five stars", "location": "downtown"},
            "not even an object",
            business("Also Good"),
        ]});
        let records = parse_businesses(body, 5);

        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Good", "Also Good"]);
    }

    #[tokio::test]
    async fn test_search_normalizes_and_caps_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/businesses/search"))
            .and(header("authorization", "Bearer yelp-key"))
            .and(query_param("location", "Boston"))
            .and(query_param("price", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "businesses": [business("A"), business("B"), business("C")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let query = RestaurantQuery::new("sushi", "Boston").price_tier("cheap").limit(2);
        let records = client(&server).search(&query).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "A");
        assert_eq!(records[0].rating, Reported::Known(4.5));
        assert_eq!(records[0].phone, Reported::Known("(617) 555-0100".into()));
        assert_eq!(records[0].categories, vec!["Sushi Bars", "Japanese"]);
        assert_eq!(records[0].address.one_line(), "1 Main St, Boston, MA 02110");
    }

    #[tokio::test]
    async fn test_result_count_never_exceeds_limit() {
        let server = MockServer::start().await;
        let many: Vec<Value> = (0..10).map(|i| business(&format!("R{i}"))).collect();
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "businesses": many })))
            .mount(&server)
            .await;

        let client = client(&server);
        for limit in [1, 5, 10, 50] {
            let query = RestaurantQuery::new("pizza", "NYC").limit(limit);
            let records = client.search(&query).await.unwrap();
            assert!(records.len() <= limit as usize, "limit {limit} got {}", records.len());
        }
    }

    #[tokio::test]
    async fn test_fatal_status_surfaces_as_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .search(&RestaurantQuery::new("thai", "Austin"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RecommenderError::Fetch(FetchError::UpstreamFatal { status: 401, .. })
        ));
    }
}
