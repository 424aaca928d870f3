use anyhow::{Context, Result, anyhow};
use reqwest::{Client, header::USER_AGENT};
use serde_json::Value;
use tracing::debug;

use crate::{
    config::Config,
    http::{endpoint, truncate_body},
    model::ResolvedPlace,
};

/// Client for a Nominatim-compatible `/search` endpoint.
#[derive(Debug, Clone)]
pub struct GeocodingClient {
    base_url: String,
    user_agent: String,
    http: Client,
}

impl GeocodingClient {
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>, http: Client) -> Self {
        Self { base_url: base_url.into(), user_agent: user_agent.into(), http }
    }

    pub fn from_config(config: &Config, http: Client) -> Self {
        Self::new(&config.endpoints.geocoding, &config.user_agent, http)
    }

    /// Resolve free text to the geocoder's best match.
    pub async fn resolve(&self, location: &str) -> Result<ResolvedPlace> {
        let url = endpoint(&self.base_url, "search");

        let res = self
            .http
            .get(&url)
            .header(USER_AGENT, &self.user_agent)
            .query(&[("q", location), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .context("Failed to send request to geocoding service")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read geocoding response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "Geocoding request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        let mut matches: Vec<Value> =
            serde_json::from_str(&body).context("Failed to parse geocoding JSON")?;

        debug!(location, matches = matches.len(), "geocoding lookup finished");

        if matches.is_empty() {
            Ok(ResolvedPlace::NotFound)
        } else {
            Ok(ResolvedPlace::Found(matches.swap_remove(0)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::stub_get;
    use serde_json::json;

    fn client(base: String) -> GeocodingClient {
        GeocodingClient::new(base, "weatherbot-test/1.0", Client::new())
    }

    #[tokio::test]
    async fn returns_first_record_unmodified() {
        let body = json!([
            {
                "display_name": "Paris, Île-de-France, France",
                "lat": "48.8588897",
                "lon": "2.3200410",
                "importance": 0.94
            },
            {"display_name": "Paris, Texas, United States", "lat": "33.6609", "lon": "-95.5555"}
        ]);
        let (base, _) = stub_get("/search", 200, &body.to_string()).await;

        let place = client(base).resolve("Paris").await.expect("lookup succeeds");

        assert_eq!(place, ResolvedPlace::Found(body[0].clone()));
    }

    #[tokio::test]
    async fn empty_array_is_not_found() {
        let (base, _) = stub_get("/search", 200, "[]").await;

        let place = client(base).resolve("Springfield").await.expect("lookup succeeds");

        assert_eq!(place, ResolvedPlace::NotFound);
        assert_eq!(place.to_observation(), "City not found");
    }

    #[tokio::test]
    async fn sends_query_and_user_agent() {
        let (base, seen) = stub_get("/search", 200, "[]").await;

        client(base).resolve("São Paulo & more").await.expect("lookup succeeds");

        let req = seen.single();
        assert_eq!(req.query.get("q").map(String::as_str), Some("São Paulo & more"));
        assert_eq!(req.query.get("format").map(String::as_str), Some("json"));
        assert_eq!(req.query.get("limit").map(String::as_str), Some("1"));
        assert_eq!(
            req.headers.get("user-agent").and_then(|v| v.to_str().ok()),
            Some("weatherbot-test/1.0")
        );
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let (base, _) = stub_get("/search", 503, "upstream overloaded").await;

        let err = client(base).resolve("Paris").await.unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("upstream overloaded"));
    }

    #[tokio::test]
    async fn non_array_body_is_an_error() {
        let (base, _) = stub_get("/search", 200, "{\"error\":\"bad\"}").await;

        let err = client(base).resolve("Paris").await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse geocoding JSON"));
    }
}
