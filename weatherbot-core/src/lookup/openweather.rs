use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{debug, warn};

use crate::{
    config::{Config, CredentialId},
    http::endpoint,
    model::WeatherReading,
};

/// Client for the OpenWeather current-conditions endpoint.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    base_url: String,
    api_key: Option<String>,
    http: Client,
}

impl WeatherClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, http: Client) -> Self {
        Self { base_url: base_url.into(), api_key, http }
    }

    pub fn from_config(config: &Config, http: Client) -> Self {
        Self::new(
            &config.endpoints.weather,
            config.api_key(CredentialId::OpenWeather).map(str::to_owned),
            http,
        )
    }

    /// Fetch current conditions in metric units.
    ///
    /// Any HTTP status counts as a reading; only transport failures are errors.
    pub async fn fetch(&self, city: &str) -> Result<WeatherReading> {
        let url = endpoint(&self.base_url, "data/2.5/weather");

        let api_key = self.api_key.as_deref().unwrap_or_else(|| {
            let service = CredentialId::OpenWeather.label();
            warn!("No {service} key configured; sending weather request without one");
            ""
        });

        let res = self
            .http
            .get(&url)
            .query(&[("q", city), ("appid", api_key), ("units", "metric")])
            .send()
            .await
            .context("Failed to send request to OpenWeather (current weather)")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read OpenWeather current response body")?;

        if status.is_success() {
            debug!(city, %status, "weather lookup finished");
        } else {
            warn!(city, %status, "weather lookup returned an error status");
        }

        Ok(WeatherReading { status: status.as_u16(), body })
    }
}
