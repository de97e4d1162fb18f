use crate::config::WeatherConfig;
use crate::core::{WeatherReport, WeatherSource};
use crate::utils::error::{BotError, Result};
use reqwest::Client;
use std::time::Duration;
use url::Url;

pub struct OpenWeatherClient {
    endpoint: String,
    api_key: Option<String>,
    country_code: String,
    client: Client,
}

impl OpenWeatherClient {
    pub fn new(config: &WeatherConfig, country_code: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            country_code: country_code.to_string(),
            client,
        })
    }

    fn request_url(&self, city: &str, api_key: &str) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| BotError::InvalidConfigValueError {
            field: "weather.endpoint".to_string(),
            value: self.endpoint.clone(),
            reason: e.to_string(),
        })?;
        url.query_pairs_mut()
            .append_pair("q", &format!("{},{}", city, self.country_code))
            .append_pair("appid", api_key)
            .append_pair("units", "metric");
        Ok(url)
    }
}

#[async_trait::async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn fetch(&self, city: &str) -> Result<WeatherReport> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            tracing::error!("WEATHER_API_KEY not found. Cannot fetch weather.");
            BotError::MissingConfigError {
                field: "WEATHER_API_KEY".to_string(),
            }
        })?;

        let url = self.request_url(city, api_key)?;
        tracing::debug!("Requesting weather for {} from {}", city, self.endpoint);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        tracing::debug!("Weather API response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Error fetching weather data for {}: {} {}", city, status, body);
            return Err(BotError::WeatherError {
                message: format!("{} returned {}", self.endpoint, status),
            });
        }

        let report: WeatherReport = response.json().await?;
        tracing::info!("🌤️ Successfully fetched fresh weather data for {}", city);
        Ok(report)
    }
}
