pub mod countries;
#[cfg(test)]
pub mod mock;
pub mod openweather;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::WeatherRecord;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("JSON parsing failed: {0}")]
    JsonParsing(#[from] serde_json::Error),
    #[error("{0}")]
    Api(String),
}

/// Third-party weather and geography lookups.
///
/// Current-weather calls return a fully mapped [`WeatherRecord`] whose
/// `city_name` is the name the provider resolved.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current_by_name(&self, city_name: &str) -> Result<WeatherRecord, ProviderError>;

    async fn current_by_coords(&self, lat: f64, lon: f64) -> Result<WeatherRecord, ProviderError>;

    /// Raw forecast payload, passed through untouched.
    async fn forecast_by_name(&self, city_name: &str) -> Result<serde_json::Value, ProviderError>;

    /// Every city name known to the geography service, flattened across countries.
    async fn city_names(&self) -> Result<Vec<String>, ProviderError>;
}

/// Live provider: OpenWeatherMap for weather, countriesnow.space for city names.
pub struct HttpWeatherProvider {
    openweather: openweather::OpenWeatherClient,
    countries: countries::CountriesClient,
}

impl HttpWeatherProvider {
    pub fn new(config: &crate::config::Config) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("CityWeatherServer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            openweather: openweather::OpenWeatherClient::new(client.clone(), config.clone()),
            countries: countries::CountriesClient::new(client, config.countries_api_url.clone()),
        })
    }
}

#[async_trait]
impl WeatherProvider for HttpWeatherProvider {
    async fn current_by_name(&self, city_name: &str) -> Result<WeatherRecord, ProviderError> {
        self.openweather.get_current_by_name(city_name).await
    }

    async fn current_by_coords(&self, lat: f64, lon: f64) -> Result<WeatherRecord, ProviderError> {
        self.openweather.get_current_by_coords(lat, lon).await
    }

    async fn forecast_by_name(&self, city_name: &str) -> Result<serde_json::Value, ProviderError> {
        self.openweather.get_forecast_by_name(city_name).await
    }

    async fn city_names(&self) -> Result<Vec<String>, ProviderError> {
        self.countries.get_city_names().await
    }
}
