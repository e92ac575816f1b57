use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{ProviderError, WeatherProvider};
use crate::models::WeatherRecord;

/// Canned provider that counts every call it receives.
#[derive(Default)]
pub struct MockWeatherProvider {
    cities: Vec<WeatherRecord>,
    coords_result: Option<WeatherRecord>,
    forecast: Option<serde_json::Value>,
    city_names: Vec<String>,
    broken: bool,
    rejection: Option<String>,
    calls: AtomicUsize,
}

impl MockWeatherProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_city(mut self, record: WeatherRecord) -> Self {
        self.cities.push(record);
        self
    }

    pub fn with_coords_result(mut self, record: WeatherRecord) -> Self {
        self.coords_result = Some(record);
        self
    }

    pub fn with_forecast(mut self, forecast: serde_json::Value) -> Self {
        self.forecast = Some(forecast);
        self
    }

    pub fn with_city_names(mut self, names: &[&str]) -> Self {
        self.city_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Every call fails as if the response body could not be parsed.
    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    /// Every call fails with `message` as reported by the provider itself.
    pub fn rejecting(mut self, message: &str) -> Self {
        self.rejection = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record_call(&self) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            let parse_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
            return Err(ProviderError::JsonParsing(parse_error));
        }
        if let Some(message) = &self.rejection {
            return Err(ProviderError::Api(message.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl WeatherProvider for MockWeatherProvider {
    async fn current_by_name(&self, city_name: &str) -> Result<WeatherRecord, ProviderError> {
        self.record_call()?;
        self.cities
            .iter()
            .find(|r| r.city_name.to_lowercase() == city_name.to_lowercase())
            .cloned()
            .ok_or_else(|| ProviderError::Api("city not found".to_string()))
    }

    async fn current_by_coords(&self, _lat: f64, _lon: f64) -> Result<WeatherRecord, ProviderError> {
        self.record_call()?;
        self.coords_result
            .clone()
            .ok_or_else(|| ProviderError::Api("wrong latitude".to_string()))
    }

    async fn forecast_by_name(&self, _city_name: &str) -> Result<serde_json::Value, ProviderError> {
        self.record_call()?;
        self.forecast
            .clone()
            .ok_or_else(|| ProviderError::Api("city not found".to_string()))
    }

    async fn city_names(&self) -> Result<Vec<String>, ProviderError> {
        self.record_call()?;
        Ok(self.city_names.clone())
    }
}
