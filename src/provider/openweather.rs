use reqwest::Client;
use serde_json::Value;

use super::types::*;
use super::ProviderError;
use crate::config::Config;
use crate::models::WeatherRecord;

pub struct OpenWeatherClient {
    client: Client,
    config: Config,
}

impl OpenWeatherClient {
    pub fn new(client: Client, config: Config) -> Self {
        Self { client, config }
    }

    pub async fn get_current_by_name(&self, city_name: &str) -> Result<WeatherRecord, ProviderError> {
        let url = self.url(&self.config.openweather_current_path);

        let response = self
            .make_request(&url, &[
                ("q", city_name),
                ("units", "metric"),
                ("appid", &self.config.openweather_api_key),
            ])
            .await?;

        let current: CurrentWeatherResponse = serde_json::from_value(response)?;
        current.into_record()
    }

    pub async fn get_current_by_coords(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<WeatherRecord, ProviderError> {
        let url = self.url(&self.config.openweather_current_path);

        let response = self
            .make_request(&url, &[
                ("lat", &lat.to_string()),
                ("lon", &lon.to_string()),
                ("units", "metric"),
                ("appid", &self.config.openweather_api_key),
            ])
            .await?;

        let current: CurrentWeatherResponse = serde_json::from_value(response)?;
        current.into_record()
    }

    pub async fn get_forecast_by_name(&self, city_name: &str) -> Result<Value, ProviderError> {
        let url = self.url(&self.config.openweather_forecast_path);

        let forecast = self
            .make_request(&url, &[
                ("q", city_name),
                ("units", "metric"),
                ("appid", &self.config.openweather_api_key),
            ])
            .await?;

        // The forecast endpoint reports its status as the string "200" inside the body.
        let cod = forecast.get("cod").map(|cod| match cod {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        match cod {
            Some(cod) if cod != "200" => Err(ProviderError::Api(error_message(&forecast, &cod))),
            _ => Ok(forecast),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.openweather_base_url, path)
    }

    async fn make_request(&self, url: &str, params: &[(&str, &str)]) -> Result<Value, ProviderError> {
        tracing::debug!("OpenWeather request: {}", url);

        let response = self.client.get(url).query(params).send().await?;
        let status = response.status();

        if status.is_success() {
            let json: Value = response.json().await?;
            return Ok(json);
        }

        let error_text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<OpenWeatherErrorBody>(&error_text)
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| format!("HTTP {}", status));

        tracing::warn!("OpenWeather API error {}: {}", status, message);
        Err(ProviderError::Api(message))
    }
}

fn error_message(body: &Value, cod: &str) -> String {
    body.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Forecast request failed with code {}", cod))
}
