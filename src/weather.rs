use std::sync::Arc;

use crate::{
    database::Database,
    error::ApiError,
    models::WeatherRecord,
    provider::WeatherProvider,
};

pub const CITY_ALREADY_SAVED: &str = "City already saved";
pub const CITY_NOT_FOUND: &str = "City not found";

/// Cache-or-fetch over the record store. A stored record is never refreshed from the provider.
pub struct WeatherService {
    database: Arc<Database>,
    provider: Arc<dyn WeatherProvider>,
}

impl WeatherService {
    pub fn new(database: Arc<Database>, provider: Arc<dyn WeatherProvider>) -> Self {
        Self { database, provider }
    }

    pub async fn list(&self) -> Result<Vec<WeatherRecord>, ApiError> {
        Ok(self.database.list_cities().await?)
    }

    /// Fetches and stores current weather for `city_name` unless a record already exists.
    /// The stored name is the one the caller supplied.
    pub async fn add_current_by_name(&self, city_name: &str) -> Result<WeatherRecord, ApiError> {
        if self.database.find_city_by_name(city_name).await?.is_some() {
            tracing::debug!("Weather for {} already stored", city_name);
            return Err(ApiError::Conflict(CITY_ALREADY_SAVED.to_string()));
        }

        let mut record = self.provider.current_by_name(city_name).await?;
        record.city_name = city_name.to_string();

        let saved = self.database.insert_city(&record).await?;
        tracing::info!("Stored current weather for {}", saved.city_name);
        Ok(saved)
    }

    /// Same as [`Self::add_current_by_name`] but keyed on the name the provider resolves.
    pub async fn add_current_by_coords(&self, lat: f64, lon: f64) -> Result<WeatherRecord, ApiError> {
        let record = self.provider.current_by_coords(lat, lon).await?;

        if record.city_name.trim().is_empty() {
            return Err(ApiError::Upstream("No city found at this location".to_string()));
        }

        if self.database.find_city_by_name(&record.city_name).await?.is_some() {
            tracing::debug!("Weather for {} already stored", record.city_name);
            return Err(ApiError::Conflict(CITY_ALREADY_SAVED.to_string()));
        }

        let saved = self.database.insert_city(&record).await?;
        tracing::info!(
            "Stored current weather for {} ({}, {})",
            saved.city_name,
            lat,
            lon
        );
        Ok(saved)
    }

    pub async fn get_cached(&self, city_name: &str) -> Result<WeatherRecord, ApiError> {
        self.database
            .find_city_by_name(city_name)
            .await?
            .ok_or_else(|| ApiError::NotFound(CITY_NOT_FOUND.to_string()))
    }

    pub async fn update(
        &self,
        city_name: &str,
        record: &WeatherRecord,
    ) -> Result<WeatherRecord, ApiError> {
        self.database
            .update_city(city_name, record)
            .await?
            .ok_or_else(|| ApiError::NotFound(CITY_NOT_FOUND.to_string()))
    }

    /// Removes the record and returns what is left in the store.
    pub async fn delete(&self, city_name: &str) -> Result<Vec<WeatherRecord>, ApiError> {
        if !self.database.delete_city_by_name(city_name).await? {
            return Err(ApiError::NotFound(CITY_NOT_FOUND.to_string()));
        }
        tracing::info!("Deleted weather for {}", city_name);
        self.list().await
    }

    pub async fn forecast(&self, city_name: &str) -> Result<serde_json::Value, ApiError> {
        Ok(self.provider.forecast_by_name(city_name).await?)
    }

    pub async fn city_names(&self) -> Result<Vec<String>, ApiError> {
        Ok(self.provider.city_names().await?)
    }
}
