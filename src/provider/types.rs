use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ProviderError;
use crate::models::{Astronomical, Condition, Location, Measurements, WeatherRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentWeatherResponse {
    pub coord: CurrentCoord,
    pub weather: Vec<CurrentCondition>,
    pub main: CurrentMain,
    pub wind: CurrentWind,
    pub clouds: CurrentClouds,
    pub rain: Option<HashMap<String, f64>>,
    pub snow: Option<HashMap<String, f64>>,
    pub sys: CurrentSys,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentCoord {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentCondition {
    pub id: Option<i32>,
    pub main: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentMain {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub pressure: Option<f64>,
    pub humidity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentWind {
    pub speed: f64,
    pub deg: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentClouds {
    pub all: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentSys {
    pub country: Option<String>,
    pub sunrise: i64,
    pub sunset: i64,
}

/// Error body OpenWeather sends with non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenWeatherErrorBody {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountriesResponse {
    pub error: bool,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Vec<CountryCities>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryCities {
    pub country: String,
    #[serde(default)]
    pub cities: Vec<String>,
}

fn one_hour(volumes: &Option<HashMap<String, f64>>) -> f64 {
    volumes
        .as_ref()
        .and_then(|v| v.get("1h"))
        .copied()
        .unwrap_or(0.0)
}

impl CurrentWeatherResponse {
    pub fn into_record(self) -> Result<WeatherRecord, ProviderError> {
        let rain_1h = one_hour(&self.rain);
        let snow_1h = one_hour(&self.snow);

        let condition = self
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Api("Missing weather condition".to_string()))?;

        Ok(WeatherRecord {
            city_name: self.name,
            condition: Condition {
                main: condition.main,
                description: condition.description,
                icon: condition.icon,
            },
            measurements: Measurements {
                temp: self.main.temp,
                feels_like: self.main.feels_like,
                temp_min: self.main.temp_min,
                temp_max: self.main.temp_max,
                humidity: self.main.humidity,
                wind_speed: self.wind.speed,
                cloud_cover: self.clouds.all,
                rain_1h,
                snow_1h,
            },
            astronomical: Astronomical {
                sunrise: self.sys.sunrise,
                sunset: self.sys.sunset,
            },
            location: Location {
                latitude: self.coord.lat,
                longitude: self.coord.lon,
            },
        })
    }
}

impl CountriesResponse {
    pub fn into_city_names(self) -> Vec<String> {
        self.data.into_iter().flat_map(|c| c.cities).collect()
    }
}
