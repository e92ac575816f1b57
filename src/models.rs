use serde::{Deserialize, Serialize};

/// Stored weather snapshot for one city. `city_name` is unique ignoring ASCII case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherRecord {
    pub city_name: String,
    pub condition: Condition,
    pub measurements: Measurements,
    pub astronomical: Astronomical,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub main: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurements {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub cloud_cover: f64,
    #[serde(rename = "rain1h", default)]
    pub rain_1h: f64,
    #[serde(rename = "snow1h", default)]
    pub snow_1h: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Astronomical {
    pub sunrise: i64,
    pub sunset: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// A registered user. The password hash never leaves the server.
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub token: String,
    pub saved_cities: Vec<String>,
}
