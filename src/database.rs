use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Astronomical, Condition, Location, Measurements, UserAccount, WeatherRecord};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("{0}")]
    Duplicate(String),
}

const CITY_COLUMNS: &str = "city_name, main, description, icon, temp, feels_like, temp_min, \
    temp_max, humidity, wind_speed, cloud_cover, rain_1h, snow_1h, sunrise, sunset, latitude, longitude";

#[derive(Debug, sqlx::FromRow)]
struct CityRow {
    city_name: String,
    main: String,
    description: String,
    icon: String,
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    humidity: f64,
    wind_speed: f64,
    cloud_cover: f64,
    rain_1h: f64,
    snow_1h: f64,
    sunrise: i64,
    sunset: i64,
    latitude: f64,
    longitude: f64,
}

impl From<CityRow> for WeatherRecord {
    fn from(row: CityRow) -> Self {
        WeatherRecord {
            city_name: row.city_name,
            condition: Condition {
                main: row.main,
                description: row.description,
                icon: row.icon,
            },
            measurements: Measurements {
                temp: row.temp,
                feels_like: row.feels_like,
                temp_min: row.temp_min,
                temp_max: row.temp_max,
                humidity: row.humidity,
                wind_speed: row.wind_speed,
                cloud_cover: row.cloud_cover,
                rain_1h: row.rain_1h,
                snow_1h: row.snow_1h,
            },
            astronomical: Astronomical {
                sunrise: row.sunrise,
                sunset: row.sunset,
            },
            location: Location {
                latitude: row.latitude,
                longitude: row.longitude,
            },
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    password_hash: String,
    token: String,
}

/// Lookup key for a city name. SQLite's NOCASE only folds ASCII, so the key is
/// folded here with full Unicode lowercasing.
fn city_key(name: &str) -> String {
    name.to_lowercase()
}

/// Maps a unique-constraint failure onto `Duplicate`, leaving other errors untouched.
fn duplicate_or(err: sqlx::Error, message: &str) -> DatabaseError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            DatabaseError::Duplicate(message.to_string())
        }
        _ => DatabaseError::Query(err),
    }
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, DatabaseError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `sqlite::memory:` opens its own empty database.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool))
    }

    #[cfg(test)]
    pub async fn in_memory() -> Self {
        let database = Self::connect("sqlite::memory:")
            .await
            .expect("in-memory database");
        database.init_tables().await.expect("schema");
        database
    }

    pub async fn init_tables(&self) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                city_name TEXT NOT NULL,
                city_key TEXT NOT NULL,
                main TEXT NOT NULL,
                description TEXT NOT NULL,
                icon TEXT NOT NULL,
                temp REAL NOT NULL,
                feels_like REAL NOT NULL,
                temp_min REAL NOT NULL,
                temp_max REAL NOT NULL,
                humidity REAL NOT NULL,
                wind_speed REAL NOT NULL,
                cloud_cover REAL NOT NULL,
                rain_1h REAL NOT NULL DEFAULT 0,
                snow_1h REAL NOT NULL DEFAULT 0,
                sunrise INTEGER NOT NULL,
                sunset INTEGER NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // One record per city regardless of case; closes the check-then-insert race.
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_cities_key ON cities(city_key)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                token TEXT NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_cities (
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                city_name TEXT NOT NULL,
                UNIQUE (user_id, city_name)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // Weather records

    pub async fn find_city_by_name(&self, name: &str) -> Result<Option<WeatherRecord>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM cities WHERE city_key = $1",
            CITY_COLUMNS
        );
        let row = sqlx::query_as::<_, CityRow>(&sql)
            .bind(city_key(name))
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(WeatherRecord::from))
    }

    pub async fn list_cities(&self) -> Result<Vec<WeatherRecord>, DatabaseError> {
        let sql = format!("SELECT {} FROM cities ORDER BY id", CITY_COLUMNS);
        let rows = sqlx::query_as::<_, CityRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(WeatherRecord::from).collect())
    }

    #[cfg(test)]
    pub async fn count_cities(&self) -> Result<i64, DatabaseError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cities")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn insert_city(&self, record: &WeatherRecord) -> Result<WeatherRecord, DatabaseError> {
        let now = chrono::Utc::now();
        let sql = format!(
            r#"
            INSERT INTO cities (
                city_name, main, description, icon, temp, feels_like, temp_min, temp_max,
                humidity, wind_speed, cloud_cover, rain_1h, snow_1h, sunrise, sunset,
                latitude, longitude, created_at, updated_at, city_key
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            RETURNING {}
            "#,
            CITY_COLUMNS
        );

        let row = sqlx::query_as::<_, CityRow>(&sql)
            .bind(&record.city_name)
            .bind(&record.condition.main)
            .bind(&record.condition.description)
            .bind(&record.condition.icon)
            .bind(record.measurements.temp)
            .bind(record.measurements.feels_like)
            .bind(record.measurements.temp_min)
            .bind(record.measurements.temp_max)
            .bind(record.measurements.humidity)
            .bind(record.measurements.wind_speed)
            .bind(record.measurements.cloud_cover)
            .bind(record.measurements.rain_1h)
            .bind(record.measurements.snow_1h)
            .bind(record.astronomical.sunrise)
            .bind(record.astronomical.sunset)
            .bind(record.location.latitude)
            .bind(record.location.longitude)
            .bind(now)
            .bind(now)
            .bind(city_key(&record.city_name))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| duplicate_or(e, "City already saved"))?;

        Ok(row.into())
    }

    /// Overwrites every field of the record matching `name`, including the name itself.
    pub async fn update_city(
        &self,
        name: &str,
        record: &WeatherRecord,
    ) -> Result<Option<WeatherRecord>, DatabaseError> {
        let now = chrono::Utc::now();
        let sql = format!(
            r#"
            UPDATE cities SET
                city_name = $2,
                main = $3,
                description = $4,
                icon = $5,
                temp = $6,
                feels_like = $7,
                temp_min = $8,
                temp_max = $9,
                humidity = $10,
                wind_speed = $11,
                cloud_cover = $12,
                rain_1h = $13,
                snow_1h = $14,
                sunrise = $15,
                sunset = $16,
                latitude = $17,
                longitude = $18,
                updated_at = $19,
                city_key = $20
            WHERE city_key = $1
            RETURNING {}
            "#,
            CITY_COLUMNS
        );

        let row = sqlx::query_as::<_, CityRow>(&sql)
            .bind(city_key(name))
            .bind(&record.city_name)
            .bind(&record.condition.main)
            .bind(&record.condition.description)
            .bind(&record.condition.icon)
            .bind(record.measurements.temp)
            .bind(record.measurements.feels_like)
            .bind(record.measurements.temp_min)
            .bind(record.measurements.temp_max)
            .bind(record.measurements.humidity)
            .bind(record.measurements.wind_speed)
            .bind(record.measurements.cloud_cover)
            .bind(record.measurements.rain_1h)
            .bind(record.measurements.snow_1h)
            .bind(record.astronomical.sunrise)
            .bind(record.astronomical.sunset)
            .bind(record.location.latitude)
            .bind(record.location.longitude)
            .bind(now)
            .bind(city_key(&record.city_name))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| duplicate_or(e, "City already saved"))?;

        Ok(row.map(WeatherRecord::from))
    }

    pub async fn delete_city_by_name(&self, name: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM cities WHERE city_key = $1")
            .bind(city_key(name))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // Users

    pub async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserAccount>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password_hash, token FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let saved_cities = self.saved_cities(&row.id).await?;

        Ok(Some(UserAccount {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            token: row.token,
            saved_cities,
        }))
    }

    pub async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        token: &str,
    ) -> Result<UserAccount, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now();

        sqlx::query(
            "INSERT INTO users (id, username, password_hash, token, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&id)
        .bind(username)
        .bind(password_hash)
        .bind(token)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_or(e, "User already exists"))?;

        Ok(UserAccount {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            token: token.to_string(),
            saved_cities: Vec::new(),
        })
    }

    pub async fn saved_cities(&self, user_id: &str) -> Result<Vec<String>, DatabaseError> {
        let cities: Vec<String> = sqlx::query_scalar(
            "SELECT city_name FROM user_cities WHERE user_id = $1 ORDER BY position",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(cities)
    }

    /// Appends `city_name` to the end of the user's list. Exact-string duplicates are rejected.
    pub async fn add_saved_city(&self, user_id: &str, city_name: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO user_cities (user_id, position, city_name)
            SELECT $1, COALESCE(MAX(position), -1) + 1, $2
            FROM user_cities WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(city_name)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_or(e, "City already in list"))?;

        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
