use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    accounts::AccountService,
    database::Database,
    error::{ApiError, Strict},
    models::WeatherRecord,
    utils::{check_body, validate_coordinates},
    weather::WeatherService,
};

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub database: Arc<Database>,
    pub weather: Arc<WeatherService>,
    pub accounts: Arc<AccountService>,
}

// Request/Response types
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCityRequest {
    pub username: Option<String>,
    pub city_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityNameRequest {
    pub city_name: Option<String>,
}

/// A coordinate sent either as a JSON number or as a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Coordinate {
    Number(f64),
    Text(String),
}

impl Coordinate {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Coordinate::Number(value) => Some(*value),
            Coordinate::Text(text) => text.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    pub lat: Option<Coordinate>,
    pub lon: Option<Coordinate>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub result: bool,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub result: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct WeatherListResponse {
    pub weather: Vec<WeatherRecord>,
}

#[derive(Debug, Serialize)]
pub struct WeatherResponse<T> {
    pub result: bool,
    pub weather: T,
}

#[derive(Debug, Serialize)]
pub struct CitiesResponse {
    pub result: bool,
    pub cities: Vec<String>,
}

fn weather<T>(weather: T) -> Json<WeatherResponse<T>> {
    Json(WeatherResponse {
        result: true,
        weather,
    })
}

/// Unwraps a JSON body, treating anything unparseable as missing fields.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            tracing::debug!("Rejected request body: {}", rejection);
            Err(ApiError::missing_fields())
        }
    }
}

/// Returns both credentials once `check_body` has confirmed they are present.
fn credentials(request: CredentialsRequest) -> Result<(String, String), ApiError> {
    if !check_body(&[request.username.as_deref(), request.password.as_deref()]) {
        return Err(ApiError::missing_fields());
    }
    match (request.username, request.password) {
        (Some(username), Some(password)) => Ok((username, password)),
        _ => Err(ApiError::missing_fields()),
    }
}

// Route handlers
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = match state.database.health_check().await {
        Ok(()) => "healthy",
        Err(e) => {
            tracing::error!("Database health check failed: {}", e);
            "degraded"
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let (username, password) = credentials(body(payload)?)?;
    let token = state.accounts.signup(&username, &password).await?;

    Ok(Json(TokenResponse { result: true, token }))
}

pub async fn signin(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let (username, password) = credentials(body(payload)?)?;
    let token = state.accounts.signin(&username, &password).await?;

    Ok(Json(TokenResponse { result: true, token }))
}

pub async fn add_city(
    State(state): State<AppState>,
    payload: Result<Json<AddCityRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let request = body(payload)?;
    let (Some(username), Some(city_name)) = (request.username, request.city_name) else {
        return Err(ApiError::missing_fields());
    };
    if !check_body(&[Some(username.as_str()), Some(city_name.as_str())]) {
        return Err(ApiError::missing_fields());
    }

    state.accounts.add_city(&username, &city_name).await?;

    Ok(Json(MessageResponse {
        result: true,
        message: "City added successfully".to_string(),
    }))
}

pub async fn list_weather(
    State(state): State<AppState>,
) -> Result<Json<WeatherListResponse>, ApiError> {
    let weather = state.weather.list().await?;
    Ok(Json(WeatherListResponse { weather }))
}

pub async fn add_current_weather(
    State(state): State<AppState>,
    payload: Result<Json<CityNameRequest>, JsonRejection>,
) -> Result<Json<WeatherResponse<WeatherRecord>>, ApiError> {
    let request = body(payload)?;
    let city_name = match request.city_name {
        Some(name) if check_body(&[Some(name.as_str())]) => name,
        _ => return Err(ApiError::missing_fields()),
    };

    let record = state.weather.add_current_by_name(city_name.trim()).await?;
    Ok(weather(record))
}

pub async fn add_location_weather(
    State(state): State<AppState>,
    payload: Result<Json<LocationRequest>, JsonRejection>,
) -> Result<Json<WeatherResponse<WeatherRecord>>, Strict> {
    let request = body(payload)?;
    let lat = request.lat.as_ref().and_then(Coordinate::as_f64);
    let lon = request.lon.as_ref().and_then(Coordinate::as_f64);
    let (Some(lat), Some(lon)) = (lat, lon) else {
        return Err(ApiError::missing_fields().into());
    };
    validate_coordinates(lat, lon).map_err(ApiError::Validation)?;

    let record = state.weather.add_current_by_coords(lat, lon).await?;
    Ok(weather(record))
}

pub async fn get_forecast(
    State(state): State<AppState>,
    Path(city_name): Path<String>,
) -> Result<Json<WeatherResponse<serde_json::Value>>, ApiError> {
    let forecast = state.weather.forecast(&city_name).await?;
    Ok(weather(forecast))
}

pub async fn get_city(
    State(state): State<AppState>,
    Path(city_name): Path<String>,
) -> Result<Json<WeatherResponse<WeatherRecord>>, ApiError> {
    let record = state.weather.get_cached(&city_name).await?;
    Ok(weather(record))
}

pub async fn delete_city(
    State(state): State<AppState>,
    Path(city_name): Path<String>,
) -> Result<Json<WeatherResponse<Vec<WeatherRecord>>>, ApiError> {
    let remaining = state.weather.delete(&city_name).await?;
    Ok(weather(remaining))
}

pub async fn update_city(
    State(state): State<AppState>,
    Path(city_name): Path<String>,
    payload: Result<Json<WeatherRecord>, JsonRejection>,
) -> Result<Json<WeatherResponse<WeatherRecord>>, ApiError> {
    let record = body(payload)?;
    if !check_body(&[Some(record.city_name.as_str())]) {
        return Err(ApiError::missing_fields());
    }

    let updated = state.weather.update(&city_name, &record).await?;
    Ok(weather(updated))
}

pub async fn city_autocomplete(
    State(state): State<AppState>,
) -> Result<Json<CitiesResponse>, Strict> {
    let cities = state.weather.city_names().await?;
    Ok(Json(CitiesResponse {
        result: true,
        cities,
    }))
}

// Create the router
pub fn create_router(state: AppState) -> Router {
    let users = Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/addCity", post(add_city));

    Router::new()
        .route("/health", get(health))
        .route("/weather", get(list_weather))
        // A stored city may itself be called "Current".
        .route(
            "/weather/current",
            post(add_current_weather)
                .get(get_city)
                .put(update_city)
                .delete(delete_city),
        )
        .route("/weather/current/location", post(add_location_weather))
        .route("/weather/forecast/:city_name", get(get_forecast))
        .route("/weather/cityautocomplete", get(city_autocomplete))
        .route(
            "/weather/:city_name",
            get(get_city).put(update_city).delete(delete_city),
        )
        .nest("/users", users.clone())
        .merge(users)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::tests::sample_record;
    use crate::provider::mock::MockWeatherProvider;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app_with(provider: MockWeatherProvider) -> (Router, Arc<Database>, Arc<MockWeatherProvider>) {
        let database = Arc::new(Database::in_memory().await);
        let provider = Arc::new(provider);
        let state = AppState {
            database: database.clone(),
            weather: Arc::new(WeatherService::new(database.clone(), provider.clone())),
            accounts: Arc::new(AccountService::new(database.clone())),
        };
        (create_router(state), database, provider)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn lyon() -> WeatherRecord {
        let mut record = sample_record("Lyon");
        record.condition.main = "Clouds".to_string();
        record.measurements.temp = 15.2;
        record
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _, _) = app_with(MockWeatherProvider::new()).await;

        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_signup_and_signin() {
        let (app, _, _) = app_with(MockWeatherProvider::new()).await;
        let credentials = json!({ "username": "alice", "password": "s3cret" });

        let (status, signup) = send(&app, "POST", "/users/signup", Some(credentials.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(signup["result"], true);
        let token = signup["token"].as_str().unwrap().to_string();

        let (_, signin) = send(&app, "POST", "/signin", Some(credentials.clone())).await;
        assert_eq!(signin, json!({ "result": true, "token": token }));

        let (status, dup) = send(&app, "POST", "/signup", Some(credentials)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(dup, json!({ "result": false, "error": "User already exists" }));
    }

    #[tokio::test]
    async fn test_signin_wrong_password() {
        let (app, _, _) = app_with(MockWeatherProvider::new()).await;
        send(&app, "POST", "/signup", Some(json!({ "username": "bob", "password": "pw" }))).await;

        let (_, body) = send(
            &app,
            "POST",
            "/signin",
            Some(json!({ "username": "bob", "password": "wrong" })),
        )
        .await;
        assert_eq!(
            body,
            json!({ "result": false, "error": "User not found or wrong password" })
        );
    }

    #[tokio::test]
    async fn test_missing_or_malformed_fields() {
        let (app, _, provider) = app_with(MockWeatherProvider::new()).await;
        let expected = json!({ "result": false, "error": "Missing or empty fields" });

        let (status, body) =
            send(&app, "POST", "/signup", Some(json!({ "username": "alice" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, expected);

        let (_, body) = send(
            &app,
            "POST",
            "/signin",
            Some(json!({ "username": "", "password": "pw" })),
        )
        .await;
        assert_eq!(body, expected);

        let (_, body) = send(&app, "POST", "/weather/current", None).await;
        assert_eq!(body, expected);

        let (_, body) = send(&app, "POST", "/weather/current", Some(json!({ "cityName": " " }))).await;
        assert_eq!(body, expected);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_add_city_twice() {
        let (app, database, _) = app_with(MockWeatherProvider::new()).await;
        send(&app, "POST", "/signup", Some(json!({ "username": "carol", "password": "pw" }))).await;
        let request = json!({ "username": "carol", "cityName": "Paris" });

        let (_, first) = send(&app, "POST", "/users/addCity", Some(request.clone())).await;
        assert_eq!(
            first,
            json!({ "result": true, "message": "City added successfully" })
        );

        let (_, second) = send(&app, "POST", "/addCity", Some(request)).await;
        assert_eq!(second, json!({ "result": false, "error": "City already in list" }));

        let user = database.find_user_by_username("carol").await.unwrap().unwrap();
        assert_eq!(user.saved_cities, vec!["Paris"]);
    }

    #[tokio::test]
    async fn test_add_city_unknown_user() {
        let (app, _, _) = app_with(MockWeatherProvider::new()).await;

        let (_, body) = send(
            &app,
            "POST",
            "/addCity",
            Some(json!({ "username": "ghost", "cityName": "Paris" })),
        )
        .await;
        assert_eq!(body, json!({ "result": false, "error": "User not found" }));
    }

    #[tokio::test]
    async fn test_current_weather_cache_or_fetch() {
        let (app, database, provider) = app_with(MockWeatherProvider::new().with_city(lyon())).await;

        let (status, body) =
            send(&app, "POST", "/weather/current", Some(json!({ "cityName": "Lyon" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], true);
        assert_eq!(body["weather"]["cityName"], "Lyon");
        assert_eq!(body["weather"]["measurements"]["temp"], 15.2);
        assert_eq!(body["weather"]["condition"]["main"], "Clouds");
        assert_eq!(body["weather"]["measurements"]["rain1h"], 0.0);

        let (_, again) =
            send(&app, "POST", "/weather/current", Some(json!({ "cityName": "LYON" }))).await;
        assert_eq!(again, json!({ "result": false, "error": "City already saved" }));
        assert_eq!(provider.calls(), 1);
        assert_eq!(database.count_cities().await.unwrap(), 1);

        let (_, list) = send(&app, "GET", "/weather", None).await;
        assert_eq!(list["weather"].as_array().unwrap().len(), 1);
        assert!(list.get("result").is_none());
    }

    #[tokio::test]
    async fn test_current_weather_unknown_city() {
        let (app, _, _) = app_with(MockWeatherProvider::new()).await;

        let (status, body) =
            send(&app, "POST", "/weather/current", Some(json!({ "cityName": "Atlantis" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "result": false, "error": "city not found" }));
    }

    #[tokio::test]
    async fn test_location_weather() {
        let (app, _, _) = app_with(MockWeatherProvider::new().with_coords_result(lyon())).await;
        let request = json!({ "lat": 45.75, "lon": 4.85 });

        let (status, body) =
            send(&app, "POST", "/weather/current/location", Some(request.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["weather"]["cityName"], "Lyon");

        let (status, body) = send(&app, "POST", "/weather/current/location", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], "City already saved");
    }

    #[tokio::test]
    async fn test_location_weather_validation_and_failure() {
        let (app, _, provider) = app_with(MockWeatherProvider::new().broken()).await;

        let (status, body) = send(
            &app,
            "POST",
            "/weather/current/location",
            Some(json!({ "lat": 123.0, "lon": 4.85 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], false);
        assert_eq!(provider.calls(), 0);

        let (status, body) = send(
            &app,
            "POST",
            "/weather/current/location",
            Some(json!({ "lat": 45.75, "lon": 4.85 })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "result": false, "error": "Internal Server Error" }));
    }

    #[tokio::test]
    async fn test_location_accepts_numeric_strings() {
        let (app, _, provider) =
            app_with(MockWeatherProvider::new().with_coords_result(lyon())).await;

        let (_, body) = send(
            &app,
            "POST",
            "/weather/current/location",
            Some(json!({ "lat": "45.75", "lon": " 4.85 " })),
        )
        .await;
        assert_eq!(body["result"], true);
        assert_eq!(body["weather"]["cityName"], "Lyon");

        let (status, body) = send(
            &app,
            "POST",
            "/weather/current/location",
            Some(json!({ "lat": "north", "lon": 4.85 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "result": false, "error": "Missing or empty fields" }));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_upstream_rejection_is_bad_gateway() {
        let (app, database, _) = app_with(MockWeatherProvider::new()).await;

        let (status, body) = send(
            &app,
            "POST",
            "/weather/current/location",
            Some(json!({ "lat": 0.0, "lon": -30.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, json!({ "result": false, "error": "wrong latitude" }));
        assert_eq!(database.count_cities().await.unwrap(), 0);

        let (app, _, _) =
            app_with(MockWeatherProvider::new().rejecting("countries service unavailable")).await;
        let (status, body) = send(&app, "GET", "/weather/cityautocomplete", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(
            body,
            json!({ "result": false, "error": "countries service unavailable" })
        );
    }

    #[tokio::test]
    async fn test_city_named_current() {
        let (app, database, _) = app_with(MockWeatherProvider::new()).await;
        database.insert_city(&sample_record("Current")).await.unwrap();

        let (status, body) = send(&app, "GET", "/weather/current", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["weather"]["cityName"], "Current");

        let mut replacement = serde_json::to_value(sample_record("Current")).unwrap();
        replacement["measurements"]["temp"] = json!(12.0);
        let (_, body) = send(&app, "PUT", "/weather/current", Some(replacement)).await;
        assert_eq!(body["weather"]["measurements"]["temp"], 12.0);

        let (_, body) = send(&app, "DELETE", "/weather/current", None).await;
        assert_eq!(body, json!({ "result": true, "weather": [] }));
    }

    #[tokio::test]
    async fn test_get_update_delete_city() {
        let (app, database, _) = app_with(MockWeatherProvider::new()).await;
        database.insert_city(&sample_record("New York")).await.unwrap();
        database.insert_city(&sample_record("Lima")).await.unwrap();

        let (_, body) = send(&app, "GET", "/weather/new%20york", None).await;
        assert_eq!(body["result"], true);
        assert_eq!(body["weather"]["cityName"], "New York");

        let mut replacement = serde_json::to_value(sample_record("New York")).unwrap();
        replacement["measurements"]["temp"] = json!(30.5);
        let (_, body) = send(&app, "PUT", "/weather/New%20York", Some(replacement)).await;
        assert_eq!(body["weather"]["measurements"]["temp"], 30.5);

        let (_, body) = send(&app, "DELETE", "/weather/NEW%20YORK", None).await;
        assert_eq!(body["result"], true);
        assert_eq!(body["weather"].as_array().unwrap().len(), 1);
        assert_eq!(body["weather"][0]["cityName"], "Lima");

        let (_, body) = send(&app, "GET", "/weather/New%20York", None).await;
        assert_eq!(body, json!({ "result": false, "error": "City not found" }));
    }

    #[tokio::test]
    async fn test_delete_missing_city() {
        let (app, database, _) = app_with(MockWeatherProvider::new()).await;
        database.insert_city(&sample_record("Lima")).await.unwrap();

        let (status, body) = send(&app, "DELETE", "/weather/Paris", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "result": false, "error": "City not found" }));
        assert_eq!(database.count_cities().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_with_incomplete_body() {
        let (app, database, _) = app_with(MockWeatherProvider::new()).await;
        database.insert_city(&sample_record("Lima")).await.unwrap();

        let (_, body) = send(&app, "PUT", "/weather/Lima", Some(json!({ "cityName": "Lima" }))).await;
        assert_eq!(body, json!({ "result": false, "error": "Missing or empty fields" }));
    }

    #[tokio::test]
    async fn test_forecast() {
        let forecast = json!({ "cod": "200", "cnt": 0, "list": [] });
        let (app, _, _) = app_with(MockWeatherProvider::new().with_forecast(forecast.clone())).await;

        let (_, body) = send(&app, "GET", "/weather/forecast/Oslo", None).await;
        assert_eq!(body, json!({ "result": true, "weather": forecast }));

        let (app, _, _) = app_with(MockWeatherProvider::new()).await;
        let (status, body) = send(&app, "GET", "/weather/forecast/Atlantis", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "result": false, "error": "city not found" }));
    }

    #[tokio::test]
    async fn test_city_autocomplete() {
        let (app, _, _) =
            app_with(MockWeatherProvider::new().with_city_names(&["Oslo", "Bergen", "Oslo"])).await;

        let (status, body) = send(&app, "GET", "/weather/cityautocomplete", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "result": true, "cities": ["Oslo", "Bergen", "Oslo"] }));

        let (app, _, _) = app_with(MockWeatherProvider::new().broken()).await;
        let (status, body) = send(&app, "GET", "/weather/cityautocomplete", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["result"], false);
    }
}
