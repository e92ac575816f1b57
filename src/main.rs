use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod accounts;
mod auth;
mod config;
mod database;
mod error;
mod models;
mod provider;
mod routes;
mod utils;
mod weather;

use accounts::AccountService;
use config::Config;
use database::Database;
use provider::HttpWeatherProvider;
use routes::{create_router, AppState};
use weather::WeatherService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "city_weather_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database
    let database = Arc::new(Database::connect(&config.database_url).await?);
    database.init_tables().await?;

    // Initialize weather provider
    let provider = Arc::new(HttpWeatherProvider::new(&config)?);

    let state = AppState {
        database: database.clone(),
        weather: Arc::new(WeatherService::new(database.clone(), provider)),
        accounts: Arc::new(AccountService::new(database)),
    };

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server starting on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
