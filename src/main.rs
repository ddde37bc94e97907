//! Dividend ML API
//!
//! Serving process: prediction, on-demand retraining, fit metrics, health,
//! the ticker registry and a peek at the latest fundamentals rows.

use dividend_ml::config::AppConfig;
use dividend_ml::database::{create_pool, run_migrations};
use dividend_ml::error::{AppError, AppResult};
use dividend_ml::ml::ModelStore;
use dividend_ml::{api, telemetry, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    telemetry::init_tracing(
        &telemetry::default_directives(&config.log_level),
        config.log_format,
    );

    info!("Dividend ML API starting");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);
    info!("HTTP port: {}", config.http_port);

    // =========================================================================
    // DATABASE SETUP
    // =========================================================================
    info!("Connecting to database...");

    let pool = create_pool(&config.database).await.map_err(|e| {
        error!("Failed to create database pool: {}", e);
        AppError::Database(e)
    })?;

    info!("Max connections: {}", config.database.max_connections);

    info!("Running database migrations...");
    run_migrations(&pool, Some(config.database.migrations_path.as_str()))
        .await
        .map_err(|e| {
            error!("Database migration failed: {}", e);
            AppError::Database(e)
        })?;

    info!("Database migrations completed successfully");

    // =========================================================================
    // MODEL
    // =========================================================================
    let store = ModelStore::from_config(&config.model);
    let app_state = Arc::new(AppState::new(pool, store));

    match app_state.training.load_persisted().await {
        Ok(true) => info!("✓ Serving persisted model"),
        Ok(false) => info!(
            "No model artifact at {}; starting untrained",
            config.model.model_path.display()
        ),
        Err(e) => warn!("Could not load persisted model, starting untrained: {}", e),
    }

    // =========================================================================
    // HTTP SERVER
    // =========================================================================
    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port)
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid HTTP address: {}", e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Message(format!("Failed to bind HTTP server: {}", e)))?;

    info!("✓ Listening on {}", addr);
    info!("Press Ctrl+C to shutdown gracefully");

    axum::serve(listener, api::router(app_state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received, shutting down gracefully...");
        })
        .await?;

    info!("Dividend ML API shutdown complete");
    Ok(())
}
