//! Training batch job: refit the closing-price regression on the whole
//! fundamentals table and persist the artifact plus its metadata.

use anyhow::{Context, Result};
use dividend_ml::config::AppConfig;
use dividend_ml::database::{create_pool, run_migrations};
use dividend_ml::ml::ModelStore;
use dividend_ml::repositories::FundamentalRepository;
use dividend_ml::services::run_training_job;
use dividend_ml::telemetry;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().map_err(anyhow::Error::msg)?;

    telemetry::init_tracing(
        &telemetry::default_directives(&config.log_level),
        config.log_format,
    );

    let pool = create_pool(&config.database)
        .await
        .context("connecting to database")?;
    run_migrations(&pool, Some(config.database.migrations_path.as_str()))
        .await
        .context("running migrations")?;

    let store = ModelStore::from_config(&config.model);
    let repo = FundamentalRepository::new(pool);

    match run_training_job(&repo, &store).await.context("training")? {
        Some(report) => info!(
            "Model written to {} ({} rows, mse={:.6}, r2={:.6})",
            store.model_path().display(),
            report.rows_used,
            report.mse,
            report.r2
        ),
        None => info!(
            "Table empty; metadata at {} marked untrained",
            store.metadata_path().display()
        ),
    }

    Ok(())
}
