//! Ingestion batch job: pull quarterly bars for every registered ticker into
//! the fundamentals table. Safe to re-run; existing (ticker, date) rows are
//! skipped.

use anyhow::{Context, Result};
use dividend_ml::config::{AppConfig, IngestConfig};
use dividend_ml::database::{create_pool, run_migrations};
use dividend_ml::repositories::{CompanyRepository, FundamentalRepository};
use dividend_ml::services::IngestionPipeline;
use dividend_ml::{providers, telemetry};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().map_err(anyhow::Error::msg)?;
    let ingest = IngestConfig::from_env().map_err(anyhow::Error::msg)?;

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

    let provider = providers::from_config(&ingest).context("building market data provider")?;
    info!(
        "Provider: {}, start strategy: {}, epoch: {}",
        provider.name(),
        ingest.start_strategy.as_str(),
        ingest.epoch
    );

    let pipeline = IngestionPipeline::new(
        Arc::new(CompanyRepository::new(pool.clone())),
        Arc::new(FundamentalRepository::new(pool)),
        provider,
        ingest,
    );

    let summary = pipeline.run().await.context("ingestion run")?;

    for (ticker, reason) in &summary.failed_tickers {
        warn!("{} skipped: {}", ticker, reason);
    }
    info!(
        "Done: {} tickers ({} up to date), {} rows inserted, {} duplicates, {} rejected",
        summary.tickers_processed,
        summary.tickers_up_to_date,
        summary.rows_inserted,
        summary.rows_skipped,
        summary.rows_rejected
    );

    Ok(())
}
