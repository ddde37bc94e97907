//! Browser UI in front of the Dividend ML API.

use anyhow::{Context, Result};
use dividend_ml::config::UiConfig;
use dividend_ml::ui::{self, ApiClient};
use dividend_ml::telemetry;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config = UiConfig::from_env().map_err(anyhow::Error::msg)?;

    telemetry::init_tracing(
        &telemetry::default_directives(&config.log_level),
        config.log_format,
    );

    let api = ApiClient::new(&config.api_base_url).context("building API client")?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    info!("UI listening on {} (API at {})", addr, config.api_base_url);

    axum::serve(listener, ui::router(api))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
        .context("UI server")?;

    Ok(())
}
