//! Dividend ML library
//!
//! Quarterly equity fundamentals ingestion, a ticker registry, and a
//! closing-price regression served over HTTP. The binaries in `src/bin` and
//! `src/main.rs` are thin wrappers over the components exposed here.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod ml;
pub mod models;
pub mod providers;
pub mod repositories;
pub mod services;
pub mod telemetry;
pub mod ui;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use database::Database;
use ml::ModelStore;
use repositories::{CompanyRepository, FundamentalRepository};
use services::{ModelHandle, RegistryService, TrainingService};
use std::sync::Arc;

/// Application state shared by the API handlers
pub struct AppState {
    pub database: Database,
    pub fundamental_repo: Arc<FundamentalRepository>,
    pub registry: RegistryService,
    pub training: TrainingService,
}

impl AppState {
    /// Create a new AppState with initialized repositories and services
    pub fn new(pool: sqlx::PgPool, store: ModelStore) -> Self {
        let database = Database::new(pool.clone());
        let company_repo = Arc::new(CompanyRepository::new(pool.clone()));
        let fundamental_repo = Arc::new(FundamentalRepository::new(pool));

        Self {
            database,
            registry: RegistryService::new(company_repo),
            training: TrainingService::new(fundamental_repo.clone(), store, ModelHandle::new()),
            fundamental_repo,
        }
    }
}
