use crate::error::{AppError, AppResult, RepositoryError};
use crate::models::{normalize_ticker, Company};
use crate::repositories::CompanyRepository;
use std::sync::Arc;
use tracing::info;

/// Service for the ticker registry
pub struct RegistryService {
    company_repo: Arc<CompanyRepository>,
}

impl RegistryService {
    pub fn new(company_repo: Arc<CompanyRepository>) -> Self {
        Self { company_repo }
    }

    /// Register a ticker; the ticker is trimmed and uppercased first
    pub async fn add(&self, ticker: &str, name: &str) -> AppResult<Company> {
        let ticker = normalize_ticker(ticker);
        let name = name.trim();

        if ticker.is_empty() {
            return Err(AppError::Validation("Ticker must not be empty.".into()));
        }
        if name.is_empty() {
            return Err(AppError::Validation("Company name must not be empty.".into()));
        }

        match self.company_repo.create(&ticker, name).await {
            Ok(company) => {
                info!("Registered {} ({})", company.ticker, company.name);
                Ok(company)
            }
            Err(RepositoryError::Duplicate(_)) => Err(AppError::Conflict(format!(
                "Ticker {} already exists.",
                ticker
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// All registered companies, ordered by ticker
    pub async fn list(&self) -> AppResult<Vec<Company>> {
        Ok(self.company_repo.list().await?)
    }

    /// Remove a ticker; its fundamentals rows are kept
    pub async fn delete(&self, ticker: &str) -> AppResult<()> {
        let ticker = normalize_ticker(ticker);

        if !self.company_repo.delete(&ticker).await? {
            return Err(AppError::NotFound(format!("Ticker {} not found.", ticker)));
        }

        info!("Removed {}", ticker);
        Ok(())
    }
}
