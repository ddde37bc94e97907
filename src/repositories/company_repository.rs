use crate::error::RepositoryError;
use crate::models::Company;
use sqlx::{PgPool, Result as SqlxResult};

/// Repository for the ticker registry
#[derive(Clone)]
pub struct CompanyRepository {
    pool: PgPool,
}

impl CompanyRepository {
    /// Create a new CompanyRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new company.
    ///
    /// The ticker is expected in canonical (uppercased) form. A ticker that is
    /// already registered yields `RepositoryError::Duplicate`.
    pub async fn create(&self, ticker: &str, name: &str) -> Result<Company, RepositoryError> {
        let company = sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (ticker, name)
            VALUES ($1, $2)
            RETURNING ticker, name
            "#,
        )
        .bind(ticker)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(company)
    }

    /// Find a company by ticker
    pub async fn find_by_ticker(&self, ticker: &str) -> SqlxResult<Option<Company>> {
        sqlx::query_as::<_, Company>(
            r#"
            SELECT ticker, name
            FROM companies
            WHERE ticker = $1
            "#,
        )
        .bind(ticker)
        .fetch_optional(&self.pool)
        .await
    }

    /// List all registered companies
    pub async fn list(&self) -> SqlxResult<Vec<Company>> {
        sqlx::query_as::<_, Company>(
            r#"
            SELECT ticker, name
            FROM companies
            ORDER BY ticker
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Tickers of all registered companies
    pub async fn list_tickers(&self) -> SqlxResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT ticker
            FROM companies
            ORDER BY ticker
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Delete a company; returns false when no row matched
    pub async fn delete(&self, ticker: &str) -> SqlxResult<bool> {
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM companies
            WHERE ticker = $1
            "#,
        )
        .bind(ticker)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected > 0)
    }
}
