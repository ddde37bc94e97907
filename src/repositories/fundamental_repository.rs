use crate::models::FundamentalRecord;
use chrono::NaiveDate;
use sqlx::{PgPool, Result as SqlxResult};
use std::collections::HashSet;

const RECORD_COLUMNS: &str =
    "ticker, period, date, open, high, low, close, volume, dividends, earnings";

/// Repository for the fundamentals store
#[derive(Clone)]
pub struct FundamentalRepository {
    pool: PgPool,
}

impl FundamentalRepository {
    /// Create a new FundamentalRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a record unless its (ticker, date) key already exists.
    ///
    /// Returns true when a row was written, false when the key was taken.
    pub async fn insert(&self, record: &FundamentalRecord) -> SqlxResult<bool> {
        let rows_affected = sqlx::query(
            r#"
            INSERT INTO fundamentals
                (ticker, period, date, open, high, low, close, volume, dividends, earnings)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (ticker, date) DO NOTHING
            "#,
        )
        .bind(&record.ticker)
        .bind(&record.period)
        .bind(record.date)
        .bind(record.open)
        .bind(record.high)
        .bind(record.low)
        .bind(record.close)
        .bind(record.volume)
        .bind(record.dividends)
        .bind(record.earnings)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected > 0)
    }

    /// All (ticker, date) keys currently stored
    pub async fn existing_keys(&self) -> SqlxResult<HashSet<(String, NaiveDate)>> {
        let rows = sqlx::query_as::<_, (String, NaiveDate)>(
            r#"
            SELECT ticker, date
            FROM fundamentals
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// Latest stored date across every ticker
    pub async fn latest_date(&self) -> SqlxResult<Option<NaiveDate>> {
        sqlx::query_scalar::<_, Option<NaiveDate>>("SELECT MAX(date) FROM fundamentals")
            .fetch_one(&self.pool)
            .await
    }

    /// Latest stored date for one ticker
    pub async fn latest_date_for(&self, ticker: &str) -> SqlxResult<Option<NaiveDate>> {
        sqlx::query_scalar::<_, Option<NaiveDate>>(
            "SELECT MAX(date) FROM fundamentals WHERE ticker = $1",
        )
        .bind(ticker)
        .fetch_one(&self.pool)
        .await
    }

    /// Every stored record; the training set
    pub async fn find_all(&self) -> SqlxResult<Vec<FundamentalRecord>> {
        sqlx::query_as::<_, FundamentalRecord>(&format!(
            "SELECT {} FROM fundamentals ORDER BY ticker, date",
            RECORD_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
    }

    /// Records for one ticker, oldest first
    pub async fn find_by_ticker(&self, ticker: &str) -> SqlxResult<Vec<FundamentalRecord>> {
        sqlx::query_as::<_, FundamentalRecord>(&format!(
            "SELECT {} FROM fundamentals WHERE ticker = $1 ORDER BY date",
            RECORD_COLUMNS
        ))
        .bind(ticker)
        .fetch_all(&self.pool)
        .await
    }

    /// Most recent records, newest date first
    pub async fn find_latest(&self, limit: i64) -> SqlxResult<Vec<FundamentalRecord>> {
        sqlx::query_as::<_, FundamentalRecord>(&format!(
            "SELECT {} FROM fundamentals ORDER BY date DESC, ticker LIMIT $1",
            RECORD_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Number of stored records
    pub async fn count(&self) -> SqlxResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM fundamentals")
            .fetch_one(&self.pool)
            .await
    }
}
