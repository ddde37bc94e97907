#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use dividend_ml::config::{IngestConfig, StartStrategy};
use dividend_ml::ml::ModelStore;
use dividend_ml::models::{Company, FundamentalRecord};
use dividend_ml::providers::{MarketDataProvider, ProviderError, RawColumn, RawFrame, RawTimestamp};
use dividend_ml::repositories::*;
use dividend_ml::services::IngestionPipeline;
use serde_json::{json, Value};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Test database handle with repositories
pub struct TestDatabase {
    pub pool: PgPool,
    pub company_repo: Arc<CompanyRepository>,
    pub fundamental_repo: Arc<FundamentalRepository>,
}

impl TestDatabase {
    /// Create TestDatabase from an existing pool (useful with sqlx::test)
    pub async fn from_pool(pool: PgPool) -> Self {
        Self {
            pool: pool.clone(),
            company_repo: Arc::new(CompanyRepository::new(pool.clone())),
            fundamental_repo: Arc::new(FundamentalRepository::new(pool)),
        }
    }

    /// Clean up all test data
    pub async fn cleanup(&self) {
        sqlx::query("TRUNCATE TABLE fundamentals, companies")
            .execute(&self.pool)
            .await
            .expect("Failed to cleanup test data");
    }

    pub async fn count_rows(&self) -> i64 {
        self.fundamental_repo
            .count()
            .await
            .expect("Failed to count fundamentals")
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Quarter-start date for the i-th quarter from 2015Q1
pub fn quarter_start(i: usize) -> NaiveDate {
    date(2015 + (i / 4) as i32, (i % 4) as u32 * 3 + 1, 1)
}

/// Helper function to register a company
pub async fn create_test_company(db: &TestDatabase, ticker: &str, name: &str) -> Company {
    db.company_repo
        .create(ticker, name)
        .await
        .expect("Failed to create test company")
}

/// A row whose close is exactly open + 1, with varied other inputs
pub fn linear_record(ticker: &str, i: usize) -> FundamentalRecord {
    let k = i as f64;
    let open = 10.0 + 1.7 * k + ((i * i) % 5) as f64;
    let high = open + (i % 3) as f64 + 0.5;
    let low = open - ((i * 7) % 4) as f64 - 0.25;
    let volume = 1_000 + 37 * (i * i) as i64 + 11 * (i % 6) as i64;
    FundamentalRecord::from_bar(ticker, quarter_start(i), open, high, low, open + 1.0, volume)
}

/// Insert `n` linear rows for `ticker`
pub async fn seed_linear_rows(db: &TestDatabase, ticker: &str, n: usize) {
    for i in 0..n {
        db.fundamental_repo
            .insert(&linear_record(ticker, i))
            .await
            .expect("Failed to insert fundamentals row");
    }
}

/// Temp directory holding a model store; keep the TempDir alive for the test
pub fn temp_store() -> (TempDir, ModelStore) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = ModelStore::new(dir.path().join("model.json"), dir.path().join("model_meta.json"));
    (dir, store)
}

/// Flat OHLCV frame with text dates: (date, open, close)
pub fn ohlcv_frame(rows: &[(&str, f64, f64)]) -> RawFrame {
    let index = rows
        .iter()
        .map(|(d, _, _)| RawTimestamp::Text(d.to_string()))
        .collect();
    let column = |f: &dyn Fn(f64, f64) -> Value| -> Vec<Value> {
        rows.iter().map(|(_, o, c)| f(*o, *c)).collect()
    };

    RawFrame::new(
        index,
        vec![
            RawColumn::single("Open", column(&|o, _| json!(o))),
            RawColumn::single("High", column(&|o, _| json!(o + 2.0))),
            RawColumn::single("Low", column(&|o, _| json!(o - 1.0))),
            RawColumn::single("Close", column(&|_, c| json!(c))),
            RawColumn::single("Volume", column(&|o, _| json!((o * 100.0) as i64))),
        ],
    )
}

/// One `fetch` call seen by the stub provider
#[derive(Debug, Clone, PartialEq)]
pub struct FetchCall {
    pub ticker: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// In-memory provider: canned frames or errors per ticker, and a call log
#[derive(Default)]
pub struct StubProvider {
    frames: Mutex<HashMap<String, RawFrame>>,
    failures: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<FetchCall>>,
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame(self, ticker: &str, frame: RawFrame) -> Self {
        self.frames.lock().unwrap().insert(ticker.to_string(), frame);
        self
    }

    pub fn with_failure(self, ticker: &str, message: &str) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(ticker.to_string(), message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_for(&self, ticker: &str) -> Option<FetchCall> {
        self.calls().into_iter().find(|c| c.ticker == ticker)
    }
}

#[async_trait]
impl MarketDataProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawFrame, ProviderError> {
        self.calls.lock().unwrap().push(FetchCall {
            ticker: ticker.to_string(),
            start,
            end,
        });

        if let Some(message) = self.failures.lock().unwrap().get(ticker) {
            return Err(ProviderError::Api(message.clone()));
        }

        self.frames
            .lock()
            .unwrap()
            .get(ticker)
            .cloned()
            .ok_or_else(|| ProviderError::Empty(ticker.to_string()))
    }
}

pub fn ingest_config(strategy: StartStrategy) -> IngestConfig {
    IngestConfig {
        start_strategy: strategy,
        ..IngestConfig::default()
    }
}

pub fn pipeline(
    db: &TestDatabase,
    provider: Arc<dyn MarketDataProvider>,
    strategy: StartStrategy,
) -> IngestionPipeline {
    IngestionPipeline::new(
        db.company_repo.clone(),
        db.fundamental_repo.clone(),
        provider,
        ingest_config(strategy),
    )
}
