//! Market data providers.
//!
//! A provider turns a ticker and a date range into a [`RawFrame`]: labelled
//! columns over a date index, exactly as the vendor shaped them. Cleaning the
//! frame into fundamentals rows is the ingestion pipeline's job, so providers
//! stay tolerant and never drop cells they do not understand.

pub mod csv_file;
pub mod yahoo;

pub use csv_file::CsvDirectoryProvider;
pub use yahoo::YahooProvider;

use crate::config::{IngestConfig, ProviderKind};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while fetching a ticker's frame
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider API error: {0}")]
    Api(String),

    #[error("failed to parse provider response: {0}")]
    Parse(String),

    #[error("no data returned for {0}")]
    Empty(String),

    #[error("no source for {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Transport(err.to_string())
    }
}

/// Row timestamp as delivered by the provider
#[derive(Debug, Clone, PartialEq)]
pub enum RawTimestamp {
    /// Unix seconds plus the exchange's UTC offset in seconds
    Epoch { seconds: i64, utc_offset: i64 },
    /// Textual date or datetime, e.g. "2024-01-01" or "2024-01-01 00:00:00-05:00"
    Text(String),
}

/// One labelled column. Multi-level labels list the top level first, e.g.
/// `["Close", "AAPL"]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub label: Vec<String>,
    pub values: Vec<Value>,
}

impl RawColumn {
    pub fn new(label: Vec<String>, values: Vec<Value>) -> Self {
        Self { label, values }
    }

    /// Single-level column
    pub fn single(label: &str, values: Vec<Value>) -> Self {
        Self::new(vec![label.to_string()], values)
    }

    /// Top-level label, the name that survives flattening
    pub fn top_label(&self) -> Option<&str> {
        self.label.first().map(|s| s.as_str())
    }

    /// Cell at row `index`; short columns read as null
    pub fn value(&self, index: usize) -> &Value {
        self.values.get(index).unwrap_or(&Value::Null)
    }
}

/// A provider response: labelled columns over a timestamp index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFrame {
    pub index: Vec<RawTimestamp>,
    pub columns: Vec<RawColumn>,
}

impl RawFrame {
    pub fn new(index: Vec<RawTimestamp>, columns: Vec<RawColumn>) -> Self {
        Self { index, columns }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Source of quarterly bars for the ingestion pipeline
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &str;

    /// Fetch bars for `ticker` between `start` and `end` inclusive
    async fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawFrame, ProviderError>;
}

/// Build the provider selected by the ingestion config
pub fn from_config(config: &IngestConfig) -> Result<Arc<dyn MarketDataProvider>, ProviderError> {
    match config.provider {
        ProviderKind::Yahoo => Ok(Arc::new(YahooProvider::new(
            &config.yahoo_base_url,
            &config.interval,
            config.request_timeout(),
        )?)),
        ProviderKind::Csv => Ok(Arc::new(CsvDirectoryProvider::new(config.csv_dir.clone()))),
    }
}

/// Parse a provider date cell into a bare calendar date.
///
/// Only the leading `YYYY-MM-DD` is read, so any time-of-day or offset suffix
/// is discarded.
pub fn parse_calendar_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    let head = text.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}
