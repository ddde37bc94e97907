use crate::config::{IngestConfig, StartStrategy};
use crate::error::AppResult;
use crate::models::FundamentalRecord;
use crate::providers::{
    parse_calendar_date, MarketDataProvider, ProviderError, RawColumn, RawFrame, RawTimestamp,
};
use crate::repositories::{CompanyRepository, FundamentalRepository};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Frame-level normalization failures; these void the whole ticker
#[derive(Error, Debug, PartialEq)]
pub enum NormalizeError {
    #[error("missing required column: {0}")]
    MissingColumn(&'static str),
}

/// Why a single ticker was abandoned
#[derive(Error, Debug)]
enum TickerError {
    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("malformed frame: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionSummary {
    pub tickers_processed: usize,
    pub tickers_up_to_date: usize,
    /// (ticker, reason)
    pub failed_tickers: Vec<(String, String)>,
    pub rows_inserted: usize,
    /// Duplicates of an existing (ticker, date) key
    pub rows_skipped: usize,
    /// Rows voided by extraction or type coercion
    pub rows_rejected: usize,
}

/// Rows extracted from one frame
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub records: Vec<FundamentalRecord>,
    /// (row index, reason)
    pub rejected: Vec<(usize, String)>,
}

/// Pulls quarterly bars for every registered ticker into the fundamentals store
pub struct IngestionPipeline {
    company_repo: Arc<CompanyRepository>,
    fundamental_repo: Arc<FundamentalRepository>,
    provider: Arc<dyn MarketDataProvider>,
    config: IngestConfig,
}

impl IngestionPipeline {
    pub fn new(
        company_repo: Arc<CompanyRepository>,
        fundamental_repo: Arc<FundamentalRepository>,
        provider: Arc<dyn MarketDataProvider>,
        config: IngestConfig,
    ) -> Self {
        Self {
            company_repo,
            fundamental_repo,
            provider,
            config,
        }
    }

    /// Ingest everything up to today (UTC)
    pub async fn run(&self) -> AppResult<IngestionSummary> {
        self.run_until(Utc::now().date_naive()).await
    }

    /// Ingest everything up to and including `end`.
    ///
    /// Only failing to read the registry or the existing keys aborts the run;
    /// every per-ticker problem is logged and recorded in the summary.
    pub async fn run_until(&self, end: NaiveDate) -> AppResult<IngestionSummary> {
        let tickers = self.company_repo.list_tickers().await?;
        let mut keys = self.fundamental_repo.existing_keys().await?;
        let global_latest = match self.config.start_strategy {
            StartStrategy::Global => self.fundamental_repo.latest_date().await?,
            _ => None,
        };

        info!(
            "Ingesting {} tickers via {} ({} existing rows, strategy {})",
            tickers.len(),
            self.provider.name(),
            keys.len(),
            self.config.start_strategy.as_str()
        );

        let mut summary = IngestionSummary::default();

        for ticker in &tickers {
            summary.tickers_processed += 1;

            let result = self
                .ingest_ticker(ticker, end, global_latest, &mut keys, &mut summary)
                .await;

            if let Err(e) = result {
                match &e {
                    TickerError::Provider(ProviderError::Empty(_)) => {
                        warn!("No data for {}", ticker)
                    }
                    _ => error!("Failed to ingest {}: {}", ticker, e),
                }
                summary.failed_tickers.push((ticker.clone(), e.to_string()));
            }
        }

        info!(
            "Ingestion finished: {} inserted, {} duplicates, {} rejected, {} failed tickers",
            summary.rows_inserted,
            summary.rows_skipped,
            summary.rows_rejected,
            summary.failed_tickers.len()
        );

        Ok(summary)
    }

    async fn ingest_ticker(
        &self,
        ticker: &str,
        end: NaiveDate,
        global_latest: Option<NaiveDate>,
        keys: &mut HashSet<(String, NaiveDate)>,
        summary: &mut IngestionSummary,
    ) -> Result<(), TickerError> {
        let start = self.start_date(ticker, global_latest).await?;
        if start > end {
            info!("{} is up to date (next start {})", ticker, start);
            summary.tickers_up_to_date += 1;
            return Ok(());
        }

        debug!("Fetching {} from {} to {}", ticker, start, end);
        let frame = self.provider.fetch(ticker, start, end).await?;
        if frame.is_empty() {
            return Err(ProviderError::Empty(ticker.to_string()).into());
        }

        let batch = normalize_frame(ticker, &frame)?;
        for (row, reason) in &batch.rejected {
            warn!("Skipping {} row {}: {}", ticker, row, reason);
        }
        summary.rows_rejected += batch.rejected.len();

        let mut inserted = 0;
        let mut skipped = 0;
        for record in batch.records {
            let key = record.key();
            if keys.contains(&key) {
                skipped += 1;
                continue;
            }

            if self.fundamental_repo.insert(&record).await? {
                inserted += 1;
            } else {
                skipped += 1;
            }
            keys.insert(key);
        }

        summary.rows_inserted += inserted;
        summary.rows_skipped += skipped;
        info!("{}: {} new rows, {} duplicates", ticker, inserted, skipped);
        Ok(())
    }

    async fn start_date(
        &self,
        ticker: &str,
        global_latest: Option<NaiveDate>,
    ) -> Result<NaiveDate, sqlx::Error> {
        let latest = match self.config.start_strategy {
            StartStrategy::Epoch => None,
            StartStrategy::Global => global_latest,
            StartStrategy::PerTicker => self.fundamental_repo.latest_date_for(ticker).await?,
        };

        Ok(match latest {
            Some(date) => date.succ_opt().unwrap_or(date),
            None => self.config.epoch,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Open,
    High,
    Low,
    Close,
    AdjClose,
    Volume,
}

/// Map a flattened provider label onto a schema field
fn field_for_label(label: &str) -> Option<Field> {
    let key: String = label
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect();

    match key.as_str() {
        "open" => Some(Field::Open),
        "high" => Some(Field::High),
        "low" => Some(Field::Low),
        "close" => Some(Field::Close),
        "adjclose" | "adjustedclose" => Some(Field::AdjClose),
        "volume" => Some(Field::Volume),
        _ => None,
    }
}

struct ColumnMap<'a> {
    open: &'a RawColumn,
    high: &'a RawColumn,
    low: &'a RawColumn,
    close: Option<&'a RawColumn>,
    adj_close: Option<&'a RawColumn>,
    volume: &'a RawColumn,
}

impl<'a> ColumnMap<'a> {
    fn resolve(frame: &'a RawFrame) -> Result<Self, NormalizeError> {
        // First column wins when a flattened label repeats
        let find = |wanted: Field| {
            frame
                .columns
                .iter()
                .find(|c| c.top_label().and_then(field_for_label) == Some(wanted))
        };

        let close = find(Field::Close);
        let adj_close = find(Field::AdjClose);
        if close.is_none() && adj_close.is_none() {
            return Err(NormalizeError::MissingColumn("close"));
        }

        Ok(Self {
            open: find(Field::Open).ok_or(NormalizeError::MissingColumn("open"))?,
            high: find(Field::High).ok_or(NormalizeError::MissingColumn("high"))?,
            low: find(Field::Low).ok_or(NormalizeError::MissingColumn("low"))?,
            close,
            adj_close,
            volume: find(Field::Volume).ok_or(NormalizeError::MissingColumn("volume"))?,
        })
    }
}

/// Turn a provider frame into fundamentals rows.
///
/// Adjusted close is used as `close` when present for the row; a blank
/// adjusted close falls back to the raw close. Any field that fails to coerce
/// voids its row only.
pub fn normalize_frame(ticker: &str, frame: &RawFrame) -> Result<NormalizedBatch, NormalizeError> {
    let columns = ColumnMap::resolve(frame)?;
    let mut batch = NormalizedBatch::default();

    for (row, timestamp) in frame.index.iter().enumerate() {
        match extract_row(ticker, row, timestamp, &columns) {
            Ok(record) => batch.records.push(record),
            Err(reason) => batch.rejected.push((row, reason)),
        }
    }

    Ok(batch)
}

fn extract_row(
    ticker: &str,
    row: usize,
    timestamp: &RawTimestamp,
    columns: &ColumnMap<'_>,
) -> Result<FundamentalRecord, String> {
    let date = calendar_date(timestamp).ok_or_else(|| format!("unreadable date {:?}", timestamp))?;

    let price = |column: &RawColumn, name: &str| {
        coerce_f64(column.value(row)).ok_or_else(|| format!("bad {} {}", name, column.value(row)))
    };

    let open = price(columns.open, "open")?;
    let high = price(columns.high, "high")?;
    let low = price(columns.low, "low")?;

    let adjusted = columns.adj_close.map(|c| c.value(row)).filter(|v| !is_blank(v));
    let close = match (adjusted, columns.close) {
        (Some(value), _) => {
            coerce_f64(value).ok_or_else(|| format!("bad adjusted close {}", value))?
        }
        (None, Some(column)) => price(column, "close")?,
        (None, None) => return Err("no close value".to_string()),
    };

    let volume = coerce_i64(columns.volume.value(row))
        .ok_or_else(|| format!("bad volume {}", columns.volume.value(row)))?;

    Ok(FundamentalRecord::from_bar(
        ticker, date, open, high, low, close, volume,
    ))
}

/// Bare calendar date of a provider timestamp in the exchange's local time
pub fn calendar_date(timestamp: &RawTimestamp) -> Option<NaiveDate> {
    match timestamp {
        RawTimestamp::Epoch {
            seconds,
            utc_offset,
        } => DateTime::from_timestamp(seconds.checked_add(*utc_offset)?, 0).map(|d| d.date_naive()),
        RawTimestamp::Text(text) => parse_calendar_date(text),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Finite float from a JSON number or numeric string
pub fn coerce_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

/// 64-bit integer from a JSON number or numeric string; finite fractional
/// values are truncated toward zero
pub fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(truncate_to_i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate_to_i64))
        }
        _ => None,
    }
}

fn truncate_to_i64(value: f64) -> Option<i64> {
    let truncated = value.trunc();
    // 2^63 is exactly representable; anything at or beyond it overflows
    if truncated.is_finite()
        && truncated >= i64::MIN as f64
        && truncated < 9.223_372_036_854_775_808e18
    {
        Some(truncated as i64)
    } else {
        None
    }
}
