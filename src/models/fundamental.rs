use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Placeholder dividends value; the market data providers do not supply it
pub const PLACEHOLDER_DIVIDENDS: f64 = 0.0;

/// Placeholder earnings value; the market data providers do not supply it
pub const PLACEHOLDER_EARNINGS: f64 = 1.0;

/// Names of the regression inputs, in model column order
pub const FEATURE_NAMES: [&str; 6] = ["open", "high", "low", "volume", "dividends", "earnings"];

/// One quarterly bar for a ticker. Primary key is (ticker, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FundamentalRecord {
    pub ticker: String,
    pub period: String, // "YYYYQn", derived from date
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub dividends: f64,
    pub earnings: f64,
}

impl FundamentalRecord {
    /// Build a record from a normalized bar, deriving the period label and
    /// filling in the placeholder dividends/earnings.
    pub fn from_bar(
        ticker: &str,
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: i64,
    ) -> Self {
        Self {
            ticker: ticker.to_string(),
            period: period_label(date),
            date,
            open,
            high,
            low,
            close,
            volume,
            dividends: PLACEHOLDER_DIVIDENDS,
            earnings: PLACEHOLDER_EARNINGS,
        }
    }

    /// Deduplication key
    pub fn key(&self) -> (String, NaiveDate) {
        (self.ticker.clone(), self.date)
    }

    /// Regression inputs in `FEATURE_NAMES` order
    pub fn features(&self) -> [f64; 6] {
        [
            self.open,
            self.high,
            self.low,
            self.volume as f64,
            self.dividends,
            self.earnings,
        ]
    }
}

/// Fiscal quarter (1-4) for a calendar month (1-12)
pub fn fiscal_quarter(month: u32) -> u32 {
    (month.saturating_sub(1)) / 3 + 1
}

/// Period label such as "2024Q3"
pub fn period_label(date: NaiveDate) -> String {
    format!("{}Q{}", date.year(), fiscal_quarter(date.month()))
}
