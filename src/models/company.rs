use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A tracked security in the ticker registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub ticker: String, // Always stored uppercased
    pub name: String,
}

/// Canonical form of a ticker symbol: trimmed and uppercased
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}
