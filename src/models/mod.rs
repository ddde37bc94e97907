//! Domain models for the dividend-ml service.
//!
//! Database-backed rows for the ticker registry and the fundamentals store,
//! plus the descriptive metadata kept alongside the fitted model.

pub mod company;
pub mod fundamental;
pub mod model_metadata;

// Re-export all models for convenient access
pub use company::{normalize_ticker, Company};
pub use fundamental::{
    fiscal_quarter, period_label, FundamentalRecord, FEATURE_NAMES, PLACEHOLDER_DIVIDENDS,
    PLACEHOLDER_EARNINGS,
};
pub use model_metadata::{ModelMetadata, MODEL_KIND};
