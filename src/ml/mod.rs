//! Closing-price regression: the solver, its fit statistics, and artifact
//! persistence.

pub mod linear_regression;
pub mod metrics;
pub mod store;

pub use linear_regression::LinearRegression;
pub use metrics::{interpret_r2, mean_squared_error, r2_score};
pub use store::ModelStore;

use crate::models::{FundamentalRecord, FEATURE_NAMES};
use ndarray::{Array1, Array2};
use thiserror::Error;

/// Errors raised while fitting, scoring or persisting a model
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("no rows to fit")]
    EmptyDataset,

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("input contains NaN or infinite values")]
    NonFinite,

    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("incompatible model artifact: {0}")]
    IncompatibleArtifact(String),
}

/// Names of the model inputs, in column order
pub fn feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}

/// Design matrix and target (close) for a set of stored rows
pub fn design_matrix(records: &[FundamentalRecord]) -> (Array2<f64>, Array1<f64>) {
    let mut x = Array2::<f64>::zeros((records.len(), FEATURE_NAMES.len()));
    let mut y = Array1::<f64>::zeros(records.len());

    for (i, record) in records.iter().enumerate() {
        for (j, value) in record.features().iter().enumerate() {
            x[[i, j]] = *value;
        }
        y[i] = record.close;
    }

    (x, y)
}

/// In-sample fit statistics of `model` on `records`: (mse, r2)
pub fn evaluate(
    model: &LinearRegression,
    records: &[FundamentalRecord],
) -> Result<(f64, f64), ModelError> {
    let (x, y) = design_matrix(records);
    let predicted = model.predict(&x)?;
    Ok((mean_squared_error(&y, &predicted), r2_score(&y, &predicted)))
}
