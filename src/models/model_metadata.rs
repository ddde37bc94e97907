use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Model kind reported in metadata and stored in the artifact
pub const MODEL_KIND: &str = "LinearRegression";

/// Descriptive information about the currently fitted model.
///
/// Recomputed on every retrain; independent of the artifact file's own
/// modification time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub trained: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_trained: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_mse: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_r2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_used: Option<usize>,
}

impl ModelMetadata {
    /// Metadata for a service with no model
    pub fn untrained() -> Self {
        Self {
            trained: false,
            model_type: None,
            features_count: None,
            features: Vec::new(),
            last_trained: None,
            training_mse: None,
            training_r2: None,
            rows_used: None,
        }
    }

    /// Metadata for a model fitted just now
    pub fn trained(features: &[String], rows_used: usize, mse: f64, r2: f64) -> Self {
        Self {
            trained: true,
            model_type: Some(MODEL_KIND.to_string()),
            features_count: Some(features.len()),
            features: features.to_vec(),
            last_trained: Some(Utc::now()),
            training_mse: Some(mse),
            training_r2: Some(r2),
            rows_used: Some(rows_used),
        }
    }

    /// Metadata for an artifact loaded without its sibling metadata file
    pub fn recovered(features: &[String]) -> Self {
        Self {
            trained: true,
            model_type: Some(MODEL_KIND.to_string()),
            features_count: Some(features.len()),
            features: features.to_vec(),
            ..Self::untrained()
        }
    }
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self::untrained()
    }
}
