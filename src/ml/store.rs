use super::{LinearRegression, ModelError};
use crate::config::ModelConfig;
use crate::models::ModelMetadata;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// On-disk home of the fitted model and its metadata.
///
/// Both files are JSON and are overwritten on every save. Each write goes to
/// a sibling temp file first and is renamed into place, so readers never see
/// a half-written file. The two files are not linked transactionally.
#[derive(Debug, Clone)]
pub struct ModelStore {
    model_path: PathBuf,
    metadata_path: PathBuf,
}

impl ModelStore {
    pub fn new(model_path: impl Into<PathBuf>, metadata_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            metadata_path: metadata_path.into(),
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(&config.model_path, &config.metadata_path)
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    pub async fn save_model(&self, model: &LinearRegression) -> Result<(), ModelError> {
        write_json(&self.model_path, model).await
    }

    pub async fn save_metadata(&self, metadata: &ModelMetadata) -> Result<(), ModelError> {
        write_json(&self.metadata_path, metadata).await
    }

    /// Load the model artifact; `None` when no artifact exists
    pub async fn load_model(&self) -> Result<Option<LinearRegression>, ModelError> {
        let Some(bytes) = read_optional(&self.model_path).await? else {
            return Ok(None);
        };

        let model: LinearRegression = serde_json::from_slice(&bytes)?;
        if model.coefficients.len() != model.feature_names.len() {
            return Err(ModelError::IncompatibleArtifact(format!(
                "{} coefficients for {} features",
                model.coefficients.len(),
                model.feature_names.len()
            )));
        }
        Ok(Some(model))
    }

    /// Load the metadata file; `None` when it does not exist
    pub async fn load_metadata(&self) -> Result<Option<ModelMetadata>, ModelError> {
        match read_optional(&self.metadata_path).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Modification time of the model artifact, if there is one
    pub async fn artifact_modified(&self) -> Option<DateTime<Utc>> {
        let meta = tokio::fs::metadata(&self.model_path).await.ok()?;
        meta.modified().ok().map(DateTime::<Utc>::from)
    }
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, ModelError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ModelError::Io(e)),
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ModelError> {
    let body = serde_json::to_vec_pretty(value)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &body).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!("Wrote {}", path.display());
    Ok(())
}
