use super::model_state::{LoadedModel, ModelHandle};
use crate::error::{AppError, AppResult};
use crate::ml::{self, LinearRegression, ModelError, ModelStore};
use crate::models::{FundamentalRecord, ModelMetadata, FEATURE_NAMES};
use crate::repositories::FundamentalRepository;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const NO_DATA_MESSAGE: &str = "No data to train on.";
pub const NOT_TRAINED_MESSAGE: &str = "Model not trained yet.";
pub const NOT_ENOUGH_DATA_MESSAGE: &str = "Not enough data to compute metrics.";

/// Result of a successful retrain
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub status: String,
    pub rows: usize,
    pub rows_used: usize,
    pub features: usize,
    pub mse: f64,
    pub r2: f64,
}

/// In-sample statistics of the serving model on the current table
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub mse: f64,
    pub r2: f64,
    pub interpretation: String,
}

/// Fit on `records`, then persist the artifact and its metadata.
///
/// A failed artifact write fails the whole call. A failed metadata write is
/// only logged.
pub async fn fit_and_persist(
    records: &[FundamentalRecord],
    store: &ModelStore,
) -> AppResult<(LoadedModel, TrainingReport)> {
    let features = ml::feature_names();
    let (x, y) = ml::design_matrix(records);
    let model = LinearRegression::fit(&features, &x, &y)?;
    let (mse, r2) = ml::evaluate(&model, records)?;

    store.save_model(&model).await?;

    let metadata = ModelMetadata::trained(&features, records.len(), mse, r2);
    if let Err(e) = store.save_metadata(&metadata).await {
        warn!(
            "Model saved but metadata write to {} failed: {}",
            store.metadata_path().display(),
            e
        );
    }

    info!(
        "Trained {} on {} rows (mse={:.6}, r2={:.6})",
        model.model_type,
        records.len(),
        mse,
        r2
    );

    let report = TrainingReport {
        status: "trained".to_string(),
        rows: records.len(),
        rows_used: records.len(),
        features: features.len(),
        mse,
        r2,
    };

    Ok((LoadedModel { model, metadata }, report))
}

/// Batch training: refit from the whole table.
///
/// With an empty table the metadata is rewritten as untrained and `None` is
/// returned; that is not an error.
pub async fn run_training_job(
    fundamental_repo: &FundamentalRepository,
    store: &ModelStore,
) -> AppResult<Option<TrainingReport>> {
    let records = fundamental_repo.find_all().await?;

    if records.is_empty() {
        warn!("{}", NO_DATA_MESSAGE);
        store.save_metadata(&ModelMetadata::untrained()).await?;
        return Ok(None);
    }

    let (_, report) = fit_and_persist(&records, store).await?;
    Ok(Some(report))
}

/// Owns the serving model: prediction, retraining and fit statistics
pub struct TrainingService {
    fundamental_repo: Arc<FundamentalRepository>,
    store: ModelStore,
    model: ModelHandle,
    train_lock: Mutex<()>,
}

impl TrainingService {
    pub fn new(
        fundamental_repo: Arc<FundamentalRepository>,
        store: ModelStore,
        model: ModelHandle,
    ) -> Self {
        Self {
            fundamental_repo,
            store,
            model,
            train_lock: Mutex::new(()),
        }
    }

    pub fn handle(&self) -> &ModelHandle {
        &self.model
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Refit from the current table and swap the serving model
    pub async fn train(&self) -> AppResult<TrainingReport> {
        // Retrains never interleave their artifact writes
        let _guard = self.train_lock.lock().await;

        let records = self.fundamental_repo.find_all().await?;
        if records.is_empty() {
            return Err(AppError::Precondition(NO_DATA_MESSAGE.into()));
        }

        let (loaded, report) = fit_and_persist(&records, &self.store).await?;
        self.model.replace(loaded).await;
        Ok(report)
    }

    /// Predicted close for one feature row
    pub async fn predict(&self, features: &[f64; 6]) -> AppResult<f64> {
        let snapshot = self
            .model
            .current()
            .await
            .ok_or_else(|| AppError::Precondition(NOT_TRAINED_MESSAGE.into()))?;

        let predicted = snapshot.model.predict_one(features)?;
        if !predicted.is_finite() {
            return Err(AppError::Validation(
                "Inputs are out of range: prediction is not a finite number.".into(),
            ));
        }
        Ok(predicted)
    }

    /// Recompute in-sample MSE and R² on the current table
    pub async fn metrics(&self) -> AppResult<MetricsReport> {
        let snapshot = self
            .model
            .current()
            .await
            .ok_or_else(|| AppError::Precondition(NOT_TRAINED_MESSAGE.into()))?;

        let records = self.fundamental_repo.find_all().await?;
        if records.len() < 2 {
            return Err(AppError::Precondition(NOT_ENOUGH_DATA_MESSAGE.into()));
        }

        let (mse, r2) = ml::evaluate(&snapshot.model, &records)?;
        Ok(MetricsReport {
            mse,
            r2,
            interpretation: ml::interpret_r2(r2).to_string(),
        })
    }

    /// Metadata of the serving model, or the untrained placeholder
    pub async fn model_info(&self) -> ModelMetadata {
        match self.model.current().await {
            Some(snapshot) => snapshot.metadata.clone(),
            None => ModelMetadata::untrained(),
        }
    }

    /// Modification time of the persisted artifact
    pub async fn last_trained(&self) -> Option<DateTime<Utc>> {
        self.store.artifact_modified().await
    }

    /// Install a previously persisted model, if one exists.
    ///
    /// Returns whether a model was loaded. A missing or unreadable metadata
    /// file does not prevent loading the artifact.
    pub async fn load_persisted(&self) -> AppResult<bool> {
        let Some(model) = self.store.load_model().await? else {
            return Ok(false);
        };

        if model.n_features() != FEATURE_NAMES.len() {
            return Err(ModelError::IncompatibleArtifact(format!(
                "expected {} features, artifact has {}",
                FEATURE_NAMES.len(),
                model.n_features()
            ))
            .into());
        }

        let metadata = match self.store.load_metadata().await {
            Ok(Some(metadata)) if metadata.trained => metadata,
            Ok(_) => ModelMetadata::recovered(&model.feature_names),
            Err(e) => {
                warn!("Ignoring unreadable model metadata: {}", e);
                ModelMetadata::recovered(&model.feature_names)
            }
        };

        info!(
            "Loaded persisted model from {}",
            self.store.model_path().display()
        );
        self.model.replace(LoadedModel { model, metadata }).await;
        Ok(true)
    }
}
