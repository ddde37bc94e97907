use crate::ml::LinearRegression;
use crate::models::ModelMetadata;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A fitted model together with the metadata describing it
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub model: LinearRegression,
    pub metadata: ModelMetadata,
}

/// Serving state of the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelState {
    Untrained,
    Trained,
}

impl ModelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelState::Untrained => "untrained",
            ModelState::Trained => "trained",
        }
    }
}

/// Single-slot, swappable holder of the in-memory model.
///
/// Readers take a snapshot (`Arc<LoadedModel>`) and release the lock right
/// away; a retrain swaps the whole snapshot, so model and metadata are always
/// seen as a matching pair. The slot only ever goes from empty to filled.
#[derive(Debug, Clone, Default)]
pub struct ModelHandle {
    slot: Arc<RwLock<Option<Arc<LoadedModel>>>>,
}

impl ModelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot, if a model has been trained or loaded
    pub async fn current(&self) -> Option<Arc<LoadedModel>> {
        self.slot.read().await.clone()
    }

    /// Install a new model, replacing any previous one
    pub async fn replace(&self, loaded: LoadedModel) {
        *self.slot.write().await = Some(Arc::new(loaded));
    }

    pub async fn state(&self) -> ModelState {
        if self.slot.read().await.is_some() {
            ModelState::Trained
        } else {
            ModelState::Untrained
        }
    }
}
