pub mod ingestion;
pub mod model_state;
pub mod registry;
pub mod training;

pub use ingestion::{IngestionPipeline, IngestionSummary};
pub use model_state::{LoadedModel, ModelHandle, ModelState};
pub use registry::RegistryService;
pub use training::{run_training_job, MetricsReport, TrainingReport, TrainingService};
