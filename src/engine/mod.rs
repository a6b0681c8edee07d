mod config;
mod errors;
mod ingestion_engine;
mod lock;

pub use config::{PipelineConfig, DEFAULT_MAX_FILES};
pub use errors::EngineError;
pub use ingestion_engine::{IngestionEngine, RunReport};
pub use lock::WriterLock;
