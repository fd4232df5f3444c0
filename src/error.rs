//! Error types for the training pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Uniform error envelope for everything that leaves the pipeline core
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error(
        "Transformation error in {stage}{}: {source}",
        .column.as_ref().map(|c| format!(" (column '{}')", c)).unwrap_or_default()
    )]
    TransformationError {
        stage: String,
        column: Option<String>,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Training error in model '{model}': {source}")]
    TrainingError {
        model: String,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("No acceptable model: best was '{best_model}' with score {best_score:.4}, threshold {threshold}")]
    NoAcceptableModel {
        best_model: String,
        best_score: f64,
        threshold: f64,
    },

    #[error("Unknown category '{value}' in column '{column}'")]
    UnknownCategory { column: String, value: String },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl PipelineError {
    /// Wrap a lower-level failure raised while fitting or applying the feature plan
    pub fn transformation(stage: impl Into<String>, column: Option<&str>, source: PipelineError) -> Self {
        PipelineError::TransformationError {
            stage: stage.into(),
            column: column.map(str::to_string),
            source: Box::new(source),
        }
    }

    /// Wrap a failure raised by a single candidate model
    pub fn training(model: impl Into<String>, source: PipelineError) -> Self {
        PipelineError::TrainingError {
            model: model.into(),
            source: Box::new(source),
        }
    }

    /// True when the run ended because no model cleared the quality threshold.
    ///
    /// This is an expected negative outcome of model selection rather than a
    /// defect, so callers can report it differently.
    pub fn is_rejection(&self) -> bool {
        matches!(self, PipelineError::NoAcceptableModel { .. })
    }

    /// Pipeline stage a transformation failure originated in
    pub fn stage(&self) -> Option<&str> {
        match self {
            PipelineError::TransformationError { stage, .. } => Some(stage.as_str()),
            _ => None,
        }
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for PipelineError {
    fn from(err: bincode::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
