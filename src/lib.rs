//! score-pipeline: batch training for tabular regression
//!
//! A run fits a [`preprocessing::FeaturePlan`] on the training table, turns
//! both tables into numeric matrices with the target last, trains every model
//! in a [`training::ModelCatalog`], and keeps the best one if its held-out R²
//! reaches the configured threshold.
//!
//! # Modules
//!
//! - [`preprocessing`] - Imputation, one-hot encoding, scaling and the feature plan
//! - [`training`] - Regressors, the model catalog and selection
//! - [`export`] - Artifact persistence
//! - [`pipeline`] - The one-shot training run
//! - [`config`] - Pipeline configuration
//! - [`telemetry`] - Logging setup
//! - [`cli`] - Command-line interface
//!
//! ```no_run
//! use score_pipeline::prelude::*;
//! use score_pipeline::utils::DataLoader;
//!
//! # fn main() -> score_pipeline::Result<()> {
//! let loader = DataLoader::new();
//! let train = loader.load_auto("data/train.csv")?;
//! let test = loader.load_auto("data/test.csv")?;
//!
//! let mut run = TrainingRun::new(PipelineConfig::default());
//! let r2 = run.run(&train, &test)?;
//! println!("saved model with R² {r2:.3}");
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;
pub mod config;

// Pipeline stages
pub mod preprocessing;
pub mod training;
pub mod export;
pub mod pipeline;

// Services
pub mod telemetry;
pub mod cli;
pub mod utils;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{PipelineError, Result};

    // Configuration
    pub use crate::config::PipelineConfig;

    // Preprocessing
    pub use crate::preprocessing::{FeaturePlan, FeatureSchema, FeatureTransformer, TransformOutput};

    // Training
    pub use crate::training::{
        r2_score, BestModel, CandidateModel, EvaluationReport, ModelCatalog, ModelSelector, Regressor,
        Selection,
    };

    // Export
    pub use crate::export::{Artifact, ArtifactFormat, ArtifactStore};

    // Pipeline
    pub use crate::pipeline::{RunState, RunSummary, TrainingRun};
}
