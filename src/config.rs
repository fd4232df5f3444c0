//! Pipeline configuration

use crate::error::{PipelineError, Result};
use crate::export::ArtifactFormat;
use crate::preprocessing::FeatureSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default minimum coefficient of determination a model must reach
pub const DEFAULT_QUALITY_THRESHOLD: f64 = 0.6;

/// Configuration for a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Column layout of the train/test tables
    pub schema: FeatureSchema,

    /// Where the fitted feature plan is written
    pub preprocessor_path: PathBuf,

    /// Where the selected model is written
    pub model_path: PathBuf,

    /// Minimum acceptable held-out R² (inclusive)
    pub quality_threshold: f64,

    /// Seed for every randomized model in the catalog
    pub random_state: u64,

    /// On-disk encoding of persisted artifacts
    pub artifact_format: ArtifactFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let artifacts = Path::new("artifacts");
        Self {
            schema: FeatureSchema::default(),
            preprocessor_path: artifacts.join("preprocessor.json"),
            model_path: artifacts.join("model.json"),
            quality_threshold: DEFAULT_QUALITY_THRESHOLD,
            random_state: 42,
            artifact_format: ArtifactFormat::Json,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the feature schema
    pub fn with_schema(mut self, schema: FeatureSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Place both artifacts in `dir`, keeping their file names
    pub fn with_artifacts_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.preprocessor_path = dir.join(file_name_or(&self.preprocessor_path, "preprocessor.json"));
        self.model_path = dir.join(file_name_or(&self.model_path, "model.json"));
        self
    }

    /// Builder method to set the preprocessor artifact path
    pub fn with_preprocessor_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.preprocessor_path = path.into();
        self
    }

    /// Builder method to set the model artifact path
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    /// Builder method to set the acceptance threshold
    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = threshold;
        self
    }

    /// Builder method to set the random seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Builder method to set the artifact encoding
    pub fn with_artifact_format(mut self, format: ArtifactFormat) -> Self {
        self.artifact_format = format;
        self
    }

    /// Check values that cannot be caught by the type system
    pub fn validate(&self) -> Result<()> {
        if !self.quality_threshold.is_finite() {
            return Err(PipelineError::ConfigError(format!(
                "quality_threshold must be finite, got {}",
                self.quality_threshold
            )));
        }
        if self.schema.target_column.trim().is_empty() {
            return Err(PipelineError::ConfigError("target column name is empty".to_string()));
        }
        if self.preprocessor_path.as_os_str().is_empty() || self.model_path.as_os_str().is_empty() {
            return Err(PipelineError::ConfigError("artifact paths must not be empty".to_string()));
        }
        if self.preprocessor_path == self.model_path {
            return Err(PipelineError::ConfigError(format!(
                "preprocessor and model would both be written to {}",
                self.model_path.display()
            )));
        }
        Ok(())
    }

    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| PipelineError::ConfigError(format!("{}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as pretty JSON
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn file_name_or<'a>(path: &'a Path, fallback: &'a str) -> &'a std::ffi::OsStr {
    path.file_name().unwrap_or_else(|| std::ffi::OsStr::new(fallback))
}
