//! End-to-end training run
//!
//! A [`TrainingRun`] moves through
//! `Idle → Transforming → Evaluating → Selecting → Persisting → Done` exactly
//! once. Any error parks it in `Failed`, remembering the stage it died in.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::preprocessing::FeatureTransformer;
use crate::training::{CandidateModel, EvaluationReport, ModelCatalog, ModelSelector};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Lifecycle of a [`TrainingRun`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RunState {
    Idle,
    Transforming,
    Evaluating,
    Selecting,
    Persisting,
    Done,
    Failed { stage: String, error: String },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Transforming => "transforming",
            RunState::Evaluating => "evaluating",
            RunState::Selecting => "selecting",
            RunState::Persisting => "persisting",
            RunState::Done => "done",
            RunState::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Failed { stage, .. } => write!(f, "failed while {}", stage),
            other => f.write_str(other.label()),
        }
    }
}

/// What a successful run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub report: EvaluationReport,
    pub best_model: String,
    pub score: f64,
    pub feature_names: Vec<String>,
    pub preprocessor_path: PathBuf,
    pub model_path: PathBuf,
    pub elapsed_ms: u64,
}

/// One-shot transform → evaluate → select → persist run
pub struct TrainingRun {
    config: PipelineConfig,
    catalog: Option<ModelCatalog<CandidateModel>>,
    state: RunState,
    summary: Option<RunSummary>,
}

impl TrainingRun {
    /// Run over the default eight-model catalog seeded from the config
    pub fn new(config: PipelineConfig) -> Self {
        let catalog = ModelCatalog::default_catalog(config.random_state);
        Self::with_catalog(config, catalog)
    }

    pub fn with_catalog(config: PipelineConfig, catalog: ModelCatalog<CandidateModel>) -> Self {
        Self {
            config,
            catalog: Some(catalog),
            state: RunState::Idle,
            summary: None,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Available once the run reached `Done`
    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    /// Execute the run and return the persisted model's R².
    ///
    /// Calling this on a run that already started is a configuration error.
    #[instrument(skip(self, train, test), fields(train_rows = train.height(), test_rows = test.height()))]
    pub fn run(&mut self, train: &DataFrame, test: &DataFrame) -> Result<f64> {
        if self.state != RunState::Idle {
            return Err(PipelineError::ConfigError(format!(
                "training run already {}; start a new run instead",
                self.state
            )));
        }

        match self.execute(train, test) {
            Ok(score) => Ok(score),
            Err(err) => {
                let stage = self.state.label().to_string();
                if err.is_rejection() {
                    warn!(stage = %stage, error = %err, "Training run rejected");
                } else {
                    error!(stage = %stage, error = %err, "Training run failed");
                }
                self.state = RunState::Failed {
                    stage,
                    error: err.to_string(),
                };
                Err(err)
            }
        }
    }

    fn execute(&mut self, train: &DataFrame, test: &DataFrame) -> Result<f64> {
        let start = Instant::now();
        self.config.validate()?;
        let catalog = self
            .catalog
            .take()
            .ok_or_else(|| PipelineError::ConfigError("model catalog already consumed".to_string()))?;

        self.transition(RunState::Transforming);
        let transformer = FeatureTransformer::from_config(&self.config);
        let target = self.config.schema.target_column.clone();
        let transformed = transformer.fit_transform(train, test, &target)?;
        let feature_names = transformed.plan.feature_names();

        self.transition(RunState::Evaluating);
        let selector = ModelSelector::from_config(&self.config).with_feature_names(feature_names.clone());
        let mut catalog = catalog;
        let report = selector.evaluate_model(&transformed.train, &transformed.test, &mut catalog)?;

        self.transition(RunState::Selecting);
        let best = selector.select_best(&report, catalog)?.into_result()?;

        self.transition(RunState::Persisting);
        let score = selector.persist_best(&best, &self.config.model_path)?;

        self.transition(RunState::Done);
        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(model = %best.name, score, elapsed_ms, "Training run complete");

        self.summary = Some(RunSummary {
            report,
            best_model: best.name,
            score,
            feature_names,
            preprocessor_path: transformed.plan_path,
            model_path: self.config.model_path.clone(),
            elapsed_ms,
        });
        Ok(score)
    }

    fn transition(&mut self, next: RunState) {
        info!(from = %self.state, to = %next, "Run state change");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::FeatureSchema;
    use crate::training::{LinearRegression, RidgeRegression};
    use polars::prelude::*;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(["x"], ["kind"], "y")
    }

    fn table(n: usize, offset: usize) -> DataFrame {
        let x: Vec<f64> = (0..n).map(|i| (i + offset) as f64).collect();
        let kind: Vec<&str> = (0..n).map(|i| if (i + offset) % 2 == 0 { "even" } else { "odd" }).collect();
        let y: Vec<f64> = x
            .iter()
            .zip(&kind)
            .map(|(x, k)| 2.0 * x + if *k == "even" { 5.0 } else { 0.0 })
            .collect();
        df! { "x" => x, "kind" => kind, "y" => y }.unwrap()
    }

    fn linear_catalog() -> ModelCatalog<CandidateModel> {
        ModelCatalog::new()
            .with("Linear Regression", CandidateModel::LinearRegression(LinearRegression::new()))
            .unwrap()
            .with("Ridge", CandidateModel::Ridge(RidgeRegression::new(1.0)))
            .unwrap()
    }

    fn config(dir: &std::path::Path) -> PipelineConfig {
        PipelineConfig::new().with_schema(schema()).with_artifacts_dir(dir)
    }

    #[test]
    fn test_run_reaches_done() {
        let dir = tempfile::tempdir().unwrap();
        let mut run = TrainingRun::with_catalog(config(dir.path()), linear_catalog());
        assert_eq!(run.state(), &RunState::Idle);

        let score = run.run(&table(60, 0), &table(20, 60)).unwrap();
        assert!(score > 0.99);
        assert_eq!(run.state(), &RunState::Done);

        let summary = run.summary().unwrap();
        assert_eq!(summary.report.len(), 2);
        assert_eq!(summary.best_model, "Linear Regression");
        assert!(summary.model_path.exists());
        assert!(summary.preprocessor_path.exists());
    }

    #[test]
    fn test_run_is_one_shot() {
        let dir = tempfile::tempdir().unwrap();
        let mut run = TrainingRun::with_catalog(config(dir.path()), linear_catalog());
        run.run(&table(30, 0), &table(10, 30)).unwrap();

        let err = run.run(&table(30, 0), &table(10, 30)).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError(_)));
        assert_eq!(run.state(), &RunState::Done);
    }

    #[test]
    fn test_failure_records_stage() {
        let dir = tempfile::tempdir().unwrap();
        let mut run = TrainingRun::with_catalog(config(dir.path()), linear_catalog());
        let test = table(10, 30).drop("y").unwrap();

        let err = run.run(&table(30, 0), &test).unwrap_err();
        assert!(matches!(err, PipelineError::DataError(_)));
        match run.state() {
            RunState::Failed { stage, .. } => assert_eq!(stage, "transforming"),
            other => panic!("unexpected state {other:?}"),
        }
        assert!(run.summary().is_none());
        assert!(!dir.path().join("model.json").exists());
    }

    #[test]
    fn test_rejection_fails_in_selecting() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path()).with_quality_threshold(1.5);
        let mut run = TrainingRun::with_catalog(config, linear_catalog());

        let err = run.run(&table(30, 0), &table(10, 30)).unwrap_err();
        assert!(err.is_rejection());
        match run.state() {
            RunState::Failed { stage, .. } => assert_eq!(stage, "selecting"),
            other => panic!("unexpected state {other:?}"),
        }
    }
}
