//! Model evaluation and selection

use super::catalog::{CandidateModel, ModelCatalog};
use super::models::{RegressionMetrics, Regressor};
use crate::config::{PipelineConfig, DEFAULT_QUALITY_THRESHOLD};
use crate::error::{PipelineError, Result};
use crate::export::{Artifact, ArtifactKind, ArtifactMetadata, ArtifactStore};
use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Held-out result for one catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelScore {
    pub name: String,
    /// Coefficient of determination on the test split
    pub score: f64,
    pub rmse: f64,
    pub mae: f64,
    pub fit_time_ms: u64,
}

/// Scores for every model in a catalog, in catalog order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationReport {
    entries: Vec<ModelScore>,
}

impl EvaluationReport {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.score)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelScore> {
        self.entries.iter()
    }

    /// Highest score; the earliest entry wins a tie
    pub fn best(&self) -> Option<&ModelScore> {
        self.entries
            .iter()
            .filter(|e| !e.score.is_nan())
            .fold(None, |best: Option<&ModelScore>, e| match best {
                Some(b) if b.score >= e.score => Some(b),
                _ => Some(e),
            })
    }

    /// Entries sorted by score, highest first. Ties keep catalog order.
    pub fn ranked(&self) -> Vec<&ModelScore> {
        let mut ranked: Vec<&ModelScore> = self.entries.iter().collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }

    fn push(&mut self, entry: ModelScore) {
        self.entries.push(entry);
    }
}

impl FromIterator<(String, f64)> for EvaluationReport {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(name, score)| ModelScore {
                    name,
                    score,
                    rmse: f64::NAN,
                    mae: f64::NAN,
                    fit_time_ms: 0,
                })
                .collect(),
        }
    }
}

/// The fitted winner of a selection
#[derive(Debug, Clone)]
pub struct BestModel<M = CandidateModel> {
    pub name: String,
    pub model: M,
    pub score: f64,
}

/// Why no model was accepted
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub best_model: String,
    pub best_score: f64,
    pub threshold: f64,
}

impl From<Rejection> for PipelineError {
    fn from(r: Rejection) -> Self {
        PipelineError::NoAcceptableModel {
            best_model: r.best_model,
            best_score: r.best_score,
            threshold: r.threshold,
        }
    }
}

/// Outcome of [`ModelSelector::select_best`]
#[derive(Debug, Clone)]
pub enum Selection<M = CandidateModel> {
    Accepted(BestModel<M>),
    Rejected(Rejection),
}

impl<M> Selection<M> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Selection::Accepted(_))
    }

    /// Turn a rejection into [`PipelineError::NoAcceptableModel`]
    pub fn into_result(self) -> Result<BestModel<M>> {
        match self {
            Selection::Accepted(best) => Ok(best),
            Selection::Rejected(rejection) => Err(rejection.into()),
        }
    }
}

/// Trains a catalog, scores it on held-out data and keeps the best model
#[derive(Debug, Clone)]
pub struct ModelSelector {
    quality_threshold: f64,
    store: ArtifactStore,
    feature_names: Vec<String>,
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY_THRESHOLD, ArtifactStore::default())
    }
}

impl ModelSelector {
    pub fn new(quality_threshold: f64, store: ArtifactStore) -> Self {
        Self {
            quality_threshold,
            store,
            feature_names: Vec::new(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.quality_threshold, ArtifactStore::new(config.artifact_format))
    }

    /// Feature names recorded in the persisted model's metadata
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = names;
        self
    }

    pub fn quality_threshold(&self) -> f64 {
        self.quality_threshold
    }

    /// Fit every catalog model on `train` and score it on `test`.
    ///
    /// Both matrices carry the target as their last column. Models are fitted
    /// in place one after another; the first failure aborts evaluation.
    pub fn evaluate_model<M: Regressor>(
        &self,
        train: &Array2<f64>,
        test: &Array2<f64>,
        catalog: &mut ModelCatalog<M>,
    ) -> Result<EvaluationReport> {
        if catalog.is_empty() {
            return Err(PipelineError::ConfigError("model catalog is empty".to_string()));
        }
        let (x_train, y_train) = split_target(train, "train")?;
        let (x_test, y_test) = split_target(test, "test")?;
        if x_train.ncols() != x_test.ncols() {
            return Err(PipelineError::training(
                "catalog",
                PipelineError::ShapeError {
                    expected: format!("{} test columns", train.ncols()),
                    actual: format!("{} test columns", test.ncols()),
                },
            ));
        }

        info!(
            models = catalog.len(),
            features = x_train.ncols(),
            train_rows = x_train.nrows(),
            test_rows = x_test.nrows(),
            "Evaluating model catalog"
        );

        let mut report = EvaluationReport::default();
        for entry in catalog.iter_mut() {
            let start = Instant::now();
            let metrics = fit_and_score(&mut entry.model, &x_train, &y_train, &x_test, &y_test)
                .map_err(|e| PipelineError::training(&entry.name, e))?;
            let fit_time_ms = start.elapsed().as_millis() as u64;

            debug!(model = %entry.name, r2 = metrics.r2, rmse = metrics.rmse, fit_time_ms, "Model scored");
            report.push(ModelScore {
                name: entry.name.clone(),
                score: metrics.r2,
                rmse: metrics.rmse,
                mae: metrics.mae,
                fit_time_ms,
            });
        }

        Ok(report)
    }

    /// Pick the highest scoring model and gate it on the quality threshold.
    ///
    /// The threshold is inclusive. Ties go to the model inserted first.
    pub fn select_best<M: Regressor>(
        &self,
        report: &EvaluationReport,
        mut catalog: ModelCatalog<M>,
    ) -> Result<Selection<M>> {
        if report.len() != catalog.len() {
            return Err(PipelineError::ConfigError(format!(
                "report has {} entries but catalog has {}",
                report.len(),
                catalog.len()
            )));
        }

        let mut best: Option<(&str, f64)> = None;
        for entry in catalog.iter() {
            let score = report.get(&entry.name).ok_or_else(|| {
                PipelineError::ConfigError(format!("model '{}' missing from evaluation report", entry.name))
            })?;
            if !score.is_finite() {
                return Err(PipelineError::ConfigError(format!(
                    "model '{}' has non-finite score {}",
                    entry.name, score
                )));
            }
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((entry.name.as_str(), score));
            }
        }
        let (name, score) = best
            .map(|(n, s)| (n.to_string(), s))
            .ok_or_else(|| PipelineError::ConfigError("model catalog is empty".to_string()))?;

        if score < self.quality_threshold {
            warn!(model = %name, score, threshold = self.quality_threshold, "No model met the quality threshold");
            return Ok(Selection::Rejected(Rejection {
                best_model: name,
                best_score: score,
                threshold: self.quality_threshold,
            }));
        }

        let model = catalog
            .take(&name)
            .ok_or_else(|| PipelineError::ConfigError(format!("model '{}' not in catalog", name)))?;
        info!(model = %name, score, "Selected best model");
        Ok(Selection::Accepted(BestModel { name, model, score }))
    }

    /// Write the winning model to `path`, replacing any earlier artifact.
    /// Returns the model's score.
    pub fn persist_best<M: Regressor + Serialize>(
        &self,
        best: &BestModel<M>,
        path: impl AsRef<Path>,
    ) -> Result<f64> {
        let path = path.as_ref();
        let metadata = ArtifactMetadata::new(ArtifactKind::Model, &best.name)
            .with_score(best.score)
            .with_feature_names(self.feature_names.clone());
        self.store.store(path, &Artifact::new(metadata, &best.model))?;

        info!(model = %best.name, path = %path.display(), score = best.score, "Model saved");
        Ok(best.score)
    }
}

fn split_target(matrix: &Array2<f64>, label: &str) -> Result<(Array2<f64>, Array1<f64>)> {
    if matrix.ncols() < 2 {
        return Err(PipelineError::training(
            "catalog",
            PipelineError::ShapeError {
                expected: format!("at least 2 columns in {} matrix", label),
                actual: format!("{} columns", matrix.ncols()),
            },
        ));
    }
    let last = matrix.ncols() - 1;
    Ok((matrix.slice(s![.., ..last]).to_owned(), matrix.column(last).to_owned()))
}

fn fit_and_score<M: Regressor>(
    model: &mut M,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
) -> Result<RegressionMetrics> {
    model.fit(x_train, y_train)?;
    let predictions = model.predict(x_test)?;
    let metrics = RegressionMetrics::compute(y_test, &predictions)?;
    if !metrics.r2.is_finite() {
        return Err(PipelineError::ComputationError(format!(
            "non-finite R² ({}) on held-out data",
            metrics.r2
        )));
    }
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ArtifactFormat;
    use crate::training::LinearRegression;

    /// Predicts a fixed value regardless of input
    #[derive(Debug, Clone, Serialize)]
    struct ConstantModel {
        label: &'static str,
        value: f64,
        fail: bool,
    }

    impl ConstantModel {
        fn new(label: &'static str, value: f64) -> Self {
            Self { label, value, fail: false }
        }
    }

    impl Regressor for ConstantModel {
        fn fit(&mut self, _x: &Array2<f64>, _y: &Array1<f64>) -> Result<()> {
            if self.fail {
                return Err(PipelineError::ComputationError("singular".to_string()));
            }
            Ok(())
        }

        fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
            Ok(Array1::from_elem(x.nrows(), self.value))
        }

        fn name(&self) -> &str {
            self.label
        }
    }

    fn linear_data(n: usize, offset: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, 3), |(i, j)| {
            let a = (i + offset) as f64;
            let b = ((i + offset) % 7) as f64;
            match j {
                0 => a,
                1 => b,
                _ => 3.0 * a - 2.0 * b + 1.0,
            }
        })
    }

    fn report(scores: &[(&str, f64)]) -> EvaluationReport {
        scores.iter().map(|(n, s)| (n.to_string(), *s)).collect()
    }

    fn constant_catalog(names: &[&'static str]) -> ModelCatalog<ConstantModel> {
        let mut catalog = ModelCatalog::new();
        for name in names {
            catalog.insert(*name, ConstantModel::new(name, 0.0)).unwrap();
        }
        catalog
    }

    #[test]
    fn test_report_has_one_score_per_model() {
        let mut catalog = ModelCatalog::new();
        catalog.insert("ols", LinearRegression::new()).unwrap();
        catalog.insert("ols again", LinearRegression::new()).unwrap();

        let selector = ModelSelector::default();
        let report = selector
            .evaluate_model(&linear_data(40, 0), &linear_data(10, 40), &mut catalog)
            .unwrap();

        assert_eq!(report.len(), catalog.len());
        assert!(report.get("ols").unwrap() > 0.999);
        assert!(report.get("missing").is_none());
    }

    #[test]
    fn test_empty_catalog_rejected() {
        let mut catalog: ModelCatalog<ConstantModel> = ModelCatalog::new();
        let err = ModelSelector::default()
            .evaluate_model(&linear_data(5, 0), &linear_data(5, 5), &mut catalog)
            .unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError(_)));
    }

    #[test]
    fn test_model_failure_names_the_model() {
        let mut catalog = constant_catalog(&["ok"]);
        let mut broken = ConstantModel::new("broken", 0.0);
        broken.fail = true;
        catalog.insert("broken one", broken).unwrap();

        let err = ModelSelector::default()
            .evaluate_model(&linear_data(5, 0), &linear_data(5, 5), &mut catalog)
            .unwrap_err();
        match err {
            PipelineError::TrainingError { model, .. } => assert_eq!(model, "broken one"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_shape_mismatch_is_training_error() {
        let mut catalog = constant_catalog(&["a"]);
        let narrow = Array2::zeros((4, 1));
        let err = ModelSelector::default()
            .evaluate_model(&narrow, &narrow, &mut catalog)
            .unwrap_err();
        assert!(matches!(err, PipelineError::TrainingError { .. }));

        let err = ModelSelector::default()
            .evaluate_model(&linear_data(5, 0), &Array2::zeros((5, 4)), &mut catalog)
            .unwrap_err();
        assert!(matches!(err, PipelineError::TrainingError { .. }));
    }

    #[test]
    fn test_nan_predictions_rejected() {
        let mut catalog = ModelCatalog::new();
        catalog.insert("nan", ConstantModel::new("nan", f64::NAN)).unwrap();
        let err = ModelSelector::default()
            .evaluate_model(&linear_data(5, 0), &linear_data(5, 5), &mut catalog)
            .unwrap_err();
        assert!(matches!(err, PipelineError::TrainingError { .. }));
    }

    #[test]
    fn test_tie_goes_to_first_in_catalog() {
        let catalog = constant_catalog(&["first", "second", "third"]);
        let report = report(&[("first", 0.8), ("second", 0.9), ("third", 0.9)]);
        let best = ModelSelector::default()
            .select_best(&report, catalog)
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(best.name, "second");
        assert_eq!(best.model.label, "second");
        assert_eq!(best.score, 0.9);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let selector = ModelSelector::new(0.6, ArtifactStore::default());

        let at = selector
            .select_best(&report(&[("m", 0.6)]), constant_catalog(&["m"]))
            .unwrap();
        assert!(at.is_accepted());

        let below = selector
            .select_best(&report(&[("m", 0.599999)]), constant_catalog(&["m"]))
            .unwrap();
        assert!(!below.is_accepted());
        let err = below.into_result().unwrap_err();
        assert!(err.is_rejection());
    }

    #[test]
    fn test_non_finite_score_is_never_selected() {
        let selector = ModelSelector::default();
        for bad in [f64::NAN, f64::INFINITY] {
            let err = selector
                .select_best(&report(&[("a", bad), ("b", 0.9)]), constant_catalog(&["a", "b"]))
                .unwrap_err();
            assert!(matches!(err, PipelineError::ConfigError(_)), "accepted score {bad}");
        }

        let r = report(&[("a", f64::NAN), ("b", 0.9)]);
        assert_eq!(r.best().unwrap().name, "b");
    }

    #[test]
    fn test_report_must_cover_catalog() {
        let err = ModelSelector::default()
            .select_best(&report(&[("a", 0.9), ("x", 0.9)]), constant_catalog(&["a", "b"]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError(_)));
    }

    #[test]
    fn test_report_best_and_ranking() {
        let r = report(&[("a", 0.1), ("b", 0.7), ("c", 0.7), ("d", -2.0)]);
        assert_eq!(r.best().unwrap().name, "b");
        let ranked: Vec<&str> = r.ranked().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(ranked, vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn test_persist_best_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("model.json");
        let selector = ModelSelector::new(0.6, ArtifactStore::new(ArtifactFormat::Json))
            .with_feature_names(vec!["x".to_string()]);

        for score in [0.7, 0.9] {
            let best = BestModel {
                name: "const".to_string(),
                model: ConstantModel::new("const", 1.0),
                score,
            };
            assert_eq!(selector.persist_best(&best, &path).unwrap(), score);
        }

        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
        let meta = ArtifactStore::new(ArtifactFormat::Json).load_metadata(&path).unwrap();
        assert_eq!(meta.score, Some(0.9));
        assert_eq!(meta.kind, ArtifactKind::Model);
        assert_eq!(meta.feature_names, vec!["x".to_string()]);
    }
}
