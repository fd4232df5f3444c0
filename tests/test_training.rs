//! Integration test: catalog evaluation and selection on transformed matrices

mod common;

use common::student_table;
use ndarray::{Array1, Array2};
use score_pipeline::export::{Artifact, ArtifactFormat, ArtifactStore};
use score_pipeline::preprocessing::FeatureTransformer;
use score_pipeline::prelude::*;
use score_pipeline::training::{DecisionTreeRegressor, LassoRegression, RidgeRegression, DEFAULT_MODEL_NAMES};

fn matrices(train_rows: usize, test_rows: usize) -> (Array2<f64>, Array2<f64>) {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default().with_artifacts_dir(dir.path());
    let out = FeatureTransformer::from_config(&config)
        .fit_transform(
            &student_table(train_rows, 31, true),
            &student_table(test_rows, 32, false),
            &config.schema.target_column,
        )
        .unwrap();
    (out.train, out.test)
}

/// Predicts the training mean
#[derive(Debug, Default)]
struct MeanRegressor {
    mean: Option<f64>,
}

impl Regressor for MeanRegressor {
    fn fit(&mut self, _x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.mean = y.mean();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let mean = self.mean.ok_or(PipelineError::ModelNotFitted)?;
        Ok(Array1::from_elem(x.nrows(), mean))
    }

    fn name(&self) -> &str {
        "MeanRegressor"
    }
}

#[test]
fn test_default_catalog_scores_every_model() {
    let (train, test) = matrices(400, 100);
    let mut catalog = ModelCatalog::default_catalog(42);
    let selector = ModelSelector::default();

    let report = selector.evaluate_model(&train, &test, &mut catalog).unwrap();

    assert_eq!(report.len(), catalog.len());
    let names: Vec<&str> = report.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, DEFAULT_MODEL_NAMES.to_vec());
    assert!(report.iter().all(|e| e.score.is_finite() && e.score <= 1.0));
    assert!(report.get("Linear Regression").unwrap() > 0.6);
}

#[test]
fn test_evaluation_is_reproducible() {
    let (train, test) = matrices(200, 60);
    let selector = ModelSelector::default();

    let first = selector
        .evaluate_model(&train, &test, &mut ModelCatalog::default_catalog(7))
        .unwrap();
    let second = selector
        .evaluate_model(&train, &test, &mut ModelCatalog::default_catalog(7))
        .unwrap();

    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.score, b.score, "{} is not deterministic", a.name);
    }
}

#[test]
fn test_identical_models_tie_to_first_inserted() {
    let (train, test) = matrices(200, 60);
    let mut catalog = ModelCatalog::new()
        .with("Ridge A", CandidateModel::Ridge(RidgeRegression::new(1.0)))
        .unwrap()
        .with("Ridge B", CandidateModel::Ridge(RidgeRegression::new(1.0)))
        .unwrap();
    let selector = ModelSelector::new(0.0, ArtifactStore::default());

    let report = selector.evaluate_model(&train, &test, &mut catalog).unwrap();
    assert_eq!(report.get("Ridge A"), report.get("Ridge B"));

    let best = selector.select_best(&report, catalog).unwrap().into_result().unwrap();
    assert_eq!(best.name, "Ridge A");
}

#[test]
fn test_custom_regressor_plugs_into_selection() {
    let (train, test) = matrices(150, 50);
    let mut catalog = ModelCatalog::new();
    catalog.insert("Mean", MeanRegressor::default()).unwrap();
    let selector = ModelSelector::default();

    let report = selector.evaluate_model(&train, &test, &mut catalog).unwrap();
    assert!(report.get("Mean").unwrap() < 0.6);

    match selector.select_best(&report, catalog).unwrap() {
        Selection::Rejected(rejection) => {
            assert_eq!(rejection.best_model, "Mean");
            assert_eq!(rejection.threshold, 0.6);
        }
        Selection::Accepted(best) => panic!("mean model accepted with {}", best.score),
    }
}

#[test]
fn test_persisted_winner_predicts_like_original() {
    let (train, test) = matrices(200, 60);
    let mut catalog = ModelCatalog::new()
        .with("Lasso", CandidateModel::Lasso(LassoRegression::new(1.0)))
        .unwrap()
        .with("Decision Tree", CandidateModel::DecisionTree(DecisionTreeRegressor::new().with_max_depth(6)))
        .unwrap();
    let selector = ModelSelector::new(0.0, ArtifactStore::new(ArtifactFormat::Binary));
    let report = selector.evaluate_model(&train, &test, &mut catalog).unwrap();
    let best = selector.select_best(&report, catalog).unwrap().into_result().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    let score = selector.persist_best(&best, &path).unwrap();
    assert_eq!(score, best.score);

    let artifact: Artifact<CandidateModel> = ArtifactStore::new(ArtifactFormat::Binary).load(&path).unwrap();
    assert_eq!(artifact.metadata.name, best.name);

    let features = test.slice(ndarray::s![.., ..test.ncols() - 1]).to_owned();
    assert_eq!(
        artifact.payload.predict(&features).unwrap(),
        best.model.predict(&features).unwrap()
    );
}
