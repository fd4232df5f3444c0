//! Candidate model catalog

use super::adaboost::AdaBoostRegressor;
use super::decision_tree::DecisionTreeRegressor;
use super::knn::KNNRegressor;
use super::linear_models::{LassoRegression, LinearRegression, RidgeRegression};
use super::models::Regressor;
use super::random_forest::RandomForestRegressor;
use super::xgboost::{XGBoostConfig, XGBoostRegressor};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// One variant per supported algorithm family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CandidateModel {
    LinearRegression(LinearRegression),
    Lasso(LassoRegression),
    Ridge(RidgeRegression),
    KNeighbors(KNNRegressor),
    DecisionTree(DecisionTreeRegressor),
    RandomForest(RandomForestRegressor),
    XGBoost(XGBoostRegressor),
    AdaBoost(AdaBoostRegressor),
}

macro_rules! dispatch {
    ($self:expr, $m:ident => $body:expr) => {
        match $self {
            CandidateModel::LinearRegression($m) => $body,
            CandidateModel::Lasso($m) => $body,
            CandidateModel::Ridge($m) => $body,
            CandidateModel::KNeighbors($m) => $body,
            CandidateModel::DecisionTree($m) => $body,
            CandidateModel::RandomForest($m) => $body,
            CandidateModel::XGBoost($m) => $body,
            CandidateModel::AdaBoost($m) => $body,
        }
    };
}

impl Regressor for CandidateModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        dispatch!(self, m => m.fit(x, y))
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        dispatch!(self, m => m.predict(x))
    }

    fn name(&self) -> &str {
        dispatch!(self, m => m.name())
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        dispatch!(self, m => m.feature_importances())
    }
}

/// A named, not necessarily fitted, model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry<M> {
    pub name: String,
    pub model: M,
}

/// Ordered collection of uniquely named candidate models.
///
/// Iteration follows insertion order, which also decides ties during selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCatalog<M = CandidateModel> {
    entries: Vec<CatalogEntry<M>>,
}

impl<M> Default for ModelCatalog<M> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<M: Regressor> ModelCatalog<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a model; names must be unique and non-empty
    pub fn insert(&mut self, name: impl Into<String>, model: M) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(PipelineError::ConfigError("model name must not be empty".to_string()));
        }
        if self.contains(&name) {
            return Err(PipelineError::ConfigError(format!(
                "model '{}' is already in the catalog",
                name
            )));
        }
        self.entries.push(CatalogEntry { name, model });
        Ok(())
    }

    /// Builder-style [`ModelCatalog::insert`]
    pub fn with(mut self, name: impl Into<String>, model: M) -> Result<Self> {
        self.insert(name, model)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&M> {
        self.entries.iter().find(|e| e.name == name).map(|e| &e.model)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut M> {
        self.entries.iter_mut().find(|e| e.name == name).map(|e| &mut e.model)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Remove and return a model, handing ownership to the caller
    pub fn take(&mut self, name: &str) -> Option<M> {
        let pos = self.entries.iter().position(|e| e.name == name)?;
        Some(self.entries.remove(pos).model)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry<M>> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CatalogEntry<M>> {
        self.entries.iter_mut()
    }
}

/// Names of the default catalog entries, in catalog order
pub const DEFAULT_MODEL_NAMES: [&str; 8] = [
    "Linear Regression",
    "Lasso",
    "Ridge",
    "K-Neighbors Regression",
    "Decision Tree",
    "Random Forest Regressor",
    "XGBRegressor",
    "AdaBoost Regressor",
];

impl ModelCatalog<CandidateModel> {
    /// The eight default regressors with their stock hyperparameters.
    /// Randomized models draw from `random_state`.
    pub fn default_catalog(random_state: u64) -> Self {
        let models = [
            CandidateModel::LinearRegression(LinearRegression::new()),
            CandidateModel::Lasso(LassoRegression::new(1.0)),
            CandidateModel::Ridge(RidgeRegression::new(1.0)),
            CandidateModel::KNeighbors(KNNRegressor::with_k(5)),
            CandidateModel::DecisionTree(DecisionTreeRegressor::new().with_random_state(random_state)),
            CandidateModel::RandomForest(
                RandomForestRegressor::new()
                    .with_n_estimators(100)
                    .with_bootstrap(true)
                    .with_random_state(random_state),
            ),
            CandidateModel::XGBoost(XGBoostRegressor::new(XGBoostConfig {
                random_state,
                ..XGBoostConfig::default()
            })),
            CandidateModel::AdaBoost(AdaBoostRegressor::new(50, 1.0).with_random_state(random_state)),
        ];

        Self {
            entries: DEFAULT_MODEL_NAMES
                .iter()
                .zip(models)
                .map(|(name, model)| CatalogEntry {
                    name: name.to_string(),
                    model,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_order() {
        let catalog = ModelCatalog::default_catalog(42);
        assert_eq!(catalog.len(), 8);
        assert_eq!(catalog.names().collect::<Vec<_>>(), DEFAULT_MODEL_NAMES.to_vec());
        assert_eq!(catalog.get("Ridge").unwrap().name(), "RidgeRegression");
        assert_eq!(catalog.get("AdaBoost Regressor").unwrap().name(), "AdaBoostRegressor");
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut catalog = ModelCatalog::new();
        catalog
            .insert("Ridge", CandidateModel::Ridge(RidgeRegression::default()))
            .unwrap();
        let err = catalog
            .insert("Ridge", CandidateModel::Ridge(RidgeRegression::new(2.0)))
            .unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError(_)));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_take_transfers_ownership() {
        let mut catalog = ModelCatalog::default_catalog(1);
        let model = catalog.take("Lasso").unwrap();
        assert!(matches!(model, CandidateModel::Lasso(_)));
        assert!(!catalog.contains("Lasso"));
        assert!(catalog.take("Lasso").is_none());
    }

    #[test]
    fn test_candidate_dispatch_fits() {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| (i + j) as f64);
        let y = Array1::from_shape_fn(20, |i| 2.0 * i as f64);
        let mut model = CandidateModel::DecisionTree(DecisionTreeRegressor::new());
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }
}
