//! Model training and selection
//!
//! Provides the regressor families evaluated for every run:
//! - Ordinary least squares, Ridge and Lasso
//! - K-Nearest Neighbors
//! - Decision trees and Random Forests
//! - XGBoost-style gradient boosting
//! - AdaBoost.R2
//!
//! plus the catalog that names them and the selector that scores them.

mod catalog;
mod models;
mod selector;
pub mod adaboost;
pub mod decision_tree;
pub mod knn;
pub mod linear_models;
pub mod random_forest;
pub mod xgboost;

pub use adaboost::{AdaBoostLoss, AdaBoostRegressor};
pub use catalog::{CandidateModel, CatalogEntry, ModelCatalog, DEFAULT_MODEL_NAMES};
pub use decision_tree::{DecisionTreeRegressor, TreeNode};
pub use knn::{DistanceMetric, KNNConfig, KNNRegressor, WeightScheme};
pub use linear_models::{LassoRegression, LinearRegression, RidgeRegression};
pub use models::{r2_score, RegressionMetrics, Regressor};
pub use random_forest::RandomForestRegressor;
pub use selector::{BestModel, EvaluationReport, ModelScore, ModelSelector, Rejection, Selection};
pub use xgboost::{XGBoostConfig, XGBoostRegressor};
