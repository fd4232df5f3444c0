//! Data preprocessing module
//!
//! Turns raw tables into numeric matrices:
//! - Missing value imputation (mean, median, most frequent, constant)
//! - One-hot encoding with sorted categories
//! - Feature scaling (standard, min-max, max-abs)
//! - Column-group feature plans fitted once and reapplied

mod config;
mod encoder;
mod imputer;
mod plan;
mod scaler;
mod transformer;

pub use config::FeatureSchema;
pub use encoder::OneHotEncoder;
pub use imputer::{ImputeStrategy, ImputeValue, Imputer};
pub use plan::{ColumnGroup, ColumnKind, FeaturePlan, Recipe, RecipeStep};
pub use scaler::{Scaler, ScalerType};
pub use transformer::{FeatureTransformer, TransformOutput, CATEGORICAL_GROUP, NUMERIC_GROUP};
