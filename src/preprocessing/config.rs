//! Feature schema configuration

use serde::{Deserialize, Serialize};

/// Fixed column layout of the input tables.
///
/// The numeric and categorical groups must partition every non-target
/// feature column; the target is kept aside and reattached last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    /// Continuous columns (median imputation, unit-variance scaling)
    pub numeric_columns: Vec<String>,

    /// Discrete columns (most-frequent imputation, one-hot, unit-variance scaling)
    pub categorical_columns: Vec<String>,

    /// Numeric column to predict
    pub target_column: String,
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self {
            numeric_columns: vec!["writing score".to_string(), "reading score".to_string()],
            categorical_columns: vec![
                "gender".to_string(),
                "race/ethnicity".to_string(),
                "parental level of education".to_string(),
                "lunch".to_string(),
                "test preparation course".to_string(),
            ],
            target_column: "math score".to_string(),
        }
    }
}

impl FeatureSchema {
    /// Create a schema from explicit column groups
    pub fn new<S: Into<String>>(
        numeric_columns: impl IntoIterator<Item = S>,
        categorical_columns: impl IntoIterator<Item = S>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            numeric_columns: numeric_columns.into_iter().map(Into::into).collect(),
            categorical_columns: categorical_columns.into_iter().map(Into::into).collect(),
            target_column: target_column.into(),
        }
    }

    /// All feature columns, numeric first
    pub fn feature_columns(&self) -> impl Iterator<Item = &str> {
        self.numeric_columns
            .iter()
            .chain(self.categorical_columns.iter())
            .map(String::as_str)
    }

    /// Every column a table must carry, target included
    pub fn required_columns(&self) -> impl Iterator<Item = &str> {
        self.feature_columns().chain(std::iter::once(self.target_column.as_str()))
    }
}
