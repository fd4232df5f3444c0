//! One-hot encoding of categorical columns

use super::imputer::column_series;
use crate::error::{PipelineError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnCategories {
    column: String,
    /// Sorted, unique
    categories: Vec<String>,
}

/// One-hot encoder over string columns.
///
/// Categories are learned per column and kept in lexicographic order. Output
/// columns follow the fitted column order, then category order. Values not
/// seen during fitting are rejected rather than encoded as all zeros.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OneHotEncoder {
    columns: Vec<ColumnCategories>,
    is_fitted: bool,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Learned categories for `column`
    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.categories.as_slice())
    }

    /// Number of output columns
    pub fn n_output_features(&self) -> usize {
        self.columns.iter().map(|c| c.categories.len()).sum()
    }

    /// Output column names, `<column>_<category>`
    pub fn feature_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .flat_map(|c| {
                c.categories
                    .iter()
                    .map(move |cat| format!("{}_{}", c.column, cat))
            })
            .collect()
    }

    /// Fit the encoder to the given columns of `df`
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        let mut fitted = Vec::with_capacity(columns.len());
        for col_name in columns {
            let series = column_series(df, col_name)?;
            let ca = string_values(series, col_name)?;

            let categories: BTreeSet<&str> = ca.into_iter().flatten().collect();
            if categories.is_empty() {
                return Err(PipelineError::transformation(
                    "one_hot_encoder",
                    Some(col_name),
                    PipelineError::InvalidInput("column has no categories to learn".to_string()),
                ));
            }

            fitted.push(ColumnCategories {
                column: col_name.to_string(),
                categories: categories.into_iter().map(str::to_string).collect(),
            });
        }

        self.columns = fitted;
        self.is_fitted = true;
        Ok(self)
    }

    /// Encode the fitted columns of `df` into a dense indicator matrix
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }

        let mut out = Array2::zeros((df.height(), self.n_output_features()));
        let mut offset = 0;
        for fitted in &self.columns {
            let series = column_series(df, &fitted.column)?;
            let ca = string_values(series, &fitted.column)?;

            for (row, value) in ca.into_iter().enumerate() {
                let value = value.ok_or_else(|| {
                    PipelineError::transformation(
                        "one_hot_encoder",
                        Some(&fitted.column),
                        PipelineError::InvalidInput(format!("missing value at row {}", row)),
                    )
                })?;
                let idx = fitted
                    .categories
                    .binary_search_by(|c| c.as_str().cmp(value))
                    .map_err(|_| {
                        PipelineError::transformation(
                            "one_hot_encoder",
                            Some(&fitted.column),
                            PipelineError::UnknownCategory {
                                column: fitted.column.clone(),
                                value: value.to_string(),
                            },
                        )
                    })?;
                out[[row, offset + idx]] = 1.0;
            }
            offset += fitted.categories.len();
        }

        Ok(out)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<Array2<f64>> {
        self.fit(df, columns)?;
        self.transform(df)
    }
}

fn string_values<'a>(series: &'a Series, column: &str) -> Result<&'a StringChunked> {
    series.str().map_err(|_| {
        PipelineError::transformation(
            "one_hot_encoder",
            Some(column),
            PipelineError::InvalidInput(format!(
                "expected a string column, found dtype {}",
                series.dtype()
            )),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn train_df() -> DataFrame {
        df! {
            "lunch" => ["standard", "free/reduced", "standard"],
            "gender" => ["male", "female", "female"],
        }
        .unwrap()
    }

    #[test]
    fn test_categories_sorted() {
        let mut encoder = OneHotEncoder::new();
        encoder.fit(&train_df(), &["lunch", "gender"]).unwrap();
        assert_eq!(
            encoder.categories("lunch").unwrap(),
            &["free/reduced".to_string(), "standard".to_string()]
        );
        assert_eq!(
            encoder.feature_names(),
            vec!["lunch_free/reduced", "lunch_standard", "gender_female", "gender_male"]
        );
    }

    #[test]
    fn test_transform_indicator_layout() {
        let mut encoder = OneHotEncoder::new();
        let x = encoder.fit_transform(&train_df(), &["lunch", "gender"]).unwrap();
        assert_eq!(x.dim(), (3, 4));
        assert_eq!(x.row(0).to_vec(), vec![0.0, 1.0, 0.0, 1.0]);
        assert_eq!(x.row(1).to_vec(), vec![1.0, 0.0, 1.0, 0.0]);
        for row in x.rows() {
            assert_eq!(row.sum(), 2.0);
        }
    }

    #[test]
    fn test_unknown_category_rejected() {
        let mut encoder = OneHotEncoder::new();
        encoder.fit(&train_df(), &["lunch"]).unwrap();

        let test = df! { "lunch" => ["standard", "deluxe"] }.unwrap();
        let err = encoder.transform(&test).unwrap_err();
        match err {
            PipelineError::TransformationError { column, source, .. } => {
                assert_eq!(column.as_deref(), Some("lunch"));
                assert!(matches!(*source, PipelineError::UnknownCategory { ref value, .. } if value == "deluxe"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_numeric_column_rejected() {
        let df = df! { "n" => [1.0, 2.0] }.unwrap();
        let mut encoder = OneHotEncoder::new();
        assert!(encoder.fit(&df, &["n"]).is_err());
    }
}
