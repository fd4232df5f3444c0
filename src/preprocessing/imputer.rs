//! Missing value imputation strategies

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Strategy for imputing missing values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Replace with mean (numeric only)
    Mean,
    /// Replace with median (numeric only)
    Median,
    /// Replace with the most frequent value; ties go to the smallest value
    MostFrequent,
    /// Replace with a constant value
    Constant(f64),
    /// Replace with a constant string (categorical)
    ConstantString(String),
}

/// Learned replacement for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputeValue {
    Numeric(f64),
    String(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnFill {
    column: String,
    value: ImputeValue,
}

/// Imputer for handling missing values.
///
/// Numeric columns are read as `Float64`; NaN counts as missing just like null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    fill_values: Vec<ColumnFill>,
    is_fitted: bool,
}

impl Imputer {
    /// Create a new imputer with the specified strategy
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            fill_values: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn strategy(&self) -> &ImputeStrategy {
        &self.strategy
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Learned replacement for `column`, if fitted
    pub fn fill_value(&self, column: &str) -> Option<&ImputeValue> {
        self.fill_values
            .iter()
            .find(|f| f.column == column)
            .map(|f| &f.value)
    }

    /// Fit the imputer to the given columns of `df`
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        let mut fills = Vec::with_capacity(columns.len());
        for col_name in columns {
            let series = column_series(df, col_name)?;
            let value = self
                .compute_fill_value(series)
                .map_err(|e| PipelineError::transformation("imputer", Some(col_name), e))?;
            fills.push(ColumnFill {
                column: col_name.to_string(),
                value,
            });
        }

        self.fill_values = fills;
        self.is_fitted = true;
        Ok(self)
    }

    /// Replace missing values in every fitted column
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }

        let mut result = df.clone();
        for fill in &self.fill_values {
            let series = column_series(df, &fill.column)?;
            let filled = fill_series(series, &fill.value).map_err(|e| {
                PipelineError::transformation("imputer", Some(&fill.column), e)
            })?;
            result.with_column(filled)?;
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    fn compute_fill_value(&self, series: &Series) -> Result<ImputeValue> {
        match &self.strategy {
            ImputeStrategy::Mean => {
                let values = observed_numeric(series)?;
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                Ok(ImputeValue::Numeric(mean))
            }
            ImputeStrategy::Median => {
                let mut values = observed_numeric(series)?;
                values.sort_by(f64::total_cmp);
                let mid = values.len() / 2;
                let median = if values.len() % 2 == 0 {
                    (values[mid - 1] + values[mid]) / 2.0
                } else {
                    values[mid]
                };
                Ok(ImputeValue::Numeric(median))
            }
            ImputeStrategy::MostFrequent => {
                if is_numeric_dtype(series.dtype()) {
                    mode_numeric(series).map(ImputeValue::Numeric)
                } else {
                    mode_string(series).map(ImputeValue::String)
                }
            }
            ImputeStrategy::Constant(val) => Ok(ImputeValue::Numeric(*val)),
            ImputeStrategy::ConstantString(val) => Ok(ImputeValue::String(val.clone())),
        }
    }
}

/// Check if dtype is numeric
pub(crate) fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

pub(crate) fn column_series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| PipelineError::DataError(format!("column '{}' not found", name)))
}

/// Numeric view of a series with NaN folded into null
fn as_f64(series: &Series) -> Result<Float64Chunked> {
    if !is_numeric_dtype(series.dtype()) {
        return Err(PipelineError::InvalidInput(format!(
            "expected a numeric column, found dtype {}",
            series.dtype()
        )));
    }
    let cast = series.cast(&DataType::Float64)?;
    let ca = cast.f64()?;
    Ok(ca
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect::<Float64Chunked>()
        .with_name(series.name().clone()))
}

fn observed_numeric(series: &Series) -> Result<Vec<f64>> {
    let values: Vec<f64> = as_f64(series)?.into_iter().flatten().collect();
    if values.is_empty() {
        return Err(PipelineError::InvalidInput(
            "column has no observed values to learn from".to_string(),
        ));
    }
    Ok(values)
}

fn mode_numeric(series: &Series) -> Result<f64> {
    let mut values = observed_numeric(series)?;
    values.sort_by(f64::total_cmp);

    // Runs of equal values in ascending order; strict `>` keeps the smallest on ties
    let mut best = (values[0], 0usize);
    let mut run_start = 0;
    for i in 1..=values.len() {
        if i == values.len() || values[i] != values[run_start] {
            let count = i - run_start;
            if count > best.1 {
                best = (values[run_start], count);
            }
            run_start = i;
        }
    }
    Ok(best.0)
}

fn mode_string(series: &Series) -> Result<String> {
    let ca = series.str()?;
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for val in ca.into_iter().flatten() {
        *counts.entry(val).or_insert(0) += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (val, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((val, count));
        }
    }
    best.map(|(v, _)| v.to_string()).ok_or_else(|| {
        PipelineError::InvalidInput("column has no observed values to learn from".to_string())
    })
}

fn fill_series(series: &Series, fill_value: &ImputeValue) -> Result<Series> {
    match fill_value {
        ImputeValue::Numeric(val) => {
            let filled: Float64Chunked = as_f64(series)?
                .into_iter()
                .map(|opt| Some(opt.unwrap_or(*val)))
                .collect();
            Ok(filled.with_name(series.name().clone()).into_series())
        }
        ImputeValue::String(val) => {
            let ca = series.str()?;
            let filled: StringChunked = ca
                .into_iter()
                .map(|opt| Some(opt.unwrap_or(val.as_str())))
                .collect();
            Ok(filled.with_name(series.name().clone()).into_series())
        }
    }
}
