//! Column-group feature plans
//!
//! A [`FeaturePlan`] maps disjoint column groups to an ordered recipe of
//! steps. It is fitted once on training data and then applied unchanged to any
//! other table with the same schema.

use super::encoder::OneHotEncoder;
use super::imputer::{column_series, is_numeric_dtype, ImputeStrategy, Imputer};
use super::scaler::{Scaler, ScalerType};
use crate::error::{PipelineError, Result};
use ndarray::{concatenate, Array2, ArrayView2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Kind of values a column group holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// One step of a group recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecipeStep {
    Impute(ImputeStrategy),
    OneHot,
    Scale(ScalerType),
}

/// Ordered steps applied to a column group
pub type Recipe = Vec<RecipeStep>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FittedGroup {
    imputer: Option<Imputer>,
    encoder: Option<OneHotEncoder>,
    scaler: Option<Scaler>,
    output_names: Vec<String>,
}

/// A named set of columns sharing one recipe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnGroup {
    pub name: String,
    pub kind: ColumnKind,
    pub columns: Vec<String>,
    pub recipe: Recipe,
    fitted: Option<FittedGroup>,
}

impl ColumnGroup {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        kind: ColumnKind,
        columns: impl IntoIterator<Item = S>,
        recipe: Recipe,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            columns: columns.into_iter().map(Into::into).collect(),
            recipe,
            fitted: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    fn validate(&self) -> Result<()> {
        let fail = |msg: String| -> Result<()> {
            Err(PipelineError::ConfigError(format!("group '{}': {}", self.name, msg)))
        };

        if self.columns.is_empty() {
            return fail("has no columns".to_string());
        }

        match self.recipe.first() {
            Some(RecipeStep::Impute(strategy)) => {
                let compatible = match (self.kind, strategy) {
                    (ColumnKind::Numeric, ImputeStrategy::ConstantString(_)) => false,
                    (ColumnKind::Categorical, ImputeStrategy::Mean)
                    | (ColumnKind::Categorical, ImputeStrategy::Median)
                    | (ColumnKind::Categorical, ImputeStrategy::Constant(_)) => false,
                    _ => true,
                };
                if !compatible {
                    return fail(format!("imputation {:?} does not apply to {:?} columns", strategy, self.kind));
                }
            }
            _ => return fail("recipe must start with an Impute step".to_string()),
        }

        let mut one_hot_at = None;
        let mut scale_at = None;
        for (i, step) in self.recipe.iter().enumerate().skip(1) {
            match step {
                RecipeStep::Impute(_) => return fail("recipe has more than one Impute step".to_string()),
                RecipeStep::OneHot => {
                    if one_hot_at.is_some() {
                        return fail("recipe has more than one OneHot step".to_string());
                    }
                    if self.kind != ColumnKind::Categorical {
                        return fail("OneHot only applies to categorical columns".to_string());
                    }
                    one_hot_at = Some(i);
                }
                RecipeStep::Scale(_) => {
                    if scale_at.is_some() {
                        return fail("recipe has more than one Scale step".to_string());
                    }
                    scale_at = Some(i);
                }
            }
        }

        if self.kind == ColumnKind::Categorical && one_hot_at.is_none() {
            return fail("categorical columns need a OneHot step".to_string());
        }
        if let (Some(oh), Some(sc)) = (one_hot_at, scale_at) {
            if sc < oh {
                return fail("Scale must come after OneHot".to_string());
            }
        }
        Ok(())
    }

    fn impute_strategy(&self) -> Result<&ImputeStrategy> {
        match self.recipe.first() {
            Some(RecipeStep::Impute(strategy)) => Ok(strategy),
            _ => Err(PipelineError::ConfigError(format!(
                "group '{}': recipe must start with an Impute step",
                self.name
            ))),
        }
    }

    fn scaler_type(&self) -> Option<ScalerType> {
        self.recipe.iter().find_map(|step| match step {
            RecipeStep::Scale(t) => Some(*t),
            _ => None,
        })
    }

    fn column_refs(&self) -> Vec<&str> {
        self.columns.iter().map(String::as_str).collect()
    }

    fn fit_transform(&mut self, df: &DataFrame) -> Result<Array2<f64>> {
        let columns = self.column_refs();
        let mut fitted = FittedGroup::default();

        let mut imputer = Imputer::new(self.impute_strategy()?.clone());
        let imputed = imputer
            .fit_transform(df, &columns)
            .map_err(|e| within(&self.name, "imputer", e))?;

        let matrix = match self.kind {
            ColumnKind::Numeric => {
                fitted.output_names = self.columns.clone();
                numeric_matrix(&imputed, &columns)
                    .map_err(|e| within(&self.name, "numeric", e))?
            }
            ColumnKind::Categorical => {
                let mut encoder = OneHotEncoder::new();
                let encoded = encoder
                    .fit_transform(&imputed, &columns)
                    .map_err(|e| within(&self.name, "one_hot_encoder", e))?;
                fitted.output_names = encoder.feature_names();
                fitted.encoder = Some(encoder);
                encoded
            }
        };

        let matrix = match self.scaler_type() {
            Some(scaler_type) => {
                let mut scaler = Scaler::new(scaler_type);
                let scaled = scaler
                    .fit_transform(&matrix)
                    .map_err(|e| within(&self.name, "scaler", e))?;
                fitted.scaler = Some(scaler);
                scaled
            }
            None => matrix,
        };

        fitted.imputer = Some(imputer);
        self.fitted = Some(fitted);
        Ok(matrix)
    }

    fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let fitted = self.fitted.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        let columns = self.column_refs();

        let imputed = match &fitted.imputer {
            Some(imputer) => imputer
                .transform(df)
                .map_err(|e| within(&self.name, "imputer", e))?,
            None => return Err(within(&self.name, "imputer", PipelineError::ModelNotFitted)),
        };

        let matrix = match (&self.kind, &fitted.encoder) {
            (ColumnKind::Numeric, _) => numeric_matrix(&imputed, &columns)
                .map_err(|e| within(&self.name, "numeric", e))?,
            (ColumnKind::Categorical, Some(encoder)) => encoder
                .transform(&imputed)
                .map_err(|e| within(&self.name, "one_hot_encoder", e))?,
            (ColumnKind::Categorical, None) => {
                return Err(within(&self.name, "one_hot_encoder", PipelineError::ModelNotFitted))
            }
        };

        match &fitted.scaler {
            Some(scaler) => scaler
                .transform(&matrix)
                .map_err(|e| within(&self.name, "scaler", e)),
            None => Ok(matrix),
        }
    }
}

/// Ordered column groups plus their fitted state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturePlan {
    groups: Vec<ColumnGroup>,
    is_fitted: bool,
}

impl FeaturePlan {
    /// Build a plan, rejecting malformed group definitions
    pub fn new(groups: Vec<ColumnGroup>) -> Result<Self> {
        let plan = Self {
            groups,
            is_fitted: false,
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Check group names, recipes and that groups are disjoint
    pub fn validate(&self) -> Result<()> {
        if self.groups.is_empty() {
            return Err(PipelineError::ConfigError("feature plan has no column groups".to_string()));
        }

        let mut names = HashSet::new();
        let mut seen = HashSet::new();
        for group in &self.groups {
            if group.name.trim().is_empty() {
                return Err(PipelineError::ConfigError("column group name is empty".to_string()));
            }
            if !names.insert(group.name.as_str()) {
                return Err(PipelineError::ConfigError(format!(
                    "duplicate column group '{}'",
                    group.name
                )));
            }
            group.validate()?;
            for column in &group.columns {
                if !seen.insert(column.as_str()) {
                    return Err(PipelineError::ConfigError(format!(
                        "column '{}' appears in more than one group",
                        column
                    )));
                }
            }
        }
        Ok(())
    }

    /// [`FeaturePlan::validate`] plus a check that `target_column` is not used as a feature
    pub fn validate_against_target(&self, target_column: &str) -> Result<()> {
        self.validate()?;
        if let Some(group) = self
            .groups
            .iter()
            .find(|g| g.columns.iter().any(|c| c == target_column))
        {
            return Err(PipelineError::ConfigError(format!(
                "target column '{}' is listed as a feature in group '{}'",
                target_column, group.name
            )));
        }
        Ok(())
    }

    pub fn groups(&self) -> &[ColumnGroup] {
        &self.groups
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Every input column, in output order
    pub fn input_columns(&self) -> Vec<&str> {
        self.groups.iter().flat_map(|g| g.column_refs()).collect()
    }

    /// Output column names. One-hot outputs are named `<column>_<category>`.
    /// Empty until fitted.
    pub fn feature_names(&self) -> Vec<String> {
        self.groups
            .iter()
            .filter_map(|g| g.fitted.as_ref())
            .flat_map(|f| f.output_names.iter().cloned())
            .collect()
    }

    pub fn n_features(&self) -> usize {
        self.groups
            .iter()
            .filter_map(|g| g.fitted.as_ref())
            .map(|f| f.output_names.len())
            .sum()
    }

    /// Fit every group on `df` and return the transformed matrix
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<Array2<f64>> {
        self.is_fitted = false;
        let mut blocks = Vec::with_capacity(self.groups.len());
        for group in &mut self.groups {
            blocks.push(group.fit_transform(df)?);
        }
        self.is_fitted = true;
        stack(blocks, df.height())
    }

    /// Apply the fitted groups to `df` without refitting
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }
        let blocks = self
            .groups
            .iter()
            .map(|g| g.transform(df))
            .collect::<Result<Vec<_>>>()?;
        stack(blocks, df.height())
    }
}

fn stack(blocks: Vec<Array2<f64>>, n_rows: usize) -> Result<Array2<f64>> {
    if blocks.is_empty() {
        return Ok(Array2::zeros((n_rows, 0)));
    }
    let views: Vec<ArrayView2<f64>> = blocks.iter().map(|b| b.view()).collect();
    Ok(concatenate(Axis(1), &views)?)
}

/// Dense matrix from already-imputed numeric columns
fn numeric_matrix(df: &DataFrame, columns: &[&str]) -> Result<Array2<f64>> {
    let mut out = Array2::zeros((df.height(), columns.len()));
    for (j, name) in columns.iter().enumerate() {
        let series = column_series(df, name)?;
        if !is_numeric_dtype(series.dtype()) {
            return Err(PipelineError::transformation(
                "numeric",
                Some(name),
                PipelineError::InvalidInput(format!("expected a numeric column, found dtype {}", series.dtype())),
            ));
        }
        let cast = series.cast(&DataType::Float64)?;
        for (i, value) in cast.f64()?.into_iter().enumerate() {
            out[[i, j]] = value.ok_or_else(|| {
                PipelineError::transformation(
                    "numeric",
                    Some(name),
                    PipelineError::InvalidInput(format!("missing value at row {} after imputation", i)),
                )
            })?;
        }
    }
    Ok(out)
}

/// Attach the group name to a component failure so the stage reads `group/component`
fn within(group: &str, component: &str, err: PipelineError) -> PipelineError {
    match err {
        PipelineError::TransformationError { stage, column, source } => {
            PipelineError::TransformationError {
                stage: format!("{}/{}", group, stage),
                column,
                source,
            }
        }
        PipelineError::DataError(_) => err,
        PipelineError::UnknownCategory { ref column, .. } => {
            let column = column.clone();
            PipelineError::transformation(format!("{}/{}", group, component), Some(&column), err)
        }
        other => PipelineError::transformation(format!("{}/{}", group, component), None, other),
    }
}
