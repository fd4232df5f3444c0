//! Feature transformation stage
//!
//! Turns raw train/test tables into numeric matrices with the target as the
//! last column, and persists the fitted plan.

use super::config::FeatureSchema;
use super::imputer::is_numeric_dtype;
use super::plan::{ColumnGroup, ColumnKind, FeaturePlan, RecipeStep};
use super::{ImputeStrategy, ScalerType};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::export::{Artifact, ArtifactKind, ArtifactMetadata, ArtifactStore};
use ndarray::{concatenate, Array1, Array2, Axis};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Group names used by the default plan
pub const NUMERIC_GROUP: &str = "num_pipeline";
pub const CATEGORICAL_GROUP: &str = "cat_pipeline";

/// Result of [`FeatureTransformer::fit_transform`]
#[derive(Debug, Clone)]
pub struct TransformOutput {
    /// Transformed training features, target last
    pub train: Array2<f64>,
    /// Transformed test features, target last
    pub test: Array2<f64>,
    /// Where the fitted plan was written
    pub plan_path: PathBuf,
    /// The fitted plan itself
    pub plan: FeaturePlan,
}

impl TransformOutput {
    /// Feature names followed by the target name
    pub fn column_names(&self, target_column: &str) -> Vec<String> {
        let mut names = self.plan.feature_names();
        names.push(target_column.to_string());
        names
    }
}

/// Builds, fits and persists the feature plan for a fixed schema
#[derive(Debug, Clone)]
pub struct FeatureTransformer {
    schema: FeatureSchema,
    plan_path: PathBuf,
    store: ArtifactStore,
}

impl FeatureTransformer {
    pub fn new(schema: FeatureSchema, plan_path: impl Into<PathBuf>, store: ArtifactStore) -> Self {
        Self {
            schema,
            plan_path: plan_path.into(),
            store,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.schema.clone(),
            config.preprocessor_path.clone(),
            ArtifactStore::new(config.artifact_format),
        )
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn plan_path(&self) -> &Path {
        &self.plan_path
    }

    /// Unfitted plan for the configured schema.
    ///
    /// Numeric columns: median imputation then scaling without centering.
    /// Categorical columns: most-frequent imputation, one-hot encoding, then
    /// scaling without centering.
    pub fn build_plan(&self) -> Result<FeaturePlan> {
        let scale = RecipeStep::Scale(ScalerType::Standard { with_mean: false });
        let mut groups = Vec::with_capacity(2);
        if !self.schema.numeric_columns.is_empty() {
            groups.push(ColumnGroup::new(
                NUMERIC_GROUP,
                ColumnKind::Numeric,
                self.schema.numeric_columns.iter().cloned(),
                vec![RecipeStep::Impute(ImputeStrategy::Median), scale.clone()],
            ));
        }
        if !self.schema.categorical_columns.is_empty() {
            groups.push(ColumnGroup::new(
                CATEGORICAL_GROUP,
                ColumnKind::Categorical,
                self.schema.categorical_columns.iter().cloned(),
                vec![
                    RecipeStep::Impute(ImputeStrategy::MostFrequent),
                    RecipeStep::OneHot,
                    scale,
                ],
            ));
        }

        let plan = FeaturePlan::new(groups)?;
        plan.validate_against_target(&self.schema.target_column)?;
        Ok(plan)
    }

    /// Fit the plan on `train`, apply it to both tables, append each target as
    /// the last column and persist the fitted plan.
    ///
    /// The test table is only transformed, never fitted on.
    pub fn fit_transform(
        &self,
        train: &DataFrame,
        test: &DataFrame,
        target_column: &str,
    ) -> Result<TransformOutput> {
        let start = Instant::now();

        self.check_table(train, "train", target_column)?;
        self.check_table(test, "test", target_column)?;
        let train_target = extract_target(train, "train", target_column)?;
        let test_target = extract_target(test, "test", target_column)?;

        let mut plan = self.build_plan()?;
        plan.validate_against_target(target_column)?;

        let train_x = plan.fit_transform(train)?;
        let test_x = plan.transform(test)?;
        debug!(
            features = plan.n_features(),
            train_rows = train_x.nrows(),
            test_rows = test_x.nrows(),
            "Applied feature plan"
        );

        let train = append_target(train_x, train_target)?;
        let test = append_target(test_x, test_target)?;

        let artifact = Artifact::new(
            ArtifactMetadata::new(ArtifactKind::Preprocessor, "feature_plan")
                .with_feature_names(plan.feature_names()),
            &plan,
        );
        self.store.store(&self.plan_path, &artifact)?;

        info!(
            path = %self.plan_path.display(),
            columns = train.ncols(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Feature plan fitted and saved"
        );

        Ok(TransformOutput {
            train,
            test,
            plan_path: self.plan_path.clone(),
            plan,
        })
    }

    fn check_table(&self, df: &DataFrame, label: &str, target_column: &str) -> Result<()> {
        let present: Vec<&str> = df.get_column_names().into_iter().map(|n| n.as_str()).collect();
        let missing: Vec<&str> = self
            .schema
            .feature_columns()
            .chain(std::iter::once(target_column))
            .filter(|c| !present.contains(c))
            .collect();

        if !missing.is_empty() {
            return Err(PipelineError::DataError(format!(
                "{} table is missing column(s): {}",
                label,
                missing.join(", ")
            )));
        }
        if df.height() == 0 {
            return Err(PipelineError::DataError(format!("{} table has no rows", label)));
        }
        Ok(())
    }
}

fn extract_target(df: &DataFrame, label: &str, target_column: &str) -> Result<Array1<f64>> {
    let series = df
        .column(target_column)
        .map_err(|_| {
            PipelineError::DataError(format!("{} table is missing target '{}'", label, target_column))
        })?
        .as_materialized_series();

    if !is_numeric_dtype(series.dtype()) {
        return Err(PipelineError::DataError(format!(
            "target '{}' in {} table must be numeric, found {}",
            target_column,
            label,
            series.dtype()
        )));
    }

    let cast = series.cast(&DataType::Float64)?;
    cast.f64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| match v {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(PipelineError::DataError(format!(
                "target '{}' in {} table has a missing value at row {}",
                target_column, label, row
            ))),
        })
        .collect()
}

fn append_target(features: Array2<f64>, target: Array1<f64>) -> Result<Array2<f64>> {
    let target = target.insert_axis(Axis(1));
    Ok(concatenate(Axis(1), &[features.view(), target.view()])?)
}
