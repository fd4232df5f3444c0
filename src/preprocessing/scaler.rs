//! Feature scaling implementations

use crate::error::{PipelineError, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScalerType {
    /// Divide by the population standard deviation, optionally centering first
    Standard { with_mean: bool },
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
    /// Max absolute scaling: x / max(|x|)
    MaxAbs,
}

/// Parameters for one fitted column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    center: f64,
    scale: f64,
}

/// Column-wise scaler over dense matrices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl Scaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn scaler_type(&self) -> ScalerType {
        self.scaler_type
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Learn per-column parameters from `x`
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(PipelineError::InvalidInput(
                "cannot fit a scaler on zero rows".to_string(),
            ));
        }

        let scaler_type = self.scaler_type;
        self.params = x
            .axis_iter(Axis(1))
            .map(|col| {
                let n = col.len() as f64;
                let (center, scale) = match scaler_type {
                    ScalerType::Standard { with_mean } => {
                        let mean = col.sum() / n;
                        let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                        (if with_mean { mean } else { 0.0 }, var.sqrt())
                    }
                    ScalerType::MinMax => {
                        let min = col.iter().copied().fold(f64::INFINITY, f64::min);
                        let max = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                        (min, max - min)
                    }
                    ScalerType::MaxAbs => {
                        (0.0, col.iter().fold(0.0_f64, |m, v| m.max(v.abs())))
                    }
                };
                ScalerParams {
                    center,
                    scale: if scale == 0.0 || !scale.is_finite() { 1.0 } else { scale },
                }
            })
            .collect();

        self.is_fitted = true;
        Ok(self)
    }

    /// Scale `x` with the fitted parameters
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_input(x)?;
        let mut out = x.clone();
        for (mut col, p) in out.axis_iter_mut(Axis(1)).zip(&self.params) {
            col.mapv_inplace(|v| (v - p.center) / p.scale);
        }
        Ok(out)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Undo [`Scaler::transform`]
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_input(x)?;
        let mut out = x.clone();
        for (mut col, p) in out.axis_iter_mut(Axis(1)).zip(&self.params) {
            col.mapv_inplace(|v| v * p.scale + p.center);
        }
        Ok(out)
    }

    fn check_input(&self, x: &Array2<f64>) -> Result<()> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }
        if x.ncols() != self.params.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} columns", self.params.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standard_without_mean_divides_by_population_std() {
        let x = array![[1.0, 5.0], [3.0, 5.0]];
        let mut scaler = Scaler::new(ScalerType::Standard { with_mean: false });
        let out = scaler.fit_transform(&x).unwrap();
        // std of [1, 3] with ddof 0 is 1; constant column scales by 1
        assert_eq!(out, array![[1.0, 5.0], [3.0, 5.0]]);

        let x = array![[2.0], [6.0]];
        let out = scaler.fit_transform(&x).unwrap();
        assert_eq!(out, array![[1.0], [3.0]]);
    }

    #[test]
    fn test_standard_with_mean() {
        let x = array![[2.0], [6.0]];
        let mut scaler = Scaler::new(ScalerType::Standard { with_mean: true });
        let out = scaler.fit_transform(&x).unwrap();
        assert_eq!(out, array![[-1.0], [1.0]]);
        assert_eq!(scaler.inverse_transform(&out).unwrap(), x);
    }

    #[test]
    fn test_minmax_scaler() {
        let x = array![[1.0], [3.0], [5.0]];
        let mut scaler = Scaler::new(ScalerType::MinMax);
        let out = scaler.fit_transform(&x).unwrap();
        assert_eq!(out, array![[0.0], [0.5], [1.0]]);
    }

    #[test]
    fn test_column_mismatch() {
        let mut scaler = Scaler::new(ScalerType::MaxAbs);
        scaler.fit(&array![[1.0, -4.0]]).unwrap();
        assert!(matches!(
            scaler.transform(&array![[1.0]]),
            Err(PipelineError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_transform_before_fit() {
        let scaler = Scaler::new(ScalerType::MinMax);
        assert!(matches!(
            scaler.transform(&array![[1.0]]),
            Err(PipelineError::ModelNotFitted)
        ));
    }
}
