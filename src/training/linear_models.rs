//! Linear model implementations

use super::models::{check_fit_input, check_predict_input, Regressor};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Solve a symmetric positive-definite system `a * x = b` by Cholesky
/// decomposition. Returns `None` when `a` is not positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    // A = L * L^T
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // Forward substitution: L * y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Gauss-Jordan elimination with partial pivoting (fallback)
fn gauss_jordan_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut aug = Array2::<f64>::zeros((n, n + 1));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = a[[i, j]];
        }
        aug[[i, n]] = b[i];
    }

    for col in 0..n {
        let mut max_row = col;
        for row in col + 1..n {
            if aug[[row, col]].abs() > aug[[max_row, col]].abs() {
                max_row = row;
            }
        }
        if max_row != col {
            for j in 0..=n {
                aug.swap([col, j], [max_row, j]);
            }
        }
        if aug[[col, col]].abs() < 1e-12 {
            return None;
        }

        let pivot = aug[[col, col]];
        for j in 0..=n {
            aug[[col, j]] /= pivot;
        }
        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                for j in 0..=n {
                    aug[[row, j]] -= factor * aug[[col, j]];
                }
            }
        }
    }

    Some(aug.column(n).to_owned())
}

/// Solve `(X^T X + ridge * I) w = X^T y`
fn solve_normal_equations(x: &Array2<f64>, y: &Array1<f64>, ridge: f64) -> Result<Array1<f64>> {
    let mut xtx = x.t().dot(x);
    for i in 0..xtx.nrows() {
        xtx[[i, i]] += ridge;
    }
    let xty = x.t().dot(y);

    cholesky_solve(&xtx, &xty)
        .or_else(|| gauss_jordan_solve(&xtx, &xty))
        .ok_or_else(|| PipelineError::ComputationError("Matrix is singular, cannot solve least squares".to_string()))
}

/// Centered copies of `x` and `y` plus their means
struct Centered {
    x: Array2<f64>,
    y: Array1<f64>,
    x_mean: Array1<f64>,
    y_mean: f64,
}

fn center(x: &Array2<f64>, y: &Array1<f64>, fit_intercept: bool) -> Result<Centered> {
    if !fit_intercept {
        return Ok(Centered {
            x: x.clone(),
            y: y.clone(),
            x_mean: Array1::zeros(x.ncols()),
            y_mean: 0.0,
        });
    }
    let x_mean = x
        .mean_axis(Axis(0))
        .ok_or_else(|| PipelineError::InvalidInput("cannot fit on zero rows".to_string()))?;
    let y_mean = y.mean().unwrap_or(0.0);
    Ok(Centered {
        x: x - &x_mean.view().insert_axis(Axis(0)),
        y: y - y_mean,
        x_mean,
        y_mean,
    })
}

/// Fitted weights shared by the linear families
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LinearFit {
    coefficients: Array1<f64>,
    intercept: f64,
}

impl LinearFit {
    fn from_centered(coefficients: Array1<f64>, c: &Centered) -> Self {
        let intercept = c.y_mean - coefficients.dot(&c.x_mean);
        Self {
            coefficients,
            intercept,
        }
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_predict_input(x, self.coefficients.len())?;
        Ok(x.dot(&self.coefficients) + self.intercept)
    }
}

/// Ordinary least squares.
///
/// A diagonal jitter relative to the mean feature energy keeps rank-deficient
/// designs solvable (e.g. one-hot blocks whose columns sum to a constant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    pub fit_intercept: bool,
    fitted: Option<LinearFit>,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    /// Create a new linear regression model
    pub fn new() -> Self {
        Self {
            fit_intercept: true,
            fitted: None,
        }
    }

    /// Enable/disable fitting intercept
    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.fitted.as_ref().map(|f| &f.coefficients)
    }

    pub fn intercept(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.intercept)
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let c = center(x, y, self.fit_intercept)?;

        let energy = c.x.iter().map(|v| v * v).sum::<f64>() / x.ncols().max(1) as f64;
        let jitter = 1e-10 * energy.max(1.0);
        let coefficients = solve_normal_equations(&c.x, &c.y, jitter)?;

        self.fitted = Some(LinearFit::from_centered(coefficients, &c));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(PipelineError::ModelNotFitted)?.predict(x)
    }

    fn name(&self) -> &str {
        "LinearRegression"
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.coefficients().map(|c| c.mapv(f64::abs))
    }
}

/// Ridge Regression (L2-regularized linear regression)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegression {
    pub fit_intercept: bool,
    /// L2 regularization strength
    pub alpha: f64,
    fitted: Option<LinearFit>,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            fit_intercept: true,
            alpha,
            fitted: None,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.fitted.as_ref().map(|f| &f.coefficients)
    }
}

impl Regressor for RidgeRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.alpha.is_nan() || self.alpha < 0.0 {
            return Err(PipelineError::InvalidInput(format!("ridge alpha must be >= 0, got {}", self.alpha)));
        }
        let c = center(x, y, self.fit_intercept)?;
        let coefficients = solve_normal_equations(&c.x, &c.y, self.alpha)?;
        self.fitted = Some(LinearFit::from_centered(coefficients, &c));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(PipelineError::ModelNotFitted)?.predict(x)
    }

    fn name(&self) -> &str {
        "RidgeRegression"
    }
}

/// Lasso Regression (L1-regularized via coordinate descent).
///
/// Minimizes `1/(2n) * ||y - Xw||^2 + alpha * ||w||_1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LassoRegression {
    pub fit_intercept: bool,
    /// L1 regularization strength
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
    fitted: Option<LinearFit>,
}

impl Default for LassoRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl LassoRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            fit_intercept: true,
            alpha,
            max_iter: 1000,
            tol: 1e-6,
            fitted: None,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.fitted.as_ref().map(|f| &f.coefficients)
    }

    /// Soft-threshold operator for L1 proximal step
    fn soft_threshold(val: f64, threshold: f64) -> f64 {
        if val > threshold {
            val - threshold
        } else if val < -threshold {
            val + threshold
        } else {
            0.0
        }
    }
}

impl Regressor for LassoRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n_samples = x.nrows();
        let n_features = x.ncols();
        let c = center(x, y, self.fit_intercept)?;

        let col_norms: Vec<f64> = (0..n_features)
            .map(|j| c.x.column(j).mapv(|v| v * v).sum())
            .collect();

        let mut w = Array1::<f64>::zeros(n_features);
        let lambda = self.alpha * n_samples as f64;
        let mut r = c.y.clone();

        for _ in 0..self.max_iter {
            let mut max_delta = 0.0_f64;
            for j in 0..n_features {
                if col_norms[j] < 1e-15 {
                    continue;
                }
                let xj = c.x.column(j);
                let rho = xj.dot(&r) + col_norms[j] * w[j];
                let new_wj = Self::soft_threshold(rho, lambda) / col_norms[j];
                let delta = w[j] - new_wj;
                if delta != 0.0 {
                    r.scaled_add(delta, &xj);
                    w[j] = new_wj;
                }
                max_delta = max_delta.max(delta.abs());
            }
            if max_delta < self.tol {
                break;
            }
        }

        self.fitted = Some(LinearFit::from_centered(w, &c));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(PipelineError::ModelNotFitted)?.predict(x)
    }

    fn name(&self) -> &str {
        "LassoRegression"
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.coefficients().map(|c| c.mapv(f64::abs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::models::r2_score;
    use ndarray::array;

    #[test]
    fn test_linear_regression_simple() {
        let x = array![
            [1.0, 1.0],
            [2.0, 1.0],
            [1.0, 2.0],
            [2.0, 2.0],
            [3.0, 1.0],
        ];
        // y = 2*x1 + 3*x2 + 1
        let y = array![6.0, 8.0, 9.0, 11.0, 10.0];

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients().unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-6);
        assert!((coef[1] - 3.0).abs() < 1e-6);
        assert!((model.intercept().unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_linear_regression_collinear_columns() {
        // Last two columns always sum to 1, like a one-hot block
        let x = array![
            [1.0, 1.0, 0.0],
            [2.0, 0.0, 1.0],
            [3.0, 1.0, 0.0],
            [4.0, 0.0, 1.0],
            [5.0, 1.0, 0.0],
        ];
        let y = array![3.0, 7.0, 7.0, 11.0, 11.0];

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();
        let r2 = r2_score(&y, &model.predict(&x).unwrap()).unwrap();
        assert!(r2 > 0.999, "R² = {}", r2);
    }

    #[test]
    fn test_ridge_regression() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let mut model = RidgeRegression::new(0.1);
        model.fit(&x, &y).unwrap();
        let r2 = r2_score(&y, &model.predict(&x).unwrap()).unwrap();
        assert!(r2 > 0.95, "Ridge R² = {}", r2);
    }

    #[test]
    fn test_lasso_regression() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let mut model = LassoRegression::new(0.01);
        model.fit(&x, &y).unwrap();
        let r2 = r2_score(&y, &model.predict(&x).unwrap()).unwrap();
        assert!(r2 > 0.9, "Lasso R² = {}", r2);
        // All-zero column never gets weight
        assert_eq!(model.coefficients().unwrap()[1], 0.0);
    }

    #[test]
    fn test_lasso_large_alpha_predicts_mean() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![1.0, 2.0, 3.0];
        let mut model = LassoRegression::new(100.0);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), array![2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = RidgeRegression::default();
        assert!(matches!(
            model.predict(&array![[1.0]]),
            Err(PipelineError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_predict_wrong_width() {
        let mut model = LinearRegression::new();
        model.fit(&array![[1.0], [2.0]], &array![1.0, 2.0]).unwrap();
        assert!(matches!(
            model.predict(&array![[1.0, 2.0]]),
            Err(PipelineError::ShapeError { .. })
        ));
    }
}
