//! AdaBoost.R2 (adaptive boosting for regression)
//!
//! Each round fits a shallow regression tree on a weighted bootstrap sample,
//! then raises the weight of samples it predicted poorly. Predictions are the
//! weighted median of the ensemble.

use super::decision_tree::DecisionTreeRegressor;
use super::models::{check_fit_input, check_predict_input, Regressor};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How per-sample errors are turned into a loss in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AdaBoostLoss {
    #[default]
    Linear,
    Square,
    Exponential,
}

impl AdaBoostLoss {
    fn apply(self, normalized_error: f64) -> f64 {
        match self {
            AdaBoostLoss::Linear => normalized_error,
            AdaBoostLoss::Square => normalized_error * normalized_error,
            AdaBoostLoss::Exponential => 1.0 - (-normalized_error).exp(),
        }
    }
}

/// AdaBoost.R2 regressor over depth-limited trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostRegressor {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub loss: AdaBoostLoss,
    /// Depth of each base tree
    pub max_depth: usize,
    pub random_state: u64,
    estimators: Vec<DecisionTreeRegressor>,
    estimator_weights: Vec<f64>,
    n_features: usize,
}

impl Default for AdaBoostRegressor {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostRegressor {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            loss: AdaBoostLoss::Linear,
            max_depth: 3,
            random_state: 42,
            estimators: Vec::new(),
            estimator_weights: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_loss(mut self, loss: AdaBoostLoss) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Number of rounds kept after early stopping
    pub fn n_fitted_estimators(&self) -> usize {
        self.estimators.len()
    }

    pub fn estimator_weights(&self) -> &[f64] {
        &self.estimator_weights
    }
}

impl Regressor for AdaBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.n_estimators == 0 {
            return Err(PipelineError::InvalidInput("n_estimators must be at least 1".to_string()));
        }
        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 {
            return Err(PipelineError::InvalidInput("learning_rate must be positive".to_string()));
        }

        let n_samples = x.nrows();
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut sample_weight = Array1::from_elem(n_samples, 1.0 / n_samples as f64);
        let mut estimators = Vec::with_capacity(self.n_estimators);
        let mut weights = Vec::with_capacity(self.n_estimators);

        for round in 0..self.n_estimators {
            let sampler = WeightedIndex::new(sample_weight.iter())
                .map_err(|e| PipelineError::ComputationError(format!("invalid sample weights: {}", e)))?;
            let bootstrap: Vec<usize> = (0..n_samples).map(|_| sampler.sample(&mut rng)).collect();

            let mut tree = DecisionTreeRegressor::new()
                .with_max_depth(self.max_depth)
                .with_random_state(rng.next_u64());
            tree.fit_on(x, y, &bootstrap)?;

            let preds = tree.predict(x)?;
            let mut error = (&preds - y).mapv(f64::abs);
            let error_max = error.fold(0.0_f64, |m, &e| m.max(e));
            if error_max > 0.0 {
                error /= error_max;
            }
            let loss = self.loss;
            error.mapv_inplace(|e| loss.apply(e));

            let estimator_error = (&sample_weight * &error).sum();

            if estimator_error <= 0.0 {
                // Perfect fit; nothing left to boost
                estimators.push(tree);
                weights.push(1.0);
                break;
            }
            if estimator_error >= 0.5 {
                if estimators.is_empty() {
                    estimators.push(tree);
                    weights.push(1.0);
                }
                debug!(round, estimator_error, "AdaBoost stopped early");
                break;
            }

            let beta = estimator_error / (1.0 - estimator_error);
            weights.push(self.learning_rate * (1.0 / beta).ln());
            estimators.push(tree);

            if round + 1 < self.n_estimators {
                let lr = self.learning_rate;
                sample_weight
                    .iter_mut()
                    .zip(error.iter())
                    .for_each(|(w, &e)| *w *= beta.powf((1.0 - e) * lr));
                let total = sample_weight.sum();
                if total.is_nan() || total <= 0.0 {
                    break;
                }
                sample_weight /= total;
            }
        }

        self.estimators = estimators;
        self.estimator_weights = weights;
        self.n_features = x.ncols();
        Ok(())
    }

    /// Weighted median of the per-round predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.estimators.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        check_predict_input(x, self.n_features)?;

        let per_round = self
            .estimators
            .iter()
            .map(|e| e.predict(x))
            .collect::<Result<Vec<_>>>()?;
        let total_weight: f64 = self.estimator_weights.iter().sum();

        let preds: Vec<f64> = (0..x.nrows())
            .map(|i| {
                let mut ranked: Vec<(f64, f64)> = per_round
                    .iter()
                    .zip(&self.estimator_weights)
                    .map(|(p, &w)| (p[i], w))
                    .collect();
                ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

                let half = 0.5 * total_weight;
                let mut cumulative = 0.0;
                for &(value, w) in &ranked {
                    cumulative += w;
                    if cumulative >= half {
                        return value;
                    }
                }
                ranked.last().map_or(0.0, |r| r.0)
            })
            .collect();

        Ok(Array1::from_vec(preds))
    }

    fn name(&self) -> &str {
        "AdaBoostRegressor"
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.estimators.is_empty() {
            return None;
        }
        let total_weight: f64 = self.estimator_weights.iter().sum();
        let mut total = Array1::<f64>::zeros(self.n_features);
        for (tree, &w) in self.estimators.iter().zip(&self.estimator_weights) {
            if let Some(imp) = tree.feature_importances() {
                total.scaled_add(w, &imp);
            }
        }
        if total_weight > 0.0 {
            total /= total_weight;
        }
        Some(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::models::r2_score;

    fn regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((100, 2), |(i, j)| if j == 0 { i as f64 / 10.0 } else { (i % 5) as f64 });
        let y = x.column(0).mapv(|v| (v * 0.8).sin() * 4.0) + x.column(1).mapv(|v| v * 0.5);
        (x, y)
    }

    #[test]
    fn test_adaboost_regressor() {
        let (x, y) = regression_data();
        let mut model = AdaBoostRegressor::default();
        model.fit(&x, &y).unwrap();

        assert!(model.n_fitted_estimators() >= 1);
        assert_eq!(model.n_fitted_estimators(), model.estimator_weights().len());
        let r2 = r2_score(&y, &model.predict(&x).unwrap()).unwrap();
        assert!(r2 > 0.7, "AdaBoost R² = {}", r2);
    }

    #[test]
    fn test_seeded_fit_is_reproducible() {
        let (x, y) = regression_data();
        let mut a = AdaBoostRegressor::new(10, 0.5).with_random_state(9);
        let mut b = AdaBoostRegressor::new(10, 0.5).with_random_state(9);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_constant_target_stops_after_one_round() {
        let x = Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
        let y = Array1::from_elem(10, 3.0);
        let mut model = AdaBoostRegressor::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.n_fitted_estimators(), 1);
        assert!(model.predict(&x).unwrap().iter().all(|&p| p == 3.0));
    }

    #[test]
    fn test_loss_functions() {
        assert_eq!(AdaBoostLoss::Linear.apply(0.5), 0.5);
        assert_eq!(AdaBoostLoss::Square.apply(0.5), 0.25);
        assert!((AdaBoostLoss::Exponential.apply(1.0) - (1.0 - (-1.0f64).exp())).abs() < 1e-15);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = AdaBoostRegressor::default();
        assert!(matches!(
            model.predict(&Array2::zeros((1, 1))),
            Err(PipelineError::ModelNotFitted)
        ));
    }
}
