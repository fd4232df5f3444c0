//! XGBoost-style gradient boosted trees
//!
//! Second-order boosting on squared error with:
//! - L1/L2 regularized leaf weights
//! - Exact greedy split finding (features scanned in parallel)
//! - Row and column subsampling

use super::models::{check_fit_input, check_predict_input, Regressor};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// XGBoost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split (gamma)
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: u64,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: 42,
        }
    }
}

/// A single node in a boosted tree
#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                XGBNode::Leaf { weight } => return *weight,
                XGBNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn count_splits(&self, counts: &mut [f64]) {
        if let XGBNode::Split {
            feature, left, right, ..
        } = self
        {
            counts[*feature] += 1.0;
            left.count_splits(counts);
            right.count_splits(counts);
        }
    }
}

/// Gradient statistics shared by one tree build
struct GradStats<'a> {
    x: &'a Array2<f64>,
    grad: &'a Array1<f64>,
    hess: &'a Array1<f64>,
    config: &'a XGBoostConfig,
}

#[derive(Debug, Clone, Copy)]
struct XGBSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl<'a> GradStats<'a> {
    fn build(&self, indices: &[usize], features: &[usize], depth: usize) -> XGBNode {
        let g_sum: f64 = indices.iter().map(|&i| self.grad[i]).sum();
        let h_sum: f64 = indices.iter().map(|&i| self.hess[i]).sum();
        let leaf = XGBNode::Leaf {
            weight: compute_leaf_weight(g_sum, h_sum, self.config.reg_lambda, self.config.reg_alpha),
        };

        if depth >= self.config.max_depth || indices.len() < 2 || h_sum < self.config.min_child_weight {
            return leaf;
        }

        let candidates: Vec<Option<XGBSplit>> = features
            .par_iter()
            .map(|&f| self.best_split_for_feature(indices, f, g_sum, h_sum))
            .collect();
        // Lowest feature index wins ties
        let best = candidates.into_iter().flatten().fold(None, |best: Option<XGBSplit>, c| match best {
            Some(b) if b.gain >= c.gain => Some(b),
            _ => Some(c),
        });

        match best {
            Some(split) if split.gain > self.config.gamma => {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| self.x[[i, split.feature]] <= split.threshold);
                if left_idx.is_empty() || right_idx.is_empty() {
                    return leaf;
                }
                XGBNode::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left: Box::new(self.build(&left_idx, features, depth + 1)),
                    right: Box::new(self.build(&right_idx, features, depth + 1)),
                }
            }
            _ => leaf,
        }
    }

    /// Exact greedy scan over one feature
    fn best_split_for_feature(&self, indices: &[usize], feature: usize, g_total: f64, h_total: f64) -> Option<XGBSplit> {
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

        let lambda = self.config.reg_lambda;
        let parent = g_total * g_total / (h_total + lambda);
        let mut g_left = 0.0;
        let mut h_left = 0.0;
        let mut best: Option<XGBSplit> = None;

        for pos in 0..sorted.len() - 1 {
            let idx = sorted[pos];
            g_left += self.grad[idx];
            h_left += self.hess[idx];

            let value = self.x[[idx, feature]];
            let next = self.x[[sorted[pos + 1], feature]];
            if value == next {
                continue;
            }

            let g_right = g_total - g_left;
            let h_right = h_total - h_left;
            if h_left < self.config.min_child_weight || h_right < self.config.min_child_weight {
                continue;
            }

            let gain = 0.5
                * (g_left * g_left / (h_left + lambda) + g_right * g_right / (h_right + lambda) - parent);
            if best.map_or(true, |b| gain > b.gain) {
                let mut threshold = value + (next - value) / 2.0;
                if threshold >= next {
                    threshold = value;
                }
                best = Some(XGBSplit {
                    feature,
                    threshold,
                    gain,
                });
            }
        }
        best
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    let g_adj = if g_sum > alpha {
        g_sum - alpha
    } else if g_sum < -alpha {
        g_sum + alpha
    } else {
        return 0.0;
    };
    -g_adj / (h_sum + lambda)
}

/// XGBoost regressor (squared error loss)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostRegressor {
    config: XGBoostConfig,
    trees: Vec<XGBNode>,
    base_score: f64,
    n_features: usize,
}

impl Default for XGBoostRegressor {
    fn default() -> Self {
        Self::new(XGBoostConfig::default())
    }
}

impl XGBoostRegressor {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
        }
    }

    pub fn config(&self) -> &XGBoostConfig {
        &self.config
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        self.trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + self.config.learning_rate * tree.predict(row))
    }
}

impl Regressor for XGBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.config.subsample.is_nan()
            || self.config.colsample_bytree.is_nan()
            || self.config.subsample <= 0.0
            || self.config.colsample_bytree <= 0.0
        {
            return Err(PipelineError::InvalidInput(
                "subsample and colsample_bytree must be positive".to_string(),
            ));
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();

        // Base prediction = mean(y)
        self.base_score = y.mean().unwrap_or(0.0);
        let mut preds = Array1::from_elem(n_samples, self.base_score);
        let hess = Array1::from_elem(n_samples, 1.0);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);

        let mut trees = Vec::with_capacity(self.config.n_estimators);
        for _ in 0..self.config.n_estimators {
            // Squared error: grad = pred - y, hess = 1
            let grad: Array1<f64> = &preds - y;

            let row_indices = subsample(&mut rng, n_samples, self.config.subsample);
            let col_indices = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let stats = GradStats {
                x,
                grad: &grad,
                hess: &hess,
                config: &self.config,
            };
            let tree = stats.build(&row_indices, &col_indices, 0);

            for (i, row) in x.rows().into_iter().enumerate() {
                preds[i] += self.config.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        self.trees = trees;
        self.n_features = n_features;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.n_features == 0 {
            return Err(PipelineError::ModelNotFitted);
        }
        check_predict_input(x, self.n_features)?;
        let preds: Vec<f64> = x.rows().into_iter().map(|row| self.predict_row(row)).collect();
        Ok(Array1::from_vec(preds))
    }

    fn name(&self) -> &str {
        "XGBoostRegressor"
    }

    /// Split counts per feature, normalized
    fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.trees.is_empty() {
            return None;
        }
        let mut counts = vec![0.0; self.n_features];
        for tree in &self.trees {
            tree.count_splits(&mut counts);
        }
        let total: f64 = counts.iter().sum();
        if total > 0.0 {
            counts.iter_mut().for_each(|c| *c /= total);
        }
        Some(Array1::from_vec(counts))
    }
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = (((n as f64) * ratio).ceil() as usize).clamp(1, n);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}
