//! CART regression tree

use super::models::{check_fit_input, check_predict_input, Regressor};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Nodes at least this large scan candidate features in parallel
const PARALLEL_SPLIT_MIN_SAMPLES: usize = 512;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node; samples with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

impl TreeNode {
    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Regression tree grown by variance reduction (squared error)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    /// Maximum depth, unbounded when `None`
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn per split, all when `None`
    pub max_features: Option<usize>,
    /// Seed for per-split feature sampling
    pub random_state: u64,
    root: Option<TreeNode>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTreeRegressor {
    pub fn new() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            random_state: 42,
            root: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    pub fn n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::n_leaves)
    }

    /// Fit on the rows named by `indices` (repeats allowed, as in a bootstrap sample)
    pub(crate) fn fit_on(&mut self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> Result<()> {
        if indices.is_empty() {
            return Err(PipelineError::InvalidInput("cannot fit a tree on zero rows".to_string()));
        }

        let n_features = x.ncols();
        let mut builder = TreeBuilder {
            params: self,
            x,
            y,
            rng: Xoshiro256PlusPlus::seed_from_u64(self.random_state),
            importances: vec![0.0; n_features],
        };
        let root = builder.build(indices.to_vec(), 0);

        let mut importances = Array1::from_vec(builder.importances);
        let total = importances.sum();
        if total > 0.0 {
            importances /= total;
        }

        self.root = Some(root);
        self.n_features = n_features;
        self.feature_importances = Some(importances);
        Ok(())
    }

    pub(crate) fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        let mut node = self.root.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return Ok(*value),
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }
}

impl Regressor for DecisionTreeRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.fit_on(x, y, &indices)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.root.is_none() {
            return Err(PipelineError::ModelNotFitted);
        }
        check_predict_input(x, self.n_features)?;
        x.rows()
            .into_iter()
            .map(|row| self.predict_row(row))
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from_vec)
    }

    fn name(&self) -> &str {
        "DecisionTreeRegressor"
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }
}

/// Best threshold found for one feature
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

struct TreeBuilder<'a> {
    params: &'a DecisionTreeRegressor,
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    rng: Xoshiro256PlusPlus,
    importances: Vec<f64>,
}

impl<'a> TreeBuilder<'a> {
    fn build(&mut self, indices: Vec<usize>, depth: usize) -> TreeNode {
        let n_samples = indices.len();
        let (sum, sq_sum) = indices.iter().fold((0.0, 0.0), |(s, q), &i| {
            let v = self.y[i];
            (s + v, q + v * v)
        });
        let mean = sum / n_samples as f64;
        let sse = (sq_sum - sum * sum / n_samples as f64).max(0.0);

        let first = self.y[indices[0]];
        let is_pure = indices.iter().all(|&i| self.y[i] == first);
        let should_stop = is_pure
            || n_samples < self.params.min_samples_split
            || n_samples < 2 * self.params.min_samples_leaf
            || self.params.max_depth.map_or(false, |d| depth >= d);
        if should_stop {
            return TreeNode::Leaf { value: mean, n_samples };
        }

        let features = self.candidate_features();
        let best = match self.find_best_split(&indices, &features, sse) {
            Some(best) => best,
            None => return TreeNode::Leaf { value: mean, n_samples },
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[[i, best.feature_idx]] <= best.threshold);

        self.importances[best.feature_idx] += best.gain;
        let left = Box::new(self.build(left_idx, depth + 1));
        let right = Box::new(self.build(right_idx, depth + 1));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity: sse / n_samples as f64,
        }
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        let n_features = self.x.ncols();
        match self.params.max_features {
            Some(k) if k < n_features => {
                let mut picked = rand::seq::index::sample(&mut self.rng, n_features, k).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..n_features).collect(),
        }
    }

    fn find_best_split(&self, indices: &[usize], features: &[usize], parent_sse: f64) -> Option<SplitCandidate> {
        let min_leaf = self.params.min_samples_leaf;
        let scan = |&f: &usize| best_split_for_feature(self.x, self.y, indices, f, min_leaf, parent_sse);

        let candidates: Vec<Option<SplitCandidate>> = if indices.len() >= PARALLEL_SPLIT_MIN_SAMPLES {
            features.par_iter().map(scan).collect()
        } else {
            features.iter().map(scan).collect()
        };

        // Lowest feature index wins ties
        candidates.into_iter().flatten().fold(None, |best, c| match best {
            Some(b) if b.gain >= c.gain => Some(b),
            _ => Some(c),
        })
    }
}

fn best_split_for_feature(
    x: &Array2<f64>,
    y: &Array1<f64>,
    indices: &[usize],
    feature_idx: usize,
    min_leaf: usize,
    parent_sse: f64,
) -> Option<SplitCandidate> {
    let mut pairs: Vec<(f64, f64)> = indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let n = pairs.len();
    let total_sum: f64 = pairs.iter().map(|p| p.1).sum();
    let total_sq: f64 = pairs.iter().map(|p| p.1 * p.1).sum();

    let mut left_sum = 0.0;
    let mut left_sq = 0.0;
    let mut best: Option<SplitCandidate> = None;
    let min_gain = parent_sse * 1e-12;

    for i in 0..n - 1 {
        let (xv, yv) = pairs[i];
        left_sum += yv;
        left_sq += yv * yv;

        let next = pairs[i + 1].0;
        if xv == next {
            continue;
        }
        let n_left = i + 1;
        let n_right = n - n_left;
        if n_left < min_leaf || n_right < min_leaf {
            continue;
        }

        let left_sse = left_sq - left_sum * left_sum / n_left as f64;
        let right_sum = total_sum - left_sum;
        let right_sse = (total_sq - left_sq) - right_sum * right_sum / n_right as f64;
        let gain = parent_sse - left_sse - right_sse;

        if gain > min_gain && best.map_or(true, |b| gain > b.gain) {
            let mut threshold = xv + (next - xv) / 2.0;
            if threshold >= next {
                threshold = xv;
            }
            best = Some(SplitCandidate {
                feature_idx,
                threshold,
                gain,
            });
        }
    }

    best
}
