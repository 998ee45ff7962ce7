//! XGBoost-style gradient boosting with second-order approximation
//!
//! - Uses both gradient and hessian of the logistic loss
//! - Regularized leaf weights: w* = -T(G) / (H + lambda), T the L1 soft threshold
//! - Split gain: 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - G²/(H+λ)] - γ
//! - Minimum child weight constraint
//! - Sparsity-aware splits: missing values follow a learned default direction

use super::{binary_predict, binary_proba, logistic_grad_hess, BinaryTarget};
use crate::error::{BenchError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// XGBoost configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    /// Initial positive-class probability; estimated from the target when `None`
    pub base_score: Option<f64>,
    pub random_state: Option<u64>,
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
            base_score: None,
            random_state: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf {
        weight: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        default_left: bool,
        gain: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            XGBNode::Leaf { weight } => *weight,
            XGBNode::Split {
                feature,
                threshold,
                default_left,
                left,
                right,
                ..
            } => {
                let v = sample[*feature];
                let go_left = if v.is_nan() { *default_left } else { v <= *threshold };
                if go_left {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            XGBNode::Leaf { .. } => 0,
            XGBNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn accumulate_gain(&self, totals: &mut [f64]) {
        if let XGBNode::Split {
            feature,
            gain,
            left,
            right,
            ..
        } = self
        {
            totals[*feature] += gain;
            left.accumulate_gain(totals);
            right.accumulate_gain(totals);
        }
    }
}

struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    grad: &'a [f64],
    hess: &'a [f64],
    features: &'a [usize],
    config: &'a XGBoostConfig,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    default_left: bool,
    gain: f64,
}

impl TreeBuilder<'_> {
    fn soft_threshold(&self, g: f64) -> f64 {
        let alpha = self.config.reg_alpha;
        if g > alpha {
            g - alpha
        } else if g < -alpha {
            g + alpha
        } else {
            0.0
        }
    }

    fn leaf_weight(&self, g: f64, h: f64) -> f64 {
        -self.soft_threshold(g) / (h + self.config.reg_lambda)
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        let t = self.soft_threshold(g);
        t * t / (h + self.config.reg_lambda)
    }

    fn build(&self, indices: &[usize], depth: usize) -> XGBNode {
        let g_sum: f64 = indices.iter().map(|&i| self.grad[i]).sum();
        let h_sum: f64 = indices.iter().map(|&i| self.hess[i]).sum();
        let leaf = XGBNode::Leaf {
            weight: self.leaf_weight(g_sum, h_sum) * self.config.learning_rate,
        };

        if depth >= self.config.max_depth || indices.len() < 2 {
            return leaf;
        }

        let best = self
            .features
            .par_iter()
            .filter_map(|&f| self.best_split_for_feature(indices, f, g_sum, h_sum))
            .max_by(|a, b| a.gain.total_cmp(&b.gain).then_with(|| b.feature.cmp(&a.feature)));

        let Some(split) = best else { return leaf };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices.iter().partition(|&&i| {
            let v = self.x[[i, split.feature]];
            if v.is_nan() {
                split.default_left
            } else {
                v <= split.threshold
            }
        });

        XGBNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            default_left: split.default_left,
            gain: split.gain,
            left: Box::new(self.build(&left_idx, depth + 1)),
            right: Box::new(self.build(&right_idx, depth + 1)),
        }
    }

    /// Exact greedy scan over the sorted present values of one feature
    fn best_split_for_feature(
        &self,
        indices: &[usize],
        feature: usize,
        g_total: f64,
        h_total: f64,
    ) -> Option<Candidate> {
        let mut present: Vec<(f64, usize)> = Vec::with_capacity(indices.len());
        let (mut g_miss, mut h_miss) = (0.0, 0.0);
        for &i in indices {
            let v = self.x[[i, feature]];
            if v.is_nan() {
                g_miss += self.grad[i];
                h_miss += self.hess[i];
            } else {
                present.push((v, i));
            }
        }
        if present.len() < 2 {
            return None;
        }
        present.sort_by(|a, b| a.0.total_cmp(&b.0));

        let parent = self.score(g_total, h_total);
        let has_missing = present.len() < indices.len();
        let mut best: Option<Candidate> = None;
        let (mut g_left, mut h_left) = (0.0, 0.0);

        for pos in 0..present.len() - 1 {
            let (value, idx) = present[pos];
            g_left += self.grad[idx];
            h_left += self.hess[idx];

            let next = present[pos + 1].0;
            if next <= value {
                continue;
            }

            let directions: &[bool] = if has_missing { &[false, true] } else { &[false] };
            for &missing_left in directions {
                let (gl, hl) = if missing_left {
                    (g_left + g_miss, h_left + h_miss)
                } else {
                    (g_left, h_left)
                };
                let (gr, hr) = (g_total - gl, h_total - hl);

                if hl < self.config.min_child_weight || hr < self.config.min_child_weight {
                    continue;
                }

                let gain = 0.5 * (self.score(gl, hl) + self.score(gr, hr) - parent) - self.config.gamma;
                if gain <= 0.0 {
                    continue;
                }
                if best.as_ref().map_or(true, |b| gain > b.gain) {
                    let mut threshold = (value + next) / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some(Candidate {
                        feature,
                        threshold,
                        default_left: if has_missing { missing_left } else { true },
                        gain,
                    });
                }
            }
        }

        best
    }
}

/// XGBoost classifier (binary logistic objective)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostClassifier {
    pub config: XGBoostConfig,
    trees: Vec<XGBNode>,
    base_margin: f64,
    n_features: usize,
    classes: [f64; 2],
}

impl Default for XGBoostClassifier {
    fn default() -> Self {
        Self::new(XGBoostConfig::default())
    }
}

impl XGBoostClassifier {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_margin: 0.0,
            n_features: 0,
            classes: [0.0, 1.0],
        }
    }

    fn validate(&self) -> Result<()> {
        let c = &self.config;
        if c.n_estimators == 0 {
            return Err(BenchError::invalid_param("n_estimators", 0, "must be at least 1"));
        }
        if c.learning_rate <= 0.0 {
            return Err(BenchError::invalid_param(
                "learning_rate",
                c.learning_rate,
                "must be positive",
            ));
        }
        if c.max_depth == 0 {
            return Err(BenchError::invalid_param("max_depth", 0, "must be at least 1"));
        }
        if !(c.subsample > 0.0 && c.subsample <= 1.0) {
            return Err(BenchError::invalid_param("subsample", c.subsample, "must be in (0, 1]"));
        }
        if !(c.colsample_bytree > 0.0 && c.colsample_bytree <= 1.0) {
            return Err(BenchError::invalid_param(
                "colsample_bytree",
                c.colsample_bytree,
                "must be in (0, 1]",
            ));
        }
        if let Some(b) = c.base_score {
            if !(b > 0.0 && b < 1.0) {
                return Err(BenchError::invalid_param("base_score", b, "must be in (0, 1)"));
            }
        }
        Ok(())
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples != y.len() {
            return Err(BenchError::Shape {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        self.validate()?;

        let target = BinaryTarget::new(&y.to_vec(), "XGBoostClassifier")?;
        self.base_margin = match self.config.base_score {
            Some(p) => (p / (1.0 - p)).ln(),
            None => target.prior_log_odds(),
        };
        let mut raw = vec![self.base_margin; n_samples];

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let mut trees = Vec::with_capacity(self.config.n_estimators);
        for _ in 0..self.config.n_estimators {
            let (grad, hess) = logistic_grad_hess(&raw, &target.y);

            let rows = subsample(&mut rng, n_samples, self.config.subsample);
            let cols = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let tree = TreeBuilder {
                x,
                grad: &grad,
                hess: &hess,
                features: &cols,
                config: &self.config,
            }
            .build(&rows, 0);

            for (i, r) in raw.iter_mut().enumerate() {
                *r += tree.predict(x.row(i));
            }
            trees.push(tree);
        }

        debug!(
            n_trees = trees.len(),
            max_depth = trees.iter().map(XGBNode::depth).max().unwrap_or(0),
            "XGBoost fitted"
        );

        self.classes = target.classes;
        self.n_features = n_features;
        self.trees = trees;
        Ok(self)
    }

    /// Raw margin (log-odds) of the positive class
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        if self.trees.is_empty() {
            return Err(BenchError::NotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(BenchError::Shape {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.rows()
            .into_iter()
            .map(|row| self.base_margin + self.trees.iter().map(|t| t.predict(row)).sum::<f64>())
            .collect())
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(binary_proba(&self.decision_function(x)?))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(binary_predict(&self.decision_function(x)?, &self.classes))
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Total split gain per feature, normalized to sum to one
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.trees.is_empty() {
            return None;
        }
        let mut totals = vec![0.0; self.n_features];
        for tree in &self.trees {
            tree.accumulate_gain(&mut totals);
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        Some(Array1::from_vec(totals))
    }

    pub fn max_tree_depth(&self) -> usize {
        self.trees.iter().map(XGBNode::depth).max().unwrap_or(0)
    }
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = (((n as f64) * ratio).ceil() as usize).max(1);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}
