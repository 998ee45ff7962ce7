//! CART decision tree classifier

use super::ClassLabels;
use crate::error::{BenchError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf with the class distribution of its training samples
    Leaf {
        distribution: Vec<f64>,
        n_samples: usize,
    },
    /// Internal node; samples with `x[feature_idx] <= threshold` go left,
    /// NaN follows `missing_go_left`
    Split {
        feature_idx: usize,
        threshold: f64,
        missing_go_left: bool,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity
    Gini,
    /// Shannon entropy
    Entropy,
}

impl Criterion {
    fn impurity(&self, counts: &[usize], total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let n = total as f64;
        match self {
            Criterion::Gini => {
                1.0 - counts
                    .iter()
                    .map(|&c| (c as f64 / n).powi(2))
                    .sum::<f64>()
            }
            Criterion::Entropy => -counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
        }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    missing_go_left: bool,
    /// Whether any sample at the node had a NaN in `feature`
    has_missing: bool,
    /// Weighted child impurity
    impurity: f64,
}

/// Decision tree classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at random for each split (all when `None`)
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for the per-split feature draw
    pub random_state: Option<u64>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
    classes: Vec<f64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: None,
            n_features: 0,
            feature_importances: None,
            classes: Vec::new(),
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: Option<u64>) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit the tree on all rows of `x`
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(BenchError::Shape {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }

        let y = y.to_vec();
        let labels = ClassLabels::fit(&y)?;
        let encoded = labels.encode(&y)?;
        let samples: Vec<usize> = (0..x.nrows()).collect();
        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        self.fit_encoded(x, &encoded, labels.classes(), &samples, &mut rng)
    }

    /// Fit on a subset of rows (repeats allowed) with pre-encoded labels.
    ///
    /// `y[i]` is the index of row `i`'s class in `classes`, so every tree
    /// of an ensemble shares one class layout even when a bootstrap
    /// sample misses a class.
    pub(crate) fn fit_encoded(
        &mut self,
        x: &Array2<f64>,
        y: &[usize],
        classes: &[f64],
        samples: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Result<&mut Self> {
        if samples.is_empty() {
            return Err(BenchError::Training("cannot fit a tree on zero samples".into()));
        }

        self.n_features = x.ncols();
        self.classes = classes.to_vec();

        let mut importances = vec![0.0; self.n_features];
        self.root = Some(self.build_tree(x, y, samples, 0, &mut importances, rng));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn class_counts(&self, y: &[usize], samples: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.classes.len()];
        for &i in samples {
            counts[y[i]] += 1;
        }
        counts
    }

    fn leaf(&self, counts: &[usize], n_samples: usize) -> TreeNode {
        let n = n_samples.max(1) as f64;
        TreeNode::Leaf {
            distribution: counts.iter().map(|&c| c as f64 / n).collect(),
            n_samples,
        }
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        samples: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = samples.len();
        let counts = self.class_counts(y, samples);
        let impurity = self.criterion.impurity(&counts, n_samples);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= f64::EPSILON
            || self.n_features == 0;

        if should_stop {
            return self.leaf(&counts, n_samples);
        }

        let n_try = self.max_features.unwrap_or(self.n_features).clamp(1, self.n_features);
        let features: Vec<usize> = if n_try >= self.n_features {
            (0..self.n_features).collect()
        } else {
            index::sample(rng, self.n_features, n_try).into_vec()
        };

        let Some(split) = self.find_best_split(x, y, samples, &features, impurity) else {
            return self.leaf(&counts, n_samples);
        };
        let feature = split.feature;
        let threshold = split.threshold;

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) =
            samples.iter().partition(|&&i| {
                let v = x[[i, feature]];
                if v.is_nan() {
                    split.missing_go_left
                } else {
                    v <= threshold
                }
            });
        // Unseen missing values follow the larger child
        let missing_go_left = if split.has_missing {
            split.missing_go_left
        } else {
            left_samples.len() >= right_samples.len()
        };

        importances[feature] += n_samples as f64 * (impurity - split.impurity);

        let left = Box::new(self.build_tree(x, y, &left_samples, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, &right_samples, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: feature,
            threshold,
            missing_go_left,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    /// Lowest weighted child impurity over the candidate features, or
    /// `None` when no split reduces impurity.
    ///
    /// Rows with a NaN feature value are tried on both sides of every
    /// threshold, and alone on the right against all present values.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        samples: &[usize],
        features: &[usize],
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let n = samples.len();
        let n_classes = self.classes.len();
        let total_counts = self.class_counts(y, samples);

        // Each feature sorts its present values once and sweeps the class counts
        let results: Vec<SplitCandidate> = features
            .par_iter()
            .filter_map(|&feature| {
                let mut present: Vec<(f64, usize)> = Vec::with_capacity(n);
                let mut missing = vec![0usize; n_classes];
                for &i in samples {
                    let v = x[[i, feature]];
                    if v.is_nan() {
                        missing[y[i]] += 1;
                    } else {
                        present.push((v, y[i]));
                    }
                }
                present.sort_by(|a, b| a.0.total_cmp(&b.0));
                let n_missing = n - present.len();
                let has_missing = n_missing > 0;
                if present.is_empty() {
                    return None;
                }

                let mut best: Option<SplitCandidate> = None;
                let min_leaf = self.min_samples_leaf.max(1);
                let mut consider = |threshold: f64, missing_go_left: bool, left: &[usize], n_left: usize| {
                    let n_right = n - n_left;
                    if n_left < min_leaf || n_right < min_leaf {
                        return;
                    }
                    let right: Vec<usize> = total_counts.iter().zip(left).map(|(t, l)| t - l).collect();
                    let weighted = (n_left as f64 * self.criterion.impurity(left, n_left)
                        + n_right as f64 * self.criterion.impurity(&right, n_right))
                        / n as f64;
                    if best.as_ref().map_or(true, |b| weighted < b.impurity) {
                        best = Some(SplitCandidate {
                            feature,
                            threshold,
                            missing_go_left,
                            has_missing,
                            impurity: weighted,
                        });
                    }
                };

                let directions: &[bool] = if has_missing { &[true, false] } else { &[false] };
                for &missing_go_left in directions {
                    let mut left = if missing_go_left { missing.clone() } else { vec![0usize; n_classes] };
                    let offset = if missing_go_left { n_missing } else { 0 };

                    for pos in 0..present.len().saturating_sub(1) {
                        let (value, class) = present[pos];
                        left[class] += 1;

                        let next = present[pos + 1].0;
                        if next <= value {
                            continue;
                        }
                        let mut threshold = (value + next) / 2.0;
                        if threshold >= next {
                            threshold = value;
                        }
                        consider(threshold, missing_go_left, &left, offset + pos + 1);
                    }
                }

                if has_missing {
                    // Present values left, missing right
                    let left: Vec<usize> = total_counts.iter().zip(&missing).map(|(t, m)| t - m).collect();
                    consider(f64::INFINITY, false, &left, present.len());
                }

                best
            })
            .collect();

        results
            .into_iter()
            .filter(|c| parent_impurity - c.impurity > 1e-12)
            .min_by(|a, b| a.impurity.total_cmp(&b.impurity).then(a.feature.cmp(&b.feature)))
    }

    fn leaf_distribution<'a>(node: &'a TreeNode, sample: ArrayView1<f64>) -> &'a [f64] {
        match node {
            TreeNode::Leaf { distribution, .. } => distribution,
            TreeNode::Split {
                feature_idx,
                threshold,
                missing_go_left,
                left,
                right,
                ..
            } => {
                let v = sample[*feature_idx];
                let go_left = if v.is_nan() { *missing_go_left } else { v <= *threshold };
                if go_left {
                    Self::leaf_distribution(left, sample)
                } else {
                    Self::leaf_distribution(right, sample)
                }
            }
        }
    }

    /// Class distribution per row, columns ordered like [`Self::classes`]
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let root = self.root.as_ref().ok_or(BenchError::NotFitted)?;
        if x.ncols() != self.n_features {
            return Err(BenchError::Shape {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let mut out = Array2::zeros((x.nrows(), self.classes.len()));
        for (i, row) in x.rows().into_iter().enumerate() {
            for (k, &p) in Self::leaf_distribution(root, row).iter().enumerate() {
                out[[i, k]] = p;
            }
        }
        Ok(out)
    }

    /// Most likely class per row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| self.classes[super::argmax(row)])
            .collect())
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth (a single leaf has depth 0)
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map_or(0, leaves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_separates_threshold() {
        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new().with_random_state(Some(0));
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.get_depth(), 1);
        assert_eq!(tree.get_n_leaves(), 2);
    }

    #[test]
    fn test_predict_proba_rows_sum_to_one() {
        let x = array![[1.0], [1.0], [2.0], [2.0], [3.0]];
        let y = array![0.0, 1.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new().with_random_state(Some(0));
        tree.fit(&x, &y).unwrap();

        let proba = tree.predict_proba(&x).unwrap();
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        // Duplicated x values with mixed labels end in an impure leaf
        assert!((proba[[0, 1]] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new().with_max_depth(Some(2));
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 2);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert_eq!(importances[0], 1.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_entropy_criterion() {
        assert!((Criterion::Entropy.impurity(&[1, 1], 2) - 2f64.ln()).abs() < 1e-12);
        assert_eq!(Criterion::Gini.impurity(&[2, 0], 2), 0.0);
    }

    #[test]
    fn test_missing_values_follow_learned_side() {
        // NaN rows are all class 1, like the large values
        let x = array![[1.0], [2.0], [3.0], [8.0], [9.0], [f64::NAN], [f64::NAN]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];

        let mut tree = DecisionTree::new().with_random_state(Some(0));
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.get_depth(), 1);
        assert_eq!(tree.predict(&array![[f64::NAN]]).unwrap()[0], 1.0);
    }

    #[test]
    fn test_missing_only_split() {
        let x = array![[1.0], [2.0], [3.0], [f64::NAN], [f64::NAN]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.predict(&array![[100.0]]).unwrap()[0], 0.0);
    }

    #[test]
    fn test_predict_before_fit() {
        let tree = DecisionTree::new();
        assert!(matches!(
            tree.predict(&array![[1.0]]),
            Err(BenchError::NotFitted)
        ));
    }
}
