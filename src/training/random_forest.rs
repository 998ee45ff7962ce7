//! Random Forest classifier

use super::decision_tree::{Criterion, DecisionTree};
use super::{argmax, ClassLabels};
use crate::error::{BenchError, Result};
use ndarray::{Array1, Array2};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    fn resolve(&self, n_features: usize) -> usize {
        let n = n_features as f64;
        match *self {
            MaxFeatures::Sqrt => n.sqrt().floor() as usize,
            MaxFeatures::Log2 => n.log2().floor() as usize,
            MaxFeatures::Fraction(f) => (n * f).floor() as usize,
            MaxFeatures::Fixed(k) => k.min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }
}

/// Bagged ensemble of randomized decision trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered per split (sqrt by default)
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Random state
    pub random_state: Option<u64>,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
    classes: Vec<f64>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            criterion: Criterion::Gini,
            random_state: None,
            feature_importances: None,
            n_features: 0,
            classes: Vec::new(),
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: Option<u64>) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit the forest to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();

        if n_samples != y.len() {
            return Err(BenchError::Shape {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.n_estimators == 0 {
            return Err(BenchError::invalid_param(
                "n_estimators",
                0,
                "must be at least 1",
            ));
        }

        let y = y.to_vec();
        let labels = ClassLabels::fit(&y)?;
        let encoded = labels.encode(&y)?;
        self.classes = labels.classes().to_vec();
        self.n_features = x.ncols();
        let max_features = self.max_features.resolve(self.n_features);

        let base_seed = self
            .random_state
            .unwrap_or_else(|| rand::thread_rng().next_u64());

        // Build trees in parallel, one seeded stream per tree
        let trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

                let samples: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let mut tree = DecisionTree::new()
                    .with_max_depth(self.max_depth)
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(Some(max_features))
                    .with_criterion(self.criterion);

                tree.fit_encoded(x, &encoded, &self.classes, &samples, &mut rng)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            n_trees = trees.len(),
            max_features,
            "Random forest fitted"
        );

        self.trees = trees;
        self.compute_feature_importances();

        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        let mut total = vec![0.0; self.n_features];

        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (t, &v) in total.iter_mut().zip(imp.iter()) {
                    *t += v;
                }
            }
        }

        let sum: f64 = total.iter().sum();
        if sum > 0.0 {
            for v in &mut total {
                *v /= sum;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total));
    }

    /// Mean of the trees' leaf class distributions
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(BenchError::NotFitted);
        }

        let per_tree = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_proba(x))
            .collect::<Result<Vec<_>>>()?;

        let mut proba = Array2::<f64>::zeros((x.nrows(), self.classes.len()));
        for p in &per_tree {
            proba += p;
        }
        proba /= self.trees.len() as f64;
        Ok(proba)
    }

    /// Class with the highest mean probability
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| self.classes[argmax(row)])
            .collect())
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}
