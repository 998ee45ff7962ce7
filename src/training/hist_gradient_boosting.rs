//! Histogram-based gradient boosting classifier
//!
//! Features are binned once into at most `max_bins` quantile bins (plus a
//! bin for missing values). Each round fits a leaf-wise tree on the
//! binned gradients and hessians of the binary log loss.

use super::histogram::{BinMapper, GrowerParams, HistTree, TreeGrower};
use super::{binary_predict, binary_proba, logistic_grad_hess, BinaryTarget};
use crate::error::{BenchError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Histogram gradient boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistGradientBoostingConfig {
    /// Number of boosting iterations
    pub max_iter: usize,
    pub learning_rate: f64,
    /// Maximum leaves per tree; unbounded when `None`
    pub max_leaf_nodes: Option<usize>,
    /// Maximum number of edges from root to leaf; unbounded when `None`
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    pub l2_regularization: f64,
    pub max_bins: usize,
    pub random_state: Option<u64>,
}

impl Default for HistGradientBoostingConfig {
    fn default() -> Self {
        Self {
            max_iter: 100,
            learning_rate: 0.1,
            max_leaf_nodes: Some(31),
            max_depth: None,
            min_samples_leaf: 20,
            l2_regularization: 0.0,
            max_bins: 255,
            random_state: None,
        }
    }
}

/// Histogram gradient boosting classifier (binary)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistGradientBoostingClassifier {
    pub config: HistGradientBoostingConfig,
    mapper: Option<BinMapper>,
    trees: Vec<HistTree>,
    baseline: f64,
    classes: [f64; 2],
}

impl Default for HistGradientBoostingClassifier {
    fn default() -> Self {
        Self::new(HistGradientBoostingConfig::default())
    }
}

impl HistGradientBoostingClassifier {
    pub fn new(config: HistGradientBoostingConfig) -> Self {
        Self {
            config,
            mapper: None,
            trees: Vec::new(),
            baseline: 0.0,
            classes: [0.0, 1.0],
        }
    }

    fn validate(&self) -> Result<()> {
        if self.config.max_iter == 0 {
            return Err(BenchError::invalid_param("max_iter", 0, "must be at least 1"));
        }
        if self.config.learning_rate <= 0.0 {
            return Err(BenchError::invalid_param(
                "learning_rate",
                self.config.learning_rate,
                "must be positive",
            ));
        }
        if self.config.max_depth == Some(0) {
            return Err(BenchError::invalid_param("max_depth", 0, "must be at least 1"));
        }
        if matches!(self.config.max_leaf_nodes, Some(n) if n < 2) {
            return Err(BenchError::invalid_param(
                "max_leaf_nodes",
                self.config.max_leaf_nodes.unwrap_or(0),
                "must be at least 2",
            ));
        }
        Ok(())
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(BenchError::Shape {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        self.validate()?;

        let target = BinaryTarget::new(&y.to_vec(), "HistGradientBoostingClassifier")?;
        let mapper = BinMapper::fit(x, self.config.max_bins)?;
        let binned = mapper.transform(x)?;

        let n = binned.n_rows();
        let samples: Vec<usize> = (0..n).collect();
        let features: Vec<usize> = (0..mapper.n_features()).collect();
        let params = GrowerParams {
            max_leaf_nodes: self.config.max_leaf_nodes.unwrap_or(usize::MAX),
            max_depth: self.config.max_depth,
            min_samples_leaf: self.config.min_samples_leaf,
            min_hessian_leaf: 1e-3,
            l2_regularization: self.config.l2_regularization,
            l1_regularization: 0.0,
            min_gain_to_split: 0.0,
            shrinkage: self.config.learning_rate,
        };

        self.baseline = target.prior_log_odds();
        let mut raw = vec![self.baseline; n];
        let mut trees = Vec::with_capacity(self.config.max_iter);

        for _ in 0..self.config.max_iter {
            let (grad, hess) = logistic_grad_hess(&raw, &target.y);
            let tree = TreeGrower::new(&binned, &mapper, &grad, &hess, params).grow(&samples, &features);

            for (i, r) in raw.iter_mut().enumerate() {
                *r += tree.predict_binned(&binned, i, mapper.missing_bin());
            }
            trees.push(tree);
        }

        debug!(
            n_iter = trees.len(),
            max_leaves = trees.iter().map(HistTree::n_leaves).max().unwrap_or(0),
            "Histogram gradient boosting fitted"
        );

        self.classes = target.classes;
        self.trees = trees;
        self.mapper = Some(mapper);
        Ok(self)
    }

    /// Raw log-odds of the positive class
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        let mapper = self.mapper.as_ref().ok_or(BenchError::NotFitted)?;
        if x.ncols() != mapper.n_features() {
            return Err(BenchError::Shape {
                expected: format!("{} features", mapper.n_features()),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                self.baseline + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
            })
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

    /// Number of fitted boosting iterations
    pub fn n_iter(&self) -> usize {
        self.trees.len()
    }

    /// Depth of the deepest fitted tree
    pub fn max_tree_depth(&self) -> usize {
        self.trees.iter().map(HistTree::depth).max().unwrap_or(0)
    }
}
