//! LightGBM-style gradient boosting with leaf-wise tree growth
//!
//! Key differences from XGBoost-style boosting:
//! - Histogram split finding on pre-binned features
//! - Leaf-wise (best-first) growth bounded by `num_leaves`
//! - Optional Gradient-based One-Side Sampling (GOSS): keeps the largest
//!   gradients, samples the rest and up-weights the sampled ones

use super::histogram::{BinMapper, GrowerParams, HistTree, TreeGrower};
use super::{binary_predict, binary_proba, logistic_grad_hess, BinaryTarget};
use crate::error::{BenchError, Result};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Boosting strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BoostingType {
    /// Every row in every round
    Gbdt,
    /// Gradient-based one-side sampling
    Goss { top_rate: f64, other_rate: f64 },
}

impl std::fmt::Display for BoostingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoostingType::Gbdt => write!(f, "gbdt"),
            BoostingType::Goss { .. } => write!(f, "goss"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightGBMConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub num_leaves: usize,
    /// Unbounded when `None` (LightGBM's `-1`)
    pub max_depth: Option<usize>,
    pub min_child_samples: usize,
    /// Minimum hessian sum per leaf
    pub min_child_weight: f64,
    pub min_split_gain: f64,
    pub reg_lambda: f64,
    pub reg_alpha: f64,
    pub colsample_bytree: f64,
    pub max_bin: usize,
    pub boosting_type: BoostingType,
    pub random_state: Option<u64>,
}

impl Default for LightGBMConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            num_leaves: 31,
            max_depth: None,
            min_child_samples: 20,
            min_child_weight: 1e-3,
            min_split_gain: 0.0,
            reg_lambda: 0.0,
            reg_alpha: 0.0,
            colsample_bytree: 1.0,
            max_bin: 255,
            boosting_type: BoostingType::Gbdt,
            random_state: None,
        }
    }
}

/// Rows used by one GOSS round and gradient/hessian with the sampled
/// small-gradient rows up-weighted by `(1 - a) / b`
fn goss_sample(
    grad: &mut [f64],
    hess: &mut [f64],
    top_rate: f64,
    other_rate: f64,
    rng: &mut Xoshiro256PlusPlus,
) -> Vec<usize> {
    let n = grad.len();
    let n_top = ((n as f64 * top_rate) as usize).min(n);
    let n_other = ((n as f64 * other_rate) as usize).min(n - n_top);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| grad[b].abs().total_cmp(&grad[a].abs()));

    let mut selected = order[..n_top].to_vec();
    let mut rest = order[n_top..].to_vec();
    rest.shuffle(rng);
    rest.truncate(n_other);

    let amplify = (1.0 - top_rate) / other_rate;
    for &i in &rest {
        grad[i] *= amplify;
        hess[i] *= amplify;
    }

    selected.extend(rest);
    selected.sort_unstable();
    selected
}

/// LightGBM-style classifier (binary objective)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightGBMClassifier {
    pub config: LightGBMConfig,
    mapper: Option<BinMapper>,
    trees: Vec<HistTree>,
    init_score: f64,
    classes: [f64; 2],
}

impl Default for LightGBMClassifier {
    fn default() -> Self {
        Self::new(LightGBMConfig::default())
    }
}

impl LightGBMClassifier {
    pub fn new(config: LightGBMConfig) -> Self {
        Self {
            config,
            mapper: None,
            trees: Vec::new(),
            init_score: 0.0,
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
        if c.num_leaves < 2 {
            return Err(BenchError::invalid_param("num_leaves", c.num_leaves, "must be at least 2"));
        }
        if c.max_depth == Some(0) {
            return Err(BenchError::invalid_param("max_depth", 0, "must be positive or -1"));
        }
        if !(c.colsample_bytree > 0.0 && c.colsample_bytree <= 1.0) {
            return Err(BenchError::invalid_param(
                "colsample_bytree",
                c.colsample_bytree,
                "must be in (0, 1]",
            ));
        }
        if let BoostingType::Goss { top_rate, other_rate } = c.boosting_type {
            if top_rate <= 0.0 || other_rate <= 0.0 || top_rate + other_rate > 1.0 {
                return Err(BenchError::invalid_param(
                    "top_rate + other_rate",
                    top_rate + other_rate,
                    "rates must be positive and sum to at most 1",
                ));
            }
        }
        Ok(())
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n = x.nrows();
        if n != y.len() {
            return Err(BenchError::Shape {
                expected: format!("y length = {}", n),
                actual: format!("y length = {}", y.len()),
            });
        }
        self.validate()?;

        let target = BinaryTarget::new(&y.to_vec(), "LightGBMClassifier")?;
        let mapper = BinMapper::fit(x, self.config.max_bin)?;
        let binned = mapper.transform(x)?;

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let params = GrowerParams {
            max_leaf_nodes: self.config.num_leaves,
            max_depth: self.config.max_depth,
            min_samples_leaf: self.config.min_child_samples,
            min_hessian_leaf: self.config.min_child_weight,
            l2_regularization: self.config.reg_lambda,
            l1_regularization: self.config.reg_alpha,
            min_gain_to_split: self.config.min_split_gain,
            shrinkage: self.config.learning_rate,
        };

        // GOSS starts once the model has had 1 / learning_rate full rounds
        let warmup = (1.0 / self.config.learning_rate) as usize;
        let all_rows: Vec<usize> = (0..n).collect();
        let n_features = mapper.n_features();
        let n_cols = (((n_features as f64) * self.config.colsample_bytree).ceil() as usize)
            .max(1)
            .min(n_features);

        self.init_score = target.prior_log_odds();
        let mut raw = vec![self.init_score; n];
        let mut trees = Vec::with_capacity(self.config.n_estimators);

        for iter in 0..self.config.n_estimators {
            let (mut grad, mut hess) = logistic_grad_hess(&raw, &target.y);

            let rows = match self.config.boosting_type {
                BoostingType::Goss { top_rate, other_rate } if iter >= warmup => {
                    goss_sample(&mut grad, &mut hess, top_rate, other_rate, &mut rng)
                }
                _ => all_rows.clone(),
            };

            let mut features: Vec<usize> = (0..n_features).collect();
            if n_cols < n_features {
                features.shuffle(&mut rng);
                features.truncate(n_cols);
                features.sort_unstable();
            }

            let tree = TreeGrower::new(&binned, &mapper, &grad, &hess, params).grow(&rows, &features);
            for (i, r) in raw.iter_mut().enumerate() {
                *r += tree.predict_binned(&binned, i, mapper.missing_bin());
            }
            trees.push(tree);
        }

        debug!(
            n_trees = trees.len(),
            boosting = %self.config.boosting_type,
            "LightGBM fitted"
        );

        self.classes = target.classes;
        self.trees = trees;
        self.mapper = Some(mapper);
        Ok(self)
    }

    /// Raw score (log-odds) of the positive class
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
            .map(|row| self.init_score + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>())
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

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn max_tree_depth(&self) -> usize {
        self.trees.iter().map(HistTree::depth).max().unwrap_or(0)
    }

    pub fn max_tree_leaves(&self) -> usize {
        self.trees.iter().map(HistTree::n_leaves).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification_data() -> (Array2<f64>, Array1<f64>) {
        let n = 200;
        let x = Array2::from_shape_fn((n, 3), |(i, j)| match j {
            0 => i as f64 / n as f64,
            1 => ((i * 13) % 17) as f64,
            _ => ((i * 5) % 3) as f64,
        });
        let y = Array1::from_shape_fn(n, |i| if i as f64 / n as f64 > 0.4 { 1.0 } else { 0.0 });
        (x, y)
    }

    fn accuracy(model: &LightGBMClassifier, x: &Array2<f64>, y: &Array1<f64>) -> f64 {
        let pred = model.predict(x).unwrap();
        pred.iter().zip(y.iter()).filter(|(p, t)| p == t).count() as f64 / y.len() as f64
    }

    #[test]
    fn test_gbdt_classifier() {
        let (x, y) = classification_data();
        let mut model = LightGBMClassifier::default();
        model.fit(&x, &y).unwrap();
        assert!(accuracy(&model, &x, &y) > 0.95);
        assert!(model.max_tree_leaves() <= 31);
    }

    #[test]
    fn test_goss_classifier() {
        let (x, y) = classification_data();
        let mut model = LightGBMClassifier::new(LightGBMConfig {
            boosting_type: BoostingType::Goss {
                top_rate: 0.2,
                other_rate: 0.1,
            },
            random_state: Some(42),
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        assert!(accuracy(&model, &x, &y) > 0.9);
    }

    #[test]
    fn test_goss_sample_upweights_small_gradients() {
        let mut grad = vec![5.0, -4.0, 0.1, 0.2, -0.1, 0.3, 0.05, 0.02, 0.01, 0.0];
        let mut hess = vec![1.0; 10];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);

        let rows = goss_sample(&mut grad, &mut hess, 0.2, 0.1, &mut rng);

        assert_eq!(rows.len(), 3);
        assert!(rows.contains(&0) && rows.contains(&1));
        let other = rows.iter().find(|&&r| r > 1).copied().unwrap();
        assert!((hess[other] - 8.0).abs() < 1e-12);
        assert_eq!(hess[0], 1.0);
    }

    #[test]
    fn test_max_depth_limits_trees() {
        let (x, y) = classification_data();
        let mut model = LightGBMClassifier::new(LightGBMConfig {
            max_depth: Some(2),
            n_estimators: 10,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        assert!(model.max_tree_depth() <= 2);
        assert_eq!(model.n_trees(), 10);
    }

    #[test]
    fn test_invalid_goss_rates() {
        let (x, y) = classification_data();
        let mut model = LightGBMClassifier::new(LightGBMConfig {
            boosting_type: BoostingType::Goss {
                top_rate: 0.8,
                other_rate: 0.5,
            },
            ..Default::default()
        });
        assert!(model.fit(&x, &y).is_err());
    }
}
