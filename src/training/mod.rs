//! Model training module
//!
//! Tree-ensemble classifiers behind one [`Estimator`] enum:
//! - Random Forest (bagged CART trees)
//! - Histogram gradient boosting
//! - XGBoost-style second-order exact greedy boosting
//! - LightGBM-style leaf-wise histogram boosting with optional GOSS
//!
//! The boosters model binary log loss only; labels are mapped to `{0, 1}`.

pub mod decision_tree;
mod histogram;
pub mod hist_gradient_boosting;
pub mod lightgbm;
mod models;
pub mod random_forest;
pub mod xgboost;

pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use hist_gradient_boosting::{HistGradientBoostingClassifier, HistGradientBoostingConfig};
pub use lightgbm::{BoostingType, LightGBMClassifier, LightGBMConfig};
pub use models::{Estimator, ModelKind};
pub use random_forest::{MaxFeatures, RandomForest};
pub use xgboost::{XGBoostClassifier, XGBoostConfig};

use crate::error::{BenchError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Sorted distinct class values seen at fit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassLabels {
    classes: Vec<f64>,
}

impl ClassLabels {
    pub fn fit(y: &[f64]) -> Result<Self> {
        if y.is_empty() {
            return Err(BenchError::Training("cannot fit on an empty target".into()));
        }
        if let Some(bad) = y.iter().find(|v| !v.is_finite()) {
            return Err(BenchError::Training(format!("non-finite label {}", bad)));
        }

        let mut classes = y.to_vec();
        classes.sort_by(f64::total_cmp);
        classes.dedup();
        Ok(Self { classes })
    }

    /// Class index of every label
    pub fn encode(&self, y: &[f64]) -> Result<Vec<usize>> {
        y.iter()
            .map(|v| {
                self.classes
                    .binary_search_by(|c| c.total_cmp(v))
                    .map_err(|_| BenchError::Training(format!("unknown label {}", v)))
            })
            .collect()
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }
}

/// Labels of a binary problem mapped to `{0.0, 1.0}`; the larger class is positive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct BinaryTarget {
    pub classes: [f64; 2],
    pub y: Vec<f64>,
}

impl BinaryTarget {
    pub(crate) fn new(y: &[f64], model: &str) -> Result<Self> {
        let labels = ClassLabels::fit(y)?;
        if labels.n_classes() != 2 {
            return Err(BenchError::Training(format!(
                "{} supports binary targets only, got {} classes",
                model,
                labels.n_classes()
            )));
        }
        let classes = [labels.classes[0], labels.classes[1]];
        let y = labels
            .encode(y)?
            .into_iter()
            .map(|k| k as f64)
            .collect();
        Ok(Self { classes, y })
    }

    /// Log-odds of the positive class rate
    pub(crate) fn prior_log_odds(&self) -> f64 {
        let p = self.y.iter().sum::<f64>() / self.y.len() as f64;
        let p = p.clamp(1e-15, 1.0 - 1e-15);
        (p / (1.0 - p)).ln()
    }
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Log-loss gradient and hessian with respect to the raw score
pub(crate) fn logistic_grad_hess(raw: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>) {
    raw.iter()
        .zip(y)
        .map(|(&r, &t)| {
            let p = sigmoid(r);
            (p - t, (p * (1.0 - p)).max(1e-16))
        })
        .unzip()
}

/// `[P(negative), P(positive)]` rows from raw scores
pub(crate) fn binary_proba(raw: &[f64]) -> Array2<f64> {
    let mut out = Array2::zeros((raw.len(), 2));
    for (i, &r) in raw.iter().enumerate() {
        let p = sigmoid(r);
        out[[i, 0]] = 1.0 - p;
        out[[i, 1]] = p;
    }
    out
}

/// Positive class when its probability exceeds one half
pub(crate) fn binary_predict(raw: &[f64], classes: &[f64; 2]) -> Array1<f64> {
    raw.iter()
        .map(|&r| if sigmoid(r) > 0.5 { classes[1] } else { classes[0] })
        .collect()
}

/// Index of the largest entry; the first one wins ties
pub(crate) fn argmax(row: ArrayView1<f64>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
            if v > bv {
                (i, v)
            } else {
                (bi, bv)
            }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_class_labels_sorted_and_encoded() {
        let labels = ClassLabels::fit(&[2.0, 0.0, 2.0, 1.0]).unwrap();
        assert_eq!(labels.classes(), &[0.0, 1.0, 2.0]);
        assert_eq!(labels.encode(&[1.0, 2.0]).unwrap(), vec![1, 2]);
        assert!(labels.encode(&[5.0]).is_err());
    }

    #[test]
    fn test_binary_target_rejects_multiclass() {
        assert!(BinaryTarget::new(&[0.0, 1.0, 2.0], "booster").is_err());
        let t = BinaryTarget::new(&[5.0, 9.0, 9.0, 9.0], "booster").unwrap();
        assert_eq!(t.classes, [5.0, 9.0]);
        assert_eq!(t.y, vec![0.0, 1.0, 1.0, 1.0]);
        assert!((t.prior_log_odds() - 3f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_argmax_first_on_ties() {
        assert_eq!(argmax(array![0.5, 0.5].view()), 0);
        assert_eq!(argmax(array![0.2, 0.8].view()), 1);
    }

    #[test]
    fn test_logistic_grad_hess() {
        let (g, h) = logistic_grad_hess(&[0.0], &[1.0]);
        assert_eq!(g, vec![-0.5]);
        assert_eq!(h, vec![0.25]);
    }
}
