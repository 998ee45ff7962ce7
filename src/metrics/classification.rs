//! Binary classification metrics derived from the confusion matrix

use super::confusion::ConfusionMatrix;
use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Metric names in reporting order
pub const METRIC_NAMES: [&str; 8] = [
    "accuracy",
    "balanced_accuracy",
    "precision",
    "recall",
    "specificity",
    "npv",
    "f1",
    "mcc",
];

/// Test-set metrics of one binary classifier; the larger label is positive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub balanced_accuracy: f64,
    /// Positive predictive value
    pub precision: f64,
    /// Sensitivity
    pub recall: f64,
    pub specificity: f64,
    /// Negative predictive value
    pub npv: f64,
    pub f1: f64,
    /// Matthews correlation coefficient
    pub mcc: f64,
    pub support: usize,
    pub confusion: ConfusionMatrix,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ClassificationMetrics {
    pub fn new(y_true: &[f64], y_pred: &[f64]) -> Result<Self> {
        let confusion = ConfusionMatrix::from_labels(y_true, y_pred)?;
        Self::from_confusion(confusion)
    }

    pub fn from_confusion(confusion: ConfusionMatrix) -> Result<Self> {
        let (tn, fp, fn_, tp) = match (confusion.tn(), confusion.fp(), confusion.fn_(), confusion.tp()) {
            (Some(tn), Some(fp), Some(fn_), Some(tp)) => (tn, fp, fn_, tp),
            _ => {
                return Err(BenchError::Data(format!(
                    "binary metrics need exactly 2 labels, got {}",
                    confusion.n_classes()
                )))
            }
        };

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let specificity = ratio(tn, tn + fp);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        let mcc_den = ((tp + fp) as f64 * (tp + fn_) as f64 * (tn + fp) as f64 * (tn + fn_) as f64).sqrt();
        let mcc = if mcc_den == 0.0 {
            0.0
        } else {
            (tp as f64 * tn as f64 - fp as f64 * fn_ as f64) / mcc_den
        };

        Ok(Self {
            accuracy: confusion.accuracy(),
            balanced_accuracy: (recall + specificity) / 2.0,
            precision,
            recall,
            specificity,
            npv: ratio(tn, tn + fn_),
            f1,
            mcc,
            support: confusion.total(),
            confusion,
        })
    }

    /// `(name, value)` for every entry of [`METRIC_NAMES`]
    pub fn as_pairs(&self) -> Vec<(&'static str, f64)> {
        METRIC_NAMES
            .iter()
            .map(|&name| (name, self.get(name).unwrap_or(f64::NAN)))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "accuracy" => Some(self.accuracy),
            "balanced_accuracy" => Some(self.balanced_accuracy),
            "precision" => Some(self.precision),
            "recall" | "sensitivity" => Some(self.recall),
            "specificity" => Some(self.specificity),
            "npv" => Some(self.npv),
            "f1" => Some(self.f1),
            "mcc" => Some(self.mcc),
            _ => None,
        }
    }
}

impl fmt::Display for ClassificationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<18} {:>8}", "metric", "value")?;
        for (name, value) in self.as_pairs() {
            writeln!(f, "{:<18} {:>8.4}", name, value)?;
        }
        write!(f, "{:<18} {:>8}", "support", self.support)
    }
}
