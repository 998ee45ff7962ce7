//! Confusion matrix over arbitrary numeric labels

use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Entry `[i][j]` counts samples of true label `labels[i]` predicted as `labels[j]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    labels: Vec<f64>,
    matrix: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Build the matrix over the sorted union of true and predicted labels
    pub fn from_labels(y_true: &[f64], y_pred: &[f64]) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(BenchError::Shape {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(BenchError::Data("cannot build a confusion matrix from no labels".into()));
        }
        if y_true.iter().chain(y_pred).any(|v| !v.is_finite()) {
            return Err(BenchError::Data("labels must be finite".into()));
        }

        let mut labels: Vec<f64> = y_true.iter().chain(y_pred).copied().collect();
        labels.sort_by(f64::total_cmp);
        labels.dedup();

        let position = |v: &f64| labels.binary_search_by(|l| l.total_cmp(v)).unwrap_or(0);
        let mut matrix = vec![vec![0usize; labels.len()]; labels.len()];
        for (t, p) in y_true.iter().zip(y_pred) {
            matrix[position(t)][position(p)] += 1;
        }

        Ok(Self { labels, matrix })
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    pub fn as_rows(&self) -> &[Vec<usize>] {
        &self.matrix
    }

    pub fn n_classes(&self) -> usize {
        self.labels.len()
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    pub fn accuracy(&self) -> f64 {
        let correct: usize = (0..self.n_classes()).map(|i| self.matrix[i][i]).sum();
        correct as f64 / self.total().max(1) as f64
    }

    fn binary_cell(&self, actual: usize, predicted: usize) -> Option<usize> {
        (self.n_classes() == 2).then(|| self.matrix[actual][predicted])
    }

    /// True negatives; `None` unless the problem is binary
    pub fn tn(&self) -> Option<usize> {
        self.binary_cell(0, 0)
    }

    pub fn fp(&self) -> Option<usize> {
        self.binary_cell(0, 1)
    }

    pub fn fn_(&self) -> Option<usize> {
        self.binary_cell(1, 0)
    }

    pub fn tp(&self) -> Option<usize> {
        self.binary_cell(1, 1)
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .matrix
            .iter()
            .flatten()
            .map(|v| v.to_string().len())
            .max()
            .unwrap_or(1);

        for (i, row) in self.matrix.iter().enumerate() {
            let cells: Vec<String> = row.iter().map(|v| format!("{:>width$}", v)).collect();
            let open = if i == 0 { "[[" } else { " [" };
            let close = if i + 1 == self.matrix.len() { "]]" } else { "]" };
            write!(f, "{}{}{}", open, cells.join(" "), close)?;
            if i + 1 < self.matrix.len() {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_counts() {
        let y_true = [0.0, 0.0, 1.0, 1.0, 1.0];
        let y_pred = [0.0, 1.0, 1.0, 1.0, 0.0];
        let cm = ConfusionMatrix::from_labels(&y_true, &y_pred).unwrap();

        assert_eq!(cm.as_rows(), &[vec![1, 1], vec![1, 2]]);
        assert_eq!(cm.tn(), Some(1));
        assert_eq!(cm.fp(), Some(1));
        assert_eq!(cm.fn_(), Some(1));
        assert_eq!(cm.tp(), Some(2));
        assert!((cm.accuracy() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_display_is_bracketed_grid() {
        let cm = ConfusionMatrix::from_labels(&[0.0, 1.0, 1.0], &[0.0, 1.0, 0.0]).unwrap();
        assert_eq!(cm.to_string(), "[[1 0]\n [1 1]]");
    }

    #[test]
    fn test_labels_are_union_of_both_sides() {
        let cm = ConfusionMatrix::from_labels(&[1.0, 1.0], &[1.0, 3.0]).unwrap();
        assert_eq!(cm.labels(), &[1.0, 3.0]);
        assert_eq!(cm.as_rows(), &[vec![1, 1], vec![0, 0]]);
    }

    #[test]
    fn test_multiclass_has_no_binary_cells() {
        let cm = ConfusionMatrix::from_labels(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0]).unwrap();
        assert_eq!(cm.tp(), None);
        assert_eq!(cm.accuracy(), 1.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(ConfusionMatrix::from_labels(&[0.0], &[0.0, 1.0]).is_err());
        assert!(ConfusionMatrix::from_labels(&[], &[]).is_err());
    }
}
