//! Side-by-side comparison of several models' metrics

use super::classification::{ClassificationMetrics, METRIC_NAMES};
use crate::error::{BenchError, Result};
use crate::report::plots;
use plotly::Plot;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsComparison {
    metrics: Vec<ClassificationMetrics>,
    labels: Vec<String>,
    /// Lower end of the value axis in plots
    pub lower_bound: f64,
    /// Strip plot marker size
    pub marker_size: usize,
}

impl MetricsComparison {
    /// One label per metrics entry, in the same order
    pub fn new(metrics: Vec<ClassificationMetrics>, labels: Vec<String>) -> Result<Self> {
        if metrics.is_empty() {
            return Err(BenchError::Data("nothing to compare".into()));
        }
        if metrics.len() != labels.len() {
            return Err(BenchError::Shape {
                expected: format!("{} labels", metrics.len()),
                actual: format!("{} labels", labels.len()),
            });
        }
        Ok(Self {
            metrics,
            labels,
            lower_bound: 0.7,
            marker_size: 10,
        })
    }

    pub fn with_lower_bound(mut self, lower_bound: f64) -> Self {
        self.lower_bound = lower_bound;
        self
    }

    pub fn with_marker_size(mut self, marker_size: usize) -> Self {
        self.marker_size = marker_size;
        self
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn metrics(&self) -> &[ClassificationMetrics] {
        &self.metrics
    }

    /// Long format: one row per (model, metric)
    pub fn to_df(&self) -> Result<DataFrame> {
        let mut models = Vec::new();
        let mut names = Vec::new();
        let mut values = Vec::new();
        for (label, m) in self.labels.iter().zip(&self.metrics) {
            for (name, value) in m.as_pairs() {
                models.push(label.clone());
                names.push(name.to_string());
                values.push(value);
            }
        }
        Ok(DataFrame::new(vec![
            Column::new("model".into(), models),
            Column::new("metric".into(), names),
            Column::new("value".into(), values),
        ])?)
    }

    /// Wide format: a `metric` column plus one column per model
    pub fn wide_df(&self) -> Result<DataFrame> {
        let mut columns = vec![Column::new(
            "metric".into(),
            METRIC_NAMES.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        )];
        for (label, m) in self.labels.iter().zip(&self.metrics) {
            let values: Vec<f64> = m.as_pairs().into_iter().map(|(_, v)| v).collect();
            columns.push(Column::new(label.as_str().into(), values));
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Model with the highest value of `metric`; the first one wins ties
    pub fn best_by(&self, metric: &str) -> Result<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for (label, m) in self.labels.iter().zip(&self.metrics) {
            let value = m
                .get(metric)
                .ok_or_else(|| BenchError::invalid_param("metric", metric, "unknown metric"))?;
            if best.map_or(true, |(_, b)| value > b) {
                best = Some((label.as_str(), value));
            }
        }
        best.ok_or_else(|| BenchError::Data("nothing to compare".into()))
    }

    /// Grouped bars per metric, one colour per model
    pub fn barplot(&self) -> Plot {
        plots::metrics_barplot(self, "Model comparison")
    }

    /// One marker per model and metric
    pub fn stripplot(&self) -> Plot {
        plots::metrics_stripplot(self, "Model comparison")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comparison() -> MetricsComparison {
        let a = ClassificationMetrics::new(&[0.0, 0.0, 1.0, 1.0], &[0.0, 0.0, 1.0, 1.0]).unwrap();
        let b = ClassificationMetrics::new(&[0.0, 0.0, 1.0, 1.0], &[0.0, 1.0, 1.0, 1.0]).unwrap();
        MetricsComparison::new(vec![a, b], vec!["A".into(), "B".into()]).unwrap()
    }

    #[test]
    fn test_long_frame_shape() {
        let df = comparison().to_df().unwrap();
        assert_eq!(df.height(), 2 * METRIC_NAMES.len());
        assert_eq!(df.width(), 3);
        for name in ["model", "metric", "value"] {
            assert!(df.column(name).is_ok());
        }
    }

    #[test]
    fn test_wide_frame_has_model_columns() {
        let df = comparison().wide_df().unwrap();
        assert_eq!(df.width(), 3);
        assert_eq!(df.height(), METRIC_NAMES.len());
        assert!(df.column("B").is_ok());
    }

    #[test]
    fn test_best_by() {
        let cmp = comparison();
        assert_eq!(cmp.best_by("accuracy").unwrap(), ("A", 1.0));
        assert_eq!(cmp.best_by("recall").unwrap(), ("A", 1.0));
        assert!(cmp.best_by("auc").is_err());
    }

    #[test]
    fn test_label_count_must_match() {
        let m = ClassificationMetrics::new(&[0.0, 1.0], &[0.0, 1.0]).unwrap();
        assert!(MetricsComparison::new(vec![m], vec![]).is_err());
        assert!(MetricsComparison::new(vec![], vec![]).is_err());
    }
}
