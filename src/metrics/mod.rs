//! Evaluation metrics
//!
//! - [`ConfusionMatrix`] over the sorted union of labels
//! - [`ClassificationMetrics`] for binary problems
//! - [`MetricsComparison`] across models, as frames and plots

pub mod classification;
pub mod comparison;
pub mod confusion;

pub use classification::{ClassificationMetrics, METRIC_NAMES};
pub use comparison::MetricsComparison;
pub use confusion::ConfusionMatrix;
