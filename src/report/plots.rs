//! Plotly figures for the experiment report

use crate::error::Result;
use crate::metrics::{ConfusionMatrix, MetricsComparison};
use plotly::common::{Marker, Mode};
use plotly::layout::{Axis, BarMode, Layout};
use plotly::{Bar, HeatMap, Plot, Scatter};
use std::path::{Path, PathBuf};
use tracing::debug;

fn label_text(label: f64) -> String {
    if label.fract() == 0.0 {
        format!("{}", label as i64)
    } else {
        label.to_string()
    }
}

/// Heatmap of a confusion matrix; the first true label is the top row
pub fn confusion_matrix_heatmap(cm: &ConfusionMatrix, title: &str) -> Plot {
    let predicted: Vec<String> = cm.labels().iter().map(|&l| label_text(l)).collect();
    let actual: Vec<String> = predicted.iter().rev().cloned().collect();
    let z: Vec<Vec<usize>> = cm.as_rows().iter().rev().cloned().collect();

    let trace = HeatMap::new(predicted, actual, z).name("count");
    let layout = Layout::new()
        .title(title)
        .x_axis(Axis::new().title("Predicted label"))
        .y_axis(Axis::new().title("True label"));

    let mut plot = Plot::new();
    plot.add_trace(trace);
    plot.set_layout(layout);
    plot
}

fn value_axis(lower_bound: f64) -> Axis {
    Axis::new().title("Value").range(vec![lower_bound, 1.0])
}

/// Grouped bars: metrics on the x axis, one trace per model
pub fn metrics_barplot(comparison: &MetricsComparison, title: &str) -> Plot {
    let mut plot = Plot::new();
    for (label, metrics) in comparison.labels().iter().zip(comparison.metrics()) {
        let (names, values): (Vec<&str>, Vec<f64>) = metrics.as_pairs().into_iter().unzip();
        plot.add_trace(Bar::new(names, values).name(label));
    }
    plot.set_layout(
        Layout::new()
            .title(title)
            .bar_mode(BarMode::Group)
            .x_axis(Axis::new().title("Metric"))
            .y_axis(value_axis(comparison.lower_bound)),
    );
    plot
}

/// Markers: metrics on the x axis, one trace per model
pub fn metrics_stripplot(comparison: &MetricsComparison, title: &str) -> Plot {
    let mut plot = Plot::new();
    for (label, metrics) in comparison.labels().iter().zip(comparison.metrics()) {
        let (names, values): (Vec<&str>, Vec<f64>) = metrics.as_pairs().into_iter().unzip();
        plot.add_trace(
            Scatter::new(names, values)
                .mode(Mode::Markers)
                .name(label)
                .marker(Marker::new().size(comparison.marker_size)),
        );
    }
    plot.set_layout(
        Layout::new()
            .title(title)
            .x_axis(Axis::new().title("Metric"))
            .y_axis(value_axis(comparison.lower_bound)),
    );
    plot
}

/// Write `<dir>/<name>.html`, creating `dir` if needed
pub fn save_plot(plot: &Plot, dir: &Path, name: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.html", name));
    std::fs::write(&path, plot.to_html())?;
    debug!(path = %path.display(), "Plot written");
    Ok(path)
}
