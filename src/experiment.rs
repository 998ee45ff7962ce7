//! End-to-end benchmark run
//!
//! Load the CSV, split it, tune every configured model with a halving
//! random search, score the refit winners on the test rows and compare
//! their metrics.

use crate::config::ExperimentConfig;
use crate::data::{split_features_target, train_test_split, DataLoader, TrainTestSplit};
use crate::error::{BenchError, Result};
use crate::metrics::{ClassificationMetrics, ConfusionMatrix, MetricsComparison};
use crate::pipeline::Pipeline;
use crate::report::plots;
use crate::search::{CvResultRow, HalvingRandomSearch, ParamDistributions, ParamSet};
use crate::training::ModelKind;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Search grid for each model kind
///
/// The forest is tuned over `n_estimators` in `10, 20, ..., 100`; the
/// boosters over `max_depth` in `1..=5`.
pub fn default_param_distributions(kind: ModelKind) -> ParamDistributions {
    match kind {
        ModelKind::RandomForest => {
            ParamDistributions::new().with_range("clf__n_estimators", 10, 110, 10)
        }
        ModelKind::HistGradientBoosting | ModelKind::XGBoost | ModelKind::LightGBM => {
            ParamDistributions::new().with_range("clf__max_depth", 1, 6, 1)
        }
    }
}

/// Outcome of tuning and testing one model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReport {
    pub kind: ModelKind,
    pub best_params: ParamSet,
    /// Mean CV accuracy of the best candidate
    pub best_score: f64,
    /// Rendered refit pipeline
    pub best_estimator: String,
    pub test_accuracy: f64,
    pub metrics: ClassificationMetrics,
    pub confusion: ConfusionMatrix,
    pub cv_results: Vec<CvResultRow>,
    pub n_candidates: Vec<usize>,
    pub n_resources: Vec<usize>,
    pub fit_time_secs: f64,
}

impl ModelReport {
    pub fn cv_results_frame(&self) -> Result<DataFrame> {
        crate::search::cv_results_frame(&self.cv_results)
    }
}

/// Everything produced by [`Experiment::run`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub data_path: String,
    pub train_shape: (usize, usize),
    pub test_shape: (usize, usize),
    pub models: Vec<ModelReport>,
    pub comparison: MetricsComparison,
    /// Figures and summary written to disk
    pub written: Vec<PathBuf>,
}

impl ExperimentReport {
    pub fn model(&self, kind: ModelKind) -> Option<&ModelReport> {
        self.models.iter().find(|m| m.kind == kind)
    }

    /// Compact JSON overview: per model best params, scores and test metrics
    pub fn summary_json(&self) -> Result<String> {
        let models: Vec<serde_json::Value> = self
            .models
            .iter()
            .map(|m| {
                serde_json::json!({
                    "model": m.kind.label(),
                    "best_params": m.best_params,
                    "best_score": m.best_score,
                    "best_estimator": m.best_estimator,
                    "test_accuracy": m.test_accuracy,
                    "metrics": m.metrics.as_pairs().into_iter().collect::<std::collections::BTreeMap<_, _>>(),
                    "confusion_matrix": m.confusion.as_rows(),
                    "n_candidates": m.n_candidates,
                    "n_resources": m.n_resources,
                    "fit_time_secs": m.fit_time_secs,
                })
            })
            .collect();

        Ok(serde_json::to_string_pretty(&serde_json::json!({
            "data_path": self.data_path,
            "train_shape": self.train_shape,
            "test_shape": self.test_shape,
            "models": models,
        }))?)
    }
}

pub struct Experiment {
    config: ExperimentConfig,
    loader: DataLoader,
}

impl Experiment {
    pub fn new(config: ExperimentConfig) -> Self {
        Self {
            config,
            loader: DataLoader::new(),
        }
    }

    pub fn with_loader(mut self, loader: DataLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn load_data(&self) -> Result<DataFrame> {
        info!(source = %self.config.data_path, "Loading dataset");
        let df = self.loader.load(&self.config.data_path)?;
        info!(rows = df.height(), cols = df.width(), "Dataset loaded");
        Ok(df)
    }

    /// Separate the target and split train/test
    pub fn prepare(&self, df: &DataFrame) -> Result<TrainTestSplit> {
        let (features, target) = split_features_target(df, &self.config.target_column)?;
        let split = train_test_split(
            &features,
            &target,
            self.config.split.test_size,
            self.config.split.shuffle,
            self.config.random_state,
        )?;
        let (train, test) = split.shapes();
        info!(?train, ?test, "Train/test split");
        Ok(split)
    }

    /// Tune one model on the training rows and evaluate it on the test rows
    pub fn search_model(&self, kind: ModelKind, split: &TrainTestSplit) -> Result<ModelReport> {
        info!(model = kind.display_name(), "Tuning model");
        let mut search = HalvingRandomSearch::new(
            Pipeline::for_model(kind, self.config.random_state),
            default_param_distributions(kind),
        )
        .with_config(self.config.search.clone())
        .with_random_state(self.config.random_state);
        search.fit(&split.x_train, &split.y_train)?;

        let results = search.results().cloned().ok_or(BenchError::NotFitted)?;
        let best = search.best_estimator().ok_or(BenchError::NotFitted)?;
        let y_pred = best.predict(&split.x_test)?.to_vec();
        let metrics = ClassificationMetrics::new(&split.y_test, &y_pred)?;
        let test_accuracy = search.score(&split.x_test, &split.y_test)?;

        info!(
            model = kind.display_name(),
            best_params = %results.best_params,
            best_score = results.best_score,
            test_accuracy,
            "Model evaluated"
        );

        Ok(ModelReport {
            kind,
            best_params: results.best_params,
            best_score: results.best_score,
            best_estimator: best.to_string(),
            test_accuracy,
            confusion: metrics.confusion.clone(),
            metrics,
            cv_results: results.cv_results,
            n_candidates: results.n_candidates,
            n_resources: results.n_resources,
            fit_time_secs: results.fit_time_secs,
        })
    }

    /// Load the configured dataset and run every stage
    pub fn run(&self) -> Result<ExperimentReport> {
        let df = self.load_data()?;
        self.run_on_frame(&df)
    }

    /// Run every stage on an already loaded frame
    pub fn run_on_frame(&self, df: &DataFrame) -> Result<ExperimentReport> {
        self.config.validate()?;
        let split = self.prepare(df)?;

        let models = self
            .config
            .models
            .iter()
            .map(|&kind| self.search_model(kind, &split))
            .collect::<Result<Vec<_>>>()?;
        self.build_report(&split, models)
    }

    /// Compare the tuned models and write figures and `summary.json`
    pub fn build_report(&self, split: &TrainTestSplit, models: Vec<ModelReport>) -> Result<ExperimentReport> {
        let comparison = MetricsComparison::new(
            models.iter().map(|m| m.metrics.clone()).collect(),
            models.iter().map(|m| m.kind.label().to_string()).collect(),
        )?
        .with_lower_bound(self.config.comparison.lower_bound)
        .with_marker_size(self.config.comparison.marker_size);

        let mut report = ExperimentReport {
            data_path: self.config.data_path.clone(),
            train_shape: (split.x_train.height(), split.x_train.width()),
            test_shape: (split.x_test.height(), split.x_test.width()),
            models,
            comparison,
            written: Vec::new(),
        };
        report.written = self.write_outputs(&report)?;
        Ok(report)
    }

    fn write_outputs(&self, report: &ExperimentReport) -> Result<Vec<PathBuf>> {
        let dir = &self.config.output_dir;
        let mut written = Vec::new();

        if self.config.write_plots {
            for m in &report.models {
                let title = format!("{} confusion matrix", m.kind.label());
                let plot = plots::confusion_matrix_heatmap(&m.confusion, &title);
                written.push(plots::save_plot(
                    &plot,
                    dir,
                    &format!("confusion_{}", m.kind.short_name()),
                )?);
            }
            written.push(plots::save_plot(&report.comparison.barplot(), dir, "metrics_barplot")?);
            written.push(plots::save_plot(&report.comparison.stripplot(), dir, "metrics_stripplot")?);
        }

        std::fs::create_dir_all(dir)?;
        let summary = dir.join("summary.json");
        std::fs::write(&summary, report.summary_json()?)?;
        written.push(summary);

        info!(dir = %dir.display(), files = written.len(), "Report written");
        Ok(written)
    }
}
