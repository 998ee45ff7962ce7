//! Experiment configuration

use crate::error::{BenchError, Result};
use crate::training::ModelKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Heart disease dataset used when no other source is configured
pub const DEFAULT_DATA_PATH: &str =
    "https://raw.githubusercontent.com/mrdbourke/zero-to-mastery-ml/master/data/heart-disease.csv";

/// Default target column
pub const DEFAULT_TARGET: &str = "target";

/// Train/test split settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of rows held out for testing
    pub test_size: f64,
    /// Shuffle rows before splitting
    pub shuffle: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: 0.25,
            shuffle: true,
        }
    }
}

/// How many samples the first halving iteration gets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinResources {
    /// `2 * n_splits * n_classes`
    Smallest,
    /// Largest budget that still lets the last iteration use every sample
    Exhaust,
    /// Fixed number of samples
    Fixed(usize),
}

/// How many candidates the first halving iteration evaluates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NCandidates {
    /// `max_resources / min_resources`, capped by the grid size
    Exhaust,
    /// Fixed number of candidates
    Fixed(usize),
}

/// Halving random search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Reduction factor between iterations
    pub factor: usize,
    /// Number of stratified CV folds
    pub cv_folds: usize,
    pub min_resources: MinResources,
    pub n_candidates: NCandidates,
    /// Run as many iterations as needed to get down to few candidates,
    /// even if that means reusing the smallest budget
    pub aggressive_elimination: bool,
    /// Also score each candidate on its training folds
    pub return_train_score: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            factor: 3,
            cv_folds: 5,
            min_resources: MinResources::Smallest,
            n_candidates: NCandidates::Exhaust,
            aggressive_elimination: false,
            return_train_score: true,
        }
    }
}

impl SearchConfig {
    /// Check the search settings on their own
    pub fn validate(&self) -> Result<()> {
        if self.factor < 2 {
            return Err(BenchError::invalid_param("factor", self.factor, "must be at least 2"));
        }
        if self.cv_folds < 2 {
            return Err(BenchError::invalid_param("cv_folds", self.cv_folds, "must be at least 2"));
        }
        if let MinResources::Fixed(0) = self.min_resources {
            return Err(BenchError::invalid_param("min_resources", 0, "must be positive"));
        }
        if let NCandidates::Fixed(0) = self.n_candidates {
            return Err(BenchError::invalid_param("n_candidates", 0, "must be positive"));
        }
        if self.min_resources == MinResources::Exhaust && self.n_candidates == NCandidates::Exhaust {
            return Err(BenchError::invalid_param(
                "n_candidates",
                "exhaust",
                "n_candidates and min_resources cannot both be 'exhaust'",
            ));
        }
        Ok(())
    }
}

/// Settings for the metric comparison plots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonConfig {
    /// Lower end of the value axis
    pub lower_bound: f64,
    /// Marker size for the strip plot
    pub marker_size: usize,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            lower_bound: 0.7,
            marker_size: 10,
        }
    }
}

/// Full experiment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// CSV location: http(s) URL or local path
    pub data_path: String,
    pub target_column: String,
    pub split: SplitConfig,
    pub search: SearchConfig,
    pub comparison: ComparisonConfig,
    /// Models to tune, in report order
    pub models: Vec<ModelKind>,
    /// Where plots and the JSON summary are written
    pub output_dir: PathBuf,
    /// Write HTML figures
    pub write_plots: bool,
    /// Seed for the split, the searches and the estimators
    pub random_state: Option<u64>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            data_path: DEFAULT_DATA_PATH.to_string(),
            target_column: DEFAULT_TARGET.to_string(),
            split: SplitConfig::default(),
            search: SearchConfig::default(),
            comparison: ComparisonConfig::default(),
            models: ModelKind::all().to_vec(),
            output_dir: PathBuf::from("reports"),
            write_plots: true,
            random_state: Some(42),
        }
    }
}

impl ExperimentConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data_path(mut self, path: impl Into<String>) -> Self {
        self.data_path = path.into();
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_column = target.into();
        self
    }

    pub fn with_models(mut self, models: Vec<ModelKind>) -> Self {
        self.models = models;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_random_state(mut self, seed: Option<u64>) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.search.cv_folds = folds;
        self
    }

    pub fn with_plots(mut self, write_plots: bool) -> Self {
        self.write_plots = write_plots;
        self
    }

    /// Load from a JSON file. Missing fields are an error; use
    /// `init-config` to write a complete template.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write as pretty JSON
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.split.test_size > 0.0 && self.split.test_size < 1.0) {
            return Err(BenchError::Config(format!(
                "test_size must be in (0, 1), got {}",
                self.split.test_size
            )));
        }
        self.search.validate()?;
        if self.target_column.trim().is_empty() {
            return Err(BenchError::Config("target column is empty".to_string()));
        }
        if self.models.is_empty() {
            return Err(BenchError::Config("no models selected".to_string()));
        }
        Ok(())
    }
}
