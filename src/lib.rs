//! CardioBench - tree-ensemble benchmark for tabular classification
//!
//! This crate loads a CSV dataset, fits a shared preprocessing step and
//! tunes several classifiers with a halving random search:
//! - Data loading from a URL or a local file, train/test splitting
//! - Standard scaling and one-hot encoding selected by column dtype
//! - Random Forest, histogram gradient boosting, XGBoost- and LightGBM-style boosting
//! - Successive halving over sampled hyperparameters with stratified CV
//! - Binary classification metrics, model comparison and plotly figures
//!
//! # Modules
//!
//! ## Core
//! - [`data`] - Loading, inspection and train/test split
//! - [`preprocessing`] - Column transformer, scaler, one-hot encoder
//! - [`training`] - Tree-ensemble classifiers
//! - [`pipeline`] - Preprocessor + classifier
//! - [`search`] - Parameter sampling, stratified CV, halving search
//!
//! ## Evaluation
//! - [`metrics`] - Confusion matrix, classification metrics, comparison
//! - [`report`] - Plotly figures and console tables
//!
//! ## Orchestration
//! - [`config`] - Experiment configuration
//! - [`experiment`] - End-to-end run
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Core ML modules
pub mod data;
pub mod preprocessing;
pub mod training;
pub mod pipeline;
pub mod search;

// Evaluation
pub mod metrics;
pub mod report;

// Orchestration
pub mod experiment;
pub mod cli;

pub use error::{BenchError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{BenchError, Result};

    // Configuration
    pub use crate::config::{ComparisonConfig, ExperimentConfig, MinResources, NCandidates, SearchConfig, SplitConfig};

    // Data
    pub use crate::data::{split_features_target, train_test_split, DataLoader, DataSource, DatasetSummary, TrainTestSplit};

    // Preprocessing
    pub use crate::preprocessing::{ColumnSelector, ColumnTransformer, HandleUnknown, OneHotEncoder, StandardScaler};

    // Training
    pub use crate::training::{
        Estimator, HistGradientBoostingClassifier, LightGBMClassifier, ModelKind, RandomForest, XGBoostClassifier,
    };

    // Pipeline and search
    pub use crate::pipeline::Pipeline;
    pub use crate::search::{HalvingRandomSearch, ParamDistributions, ParamSet, ParamValue, ParameterSampler, StratifiedKFold};

    // Evaluation
    pub use crate::metrics::{ClassificationMetrics, ConfusionMatrix, MetricsComparison};

    // Orchestration
    pub use crate::experiment::{default_param_distributions, Experiment, ExperimentReport, ModelReport};
}
