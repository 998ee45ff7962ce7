//! Hyperparameter search
//!
//! - [`ParamDistributions`] and [`ParameterSampler`] describe and draw candidates
//! - [`StratifiedKFold`] builds the CV splits
//! - [`HalvingRandomSearch`] runs successive halving over a pipeline

pub mod cv;
pub mod halving;
pub mod params;

pub use cv::{CVSplit, StratifiedKFold};
pub use halving::{cv_results_frame, CvResultRow, HalvingRandomSearch, SearchResults};
pub use params::{range, ParamDistributions, ParamSet, ParamValue, ParameterSampler};
