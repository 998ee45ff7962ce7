//! Preprocessing + classifier pipeline
//!
//! Two named steps: `preprocessor` (a [`ColumnTransformer`]) and `clf`
//! (an [`Estimator`]). Hyperparameters are addressed as `step__param`.

use crate::error::{BenchError, Result};
use crate::preprocessing::ColumnTransformer;
use crate::search::{ParamSet, ParamValue};
use crate::training::{Estimator, ModelKind};
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const PREPROCESSOR_STEP: &str = "preprocessor";
pub const CLASSIFIER_STEP: &str = "clf";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub preprocessor: ColumnTransformer,
    pub clf: Estimator,
}

impl Pipeline {
    pub fn new(preprocessor: ColumnTransformer, clf: Estimator) -> Self {
        Self { preprocessor, clf }
    }

    /// Default column transformer in front of a default `kind` classifier
    pub fn for_model(kind: ModelKind, random_state: Option<u64>) -> Self {
        Self::new(
            ColumnTransformer::default(),
            Estimator::new(kind).with_random_state(random_state),
        )
    }

    /// Fit the preprocessor, then the classifier on its output
    pub fn fit(&mut self, df: &DataFrame, y: &[f64]) -> Result<&mut Self> {
        if df.height() != y.len() {
            return Err(BenchError::Shape {
                expected: format!("{} labels", df.height()),
                actual: format!("{} labels", y.len()),
            });
        }
        let x = self.preprocessor.fit_transform(df)?;
        self.clf.fit(&x, &Array1::from_vec(y.to_vec()))?;
        Ok(self)
    }

    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        self.preprocessor.transform(df)
    }

    pub fn predict(&self, df: &DataFrame) -> Result<Array1<f64>> {
        self.clf.predict(&self.transform(df)?)
    }

    pub fn predict_proba(&self, df: &DataFrame) -> Result<Array2<f64>> {
        self.clf.predict_proba(&self.transform(df)?)
    }

    /// Mean accuracy
    pub fn score(&self, df: &DataFrame, y: &[f64]) -> Result<f64> {
        self.clf
            .score(&self.transform(df)?, &Array1::from_vec(y.to_vec()))
    }

    /// Apply every `step__param` entry of `params`
    pub fn set_params(&mut self, params: &ParamSet) -> Result<&mut Self> {
        for (name, value) in params.iter() {
            self.set_param(name, value)?;
        }
        Ok(self)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let (step, param) = name.split_once("__").ok_or_else(|| {
            BenchError::invalid_param(name, value, "expected a '<step>__<param>' name")
        })?;
        match step {
            CLASSIFIER_STEP => self.clf.set_param(param, value),
            PREPROCESSOR_STEP => Err(BenchError::invalid_param(
                name,
                value,
                "the preprocessor has no tunable parameters",
            )),
            _ => Err(BenchError::invalid_param(
                name,
                value,
                format!(
                    "unknown step '{}', expected '{}' or '{}'",
                    step, PREPROCESSOR_STEP, CLASSIFIER_STEP
                ),
            )),
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pipeline(steps=[('{}', {}), ('{}', {})])",
            PREPROCESSOR_STEP, self.preprocessor, CLASSIFIER_STEP, self.clf
        )
    }
}
