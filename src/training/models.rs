//! Model kinds and the [`Estimator`] dispatch enum

use super::decision_tree::Criterion;
use super::hist_gradient_boosting::{HistGradientBoostingClassifier, HistGradientBoostingConfig};
use super::lightgbm::{BoostingType, LightGBMClassifier, LightGBMConfig};
use super::random_forest::{MaxFeatures, RandomForest};
use super::xgboost::{XGBoostClassifier, XGBoostConfig};
use crate::error::{BenchError, Result};
use crate::search::ParamValue;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::debug;

/// The classifier families compared by the experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    RandomForest,
    HistGradientBoosting,
    XGBoost,
    LightGBM,
}

impl ModelKind {
    /// All kinds in comparison order
    pub fn all() -> [ModelKind; 4] {
        [
            ModelKind::RandomForest,
            ModelKind::HistGradientBoosting,
            ModelKind::XGBoost,
            ModelKind::LightGBM,
        ]
    }

    /// Estimator class name
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "RandomForestClassifier",
            ModelKind::HistGradientBoosting => "HistGradientBoostingClassifier",
            ModelKind::XGBoost => "XGBClassifier",
            ModelKind::LightGBM => "LGBMClassifier",
        }
    }

    /// Human-readable label used in reports and plots
    pub fn label(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "Random Forest",
            ModelKind::HistGradientBoosting => "HistGradientBoosting",
            ModelKind::XGBoost => "XGBoost",
            ModelKind::LightGBM => "LightGBM",
        }
    }

    /// Short name for the command line and file names
    pub fn short_name(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "rf",
            ModelKind::HistGradientBoosting => "hgb",
            ModelKind::XGBoost => "xgb",
            ModelKind::LightGBM => "lgbm",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for ModelKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_lowercase().replace(['-', ' ', '_'], "");
        match key.as_str() {
            "rf" | "randomforest" | "randomforestclassifier" => Ok(ModelKind::RandomForest),
            "hgb" | "histgradientboosting" | "histgradientboostingclassifier" => {
                Ok(ModelKind::HistGradientBoosting)
            }
            "xgb" | "xgboost" | "xgbclassifier" => Ok(ModelKind::XGBoost),
            "lgbm" | "lightgbm" | "lgbmclassifier" => Ok(ModelKind::LightGBM),
            _ => Err(BenchError::Config(format!(
                "unknown model '{}', expected one of rf, hgb, xgb, lgbm",
                s
            ))),
        }
    }
}

/// A configured (and possibly fitted) classifier of any kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Estimator {
    RandomForest(RandomForest),
    HistGradientBoosting(HistGradientBoostingClassifier),
    XGBoost(XGBoostClassifier),
    LightGBM(LightGBMClassifier),
}

impl Estimator {
    /// Estimator with library default hyperparameters
    pub fn new(kind: ModelKind) -> Self {
        match kind {
            ModelKind::RandomForest => Estimator::RandomForest(RandomForest::default()),
            ModelKind::HistGradientBoosting => {
                Estimator::HistGradientBoosting(HistGradientBoostingClassifier::default())
            }
            ModelKind::XGBoost => Estimator::XGBoost(XGBoostClassifier::default()),
            ModelKind::LightGBM => Estimator::LightGBM(LightGBMClassifier::default()),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Estimator::RandomForest(_) => ModelKind::RandomForest,
            Estimator::HistGradientBoosting(_) => ModelKind::HistGradientBoosting,
            Estimator::XGBoost(_) => ModelKind::XGBoost,
            Estimator::LightGBM(_) => ModelKind::LightGBM,
        }
    }

    pub fn with_random_state(mut self, seed: Option<u64>) -> Self {
        match &mut self {
            Estimator::RandomForest(m) => m.random_state = seed,
            Estimator::HistGradientBoosting(m) => m.config.random_state = seed,
            Estimator::XGBoost(m) => m.config.random_state = seed,
            Estimator::LightGBM(m) => m.config.random_state = seed,
        }
        self
    }

    pub fn random_state(&self) -> Option<u64> {
        match self {
            Estimator::RandomForest(m) => m.random_state,
            Estimator::HistGradientBoosting(m) => m.config.random_state,
            Estimator::XGBoost(m) => m.config.random_state,
            Estimator::LightGBM(m) => m.config.random_state,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let start = Instant::now();
        match self {
            Estimator::RandomForest(m) => {
                m.fit(x, y)?;
            }
            Estimator::HistGradientBoosting(m) => {
                m.fit(x, y)?;
            }
            Estimator::XGBoost(m) => {
                m.fit(x, y)?;
            }
            Estimator::LightGBM(m) => {
                m.fit(x, y)?;
            }
        }
        debug!(
            model = self.kind().display_name(),
            n_samples = x.nrows(),
            n_features = x.ncols(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Estimator fitted"
        );
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Estimator::RandomForest(m) => m.predict(x),
            Estimator::HistGradientBoosting(m) => m.predict(x),
            Estimator::XGBoost(m) => m.predict(x),
            Estimator::LightGBM(m) => m.predict(x),
        }
    }

    /// Class probabilities, one column per entry of [`Estimator::classes`]
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            Estimator::RandomForest(m) => m.predict_proba(x),
            Estimator::HistGradientBoosting(m) => m.predict_proba(x),
            Estimator::XGBoost(m) => m.predict_proba(x),
            Estimator::LightGBM(m) => m.predict_proba(x),
        }
    }

    pub fn classes(&self) -> &[f64] {
        match self {
            Estimator::RandomForest(m) => m.classes(),
            Estimator::HistGradientBoosting(m) => m.classes(),
            Estimator::XGBoost(m) => m.classes(),
            Estimator::LightGBM(m) => m.classes(),
        }
    }

    /// Mean accuracy on the given data
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let pred = self.predict(x)?;
        accuracy(&pred, y)
    }

    /// Current hyperparameters in declaration order
    pub fn params(&self) -> Vec<(&'static str, ParamValue)> {
        match self {
            Estimator::RandomForest(m) => vec![
                ("n_estimators", m.n_estimators.into()),
                ("criterion", criterion_value(m.criterion)),
                ("max_depth", m.max_depth.into()),
                ("min_samples_split", m.min_samples_split.into()),
                ("min_samples_leaf", m.min_samples_leaf.into()),
                ("max_features", max_features_value(m.max_features)),
                ("bootstrap", m.bootstrap.into()),
                ("random_state", seed_value(m.random_state)),
            ],
            Estimator::HistGradientBoosting(m) => {
                let c = &m.config;
                vec![
                    ("learning_rate", c.learning_rate.into()),
                    ("max_iter", c.max_iter.into()),
                    ("max_leaf_nodes", c.max_leaf_nodes.into()),
                    ("max_depth", c.max_depth.into()),
                    ("min_samples_leaf", c.min_samples_leaf.into()),
                    ("l2_regularization", c.l2_regularization.into()),
                    ("max_bins", c.max_bins.into()),
                    ("random_state", seed_value(c.random_state)),
                ]
            }
            Estimator::XGBoost(m) => {
                let c = &m.config;
                vec![
                    ("n_estimators", c.n_estimators.into()),
                    ("learning_rate", c.learning_rate.into()),
                    ("max_depth", c.max_depth.into()),
                    ("min_child_weight", c.min_child_weight.into()),
                    ("gamma", c.gamma.into()),
                    ("subsample", c.subsample.into()),
                    ("colsample_bytree", c.colsample_bytree.into()),
                    ("reg_alpha", c.reg_alpha.into()),
                    ("reg_lambda", c.reg_lambda.into()),
                    ("base_score", c.base_score.into()),
                    ("random_state", seed_value(c.random_state)),
                ]
            }
            Estimator::LightGBM(m) => {
                let c = &m.config;
                let mut params = vec![
                    ("boosting_type", ParamValue::Str(c.boosting_type.to_string())),
                    ("num_leaves", c.num_leaves.into()),
                    ("max_depth", ParamValue::Int(c.max_depth.map_or(-1, |d| d as i64))),
                    ("learning_rate", c.learning_rate.into()),
                    ("n_estimators", c.n_estimators.into()),
                    ("min_split_gain", c.min_split_gain.into()),
                    ("min_child_weight", c.min_child_weight.into()),
                    ("min_child_samples", c.min_child_samples.into()),
                    ("colsample_bytree", c.colsample_bytree.into()),
                    ("reg_alpha", c.reg_alpha.into()),
                    ("reg_lambda", c.reg_lambda.into()),
                    ("max_bin", c.max_bin.into()),
                ];
                if let BoostingType::Goss { top_rate, other_rate } = c.boosting_type {
                    params.push(("top_rate", top_rate.into()));
                    params.push(("other_rate", other_rate.into()));
                }
                params.push(("random_state", seed_value(c.random_state)));
                params
            }
        }
    }

    /// Set one hyperparameter by name
    pub fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match self {
            Estimator::RandomForest(m) => set_forest_param(m, name, value),
            Estimator::HistGradientBoosting(m) => set_hgb_param(&mut m.config, name, value),
            Estimator::XGBoost(m) => set_xgb_param(&mut m.config, name, value),
            Estimator::LightGBM(m) => set_lgbm_param(&mut m.config, name, value),
        }
    }
}

impl fmt::Display for Estimator {
    /// Class name followed by the parameters that differ from the defaults
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let defaults = Estimator::new(self.kind()).params();
        let changed: Vec<String> = self
            .params()
            .into_iter()
            .filter(|(name, value)| {
                defaults
                    .iter()
                    .find(|(d, _)| d == name)
                    .map_or(true, |(_, dv)| dv != value)
            })
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        write!(f, "{}({})", self.kind().display_name(), changed.join(", "))
    }
}

/// Fraction of matching labels
pub(crate) fn accuracy(pred: &Array1<f64>, y: &Array1<f64>) -> Result<f64> {
    if pred.len() != y.len() {
        return Err(BenchError::Shape {
            expected: format!("{} labels", pred.len()),
            actual: format!("{} labels", y.len()),
        });
    }
    if y.is_empty() {
        return Err(BenchError::Data("cannot score an empty target".into()));
    }
    let correct = pred.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
    Ok(correct as f64 / y.len() as f64)
}

fn seed_value(seed: Option<u64>) -> ParamValue {
    seed.map_or(ParamValue::None, |s| ParamValue::Int(s as i64))
}

fn criterion_value(criterion: Criterion) -> ParamValue {
    match criterion {
        Criterion::Gini => "gini".into(),
        Criterion::Entropy => "entropy".into(),
    }
}

fn max_features_value(max_features: MaxFeatures) -> ParamValue {
    match max_features {
        MaxFeatures::Sqrt => "sqrt".into(),
        MaxFeatures::Log2 => "log2".into(),
        MaxFeatures::Fraction(f) => f.into(),
        MaxFeatures::Fixed(k) => k.into(),
        MaxFeatures::All => ParamValue::None,
    }
}

fn unknown_param(model: &str, name: &str, value: &ParamValue) -> BenchError {
    BenchError::invalid_param(name, value, format!("not a parameter of {}", model))
}

fn positive(name: &str, value: &ParamValue) -> Result<usize> {
    let v = value.as_usize(name)?;
    if v == 0 {
        return Err(BenchError::invalid_param(name, value, "must be at least 1"));
    }
    Ok(v)
}

fn unit_interval(name: &str, value: &ParamValue) -> Result<f64> {
    let v = value.as_f64(name)?;
    if !(v > 0.0 && v <= 1.0) {
        return Err(BenchError::invalid_param(name, value, "must be in (0, 1]"));
    }
    Ok(v)
}

fn non_negative(name: &str, value: &ParamValue) -> Result<f64> {
    let v = value.as_f64(name)?;
    if !(v >= 0.0) {
        return Err(BenchError::invalid_param(name, value, "must be non-negative"));
    }
    Ok(v)
}

fn set_forest_param(m: &mut RandomForest, name: &str, value: &ParamValue) -> Result<()> {
    match name {
        "n_estimators" => m.n_estimators = positive(name, value)?,
        "max_depth" => m.max_depth = value.as_opt_usize(name)?,
        "min_samples_split" => {
            let v = value.as_usize(name)?;
            if v < 2 {
                return Err(BenchError::invalid_param(name, value, "must be at least 2"));
            }
            m.min_samples_split = v;
        }
        "min_samples_leaf" => m.min_samples_leaf = positive(name, value)?,
        "max_features" => {
            m.max_features = match value {
                ParamValue::None => MaxFeatures::All,
                ParamValue::Str(s) if s == "sqrt" => MaxFeatures::Sqrt,
                ParamValue::Str(s) if s == "log2" => MaxFeatures::Log2,
                ParamValue::Int(_) => MaxFeatures::Fixed(positive(name, value)?),
                ParamValue::Float(_) => MaxFeatures::Fraction(unit_interval(name, value)?),
                _ => {
                    return Err(BenchError::invalid_param(
                        name,
                        value,
                        "expected 'sqrt', 'log2', an integer, a fraction or None",
                    ))
                }
            }
        }
        "bootstrap" => m.bootstrap = value.as_bool(name)?,
        "criterion" => {
            m.criterion = match value.as_str(name)? {
                "gini" => Criterion::Gini,
                "entropy" | "log_loss" => Criterion::Entropy,
                _ => {
                    return Err(BenchError::invalid_param(
                        name,
                        value,
                        "expected 'gini' or 'entropy'",
                    ))
                }
            }
        }
        "random_state" => m.random_state = value.as_seed(name)?,
        _ => return Err(unknown_param("RandomForestClassifier", name, value)),
    }
    Ok(())
}

fn set_hgb_param(c: &mut HistGradientBoostingConfig, name: &str, value: &ParamValue) -> Result<()> {
    match name {
        "max_iter" => c.max_iter = positive(name, value)?,
        "learning_rate" => c.learning_rate = value.as_f64(name)?,
        "max_leaf_nodes" => c.max_leaf_nodes = value.as_opt_usize(name)?,
        "max_depth" => c.max_depth = value.as_opt_usize(name)?,
        "min_samples_leaf" => c.min_samples_leaf = positive(name, value)?,
        "l2_regularization" => c.l2_regularization = non_negative(name, value)?,
        "max_bins" => {
            let v = value.as_usize(name)?;
            if !(2..=255).contains(&v) {
                return Err(BenchError::invalid_param(name, value, "must be in [2, 255]"));
            }
            c.max_bins = v;
        }
        "random_state" => c.random_state = value.as_seed(name)?,
        _ => return Err(unknown_param("HistGradientBoostingClassifier", name, value)),
    }
    Ok(())
}

fn set_xgb_param(c: &mut XGBoostConfig, name: &str, value: &ParamValue) -> Result<()> {
    match name {
        "n_estimators" => c.n_estimators = positive(name, value)?,
        "learning_rate" | "eta" => c.learning_rate = value.as_f64(name)?,
        "max_depth" => c.max_depth = positive(name, value)?,
        "min_child_weight" => c.min_child_weight = non_negative(name, value)?,
        "reg_lambda" | "lambda" => c.reg_lambda = non_negative(name, value)?,
        "reg_alpha" | "alpha" => c.reg_alpha = non_negative(name, value)?,
        "gamma" => c.gamma = non_negative(name, value)?,
        "subsample" => c.subsample = unit_interval(name, value)?,
        "colsample_bytree" => c.colsample_bytree = unit_interval(name, value)?,
        "base_score" => c.base_score = value.as_opt_f64(name)?,
        "random_state" | "seed" => c.random_state = value.as_seed(name)?,
        _ => return Err(unknown_param("XGBClassifier", name, value)),
    }
    Ok(())
}

fn set_lgbm_param(c: &mut LightGBMConfig, name: &str, value: &ParamValue) -> Result<()> {
    match name {
        "n_estimators" => c.n_estimators = positive(name, value)?,
        "learning_rate" => c.learning_rate = value.as_f64(name)?,
        "num_leaves" => {
            let v = value.as_usize(name)?;
            if v < 2 {
                return Err(BenchError::invalid_param(name, value, "must be at least 2"));
            }
            c.num_leaves = v;
        }
        // Zero or negative means no depth limit
        "max_depth" => c.max_depth = value.as_opt_usize(name)?.filter(|&d| d > 0),
        "min_child_samples" => c.min_child_samples = value.as_usize(name)?,
        "min_child_weight" => c.min_child_weight = non_negative(name, value)?,
        "min_split_gain" => c.min_split_gain = non_negative(name, value)?,
        "reg_lambda" => c.reg_lambda = non_negative(name, value)?,
        "reg_alpha" => c.reg_alpha = non_negative(name, value)?,
        "colsample_bytree" => c.colsample_bytree = unit_interval(name, value)?,
        "max_bin" => {
            let v = value.as_usize(name)?;
            if !(2..=255).contains(&v) {
                return Err(BenchError::invalid_param(name, value, "must be in [2, 255]"));
            }
            c.max_bin = v;
        }
        "boosting_type" => {
            c.boosting_type = match value.as_str(name)? {
                "gbdt" => BoostingType::Gbdt,
                "goss" => match c.boosting_type {
                    goss @ BoostingType::Goss { .. } => goss,
                    BoostingType::Gbdt => BoostingType::Goss {
                        top_rate: 0.2,
                        other_rate: 0.1,
                    },
                },
                _ => {
                    return Err(BenchError::invalid_param(
                        name,
                        value,
                        "expected 'gbdt' or 'goss'",
                    ))
                }
            }
        }
        "top_rate" | "other_rate" => {
            let rate = unit_interval(name, value)?;
            match &mut c.boosting_type {
                BoostingType::Goss { top_rate, .. } if name == "top_rate" => *top_rate = rate,
                BoostingType::Goss { other_rate, .. } => *other_rate = rate,
                BoostingType::Gbdt => {
                    return Err(BenchError::invalid_param(
                        name,
                        value,
                        "only valid with boosting_type='goss'",
                    ))
                }
            }
        }
        "random_state" => c.random_state = value.as_seed(name)?,
        _ => return Err(unknown_param("LGBMClassifier", name, value)),
    }
    Ok(())
}
