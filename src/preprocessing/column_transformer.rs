//! Column transformer: per-dtype transformers stacked side by side

use super::{ColumnSelector, HandleUnknown, OneHotEncoder, StandardScaler};
use crate::error::{BenchError, Result};
use ndarray::{concatenate, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A fittable column block transformer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Transformer {
    Scaler(StandardScaler),
    OneHot(OneHotEncoder),
}

impl Transformer {
    fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<()> {
        match self {
            Transformer::Scaler(s) => s.fit(df, columns).map(|_| ()),
            Transformer::OneHot(e) => e.fit(df, columns).map(|_| ()),
        }
    }

    fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        match self {
            Transformer::Scaler(s) => s.transform(df),
            Transformer::OneHot(e) => e.transform(df),
        }
    }

    fn feature_names(&self) -> Vec<String> {
        match self {
            Transformer::Scaler(s) => s.feature_names(),
            Transformer::OneHot(e) => e.feature_names(),
        }
    }
}

impl std::fmt::Display for Transformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transformer::Scaler(_) => write!(f, "StandardScaler()"),
            Transformer::OneHot(e) => match e.handle_unknown() {
                HandleUnknown::Ignore => write!(f, "OneHotEncoder(handle_unknown='ignore')"),
                HandleUnknown::Error => write!(f, "OneHotEncoder()"),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    name: String,
    transformer: Transformer,
    selector: ColumnSelector,
    /// Columns resolved at fit time
    columns: Vec<String>,
}

/// Applies each transformer to the columns its selector picks and
/// concatenates the outputs. Unselected columns are dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnTransformer {
    entries: Vec<Entry>,
    is_fitted: bool,
}

impl Default for ColumnTransformer {
    /// Standard scaling of numeric columns plus one-hot encoding of
    /// categorical columns with unknown categories ignored
    fn default() -> Self {
        Self::new()
            .with_transformer(
                "scaler",
                Transformer::Scaler(StandardScaler::new()),
                ColumnSelector::Numeric,
            )
            .with_transformer(
                "encoder",
                Transformer::OneHot(OneHotEncoder::new(HandleUnknown::Ignore)),
                ColumnSelector::Categorical,
            )
    }
}

impl ColumnTransformer {
    /// An empty transformer; add blocks with [`Self::with_transformer`]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn with_transformer(
        mut self,
        name: impl Into<String>,
        transformer: Transformer,
        selector: ColumnSelector,
    ) -> Self {
        self.entries.push(Entry {
            name: name.into(),
            transformer,
            selector,
            columns: Vec::new(),
        });
        self.is_fitted = false;
        self
    }

    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        for entry in &mut self.entries {
            entry.columns = entry.selector.select(df);
            debug!(
                transformer = %entry.name,
                columns = entry.columns.len(),
                "Fitting column block"
            );
            entry.transformer.fit(df, &entry.columns)?;
        }
        self.is_fitted = true;
        Ok(self)
    }

    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(BenchError::NotFitted);
        }

        for entry in &self.entries {
            if let Some(missing) = entry.columns.iter().find(|c| df.column(c).is_err()) {
                return Err(BenchError::ColumnNotFound(missing.clone()));
            }
        }

        let blocks = self
            .entries
            .iter()
            .map(|e| e.transformer.transform(df))
            .collect::<Result<Vec<_>>>()?;

        if blocks.is_empty() {
            return Ok(Array2::zeros((df.height(), 0)));
        }
        let views: Vec<_> = blocks.iter().map(|b| b.view()).collect();
        Ok(concatenate(Axis(1), &views)?)
    }

    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<Array2<f64>> {
        self.fit(df)?;
        self.transform(df)
    }

    /// Output feature names prefixed with the transformer name
    pub fn feature_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|e| {
                e.transformer
                    .feature_names()
                    .into_iter()
                    .map(move |f| format!("{}__{}", e.name, f))
            })
            .collect()
    }

    /// Columns each named transformer was fitted on
    pub fn fitted_columns(&self) -> Vec<(&str, &[String])> {
        self.entries
            .iter()
            .map(|e| (e.name.as_str(), e.columns.as_slice()))
            .collect()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

impl std::fmt::Display for ColumnTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|e| format!("('{}', {}, {})", e.name, e.transformer, e.selector))
            .collect();
        write!(f, "ColumnTransformer(transformers=[{}])", parts.join(", "))
    }
}
