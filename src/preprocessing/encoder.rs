//! One-hot encoding of categorical columns

use super::string_column;
use crate::error::{BenchError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Category name used for missing values
pub const MISSING_CATEGORY: &str = "missing";

/// What to do with categories not seen during fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleUnknown {
    /// Encode as an all-zero block
    Ignore,
    /// Fail the transform
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnCategories {
    column: String,
    /// Sorted categories; output order
    categories: Vec<String>,
    index: HashMap<String, usize>,
}

/// One-hot encoder with sorted per-column categories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    handle_unknown: HandleUnknown,
    columns: Vec<ColumnCategories>,
    is_fitted: bool,
}

impl Default for OneHotEncoder {
    fn default() -> Self {
        Self::new(HandleUnknown::Error)
    }
}

impl OneHotEncoder {
    pub fn new(handle_unknown: HandleUnknown) -> Self {
        Self {
            handle_unknown,
            columns: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn handle_unknown(&self) -> HandleUnknown {
        self.handle_unknown
    }

    /// Collect the category set of each column
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        let mut fitted = Vec::with_capacity(columns.len());

        for col_name in columns {
            let values = string_column(df, col_name)?;
            let set: BTreeSet<String> = values
                .into_iter()
                .map(|v| v.unwrap_or_else(|| MISSING_CATEGORY.to_string()))
                .collect();
            let categories: Vec<String> = set.into_iter().collect();
            let index = categories
                .iter()
                .enumerate()
                .map(|(i, c)| (c.clone(), i))
                .collect();

            fitted.push(ColumnCategories {
                column: col_name.clone(),
                categories,
                index,
            });
        }

        self.columns = fitted;
        self.is_fitted = true;
        Ok(self)
    }

    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(BenchError::NotFitted);
        }

        let mut out = Array2::zeros((df.height(), self.n_output_features()));
        let mut offset = 0;

        for col in &self.columns {
            let values = string_column(df, &col.column)?;
            for (i, v) in values.into_iter().enumerate() {
                let category = v.unwrap_or_else(|| MISSING_CATEGORY.to_string());
                match col.index.get(&category) {
                    Some(&k) => out[[i, offset + k]] = 1.0,
                    None => {
                        if self.handle_unknown == HandleUnknown::Error {
                            return Err(BenchError::Preprocessing(format!(
                                "unknown category '{}' in column '{}'",
                                category, col.column
                            )));
                        }
                    }
                }
            }
            offset += col.categories.len();
        }

        Ok(out)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    pub fn n_output_features(&self) -> usize {
        self.columns.iter().map(|c| c.categories.len()).sum()
    }

    /// `column_category` for each output feature
    pub fn feature_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .flat_map(|c| {
                c.categories
                    .iter()
                    .map(move |cat| format!("{}_{}", c.column, cat))
            })
            .collect()
    }

    /// Fitted categories of a column
    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.categories.as_slice())
    }
}
