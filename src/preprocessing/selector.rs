//! Dtype-based column selection

use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Selects frame columns by dtype family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnSelector {
    /// Integer and floating point columns
    Numeric,
    /// String-like columns (string, categorical, enum)
    Categorical,
}

impl ColumnSelector {
    /// Names of the matching columns, in frame order
    pub fn select(&self, df: &DataFrame) -> Vec<String> {
        df.get_columns()
            .iter()
            .filter(|col| self.matches(col.dtype()))
            .map(|col| col.name().to_string())
            .collect()
    }

    pub fn matches(&self, dtype: &DataType) -> bool {
        match self {
            ColumnSelector::Numeric => is_numeric(dtype),
            ColumnSelector::Categorical => is_categorical(dtype),
        }
    }
}

impl std::fmt::Display for ColumnSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnSelector::Numeric => write!(f, "<dtype: number>"),
            ColumnSelector::Categorical => write!(f, "<dtype: object>"),
        }
    }
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn is_categorical(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::String | DataType::Categorical(..) | DataType::Enum(..)
    )
}
