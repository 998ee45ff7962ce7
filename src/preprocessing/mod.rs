//! Data preprocessing module
//!
//! Dtype-driven preprocessing applied in front of every classifier:
//! - Column selection by dtype family (number / object)
//! - Standard scaling of numeric columns
//! - One-hot encoding of categorical columns
//! - A column transformer stacking the blocks into one feature matrix

mod column_transformer;
mod encoder;
mod scaler;
mod selector;

pub use column_transformer::{ColumnTransformer, Transformer};
pub use encoder::{HandleUnknown, OneHotEncoder, MISSING_CATEGORY};
pub use scaler::StandardScaler;
pub use selector::ColumnSelector;

use crate::error::{BenchError, Result};
use polars::prelude::*;

/// Read a column as `f64` values, keeping nulls
pub(crate) fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| BenchError::ColumnNotFound(name.to_string()))?;
    let casted = column.cast(&DataType::Float64).map_err(|e| {
        BenchError::Preprocessing(format!("column '{}' is not numeric: {}", name, e))
    })?;
    Ok(casted.f64()?.into_iter().collect())
}

/// Read a column as owned strings, keeping nulls
pub(crate) fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| BenchError::ColumnNotFound(name.to_string()))?;
    let casted = column.cast(&DataType::String).map_err(|e| {
        BenchError::Preprocessing(format!("column '{}' cannot be read as text: {}", name, e))
    })?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}
