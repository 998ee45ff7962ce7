//! Standard scaling of numeric columns

use super::numeric_column;
use crate::error::{BenchError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Fitted parameters for one column
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalerParams {
    column: String,
    mean: f64,
    scale: f64,
}

/// Z-score scaler: `(x - mean) / std` with the population std.
///
/// Statistics come from the present values only. A constant column gets
/// scale 1. Missing values stay NaN for the estimators to route.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit per-column mean and standard deviation
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        let mut params = Vec::with_capacity(columns.len());

        for col_name in columns {
            let values = numeric_column(df, col_name)?;
            let present: Vec<f64> = values.iter().flatten().copied().collect();

            let (mean, scale) = if present.is_empty() {
                (0.0, 1.0)
            } else {
                let n = present.len() as f64;
                let mean = present.iter().sum::<f64>() / n;
                let var = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                (mean, if std < 10.0 * f64::EPSILON { 1.0 } else { std })
            };

            params.push(ScalerParams {
                column: col_name.clone(),
                mean,
                scale,
            });
        }

        self.params = params;
        self.is_fitted = true;
        Ok(self)
    }

    /// Scale the fitted columns into a dense `n_rows × n_columns` matrix
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(BenchError::NotFitted);
        }

        let mut out = Array2::zeros((df.height(), self.params.len()));
        for (j, p) in self.params.iter().enumerate() {
            let values = numeric_column(df, &p.column)?;
            for (i, v) in values.into_iter().enumerate() {
                out[[i, j]] = v.map_or(f64::NAN, |v| (v - p.mean) / p.scale);
            }
        }
        Ok(out)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Output names, one per input column
    pub fn feature_names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.column.clone()).collect()
    }

    /// Fitted means in column order
    pub fn means(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.mean).collect()
    }

    /// Fitted scales in column order
    pub fn scales(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.scale).collect()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_standard_scaler_zero_mean_unit_variance() {
        let df = df!("a" => &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();

        let mut scaler = StandardScaler::new();
        let out = scaler.fit_transform(&df, &cols(&["a"])).unwrap();

        let mean = out.column(0).mean().unwrap();
        let var = out.column(0).mapv(|v| v * v).mean().unwrap();
        assert!(mean.abs() < 1e-10);
        assert!((var - 1.0).abs() < 1e-10);
        // Population std of 1..5 is sqrt(2)
        assert!((scaler.scales()[0] - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_is_centered_only() {
        let df = df!("c" => &[5.0, 5.0, 5.0]).unwrap();
        let mut scaler = StandardScaler::new();
        let out = scaler.fit_transform(&df, &cols(&["c"])).unwrap();
        assert_eq!(scaler.scales(), vec![1.0]);
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_missing_values_stay_nan() {
        let df = df!("a" => &[Some(1.0), None, Some(3.0)]).unwrap();
        let mut scaler = StandardScaler::new();
        let out = scaler.fit_transform(&df, &cols(&["a"])).unwrap();
        assert_eq!(scaler.means(), vec![2.0]);
        assert_eq!(scaler.scales(), vec![1.0]);
        assert!(out[[1, 0]].is_nan());
        assert_eq!(out[[0, 0]], -1.0);
        assert_eq!(out[[2, 0]], 1.0);
    }

    #[test]
    fn test_integer_columns_are_scaled() {
        let df = df!("age" => &[40i64, 50, 60]).unwrap();
        let mut scaler = StandardScaler::new();
        let out = scaler.fit_transform(&df, &cols(&["age"])).unwrap();
        assert!(out[[0, 0]] < 0.0 && out[[2, 0]] > 0.0);
    }

    #[test]
    fn test_transform_before_fit() {
        let df = df!("a" => &[1.0]).unwrap();
        assert!(matches!(
            StandardScaler::new().transform(&df),
            Err(BenchError::NotFitted)
        ));
    }
}
