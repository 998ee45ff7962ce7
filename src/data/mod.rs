//! Dataset loading, inspection and splitting

mod loader;
mod split;

pub use loader::{DataLoader, DataSource};
pub use split::{
    split_features_target, take_rows, train_test_indices, train_test_split, TrainTestIndices,
    TrainTestSplit,
};

use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-column overview of a frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub dtype: String,
    pub null_count: usize,
    pub unique_count: usize,
}

/// Shape and column overview used by the `info` command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub n_rows: usize,
    pub n_cols: usize,
    pub columns: Vec<ColumnSummary>,
}

impl DatasetSummary {
    pub fn from_frame(df: &DataFrame) -> Self {
        let columns = df
            .get_columns()
            .iter()
            .map(|col| ColumnSummary {
                name: col.name().to_string(),
                dtype: col.dtype().to_string(),
                null_count: col.null_count(),
                unique_count: col.n_unique().unwrap_or(0),
            })
            .collect();

        Self {
            n_rows: df.height(),
            n_cols: df.width(),
            columns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let df = df!(
            "chol" => &[Some(233.0), None, Some(204.0)],
            "cp" => &["typical", "atypical", "typical"]
        )
        .unwrap();

        let summary = DatasetSummary::from_frame(&df);
        assert_eq!(summary.n_rows, 3);
        assert_eq!(summary.n_cols, 2);
        assert_eq!(summary.columns[0].null_count, 1);
        assert_eq!(summary.columns[1].unique_count, 2);
    }
}
