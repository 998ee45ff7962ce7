//! Figures and console tables for experiment results

pub mod plots;

pub use plots::{confusion_matrix_heatmap, metrics_barplot, metrics_stripplot, save_plot};

use polars::prelude::DataFrame;

/// Show every row and column in `DataFrame` display output.
///
/// Mutates the process environment; call once from `main` before any
/// worker threads start.
pub fn configure_table_format() {
    std::env::set_var("POLARS_FMT_MAX_ROWS", "-1");
    std::env::set_var("POLARS_FMT_MAX_COLS", "-1");
    std::env::set_var("POLARS_FMT_STR_LEN", "80");
}

/// Render a frame as a console table
pub fn format_table(df: &DataFrame) -> String {
    format!("{}", df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_configured_table_shows_every_row() {
        configure_table_format();
        let values: Vec<i64> = (0..40).collect();
        let df = df!("value" => &values).unwrap();

        let table = format_table(&df);
        assert!(table.contains("39"));
        assert!(!table.contains('…'));
        assert_eq!(std::env::var("POLARS_FMT_MAX_ROWS").unwrap(), "-1");
    }
}
