//! Error types for cardiobench

use thiserror::Error;

/// Result type alias for cardiobench operations
pub type Result<T> = std::result::Result<T, BenchError>;

/// Main error type
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Data error: {0}")]
    Data(String),

    #[error("Preprocessing error: {0}")]
    Preprocessing(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Model not fitted")]
    NotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Plot error: {0}")]
    Plot(String),
}

impl BenchError {
    pub(crate) fn invalid_param(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        BenchError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for BenchError {
    fn from(err: polars::error::PolarsError) -> Self {
        BenchError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for BenchError {
    fn from(err: serde_json::Error) -> Self {
        BenchError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for BenchError {
    fn from(err: ndarray::ShapeError) -> Self {
        BenchError::Shape {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for BenchError {
    fn from(err: reqwest::Error) -> Self {
        BenchError::Http(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BenchError::Data("bad csv".to_string());
        assert_eq!(err.to_string(), "Data error: bad csv");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BenchError = io_err.into();
        assert!(matches!(err, BenchError::Io(_)));
    }

    #[test]
    fn test_invalid_param_display() {
        let err = BenchError::invalid_param("clf__max_depth", 0, "must be >= 1");
        assert_eq!(
            err.to_string(),
            "Invalid parameter: clf__max_depth = 0, must be >= 1"
        );
    }
}
