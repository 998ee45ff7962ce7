//! Dataset loading from local files or http(s) URLs

use crate::error::{BenchError, Result};
use polars::prelude::*;
use std::fs::File;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Where a dataset comes from
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    Url(url::Url),
    File(PathBuf),
}

impl DataSource {
    /// Classify a path-or-URL string. Only http and https URLs are
    /// fetched; anything else is treated as a local path.
    pub fn parse(location: &str) -> Result<Self> {
        let trimmed = location.trim();
        if trimmed.is_empty() {
            return Err(BenchError::Data("empty data location".to_string()));
        }

        match url::Url::parse(trimmed) {
            Ok(parsed) => match parsed.scheme() {
                "http" | "https" => Ok(DataSource::Url(parsed)),
                "file" => parsed
                    .to_file_path()
                    .map(DataSource::File)
                    .map_err(|_| BenchError::Data(format!("invalid file URL: {}", trimmed))),
                // Windows drive letters parse as a one-letter scheme
                scheme if scheme.len() == 1 => Ok(DataSource::File(PathBuf::from(trimmed))),
                scheme => Err(BenchError::Data(format!(
                    "unsupported URL scheme '{}', only http and https are fetched",
                    scheme
                ))),
            },
            Err(_) => Ok(DataSource::File(PathBuf::from(trimmed))),
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Url(u) => write!(f, "{}", u),
            DataSource::File(p) => write!(f, "{}", p.display()),
        }
    }
}

/// CSV loader
pub struct DataLoader {
    /// Rows used for schema inference
    infer_schema_length: usize,
    /// HTTP timeout
    timeout: Duration,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows.max(1);
        self
    }

    /// Load a CSV from a path-or-URL string
    pub fn load(&self, location: &str) -> Result<DataFrame> {
        let source = DataSource::parse(location)?;
        self.load_source(&source)
    }

    /// Load a CSV from an already classified source
    pub fn load_source(&self, source: &DataSource) -> Result<DataFrame> {
        let start = Instant::now();
        let df = match source {
            DataSource::Url(url) => {
                let bytes = self.fetch(url)?;
                self.parse_csv_bytes(bytes)?
            }
            DataSource::File(path) => {
                let file = File::open(path).map_err(|e| {
                    BenchError::Data(format!("cannot open {}: {}", path.display(), e))
                })?;
                CsvReadOptions::default()
                    .with_has_header(true)
                    .with_infer_schema_length(Some(self.infer_schema_length))
                    .into_reader_with_file_handle(file)
                    .finish()?
            }
        };

        info!(
            source = %source,
            rows = df.height(),
            cols = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "dataset loaded"
        );
        Ok(df)
    }

    /// Parse CSV content already in memory
    pub fn parse_csv_bytes(&self, bytes: Vec<u8>) -> Result<DataFrame> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()?;
        Ok(df)
    }

    fn fetch(&self, url: &url::Url) -> Result<Vec<u8>> {
        debug!(%url, "fetching dataset");
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        let response = client.get(url.as_str()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(BenchError::Http(format!("GET {} returned {}", url, status)));
        }
        let bytes = response.bytes()?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_source_kinds() {
        assert!(matches!(
            DataSource::parse("https://example.com/data.csv").unwrap(),
            DataSource::Url(_)
        ));
        assert!(matches!(
            DataSource::parse("data/heart.csv").unwrap(),
            DataSource::File(_)
        ));
        assert!(DataSource::parse("ftp://example.com/data.csv").is_err());
        assert!(DataSource::parse("   ").is_err());
    }

    #[test]
    fn test_parse_csv_bytes() {
        let csv = "age,sex,target\n63,male,1\n37,female,0\n".as_bytes().to_vec();
        let df = DataLoader::new().parse_csv_bytes(csv).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 3);
        assert_eq!(df.column("sex").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_load_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "a,b,target").unwrap();
        writeln!(file, "1.0,2.0,0").unwrap();
        writeln!(file, "3.0,4.0,1").unwrap();
        file.flush().unwrap();

        let path = file.path().to_string_lossy().to_string();
        let df = DataLoader::new().load(&path).unwrap();
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn test_missing_file_is_data_error() {
        let err = DataLoader::new().load("/nonexistent/heart.csv").unwrap_err();
        assert!(matches!(err, BenchError::Data(_)));
    }
}
