//! Data loading utilities

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// Supported table file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Tsv,
    Parquet,
    Json,
}

impl FileFormat {
    /// Detect the format from the file extension; unknown extensions read as CSV
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "tsv" => FileFormat::Tsv,
            "parquet" | "pq" => FileFormat::Parquet,
            "json" | "jsonl" | "ndjson" => FileFormat::Json,
            _ => FileFormat::Csv,
        }
    }
}

/// Data loader for train/test tables
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows inspected when inferring CSV column types
    infer_schema_length: usize,
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
        }
    }

    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows.max(1);
        self
    }

    /// Load a delimited text file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>, delimiter: u8) -> Result<DataFrame> {
        let file = open(path.as_ref())?;
        let parse_opts = CsvParseOptions::default().with_separator(delimiter);

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| load_error(path.as_ref(), e))
    }

    /// Load a Parquet file
    pub fn load_parquet(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let file = open(path.as_ref())?;
        ParquetReader::new(file)
            .finish()
            .map_err(|e| load_error(path.as_ref(), e))
    }

    /// Load a line-delimited JSON file
    pub fn load_json(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let file = open(path.as_ref())?;
        JsonReader::new(file)
            .with_json_format(JsonFormat::JsonLines)
            .finish()
            .map_err(|e| load_error(path.as_ref(), e))
    }

    /// Detect file format from extension and load
    pub fn load_auto(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let start = Instant::now();
        let df = match FileFormat::from_path(path) {
            FileFormat::Csv => self.load_csv(path, b',')?,
            FileFormat::Tsv => self.load_csv(path, b'\t')?,
            FileFormat::Parquet => self.load_parquet(path)?,
            FileFormat::Json => self.load_json(path)?,
        };
        debug!(
            path = %path.display(),
            rows = df.height(),
            columns = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded table"
        );
        Ok(df)
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| PipelineError::DataError(format!("{}: {}", path.display(), e)))
}

fn load_error(path: &Path, err: PolarsError) -> PipelineError {
    PipelineError::DataError(format!("{}: {}", path.display(), err))
}
