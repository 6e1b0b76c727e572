//! CSV Data Loader Module
//! Reads the raw input tables into Polars DataFrames and verifies schema.

use polars::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("input file not found: {path}")]
    FileNotFound { path: PathBuf },
    #[error("failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("{path}: required column {column:?} is missing")]
    MissingColumn { column: String, path: PathBuf },
}

/// Reads CSV files with Polars. Types are inferred; cells the reader cannot
/// coerce stay null and are resolved during cleaning.
pub struct TableLoader;

impl TableLoader {
    /// Load a CSV file into a DataFrame.
    pub fn load(path: &Path) -> Result<DataFrame, LoaderError> {
        if !path.is_file() {
            return Err(LoaderError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        // Use lazy evaluation for memory efficiency, then collect
        let df = LazyCsvReader::new(path)
            .with_infer_schema_length(Some(10000))
            .with_ignore_errors(true)
            .finish()?
            .collect()?;

        info!(
            rows = df.height(),
            columns = df.width(),
            path = %path.display(),
            "loaded table"
        );
        Ok(df)
    }

    /// Load a CSV file and verify that every required column is present.
    /// A missing column is fatal: downstream stages address columns by name.
    pub fn load_with_columns(
        path: &Path,
        required: &[&str],
    ) -> Result<DataFrame, LoaderError> {
        let df = Self::load(path)?;
        let present: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        for column in required {
            if !present.iter().any(|name| name == column) {
                return Err(LoaderError::MissingColumn {
                    column: column.to_string(),
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(df)
    }
}
