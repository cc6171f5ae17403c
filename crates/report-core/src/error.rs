use std::path::PathBuf;
use thiserror::Error;

use crate::schema::{Confidence, LogicalField};

/// All errors produced by the reporting pipeline.
#[derive(Error, Debug)]
pub enum ReportError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The glob pattern matched nothing in the working directory.
    #[error("No files matching '{pattern}' in {dir}")]
    NoMatchingFiles { pattern: String, dir: PathBuf },

    /// None of the candidate encodings could decode the file.
    #[error("Could not decode {path} with any of: {tried}")]
    UndecodableFile { path: PathBuf, tried: String },

    /// A spreadsheet could not be opened or has no worksheet.
    #[error("Spreadsheet error in {path}: {message}")]
    Spreadsheet { path: PathBuf, message: String },

    /// A delimited file could not be parsed.
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    /// The file has fewer columns than the report needs.
    #[error("{path} has {found} columns, at least {required} required")]
    TooFewColumns {
        path: PathBuf,
        found: usize,
        required: usize,
    },

    /// The file has fewer rows than the report needs.
    #[error("{path} has {found} rows, at least {required} required")]
    TooFewRows {
        path: PathBuf,
        found: usize,
        required: usize,
    },

    /// A named column is missing from the header row.
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Column inference produced a guess below the accepted confidence.
    #[error("Column for {field} inferred with {found} confidence, {required} required")]
    LowConfidence {
        field: LogicalField,
        found: Confidence,
        required: Confidence,
    },

    /// A date string did not match any recognised format.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the report crates.
pub type Result<T> = std::result::Result<T, ReportError>;
