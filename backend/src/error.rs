//! Error types for the Formulary ingestion and export layers.
//!
//! The grouping engine itself never fails; every error here belongs to a
//! boundary collaborator:
//!
//! - [`CsvError`] - CSV decoding and parsing errors
//! - [`IngestError`] - Raw record to [`crate::models::FlatRow`] conversion errors
//! - [`ExportError`] - CSV export errors
//! - [`ConfigError`] - Environment configuration errors
//! - [`PipelineError`] - Top-level load errors
//! - [`ServerError`] - HTTP server errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// CSV Parsing Errors
// =============================================================================

/// Errors during CSV parsing.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to decode the input bytes.
    #[error("Failed to decode content as {encoding}: {message}")]
    EncodingError { encoding: String, message: String },

    /// Malformed record.
    #[error("Line {line}: {message}")]
    ParseError { line: u64, message: String },

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        match err.into_kind() {
            csv::ErrorKind::Io(io) => CsvError::IoError(io),
            kind => CsvError::ParseError {
                line,
                message: format!("{:?}", kind),
            },
        }
    }
}

// =============================================================================
// Ingestion Errors
// =============================================================================

/// Errors while turning parsed records into formula rows.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The header row lacks columns every row needs.
    #[error("Missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Two header names differ only in case or surrounding whitespace.
    #[error("Duplicate column(s): {}", .0.join(", "))]
    DuplicateColumns(Vec<String>),

    /// JSON input could not be read as rows.
    #[error("Invalid row JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while writing formulas back out as CSV.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV writer failure.
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// Output was not valid UTF-8.
    #[error("Export produced invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Writer could not be flushed.
    #[error("Export IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No formula with that id.
    #[error("Formula not found: {0}")]
    FormulaNotFound(String),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {key}: '{value}' ({message})")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level load errors.
///
/// This is the main error type returned by
/// [`crate::transform::pipeline::load_formulas_from_path`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Ingestion error.
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// No usable rows after ingestion.
    #[error("No formula rows to group")]
    EmptyInput,
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Export error.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Listener or serve failure.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
