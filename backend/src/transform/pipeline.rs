//! High-level load API: CSV in, formulas out.
//!
//! Combines parsing, column checks, row ingestion, grouping and optional
//! schema validation of the output.
//!
//! # Example
//!
//! ```rust,ignore
//! use formulary::transform::pipeline::{load_formulas_from_path, LoadOptions};
//! use std::path::Path;
//!
//! let result = load_formulas_from_path(Path::new("formulas.csv"), &LoadOptions::default())?;
//! println!("Loaded {} formulas", result.formulas.len());
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::grouper::{group_rows_owned, group_rows_parallel};
use crate::config::DEFAULT_PARALLEL_THRESHOLD;
use crate::error::{PipelineError, PipelineResult};
use crate::ingest::{ensure_required_columns, rows_from_records, Coercion, SkippedRow};
use crate::models::FormulaAggregate;
use crate::parser::{parse_bytes_auto, parse_csv_file_auto, ParseResult};
use crate::validation::validate_formula_aggregate;

/// Options for loading formulas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Row count above which grouping runs in parallel.
    pub parallel_threshold: usize,

    /// Validate each formula against the embedded schema.
    pub validate_output: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            validate_output: false,
        }
    }
}

/// CSV file information
#[derive(Debug, Clone, Serialize)]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

/// Result of loading a CSV file.
#[derive(Debug, Clone, Serialize)]
pub struct LoadResult {
    /// Grouped formulas in first-seen order.
    pub formulas: Vec<FormulaAggregate>,

    /// Number of rows that were grouped.
    pub row_count: usize,

    /// CSV parsing metadata
    pub csv_info: CsvInfo,

    /// Records dropped for missing required fields.
    pub skipped: Vec<SkippedRow>,

    /// Numeric values that had to be coerced.
    pub coercions: Vec<Coercion>,

    /// Schema errors per formula id (only when `validate_output` is set).
    pub schema_errors: Vec<(String, Vec<String>)>,
}

/// Load formulas from a CSV file.
pub fn load_formulas_from_path(path: &Path, options: &LoadOptions) -> PipelineResult<LoadResult> {
    tracing::info!(path = %path.display(), "loading formulas");
    let parsed = parse_csv_file_auto(path)?;
    load_parsed(parsed, options)
}

/// Load formulas from raw CSV bytes.
pub fn load_formulas_from_bytes(bytes: &[u8], options: &LoadOptions) -> PipelineResult<LoadResult> {
    tracing::info!(bytes = bytes.len(), "loading formulas");
    let parsed = parse_bytes_auto(bytes)?;
    load_parsed(parsed, options)
}

fn load_parsed(parsed: ParseResult, options: &LoadOptions) -> PipelineResult<LoadResult> {
    let csv_info = CsvInfo {
        encoding: parsed.encoding.clone(),
        delimiter: parsed.delimiter,
        headers: parsed.headers.clone(),
        row_count: parsed.records.len(),
    };
    tracing::info!(
        encoding = %csv_info.encoding,
        delimiter = %csv_info.delimiter.escape_default(),
        records = csv_info.row_count,
        "csv parsed"
    );

    ensure_required_columns(&parsed.headers)?;

    let report = rows_from_records(&parsed.records);
    if report.rows.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let row_count = report.rows.len();
    let formulas = if row_count > options.parallel_threshold {
        group_rows_parallel(&report.rows)
    } else {
        group_rows_owned(report.rows)
    };
    tracing::info!(rows = row_count, formulas = formulas.len(), "rows grouped");

    let schema_errors = if options.validate_output {
        validate_formulas(&formulas)
    } else {
        Vec::new()
    };

    Ok(LoadResult {
        formulas,
        row_count,
        csv_info,
        skipped: report.skipped,
        coercions: report.coercions,
        schema_errors,
    })
}

/// Validate formulas against the embedded schema, collecting failures.
pub fn validate_formulas(formulas: &[FormulaAggregate]) -> Vec<(String, Vec<String>)> {
    let mut failures = Vec::new();

    for formula in formulas {
        let result = serde_json::to_value(formula)
            .map_err(|e| vec![e.to_string()])
            .and_then(|value| validate_formula_aggregate(&value));
        if let Err(errors) = result {
            tracing::warn!(formula_id = %formula.formula_id, errors = errors.len(), "formula failed schema validation");
            failures.push((formula.formula_id.clone(), errors));
        }
    }

    failures
}
