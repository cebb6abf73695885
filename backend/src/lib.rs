//! # Formulary - formula/material CSV grouping
//!
//! Formulary turns flat CSV exports (one row per formula/material pair) into
//! formulas with their material lines and a total cost, and writes them back
//! out the same way.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│   Ingest    │────▶│   Grouper   │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ (FlatRow)   │     │ (Aggregate) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                                    │
//!                     ┌─────────────┐     ┌─────────────┐            │
//!                     │  CSV Export │◀────│   Catalog   │◀───────────┘
//!                     │  (flatten)  │     │ (query/sel) │
//!                     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use formulary::{load_formulas_from_path, LoadOptions};
//! use std::path::Path;
//!
//! let result = load_formulas_from_path(Path::new("formulas.csv"), &LoadOptions::default())?;
//! println!("Grouped {} formulas", result.formulas.len());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per layer
//! - [`models`] - FlatRow, MaterialLine, FormulaAggregate
//! - [`parser`] - CSV parsing with auto-detection
//! - [`ingest`] - Records to typed rows
//! - [`transform`] - Grouping, flattening and the load pipeline
//! - [`validation`] - JSON schema validation
//! - [`catalog`] - Search, filter, sort, paging and selection
//! - [`export`] - CSV export
//! - [`config`] - Environment configuration
//! - [`logging`] - Tracing subscriber setup
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Parsing
pub mod ingest;
pub mod parser;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Catalog & export
pub mod catalog;
pub mod export;

// Runtime
pub mod config;
pub mod logging;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{ConfigError, CsvError, ExportError, IngestError, PipelineError, ServerError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{FlatRow, FormulaAggregate, MaterialLine, Quantity, COLUMNS, REQUIRED_COLUMNS};

// =============================================================================
// Re-exports - Grouper
// =============================================================================

pub use transform::{flatten, flatten_all, group_rows, group_rows_owned, group_rows_parallel, total_cost};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, parse_csv_file_auto, parse_str,
    ParseResult, SourceRecord,
};

pub use ingest::{rows_from_json, rows_from_records, Coercion, CoercionKind, IngestReport, SkippedRow};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{
    is_valid, is_valid_flat_row, is_valid_formula_aggregate, validate, validate_flat_row,
    validate_formula_aggregate,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    load_formulas_from_bytes, load_formulas_from_path, validate_formulas, CsvInfo, LoadOptions, LoadResult,
};

// =============================================================================
// Re-exports - Catalog & Export
// =============================================================================

pub use catalog::{Catalog, CatalogQuery, Page, SortKey};
pub use export::{aggregate_to_csv, aggregates_to_csv, export_file_name, write_csv};

pub use config::AppConfig;

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, CsvMetadata, ResponseMetadata, UploadResponse};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}
