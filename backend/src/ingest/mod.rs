//! Conversion of parsed CSV records into typed [`FlatRow`]s.
//!
//! This is the boundary where loosely typed input becomes explicit:
//!
//! - records missing a required field are skipped and reported
//! - blank optional strings become `None`
//! - `qty` that fails numeric coercion becomes [`Quantity::Defaulted`]
//! - `unit_cost` that is blank or unparsable stays unknown, never zero
//!
//! The grouping engine downstream trusts every row it receives.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{IngestError, IngestResult};
use crate::models::{FlatRow, Quantity, REQUIRED_COLUMNS};
use crate::parser::SourceRecord;

/// Leading numeric prefix, the way spreadsheet exports tend to write numbers
/// ("12.5", "12.5 g", ".5", "1e3").
static LEADING_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("valid number pattern")
});

/// A record that was not turned into a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// Source line of the record.
    pub line: u64,
    /// Required fields that were blank or absent.
    pub missing: Vec<String>,
}

/// What happened to a value during coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionKind {
    /// `qty` was not numeric and was replaced by zero.
    QtyDefaulted,
    /// `unit_cost` was not numeric and is treated as unknown.
    UnitCostUnknown,
}

/// A value that could not be read as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coercion {
    pub line: u64,
    pub formula_id: String,
    pub material_id: String,
    pub kind: CoercionKind,
    /// Original cell content.
    pub raw: String,
}

/// Rows produced from a set of records plus what was dropped or coerced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub rows: Vec<FlatRow>,
    pub skipped: Vec<SkippedRow>,
    pub coercions: Vec<Coercion>,
}

/// Parse the leading number of a cell.
///
/// Returns `None` for blank cells, cells with no numeric prefix and
/// non-finite results.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let matched = LEADING_NUMBER.find(trimmed)?;
    matched
        .as_str()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Check that the header row carries every required column, once.
///
/// Header names are compared case-insensitively, so `formula_id` and
/// `Formula_ID` in the same header row are rejected as duplicates.
pub fn ensure_required_columns(headers: &[String]) -> IngestResult<()> {
    let present: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();

    let mut duplicates: Vec<String> = Vec::new();
    for (i, name) in present.iter().enumerate() {
        if !name.is_empty() && present[..i].contains(name) && !duplicates.contains(name) {
            duplicates.push(name.clone());
        }
    }
    if !duplicates.is_empty() {
        return Err(IngestError::DuplicateColumns(duplicates));
    }

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !present.iter().any(|h| h == *col))
        .map(|col| col.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(IngestError::MissingColumns(missing))
    }
}

/// Convert parsed records into rows, in input order.
pub fn rows_from_records(records: &[SourceRecord]) -> IngestReport {
    let mut report = IngestReport {
        rows: Vec::with_capacity(records.len()),
        ..Default::default()
    };

    for record in records {
        let fields = FieldLookup::new(record);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|col| fields.text(col).is_none())
            .map(|col| col.to_string())
            .collect();
        if !missing.is_empty() {
            report.skipped.push(SkippedRow {
                line: record.line,
                missing,
            });
            continue;
        }

        let formula_id = fields.required("formula_id");
        let material_id = fields.required("material_id");

        let raw_qty = fields.raw("qty");
        let qty = match parse_number(raw_qty) {
            Some(v) => Quantity::Measured(v),
            None => {
                report.coercions.push(Coercion {
                    line: record.line,
                    formula_id: formula_id.clone(),
                    material_id: material_id.clone(),
                    kind: CoercionKind::QtyDefaulted,
                    raw: raw_qty.to_string(),
                });
                Quantity::Defaulted
            }
        };

        let unit_cost = match fields.text("unit_cost") {
            None => None,
            Some(raw) => {
                let parsed = parse_number(raw);
                if parsed.is_none() {
                    report.coercions.push(Coercion {
                        line: record.line,
                        formula_id: formula_id.clone(),
                        material_id: material_id.clone(),
                        kind: CoercionKind::UnitCostUnknown,
                        raw: raw.to_string(),
                    });
                }
                parsed
            }
        };

        report.rows.push(FlatRow {
            formula_id,
            formula_name: fields.required("formula_name"),
            category: fields.text("category").map(String::from),
            notes: fields.text("notes").map(String::from),
            material_id,
            material_name: fields.required("material_name"),
            qty,
            uom: fields.text("uom").map(String::from),
            unit_cost,
        });
    }

    if !report.skipped.is_empty() {
        tracing::warn!(skipped = report.skipped.len(), "records missing required fields were skipped");
    }
    if !report.coercions.is_empty() {
        tracing::debug!(coercions = report.coercions.len(), "numeric values coerced");
    }

    report
}

/// Read rows from a JSON array of row objects.
pub fn rows_from_json(content: &str) -> IngestResult<Vec<FlatRow>> {
    Ok(serde_json::from_str(content)?)
}

/// Case-insensitive view over one record's fields.
struct FieldLookup<'a> {
    by_name: HashMap<String, &'a str>,
}

impl<'a> FieldLookup<'a> {
    fn new(record: &'a SourceRecord) -> Self {
        let by_name = record
            .fields
            .iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v.as_str()))
            .collect();
        Self { by_name }
    }

    /// Raw cell content, empty when the column is absent.
    fn raw(&self, name: &str) -> &'a str {
        self.by_name.get(name).copied().unwrap_or("")
    }

    /// Trimmed content, `None` when blank.
    fn text(&self, name: &str) -> Option<&'a str> {
        let value = self.raw(name).trim();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    /// Trimmed content of a field already checked to be present.
    fn required(&self, name: &str) -> String {
        self.text(name).unwrap_or_default().to_string()
    }
}
