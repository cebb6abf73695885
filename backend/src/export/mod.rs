//! CSV export of formulas.
//!
//! Formulas are flattened back to one row per material line (see
//! [`crate::transform::flatten`]) and written with the same column vocabulary
//! the parser reads, so an export can be loaded again as-is.
//!
//! Absent optional values are written as empty cells. A unit cost of zero is
//! written as `0`, keeping "free" apart from "unknown".

use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;

use crate::error::ExportResult;
use crate::models::{FlatRow, FormulaAggregate, COLUMNS};
use crate::transform::flatten::{flatten, flatten_all};

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Characters that cannot appear in a quoted `filename` header parameter.
static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["\\/\p{Cc}]"#).expect("valid file name pattern"));

/// Write rows as CSV, header first.
pub fn write_csv<W: Write>(rows: &[FlatRow], writer: W) -> ExportResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(COLUMNS)?;

    for row in rows {
        let qty = row.qty.value().to_string();
        let unit_cost = row.unit_cost.map(|c| c.to_string()).unwrap_or_default();
        csv_writer.write_record([
            row.formula_id.as_str(),
            row.formula_name.as_str(),
            row.category.as_deref().unwrap_or(""),
            row.notes.as_deref().unwrap_or(""),
            row.material_id.as_str(),
            row.material_name.as_str(),
            qty.as_str(),
            row.uom.as_deref().unwrap_or(""),
            unit_cost.as_str(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// CSV text for one formula's materials.
pub fn aggregate_to_csv(formula: &FormulaAggregate) -> ExportResult<String> {
    rows_to_string(&flatten(formula))
}

/// CSV text for every formula.
pub fn aggregates_to_csv(formulas: &[FormulaAggregate]) -> ExportResult<String> {
    rows_to_string(&flatten_all(formulas))
}

fn rows_to_string(rows: &[FlatRow]) -> ExportResult<String> {
    let mut buffer = Vec::new();
    write_csv(rows, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Download name for a formula export: `Sunrise Burst` → `Sunrise_Burst_materials.csv`.
///
/// Quotes, slashes, backslashes and control characters are dropped so the
/// name can sit inside a `Content-Disposition` header.
pub fn export_file_name(formula_name: &str) -> String {
    let underscored = WHITESPACE_RUN.replace_all(formula_name, "_");
    format!("{}_materials.csv", UNSAFE_FILENAME_CHARS.replace_all(&underscored, ""))
}
