//! JSON Schema validation for formula rows and formulas.
//!
//! Schemas are embedded at compile time from the `schemas/` directory:
//! - `flat-row.json` - one input row (formula + one material)
//! - `formula-aggregate.json` - one grouped formula as serialized by this crate
//!
//! Used on JSON handed in from outside (the CLI `validate` command) and,
//! optionally, on the pipeline's own output.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use formulary::validation::is_valid_formula_aggregate;
//!
//! let formula = json!({
//!     "formula_id": "F001",
//!     "name": "Sunrise Burst",
//!     "materials": [{ "material_id": "M001", "material_name": "Lemon Oil", "qty": 10 }],
//!     "materials_count": 1
//! });
//! assert!(is_valid_formula_aggregate(&formula));
//! ```

use once_cell::sync::Lazy;
use serde_json::Value;

static FLAT_ROW_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/flat-row.json")).expect("Invalid embedded schema")
});

static FORMULA_AGGREGATE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/formula-aggregate.json"))
        .expect("Invalid embedded schema")
});

/// Validate a JSON value against a schema.
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with every error message otherwise
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema).map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator.iter_errors(data).map(|e| e.to_string()).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Same as [`validate`], as a boolean.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate a serialized formula.
pub fn validate_formula_aggregate(data: &Value) -> Result<(), Vec<String>> {
    validate(&FORMULA_AGGREGATE_SCHEMA, data)
}

pub fn is_valid_formula_aggregate(data: &Value) -> bool {
    is_valid(&FORMULA_AGGREGATE_SCHEMA, data)
}

/// Validate a serialized input row.
pub fn validate_flat_row(data: &Value) -> Result<(), Vec<String>> {
    validate(&FLAT_ROW_SCHEMA, data)
}

pub fn is_valid_flat_row(data: &Value) -> bool {
    is_valid(&FLAT_ROW_SCHEMA, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FlatRow;
    use crate::transform::grouper::group_rows;
    use serde_json::json;

    #[test]
    fn test_grouped_output_is_valid() {
        let rows = vec![
            FlatRow::new("F001", "Sunrise Burst", "M001", "Lemon Oil", 10.0)
                .with_category("Fresh")
                .with_uom("g")
                .with_unit_cost(0.5),
            FlatRow::new("F001", "Sunrise Burst", "M002", "Orange Oil", 5.0),
        ];

        for formula in group_rows(&rows) {
            let value = serde_json::to_value(&formula).unwrap();
            assert!(validate_formula_aggregate(&value).is_ok(), "{}", value);
        }
    }

    #[test]
    fn test_null_optional_is_invalid() {
        let formula = json!({
            "formula_id": "F001",
            "name": "Sunrise Burst",
            "category": null,
            "materials": [{ "material_id": "M001", "material_name": "Lemon Oil", "qty": 10 }],
            "materials_count": 1
        });
        assert!(!is_valid_formula_aggregate(&formula));
    }

    #[test]
    fn test_formula_without_materials_is_invalid() {
        let formula = json!({
            "formula_id": "F001",
            "name": "Empty",
            "materials": [],
            "materials_count": 0
        });
        let errors = validate_formula_aggregate(&formula).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_valid_flat_row() {
        let row = serde_json::to_value(FlatRow::new("F001", "A", "M001", "Water", 1.0)).unwrap();
        assert!(is_valid_flat_row(&row));
    }

    #[test]
    fn test_flat_row_with_errors() {
        let row = json!({ "formula_id": "", "qty": "ten" });
        let errors = validate_flat_row(&row).unwrap_err();
        assert!(errors.len() >= 2);
    }
}
