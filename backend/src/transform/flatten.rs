//! Flatten formulas back into one row per material line.
//!
//! The inverse of [`super::grouper::group_rows`]: every material line gets
//! its formula's id, name, category and notes re-attached.

use crate::models::{FlatRow, FormulaAggregate};

/// Rows for a single formula, in material order.
pub fn flatten(formula: &FormulaAggregate) -> Vec<FlatRow> {
    formula
        .materials
        .iter()
        .map(|line| FlatRow {
            formula_id: formula.formula_id.clone(),
            formula_name: formula.name.clone(),
            category: formula.category.clone(),
            notes: formula.notes.clone(),
            material_id: line.material_id.clone(),
            material_name: line.material_name.clone(),
            qty: line.qty,
            uom: line.uom.clone(),
            unit_cost: line.unit_cost,
        })
        .collect()
}

/// Rows for every formula, formulas in order.
pub fn flatten_all(formulas: &[FormulaAggregate]) -> Vec<FlatRow> {
    formulas.iter().flat_map(flatten).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Quantity;
    use crate::transform::grouper::group_rows;

    fn rows() -> Vec<FlatRow> {
        vec![
            FlatRow::new("F001", "Sunrise Burst", "M001", "Lemon Oil", 10.0)
                .with_category("Fresh")
                .with_notes("Bright citrus opening")
                .with_uom("g")
                .with_unit_cost(0.5),
            FlatRow::new("F002", "Moonlight Petals", "M010", "Rose Absolute", 3.0).with_unit_cost(2.0),
            FlatRow::new("F001", "Sunrise Burst (dup)", "M002", "Orange Oil", Quantity::Defaulted)
                .with_category("Other"),
        ]
    }

    #[test]
    fn test_metadata_reattached_to_every_line() {
        let formulas = group_rows(&rows());
        let flat = flatten(&formulas[0]);

        assert_eq!(flat.len(), 2);
        for row in &flat {
            assert_eq!(row.formula_id, "F001");
            assert_eq!(row.formula_name, "Sunrise Burst");
            assert_eq!(row.category.as_deref(), Some("Fresh"));
            assert_eq!(row.notes.as_deref(), Some("Bright citrus opening"));
        }
        assert_eq!(flat[1].material_id, "M002");
        assert_eq!(flat[1].qty, Quantity::Defaulted);
    }

    #[test]
    fn test_flatten_all_row_count() {
        let formulas = group_rows(&rows());
        assert_eq!(flatten_all(&formulas).len(), 3);
        assert!(flatten_all(&[]).is_empty());
    }

    #[test]
    fn test_regroup_is_identity() {
        let formulas = group_rows(&rows());
        assert_eq!(group_rows(&flatten_all(&formulas)), formulas);
    }
}
