//! Group flat formula rows into formulas with their material lines.
//!
//! ```text
//! Flat rows                                   Formulas
//! ┌──────────────────────────────┐           ┌────────────────────────────┐
//! │ F001 Sunrise Burst │ M001 10g │           │ F001 Sunrise Burst          │
//! │ F001 Sunrise Burst │ M002  5g │    →      │   [M001 10g, M002 5g]       │
//! │ F002 Moonlight     │ M010  3g │           ├────────────────────────────┤
//! └──────────────────────────────┘           │ F002 Moonlight  [M010 3g]  │
//!                                             └────────────────────────────┘
//! ```
//!
//! Grouping is an insertion-ordered accumulation, never a sort: formulas come
//! out in the order their id first appears, and materials keep their row
//! order. Formula metadata (name, category, notes) is taken from the first
//! row of each formula; later rows only contribute material lines.
//!
//! Everything here is pure and total. No errors, no I/O.

use indexmap::IndexMap;
use rayon::prelude::*;

use crate::models::{FlatRow, FormulaAggregate, MaterialLine};

/// Inputs at or below this many rows are grouped sequentially by
/// [`group_rows_parallel`].
pub const PARALLEL_CHUNK_ROWS: usize = 4096;

/// Group rows by `formula_id`.
///
/// # Example
/// ```ignore
/// use formulary::{group_rows, FlatRow};
///
/// let rows = vec![
///     FlatRow::new("F001", "Sunrise Burst", "M001", "Lemon Oil", 10.0).with_unit_cost(0.5),
///     FlatRow::new("F001", "Sunrise Burst", "M002", "Orange Oil", 5.0).with_unit_cost(1.0),
/// ];
/// let formulas = group_rows(&rows);
///
/// assert_eq!(formulas[0].materials_count(), 2);
/// assert_eq!(formulas[0].total_cost, Some(10.0));
/// ```
pub fn group_rows(rows: &[FlatRow]) -> Vec<FormulaAggregate> {
    accumulate(rows)
        .into_values()
        .map(FormulaBuilder::build)
        .collect()
}

/// Same as [`group_rows`], consuming the rows instead of cloning their fields.
pub fn group_rows_owned(rows: Vec<FlatRow>) -> Vec<FormulaAggregate> {
    let mut formulas: IndexMap<String, FormulaBuilder> = IndexMap::new();

    for row in rows {
        match formulas.get_mut(&row.formula_id) {
            Some(builder) => builder.add_material(row.into_material_line()),
            None => {
                let mut builder = FormulaBuilder::new(&row);
                let key = row.formula_id.clone();
                builder.add_material(row.into_material_line());
                formulas.insert(key, builder);
            }
        }
    }

    formulas
        .into_values()
        .map(FormulaBuilder::build)
        .collect()
}

/// Group rows on the rayon thread pool.
///
/// Rows are split into contiguous chunks grouped independently, then merged
/// in chunk order. The result is identical to [`group_rows`].
pub fn group_rows_parallel(rows: &[FlatRow]) -> Vec<FormulaAggregate> {
    if rows.len() <= PARALLEL_CHUNK_ROWS {
        return group_rows(rows);
    }

    let chunk_size = PARALLEL_CHUNK_ROWS.max(rows.len().div_ceil(rayon::current_num_threads()));
    let partials: Vec<IndexMap<&str, FormulaBuilder>> =
        rows.par_chunks(chunk_size).map(accumulate).collect();

    let mut merged: IndexMap<&str, FormulaBuilder> = IndexMap::new();
    for partial in partials {
        for (key, builder) in partial {
            match merged.get_mut(key) {
                // Earlier chunk already owns the metadata
                Some(existing) => existing.materials.extend(builder.materials),
                None => {
                    merged.insert(key, builder);
                }
            }
        }
    }

    tracing::debug!(
        rows = rows.len(),
        chunk_size,
        formulas = merged.len(),
        "grouped rows in parallel"
    );

    merged
        .into_values()
        .map(FormulaBuilder::build)
        .collect()
}

/// Sum of `qty × unit_cost` over lines with a known unit cost.
///
/// A sum of exactly zero is reported as `None`, whether no line was priced
/// or the priced lines cancel out. So is a sum that overflows to a
/// non-finite value.
pub fn total_cost(materials: &[MaterialLine]) -> Option<f64> {
    let total: f64 = materials.iter().filter_map(MaterialLine::line_cost).sum();
    if !total.is_finite() {
        tracing::warn!(lines = materials.len(), "total cost is not finite, reported as unknown");
        return None;
    }
    if total == 0.0 {
        None
    } else {
        Some(total)
    }
}

fn accumulate(rows: &[FlatRow]) -> IndexMap<&str, FormulaBuilder> {
    let mut formulas: IndexMap<&str, FormulaBuilder> = IndexMap::new();

    for row in rows {
        formulas
            .entry(row.formula_id.as_str())
            .or_insert_with(|| FormulaBuilder::new(row))
            .add_material(row.to_material_line());
    }

    formulas
}

/// Accumulates material lines for one formula while grouping.
struct FormulaBuilder {
    formula_id: String,
    name: String,
    category: Option<String>,
    notes: Option<String>,
    materials: Vec<MaterialLine>,
}

impl FormulaBuilder {
    fn new(first: &FlatRow) -> Self {
        Self {
            formula_id: first.formula_id.clone(),
            name: first.formula_name.clone(),
            category: first.category.clone(),
            notes: first.notes.clone(),
            materials: Vec::new(),
        }
    }

    fn add_material(&mut self, line: MaterialLine) {
        self.materials.push(line);
    }

    fn build(self) -> FormulaAggregate {
        let total_cost = total_cost(&self.materials);
        FormulaAggregate {
            formula_id: self.formula_id,
            name: self.name,
            category: self.category,
            notes: self.notes,
            materials: self.materials,
            total_cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Quantity;
    use std::collections::HashSet;

    fn sunrise(material_id: &str, name: &str, qty: f64, cost: f64) -> FlatRow {
        FlatRow::new("F001", "Sunrise Burst", material_id, name, qty)
            .with_category("Fresh")
            .with_notes("Bright citrus opening")
            .with_uom("g")
            .with_unit_cost(cost)
    }

    #[test]
    fn test_groups_by_formula_id() {
        let rows = vec![
            sunrise("M001", "Lemon Oil", 10.0, 0.5),
            sunrise("M002", "Orange Oil", 5.0, 0.4),
            FlatRow::new("F002", "Moonlight Petals", "M010", "Rose Absolute", 3.0)
                .with_category("Floral")
                .with_uom("g")
                .with_unit_cost(2.0),
        ];

        let formulas = group_rows(&rows);

        assert_eq!(formulas.len(), 2);
        assert_eq!(formulas[0].formula_id, "F001");
        assert_eq!(formulas[0].name, "Sunrise Burst");
        assert_eq!(formulas[0].materials.len(), 2);
        assert_eq!(formulas[0].materials_count(), 2);
        assert_eq!(formulas[1].formula_id, "F002");
        assert_eq!(formulas[1].name, "Moonlight Petals");
        assert_eq!(formulas[1].materials_count(), 1);
    }

    #[test]
    fn test_total_cost() {
        let rows = vec![
            FlatRow::new("F001", "Test Formula", "M001", "Material 1", 10.0).with_unit_cost(0.5),
            FlatRow::new("F001", "Test Formula", "M002", "Material 2", 5.0).with_unit_cost(1.0),
        ];

        assert_eq!(group_rows(&rows)[0].total_cost, Some(10.0));
    }

    #[test]
    fn test_partial_cost_data() {
        let rows = vec![
            FlatRow::new("F001", "Test Formula", "M001", "Material 1", 10.0).with_unit_cost(0.5),
            FlatRow::new("F001", "Test Formula", "M002", "Material 2", 5.0).with_uom("g"),
        ];

        assert_eq!(group_rows(&rows)[0].total_cost, Some(5.0));
    }

    #[test]
    fn test_no_cost_data() {
        let rows = vec![
            FlatRow::new("F001", "Test Formula", "M001", "Material 1", 10.0),
            FlatRow::new("F001", "Test Formula", "M002", "Material 2", 4.0),
        ];

        assert_eq!(group_rows(&rows)[0].total_cost, None);
    }

    #[test]
    fn test_zero_sum_collapses_to_none() {
        let free = vec![FlatRow::new("F001", "Free", "M001", "Water", 10.0).with_unit_cost(0.0)];
        assert_eq!(group_rows(&free)[0].total_cost, None);

        let cancelling = vec![
            FlatRow::new("F001", "Rebate", "M001", "Oil", 1.0).with_unit_cost(2.0),
            FlatRow::new("F001", "Rebate", "M002", "Credit", 1.0).with_unit_cost(-2.0),
        ];
        assert_eq!(group_rows(&cancelling)[0].total_cost, None);
    }

    #[test]
    fn test_negative_total_is_reported() {
        let rows = vec![FlatRow::new("F001", "Credit", "M001", "Refund", 1.0).with_unit_cost(-3.0)];
        assert_eq!(group_rows(&rows)[0].total_cost, Some(-3.0));
    }

    #[test]
    fn test_overflowing_total_is_unknown() {
        let rows = vec![FlatRow::new("F001", "Huge", "M001", "Oil", 1e200).with_unit_cost(1e200)];
        let formula = &group_rows(&rows)[0];

        assert_eq!(formula.total_cost, None);
        let value = serde_json::to_value(formula).unwrap();
        assert!(value.get("total_cost").is_none());
    }

    #[test]
    fn test_defaulted_qty_contributes_nothing() {
        let rows = vec![
            FlatRow::new("F001", "A", "M001", "Oil", Quantity::Defaulted).with_unit_cost(9.0),
            FlatRow::new("F001", "A", "M002", "Salt", 2.0).with_unit_cost(1.5),
        ];
        assert_eq!(group_rows(&rows)[0].total_cost, Some(3.0));
    }

    #[test]
    fn test_metadata_from_first_row() {
        let rows = vec![
            sunrise("M001", "Lemon Oil", 10.0, 0.5),
            FlatRow::new("F001", "Renamed", "M002", "Orange Oil", 5.0)
                .with_category("Citrus")
                .with_notes("Different notes"),
        ];

        let formula = &group_rows(&rows)[0];
        assert_eq!(formula.name, "Sunrise Burst");
        assert_eq!(formula.category.as_deref(), Some("Fresh"));
        assert_eq!(formula.notes.as_deref(), Some("Bright citrus opening"));
    }

    #[test]
    fn test_first_row_without_category_wins() {
        let rows = vec![
            FlatRow::new("F001", "A", "M001", "Oil", 1.0),
            FlatRow::new("F001", "A", "M002", "Salt", 1.0).with_category("Fresh"),
        ];

        assert!(group_rows(&rows)[0].category.is_none());
    }

    #[test]
    fn test_interleaved_order() {
        let rows = vec![
            FlatRow::new("F002", "B", "M1", "b1", 1.0),
            FlatRow::new("F001", "A", "M2", "a1", 1.0),
            FlatRow::new("F002", "B", "M3", "b2", 1.0),
            FlatRow::new("F003", "C", "M4", "c1", 1.0),
            FlatRow::new("F001", "A", "M5", "a2", 1.0),
        ];

        let formulas = group_rows(&rows);
        let ids: Vec<&str> = formulas.iter().map(|f| f.formula_id.as_str()).collect();
        assert_eq!(ids, vec!["F002", "F001", "F003"]);

        let f002: Vec<&str> = formulas[0].materials.iter().map(|m| m.material_id.as_str()).collect();
        let f001: Vec<&str> = formulas[1].materials.iter().map(|m| m.material_id.as_str()).collect();
        assert_eq!(f002, vec!["M1", "M3"]);
        assert_eq!(f001, vec!["M2", "M5"]);
    }

    #[test]
    fn test_duplicate_material_lines_kept() {
        let rows = vec![
            FlatRow::new("F001", "A", "M001", "Oil", 1.0),
            FlatRow::new("F001", "A", "M001", "Oil", 1.0),
        ];

        assert_eq!(group_rows(&rows)[0].materials_count(), 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(group_rows(&[]).is_empty());
        assert!(group_rows_owned(Vec::new()).is_empty());
        assert!(group_rows_parallel(&[]).is_empty());
    }

    #[test]
    fn test_minimal_row() {
        let rows = vec![FlatRow::new("F001", "Minimal Formula", "M001", "Material 1", 10.0)];
        let formulas = group_rows(&rows);

        assert_eq!(formulas.len(), 1);
        let formula = &formulas[0];
        assert!(formula.category.is_none());
        assert!(formula.notes.is_none());
        assert!(formula.materials[0].uom.is_none());
        assert!(formula.materials[0].unit_cost.is_none());
        assert_eq!(formula.materials_count(), 1);
        assert!(formula.total_cost.is_none());
    }

    #[test]
    fn test_material_line_structure() {
        let rows = vec![FlatRow::new("F001", "Test Formula", "M001", "Lemon Oil", 10.0)
            .with_uom("g")
            .with_unit_cost(0.5)];

        assert_eq!(
            group_rows(&rows)[0].materials,
            vec![MaterialLine {
                material_id: "M001".into(),
                material_name: "Lemon Oil".into(),
                qty: Quantity::Measured(10.0),
                uom: Some("g".into()),
                unit_cost: Some(0.5),
            }]
        );
    }

    fn synthetic_rows(count: usize) -> Vec<FlatRow> {
        (0..count)
            .map(|i| {
                // Ids revisit earlier formulas so groups span chunk boundaries
                let formula = (i * 7919) % 613;
                let row = FlatRow::new(
                    format!("F{:04}", formula),
                    format!("Formula {} v{}", formula, i),
                    format!("M{:06}", i),
                    format!("Material {}", i),
                    (i % 13) as f64,
                )
                .with_category(format!("cat-{}", i % 5));
                if i % 3 == 0 {
                    row
                } else {
                    row.with_unit_cost((i % 7) as f64 * 0.25)
                }
            })
            .collect()
    }

    #[test]
    fn test_counts_match_input() {
        let rows = synthetic_rows(2000);
        let formulas = group_rows(&rows);

        let distinct: HashSet<&str> = rows.iter().map(|r| r.formula_id.as_str()).collect();
        assert_eq!(formulas.len(), distinct.len());

        let total: usize = formulas.iter().map(|f| f.materials_count()).sum();
        assert_eq!(total, rows.len());
    }

    #[test]
    fn test_owned_matches_borrowed() {
        let rows = synthetic_rows(500);
        assert_eq!(group_rows_owned(rows.clone()), group_rows(&rows));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let rows = synthetic_rows(PARALLEL_CHUNK_ROWS * 5 + 17);
        assert_eq!(group_rows_parallel(&rows), group_rows(&rows));
    }
}
