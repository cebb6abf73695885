//! Domain models for Formulary.
//!
//! - [`FlatRow`] - One denormalized input row (formula metadata + one material)
//! - [`Quantity`] - A material quantity that remembers whether it was defaulted
//! - [`MaterialLine`] - One material entry inside a formula
//! - [`FormulaAggregate`] - A formula with its ordered material lines and total cost
//!
//! All of these are plain values: produced fresh by each call and owned by the
//! caller.

use serde::de::IgnoredAny;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ingest::parse_number;

/// Column vocabulary shared by the CSV parser and the CSV exporter.
pub const COLUMNS: [&str; 9] = [
    "formula_id",
    "formula_name",
    "category",
    "notes",
    "material_id",
    "material_name",
    "qty",
    "uom",
    "unit_cost",
];

/// Columns every input row must carry a non-blank value for.
pub const REQUIRED_COLUMNS: [&str; 4] = ["formula_id", "formula_name", "material_id", "material_name"];

// =============================================================================
// Quantity
// =============================================================================

/// Quantity of a material line.
///
/// `Defaulted` marks a source value that failed numeric coercion and was
/// replaced by zero.
///
/// Both variants serialize as a plain JSON number, so the distinction does
/// not survive a trip through JSON: a serialized `Defaulted` reads back as
/// `Measured(0.0)`. Coercions are reported separately at ingestion (see
/// [`crate::ingest::Coercion`]).
///
/// Deserialization is lenient like the CSV path: numbers and numeric strings
/// are read, anything else (null, text, booleans) becomes `Defaulted`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
#[serde(into = "f64")]
pub enum Quantity {
    /// Value read from the source.
    Measured(f64),
    /// Source value was missing or unparsable; counts as zero.
    #[default]
    Defaulted,
}

impl Quantity {
    /// Numeric value, zero when defaulted.
    pub fn value(&self) -> f64 {
        match self {
            Quantity::Measured(v) => *v,
            Quantity::Defaulted => 0.0,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, Quantity::Defaulted)
    }
}

impl From<f64> for Quantity {
    fn from(value: f64) -> Self {
        Quantity::Measured(value)
    }
}

impl From<Quantity> for f64 {
    fn from(qty: Quantity) -> Self {
        qty.value()
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
            Other(IgnoredAny),
        }

        let qty = match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Number(v)) if v.is_finite() => Quantity::Measured(v),
            Some(Raw::Text(text)) => parse_number(&text).map_or(Quantity::Defaulted, Quantity::Measured),
            _ => Quantity::Defaulted,
        };
        Ok(qty)
    }
}

// =============================================================================
// Flat Row (input)
// =============================================================================

/// One row of the denormalized formula table.
///
/// Required string fields are assumed non-blank; the ingestion layer filters
/// rows that are not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRow {
    pub formula_id: String,
    pub formula_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub material_id: String,
    pub material_name: String,
    #[serde(default)]
    pub qty: Quantity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uom: Option<String>,
    /// `None` means the cost is unknown, not zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_cost: Option<f64>,
}

impl FlatRow {
    /// Create a row with only the required fields set.
    pub fn new(
        formula_id: impl Into<String>,
        formula_name: impl Into<String>,
        material_id: impl Into<String>,
        material_name: impl Into<String>,
        qty: impl Into<Quantity>,
    ) -> Self {
        Self {
            formula_id: formula_id.into(),
            formula_name: formula_name.into(),
            category: None,
            notes: None,
            material_id: material_id.into(),
            material_name: material_name.into(),
            qty: qty.into(),
            uom: None,
            unit_cost: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_uom(mut self, uom: impl Into<String>) -> Self {
        self.uom = Some(uom.into());
        self
    }

    pub fn with_unit_cost(mut self, unit_cost: f64) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }

    /// The material part of this row, copied verbatim.
    pub fn to_material_line(&self) -> MaterialLine {
        MaterialLine {
            material_id: self.material_id.clone(),
            material_name: self.material_name.clone(),
            qty: self.qty,
            uom: self.uom.clone(),
            unit_cost: self.unit_cost,
        }
    }

    /// Consume the row, keeping only its material part.
    pub fn into_material_line(self) -> MaterialLine {
        MaterialLine {
            material_id: self.material_id,
            material_name: self.material_name,
            qty: self.qty,
            uom: self.uom,
            unit_cost: self.unit_cost,
        }
    }
}

// =============================================================================
// Material Line
// =============================================================================

/// A material entry within a formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialLine {
    pub material_id: String,
    pub material_name: String,
    #[serde(default)]
    pub qty: Quantity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_cost: Option<f64>,
}

impl MaterialLine {
    /// `qty × unit_cost`, or `None` when the unit cost is unknown.
    pub fn line_cost(&self) -> Option<f64> {
        self.unit_cost.map(|cost| self.qty.value() * cost)
    }
}

// =============================================================================
// Formula Aggregate (output)
// =============================================================================

/// A formula with all of its material lines.
///
/// `materials_count` is not stored: it is always `materials.len()` and is
/// emitted as a field only when serializing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FormulaAggregate {
    pub formula_id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub materials: Vec<MaterialLine>,
    #[serde(default)]
    pub total_cost: Option<f64>,
}

impl FormulaAggregate {
    /// Number of material lines (one per contributing row).
    pub fn materials_count(&self) -> usize {
        self.materials.len()
    }
}

impl Serialize for FormulaAggregate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FormulaAggregate", 7)?;
        state.serialize_field("formula_id", &self.formula_id)?;
        state.serialize_field("name", &self.name)?;
        match &self.category {
            Some(category) => state.serialize_field("category", category)?,
            None => state.skip_field("category")?,
        }
        match &self.notes {
            Some(notes) => state.serialize_field("notes", notes)?,
            None => state.skip_field("notes")?,
        }
        state.serialize_field("materials", &self.materials)?;
        state.serialize_field("materials_count", &self.materials_count())?;
        match self.total_cost {
            Some(total) => state.serialize_field("total_cost", &total)?,
            None => state.skip_field("total_cost")?,
        }
        state.end()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quantity_value() {
        assert_eq!(Quantity::Measured(2.5).value(), 2.5);
        assert_eq!(Quantity::Defaulted.value(), 0.0);
        assert!(Quantity::Defaulted.is_defaulted());
        assert_ne!(Quantity::Measured(0.0), Quantity::Defaulted);
    }

    #[test]
    fn test_quantity_serializes_as_number() {
        let json = serde_json::to_value(Quantity::Defaulted).unwrap();
        assert_eq!(json, json!(0.0));
        let qty: Quantity = serde_json::from_value(json!(12)).unwrap();
        assert_eq!(qty, Quantity::Measured(12.0));
    }

    #[test]
    fn test_defaulted_reads_back_as_measured_zero() {
        let json = serde_json::to_value(Quantity::Defaulted).unwrap();
        let qty: Quantity = serde_json::from_value(json).unwrap();
        assert_eq!(qty, Quantity::Measured(0.0));
    }

    #[test]
    fn test_quantity_lenient_deserialize() {
        let read = |v: serde_json::Value| serde_json::from_value::<Quantity>(v).unwrap();

        assert_eq!(read(json!("12.5")), Quantity::Measured(12.5));
        assert_eq!(read(json!("3 g")), Quantity::Measured(3.0));
        assert_eq!(read(json!("abc")), Quantity::Defaulted);
        assert_eq!(read(json!(null)), Quantity::Defaulted);
        assert_eq!(read(json!(true)), Quantity::Defaulted);
    }

    #[test]
    fn test_flat_row_from_json_minimal() {
        let row: FlatRow = serde_json::from_value(json!({
            "formula_id": "F001",
            "formula_name": "Minimal",
            "material_id": "M001",
            "material_name": "Water"
        }))
        .unwrap();

        assert!(row.category.is_none());
        assert!(row.unit_cost.is_none());
        assert!(row.qty.is_defaulted());
    }

    #[test]
    fn test_line_cost_unknown() {
        let line = FlatRow::new("F1", "A", "M1", "Lemon Oil", 10.0).to_material_line();
        assert_eq!(line.line_cost(), None);

        let priced = FlatRow::new("F1", "A", "M1", "Lemon Oil", 10.0)
            .with_unit_cost(0.5)
            .to_material_line();
        assert_eq!(priced.line_cost(), Some(5.0));
    }

    #[test]
    fn test_aggregate_serialization_omits_absent_fields() {
        let aggregate = FormulaAggregate {
            formula_id: "F001".into(),
            name: "Minimal".into(),
            category: None,
            notes: None,
            materials: vec![FlatRow::new("F001", "Minimal", "M001", "Water", 1.0).into_material_line()],
            total_cost: None,
        };

        let value = serde_json::to_value(&aggregate).unwrap();
        assert_eq!(value["materials_count"], 1);
        assert!(value.get("category").is_none());
        assert!(value.get("notes").is_none());
        assert!(value.get("total_cost").is_none());
        assert!(value["materials"][0].get("uom").is_none());
    }

    #[test]
    fn test_aggregate_json_roundtrip_ignores_count() {
        let value = json!({
            "formula_id": "F001",
            "name": "Sunrise Burst",
            "category": "Fresh",
            "materials": [
                { "material_id": "M001", "material_name": "Lemon Oil", "qty": 10, "uom": "g", "unit_cost": 0.5 }
            ],
            "materials_count": 99,
            "total_cost": 5.0
        });

        let aggregate: FormulaAggregate = serde_json::from_value(value).unwrap();
        assert_eq!(aggregate.materials_count(), 1);
        assert_eq!(aggregate.total_cost, Some(5.0));
    }
}
