//! Immutable snapshots of the external entities a calculation run consumes.
//!
//! Plates, protocols and measurements are fetched once per run through the
//! resolver contracts and are never mutated afterwards.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PLATE_COLUMNS, DEFAULT_PLATE_ROWS};

/// Well-indexed numeric values: index `i` is the same physical well across
/// every column and result of a plate.
pub type WellValues = Arc<[f64]>;

/// Plate layout snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plate {
    /// Plate identifier.
    pub id: String,
    /// Number of rows (A, B, ...).
    #[serde(default = "default_rows")]
    pub rows: usize,
    /// Number of columns (1, 2, ...).
    #[serde(default = "default_columns")]
    pub columns: usize,
    /// Explicit well identifiers in row-major order. Empty means "generate".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wells: Vec<String>,
}

fn default_rows() -> usize {
    DEFAULT_PLATE_ROWS
}

fn default_columns() -> usize {
    DEFAULT_PLATE_COLUMNS
}

impl Plate {
    /// Create a plate whose well identifiers are generated (`A1`, `A2`, ...).
    #[must_use]
    pub fn new(id: impl Into<String>, rows: usize, columns: usize) -> Self {
        Self {
            id: id.into(),
            rows,
            columns,
            wells: Vec::new(),
        }
    }

    /// Number of wells on the plate.
    #[must_use]
    pub fn well_count(&self) -> usize {
        self.rows * self.columns
    }

    /// Identifier of the well at `index` (row-major).
    #[must_use]
    pub fn well_id(&self, index: usize) -> String {
        if let Some(id) = self.wells.get(index) {
            return id.clone();
        }
        if self.columns == 0 {
            return index.to_string();
        }
        format!("{}{}", row_label(index / self.columns), index % self.columns + 1)
    }

    /// Whether explicit well identifiers (if any) match the layout.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.wells.is_empty() || self.wells.len() == self.well_count()
    }
}

/// Spreadsheet-style row label: 0 → `A`, 25 → `Z`, 26 → `AA`.
fn row_label(mut row: usize) -> String {
    let mut label = Vec::new();
    loop {
        #[allow(clippy::cast_possible_truncation)]
        label.push(b'A' + (row % 26) as u8);
        if row < 26 {
            break;
        }
        row = row / 26 - 1;
    }
    label.reverse();
    String::from_utf8_lossy(&label).into_owned()
}

/// A protocol-declared slot bound to exactly one formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// Feature identifier, the key of its entry in the result dataset.
    pub id: String,
    /// Feature name, the key dependents use to read its output.
    pub name: String,
    /// Identifier of the formula computing this feature.
    pub formula_id: String,
    /// Declared category (execution stage).
    pub category: String,
}

/// Protocol snapshot: declared stage order plus features.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protocol {
    /// Protocol identifier.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Stage (category) names in execution order.
    pub stages: Vec<String>,
    /// Features, in declaration order.
    pub features: Vec<Feature>,
}

/// Measurement snapshot: which plate was read and which columns exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    /// Measurement identifier.
    pub id: String,
    /// Plate the measurement was taken from.
    pub plate_id: String,
    /// Readout columns available for this measurement.
    #[serde(default)]
    pub columns: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_well_ids_are_row_major() {
        let plate = Plate::new("P1", 8, 12);
        assert_eq!(plate.well_count(), 96);
        assert_eq!(plate.well_id(0), "A1");
        assert_eq!(plate.well_id(11), "A12");
        assert_eq!(plate.well_id(12), "B1");
        assert_eq!(plate.well_id(95), "H12");
    }

    #[test]
    fn row_labels_past_z() {
        assert_eq!(row_label(0), "A");
        assert_eq!(row_label(25), "Z");
        assert_eq!(row_label(26), "AA");
        assert_eq!(row_label(31), "AF");
    }

    #[test]
    fn explicit_well_ids_take_precedence() {
        let mut plate = Plate::new("P1", 1, 2);
        plate.wells = vec!["ctrl".into(), "sample".into()];
        assert!(plate.is_consistent());
        assert_eq!(plate.well_id(1), "sample");
    }

    #[test]
    fn inconsistent_well_list_is_detected() {
        let mut plate = Plate::new("P1", 2, 2);
        plate.wells = vec!["A1".into()];
        assert!(!plate.is_consistent());
    }

    #[test]
    fn plate_layout_defaults_from_json() {
        let plate: Plate = serde_json::from_str(r#"{"id":"P9"}"#).unwrap();
        assert_eq!(plate.well_count(), 96);
    }
}
