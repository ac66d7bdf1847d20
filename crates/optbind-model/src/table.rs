//! The rectangular grid behind table-shaped controls.

use serde::{Deserialize, Serialize};

use crate::value::CellValue;

/// A grid keyed by (column name, row name) with column-major cell
/// storage. The invariant is that every column's value vector has
/// exactly `row_names.len()` entries; [`TableTerms::normalize`]
/// restores it after structural edits instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableTerms {
    pub col_names: Vec<String>,
    pub row_names: Vec<String>,
    /// `values[col][row]`
    pub values: Vec<Vec<CellValue>>,
}

impl TableTerms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column_count(&self) -> usize {
        self.col_names.len()
    }

    pub fn row_count(&self) -> usize {
        self.row_names.len()
    }

    pub fn value_at(&self, col: usize, row: usize) -> Option<&CellValue> {
        self.values.get(col).and_then(|column| column.get(row))
    }

    pub fn set_value(&mut self, col: usize, row: usize, value: CellValue) -> bool {
        if let Some(cell) = self
            .values
            .get_mut(col)
            .and_then(|column| column.get_mut(row))
        {
            *cell = value;
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.col_names.clear();
        self.row_names.clear();
        self.values.clear();
    }

    /// True when every column has exactly one value per row name and
    /// there is one value vector per column name.
    pub fn is_rectangular(&self) -> bool {
        self.values.len() == self.col_names.len()
            && self
                .values
                .iter()
                .all(|column| column.len() == self.row_names.len())
    }

    /// Repair the rectangularity invariant: missing value vectors and
    /// short columns are padded with `default`, long columns are
    /// truncated. Returns true if anything had to change.
    pub fn normalize(&mut self, default: &CellValue) -> bool {
        let rows = self.row_names.len();
        let mut changed = false;

        while self.values.len() < self.col_names.len() {
            self.values.push(vec![default.clone(); rows]);
            changed = true;
        }
        if self.values.len() > self.col_names.len() {
            self.values.truncate(self.col_names.len());
            changed = true;
        }
        for column in &mut self.values {
            if column.len() > rows {
                column.truncate(rows);
                changed = true;
            }
            while column.len() < rows {
                column.push(default.clone());
                changed = true;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_pads_and_truncates() {
        let mut table = TableTerms {
            col_names: vec!["c1".to_string(), "c2".to_string()],
            row_names: vec!["r1".to_string(), "r2".to_string()],
            values: vec![vec![
                CellValue::Integer(1),
                CellValue::Integer(2),
                CellValue::Integer(3),
            ]],
        };
        assert!(!table.is_rectangular());
        assert!(table.normalize(&CellValue::Integer(0)));
        assert!(table.is_rectangular());
        assert_eq!(table.values[0], [CellValue::Integer(1), CellValue::Integer(2)]);
        assert_eq!(table.values[1], [CellValue::Integer(0), CellValue::Integer(0)]);
    }

    #[test]
    fn normalize_is_a_no_op_on_rectangular_data() {
        let mut table = TableTerms {
            col_names: vec!["c1".to_string()],
            row_names: vec!["r1".to_string()],
            values: vec![vec![CellValue::Text("x".to_string())]],
        };
        assert!(!table.normalize(&CellValue::Integer(0)));
    }
}
