//! Editable 2-D grids over [`TableTerms`], backed by a source term
//! sequence that defines row identity.

use std::collections::BTreeMap;

use optbind_model::{CellValue, ItemType, Result, TableTerms, Terms};
use tracing::warn;

use crate::formula::{FormulaToken, FormulaTracker};
use crate::registry::TermSource;

/// Behavior differences between the table-shaped controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableVariant {
    /// Plain editable grid (custom contrasts sans factors, priors, ...).
    Plain,
    /// Grid whose source terms are whole rows (one component per
    /// column); used for matrix-style option input.
    GridInput {
        min_rows: usize,
        min_cols: usize,
        max_rows: Option<usize>,
        max_cols: Option<usize>,
    },
    /// Leading read-only columns carry factor levels; trailing columns
    /// are editable double-valued contrast weights.
    CustomContrasts { variables: Vec<String> },
    /// Two fixed columns: a parameter name and an R expression.
    JagsData,
}

/// Outcome of a cell edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemChange {
    Unchanged,
    Committed,
    /// The cell is formula-typed; the terms-changed notification is
    /// deferred until the validation identified by the token lands.
    Deferred(FormulaToken),
}

type DefaultValueFn = Box<dyn Fn(usize, usize) -> CellValue + Send + Sync>;

pub struct TableModel {
    name: String,
    table: TableTerms,
    variant: TableVariant,
    source: Option<TermSource>,
    initial_rows: usize,
    initial_cols: usize,
    col_name_prefix: String,
    /// Declared type per logical column; columns beyond the vector use
    /// the default. Variants may override per cell.
    column_types: Vec<ItemType>,
    default_item_type: ItemType,
    defaults: DefaultValueFn,
    formulas: FormulaTracker,
}

impl std::fmt::Debug for TableModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableModel")
            .field("name", &self.name)
            .field("variant", &self.variant)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl TableModel {
    pub fn new(name: impl Into<String>, variant: TableVariant) -> Self {
        Self {
            name: name.into(),
            table: TableTerms::new(),
            variant,
            source: None,
            initial_rows: 0,
            initial_cols: 0,
            col_name_prefix: "col".to_string(),
            column_types: Vec::new(),
            default_item_type: ItemType::String,
            defaults: Box::new(|_, _| CellValue::Text(String::new())),
            formulas: FormulaTracker::new(),
        }
    }

    pub fn with_initial_size(mut self, rows: usize, cols: usize) -> Self {
        self.initial_rows = rows;
        self.initial_cols = cols;
        self
    }

    pub fn with_col_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.col_name_prefix = prefix.into();
        self
    }

    pub fn with_column_types(mut self, types: Vec<ItemType>, default: ItemType) -> Self {
        self.column_types = types;
        self.default_item_type = default;
        self
    }

    pub fn with_defaults(
        mut self,
        defaults: impl Fn(usize, usize) -> CellValue + Send + Sync + 'static,
    ) -> Self {
        self.defaults = Box::new(defaults);
        self
    }

    pub fn with_source(mut self, source: TermSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &TableTerms {
        &self.table
    }

    pub fn variant(&self) -> &TableVariant {
        &self.variant
    }

    pub fn source(&self) -> Option<TermSource> {
        self.source
    }

    pub fn initial_row_count(&self) -> usize {
        self.initial_rows
    }

    pub fn initial_column_count(&self) -> usize {
        self.initial_cols
    }

    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }

    pub fn column_count(&self) -> usize {
        self.table.column_count()
    }

    pub fn default_value(&self, col: usize, row: usize) -> CellValue {
        (self.defaults)(col, row)
    }

    pub fn default_col_name(&self, index: usize) -> String {
        match &self.variant {
            TableVariant::CustomContrasts { variables } => {
                if index < variables.len() {
                    variables[index].clone()
                } else {
                    format!("contrast {}", index - variables.len() + 1)
                }
            }
            TableVariant::JagsData => {
                if index == 0 {
                    "Parameter".to_string()
                } else {
                    "R Code".to_string()
                }
            }
            TableVariant::GridInput { .. } => index.to_string(),
            TableVariant::Plain => format!("{} {}", self.col_name_prefix, index + 1),
        }
    }

    pub fn default_row_name(&self, index: usize) -> String {
        match &self.variant {
            TableVariant::CustomContrasts { .. } => (index + 1).to_string(),
            _ => format!("row {}", index + 1),
        }
    }

    /// Declared type of a cell. Variants override the per-column
    /// declaration where their structure dictates it.
    pub fn item_type_at(&self, col: usize, _row: usize) -> ItemType {
        match &self.variant {
            TableVariant::JagsData => {
                if col == 1 {
                    ItemType::Formula
                } else {
                    ItemType::String
                }
            }
            TableVariant::CustomContrasts { variables } => {
                if col < variables.len() {
                    ItemType::String
                } else {
                    ItemType::Double
                }
            }
            _ => self
                .column_types
                .get(col)
                .copied()
                .unwrap_or(self.default_item_type),
        }
    }

    /// True when the user may edit the cell.
    pub fn is_editable(&self, col: usize, _row: usize) -> bool {
        match &self.variant {
            TableVariant::CustomContrasts { variables } => col >= variables.len(),
            _ => true,
        }
    }

    // --- structure -------------------------------------------------------

    pub(crate) fn add_column(&mut self) {
        let index = self.table.column_count();
        self.table.col_names.push(self.default_col_name(index));
        let rows = self.table.row_count();
        let mut values = Vec::with_capacity(rows);
        for row in 0..rows {
            values.push(self.default_value(index, row));
        }
        self.table.values.push(values);
    }

    pub(crate) fn add_row(&mut self) {
        let index = self.table.row_count();
        self.table.row_names.push(self.default_row_name(index));
        for (col, values) in self.table.values.iter_mut().enumerate() {
            while values.len() < index + 1 {
                values.push((self.defaults)(col, values.len()));
            }
        }
    }

    /// Grow or shrink both axes. Growth fills new cells from the
    /// default-value function; shrink truncates. `None` leaves an axis
    /// untouched. Returns (rows changed, columns changed).
    pub fn set_size(&mut self, rows: Option<usize>, cols: Option<usize>) -> (bool, bool) {
        // The level columns of a contrasts grid are not sizeable.
        let cols = match (&self.variant, cols) {
            (TableVariant::CustomContrasts { variables }, Some(cols)) => {
                Some(cols.max(variables.len()))
            }
            _ => cols,
        };

        let mut rows_changed = false;
        if let Some(rows) = rows {
            if rows < self.table.row_count() {
                for values in &mut self.table.values {
                    values.truncate(rows);
                }
                self.table.row_names.truncate(rows);
                rows_changed = true;
            } else if rows > self.table.row_count() {
                while self.table.row_count() < rows {
                    self.add_row();
                }
                rows_changed = true;
            }
        }

        let mut cols_changed = false;
        if let Some(cols) = cols {
            if cols < self.table.column_count() {
                self.table.values.truncate(cols);
                self.table.col_names.truncate(cols);
                cols_changed = true;
            } else if cols > self.table.column_count() {
                while self.table.column_count() < cols {
                    self.add_column();
                }
                cols_changed = true;
            }
        }

        (rows_changed, cols_changed)
    }

    /// Reset to the initial geometry with default values everywhere.
    pub fn reset(&mut self) {
        self.table.clear();
        for _ in 0..self.initial_cols {
            self.add_column();
        }
        for _ in 0..self.initial_rows {
            self.add_row();
        }
    }

    /// Install a complete grid (e.g. from a bound JSON value). Ragged
    /// input is repaired, not rejected.
    pub fn init_table_terms(&mut self, mut terms: TableTerms) {
        if !terms.is_rectangular() {
            warn!(
                model = self.name,
                "table value is not rectangular, padding/truncating to fit"
            );
            let default = self.default_value(0, 0);
            terms.normalize(&default);
        }
        self.table = terms;
    }

    // --- cell edits ------------------------------------------------------

    /// Validate and commit one cell edit. Formula cells defer their
    /// change notification behind a validation token.
    pub fn item_changed(&mut self, col: usize, row: usize, input: &str) -> Result<ItemChange> {
        if col >= self.table.column_count() || row >= self.table.row_count() {
            return Ok(ItemChange::Unchanged);
        }
        let item_type = self.item_type_at(col, row);
        let value = CellValue::parse(input, item_type)?;
        if self.table.value_at(col, row) == Some(&value) {
            return Ok(ItemChange::Unchanged);
        }
        let filled = !matches!(&value, CellValue::Text(s) if s.is_empty());
        self.table.set_value(col, row, value);

        // JAGS input grows by one blank row once the last one is used.
        if self.variant == TableVariant::JagsData && filled && row + 1 == self.table.row_count() {
            self.add_row();
        }

        if item_type == ItemType::Formula {
            Ok(ItemChange::Deferred(self.formulas.begin(col, row)))
        } else {
            Ok(ItemChange::Committed)
        }
    }

    /// Resolve a deferred formula validation. Returns true when the
    /// completion was current and accepted (the deferred notification
    /// may now fire); stale or failed completions return false.
    pub fn formula_check_completed(
        &mut self,
        col: usize,
        row: usize,
        token: FormulaToken,
        ok: bool,
    ) -> bool {
        let current = self.formulas.complete(col, row, token);
        current && ok
    }

    pub fn has_pending_formula(&self, col: usize, row: usize) -> bool {
        self.formulas.is_pending(col, row)
    }

    // --- source-driven row identity --------------------------------------

    /// Re-derive row identity from the upstream term source, keeping
    /// previously entered values for rows whose name survives. The
    /// carry-over is keyed by row name, not position, because row
    /// order may shift.
    pub fn source_terms_reset(&mut self, source_terms: &Terms) {
        match &self.variant {
            TableVariant::GridInput {
                min_rows,
                min_cols,
                max_rows,
                max_cols,
            } => {
                let (min_rows, min_cols) = (*min_rows, *min_cols);
                let (max_rows, max_cols) = (*max_rows, *max_cols);
                self.read_grid_source(source_terms, min_rows, min_cols, max_rows, max_cols);
            }
            _ => self.carry_over_reset(source_terms),
        }
    }

    fn carry_over_reset(&mut self, source_terms: &Terms) {
        let mut stash: BTreeMap<String, Vec<CellValue>> = BTreeMap::new();
        for (row, row_name) in self.table.row_names.iter().enumerate() {
            let mut per_row = Vec::with_capacity(self.table.column_count());
            for col in 0..self.table.column_count() {
                if let Some(value) = self.table.value_at(col, row) {
                    per_row.push(value.clone());
                }
            }
            stash.insert(row_name.clone(), per_row);
        }

        self.table.values.clear();
        self.table.row_names = source_terms.as_strings();
        if self.table.col_names.is_empty() {
            let name = self.default_col_name(0);
            self.table.col_names.push(name);
        }

        for col in 0..self.table.column_count() {
            let mut values = Vec::with_capacity(self.table.row_count());
            for (row, row_name) in self.table.row_names.iter().enumerate() {
                let carried = stash
                    .get(row_name)
                    .and_then(|per_row| per_row.get(col))
                    .cloned();
                values.push(carried.unwrap_or_else(|| (self.defaults)(col, row)));
            }
            self.table.values.push(values);
        }
    }

    /// Grid-input rebuild: each source term is one row, one component
    /// per column, clamped to the configured bounds.
    fn read_grid_source(
        &mut self,
        source_terms: &Terms,
        min_rows: usize,
        min_cols: usize,
        max_rows: Option<usize>,
        max_cols: Option<usize>,
    ) {
        let mut cols = min_cols;
        for term in source_terms {
            cols = cols.max(term.len());
        }
        let mut rows = min_rows.max(source_terms.len());
        if let Some(max) = max_rows {
            rows = rows.min(max);
        }
        if let Some(max) = max_cols {
            cols = cols.min(max);
        }

        self.table.clear();
        for col in 0..cols {
            let mut values = Vec::with_capacity(rows);
            for row in 0..rows {
                let value = source_terms
                    .at(row)
                    .and_then(|term| term.components().get(col))
                    .map(|c| CellValue::Text(c.clone()));
                values.push(value.unwrap_or_else(|| (self.defaults)(col, row)));
            }
            self.table.values.push(values);
            self.table.col_names.push(col.to_string());
        }
        for row in 0..rows {
            self.table.row_names.push(row.to_string());
        }
    }

    /// Rename rows in place, keeping their values. Used when upstream
    /// variables are renamed rather than replaced.
    pub(crate) fn rename_rows(&mut self, renames: &[(String, String)]) {
        for (old_name, new_name) in renames {
            for name in &mut self.table.row_names {
                if name == old_name {
                    *name = new_name.clone();
                }
            }
        }
    }

    /// Rebuild a custom-contrasts grid: the leading columns enumerate
    /// the cartesian product of the given per-variable labels, the
    /// trailing contrast columns keep their values positionally where
    /// possible.
    pub fn contrasts_reset(&mut self, variables: &[String], labels: &[Vec<String>]) {
        let lead_old = match &mut self.variant {
            TableVariant::CustomContrasts { variables: held } => {
                let old = held.len();
                *held = variables.to_vec();
                old
            }
            _ => return,
        };

        let product = cartesian_product(labels);

        // Stash trailing contrast columns (positionally by row index).
        let old_contrasts: Vec<Vec<CellValue>> = self
            .table
            .values
            .iter()
            .skip(lead_old)
            .cloned()
            .collect();
        let old_contrast_names: Vec<String> = self
            .table
            .col_names
            .iter()
            .skip(lead_old)
            .cloned()
            .collect();

        self.table.clear();
        let rows = product.len();
        for (col, variable) in variables.iter().enumerate() {
            self.table.col_names.push(variable.clone());
            let values = product
                .iter()
                .map(|combo| CellValue::Text(combo[col].clone()))
                .collect();
            self.table.values.push(values);
        }
        for row in 0..rows {
            let name = self.default_row_name(row);
            self.table.row_names.push(name);
        }
        for (i, name) in old_contrast_names.iter().enumerate() {
            self.table.col_names.push(name.clone());
            let mut values = Vec::with_capacity(rows);
            for row in 0..rows {
                let carried = old_contrasts.get(i).and_then(|col| col.get(row)).cloned();
                values.push(carried.unwrap_or(CellValue::Double(0.0)));
            }
            self.table.values.push(values);
        }
    }

    // --- derived sizing queries ------------------------------------------

    /// Widest cell text in a column, in characters, plus a fixed
    /// margin. Derived, never stored.
    pub fn max_column_width_chars(&self, col: usize) -> usize {
        let mut max_len = 3;
        if let Some(values) = self.table.values.get(col) {
            for value in values {
                max_len = max_len.max(value.as_display_string().chars().count());
            }
        }
        max_len + 3
    }

    /// A placeholder string as wide as the widest row header.
    pub fn max_row_header_string(&self) -> String {
        let mut max_len = 7;
        for name in &self.table.row_names {
            max_len = max_len.max(name.chars().count() + 2);
        }
        "X".repeat(max_len)
    }
}

fn cartesian_product(labels: &[Vec<String>]) -> Vec<Vec<String>> {
    let mut result: Vec<Vec<String>> = vec![Vec::new()];
    for level_set in labels {
        let mut next = Vec::with_capacity(result.len() * level_set.len().max(1));
        for prefix in &result {
            for level in level_set {
                let mut combo = prefix.clone();
                combo.push(level.clone());
                next.push(combo);
            }
        }
        result = next;
    }
    result.retain(|combo| !combo.is_empty());
    result
}
