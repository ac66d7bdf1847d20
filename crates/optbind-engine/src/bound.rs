//! Bound values: the JSON option document and the adapters that
//! serialize model state into it and restore model state from it.
//!
//! Malformed bound values never abort a bind; the offending entries
//! are logged and the control falls back to its defaults.

use serde_json::{Map, Value};
use tracing::warn;

use optbind_model::{
    BindError, CellValue, ColumnType, Result, TableTerms, Term, Terms, VariableInfoProvider,
};

use crate::event::EngineEvent;
use crate::list_model::{ListModelCore, RowControlsValues};
use crate::table::TableModel;

/// The analysis option document: one JSON value per control name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionsDocument {
    options: Map<String, Value>,
}

impl OptionsDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, control: &str) -> Option<&Value> {
        self.options.get(control)
    }

    pub fn set(&mut self, control: impl Into<String>, value: Value) {
        self.options.insert(control.into(), value);
    }

    pub fn remove(&mut self, control: &str) -> Option<Value> {
        self.options.remove(control)
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.options.clone())
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Object(options) => Ok(Self {
                options: options.clone(),
            }),
            other => Err(BindError::Binding {
                control: String::new(),
                reason: format!("option document is not an object: {other}"),
            }),
        }
    }
}

/// The contract every bound control fulfils towards the document.
pub trait BoundControl {
    fn name(&self) -> &str;

    /// The default bound value used when the document holds none.
    fn create_json(&self) -> Value;

    /// Shape check only; content problems are handled leniently at
    /// bind time.
    fn is_json_valid(&self, value: &Value) -> bool;
}

/// Binds a term list. Plain lists serialize as an array of term keys;
/// lists with per-term row controls serialize each row as an object
/// holding the key plus the extra control values.
#[derive(Debug, Clone)]
pub struct BoundTermsControl {
    name: String,
    key_field: String,
}

impl BoundTermsControl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_field: "variable".to_string(),
        }
    }

    pub fn with_key_field(mut self, key_field: impl Into<String>) -> Self {
        self.key_field = key_field.into();
        self
    }

    /// Serialize the model's current terms (and row-control values,
    /// when present) into the bound value.
    pub fn serialize(&self, core: &ListModelCore) -> Value {
        if core.row_controls().is_empty() {
            return core.terms().to_json();
        }
        let rows = core
            .terms()
            .iter()
            .map(|term| {
                let mut row = Map::new();
                row.insert(self.key_field.clone(), term_key_json(term));
                if let Some(controls) = core.row_control_values(term) {
                    for (control, value) in controls {
                        row.insert(control.clone(), value.clone());
                    }
                }
                Value::Object(row)
            })
            .collect();
        Value::Array(rows)
    }

    /// Decode a bound value into terms and row-control values. Items
    /// with an unexpected shape are skipped with a warning.
    pub fn bind_to(&self, value: &Value) -> (Terms, RowControlsValues) {
        let mut terms = Terms::new();
        let mut row_controls = RowControlsValues::new();
        let Value::Array(items) = value else {
            warn!(
                control = self.name,
                "bound value is not an array, falling back to an empty term list"
            );
            return (terms, row_controls);
        };

        for item in items {
            let (key, extra) = match item {
                Value::String(_) | Value::Array(_) => (item, None),
                Value::Object(fields) => match fields.get(&self.key_field) {
                    Some(key) => (key, Some(fields)),
                    None => {
                        warn!(
                            control = self.name,
                            key = self.key_field,
                            "bound row object lacks its key field, skipping"
                        );
                        continue;
                    }
                },
                other => {
                    warn!(control = self.name, value = %other, "unexpected bound term, skipping");
                    continue;
                }
            };
            let Some(term) = term_from_key_json(key) else {
                warn!(control = self.name, value = %key, "unreadable term key, skipping");
                continue;
            };
            if let Some(fields) = extra {
                let mut controls = std::collections::BTreeMap::new();
                for (field, field_value) in fields {
                    if field != &self.key_field {
                        controls.insert(field.clone(), field_value.clone());
                    }
                }
                if !controls.is_empty() {
                    row_controls.insert(term.as_string(), controls);
                }
            }
            terms.add(term);
        }
        (terms, row_controls)
    }
}

impl BoundControl for BoundTermsControl {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_json(&self) -> Value {
        Value::Array(Vec::new())
    }

    fn is_json_valid(&self, value: &Value) -> bool {
        match value {
            Value::Array(items) => items.iter().all(|item| match item {
                Value::String(_) => true,
                Value::Array(components) => components.iter().all(Value::is_string),
                Value::Object(fields) => fields.contains_key(&self.key_field),
                _ => false,
            }),
            _ => false,
        }
    }
}

fn term_key_json(term: &Term) -> Value {
    if term.is_interaction() {
        Value::Array(
            term.components()
                .iter()
                .map(|c| Value::String(c.clone()))
                .collect(),
        )
    } else {
        Value::String(term.as_string())
    }
}

fn term_from_key_json(key: &Value) -> Option<Term> {
    match key {
        Value::String(s) => Some(Term::new(s.clone())),
        Value::Array(components) => {
            let mut parts = Vec::with_capacity(components.len());
            for component in components {
                parts.push(component.as_str()?.to_string());
            }
            Some(Term::from_components(parts))
        }
        _ => None,
    }
}

/// Binds a 2-D grid. Each column serializes as an object carrying its
/// name, the row names, and the cell scalars; integer and double
/// cells keep their numeric kind through the round trip.
#[derive(Debug, Clone)]
pub struct BoundTableControl {
    name: String,
}

impl BoundTableControl {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn serialize(&self, model: &TableModel) -> Value {
        let table = model.table();
        let levels: Vec<Value> = table
            .row_names
            .iter()
            .map(|name| Value::String(name.clone()))
            .collect();
        let columns = table
            .col_names
            .iter()
            .enumerate()
            .map(|(col, name)| {
                let mut object = Map::new();
                object.insert("name".to_string(), Value::String(name.clone()));
                object.insert("levels".to_string(), Value::Array(levels.clone()));
                let values: Vec<Value> = (0..table.row_count())
                    .map(|row| {
                        table
                            .value_at(col, row)
                            .map(CellValue::to_json)
                            .unwrap_or(Value::Null)
                    })
                    .collect();
                object.insert("values".to_string(), Value::Array(values));
                Value::Object(object)
            })
            .collect();
        Value::Array(columns)
    }

    /// Restore a grid from its bound value. Unreadable cells fall back
    /// to the model's default value for their position.
    pub fn bind_to(&self, value: &Value, model: &mut TableModel) {
        let Value::Array(columns) = value else {
            warn!(
                control = self.name,
                "bound table value is not an array, keeping defaults"
            );
            return;
        };

        let mut table = TableTerms::new();
        for (col, column) in columns.iter().enumerate() {
            let Value::Object(fields) = column else {
                warn!(control = self.name, "bound table column is not an object, skipping");
                continue;
            };
            let name = fields
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| model.default_col_name(col));
            if table.row_names.is_empty() {
                if let Some(Value::Array(levels)) = fields.get("levels") {
                    table.row_names = levels
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect();
                }
            }
            let mut values = Vec::new();
            if let Some(Value::Array(cells)) = fields.get("values") {
                for (row, cell) in cells.iter().enumerate() {
                    let value = CellValue::from_json(cell).unwrap_or_else(|| {
                        warn!(control = self.name, value = %cell, "unreadable cell, using default");
                        model.default_value(col, row)
                    });
                    values.push(value);
                }
            }
            table.col_names.push(name);
            table.values.push(values);
        }
        // Without levels, row identity falls back to default names.
        if table.row_names.is_empty() {
            let rows = table.values.iter().map(Vec::len).max().unwrap_or(0);
            table.row_names = (0..rows).map(|row| model.default_row_name(row)).collect();
        }
        model.init_table_terms(table);
    }
}

impl BoundControl for BoundTableControl {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_json(&self) -> Value {
        Value::Array(Vec::new())
    }

    fn is_json_valid(&self, value: &Value) -> bool {
        match value {
            Value::Array(columns) => columns.iter().all(|column| match column {
                Value::Object(fields) => {
                    fields.get("name").is_some_and(Value::is_string)
                        && fields.get("values").is_some_and(Value::is_array)
                }
                _ => false,
            }),
            _ => false,
        }
    }
}

/// Binds a control that owns a data column in the host. Changing the
/// bound name creates the new column before destroying the old one, so
/// a dependent computed column never observes a missing source.
#[derive(Debug, Clone)]
pub struct BoundColumnControl {
    name: String,
    column_name: String,
    column_type: ColumnType,
    computed: bool,
}

impl BoundColumnControl {
    pub fn new(name: impl Into<String>, column_type: ColumnType, computed: bool) -> Self {
        Self {
            name: name.into(),
            column_name: String::new(),
            column_type,
            computed,
        }
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    /// Rebind to a new column name. Returns the host requests in the
    /// order they must run: creation first, destruction of the old
    /// column last.
    pub fn set_column_name(&mut self, new_name: &str) -> Vec<EngineEvent> {
        if new_name == self.column_name {
            return Vec::new();
        }
        let mut events = Vec::new();
        if !new_name.is_empty() {
            if self.computed {
                events.push(EngineEvent::RequestComputedColumnCreation {
                    name: new_name.to_string(),
                });
            } else {
                events.push(EngineEvent::RequestColumnCreation {
                    name: new_name.to_string(),
                    column_type: self.column_type,
                });
            }
        }
        // The previous column is always released, also when the new
        // name is empty; the host ignores columns it did not create.
        let old_name = std::mem::replace(&mut self.column_name, new_name.to_string());
        if !old_name.is_empty() {
            events.push(EngineEvent::RequestComputedColumnDestruction { name: old_name });
        }
        events
    }
}

impl BoundControl for BoundColumnControl {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_json(&self) -> Value {
        Value::String(self.column_name.clone())
    }

    fn is_json_valid(&self, value: &Value) -> bool {
        value.is_string()
    }
}

/// Describe a term set for the host: per variable its type, factor
/// labels, and row count, as one JSON array.
pub fn describe_variables(provider: &dyn VariableInfoProvider, terms: &Terms) -> Value {
    let entries = terms
        .iter()
        .map(|term| {
            let name = term.as_string();
            let mut object = Map::new();
            object.insert(
                "type".to_string(),
                Value::String(provider.variable_type(&name).as_str().to_string()),
            );
            object.insert("count".to_string(), Value::from(provider.row_count()));
            object.insert(
                "labels".to_string(),
                Value::Array(
                    provider
                        .labels(&name)
                        .into_iter()
                        .map(Value::String)
                        .collect(),
                ),
            );
            object.insert("name".to_string(), Value::String(name));
            Value::Object(object)
        })
        .collect();
    Value::Array(entries)
}
