//! Scalar cell values and their declared input types.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BindError, Result};

/// Declared input type of a logical table column or cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemType {
    String,
    Integer,
    Double,
    /// Formula cells defer their change notification until an external
    /// validation confirms the entered expression.
    Formula,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::String => "string",
            ItemType::Integer => "integer",
            ItemType::Double => "double",
            ItemType::Formula => "formula",
        }
    }
}

/// A single cell value. Integers and doubles are kept distinct so the
/// serialize path round-trips them exactly, with no string coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Integer(i64),
    Double(f64),
    Text(String),
}

impl CellValue {
    /// Parse raw input text against a declared type. Rejects with a
    /// validation error instead of silently coercing.
    pub fn parse(input: &str, item_type: ItemType) -> Result<CellValue> {
        match item_type {
            ItemType::String | ItemType::Formula => Ok(CellValue::Text(input.to_string())),
            ItemType::Integer => input.trim().parse::<i64>().map(CellValue::Integer).map_err(
                |_| BindError::Validation {
                    value: input.to_string(),
                    expected: "integer",
                },
            ),
            ItemType::Double => input.trim().parse::<f64>().map(CellValue::Double).map_err(
                |_| BindError::Validation {
                    value: input.to_string(),
                    expected: "double",
                },
            ),
        }
    }

    pub fn matches_type(&self, item_type: ItemType) -> bool {
        match item_type {
            ItemType::String | ItemType::Formula => matches!(self, CellValue::Text(_)),
            ItemType::Integer => matches!(self, CellValue::Integer(_)),
            ItemType::Double => matches!(self, CellValue::Double(_) | CellValue::Integer(_)),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Integer(i) => Value::from(*i),
            CellValue::Double(d) => Value::from(*d),
            CellValue::Text(s) => Value::String(s.clone()),
        }
    }

    /// Decode from a JSON scalar; anything else is `None`.
    pub fn from_json(value: &Value) -> Option<CellValue> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(CellValue::Integer(i))
                } else {
                    n.as_f64().map(CellValue::Double)
                }
            }
            Value::String(s) => Some(CellValue::Text(s.clone())),
            Value::Bool(b) => Some(CellValue::Text(b.to_string())),
            _ => None,
        }
    }

    pub fn as_display_string(&self) -> String {
        match self {
            CellValue::Integer(i) => i.to_string(),
            CellValue::Double(d) => d.to_string(),
            CellValue::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display_string())
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Double(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_validates_against_declared_type() {
        assert_eq!(
            CellValue::parse("12", ItemType::Integer).unwrap(),
            CellValue::Integer(12)
        );
        assert_eq!(
            CellValue::parse("1.5", ItemType::Double).unwrap(),
            CellValue::Double(1.5)
        );
        assert!(CellValue::parse("1.5", ItemType::Integer).is_err());
        assert!(CellValue::parse("abc", ItemType::Double).is_err());
    }

    #[test]
    fn json_round_trip_keeps_numeric_kinds_distinct() {
        let int = CellValue::Integer(3);
        let dbl = CellValue::Double(3.25);
        let txt = CellValue::Text("3".to_string());

        assert_eq!(CellValue::from_json(&int.to_json()), Some(int));
        assert_eq!(CellValue::from_json(&dbl.to_json()), Some(dbl));
        assert_eq!(CellValue::from_json(&txt.to_json()), Some(txt));
    }

    #[test]
    fn integers_satisfy_double_cells() {
        assert!(CellValue::Integer(2).matches_type(ItemType::Double));
        assert!(!CellValue::Text("2".to_string()).matches_type(ItemType::Double));
    }
}
