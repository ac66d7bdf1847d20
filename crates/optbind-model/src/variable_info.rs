//! Contract with the host's variable-metadata provider.
//!
//! The engine never owns the data set; it queries an external provider
//! for variable metadata and reacts to its change notifications.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Measurement type of a data-set variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnType {
    Unknown,
    Nominal,
    NominalText,
    Ordinal,
    Scale,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Unknown => "unknown",
            ColumnType::Nominal => "nominal",
            ColumnType::NominalText => "nominalText",
            ColumnType::Ordinal => "ordinal",
            ColumnType::Scale => "scale",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "nominal" => Ok(ColumnType::Nominal),
            "nominalText" => Ok(ColumnType::NominalText),
            "ordinal" => Ok(ColumnType::Ordinal),
            "scale" => Ok(ColumnType::Scale),
            "unknown" => Ok(ColumnType::Unknown),
            other => Err(format!("unknown column type: {other}")),
        }
    }
}

/// Read-only access to variable metadata, implemented by the host.
pub trait VariableInfoProvider {
    fn variable_names(&self) -> Vec<String>;
    fn variable_type(&self, name: &str) -> ColumnType;
    fn labels(&self, name: &str) -> Vec<String>;
    fn row_count(&self) -> usize;
    /// True when the named column is a computed column created by the
    /// analysis that owns the asking control.
    fn is_computed(&self, name: &str) -> bool;
}

/// A change notification from the metadata provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// The whole variable set must be re-read.
    TermsReset,
    /// Columns were added or removed; the payload is the current set.
    ColumnsChanged(Vec<String>),
    /// Variables were renamed, `(old, new)` pairs.
    NamesChanged(Vec<(String, String)>),
    /// A variable's measurement type changed.
    ColumnTypeChanged(String),
    /// A variable's labels changed.
    LabelsChanged(String),
    /// A variable's labels were reordered.
    LabelsReordered(String),
    RowCountChanged,
}
