//! Value types of the terms/binding engine: terms and term
//! collections, cell values, table grids, and the variable metadata
//! contract towards the host application.

pub mod error;
pub mod table;
pub mod term;
pub mod terms;
pub mod value;
pub mod variable_info;

pub use error::{BindError, Result};
pub use table::TableTerms;
pub use term::Term;
pub use terms::{CombinationType, Terms};
pub use value::{CellValue, ItemType};
pub use variable_info::{ColumnType, SourceEvent, VariableInfoProvider};
