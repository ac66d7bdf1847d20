//! Events produced by the engine for the host to drain.
//!
//! The host application drains the queue after each top-level
//! operation; events are batched per operation, never per cell.

use optbind_model::ColumnType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A model's committed term or table state changed.
    TermsChanged { model: String },
    /// A control's bound JSON value must be re-serialized.
    BoundValueChanged { control: String },
    /// A user-visible, non-fatal warning (e.g. disallowed terms were
    /// moved back to the pool).
    ControlWarning { control: String, message: String },
    /// A control-level error state (e.g. duplicate control names).
    /// The rest of the model graph keeps running.
    ControlError { control: String, message: String },
    /// Ask the host to create a regular data column.
    RequestColumnCreation { name: String, column_type: ColumnType },
    /// Ask the host to create a computed column.
    RequestComputedColumnCreation { name: String },
    /// Ask the host to destroy a column the engine no longer holds.
    /// Hosts only act on columns they created for the engine.
    RequestComputedColumnDestruction { name: String },
}
