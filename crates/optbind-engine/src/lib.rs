//! The model graph behind an analysis form: available/assigned term
//! lists, interaction models, editable grids, and the JSON bound
//! values that persist their state.
//!
//! Models are registered in a [`ModelRegistry`] and addressed by id;
//! the registry dispatches host-side data changes through the graph
//! and batches the resulting notifications per operation.

pub mod assigned;
pub mod available;
pub mod bound;
pub mod event;
pub mod formula;
pub mod interaction;
pub mod list_model;
pub mod registry;
pub mod table;

pub use assigned::AssignedModel;
pub use available::{AvailableModel, SortType, SyncPhase, TermsDelta};
pub use bound::{
    BoundColumnControl, BoundControl, BoundTableControl, BoundTermsControl, OptionsDocument,
    describe_variables,
};
pub use event::EngineEvent;
pub use formula::{FormulaToken, FormulaTracker};
pub use interaction::InteractionState;
pub use list_model::{ListModelCore, RowControlsValues};
pub use registry::{AssignedId, AvailableId, ModelRegistry, TableId, TermSource};
pub use table::{ItemChange, TableModel, TableVariant};
