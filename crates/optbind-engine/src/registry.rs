//! The model graph and its dispatch rules.
//!
//! Models never hold references to each other; they are registered
//! here and addressed by id. Registration order of the assigned
//! models under one pool is also their reconciliation order, so a
//! later-registered model observes the earlier ones' updated state.
//! Every top-level operation batches its notifications into the event
//! queue, which the host drains afterwards.

use std::collections::BTreeSet;

use optbind_model::{Result, SourceEvent, Terms, VariableInfoProvider};
use tracing::debug;

use crate::assigned::AssignedModel;
use crate::available::{AvailableModel, SyncPhase};
use crate::event::EngineEvent;
use crate::formula::FormulaToken;
use crate::list_model::RowControlsValues;
use crate::table::{ItemChange, TableModel, TableVariant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AvailableId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssignedId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableId(pub(crate) usize);

/// Where a table model takes its row identity from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermSource {
    Available(AvailableId),
    Assigned(AssignedId),
}

#[derive(Debug, Default)]
pub struct ModelRegistry {
    availables: Vec<AvailableModel>,
    assigneds: Vec<AssignedModel>,
    tables: Vec<TableModel>,
    names: BTreeSet<String>,
    events: Vec<EngineEvent>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // --- registration ----------------------------------------------------

    pub fn register_available(&mut self, model: AvailableModel) -> AvailableId {
        self.check_name(model.name());
        self.availables.push(model);
        AvailableId(self.availables.len() - 1)
    }

    /// Register an assigned model and wire it to its pool. The wiring
    /// order decides the reconciliation order on source changes.
    pub fn register_assigned(&mut self, model: AssignedModel) -> AssignedId {
        self.check_name(model.name());
        let source = model.source();
        self.assigneds.push(model);
        let id = AssignedId(self.assigneds.len() - 1);
        self.availables[source.0].assigned.push(id);
        id
    }

    pub fn register_table(&mut self, model: TableModel) -> TableId {
        self.check_name(model.name());
        self.tables.push(model);
        TableId(self.tables.len() - 1)
    }

    fn check_name(&mut self, name: &str) {
        if !self.names.insert(name.to_string()) {
            self.events.push(EngineEvent::ControlError {
                control: name.to_string(),
                message: format!("a control named '{name}' already exists"),
            });
        }
    }

    // --- access ----------------------------------------------------------

    pub fn available(&self, id: AvailableId) -> &AvailableModel {
        &self.availables[id.0]
    }

    pub fn available_mut(&mut self, id: AvailableId) -> &mut AvailableModel {
        &mut self.availables[id.0]
    }

    pub fn assigned(&self, id: AssignedId) -> &AssignedModel {
        &self.assigneds[id.0]
    }

    pub fn assigned_mut(&mut self, id: AssignedId) -> &mut AssignedModel {
        &mut self.assigneds[id.0]
    }

    pub fn table(&self, id: TableId) -> &TableModel {
        &self.tables[id.0]
    }

    pub fn table_mut(&mut self, id: TableId) -> &mut TableModel {
        &mut self.tables[id.0]
    }

    /// Take the events batched since the last drain.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    fn push_event(&mut self, event: EngineEvent) {
        if !self.events.contains(&event) {
            self.events.push(event);
        }
    }

    // --- source changes --------------------------------------------------

    /// Apply one host-side data change to a pool and reconcile every
    /// dependent model. The whole cascade is one operation: events are
    /// batched, and the pool's sync phase guards against re-entrant
    /// per-model resets while the delta is being applied.
    pub fn handle_source_event(
        &mut self,
        provider: &dyn VariableInfoProvider,
        id: AvailableId,
        event: &SourceEvent,
    ) {
        match event {
            SourceEvent::TermsReset | SourceEvent::ColumnsChanged(_) => {
                self.reconcile_reset(provider, id);
            }
            SourceEvent::NamesChanged(renames) => {
                self.reconcile_renames(id, renames);
            }
            SourceEvent::ColumnTypeChanged(_) => {
                self.reconcile_retype(provider, id);
            }
            SourceEvent::LabelsChanged(_) | SourceEvent::LabelsReordered(_) => {
                self.refresh_contrasts(provider);
            }
            SourceEvent::RowCountChanged => {
                debug!(model = self.availables[id.0].name(), "row count changed");
            }
        }
    }

    /// Full reset: recompute the pool, evict removed terms from the
    /// assigned models, absorb added ones where configured, then
    /// restore the visible subset.
    fn reconcile_reset(&mut self, provider: &dyn VariableInfoProvider, id: AvailableId) {
        self.availables[id.0].set_phase(SyncPhase::SourceChanged);
        let delta = self.availables[id.0].resync(provider);
        if delta.is_empty() {
            self.refresh_visible(id);
            self.availables[id.0].set_phase(SyncPhase::Idle);
            return;
        }

        self.availables[id.0].set_phase(SyncPhase::Reconciling);
        let dependents = self.availables[id.0].assigned.clone();
        let item_types = self.availables[id.0].item_types().clone();
        let copy_mode = self.availables[id.0].copy_terms_when_dropped();
        let mut changed = Vec::new();

        for aid in dependents {
            // In copy mode removed terms stay assigned with a warning;
            // they fail the allowed check on the next validation.
            if copy_mode && !delta.removed.is_empty() {
                let mut retained = Terms::new();
                for term in &delta.removed {
                    if self.assigneds[aid.0].terms().contains(term) {
                        retained.add(term.clone());
                    }
                }
                if !retained.is_empty() {
                    self.push_event(EngineEvent::ControlWarning {
                        control: self.assigneds[aid.0].name().to_string(),
                        message: format!(
                            "no longer in the data set: {}",
                            retained.as_strings().join(", ")
                        ),
                    });
                }
            }

            let assigned = &mut self.assigneds[aid.0];
            let before = assigned.core.terms().clone();

            if !delta.removed.is_empty() && !copy_mode {
                if let Some(interaction) = assigned.interaction.as_mut() {
                    interaction.remove_terms(&delta.removed);
                    let assembled = interaction.assembled_terms();
                    assigned.core.set_terms(assembled);
                } else {
                    let mut terms = assigned.core.terms().clone();
                    terms.remove_terms(&delta.removed);
                    terms.discard_with_components(&delta.removed);
                    assigned.core.set_terms(terms);
                }
            }

            if assigned.auto_absorb() && !delta.added.is_empty() {
                let (allowed, _) = assigned.core.partition_allowed(&delta.added, provider);
                if let Some(interaction) = assigned.interaction.as_mut() {
                    let combine = interaction.add_interactions_by_default();
                    interaction.classify_and_add(&allowed, combine, &item_types);
                    let assembled = interaction.assembled_terms();
                    assigned.core.set_terms(assembled);
                } else {
                    assigned.core.terms_mut().add_terms(&allowed);
                }
            }

            if *assigned.core.terms() != before {
                changed.push(aid);
                let name = assigned.name().to_string();
                self.push_event(EngineEvent::TermsChanged {
                    model: name.clone(),
                });
                self.push_event(EngineEvent::BoundValueChanged { control: name });
            }
        }

        self.refresh_visible(id);
        self.cascade_tables(Some(id), &changed);
        self.availables[id.0].set_phase(SyncPhase::Idle);
        self.push_event(EngineEvent::TermsChanged {
            model: self.availables[id.0].name().to_string(),
        });
    }

    /// Renames keep positions and values; only display strings move.
    fn reconcile_renames(&mut self, id: AvailableId, renames: &[(String, String)]) {
        let old_visible = self.availables[id.0].terms().as_strings();
        self.availables[id.0].apply_renames(renames);
        let new_visible = self.availables[id.0].terms().as_strings();
        let pool_term_renames: Vec<(String, String)> = old_visible
            .into_iter()
            .zip(new_visible)
            .filter(|(old, new)| old != new)
            .collect();

        let dependents = self.availables[id.0].assigned.clone();
        let mut changed = Vec::new();
        for aid in dependents {
            let assigned = &mut self.assigneds[aid.0];
            if let Some(interaction) = assigned.interaction.as_mut() {
                interaction.apply_renames(renames);
            }
            let term_renames = assigned.core.apply_renames(renames);
            if term_renames.is_empty() {
                continue;
            }
            changed.push((aid, term_renames));
            let name = assigned.name().to_string();
            self.push_event(EngineEvent::BoundValueChanged { control: name });
        }

        for tid in 0..self.tables.len() {
            let Some(source) = self.tables[tid].source() else {
                continue;
            };
            let row_renames = match source {
                TermSource::Available(aid) if aid == id => Some(&pool_term_renames),
                TermSource::Assigned(aid) => changed
                    .iter()
                    .find(|(changed_id, _)| *changed_id == aid)
                    .map(|(_, renames)| renames),
                TermSource::Available(_) => None,
            };
            if let Some(row_renames) = row_renames {
                self.tables[tid].rename_rows(row_renames);
                let name = self.tables[tid].name().to_string();
                self.push_event(EngineEvent::BoundValueChanged { control: name });
            }
        }

        if !pool_term_renames.is_empty() {
            self.push_event(EngineEvent::TermsChanged {
                model: self.availables[id.0].name().to_string(),
            });
        }
    }

    /// A type change keeps the pool membership but may turn assigned
    /// terms disallowed; those are evicted back to the pool.
    fn reconcile_retype(&mut self, provider: &dyn VariableInfoProvider, id: AvailableId) {
        let dependents = self.availables[id.0].assigned.clone();
        let mut changed = Vec::new();
        for aid in dependents {
            let evicted = self.assigneds[aid.0].revalidate(provider);
            if evicted.is_empty() {
                continue;
            }
            let assigned = &mut self.assigneds[aid.0];
            if let Some(interaction) = assigned.interaction.as_mut() {
                interaction.remove_terms(&evicted);
                let assembled = interaction.assembled_terms();
                assigned.core.set_terms(assembled);
            }
            changed.push(aid);
            let name = assigned.name().to_string();
            self.push_event(EngineEvent::ControlWarning {
                control: name.clone(),
                message: format!(
                    "removed from '{name}' because the variable type is no longer allowed: {}",
                    evicted.as_strings().join(", ")
                ),
            });
            self.push_event(EngineEvent::TermsChanged {
                model: name.clone(),
            });
            self.push_event(EngineEvent::BoundValueChanged { control: name });
        }

        if changed.is_empty() {
            return;
        }
        self.refresh_visible(id);
        self.cascade_tables(Some(id), &changed);
        self.push_event(EngineEvent::TermsChanged {
            model: self.availables[id.0].name().to_string(),
        });
    }

    /// Rebuild every custom-contrasts grid from the provider's current
    /// factor labels.
    fn refresh_contrasts(&mut self, provider: &dyn VariableInfoProvider) {
        for tid in 0..self.tables.len() {
            let TableVariant::CustomContrasts { variables } = self.tables[tid].variant() else {
                continue;
            };
            let variables = variables.clone();
            let labels: Vec<Vec<String>> =
                variables.iter().map(|name| provider.labels(name)).collect();
            self.tables[tid].contrasts_reset(&variables, &labels);
            let name = self.tables[tid].name().to_string();
            self.push_event(EngineEvent::TermsChanged {
                model: name.clone(),
            });
            self.push_event(EngineEvent::BoundValueChanged { control: name });
        }
    }

    /// Recompute a pool's visible subset: everything minus the terms
    /// held by a move-semantics assigned model. Interaction models
    /// never deplete the pool; their components stay assignable.
    fn refresh_visible(&mut self, id: AvailableId) {
        let mut assigned_elsewhere = Terms::new();
        if !self.availables[id.0].copy_terms_when_dropped() {
            for &aid in &self.availables[id.0].assigned {
                let assigned = &self.assigneds[aid.0];
                if !assigned.is_interaction() {
                    assigned_elsewhere.add_terms(assigned.terms());
                }
            }
        }
        self.availables[id.0].set_visible_terms(&assigned_elsewhere);
    }

    /// Push the changed term sequences into the tables that use them
    /// as row identity.
    fn cascade_tables(&mut self, available: Option<AvailableId>, changed: &[AssignedId]) {
        for tid in 0..self.tables.len() {
            let Some(source) = self.tables[tid].source() else {
                continue;
            };
            let terms = match source {
                TermSource::Available(aid) if Some(aid) == available => {
                    self.availables[aid.0].terms().clone()
                }
                TermSource::Assigned(aid) if changed.contains(&aid) => {
                    self.assigneds[aid.0].terms().clone()
                }
                _ => continue,
            };
            self.tables[tid].source_terms_reset(&terms);
            let name = self.tables[tid].name().to_string();
            self.push_event(EngineEvent::TermsChanged {
                model: name.clone(),
            });
            self.push_event(EngineEvent::BoundValueChanged { control: name });
        }
    }

    // --- user operations -------------------------------------------------

    /// Move (or copy) terms from the pool into an assigned model.
    /// Disallowed terms stay in the pool and raise a warning; the rest
    /// land at `drop_index` (append when `None`). Interaction models
    /// classify the incoming terms and, when configured, cross them
    /// against the terms already present.
    pub fn assign(
        &mut self,
        provider: &dyn VariableInfoProvider,
        id: AssignedId,
        terms: Terms,
        drop_index: Option<usize>,
    ) {
        let source = self.assigneds[id.0].source();
        let (allowed, rejected) = self.assigneds[id.0]
            .core
            .partition_allowed(&terms, provider);
        if !rejected.is_empty() {
            let name = self.assigneds[id.0].name().to_string();
            self.push_event(EngineEvent::ControlWarning {
                control: name,
                message: format!(
                    "not allowed here: {}",
                    rejected.as_strings().join(", ")
                ),
            });
        }
        if allowed.is_empty() {
            return;
        }

        let item_types = self.availables[source.0].item_types().clone();
        let is_interaction = self.assigneds[id.0].is_interaction();
        let assigned = &mut self.assigneds[id.0];
        if let Some(interaction) = assigned.interaction.as_mut() {
            let combine = interaction.add_interactions_by_default();
            interaction.classify_and_add(&allowed, combine, &item_types);
            let assembled = interaction.assembled_terms();
            assigned.core.set_terms(assembled);
        } else {
            let mut terms_now = assigned.core.terms().clone();
            match drop_index {
                Some(index) => terms_now.insert_terms(index.min(terms_now.len()), &allowed),
                None => terms_now.add_terms(&allowed),
            }
            assigned.core.set_terms(terms_now);
        }

        if !self.availables[source.0].copy_terms_when_dropped() && !is_interaction {
            self.availables[source.0].take_from_visible(&allowed);
        }

        let name = self.assigneds[id.0].name().to_string();
        self.push_event(EngineEvent::TermsChanged {
            model: name.clone(),
        });
        self.push_event(EngineEvent::BoundValueChanged { control: name });
        self.push_event(EngineEvent::TermsChanged {
            model: self.availables[source.0].name().to_string(),
        });
        self.cascade_tables(None, &[id]);
    }

    /// Give terms back to the pool. They return to their ranked
    /// position among the visible terms.
    pub fn unassign(&mut self, id: AssignedId, terms: &Terms) {
        let source = self.assigneds[id.0].source();
        let is_interaction = self.assigneds[id.0].is_interaction();
        let assigned = &mut self.assigneds[id.0];
        let before = assigned.core.terms().clone();
        if let Some(interaction) = assigned.interaction.as_mut() {
            interaction.remove_terms(terms);
            let assembled = interaction.assembled_terms();
            assigned.core.set_terms(assembled);
        } else {
            let mut terms_now = assigned.core.terms().clone();
            terms_now.remove_terms(terms);
            assigned.core.set_terms(terms_now);
        }
        if *self.assigneds[id.0].core.terms() == before {
            return;
        }

        if !self.availables[source.0].copy_terms_when_dropped() && !is_interaction {
            self.availables[source.0].restore_terms(terms);
        }

        let name = self.assigneds[id.0].name().to_string();
        self.push_event(EngineEvent::TermsChanged {
            model: name.clone(),
        });
        self.push_event(EngineEvent::BoundValueChanged { control: name });
        self.push_event(EngineEvent::TermsChanged {
            model: self.availables[source.0].name().to_string(),
        });
        self.cascade_tables(None, &[id]);
    }

    /// Reorder terms within an assigned model.
    pub fn move_within(&mut self, id: AssignedId, indexes: &[usize], drop_index: Option<usize>) {
        self.assigneds[id.0].core.move_by_indexes(indexes, drop_index);
        let name = self.assigneds[id.0].name().to_string();
        self.push_event(EngineEvent::TermsChanged {
            model: name.clone(),
        });
        self.push_event(EngineEvent::BoundValueChanged { control: name });
        self.cascade_tables(None, &[id]);
    }

    /// Install an assigned model's terms from a bound value. With
    /// `re_init` set, interaction terms whose components all survive
    /// are preserved across the re-initialization.
    pub fn assigned_init_terms(
        &mut self,
        id: AssignedId,
        terms: &Terms,
        values: RowControlsValues,
        re_init: bool,
    ) {
        let source = self.assigneds[id.0].source();
        let item_types = self.availables[source.0].item_types().clone();
        self.assigneds[id.0].init_terms(terms, values, re_init, &item_types);
        self.refresh_visible(source);
        let name = self.assigneds[id.0].name().to_string();
        self.push_event(EngineEvent::TermsChanged {
            model: name.clone(),
        });
        self.push_event(EngineEvent::BoundValueChanged { control: name });
        self.cascade_tables(None, &[id]);
    }

    // --- table operations ------------------------------------------------

    pub fn table_set_size(&mut self, id: TableId, rows: Option<usize>, cols: Option<usize>) {
        let (rows_changed, cols_changed) = self.tables[id.0].set_size(rows, cols);
        if rows_changed || cols_changed {
            let name = self.tables[id.0].name().to_string();
            self.push_event(EngineEvent::TermsChanged {
                model: name.clone(),
            });
            self.push_event(EngineEvent::BoundValueChanged { control: name });
        }
    }

    /// Commit one table cell edit. Committed edits notify right away;
    /// formula edits stay silent until their validation lands through
    /// [`ModelRegistry::table_formula_result`].
    pub fn table_item_changed(
        &mut self,
        id: TableId,
        col: usize,
        row: usize,
        input: &str,
    ) -> Result<ItemChange> {
        let change = self.tables[id.0].item_changed(col, row, input)?;
        if change == ItemChange::Committed {
            let name = self.tables[id.0].name().to_string();
            self.push_event(EngineEvent::TermsChanged {
                model: name.clone(),
            });
            self.push_event(EngineEvent::BoundValueChanged { control: name });
        }
        Ok(change)
    }

    /// Land a formula validation result. Stale tokens are ignored
    /// entirely; a current failure flags the control instead of
    /// committing.
    pub fn table_formula_result(
        &mut self,
        id: TableId,
        col: usize,
        row: usize,
        token: FormulaToken,
        result: std::result::Result<(), String>,
    ) {
        let current = self.tables[id.0].formula_check_completed(col, row, token, true);
        if !current {
            return;
        }
        let name = self.tables[id.0].name().to_string();
        match result {
            Ok(()) => {
                self.push_event(EngineEvent::TermsChanged {
                    model: name.clone(),
                });
                self.push_event(EngineEvent::BoundValueChanged { control: name });
            }
            Err(message) => {
                self.push_event(EngineEvent::ControlError {
                    control: name,
                    message,
                });
            }
        }
    }

    /// Rebuild a custom-contrasts grid for a new set of factors, with
    /// levels taken from the provider.
    pub fn table_contrasts_reset(
        &mut self,
        provider: &dyn VariableInfoProvider,
        id: TableId,
        variables: &[String],
    ) {
        let labels: Vec<Vec<String>> = variables
            .iter()
            .map(|name| provider.labels(name))
            .collect();
        self.tables[id.0].contrasts_reset(variables, &labels);
        let name = self.tables[id.0].name().to_string();
        self.push_event(EngineEvent::TermsChanged {
            model: name.clone(),
        });
        self.push_event(EngineEvent::BoundValueChanged { control: name });
    }
}
