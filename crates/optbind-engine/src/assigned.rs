//! Assigned models: the destination sets of terms chosen from an
//! available pool.

use std::collections::BTreeMap;

use optbind_model::{Term, Terms, VariableInfoProvider};

use crate::interaction::InteractionState;
use crate::list_model::{ListModelCore, RowControlsValues};
use crate::registry::AvailableId;

#[derive(Debug)]
pub struct AssignedModel {
    pub(crate) core: ListModelCore,
    pub(crate) source: AvailableId,
    /// When true, new source variables are appended automatically.
    auto_absorb: bool,
    /// Interaction behavior, when this assigned list derives
    /// combination terms instead of holding plain variables.
    pub(crate) interaction: Option<InteractionState>,
}

impl AssignedModel {
    pub fn new(name: impl Into<String>, source: AvailableId) -> Self {
        Self {
            core: ListModelCore::new(name),
            source,
            auto_absorb: false,
            interaction: None,
        }
    }

    pub fn with_interaction(mut self, interaction: InteractionState) -> Self {
        self.interaction = Some(interaction);
        self
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    pub fn source(&self) -> AvailableId {
        self.source
    }

    pub fn terms(&self) -> &Terms {
        self.core.terms()
    }

    pub fn row_controls(&self) -> &RowControlsValues {
        self.core.row_controls()
    }

    pub fn is_interaction(&self) -> bool {
        self.interaction.is_some()
    }

    pub fn auto_absorb(&self) -> bool {
        self.auto_absorb
    }

    pub fn set_auto_absorb(&mut self, absorb: bool) {
        self.auto_absorb = absorb;
    }

    pub fn core(&self) -> &ListModelCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut ListModelCore {
        &mut self.core
    }

    /// Initialize (or re-initialize) the assigned set. For interaction
    /// models a re-init must not destroy manually built interaction
    /// terms whose components all survive in the new set.
    pub(crate) fn init_terms(
        &mut self,
        terms: &Terms,
        values: RowControlsValues,
        re_init: bool,
        item_types: &BTreeMap<String, String>,
    ) {
        if let Some(interaction) = self.interaction.as_mut() {
            let mut new_terms = terms.clone();
            if re_init {
                for old in interaction.interaction_terms().iter() {
                    if old.is_interaction()
                        && old
                            .components()
                            .iter()
                            .all(|c| terms.contains(&Term::new(c.clone())))
                    {
                        new_terms.add(old.clone());
                    }
                }
            }
            interaction.clear();
            interaction.classify_and_add(&new_terms, false, item_types);
            self.core.set_terms(interaction.assembled_terms());
        } else {
            self.core.set_terms(terms.clone());
        }
        self.core.set_row_controls(values);
    }

    /// Single-term type change: re-check the term and evict it when it
    /// is no longer allowed. Returns the evicted terms.
    pub(crate) fn revalidate(&mut self, provider: &dyn VariableInfoProvider) -> Terms {
        let (allowed, rejected) = self.core.partition_allowed(self.core.terms(), provider);
        if !rejected.is_empty() {
            self.core.set_terms(allowed);
        }
        rejected
    }
}
