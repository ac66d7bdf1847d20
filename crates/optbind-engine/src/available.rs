//! The available pool: the source set of assignable terms, kept in
//! sync with the host's metadata provider.

use std::collections::BTreeMap;

use optbind_model::{Term, Terms, VariableInfoProvider};
use tracing::debug;

use crate::list_model::ListModelCore;
use crate::registry::AssignedId;

/// Sort order of the visible available terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortType {
    /// Data-set order, as reported by the provider.
    #[default]
    None,
    ByName,
}

/// Reconciliation phase of the available/assigned pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Idle,
    SourceChanged,
    Reconciling,
}

/// The delta of one source mutation: exactly what appeared and what
/// disappeared, never a full reset unless the diff is ambiguous (a
/// simultaneous rename+retype collapses into remove+add).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermsDelta {
    pub added: Terms,
    pub removed: Terms,
}

impl TermsDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug)]
pub struct AvailableModel {
    pub(crate) core: ListModelCore,
    /// Every source term in provider order, including currently
    /// assigned ones. This is the ranking parent for dependents.
    all_terms: Terms,
    sort: SortType,
    phase: SyncPhase,
    /// When set, dropping terms on an assigned model copies them
    /// instead of moving them out of the pool.
    copy_terms_when_dropped: bool,
    /// Classification tags per term display string, maintained by the
    /// surrounding control layer for interaction classification.
    item_types: BTreeMap<String, String>,
    /// Dependent assigned models in registration order; this order is
    /// the notification order.
    pub(crate) assigned: Vec<AssignedId>,
}

impl AvailableModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: ListModelCore::new(name),
            all_terms: Terms::new(),
            sort: SortType::None,
            phase: SyncPhase::Idle,
            copy_terms_when_dropped: false,
            item_types: BTreeMap::new(),
            assigned: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// The visible (unassigned) terms.
    pub fn terms(&self) -> &Terms {
        self.core.terms()
    }

    /// Every source term, assigned ones included.
    pub fn all_terms(&self) -> &Terms {
        &self.all_terms
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: SyncPhase) {
        debug!(model = self.core.name(), ?phase, "sync phase");
        self.phase = phase;
    }

    pub fn copy_terms_when_dropped(&self) -> bool {
        self.copy_terms_when_dropped
    }

    pub fn set_copy_terms_when_dropped(&mut self, copy: bool) {
        self.copy_terms_when_dropped = copy;
    }

    pub fn sort_type(&self) -> SortType {
        self.sort
    }

    pub fn set_sort_type(&mut self, sort: SortType) {
        self.sort = sort;
        let sorted = self.apply_sort(self.core.terms().clone());
        self.core.set_terms(sorted);
    }

    pub(crate) fn item_types(&self) -> &BTreeMap<String, String> {
        &self.item_types
    }

    pub fn item_type_of(&self, term: &Term) -> Option<&str> {
        self.item_types.get(&term.as_string()).map(String::as_str)
    }

    pub fn set_item_type_of(&mut self, term: &Term, tag: impl Into<String>) {
        self.item_types.insert(term.as_string(), tag.into());
    }

    /// Recompute the full source set from the provider and return the
    /// delta against the previous one. The caller reconciles the
    /// dependents and then restores the visible subset through
    /// [`AvailableModel::set_visible_terms`].
    pub(crate) fn resync(&mut self, provider: &dyn VariableInfoProvider) -> TermsDelta {
        let mut new_terms = Terms::new();
        for name in provider.variable_names() {
            new_terms.add(Term::new(name));
        }

        let mut delta = TermsDelta::default();
        for term in &new_terms {
            if !self.all_terms.contains(term) {
                delta.added.add(term.clone());
            }
        }
        for term in &self.all_terms {
            if !new_terms.contains(term) {
                delta.removed.add(term.clone());
            }
        }

        for removed in &delta.removed {
            self.item_types.remove(&removed.as_string());
        }

        self.all_terms = new_terms;
        delta
    }

    /// Rename source terms in place; provider order is unchanged.
    pub(crate) fn apply_renames(&mut self, renames: &[(String, String)]) {
        for (old_name, new_name) in renames {
            self.all_terms.replace_variable_name(old_name, new_name);
            if let Some(tag) = self.item_types.remove(old_name) {
                self.item_types.insert(new_name.clone(), tag);
            }
        }
        let renamed = {
            let mut visible = self.core.terms().clone();
            for (old_name, new_name) in renames {
                visible.replace_variable_name(old_name, new_name);
            }
            visible
        };
        self.core.set_terms(renamed);
    }

    /// Recompute the visible subset: all source terms minus the ones
    /// currently held by a move-semantics assigned model.
    pub(crate) fn set_visible_terms(&mut self, assigned_elsewhere: &Terms) {
        let mut visible = Terms::new();
        visible.set_sort_ranking(&self.all_terms);
        for term in &self.all_terms {
            if !assigned_elsewhere.contains(term) {
                visible.add(term.clone());
            }
        }
        let visible = self.apply_sort(visible);
        self.core.set_terms(visible);
    }

    /// Give terms back to the pool, at their ranked position.
    pub(crate) fn restore_terms(&mut self, terms: &Terms) {
        let mut visible = self.core.terms().clone();
        for term in terms {
            // Terms foreign to the source set are not restored.
            if self.all_terms.contains(term) {
                visible.add(term.clone());
            }
        }
        visible.set_sort_ranking(&self.all_terms);
        visible.sort();
        let visible = self.apply_sort(visible);
        self.core.set_terms(visible);
    }

    pub(crate) fn take_from_visible(&mut self, terms: &Terms) {
        let mut visible = self.core.terms().clone();
        visible.remove_terms(terms);
        self.core.set_terms(visible);
    }

    fn apply_sort(&self, terms: Terms) -> Terms {
        match self.sort {
            SortType::None => terms,
            SortType::ByName => {
                let mut items = terms.as_slice().to_vec();
                items.sort_by_key(|t| t.as_string().to_lowercase());
                let mut sorted = Terms::new();
                for term in items {
                    sorted.add(term);
                }
                sorted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optbind_model::ColumnType;

    struct Provider(Vec<&'static str>);

    impl VariableInfoProvider for Provider {
        fn variable_names(&self) -> Vec<String> {
            self.0.iter().map(|s| (*s).to_string()).collect()
        }
        fn variable_type(&self, _name: &str) -> ColumnType {
            ColumnType::Scale
        }
        fn labels(&self, _name: &str) -> Vec<String> {
            Vec::new()
        }
        fn row_count(&self) -> usize {
            0
        }
        fn is_computed(&self, _name: &str) -> bool {
            false
        }
    }

    #[test]
    fn resync_emits_exact_delta() {
        let mut model = AvailableModel::new("available");
        let delta = model.resync(&Provider(vec!["A", "B", "C"]));
        assert_eq!(delta.added.as_strings(), ["A", "B", "C"]);
        assert!(delta.removed.is_empty());

        let delta = model.resync(&Provider(vec!["B", "C", "D"]));
        assert_eq!(delta.added.as_strings(), ["D"]);
        assert_eq!(delta.removed.as_strings(), ["A"]);
    }

    #[test]
    fn restored_terms_return_to_ranked_position() {
        let mut model = AvailableModel::new("available");
        model.resync(&Provider(vec!["A", "B", "C"]));
        model.set_visible_terms(&Terms::new());
        model.take_from_visible(&["B"].into_iter().collect());
        assert_eq!(model.terms().as_strings(), ["A", "C"]);

        model.restore_terms(&["B"].into_iter().collect());
        assert_eq!(model.terms().as_strings(), ["A", "B", "C"]);
    }

    #[test]
    fn by_name_sort_overrides_data_set_order() {
        let mut model = AvailableModel::new("available");
        model.resync(&Provider(vec!["beta", "Alpha", "gamma"]));
        model.set_visible_terms(&Terms::new());
        model.set_sort_type(SortType::ByName);
        assert_eq!(model.terms().as_strings(), ["Alpha", "beta", "gamma"]);
    }
}
