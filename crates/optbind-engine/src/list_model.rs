//! Shared state of every term-list model: the ordered term set, the
//! per-term row-control values, and the allowed-term checks.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use optbind_model::{ColumnType, Term, Terms, VariableInfoProvider};
use serde_json::Value;

/// Per-term extra control values, keyed by the term's display string
/// and then by control name. These round-trip through the bound JSON
/// as additional object fields next to the term key.
pub type RowControlsValues = BTreeMap<String, BTreeMap<String, Value>>;

#[derive(Debug, Clone, Default)]
pub struct ListModelCore {
    name: String,
    terms: Terms,
    /// Classification tag of this model's terms (e.g. "fixedFactors",
    /// "covariates"); consulted by interaction models.
    item_type: String,
    /// Allowed variable types for single-component terms. Empty means
    /// every type is allowed.
    allowed_types: BTreeSet<ColumnType>,
    /// Whether computed columns owned by this analysis may be used.
    allow_own_computed: bool,
    row_controls: RowControlsValues,
}

impl ListModelCore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            allow_own_computed: true,
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn terms(&self) -> &Terms {
        &self.terms
    }

    pub fn terms_mut(&mut self) -> &mut Terms {
        &mut self.terms
    }

    pub fn set_terms(&mut self, terms: Terms) {
        self.terms = terms;
        self.prune_row_controls();
    }

    pub fn item_type(&self) -> &str {
        &self.item_type
    }

    pub fn set_item_type(&mut self, item_type: impl Into<String>) {
        self.item_type = item_type.into();
    }

    pub fn allowed_types(&self) -> &BTreeSet<ColumnType> {
        &self.allowed_types
    }

    pub fn set_allowed_types<I: IntoIterator<Item = ColumnType>>(&mut self, types: I) {
        self.allowed_types = types.into_iter().collect();
    }

    pub fn set_allow_own_computed(&mut self, allow: bool) {
        self.allow_own_computed = allow;
    }

    pub fn row_controls(&self) -> &RowControlsValues {
        &self.row_controls
    }

    pub fn set_row_controls(&mut self, values: RowControlsValues) {
        self.row_controls = values;
        self.prune_row_controls();
    }

    pub fn row_control_values(&self, term: &Term) -> Option<&BTreeMap<String, Value>> {
        self.row_controls.get(&term.as_string())
    }

    pub fn set_row_control_value(&mut self, term: &Term, control: &str, value: Value) {
        self.row_controls
            .entry(term.as_string())
            .or_default()
            .insert(control.to_string(), value);
    }

    /// Drop row-control values for terms that are no longer present.
    fn prune_row_controls(&mut self) {
        let keys: BTreeSet<String> = self.terms.as_strings().into_iter().collect();
        self.row_controls.retain(|key, _| keys.contains(key));
    }

    /// A term is allowed iff it is not a forbidden own computed column
    /// and, for single-component terms, its variable type is in the
    /// allowed set. Interaction terms always pass the type check.
    pub fn is_allowed(&self, term: &Term, provider: &dyn VariableInfoProvider) -> bool {
        if !self.allow_own_computed && term.len() == 1 && provider.is_computed(&term.as_string()) {
            return false;
        }
        if self.allowed_types.is_empty() || term.len() > 1 {
            return true;
        }
        let variable_type = provider.variable_type(&term.as_string());
        self.allowed_types.contains(&variable_type)
    }

    /// Split `terms` into (allowed, rejected) against this model.
    pub fn partition_allowed(
        &self,
        terms: &Terms,
        provider: &dyn VariableInfoProvider,
    ) -> (Terms, Terms) {
        let mut allowed = Terms::new();
        let mut rejected = Terms::new();
        for term in terms {
            if self.is_allowed(term, provider) {
                allowed.add(term.clone());
            } else {
                rejected.add(term.clone());
            }
        }
        (allowed, rejected)
    }

    // --- index-based (draggable) operations ------------------------------

    pub fn terms_from_indexes(&self, indexes: &[usize]) -> Terms {
        let mut result = Terms::new();
        for &index in indexes {
            if let Some(term) = self.terms.at(index) {
                result.add(term.clone());
            }
        }
        result
    }

    pub fn remove_by_indexes(&mut self, indexes: &[usize]) -> Terms {
        let removed = self.terms_from_indexes(indexes);
        self.terms.remove_terms(&removed);
        self.prune_row_controls();
        removed
    }

    /// Move the terms at `indexes` so they land at `drop_index`
    /// (`None` appends). Order within the moved block is preserved.
    pub fn move_by_indexes(&mut self, indexes: &[usize], drop_index: Option<usize>) {
        if indexes.is_empty() {
            return;
        }
        let moving = self.terms_from_indexes(indexes);
        let mut drop_index = drop_index.unwrap_or(self.terms.len());
        for &index in indexes {
            if index < drop_index {
                drop_index -= 1;
            }
        }
        self.terms.remove_terms(&moving);
        self.terms.insert_terms(drop_index, &moving);
    }

    /// Rename variables according to `(old, new)` pairs. Returns the
    /// renames that actually touched a term, keyed by whole-term
    /// display strings (old -> new), for forwarding downstream.
    pub fn apply_renames(&mut self, renames: &[(String, String)]) -> Vec<(String, String)> {
        let old_strings = self.terms.as_strings();
        let mut changed_indexes = BTreeSet::new();
        for (old_name, new_name) in renames {
            changed_indexes.extend(self.terms.replace_variable_name(old_name, new_name));
        }
        let new_strings = self.terms.as_strings();
        let mut term_renames = Vec::new();
        for index in changed_indexes {
            let old = old_strings[index].clone();
            let new = new_strings[index].clone();
            if let Some(values) = self.row_controls.remove(&old) {
                self.row_controls.insert(new.clone(), values);
            }
            term_renames.push((old, new));
        }
        term_renames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optbind_model::CellValue;

    struct FakeProvider;

    impl VariableInfoProvider for FakeProvider {
        fn variable_names(&self) -> Vec<String> {
            vec!["age".to_string(), "group".to_string(), "score".to_string()]
        }
        fn variable_type(&self, name: &str) -> ColumnType {
            match name {
                "age" | "score" => ColumnType::Scale,
                _ => ColumnType::Nominal,
            }
        }
        fn labels(&self, _name: &str) -> Vec<String> {
            Vec::new()
        }
        fn row_count(&self) -> usize {
            10
        }
        fn is_computed(&self, name: &str) -> bool {
            name == "derived"
        }
    }

    #[test]
    fn empty_allowed_set_allows_everything() {
        let core = ListModelCore::new("model");
        assert!(core.is_allowed(&Term::new("group"), &FakeProvider));
    }

    #[test]
    fn type_whitelist_rejects_single_component_terms_only() {
        let mut core = ListModelCore::new("model");
        core.set_allowed_types([ColumnType::Scale]);
        assert!(core.is_allowed(&Term::new("age"), &FakeProvider));
        assert!(!core.is_allowed(&Term::new("group"), &FakeProvider));
        // Interaction terms bypass the type check.
        assert!(core.is_allowed(&Term::from_components(vec!["group", "age"]), &FakeProvider));
    }

    #[test]
    fn own_computed_columns_can_be_forbidden() {
        let mut core = ListModelCore::new("model");
        assert!(core.is_allowed(&Term::new("derived"), &FakeProvider));
        core.set_allow_own_computed(false);
        assert!(!core.is_allowed(&Term::new("derived"), &FakeProvider));
    }

    #[test]
    fn move_by_indexes_accounts_for_removed_positions() {
        let mut core = ListModelCore::new("model");
        core.set_terms(["A", "B", "C", "D"].into_iter().collect());
        core.move_by_indexes(&[0, 1], Some(3));
        assert_eq!(core.terms().as_strings(), ["C", "A", "B", "D"]);
    }

    #[test]
    fn renames_carry_row_control_values_along() {
        let mut core = ListModelCore::new("model");
        core.set_terms(["A", "B"].into_iter().collect());
        core.set_row_control_value(
            &Term::new("A"),
            "weight",
            CellValue::Double(0.5).to_json(),
        );
        let renames = core.apply_renames(&[("A".to_string(), "Z".to_string())]);
        assert_eq!(renames, [("A".to_string(), "Z".to_string())]);
        assert!(core.row_control_values(&Term::new("Z")).is_some());
        assert!(core.row_control_values(&Term::new("A")).is_none());
    }
}
