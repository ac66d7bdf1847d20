use std::collections::BTreeMap;

use optbind_engine::{
    AssignedModel, AvailableModel, EngineEvent, ModelRegistry, SyncPhase,
};
use optbind_model::{ColumnType, SourceEvent, Term, Terms, VariableInfoProvider};
use proptest::prelude::*;

#[derive(Default)]
struct TestProvider {
    names: Vec<String>,
    types: BTreeMap<String, ColumnType>,
}

impl TestProvider {
    fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|s| (*s).to_string()).collect(),
            types: BTreeMap::new(),
        }
    }

    fn with_type(mut self, name: &str, column_type: ColumnType) -> Self {
        self.types.insert(name.to_string(), column_type);
        self
    }
}

impl VariableInfoProvider for TestProvider {
    fn variable_names(&self) -> Vec<String> {
        self.names.clone()
    }
    fn variable_type(&self, name: &str) -> ColumnType {
        self.types.get(name).copied().unwrap_or(ColumnType::Scale)
    }
    fn labels(&self, _name: &str) -> Vec<String> {
        Vec::new()
    }
    fn row_count(&self) -> usize {
        100
    }
    fn is_computed(&self, _name: &str) -> bool {
        false
    }
}

fn terms(names: &[&str]) -> Terms {
    names.iter().copied().collect()
}

#[test]
fn source_reset_reconciles_every_dependent_in_registration_order() {
    let mut registry = ModelRegistry::new();
    let pool = registry.register_available(AvailableModel::new("available"));
    let first = registry.register_assigned(AssignedModel::new("dependent", pool));
    let second = registry.register_assigned(AssignedModel::new("fixed", pool));

    let provider = TestProvider::new(&["A", "B", "C"]);
    registry.handle_source_event(&provider, pool, &SourceEvent::TermsReset);
    registry.assign(&provider, first, terms(&["A"]), None);
    registry.assign(&provider, second, terms(&["B"]), None);
    registry.drain_events();

    // A disappears: only the first dependent changes.
    let provider = TestProvider::new(&["B", "C"]);
    registry.handle_source_event(&provider, pool, &SourceEvent::TermsReset);

    assert!(registry.assigned(first).terms().is_empty());
    assert_eq!(registry.assigned(second).terms().as_strings(), ["B"]);
    assert_eq!(registry.available(pool).terms().as_strings(), ["C"]);
    assert_eq!(registry.available(pool).phase(), SyncPhase::Idle);

    let events = registry.drain_events();
    assert!(events.contains(&EngineEvent::TermsChanged {
        model: "dependent".to_string()
    }));
    assert!(!events.contains(&EngineEvent::TermsChanged {
        model: "fixed".to_string()
    }));
}

#[test]
fn copy_mode_never_depletes_the_pool() {
    let mut registry = ModelRegistry::new();
    let mut pool_model = AvailableModel::new("available");
    pool_model.set_copy_terms_when_dropped(true);
    let pool = registry.register_available(pool_model);
    let assigned = registry.register_assigned(AssignedModel::new("assigned", pool));

    let provider = TestProvider::new(&["A", "B"]);
    registry.handle_source_event(&provider, pool, &SourceEvent::TermsReset);
    registry.assign(&provider, assigned, terms(&["A"]), None);

    assert_eq!(registry.available(pool).terms().as_strings(), ["A", "B"]);
    assert_eq!(registry.assigned(assigned).terms().as_strings(), ["A"]);
}

#[test]
fn copy_mode_keeps_assigned_terms_when_the_source_drops_them() {
    let mut registry = ModelRegistry::new();
    let mut pool_model = AvailableModel::new("available");
    pool_model.set_copy_terms_when_dropped(true);
    let pool = registry.register_available(pool_model);
    let assigned = registry.register_assigned(AssignedModel::new("assigned", pool));

    let provider = TestProvider::new(&["A", "B"]);
    registry.handle_source_event(&provider, pool, &SourceEvent::TermsReset);
    registry.assign(&provider, assigned, terms(&["A"]), None);

    let provider = TestProvider::new(&["B"]);
    registry.drain_events();
    registry.handle_source_event(&provider, pool, &SourceEvent::TermsReset);

    assert_eq!(registry.assigned(assigned).terms().as_strings(), ["A"]);
    assert_eq!(registry.available(pool).terms().as_strings(), ["B"]);
    // The stale assignment is flagged, not silently kept.
    let events = registry.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::ControlWarning { control, .. } if control == "assigned")));
}

#[test]
fn auto_absorb_appends_new_source_variables() {
    let mut registry = ModelRegistry::new();
    let pool = registry.register_available(AvailableModel::new("available"));
    let mut model = AssignedModel::new("assigned", pool);
    model.set_auto_absorb(true);
    let assigned = registry.register_assigned(model);

    let provider = TestProvider::new(&["A"]);
    registry.handle_source_event(&provider, pool, &SourceEvent::TermsReset);
    assert_eq!(registry.assigned(assigned).terms().as_strings(), ["A"]);

    let provider = TestProvider::new(&["A", "B"]);
    registry.handle_source_event(&provider, pool, &SourceEvent::TermsReset);
    assert_eq!(registry.assigned(assigned).terms().as_strings(), ["A", "B"]);
    assert!(registry.available(pool).terms().is_empty());
}

#[test]
fn type_change_evicts_disallowed_terms_back_to_the_pool() {
    let mut registry = ModelRegistry::new();
    let pool = registry.register_available(AvailableModel::new("available"));
    let mut model = AssignedModel::new("covariates", pool);
    model.core_mut().set_allowed_types([ColumnType::Scale]);
    let assigned = registry.register_assigned(model);

    let provider = TestProvider::new(&["A", "B"]);
    registry.handle_source_event(&provider, pool, &SourceEvent::TermsReset);
    registry.assign(&provider, assigned, terms(&["A"]), None);
    registry.drain_events();

    // A turns nominal: no longer allowed in a scale-only list.
    let provider = TestProvider::new(&["A", "B"]).with_type("A", ColumnType::Nominal);
    registry.handle_source_event(
        &provider,
        pool,
        &SourceEvent::ColumnTypeChanged("A".to_string()),
    );

    assert!(registry.assigned(assigned).terms().is_empty());
    assert_eq!(registry.available(pool).terms().as_strings(), ["A", "B"]);
    let events = registry.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::ControlWarning { control, .. } if control == "covariates")));
}

#[test]
fn disallowed_drops_stay_in_the_pool_with_a_warning() {
    let mut registry = ModelRegistry::new();
    let pool = registry.register_available(AvailableModel::new("available"));
    let mut model = AssignedModel::new("factors", pool);
    model.core_mut().set_allowed_types([ColumnType::Nominal]);
    let assigned = registry.register_assigned(model);

    let provider = TestProvider::new(&["A", "B"]).with_type("B", ColumnType::Nominal);
    registry.handle_source_event(&provider, pool, &SourceEvent::TermsReset);
    registry.drain_events();

    registry.assign(&provider, assigned, terms(&["A", "B"]), None);
    assert_eq!(registry.assigned(assigned).terms().as_strings(), ["B"]);
    assert_eq!(registry.available(pool).terms().as_strings(), ["A"]);
    let events = registry.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::ControlWarning { control, .. } if control == "factors")));
}

#[test]
fn renames_keep_assignment_and_row_control_values() {
    let mut registry = ModelRegistry::new();
    let pool = registry.register_available(AvailableModel::new("available"));
    let assigned = registry.register_assigned(AssignedModel::new("assigned", pool));

    let provider = TestProvider::new(&["A", "B"]);
    registry.handle_source_event(&provider, pool, &SourceEvent::TermsReset);
    registry.assign(&provider, assigned, terms(&["B"]), None);
    registry
        .assigned_mut(assigned)
        .core_mut()
        .set_row_control_value(&Term::new("B"), "weight", serde_json::json!(2));
    registry.drain_events();

    registry.handle_source_event(
        &provider,
        pool,
        &SourceEvent::NamesChanged(vec![("B".to_string(), "dose".to_string())]),
    );

    assert_eq!(registry.assigned(assigned).terms().as_strings(), ["dose"]);
    assert!(registry
        .assigned(assigned)
        .core()
        .row_control_values(&Term::new("dose"))
        .is_some());
    let events = registry.drain_events();
    assert!(events.contains(&EngineEvent::BoundValueChanged {
        control: "assigned".to_string()
    }));
}

proptest! {
    /// With move semantics, the visible pool and the assigned set
    /// always partition the source variables.
    #[test]
    fn pool_and_assignment_partition_the_source(
        names in proptest::collection::btree_set("[a-h]", 1..8),
        picks in proptest::collection::vec(0usize..8, 0..12),
    ) {
        let names: Vec<String> = names.into_iter().collect();
        let provider = TestProvider {
            names: names.clone(),
            types: BTreeMap::new(),
        };

        let mut registry = ModelRegistry::new();
        let pool = registry.register_available(AvailableModel::new("available"));
        let assigned = registry.register_assigned(AssignedModel::new("assigned", pool));
        registry.handle_source_event(&provider, pool, &SourceEvent::TermsReset);

        for pick in picks {
            let name = &names[pick % names.len()];
            if registry.assigned(assigned).terms().contains(&Term::new(name.clone())) {
                registry.unassign(assigned, &[name.as_str()].into_iter().collect());
            } else {
                registry.assign(&provider, assigned, [name.as_str()].into_iter().collect(), None);
            }
        }

        let mut union: Vec<String> = registry.available(pool).terms().as_strings();
        let held = registry.assigned(assigned).terms().as_strings();
        for name in &held {
            prop_assert!(!union.contains(name));
        }
        union.extend(held);
        union.sort();
        prop_assert_eq!(union, names);
    }
}
