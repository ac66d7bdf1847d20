//! Interaction term derivation layered on an assigned model.
//!
//! Incoming terms are classified into four disjoint buckets by the
//! source's per-term tag; the displayed term set is re-assembled from
//! the buckets plus the freely built interaction terms.

use std::collections::BTreeMap;

use optbind_model::{Term, Terms};

pub const ITEM_TYPE_FIXED_FACTORS: &str = "fixedFactors";
pub const ITEM_TYPE_RANDOM_FACTORS: &str = "randomFactors";
pub const ITEM_TYPE_COVARIATES: &str = "covariates";

#[derive(Debug, Clone, Default)]
pub struct InteractionState {
    fixed_factors: Terms,
    random_factors: Terms,
    covariates: Terms,
    /// Free interaction terms, main effects included once assembled.
    interaction_terms: Terms,
    /// Cross new factors against the existing terms when they arrive
    /// through a source reset.
    add_interactions_by_default: bool,
}

impl InteractionState {
    pub fn new(add_interactions_by_default: bool) -> Self {
        Self {
            add_interactions_by_default,
            ..Self::default()
        }
    }

    pub fn add_interactions_by_default(&self) -> bool {
        self.add_interactions_by_default
    }

    pub fn fixed_factors(&self) -> &Terms {
        &self.fixed_factors
    }

    pub fn random_factors(&self) -> &Terms {
        &self.random_factors
    }

    pub fn covariates(&self) -> &Terms {
        &self.covariates
    }

    pub fn interaction_terms(&self) -> &Terms {
        &self.interaction_terms
    }

    pub fn clear(&mut self) {
        self.fixed_factors.clear();
        self.random_factors.clear();
        self.covariates.clear();
        self.interaction_terms.clear();
    }

    /// The displayed term set: every bucket merged in insertion order.
    pub fn assembled_terms(&self) -> Terms {
        let mut result = Terms::new();
        result.add_terms(&self.fixed_factors);
        result.add_terms(&self.random_factors);
        result.add_terms(&self.covariates);
        result.add_terms(&self.interaction_terms);
        result
    }

    /// Main effects only, for "noInteraction" filtered sources.
    pub fn main_effects(&self) -> Terms {
        let mut result = Terms::new();
        result.add_terms(&self.fixed_factors);
        result.add_terms(&self.random_factors);
        result.add_terms(&self.covariates);
        result
    }

    /// Classify `terms` into buckets via the source's item-type tags
    /// and merge them in. With `combine` set, each new term is also
    /// crossed against the terms already present (full factorial
    /// expansion against the existing set).
    pub fn classify_and_add(
        &mut self,
        terms: &Terms,
        combine: bool,
        item_types: &BTreeMap<String, String>,
    ) {
        let existing = self.assembled_terms();

        let mut incoming = Terms::new();
        for term in terms {
            let tag = item_types.get(&term.as_string()).map(String::as_str);
            let bucket = match tag {
                Some(ITEM_TYPE_FIXED_FACTORS) => &mut self.fixed_factors,
                Some(ITEM_TYPE_RANDOM_FACTORS) => &mut self.random_factors,
                Some(ITEM_TYPE_COVARIATES) => &mut self.covariates,
                _ => &mut self.interaction_terms,
            };
            if !bucket.contains(term) {
                bucket.add(term.clone());
                incoming.add(term.clone());
            }
        }

        if combine && !incoming.is_empty() {
            let crossed = incoming.ff_combinations(&existing);
            for term in &crossed {
                if term.is_interaction() && !self.interaction_terms.contains(term) {
                    self.interaction_terms.add(term.clone());
                }
            }
        }
    }

    /// Remove the exact given terms from every bucket; sub-components
    /// of removed interactions stay untouched, but interactions built
    /// on a removed main effect fall with it.
    pub fn remove_terms(&mut self, terms: &Terms) {
        self.fixed_factors.remove_terms(terms);
        self.random_factors.remove_terms(terms);
        self.covariates.remove_terms(terms);
        self.interaction_terms.remove_terms(terms);

        // Interactions referencing a removed main effect are stale.
        let mut stale_components = Terms::new();
        for removed in terms {
            if !removed.is_interaction() {
                for component in removed.components() {
                    stale_components.add(Term::new(component.clone()));
                }
            }
        }
        if !stale_components.is_empty() {
            self.interaction_terms
                .discard_with_components(&stale_components);
        }
    }

    /// Rename components inside every bucket. Returns the whole-term
    /// renames (old display string -> new) for forwarding to models
    /// that use this one as a source.
    pub fn apply_renames(&mut self, renames: &[(String, String)]) -> Vec<(String, String)> {
        let mut term_renames = Vec::new();
        for bucket in [
            &mut self.fixed_factors,
            &mut self.random_factors,
            &mut self.covariates,
            &mut self.interaction_terms,
        ] {
            let old_strings = bucket.as_strings();
            let mut changed = std::collections::BTreeSet::new();
            for (old_name, new_name) in renames {
                changed.extend(bucket.replace_variable_name(old_name, new_name));
            }
            let new_strings = bucket.as_strings();
            for index in changed {
                term_renames.push((old_strings[index].clone(), new_strings[index].clone()));
            }
        }
        term_renames
    }
}
