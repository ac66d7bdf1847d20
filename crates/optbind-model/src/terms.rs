//! Ordered, de-duplicated collections of [`Term`] values.
//!
//! A `Terms` may carry a *sort ranking*: a snapshot of the component
//! ordering of another `Terms` instance (typically the available pool
//! it was drawn from). The ranking is consulted only for ordering, so
//! that variables keep a stable, predictable order instead of an
//! alphabetic one. Taking a snapshot rather than a live reference
//! keeps the relation non-owning; callers refresh it before sorting.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BindError, Result};
use crate::term::Term;

/// How `combine_terms` derives interaction terms from an input set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombinationType {
    /// No derivation, the input set is returned as-is.
    NoCombination,
    /// Full factorial: every non-degenerate combination of the input
    /// terms, main effects included.
    Cross,
    /// Only the single highest-order interaction of all input terms.
    Interaction,
    By2Way,
    By3Way,
    By4Way,
    By5Way,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Terms {
    terms: Vec<Term>,
    /// Component ordering used for ranked comparisons; `None` means
    /// insertion order is authoritative.
    #[serde(skip)]
    ranking: Option<Vec<String>>,
    #[serde(skip)]
    has_duplicate: bool,
}

impl Terms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the component order of `parent` for ranked sorting.
    pub fn set_sort_ranking(&mut self, parent: &Terms) {
        let mut components = Vec::new();
        for term in &parent.terms {
            for component in term.components() {
                if !components.iter().any(|c| c == component) {
                    components.push(component.clone());
                }
            }
        }
        self.ranking = Some(components);
    }

    pub fn clear_sort_ranking(&mut self) {
        self.ranking = None;
    }

    pub fn has_duplicate(&self) -> bool {
        self.has_duplicate
    }

    /// Replace the whole collection. With `unique` set, duplicate
    /// entries collapse silently; otherwise they are kept and
    /// `has_duplicate` records that they were seen.
    pub fn set<I, T>(&mut self, items: I, unique: bool)
    where
        I: IntoIterator<Item = T>,
        T: Into<Term>,
    {
        self.terms.clear();
        self.has_duplicate = false;
        for item in items {
            let term = item.into();
            if unique {
                self.add(term);
            } else {
                self.add_allowing_duplicates(term);
            }
        }
    }

    /// Append a term; inserting an already-present term is a no-op.
    pub fn add(&mut self, term: Term) {
        if term.is_empty() || self.terms.contains(&term) {
            return;
        }
        self.terms.push(term);
    }

    pub fn add_allowing_duplicates(&mut self, term: Term) {
        if term.is_empty() {
            return;
        }
        if self.terms.contains(&term) {
            self.has_duplicate = true;
        }
        self.terms.push(term);
    }

    pub fn add_terms(&mut self, other: &Terms) {
        for term in &other.terms {
            self.add(term.clone());
        }
    }

    pub fn insert(&mut self, index: usize, term: Term) {
        if term.is_empty() || self.terms.contains(&term) {
            return;
        }
        let index = index.min(self.terms.len());
        self.terms.insert(index, term);
    }

    pub fn insert_terms(&mut self, index: usize, other: &Terms) {
        let mut index = index.min(self.terms.len());
        for term in &other.terms {
            if !self.terms.contains(term) {
                self.terms.insert(index, term.clone());
                index += 1;
            }
        }
    }

    pub fn remove(&mut self, term: &Term) {
        self.terms.retain(|t| t != term);
    }

    pub fn remove_terms(&mut self, other: &Terms) {
        self.terms.retain(|t| !other.contains(t));
    }

    pub fn remove_at(&mut self, pos: usize, n: usize) {
        let end = (pos + n).min(self.terms.len());
        if pos < end {
            self.terms.drain(pos..end);
        }
    }

    pub fn replace(&mut self, pos: usize, term: Term) {
        if pos < self.terms.len() && !term.is_empty() {
            self.terms[pos] = term;
        }
    }

    pub fn clear(&mut self) {
        self.terms.clear();
        self.has_duplicate = false;
    }

    /// Keep only terms that contain at least one of the given
    /// components. Returns true if anything was removed.
    pub fn discard_without_components(&mut self, components: &Terms) -> bool {
        let before = self.terms.len();
        self.terms.retain(|t| {
            components
                .terms
                .iter()
                .flat_map(|c| c.components())
                .any(|c| t.contains(c))
        });
        self.terms.len() != before
    }

    /// Remove every term that contains any of the given components.
    pub fn discard_with_components(&mut self, components: &Terms) -> bool {
        let before = self.terms.len();
        self.terms.retain(|t| {
            !components
                .terms
                .iter()
                .flat_map(|c| c.components())
                .any(|c| t.contains(c))
        });
        self.terms.len() != before
    }

    /// Remove every term that contains one of the given terms as a
    /// sub-combination (all of its components).
    pub fn discard_with_terms(&mut self, other: &Terms) -> bool {
        let before = self.terms.len();
        self.terms
            .retain(|t| !other.terms.iter().any(|o| t.contains_all_of(o)));
        self.terms.len() != before
    }

    /// Keep only terms present in `keep`; everything else moves into
    /// `discarded`. Returns true if anything was removed.
    pub fn retain_terms(&mut self, keep: &Terms, discarded: &mut Terms) -> bool {
        let before = self.terms.len();
        let mut kept = Vec::with_capacity(self.terms.len());
        for term in self.terms.drain(..) {
            if keep.contains(&term) {
                kept.push(term);
            } else {
                discarded.add(term);
            }
        }
        self.terms = kept;
        self.terms.len() != before
    }

    /// Rename a variable inside every term that uses it. Returns the
    /// indexes of the terms that changed.
    pub fn replace_variable_name(&mut self, old_name: &str, new_name: &str) -> BTreeSet<usize> {
        let mut changed = BTreeSet::new();
        for (index, term) in self.terms.iter_mut().enumerate() {
            if term.replace_component(old_name, new_name) {
                changed.insert(index);
            }
        }
        changed
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<&Term> {
        self.terms.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Term> {
        self.terms.iter()
    }

    pub fn as_slice(&self) -> &[Term] {
        &self.terms
    }

    pub fn contains(&self, term: &Term) -> bool {
        self.terms.contains(term)
    }

    pub fn contains_component(&self, component: &str) -> bool {
        self.terms.iter().any(|t| t.contains(component))
    }

    pub fn index_of(&self, term: &Term) -> Option<usize> {
        self.terms.iter().position(|t| t == term)
    }

    pub fn index_of_component(&self, component: &str) -> Option<usize> {
        self.terms.iter().position(|t| t.contains(component))
    }

    pub fn as_strings(&self) -> Vec<String> {
        self.terms.iter().map(Term::as_string).collect()
    }

    pub fn as_component_vectors(&self) -> Vec<Vec<String>> {
        self.terms.iter().map(|t| t.components().to_vec()).collect()
    }

    // --- ranked ordering -------------------------------------------------

    /// Sort the collection by the current ranking (insertion order of
    /// the ranking's parent), main effects first.
    pub fn sort(&mut self) {
        let ranking = self.ranking.as_deref();
        self.terms.sort_by(|a, b| compare_terms(ranking, a, b));
    }

    /// Reorder the components inside a term by rank.
    pub fn sort_components(&self, term: &Term) -> Term {
        let ranking = self.ranking.as_deref();
        let mut components = term.components().to_vec();
        components.sort_by(|a, b| compare_components(ranking, a, b));
        Term::from_components(components)
    }

    /// Returns a copy sorted by the given parent's component order.
    pub fn sorted_by(&self, parent: &Terms) -> Terms {
        let mut result = self.clone();
        result.set_sort_ranking(parent);
        result.sort();
        result
    }

    // --- combinatorics ---------------------------------------------------

    /// All terms of exactly `ways` components drawable from this set,
    /// without repetition. Input terms are visited in rank order so the
    /// output is deterministic for identical inputs regardless of
    /// insertion order.
    pub fn way_combinations(&self, ways: usize) -> Terms {
        let mut result = Terms::new();
        if ways == 0 || self.terms.is_empty() {
            return result;
        }

        let mut atoms = self.clone();
        if self.ranking.is_some() {
            atoms.sort();
        }

        let n = atoms.terms.len();
        if ways > n {
            return result;
        }

        let mut picks = vec![0usize; ways];
        combine_rec(&atoms.terms, ways, 0, &mut picks, 0, &mut result);
        result
    }

    /// Full factorial of the set: every non-degenerate combination of
    /// its terms, main effects first, ordered by combination size.
    pub fn cross_combinations(&self) -> Terms {
        let mut result = Terms::new();
        for size in 1..=self.terms.len() {
            result.add_terms(&self.way_combinations(size));
        }
        result
    }

    /// Complement towards a full factorial: this set's terms plus the
    /// cross of each of them with each term of `other`, skipping
    /// degenerate pairs that share a component.
    pub fn ff_combinations(&self, other: &Terms) -> Terms {
        let mut result = Terms::new();
        result.add_terms(self);
        for a in &self.terms {
            for b in &other.terms {
                if !a.shares_component_with(b) {
                    result.add(a.concatenated(b));
                }
            }
        }
        result
    }

    /// Dispatch to the matching generator. Deterministic: identical
    /// inputs always give an identical ordered output. An empty input
    /// yields an empty result.
    pub fn combine_terms(&self, combination: CombinationType) -> Terms {
        match combination {
            CombinationType::NoCombination => self.clone(),
            CombinationType::Cross => self.cross_combinations(),
            CombinationType::Interaction => self.way_combinations(self.terms.len()),
            CombinationType::By2Way => self.way_combinations(2),
            CombinationType::By3Way => self.way_combinations(3),
            CombinationType::By4Way => self.way_combinations(4),
            CombinationType::By5Way => self.way_combinations(5),
        }
    }

    // --- JSON ------------------------------------------------------------

    /// Encode as a JSON array. Single-component terms become plain
    /// strings, interactions become arrays of components.
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.terms
                .iter()
                .map(|t| {
                    if t.is_interaction() {
                        Value::Array(
                            t.components()
                                .iter()
                                .map(|c| Value::String(c.clone()))
                                .collect(),
                        )
                    } else {
                        Value::String(t.as_string())
                    }
                })
                .collect(),
        )
    }

    /// Decode from a JSON array of strings and/or arrays of strings.
    pub fn from_json(value: &Value) -> Result<Terms> {
        let Value::Array(items) = value else {
            return Err(BindError::Binding {
                control: String::new(),
                reason: "expected an array of terms".to_string(),
            });
        };
        let mut terms = Terms::new();
        for item in items {
            match item {
                Value::String(s) => terms.add(Term::new(s.clone())),
                Value::Array(components) => {
                    let mut parts = Vec::with_capacity(components.len());
                    for component in components {
                        let Value::String(s) = component else {
                            return Err(BindError::Binding {
                                control: String::new(),
                                reason: "term component is not a string".to_string(),
                            });
                        };
                        parts.push(s.clone());
                    }
                    terms.add(Term::from_components(parts));
                }
                other => {
                    return Err(BindError::Binding {
                        control: String::new(),
                        reason: format!("unexpected term encoding: {other}"),
                    });
                }
            }
        }
        Ok(terms)
    }
}

fn rank_of(ranking: Option<&[String]>, component: &str) -> Option<usize> {
    ranking.and_then(|ranking| ranking.iter().position(|c| c == component))
}

fn compare_components(ranking: Option<&[String]>, a: &str, b: &str) -> Ordering {
    match (rank_of(ranking, a), rank_of(ranking, b)) {
        (Some(ra), Some(rb)) => ra.cmp(&rb),
        // Ranked components sort before unranked ones.
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

fn compare_terms(ranking: Option<&[String]>, a: &Term, b: &Term) -> Ordering {
    // Main effects before interactions, then rank-wise.
    match a.len().cmp(&b.len()) {
        Ordering::Equal => {}
        other => return other,
    }
    for (ca, cb) in a.components().iter().zip(b.components()) {
        match compare_components(ranking, ca, cb) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

fn combine_rec(
    atoms: &[Term],
    ways: usize,
    depth: usize,
    picks: &mut [usize],
    start: usize,
    out: &mut Terms,
) {
    if depth == ways {
        let mut combined = atoms[picks[0]].clone();
        for &pick in &picks[1..] {
            combined = combined.concatenated(&atoms[pick]);
        }
        out.add(combined);
        return;
    }
    for i in start..atoms.len() {
        // Skip degenerate combinations sharing a component.
        if picks[..depth]
            .iter()
            .any(|&p| atoms[p].shares_component_with(&atoms[i]))
        {
            continue;
        }
        picks[depth] = i;
        combine_rec(atoms, ways, depth + 1, picks, i + 1, out);
    }
}

impl PartialEq for Terms {
    fn eq(&self, other: &Self) -> bool {
        self.terms == other.terms
    }
}

impl Eq for Terms {}

impl fmt::Display for Terms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_strings().join(", "))
    }
}

impl<'a> IntoIterator for &'a Terms {
    type Item = &'a Term;
    type IntoIter = std::slice::Iter<'a, Term>;

    fn into_iter(self) -> Self::IntoIter {
        self.terms.iter()
    }
}

impl<T: Into<Term>> FromIterator<T> for Terms {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut terms = Terms::new();
        for item in iter {
            terms.add(item.into());
        }
        terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(names: &[&str]) -> Terms {
        names.iter().copied().collect()
    }

    #[test]
    fn add_is_a_no_op_for_duplicates() {
        let mut t = terms(&["A", "B"]);
        t.add(Term::new("A"));
        assert_eq!(t.len(), 2);
        assert!(!t.has_duplicate());
    }

    #[test]
    fn add_allowing_duplicates_records_the_duplicate() {
        let mut t = terms(&["A"]);
        t.add_allowing_duplicates(Term::new("A"));
        assert_eq!(t.len(), 2);
        assert!(t.has_duplicate());
    }

    #[test]
    fn ranked_sort_follows_parent_order_not_alphabet() {
        let parent = terms(&["C", "A", "B"]);
        let mut t = terms(&["A", "B", "C"]);
        t.set_sort_ranking(&parent);
        t.sort();
        assert_eq!(t.as_strings(), ["C", "A", "B"]);
    }

    #[test]
    fn interactions_sort_after_main_effects() {
        let parent = terms(&["A", "B", "C"]);
        let mut t = Terms::new();
        t.add(Term::from_components(vec!["B", "C"]));
        t.add(Term::new("B"));
        t.add(Term::from_components(vec!["A", "C"]));
        t.add(Term::new("A"));
        t.set_sort_ranking(&parent);
        t.sort();
        assert_eq!(t.as_strings(), ["A", "B", "A:C", "B:C"]);
    }

    #[test]
    fn way_combinations_of_three() {
        let t = terms(&["A", "B", "C"]);
        let pairs = t.way_combinations(2);
        assert_eq!(pairs.as_strings(), ["A:B", "A:C", "B:C"]);
    }

    #[test]
    fn way_combinations_skip_shared_components() {
        let mut t = Terms::new();
        t.add(Term::from_components(vec!["A", "B"]));
        t.add(Term::new("B"));
        t.add(Term::new("C"));
        let pairs = t.way_combinations(2);
        assert_eq!(pairs.as_strings(), ["A:B:C", "B:C"]);
    }

    #[test]
    fn cross_combinations_are_size_ordered() {
        let t = terms(&["A", "B"]);
        assert_eq!(t.cross_combinations().as_strings(), ["A", "B", "A:B"]);
    }

    #[test]
    fn combine_terms_on_empty_input_is_empty() {
        let t = Terms::new();
        assert!(t.combine_terms(CombinationType::Cross).is_empty());
        assert!(t.combine_terms(CombinationType::By2Way).is_empty());
    }

    #[test]
    fn ff_combinations_cross_against_other_set() {
        let added = terms(&["A", "B"]);
        let existing = terms(&["C"]);
        let combined = added.ff_combinations(&existing);
        assert_eq!(combined.as_strings(), ["A", "B", "A:C", "B:C"]);
    }

    #[test]
    fn discard_with_components_drops_interactions_too() {
        let mut t = Terms::new();
        t.add(Term::new("A"));
        t.add(Term::from_components(vec!["A", "B"]));
        t.add(Term::new("B"));
        assert!(t.discard_with_components(&terms(&["A"])));
        assert_eq!(t.as_strings(), ["B"]);
    }

    #[test]
    fn retain_terms_collects_discarded() {
        let mut t = terms(&["A", "B", "C"]);
        let mut dropped = Terms::new();
        assert!(t.retain_terms(&terms(&["B"]), &mut dropped));
        assert_eq!(t.as_strings(), ["B"]);
        assert_eq!(dropped.as_strings(), ["A", "C"]);
    }

    #[test]
    fn replace_variable_name_reports_changed_indexes() {
        let mut t = Terms::new();
        t.add(Term::new("A"));
        t.add(Term::from_components(vec!["A", "B"]));
        t.add(Term::new("C"));
        let changed = t.replace_variable_name("A", "Z");
        assert_eq!(changed.into_iter().collect::<Vec<_>>(), [0, 1]);
        assert_eq!(t.as_strings(), ["Z", "Z:B", "C"]);
    }

    #[test]
    fn json_round_trip_mixes_strings_and_arrays() {
        let mut t = terms(&["A"]);
        t.add(Term::from_components(vec!["A", "B"]));
        let json = t.to_json();
        let back = Terms::from_json(&json).expect("decode terms");
        assert_eq!(back, t);
    }

    #[test]
    fn from_json_rejects_non_arrays() {
        assert!(Terms::from_json(&serde_json::json!({"not": "an array"})).is_err());
        assert!(Terms::from_json(&serde_json::json!([1, 2])).is_err());
    }
}
