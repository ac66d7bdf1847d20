use std::fmt;

use serde::{Deserialize, Serialize};

/// A single term: an ordered tuple of string components.
///
/// Arity 1 is a plain variable name; arity above 1 is an interaction
/// (e.g. `A:B`). Components are never empty strings; constructors drop
/// empty components silently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Term {
    components: Vec<String>,
}

impl Term {
    pub fn new(component: impl Into<String>) -> Self {
        Self::from_components(vec![component.into()])
    }

    pub fn from_components<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let components = components
            .into_iter()
            .map(Into::into)
            .filter(|c: &String| !c.is_empty())
            .collect();
        Self { components }
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn is_interaction(&self) -> bool {
        self.components.len() > 1
    }

    pub fn contains(&self, component: &str) -> bool {
        self.components.iter().any(|c| c == component)
    }

    /// Rename every matching component. Returns true if anything changed.
    pub fn replace_component(&mut self, old_name: &str, new_name: &str) -> bool {
        let mut changed = false;
        for component in &mut self.components {
            if component == old_name {
                *component = new_name.to_string();
                changed = true;
            }
        }
        changed
    }

    /// Concatenate the components of two terms into a new one.
    pub fn concatenated(&self, other: &Term) -> Term {
        let mut components = self.components.clone();
        components.extend(other.components.iter().cloned());
        Term { components }
    }

    /// True if the two terms have at least one component in common.
    pub fn shares_component_with(&self, other: &Term) -> bool {
        self.components.iter().any(|c| other.contains(c))
    }

    /// True if every component of `other` also appears in this term.
    pub fn contains_all_of(&self, other: &Term) -> bool {
        other.components.iter().all(|c| self.contains(c))
    }

    pub fn as_string(&self) -> String {
        self.components.join(":")
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<&str> for Term {
    fn from(value: &str) -> Self {
        Term::new(value)
    }
}

impl From<String> for Term {
    fn from(value: String) -> Self {
        Term::new(value)
    }
}

impl From<Vec<String>> for Term {
    fn from(value: Vec<String>) -> Self {
        Term::from_components(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_components_are_dropped() {
        let term = Term::from_components(vec!["A", "", "B"]);
        assert_eq!(term.components(), ["A", "B"]);
        assert!(term.is_interaction());
    }

    #[test]
    fn display_joins_with_colon() {
        let term = Term::from_components(vec!["A", "B"]);
        assert_eq!(term.to_string(), "A:B");
    }

    #[test]
    fn replace_component_renames_all_occurrences() {
        let mut term = Term::from_components(vec!["A", "B"]);
        assert!(term.replace_component("A", "Z"));
        assert!(!term.replace_component("A", "Z"));
        assert_eq!(term.as_string(), "Z:B");
    }

    #[test]
    fn shares_component() {
        let ab = Term::from_components(vec!["A", "B"]);
        let bc = Term::from_components(vec!["B", "C"]);
        let cd = Term::from_components(vec!["C", "D"]);
        assert!(ab.shares_component_with(&bc));
        assert!(!ab.shares_component_with(&cd));
    }
}
