//! Pending-request tokens for deferred formula validation.
//!
//! Committing a formula-typed cell suppresses the terms-changed event
//! until an external validation completes. A new edit supersedes any
//! in-flight validation for the same cell without cancelling it: the
//! stale completion is simply ignored when its token no longer
//! matches ("last request wins").

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormulaToken(pub(crate) u64);

#[derive(Debug, Default)]
pub struct FormulaTracker {
    next: u64,
    pending: std::collections::BTreeMap<(usize, usize), FormulaToken>,
}

impl FormulaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending validation for a cell, superseding any
    /// outstanding one.
    pub fn begin(&mut self, col: usize, row: usize) -> FormulaToken {
        self.next += 1;
        let token = FormulaToken(self.next);
        self.pending.insert((col, row), token);
        token
    }

    /// Resolve a completion. Returns true when the token still matches
    /// the cell's current pending request; stale completions return
    /// false and leave the newer request pending.
    pub fn complete(&mut self, col: usize, row: usize, token: FormulaToken) -> bool {
        match self.pending.get(&(col, row)) {
            Some(current) if *current == token => {
                self.pending.remove(&(col, row));
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self, col: usize, row: usize) -> bool {
        self.pending.contains_key(&(col, row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_request_wins() {
        let mut tracker = FormulaTracker::new();
        let first = tracker.begin(0, 0);
        let second = tracker.begin(0, 0);

        assert!(!tracker.complete(0, 0, first));
        assert!(tracker.is_pending(0, 0));
        assert!(tracker.complete(0, 0, second));
        assert!(!tracker.is_pending(0, 0));
    }

    #[test]
    fn cells_track_independently() {
        let mut tracker = FormulaTracker::new();
        let a = tracker.begin(0, 0);
        let b = tracker.begin(1, 2);
        assert!(tracker.complete(1, 2, b));
        assert!(tracker.complete(0, 0, a));
    }
}
