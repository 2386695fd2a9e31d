//! Per-object state history.
//!
//! Every tracked object (package or variable) owns one [`StateHistory`]: a
//! newest-first list of versioned states, each stamped with the nesting
//! level that created it and a validity flag. The list obeys three rules:
//!
//! - at most one entry per nesting level, levels strictly decreasing from
//!   the head down
//! - entries are added only by [`StateHistory::push_version`]
//! - entries are removed only by [`StateHistory::drop_superseded`] (commit)
//!   or [`StateHistory::discard_head`] (abort), never reordered
//!
//! A `VecDeque` keeps head access and both removal points O(1). An empty
//! history on access is a broken invariant, not a recoverable condition, so
//! accessors panic.

use satchel_core::Level;
use std::collections::VecDeque;

/// One versioned state of a package or variable.
#[derive(Debug, Clone, PartialEq)]
pub struct StateEntry<P> {
    /// Nesting level this state belongs to.
    pub level: Level,
    /// Whether the object is live in this state. Removal marks the head
    /// invalid instead of deleting anything.
    pub valid: bool,
    /// The versioned payload. `()` for packages, whose state is validity
    /// alone.
    pub payload: P,
}

/// Newest-first chain of [`StateEntry`] values.
#[derive(Debug, Clone, PartialEq)]
pub struct StateHistory<P> {
    entries: VecDeque<StateEntry<P>>,
}

impl<P: Clone> StateHistory<P> {
    /// History with a single live state at the given level.
    pub fn with_initial(level: Level, payload: P) -> Self {
        let mut entries = VecDeque::with_capacity(2);
        entries.push_front(StateEntry {
            level,
            valid: true,
            payload,
        });
        StateHistory { entries }
    }

    /// Number of retained states.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True once every state has been discarded; the object no longer
    /// existed before the aborted level and must be destroyed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current state.
    ///
    /// # Panics
    ///
    /// Panics if the history is empty; callers must destroy an object the
    /// moment its history empties.
    pub fn head(&self) -> &StateEntry<P> {
        self.entries.front().expect("state history is empty")
    }

    /// Current state, mutable.
    ///
    /// # Panics
    ///
    /// Panics if the history is empty.
    pub fn head_mut(&mut self) -> &mut StateEntry<P> {
        self.entries.front_mut().expect("state history is empty")
    }

    /// Level stamp of the entry below the head, if one exists.
    pub fn second_level(&self) -> Option<Level> {
        self.entries.get(1).map(|entry| entry.level)
    }

    /// Iterate all retained states, newest first.
    pub fn states(&self) -> impl Iterator<Item = &StateEntry<P>> {
        self.entries.iter()
    }

    /// Push a deep copy of the head as the new current state, stamped with
    /// `level`. The copy inherits the head's validity.
    ///
    /// Callers must only invoke this when the head is stamped with a
    /// different level, preserving the one-entry-per-level rule.
    pub fn push_version(&mut self, level: Level) {
        let head = self.head();
        debug_assert_ne!(head.level, level, "duplicate version for one level");
        let copy = StateEntry {
            level,
            valid: head.valid,
            payload: head.payload.clone(),
        };
        self.entries.push_front(copy);
    }

    /// Drop the superseded entry directly below the head (commit path).
    /// Returns the removed entry, or `None` when the head is the only state.
    pub fn drop_superseded(&mut self) -> Option<StateEntry<P>> {
        if self.entries.len() > 1 {
            self.entries.remove(1)
        } else {
            None
        }
    }

    /// Discard the head, reinstating the previous entry as current (abort
    /// path). Returns the discarded entry.
    ///
    /// # Panics
    ///
    /// Panics if the history is empty.
    pub fn discard_head(&mut self) -> StateEntry<P> {
        self.entries.pop_front().expect("state history is empty")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_valid_head() {
        let history = StateHistory::with_initial(0, 7u32);
        assert_eq!(history.len(), 1);
        assert!(history.head().valid);
        assert_eq!(history.head().level, 0);
        assert_eq!(history.head().payload, 7);
        assert_eq!(history.second_level(), None);
    }

    #[test]
    fn push_version_copies_head() {
        let mut history = StateHistory::with_initial(0, vec![1, 2]);
        history.push_version(2);
        assert_eq!(history.len(), 2);
        assert_eq!(history.head().level, 2);
        assert_eq!(history.head().payload, vec![1, 2]);
        assert_eq!(history.second_level(), Some(0));

        // Mutating the head leaves the saved copy untouched.
        history.head_mut().payload.push(3);
        assert_eq!(history.len(), 2);
        history.discard_head();
        assert_eq!(history.head().payload, vec![1, 2]);
    }

    #[test]
    fn push_version_inherits_validity() {
        let mut history = StateHistory::with_initial(0, ());
        history.head_mut().valid = false;
        history.push_version(1);
        assert!(!history.head().valid);
    }

    #[test]
    fn drop_superseded_removes_second_entry_only() {
        let mut history = StateHistory::with_initial(0, 1u32);
        history.push_version(1);
        history.head_mut().payload = 10;
        history.push_version(2);
        history.head_mut().payload = 20;

        let dropped = history.drop_superseded().unwrap();
        assert_eq!(dropped.level, 1);
        assert_eq!(dropped.payload, 10);
        assert_eq!(history.head().payload, 20);
        assert_eq!(history.second_level(), Some(0));
    }

    #[test]
    fn drop_superseded_on_sole_entry_is_none() {
        let mut history = StateHistory::with_initial(0, ());
        assert!(history.drop_superseded().is_none());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn discard_head_reinstates_previous() {
        let mut history = StateHistory::with_initial(0, 1u32);
        history.push_version(1);
        history.head_mut().payload = 99;

        let discarded = history.discard_head();
        assert_eq!(discarded.payload, 99);
        assert_eq!(history.head().payload, 1);
        assert_eq!(history.head().level, 0);
    }

    #[test]
    fn discarding_sole_entry_empties_history() {
        let mut history = StateHistory::with_initial(3, ());
        history.discard_head();
        assert!(history.is_empty());
    }

    #[test]
    #[should_panic(expected = "state history is empty")]
    fn head_on_empty_history_panics() {
        let mut history = StateHistory::with_initial(0, ());
        history.discard_head();
        let _ = history.head();
    }
}
