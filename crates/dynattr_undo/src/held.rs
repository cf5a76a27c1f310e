//! The held-pointer registry.
//!
//! Tracks which cells (and which tab elements) are currently guarded by an
//! in-flight undo record, so the same data is never double-registered.
//! Holding twice is a programming error; the second registration request
//! is simply not made (see [`Hold::hold_value`](crate::Hold::hold_value)),
//! and a direct double `set_held` is a no-op.

use crate::cell::CellId;
use ahash::{AHashMap, AHashSet};

/// Held-address bookkeeping, owned by the hold manager.
#[derive(Default)]
pub struct HeldState {
    held: AHashSet<CellId>,
    held_tabs: AHashMap<CellId, Vec<usize>>,
}

impl HeldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, id: CellId) -> bool {
        self.held.contains(&id)
    }

    /// Mark `id` held. No-op when already held.
    pub fn set_held(&mut self, id: CellId) {
        self.held.insert(id);
    }

    /// Release a hold. Ending a hold that was never set is a programming
    /// error.
    pub fn end_hold(&mut self, id: CellId) {
        let was_held = self.held.remove(&id);
        debug_assert!(was_held, "ending hold on non-held {id}");
    }

    pub fn is_tab_held(&self, id: CellId, index: usize) -> bool {
        self.held_tabs
            .get(&id)
            .is_some_and(|indices| indices.contains(&index))
    }

    /// Mark one tab element held. No-op when the pair is already held.
    pub fn set_tab_held(&mut self, id: CellId, index: usize) {
        let indices = self.held_tabs.entry(id).or_default();
        if !indices.contains(&index) {
            indices.push(index);
        }
    }

    /// Release one tab element; the map entry goes away with its last
    /// held index.
    pub fn end_tab_hold(&mut self, id: CellId, index: usize) {
        debug_assert!(
            self.is_tab_held(id, index),
            "ending hold on non-held {id}[{index}]"
        );
        if let Some(indices) = self.held_tabs.get_mut(&id) {
            indices.retain(|&i| i != index);
            if indices.is_empty() {
                self.held_tabs.remove(&id);
            }
        }
    }

    /// Number of distinct held addresses (cells plus tabs with any held
    /// element).
    pub fn len(&self) -> usize {
        self.held.len() + self.held_tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty() && self.held_tabs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: usize) -> CellId {
        CellId(raw)
    }

    #[test]
    fn test_hold_then_end_clears() {
        let mut held = HeldState::new();
        held.set_held(id(1));
        assert!(held.is_held(id(1)));
        held.end_hold(id(1));
        assert!(!held.is_held(id(1)));
    }

    #[test]
    fn test_double_set_is_idempotent() {
        let mut held = HeldState::new();
        held.set_held(id(1));
        held.set_held(id(1));
        assert!(held.is_held(id(1)));
        // One end releases it; the double set did not stack.
        held.end_hold(id(1));
        assert!(!held.is_held(id(1)));
    }

    #[test]
    fn test_tab_entry_removed_with_last_index() {
        let mut held = HeldState::new();
        held.set_tab_held(id(1), 0);
        held.set_tab_held(id(1), 3);
        assert_eq!(held.len(), 1);

        held.end_tab_hold(id(1), 0);
        assert!(held.is_tab_held(id(1), 3));
        assert_eq!(held.len(), 1);

        held.end_tab_hold(id(1), 3);
        assert!(held.is_empty());
    }

    #[test]
    fn test_tab_and_scalar_are_separate() {
        let mut held = HeldState::new();
        held.set_held(id(1));
        held.set_tab_held(id(1), 0);
        assert!(held.is_held(id(1)));
        assert!(held.is_tab_held(id(1), 0));
        assert!(!held.is_tab_held(id(1), 1));
    }
}
