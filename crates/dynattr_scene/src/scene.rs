//! The scene arena: ownership, dependent counting, and enumeration.

use crate::target::{SceneTarget, TargetId};
use ahash::AHashMap;
use log::{debug, trace};

struct TargetEntry {
    node: Box<dyn SceneTarget>,
    /// Number of strong reference slots currently pointing at this target.
    strong_count: u32,
    /// While non-zero the target survives a zero dependent count.
    lock_count: u32,
}

/// Arena owning every live target in a document.
///
/// All mutation happens on the controlling thread; lifetime rules are the
/// dependency-count model: a target whose last strong dependent goes away
/// is deleted automatically unless locked. Deletion never leaves dangling
/// ids — a stale [`TargetId`] simply stops resolving.
#[derive(Default)]
pub struct Scene {
    entries: AHashMap<u64, TargetEntry>,
    next_id: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a target, returning its id.
    pub fn insert(&mut self, node: Box<dyn SceneTarget>) -> TargetId {
        let id = TargetId(self.next_id);
        self.next_id += 1;
        trace!("scene: insert {} {}", node.type_name(), id);
        self.entries.insert(
            id.0,
            TargetEntry {
                node,
                strong_count: 0,
                lock_count: 0,
            },
        );
        id
    }

    pub fn contains(&self, id: TargetId) -> bool {
        self.entries.contains_key(&id.0)
    }

    pub fn get(&self, id: TargetId) -> Option<&dyn SceneTarget> {
        self.entries.get(&id.0).map(|e| e.node.as_ref())
    }

    pub fn get_mut(&mut self, id: TargetId) -> Option<&mut dyn SceneTarget> {
        self.entries.get_mut(&id.0).map(|e| e.node.as_mut())
    }

    /// Typed accessor; `None` when the id is stale or the type differs.
    pub fn get_as<T: SceneTarget>(&self, id: TargetId) -> Option<&T> {
        self.get(id).and_then(|n| n.as_any().downcast_ref::<T>())
    }

    pub fn get_as_mut<T: SceneTarget>(&mut self, id: TargetId) -> Option<&mut T> {
        self.get_mut(id)
            .and_then(|n| n.as_any_mut().downcast_mut::<T>())
    }

    /// Record a new strong dependent of `id`.
    pub fn add_ref(&mut self, id: TargetId) {
        match self.entries.get_mut(&id.0) {
            Some(entry) => entry.strong_count += 1,
            None => debug_assert!(false, "add_ref on unknown target {id}"),
        }
    }

    /// Release one strong dependent of `id`.
    ///
    /// Returns `true` when this release deleted the target (last dependent
    /// gone and the target not locked).
    pub fn release_ref(&mut self, id: TargetId) -> bool {
        let Some(entry) = self.entries.get_mut(&id.0) else {
            // A dependent may release after the target was deleted out from
            // under it; that is the deletion race, not an error.
            return false;
        };
        debug_assert!(entry.strong_count > 0, "release_ref underflow on {id}");
        entry.strong_count = entry.strong_count.saturating_sub(1);
        self.maybe_auto_delete(id)
    }

    /// Pin `id` so it survives a zero dependent count.
    pub fn lock(&mut self, id: TargetId) {
        match self.entries.get_mut(&id.0) {
            Some(entry) => entry.lock_count += 1,
            None => debug_assert!(false, "lock on unknown target {id}"),
        }
    }

    /// Drop one pin; returns `true` when the unlock deleted the target.
    pub fn unlock(&mut self, id: TargetId) -> bool {
        let Some(entry) = self.entries.get_mut(&id.0) else {
            return false;
        };
        debug_assert!(entry.lock_count > 0, "unlock underflow on {id}");
        entry.lock_count = entry.lock_count.saturating_sub(1);
        self.maybe_auto_delete(id)
    }

    fn maybe_auto_delete(&mut self, id: TargetId) -> bool {
        let Some(entry) = self.entries.get(&id.0) else {
            return false;
        };
        if entry.strong_count == 0 && entry.lock_count == 0 {
            debug!("scene: auto-delete {} {}", entry.node.type_name(), id);
            self.entries.remove(&id.0);
            return true;
        }
        false
    }

    /// Remove a target unconditionally. Returns whether it existed.
    ///
    /// Dependents are not informed here; the embedding delivers a
    /// target-deleted notification to its reference tables.
    pub fn delete(&mut self, id: TargetId) -> bool {
        match self.entries.remove(&id.0) {
            Some(entry) => {
                debug!("scene: delete {} {}", entry.node.type_name(), id);
                true
            }
            None => false,
        }
    }

    /// Walk every live target. The callback returns `false` to stop early;
    /// the method reports whether the walk ran to completion.
    pub fn enumerate(&self, f: &mut dyn FnMut(TargetId, &dyn SceneTarget) -> bool) -> bool {
        for (raw, entry) in &self.entries {
            if !f(TargetId(*raw), entry.node.as_ref()) {
                return false;
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    struct Probe(&'static str);

    impl SceneTarget for Probe {
        fn type_name(&self) -> &'static str {
            "Probe"
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
        fn clone_node(&self) -> Box<dyn SceneTarget> {
            Box::new(Probe(self.0))
        }
    }

    #[test]
    fn test_insert_and_typed_access() {
        let mut scene = Scene::new();
        let id = scene.insert(Box::new(Probe("a")));

        assert!(scene.contains(id));
        assert_eq!(scene.get_as::<Probe>(id).unwrap().0, "a");
        assert!(scene.get_as::<Probe>(TargetId(99)).is_none());
    }

    #[test]
    fn test_auto_delete_on_last_release() {
        let mut scene = Scene::new();
        let id = scene.insert(Box::new(Probe("a")));

        scene.add_ref(id);
        scene.add_ref(id);
        assert!(!scene.release_ref(id));
        assert!(scene.release_ref(id));
        assert!(!scene.contains(id));
    }

    #[test]
    fn test_lock_defers_auto_delete() {
        let mut scene = Scene::new();
        let id = scene.insert(Box::new(Probe("a")));

        scene.add_ref(id);
        scene.lock(id);
        assert!(!scene.release_ref(id));
        assert!(scene.contains(id));
        assert!(scene.unlock(id));
        assert!(!scene.contains(id));
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut scene = Scene::new();
        let a = scene.insert(Box::new(Probe("a")));
        scene.delete(a);
        let b = scene.insert(Box::new(Probe("b")));
        assert_ne!(a, b);
        assert!(!scene.contains(a));
    }

    #[test]
    fn test_enumerate_early_stop() {
        let mut scene = Scene::new();
        for _ in 0..4 {
            scene.insert(Box::new(Probe("x")));
        }

        let mut seen = 0;
        let completed = scene.enumerate(&mut |_, _| {
            seen += 1;
            seen < 2
        });
        assert!(!completed);
        assert_eq!(seen, 2);
    }
}
