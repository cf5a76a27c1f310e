//! Memoized deep-clone service used when duplicating dependent objects.

use crate::scene::Scene;
use crate::target::TargetId;
use ahash::AHashMap;
use log::trace;

/// Tracks originals already cloned during one duplication pass so shared
/// targets are cloned exactly once and every reference to the same original
/// resolves to the same copy.
#[derive(Default)]
pub struct RemapContext {
    mapping: AHashMap<TargetId, TargetId>,
}

impl RemapContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone `id` into the scene, or return the copy made earlier in this
    /// pass. `None` when the original no longer exists.
    pub fn clone_ref(&mut self, scene: &mut Scene, id: TargetId) -> Option<TargetId> {
        if let Some(mapped) = self.mapping.get(&id) {
            return Some(*mapped);
        }
        let cloned = scene.get(id)?.clone_node();
        let new_id = scene.insert(cloned);
        trace!("remap: {id} -> {new_id}");
        self.mapping.insert(id, new_id);
        Some(new_id)
    }

    /// The copy previously made for `id`, if any.
    pub fn find(&self, id: TargetId) -> Option<TargetId> {
        self.mapping.get(&id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::SceneTarget;
    use std::any::Any;

    struct Node(u32);

    impl SceneTarget for Node {
        fn type_name(&self) -> &'static str {
            "Node"
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
        fn clone_node(&self) -> Box<dyn SceneTarget> {
            Box::new(Node(self.0))
        }
    }

    #[test]
    fn test_clone_is_memoized() {
        let mut scene = Scene::new();
        let mut remap = RemapContext::new();
        let id = scene.insert(Box::new(Node(7)));

        let first = remap.clone_ref(&mut scene, id).unwrap();
        let second = remap.clone_ref(&mut scene, id).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, id);
        assert_eq!(scene.get_as::<Node>(first).unwrap().0, 7);
    }

    #[test]
    fn test_clone_missing_target() {
        let mut scene = Scene::new();
        let mut remap = RemapContext::new();
        assert!(remap.clone_ref(&mut scene, TargetId(42)).is_none());
    }
}
