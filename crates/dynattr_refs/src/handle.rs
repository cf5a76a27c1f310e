//! Typed handles over table slots.
//!
//! A handle owns exactly one slot for its lifetime: constructing it
//! registers the slot, releasing it tears the slot down. Handles address
//! slots by stable id and take the table and scene explicitly, so the
//! owning object stays a plain struct that embeds its `RefTable` and
//! delegates.

use crate::slot::{GroupId, NotifyCallback, Ownership, Persistence, SlotId};
use crate::table::RefTable;
use dynattr_error::{DynattrError, RefErrorKind, Result};
use dynattr_scene::{Scene, SceneTarget, TargetId};
use std::marker::PhantomData;

/// A typed reference to a single target.
///
/// Assignment validates the new value's concrete type against `T`;
/// a mismatch is a contract violation (debug assert, no-op with an error
/// in release).
pub struct RefHandle<T: SceneTarget> {
    slot: SlotId,
    group: GroupId,
    _marker: PhantomData<fn() -> T>,
}

impl<T: SceneTarget> RefHandle<T> {
    /// Register a strong, persisted reference under `group`.
    pub fn new(
        table: &mut RefTable,
        scene: &mut Scene,
        group: GroupId,
        callback: Option<NotifyCallback>,
        target: Option<TargetId>,
    ) -> Result<Self> {
        Self::with_flags(
            table,
            scene,
            group,
            callback,
            target,
            Ownership::Strong,
            Persistence::Persisted,
        )
    }

    /// Register a weak reference under `group`.
    pub fn new_weak(
        table: &mut RefTable,
        scene: &mut Scene,
        group: GroupId,
        callback: Option<NotifyCallback>,
        target: Option<TargetId>,
        persistence: Persistence,
    ) -> Result<Self> {
        Self::with_flags(
            table,
            scene,
            group,
            callback,
            target,
            Ownership::Weak,
            persistence,
        )
    }

    fn with_flags(
        table: &mut RefTable,
        scene: &mut Scene,
        group: GroupId,
        callback: Option<NotifyCallback>,
        target: Option<TargetId>,
        ownership: Ownership,
        persistence: Persistence,
    ) -> Result<Self> {
        if let Some(t) = target {
            check_type::<T>(scene, t)?;
        }
        let slot = table.register(scene, group, None, callback, target, ownership, persistence)?;
        Ok(RefHandle {
            slot,
            group,
            _marker: PhantomData,
        })
    }

    /// Used by [`RefVec`] for array membership.
    fn append_in_array(
        table: &mut RefTable,
        scene: &mut Scene,
        group: GroupId,
        target: Option<TargetId>,
        ownership: Ownership,
    ) -> Result<Self> {
        if let Some(t) = target {
            check_type::<T>(scene, t)?;
        }
        let slot = table.register(
            scene,
            group,
            None,
            None,
            target,
            ownership,
            Persistence::Persisted,
        )?;
        Ok(RefHandle {
            slot,
            group,
            _marker: PhantomData,
        })
    }

    pub fn slot_id(&self) -> SlotId {
        self.slot
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    /// The referenced target id, if any.
    pub fn get(&self, table: &RefTable) -> Option<TargetId> {
        table.slot(self.slot)?.target()
    }

    /// Typed access to the referenced target.
    pub fn target<'a>(&self, table: &RefTable, scene: &'a Scene) -> Option<&'a T> {
        scene.get_as::<T>(self.get(table)?)
    }

    pub fn target_mut<'a>(&self, table: &RefTable, scene: &'a mut Scene) -> Option<&'a mut T> {
        let id = self.get(table)?;
        scene.get_as_mut::<T>(id)
    }

    /// Assign a new target, validating its type first.
    pub fn set(
        &self,
        table: &mut RefTable,
        scene: &mut Scene,
        target: Option<TargetId>,
    ) -> Result<()> {
        if let Some(t) = target {
            check_type::<T>(scene, t)?;
        }
        table.set_by_slot(scene, self.slot, target);
        Ok(())
    }

    /// Release the slot. Consumes the handle; the slot id is dead after
    /// this.
    pub fn release(self, table: &mut RefTable, scene: &mut Scene) {
        let _ = table.release(scene, self.slot, self.group);
    }
}

fn check_type<T: SceneTarget>(scene: &Scene, target: TargetId) -> Result<()> {
    let matches = scene
        .get(target)
        .is_some_and(|n| n.as_any().downcast_ref::<T>().is_some());
    if !matches {
        debug_assert!(false, "reference assignment type mismatch for {target}");
        return Err(DynattrError::reference(
            format!("target {target} is not the handle's element type"),
            RefErrorKind::TypeMismatch,
        )
        .with_operation("set"));
    }
    Ok(())
}

/// A dynamically sized, ordered group of typed references sharing one
/// group id.
///
/// Growth appends one registration at a time and shrink releases trailing
/// slots, so the table never exposes an uninitialized element.
pub struct RefVec<T: SceneTarget> {
    group: GroupId,
    ownership: Ownership,
    handles: Vec<RefHandle<T>>,
}

impl<T: SceneTarget> RefVec<T> {
    /// Declare `group` as an array and wrap it.
    pub fn new(table: &mut RefTable, group: GroupId) -> Self {
        table.register_array(group);
        RefVec {
            group,
            ownership: Ownership::Strong,
            handles: Vec::new(),
        }
    }

    /// As [`RefVec::new`] but elements hold their targets weakly.
    pub fn new_weak(table: &mut RefTable, group: GroupId) -> Self {
        table.register_array(group);
        RefVec {
            group,
            ownership: Ownership::Weak,
            handles: Vec::new(),
        }
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Append one reference.
    pub fn push(
        &mut self,
        table: &mut RefTable,
        scene: &mut Scene,
        target: Option<TargetId>,
    ) -> Result<()> {
        let handle =
            RefHandle::append_in_array(table, scene, self.group, target, self.ownership)?;
        self.handles.push(handle);
        Ok(())
    }

    /// Grow with empty references or shrink by releasing trailing
    /// elements.
    pub fn resize(&mut self, table: &mut RefTable, scene: &mut Scene, len: usize) -> Result<()> {
        while self.handles.len() < len {
            self.push(table, scene, None)?;
        }
        while self.handles.len() > len {
            if let Some(handle) = self.handles.pop() {
                handle.release(table, scene);
            }
        }
        Ok(())
    }

    pub fn get(&self, table: &RefTable, index: usize) -> Option<TargetId> {
        self.handles.get(index)?.get(table)
    }

    pub fn set(
        &self,
        table: &mut RefTable,
        scene: &mut Scene,
        index: usize,
        target: Option<TargetId>,
    ) -> Result<()> {
        let handle = self.handles.get(index).ok_or_else(|| {
            DynattrError::reference(
                format!("array index {index} out of range"),
                RefErrorKind::InvalidIndex,
            )
            .with_operation("set")
        })?;
        handle.set(table, scene, target)
    }

    /// Typed access to one element's target.
    pub fn target<'a>(&self, table: &RefTable, scene: &'a Scene, index: usize) -> Option<&'a T> {
        self.handles.get(index)?.target(table, scene)
    }

    /// Release every element.
    pub fn clear(&mut self, table: &mut RefTable, scene: &mut Scene) {
        while let Some(handle) = self.handles.pop() {
            handle.release(table, scene);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    struct Mesh(u32);
    struct Light;

    impl SceneTarget for Mesh {
        fn type_name(&self) -> &'static str {
            "Mesh"
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
        fn clone_node(&self) -> Box<dyn SceneTarget> {
            Box::new(Mesh(self.0))
        }
    }

    impl SceneTarget for Light {
        fn type_name(&self) -> &'static str {
            "Light"
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
        fn clone_node(&self) -> Box<dyn SceneTarget> {
            Box::new(Light)
        }
    }

    #[test]
    fn test_handle_typed_access() {
        let mut scene = Scene::new();
        let mut table = RefTable::new();
        let mesh = scene.insert(Box::new(Mesh(5)));

        let h = RefHandle::<Mesh>::new(&mut table, &mut scene, 0, None, Some(mesh)).unwrap();
        assert_eq!(h.get(&table), Some(mesh));
        assert_eq!(h.target(&table, &scene).unwrap().0, 5);

        h.target_mut(&table, &mut scene).unwrap().0 = 9;
        assert_eq!(h.target(&table, &scene).unwrap().0, 9);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "type mismatch"))]
    fn test_handle_rejects_wrong_type() {
        let mut scene = Scene::new();
        let mut table = RefTable::new();
        let light = scene.insert(Box::new(Light));

        let h = RefHandle::<Mesh>::new(&mut table, &mut scene, 0, None, None).unwrap();
        let result = h.set(&mut table, &mut scene, Some(light));
        // Release builds reject with an error and leave the slot untouched.
        assert!(result.is_err());
        assert_eq!(h.get(&table), None);
    }

    #[test]
    fn test_vec_resize_grow_and_shrink() {
        let mut scene = Scene::new();
        let mut table = RefTable::new();
        let mut vec = RefVec::<Mesh>::new(&mut table, 0);

        vec.resize(&mut table, &mut scene, 3).unwrap();
        assert_eq!(vec.len(), 3);
        assert_eq!(table.num_refs(), 3);
        assert_eq!(table.array_len(0), Some(3));

        let mesh = scene.insert(Box::new(Mesh(1)));
        vec.set(&mut table, &mut scene, 1, Some(mesh)).unwrap();
        assert_eq!(vec.get(&table, 1), Some(mesh));

        vec.resize(&mut table, &mut scene, 1).unwrap();
        assert_eq!(vec.len(), 1);
        assert_eq!(table.array_len(0), Some(1));
        assert_eq!(vec.get(&table, 0), None);
        assert!(vec.get(&table, 1).is_none());
    }

    #[test]
    fn test_vec_alongside_static_handle() {
        let mut scene = Scene::new();
        let mut table = RefTable::new();
        let mesh = scene.insert(Box::new(Mesh(3)));

        let stat = RefHandle::<Mesh>::new(&mut table, &mut scene, 0, None, Some(mesh)).unwrap();
        let mut vec = RefVec::<Light>::new(&mut table, 1);
        for _ in 0..4 {
            let light = scene.insert(Box::new(Light));
            vec.push(&mut table, &mut scene, Some(light)).unwrap();
        }

        assert_eq!(table.index_of(stat.slot_id()), Some(0));
        assert_eq!(table.num_refs(), 5);

        vec.clear(&mut table, &mut scene);
        assert_eq!(table.num_refs(), 1);
        assert_eq!(stat.get(&table), Some(mesh));
    }
}
