//! The per-class descriptor registry.
//!
//! Owns every descriptor a class of dynamic attributes has created, hands
//! out collision-free block ids, and persists descriptor shape. With
//! static blocks none of this would exist — compile-time descriptors never
//! change between sessions. Runtime-built descriptors must be saved so the
//! blocks loading later can find their shape again, and their ids must
//! stay unique across merges, which is what the migration path is for.

use crate::block::ParamBlock;
use crate::chunk::{
    ChunkReader, ChunkWriter, DESC_CHUNK, DESC_HDR_CHUNK, DESC_PARAM_CHUNK,
};
use crate::desc::{ClassTag, DescHandle, ParamBlockDesc};
use crate::param::{BlockId, ParamId, ParamType};
use dynattr_error::{DynattrError, PersistErrorKind, Result};
use dynattr_scene::Scene;
use log::{debug, trace, warn};
use std::io::{Read, Seek, Write};
use std::rc::Rc;

/// Registry of live descriptors for one attribute class.
pub struct DescRegistry {
    class: ClassTag,
    /// Lowest block id never handed out.
    free_block_id: u16,
    active: Vec<DescHandle>,
    /// Detached descriptors awaiting the deferred-deletion sweep.
    obsolete: Vec<DescHandle>,
}

impl DescRegistry {
    pub fn new(class: ClassTag) -> Self {
        DescRegistry {
            class,
            free_block_id: 0,
            active: Vec::new(),
            obsolete: Vec::new(),
        }
    }

    pub fn class(&self) -> ClassTag {
        self.class
    }

    pub fn num_descs(&self) -> usize {
        self.active.len()
    }

    pub fn descs(&self) -> &[DescHandle] {
        &self.active
    }

    pub fn desc_by_id(&self, id: BlockId) -> Option<DescHandle> {
        self.active
            .iter()
            .find(|d| d.borrow().id == id)
            .map(Rc::clone)
    }

    /// A block id guaranteed unused so far.
    pub fn next_free_id(&mut self) -> BlockId {
        let id = BlockId(self.free_block_id);
        self.free_block_id = self.free_block_id.wrapping_add(1);
        id
    }

    /// Reserve `id`. Any live block in the scene whose descriptor already
    /// carries it is migrated to a fresh free id — the requested id must
    /// be free on return, because saved block data resolves descriptors by
    /// id and a collision corrupts that resolution.
    pub fn set_taken_id(&mut self, scene: &Scene, id: BlockId) {
        if self.free_block_id <= id.0 {
            self.free_block_id = id.0.saturating_add(1);
            return;
        }

        // The id has been in circulation; a merged or earlier-loaded block
        // may be using it. Changing the survivor's id is free — ids only
        // matter during load.
        let mut colliding: Option<DescHandle> = None;
        scene.enumerate(&mut |_, node| {
            if let Some(block) = node.as_any().downcast_ref::<ParamBlock>() {
                let desc = block.desc();
                let matches = {
                    let d = desc.borrow();
                    d.class() == self.class && d.id == id
                };
                if matches {
                    colliding = Some(desc);
                    // Only one live block can carry a given id.
                    return false;
                }
            }
            true
        });

        if let Some(desc) = colliding {
            let new_id = self.next_free_id();
            debug!("registry: migrating descriptor {id} -> {new_id}");
            desc.borrow_mut().id = new_id;
        }
    }

    /// Create a descriptor. With no id given the next free one is used;
    /// a requested id is reserved first via [`DescRegistry::set_taken_id`].
    pub fn create_desc(&mut self, scene: &Scene, id: Option<BlockId>) -> DescHandle {
        let id = match id {
            None => self.next_free_id(),
            Some(id) => {
                self.set_taken_id(scene, id);
                id
            }
        };
        trace!("registry: create descriptor {id}");
        let desc = ParamBlockDesc::new(id, self.class).into_handle();
        self.active.push(Rc::clone(&desc));
        desc
    }

    /// Reattach a previously detached descriptor to the active set.
    pub fn add_desc(&mut self, desc: DescHandle) {
        debug_assert!(
            !self.active.iter().any(|d| Rc::ptr_eq(d, &desc)),
            "descriptor {} attached twice",
            desc.borrow().id
        );
        self.active.push(desc);
    }

    /// Detach a descriptor from the active set. With `delete` the
    /// registry drops its interest entirely; the memory is reclaimed when
    /// the last holder (a block or an undo record) lets go.
    ///
    /// A descriptor that is not in the active set is tolerated: an undo
    /// record released after a cancelled action hands back a descriptor
    /// that was never reattached.
    pub fn release_desc(&mut self, desc: &DescHandle, delete: bool) {
        if let Some(pos) = self.active.iter().position(|d| Rc::ptr_eq(d, desc)) {
            self.active.remove(pos);
            trace!(
                "registry: released descriptor {} (delete={delete})",
                desc.borrow().id
            );
        }
        if delete {
            // Nothing further to do beyond dropping our handle; shared
            // ownership reclaims the allocation once the last user is
            // gone.
            debug!(
                "registry: descriptor {} scheduled for reclaim",
                desc.borrow().id
            );
        }
    }

    /// First phase of deferred deletion: detach the descriptor and park
    /// it. It may still be referenced by an in-flight reference swap, so
    /// the final release happens in [`DescRegistry::release_obsolete`].
    pub fn set_obsolete(&mut self, desc: DescHandle) {
        self.release_desc(&desc, false);
        self.obsolete.push(desc);
    }

    /// Second phase: drop everything queued by
    /// [`DescRegistry::set_obsolete`]. Call at a point where no reference
    /// swap is in flight.
    pub fn release_obsolete(&mut self) {
        for desc in std::mem::take(&mut self.obsolete) {
            self.release_desc(&desc, true);
        }
    }

    pub fn num_obsolete(&self) -> usize {
        self.obsolete.len()
    }

    // ---------------------------------------------------------------
    // Persistence

    /// Whether a save needs to include this registry.
    pub fn needs_save(&self) -> bool {
        !self.active.is_empty()
    }

    /// Write every active descriptor's shape: its id, and per parameter
    /// the type tag and param id. UI metadata is regenerated on load and
    /// never saved.
    pub fn save<W: Write + Seek>(&self, out: W) -> Result<W> {
        let mut writer = ChunkWriter::new(out);
        for desc in &self.active {
            let desc = desc.borrow();
            writer.begin_chunk(DESC_CHUNK)?;

            writer.begin_chunk(DESC_HDR_CHUNK)?;
            writer.write_u16(desc.id.0)?;
            writer.end_chunk()?;

            for def in desc.params() {
                writer.begin_chunk(DESC_PARAM_CHUNK)?;
                writer.write_u32(def.ty.tag())?;
                writer.write_u16(def.id.0)?;
                writer.end_chunk()?;
            }

            writer.end_chunk()?;
        }
        writer.finish()
    }

    /// Recreate descriptors from a saved stream. Unknown chunks are
    /// skipped; the first I/O failure aborts the walk.
    pub fn load<R: Read + Seek>(&mut self, scene: &Scene, input: R) -> Result<()> {
        let mut reader = ChunkReader::new(input);
        while let Some(tag) = reader.open_chunk()? {
            if tag == DESC_CHUNK {
                self.load_desc(scene, &mut reader)?;
            } else {
                warn!("registry: skipping unknown chunk {tag:#06x}");
            }
            reader.close_chunk()?;
        }
        Ok(())
    }

    /// Load one descriptor chunk.
    fn load_desc<R: Read + Seek>(
        &mut self,
        scene: &Scene,
        reader: &mut ChunkReader<R>,
    ) -> Result<()> {
        let mut desc: Option<DescHandle> = None;

        while let Some(tag) = reader.open_chunk()? {
            match tag {
                DESC_HDR_CHUNK => {
                    if desc.is_some() {
                        return Err(DynattrError::persist(
                            "descriptor header appeared twice",
                            PersistErrorKind::DuplicateHeader,
                        )
                        .with_chunk_tag(tag));
                    }
                    // The saved id is how blocks loading later find their
                    // shape; it must be taken over verbatim.
                    let id = BlockId(reader.read_u16()?);
                    desc = Some(self.create_desc(scene, Some(id)));
                }
                DESC_PARAM_CHUNK => {
                    let Some(desc) = desc.as_ref() else {
                        return Err(DynattrError::persist(
                            "parameter chunk before descriptor header",
                            PersistErrorKind::MissingHeader,
                        )
                        .with_chunk_tag(tag));
                    };
                    let type_tag = reader.read_u32()?;
                    let saved_id = ParamId(reader.read_u16()?);
                    let ty = ParamType::from_tag(type_tag).ok_or_else(|| {
                        DynattrError::persist(
                            format!("parameter type tag {type_tag}"),
                            PersistErrorKind::UnknownParamType,
                        )
                        .with_chunk_tag(tag)
                    })?;

                    // Names are UI metadata, regenerated here.
                    let mut desc = desc.borrow_mut();
                    let name = format!("param{}", desc.count());
                    let new_id = desc.add_param(ty, name);
                    if new_id != saved_id {
                        desc.override_param_id(new_id, saved_id);
                    }
                }
                other => {
                    warn!("registry: skipping unknown descriptor sub-chunk {other:#06x}");
                }
            }
            reader.close_chunk()?;
        }

        if desc.is_none() {
            return Err(DynattrError::persist(
                "descriptor chunk had no header",
                PersistErrorKind::MissingHeader,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn registry() -> DescRegistry {
        DescRegistry::new(ClassTag(42))
    }

    fn shape_of(desc: &DescHandle) -> (u16, Vec<(u32, u16)>) {
        let d = desc.borrow();
        (
            d.id.0,
            d.params().iter().map(|p| (p.ty.tag(), p.id.0)).collect(),
        )
    }

    #[test]
    fn test_auto_ids_are_monotonic() {
        let scene = Scene::new();
        let mut reg = registry();
        let a = reg.create_desc(&scene, None);
        let b = reg.create_desc(&scene, None);
        assert_eq!(a.borrow().id, BlockId(0));
        assert_eq!(b.borrow().id, BlockId(1));
        assert_eq!(reg.num_descs(), 2);
    }

    #[test]
    fn test_requested_id_advances_free_counter() {
        let scene = Scene::new();
        let mut reg = registry();
        let a = reg.create_desc(&scene, Some(BlockId(10)));
        let b = reg.create_desc(&scene, None);
        assert_eq!(a.borrow().id, BlockId(10));
        assert_eq!(b.borrow().id, BlockId(11));
    }

    #[test]
    fn test_collision_migrates_existing_descriptor() {
        let mut scene = Scene::new();
        let mut reg = registry();

        // A live block carries descriptor id 0.
        let taken = reg.create_desc(&scene, None);
        assert_eq!(taken.borrow().id, BlockId(0));
        scene.insert(Box::new(ParamBlock::new(Rc::clone(&taken))));

        // Requesting id 0 migrates the existing descriptor, not the new
        // one.
        let fresh = reg.create_desc(&scene, Some(BlockId(0)));
        assert_eq!(fresh.borrow().id, BlockId(0));
        assert_ne!(taken.borrow().id, BlockId(0));
    }

    #[test]
    fn test_collision_ignores_foreign_class() {
        let mut scene = Scene::new();
        let mut reg = registry();
        let mut other = DescRegistry::new(ClassTag(7));

        let foreign = other.create_desc(&scene, None);
        scene.insert(Box::new(ParamBlock::new(Rc::clone(&foreign))));

        reg.next_free_id();
        let _ = reg.create_desc(&scene, Some(BlockId(0)));
        // The foreign descriptor kept its id.
        assert_eq!(foreign.borrow().id, BlockId(0));
    }

    #[test]
    fn test_release_and_reattach() {
        let scene = Scene::new();
        let mut reg = registry();
        let desc = reg.create_desc(&scene, None);

        reg.release_desc(&desc, false);
        assert_eq!(reg.num_descs(), 0);

        reg.add_desc(Rc::clone(&desc));
        assert_eq!(reg.num_descs(), 1);
    }

    #[test]
    fn test_two_phase_obsolete() {
        let scene = Scene::new();
        let mut reg = registry();
        let desc = reg.create_desc(&scene, None);

        reg.set_obsolete(Rc::clone(&desc));
        assert_eq!(reg.num_descs(), 0);
        assert_eq!(reg.num_obsolete(), 1);

        reg.release_obsolete();
        assert_eq!(reg.num_obsolete(), 0);
    }

    #[test]
    fn test_save_load_round_trip() {
        let scene = Scene::new();
        let mut reg = registry();

        let a = reg.create_desc(&scene, None);
        a.borrow_mut().add_param(ParamType::Float, "width");
        a.borrow_mut().add_param(ParamType::Target, "mesh");
        let b = reg.create_desc(&scene, Some(BlockId(9)));
        {
            let mut b = b.borrow_mut();
            let p = b.add_param(ParamType::String, "label");
            // Simulate an id forced by an earlier load.
            b.override_param_id(p, ParamId(5));
        }

        let saved: Vec<(u16, Vec<(u32, u16)>)> =
            reg.descs().iter().map(shape_of).collect();

        let buf = reg.save(Cursor::new(Vec::new())).unwrap().into_inner();

        let mut loaded = registry();
        loaded
            .load(&scene, Cursor::new(buf))
            .unwrap();

        let restored: Vec<(u16, Vec<(u32, u16)>)> =
            loaded.descs().iter().map(shape_of).collect();
        assert_eq!(saved, restored);
    }

    #[test]
    fn test_load_empty_stream() {
        let scene = Scene::new();
        let mut reg = registry();
        reg.load(&scene, Cursor::new(Vec::new())).unwrap();
        assert_eq!(reg.num_descs(), 0);
        assert!(!reg.needs_save());
    }

    #[test]
    fn test_load_aborts_on_bad_param_type() {
        let scene = Scene::new();
        let mut reg = registry();

        let mut writer = ChunkWriter::new(Cursor::new(Vec::new()));
        writer.begin_chunk(DESC_CHUNK).unwrap();
        writer.begin_chunk(DESC_HDR_CHUNK).unwrap();
        writer.write_u16(3).unwrap();
        writer.end_chunk().unwrap();
        writer.begin_chunk(DESC_PARAM_CHUNK).unwrap();
        writer.write_u32(0xFFFF).unwrap();
        writer.write_u16(0).unwrap();
        writer.end_chunk().unwrap();
        writer.end_chunk().unwrap();
        let buf = writer.finish().unwrap().into_inner();

        let err = reg.load(&scene, Cursor::new(buf)).unwrap_err();
        assert!(err.is_persist());
    }
}
