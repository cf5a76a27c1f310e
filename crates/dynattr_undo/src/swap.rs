//! The descriptor-swap undo command.
//!
//! Replacing an attribute's parameter block orphans the old block's
//! descriptor: it must leave the active set (so it is not saved while the
//! block is in undo limbo) but stay alive (an undo brings it back). This
//! record carries the old descriptor across that gap, captures the
//! replacement when the action completes, and decides at eviction time
//! whether the old descriptor dies for good or the new one takes the
//! deferred-deletion path.

use crate::held::HeldState;
use crate::hold::Hold;
use crate::restore::{RestoreCtx, RestoreObj};
use dynattr_blocks::{AttrHandle, DescHandle, DescRegistry, ParamBlock};
use dynattr_error::Result;
use dynattr_scene::{Scene, TargetId};
use log::debug;
use std::rc::Rc;

/// Undo record coordinating descriptor lifetime across a block swap.
///
/// `held == true` means the swap is in effect (the old descriptor is
/// parked here); `held == false` means the swap was undone (the old
/// descriptor is live again and the new one is parked).
pub struct DescSwapRestore {
    attr: AttrHandle,
    old_desc: DescHandle,
    new_desc: Option<DescHandle>,
    old_block: Option<TargetId>,
    new_block: Option<TargetId>,
    held: bool,
}

impl DescSwapRestore {
    /// Start the swap: detach the old descriptor from the active set and
    /// pin the old block so undo can bring it back.
    pub fn new(
        scene: &mut Scene,
        descs: &mut DescRegistry,
        attr: &AttrHandle,
        old_desc: DescHandle,
    ) -> Self {
        // Detached now so it is not saved wastefully while parked here.
        descs.release_desc(&old_desc, false);
        let old_block = attr.borrow().block_target();
        if let Some(block) = old_block {
            scene.lock(block);
        }
        DescSwapRestore {
            attr: Rc::clone(attr),
            old_desc,
            new_desc: None,
            old_block,
            new_block: None,
            held: true,
        }
    }
}

impl RestoreObj for DescSwapRestore {
    fn name(&self) -> &'static str {
        "desc-swap"
    }

    fn restore(&mut self, ctx: &mut RestoreCtx<'_>, is_undo: bool) {
        debug_assert!(self.held, "restore on a record already restored");
        self.held = false;

        // The old descriptor is used again; wire it back into the active
        // set so the scene can save it.
        ctx.descs.add_desc(Rc::clone(&self.old_desc));

        if is_undo {
            // The new block enters undo limbo with its descriptor; detach
            // it (without deleting — a redo revisits it).
            if let Some(new_desc) = &self.new_desc {
                ctx.descs.release_desc(new_desc, false);
            }
        }

        // Re-point the attribute, unless deletion raced us.
        let target = self.old_block.filter(|b| ctx.scene.contains(*b));
        let _ = self.attr.borrow_mut().set_block(ctx.scene, target);
    }

    fn redo(&mut self, ctx: &mut RestoreCtx<'_>) {
        debug_assert!(!self.held, "redo on a record still held");
        self.held = true;

        // The old descriptor goes back into limbo; the new one is live
        // again.
        ctx.descs.release_desc(&self.old_desc, false);
        if let Some(new_desc) = &self.new_desc {
            ctx.descs.add_desc(Rc::clone(new_desc));
        }

        let target = self.new_block.filter(|b| ctx.scene.contains(*b));
        let _ = self.attr.borrow_mut().set_block(ctx.scene, target);
    }

    fn end_hold(&mut self, _held: &mut HeldState, ctx: &mut RestoreCtx<'_>) {
        // The action completed: whatever block now sits on the attribute
        // is the replacement this record will restore on redo.
        let (new_block, new_desc) = {
            let attr = self.attr.borrow();
            (attr.block_target(), attr.block_desc(ctx.scene))
        };
        if let Some(new_desc) = &new_desc {
            debug_assert!(
                !Rc::ptr_eq(new_desc, &self.old_desc),
                "swap captured the descriptor it is replacing"
            );
        }
        if let Some(block) = new_block {
            ctx.scene.lock(block);
        }
        self.new_block = new_block;
        self.new_desc = new_desc;
    }

    fn evict(&mut self, _held: &mut HeldState, ctx: &mut RestoreCtx<'_>) {
        if self.held {
            // Never undone: the old block cannot come back, so its
            // descriptor can die with it.
            debug!("desc-swap: evicted in effect, reclaiming old descriptor");
            ctx.descs.release_desc(&self.old_desc, true);
        } else {
            // Undone: the new descriptor's block may not have released it
            // yet, so it takes the two-phase path.
            debug!("desc-swap: evicted after undo, new descriptor goes obsolete");
            if let Some(new_desc) = self.new_desc.take() {
                ctx.descs.set_obsolete(new_desc);
            }
        }

        // Drop the pins; whichever block is unreferenced goes away here.
        if let Some(block) = self.old_block.take() {
            ctx.scene.unlock(block);
        }
        if let Some(block) = self.new_block.take() {
            ctx.scene.unlock(block);
        }
    }
}

/// Swap an attribute's parameter block for one built from `new_desc`.
///
/// When a hold is open the old descriptor and block travel on a
/// [`DescSwapRestore`]; otherwise the old descriptor is released outright.
/// Returns the new block's target id.
pub fn replace_param_block(
    scene: &mut Scene,
    descs: &mut DescRegistry,
    hold: &mut Hold,
    attr: &AttrHandle,
    new_desc: DescHandle,
) -> Result<TargetId> {
    let old_desc = attr.borrow().block_desc(scene);
    if let Some(old_desc) = old_desc {
        if hold.holding() {
            let record = DescSwapRestore::new(scene, descs, attr, old_desc);
            hold.put(Box::new(record));
        } else {
            descs.release_desc(&old_desc, true);
        }
    }

    let block_id = scene.insert(Box::new(ParamBlock::new(new_desc)));
    attr.borrow_mut().set_block(scene, Some(block_id))?;
    Ok(block_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynattr_blocks::{BlockId, ClassTag, DynAttr, ParamType};

    struct Fixture {
        scene: Scene,
        descs: DescRegistry,
        hold: Hold,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                scene: Scene::new(),
                descs: DescRegistry::new(ClassTag(1)),
                hold: Hold::new(),
            }
        }

        fn with_depth(depth: usize) -> Self {
            let mut fx = Self::new();
            fx.hold = Hold::with_depth(depth);
            fx
        }

        /// An attribute carrying a one-float block.
        fn attr_with_block(&mut self) -> (AttrHandle, DescHandle, TargetId) {
            let desc = self.descs.create_desc(&self.scene, None);
            desc.borrow_mut().add_param(ParamType::Float, "width");
            let attr = DynAttr::new_handle(&mut self.scene, "attr").unwrap();
            let block = self
                .scene
                .insert(Box::new(ParamBlock::new(Rc::clone(&desc))));
            attr.borrow_mut()
                .set_block(&mut self.scene, Some(block))
                .unwrap();
            (attr, desc, block)
        }

        fn swap(&mut self, attr: &AttrHandle) -> (DescHandle, TargetId) {
            let new_desc = self.descs.create_desc(&self.scene, None);
            new_desc.borrow_mut().add_param(ParamType::Int, "count");
            self.hold.begin();
            let new_block = {
                let Fixture {
                    scene, descs, hold, ..
                } = self;
                replace_param_block(scene, descs, hold, attr, Rc::clone(&new_desc)).unwrap()
            };
            let mut ctx = RestoreCtx {
                scene: &mut self.scene,
                descs: &mut self.descs,
            };
            self.hold.accept("replace block", &mut ctx);
            (new_desc, new_block)
        }

        fn active_ids(&self) -> Vec<BlockId> {
            self.descs.descs().iter().map(|d| d.borrow().id).collect()
        }
    }

    #[test]
    fn test_swap_detaches_old_descriptor() {
        let mut fx = Fixture::new();
        let (attr, old_desc, old_block) = fx.attr_with_block();
        let (new_desc, new_block) = fx.swap(&attr);

        assert_eq!(attr.borrow().block_target(), Some(new_block));
        assert_eq!(fx.active_ids(), vec![new_desc.borrow().id]);
        // The old block is parked for undo, not deleted.
        assert!(fx.scene.contains(old_block));
        assert_eq!(old_desc.borrow().id, BlockId(0));
    }

    #[test]
    fn test_undo_redo_oscillation() {
        let mut fx = Fixture::new();
        let (attr, old_desc, old_block) = fx.attr_with_block();
        let (new_desc, new_block) = fx.swap(&attr);

        {
            let mut ctx = RestoreCtx {
                scene: &mut fx.scene,
                descs: &mut fx.descs,
            };
            fx.hold.undo(&mut ctx).unwrap();
            assert_eq!(attr.borrow().block_target(), Some(old_block));

            fx.hold.redo(&mut ctx).unwrap();
            assert_eq!(attr.borrow().block_target(), Some(new_block));

            fx.hold.undo(&mut ctx).unwrap();
            assert_eq!(attr.borrow().block_target(), Some(old_block));
        }

        assert_eq!(fx.active_ids(), vec![old_desc.borrow().id]);
        let _ = new_desc;
    }

    #[test]
    fn test_flushed_redo_queues_new_descriptor_obsolete() {
        let mut fx = Fixture::new();
        let (attr, _old_desc, _old_block) = fx.attr_with_block();
        let (new_desc, new_block) = fx.swap(&attr);

        {
            let mut ctx = RestoreCtx {
                scene: &mut fx.scene,
                descs: &mut fx.descs,
            };
            fx.hold.undo(&mut ctx).unwrap();
        }

        // A fresh edit flushes the redo queue; the undone swap record is
        // evicted in the not-held state.
        let cell = crate::cell::ValueCell::new(1);
        fx.hold.begin();
        fx.hold.hold_value(&cell, None);
        cell.set(2);
        {
            let mut ctx = RestoreCtx {
                scene: &mut fx.scene,
                descs: &mut fx.descs,
            };
            fx.hold.accept("edit", &mut ctx);
        }

        assert_eq!(fx.descs.num_obsolete(), 1);
        // The new block lost its pin and its last reference.
        assert!(!fx.scene.contains(new_block));

        fx.descs.release_obsolete();
        assert_eq!(fx.descs.num_obsolete(), 0);
        let _ = new_desc;
    }

    #[test]
    fn test_depth_eviction_reclaims_old_state() {
        let mut fx = Fixture::with_depth(1);
        let (attr, old_desc, old_block) = fx.attr_with_block();
        let (_new_desc, _new_block) = fx.swap(&attr);

        // A second accepted session pushes the swap off the queue while
        // it is still in effect.
        let cell = crate::cell::ValueCell::new(1);
        fx.hold.begin();
        fx.hold.hold_value(&cell, None);
        cell.set(2);
        {
            let mut ctx = RestoreCtx {
                scene: &mut fx.scene,
                descs: &mut fx.descs,
            };
            fx.hold.accept("edit", &mut ctx);
        }

        // The old block and its descriptor are gone for good.
        assert!(!fx.scene.contains(old_block));
        assert!(!fx
            .descs
            .descs()
            .iter()
            .any(|d| Rc::ptr_eq(d, &old_desc)));
        assert_eq!(fx.descs.num_obsolete(), 0);
    }

    #[test]
    fn test_cancel_reverts_swap() {
        let mut fx = Fixture::new();
        let (attr, old_desc, old_block) = fx.attr_with_block();

        let new_desc = fx.descs.create_desc(&fx.scene, None);
        fx.hold.begin();
        let new_block = {
            let Fixture {
                scene, descs, hold, ..
            } = &mut fx;
            replace_param_block(scene, descs, hold, &attr, Rc::clone(&new_desc)).unwrap()
        };
        {
            let mut ctx = RestoreCtx {
                scene: &mut fx.scene,
                descs: &mut fx.descs,
            };
            fx.hold.cancel(&mut ctx);
        }

        assert_eq!(attr.borrow().block_target(), Some(old_block));
        assert!(fx
            .descs
            .descs()
            .iter()
            .any(|d| Rc::ptr_eq(d, &old_desc)));
        // The cancelled replacement block went away with its reference.
        assert!(!fx.scene.contains(new_block));
        assert!(fx.hold.held().is_empty());
    }

    #[test]
    fn test_swap_without_hold_releases_descriptor() {
        let mut fx = Fixture::new();
        let (attr, old_desc, old_block) = fx.attr_with_block();

        let new_desc = fx.descs.create_desc(&fx.scene, None);
        let new_block = {
            let Fixture {
                scene, descs, hold, ..
            } = &mut fx;
            replace_param_block(scene, descs, hold, &attr, Rc::clone(&new_desc)).unwrap()
        };

        assert_eq!(attr.borrow().block_target(), Some(new_block));
        // No undo record: old block and descriptor are released now.
        assert!(!fx.scene.contains(old_block));
        assert!(!fx
            .descs
            .descs()
            .iter()
            .any(|d| Rc::ptr_eq(d, &old_desc)));
    }
}
