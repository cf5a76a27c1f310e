//! The reference slot table.
//!
//! One resizable table multiplexes fixed-index ("static") references and
//! variably-sized reference arrays onto a single contiguous index space,
//! which is the shape dependency systems expect: indices `0..num_refs()`
//! with no holes in the dynamic region.
//!
//! Index layout: groups below `base_dyn` occupy exactly one index each at
//! their group id. Groups at or above `base_dyn` are arrays; an array
//! group's elements live at `base_dyn + Σ(sizes of preceding groups) +
//! offset`. Inserting or erasing in the dynamic region shifts the indices
//! of everything behind it, which is why slots are addressed by [`SlotId`]
//! everywhere outside this module.

use crate::slot::{
    GroupId, NotifyCallback, Ownership, Persistence, RefMessage, RefResult, RefSlot, SlotId,
};
use dynattr_error::{DynattrError, RefErrorKind, Result};
use dynattr_scene::{RemapContext, Scene, TargetId};
use log::{debug, trace};

/// Sentinel base meaning "no arrays registered yet": every group is static.
const NO_DYNAMIC_BASE: usize = usize::MAX;

/// Reference slot table. Embed one per owning object and delegate the
/// dependency-system surface (`num_refs`, `get_reference`, notification
/// handling, cloning) to it.
pub struct RefTable {
    slots: Vec<Option<RefSlot>>,
    /// Element count per array group, ordered by group id.
    array_sizes: Vec<usize>,
    /// First group id at which arrays begin; slots below it are static.
    base_dyn: usize,
    next_slot: u64,
}

impl Default for RefTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RefTable {
    pub fn new() -> Self {
        RefTable {
            slots: Vec::new(),
            array_sizes: Vec::new(),
            base_dyn: NO_DYNAMIC_BASE,
            next_slot: 0,
        }
    }

    /// Total number of exposed reference indices.
    pub fn num_refs(&self) -> usize {
        self.slots.len()
    }

    pub fn has_arrays(&self) -> bool {
        self.base_dyn != NO_DYNAMIC_BASE
    }

    /// First dynamic group id, once any array has been registered.
    pub fn dynamic_base(&self) -> Option<usize> {
        self.has_arrays().then_some(self.base_dyn)
    }

    /// Current element count of an array group.
    pub fn array_len(&self, group: GroupId) -> Option<usize> {
        if !self.has_arrays() || group < self.base_dyn {
            return None;
        }
        self.array_sizes.get(group - self.base_dyn).copied()
    }

    /// Whether `n` names a live slot.
    pub fn is_valid_index(&self, n: usize) -> bool {
        self.get_info(n).is_some()
    }

    /// The slot at index `n`; out-of-range or vacated indices report
    /// not-found rather than faulting.
    pub fn get_info(&self, n: usize) -> Option<&RefSlot> {
        self.slots.get(n)?.as_ref()
    }

    fn get_info_mut(&mut self, n: usize) -> Option<&mut RefSlot> {
        self.slots.get_mut(n)?.as_mut()
    }

    /// Target pointed at by index `n`.
    pub fn get_reference(&self, n: usize) -> Option<TargetId> {
        self.get_info(n)?.target
    }

    /// The slot with the given stable id.
    pub fn slot(&self, id: SlotId) -> Option<&RefSlot> {
        self.slots
            .iter()
            .flatten()
            .find(|s| s.id == id)
    }

    pub fn slot_mut(&mut self, id: SlotId) -> Option<&mut RefSlot> {
        self.slots
            .iter_mut()
            .flatten()
            .find(|s| s.id == id)
    }

    /// Current table index of a slot. Must succeed for any slot obtained
    /// from this table and not yet released.
    pub fn index_of(&self, id: SlotId) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|s| s.id == id))
    }

    /// First index whose slot points at `target`.
    pub fn index_of_target(&self, target: TargetId) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|s| s.target == Some(target)))
    }

    // ---------------------------------------------------------------
    // Registration

    /// Register a reference under `group`.
    ///
    /// Groups below the dynamic base are static: `offset` must be absent
    /// or 0 and the slot must be vacant. Groups at or above the base
    /// resolve to arrays, auto-growing the size table; `offset = None`
    /// appends. Returns the new slot's stable id.
    pub fn register(
        &mut self,
        scene: &mut Scene,
        group: GroupId,
        offset: Option<usize>,
        callback: Option<NotifyCallback>,
        target: Option<TargetId>,
        ownership: Ownership,
        persistence: Persistence,
    ) -> Result<SlotId> {
        debug_assert!(
            ownership == Ownership::Weak || persistence == Persistence::Persisted,
            "strong references are always persisted"
        );

        let n = if group < self.base_dyn {
            // Static registration.
            if offset.unwrap_or(0) != 0 {
                debug_assert!(false, "array offset given for static group {group}");
                return Err(DynattrError::reference(
                    format!("group {group} is static"),
                    RefErrorKind::InvalidOffset,
                )
                .with_operation("register"));
            }
            if self.get_info(group).is_some() {
                debug_assert!(false, "registering over live static slot {group}");
                return Err(DynattrError::reference(
                    format!("static slot {group} is occupied"),
                    RefErrorKind::SlotOccupied,
                )
                .with_slot_index(group)
                .with_operation("register"));
            }
            group
        } else {
            // Array registration; unseen groups spring into existence with
            // this element as their first.
            let rel = group - self.base_dyn;
            if rel >= self.array_sizes.len() {
                self.array_sizes.resize(rel + 1, 1);
            } else {
                self.array_sizes[rel] += 1;
            }
            let size = self.array_sizes[rel];
            let offset = offset.unwrap_or(size - 1);
            if offset >= size {
                debug_assert!(false, "offset {offset} outside array group {group}");
                self.array_sizes[rel] -= 1;
                return Err(DynattrError::reference(
                    format!("offset {offset} outside group {group}"),
                    RefErrorKind::InvalidOffset,
                )
                .with_operation("register"));
            }
            self.index_for_array(rel, offset).ok_or_else(|| {
                DynattrError::reference(
                    format!("group {group} has no index space"),
                    RefErrorKind::InvalidIndex,
                )
            })?
        };

        let id = self.insert_slot(n, callback, ownership, persistence);
        trace!("refs: registered {id} group={group} index={n}");
        if target.is_some() {
            self.set_reference(scene, n, target);
        }
        debug_assert_eq!(self.index_of(id), Some(n));
        self.validate_arrays();
        Ok(id)
    }

    /// Place a fresh vacant slot at index `n`, growing or shifting the
    /// table as needed.
    fn insert_slot(
        &mut self,
        n: usize,
        callback: Option<NotifyCallback>,
        ownership: Ownership,
        persistence: Persistence,
    ) -> SlotId {
        while n >= self.slots.len() {
            self.slots.push(None);
        }
        if self.slots[n].is_some() {
            self.slots.insert(n, None);
        }
        let id = SlotId(self.next_slot);
        self.next_slot += 1;
        self.slots[n] = Some(RefSlot {
            id,
            target: None,
            ownership,
            persistence,
            callback,
        });
        id
    }

    /// Declare `group` array-capable.
    ///
    /// Declaring below the current base rebases the table: every group the
    /// table spans in `[group, old_base)` becomes a one-element array
    /// (compensating size-1 entries are prepended) and the base drops to
    /// `group`. The group's own placeholder slot is then removed and its
    /// size set to 0.
    pub fn register_array(&mut self, group: GroupId) -> bool {
        // With no arrays yet, the index space must reach the group's
        // static position so the rebase below has a placeholder to claim.
        if !self.has_arrays() && group >= self.slots.len() {
            while self.slots.len() < group + 1 {
                self.slots.push(None);
            }
        }

        if group < self.base_dyn {
            // Rebase: statics between the new base and the old one become
            // one-element arrays so the index algebra stays uniform.
            let max_idx = self.base_dyn.min(self.slots.len());
            let num_convert = max_idx.saturating_sub(group);
            debug!(
                "refs: rebasing dynamic base {} -> {group}, converting {num_convert} statics",
                if self.has_arrays() {
                    self.base_dyn.to_string()
                } else {
                    "none".into()
                }
            );
            self.array_sizes.splice(0..0, std::iter::repeat(1).take(num_convert));
            self.base_dyn = group;
        } else {
            let num_arrays = 1 + group - self.base_dyn;
            if num_arrays > self.array_sizes.len() {
                let grow = num_arrays - self.array_sizes.len();
                self.array_sizes.extend(std::iter::repeat(1).take(grow));
            }
        }

        // Every size-table entry accounts for one table position; newly
        // accounted groups get their placeholder slots appended here before
        // the group's own placeholder is claimed.
        let accounted = self.base_dyn + self.array_sizes.iter().sum::<usize>();
        while self.slots.len() < accounted {
            self.slots.push(None);
        }
        debug_assert_eq!(self.slots.len(), accounted);

        let rel = group - self.base_dyn;
        let Some(n) = self.index_for_array(rel, 0) else {
            debug_assert!(false, "array group {group} resolved to no index");
            return false;
        };
        debug_assert!(
            self.slots.get(n).is_some_and(Option::is_none),
            "declaring array over a live slot at index {n}"
        );
        debug_assert_eq!(self.array_sizes[rel], 1);
        // The placeholder slot stood for a static reference; the group is
        // now an empty array, so the placeholder goes away. This shifts
        // every higher index down by one.
        if self.slots.get(n).is_some_and(Option::is_none) {
            self.slots.remove(n);
            self.array_sizes[rel] = 0;
        }
        self.validate_arrays();
        true
    }

    // ---------------------------------------------------------------
    // Release

    /// Release a slot, clearing its target and removing it from the table.
    ///
    /// Dynamic slots are erased (higher indices shift down); static slots
    /// are nulled in place so static group ids keep their meaning. The
    /// owning array group's size is decremented.
    pub fn release(&mut self, scene: &mut Scene, id: SlotId, group: GroupId) -> Result<()> {
        let Some(n) = self.index_of(id) else {
            debug_assert!(false, "releasing unknown {id}");
            return Err(DynattrError::reference(
                format!("{id} not present"),
                RefErrorKind::SlotNotFound,
            )
            .with_operation("release"));
        };

        if self.get_info(n).is_some_and(|s| s.target.is_some()) {
            self.set_reference(scene, n, None);
        }

        let dynamic = n >= self.base_dyn;
        if dynamic {
            self.slots.remove(n);
        } else {
            self.slots[n] = None;
        }
        trace!("refs: released {id} group={group} index={n}");

        // Static groups have no size bookkeeping to maintain.
        if group < self.base_dyn {
            self.validate_arrays();
            return Ok(());
        }

        let rel = group - self.base_dyn;
        debug_assert_eq!(
            self.owning_group_of_index(n),
            Some(rel),
            "released slot was not in the stated group"
        );
        if let Some(size) = self.array_sizes.get_mut(rel) {
            debug_assert!(*size > 0, "array group {group} size underflow");
            *size = size.saturating_sub(1);
        } else {
            debug_assert!(false, "release names unknown array group {group}");
        }
        self.validate_arrays();
        Ok(())
    }

    /// Derive which array group covers absolute index `n` (relative group
    /// index). Used for debug validation of release bookkeeping.
    fn owning_group_of_index(&self, n: usize) -> Option<usize> {
        if !self.has_arrays() || n < self.base_dyn {
            return None;
        }
        let mut total = self.base_dyn;
        for (rel, size) in self.array_sizes.iter().enumerate() {
            total += size;
            if total > n {
                return Some(rel);
            }
        }
        None
    }

    // ---------------------------------------------------------------
    // Pointer access

    /// Set the target at index `n`, maintaining dependent counts for
    /// strong slots.
    pub(crate) fn set_reference(
        &mut self,
        scene: &mut Scene,
        n: usize,
        target: Option<TargetId>,
    ) {
        let Some(slot) = self.get_info_mut(n) else {
            debug_assert!(false, "set_reference on invalid index {n}");
            return;
        };
        let old = slot.target;
        if old == target {
            return;
        }
        slot.target = target;
        if slot.ownership == Ownership::Strong {
            if let Some(t) = target {
                scene.add_ref(t);
            }
            if let Some(t) = old {
                scene.release_ref(t);
            }
        }
    }

    /// Public pointer replacement by index.
    pub fn replace_reference(
        &mut self,
        scene: &mut Scene,
        n: usize,
        target: Option<TargetId>,
    ) -> RefResult {
        if self.get_info(n).is_none() {
            return RefResult::Fail;
        }
        self.set_reference(scene, n, target);
        RefResult::Succeed
    }

    /// Pointer replacement by stable slot id.
    pub fn set_by_slot(
        &mut self,
        scene: &mut Scene,
        id: SlotId,
        target: Option<TargetId>,
    ) -> RefResult {
        match self.index_of(id) {
            Some(n) => self.replace_reference(scene, n, target),
            None => {
                debug_assert!(false, "set_by_slot on unknown {id}");
                RefResult::Fail
            }
        }
    }

    // ---------------------------------------------------------------
    // Notification

    /// Deliver a change notification aimed at `target`.
    ///
    /// The managed slot's callback (if any) runs before default handling.
    /// A target-deleted message nulls the slot's pointer; the table never
    /// keeps an id that stopped resolving. Always succeeds.
    pub fn notify(
        &mut self,
        scene: &mut Scene,
        target: TargetId,
        message: RefMessage,
        part: crate::slot::PartId,
    ) -> RefResult {
        let found = self.index_of_target(target);
        if let Some(n) = found {
            if let Some(slot) = self.get_info_mut(n) {
                if let Some(callback) = slot.callback.as_mut() {
                    let _ = callback(message, part);
                }
            }
        }

        if message == RefMessage::TargetDeleted {
            debug_assert!(
                found.is_some(),
                "target-deleted notification for unmanaged {target}"
            );
            if let Some(n) = found {
                self.set_reference(scene, n, None);
            }
        }
        RefResult::Succeed
    }

    // ---------------------------------------------------------------
    // Cloning

    /// Duplicate this table for a cloned owner. Strong slots deep-clone
    /// their target through the remap service; weak slots copy the id.
    /// Callbacks are not cloned — the new owner re-registers its own.
    pub fn clone_table(&self, scene: &mut Scene, remap: &mut RemapContext) -> RefTable {
        let mut next_slot = 0u64;
        let slots = self
            .slots
            .iter()
            .map(|entry| {
                entry.as_ref().map(|slot| {
                    let target = match (slot.ownership, slot.target) {
                        (Ownership::Strong, Some(t)) => {
                            let cloned = remap.clone_ref(scene, t);
                            if let Some(c) = cloned {
                                scene.add_ref(c);
                            }
                            cloned
                        }
                        (Ownership::Weak, t) => t,
                        (_, None) => None,
                    };
                    let id = SlotId(next_slot);
                    next_slot += 1;
                    RefSlot {
                        id,
                        target,
                        ownership: slot.ownership,
                        persistence: slot.persistence,
                        callback: None,
                    }
                })
            })
            .collect();
        RefTable {
            slots,
            array_sizes: self.array_sizes.clone(),
            base_dyn: self.base_dyn,
            next_slot,
        }
    }

    // ---------------------------------------------------------------
    // Internals

    /// Absolute index of `(relative array group, offset)`.
    fn index_for_array(&self, rel: usize, offset: usize) -> Option<usize> {
        if rel >= self.array_sizes.len() {
            debug_assert!(false, "array group {rel} out of range");
            return None;
        }
        debug_assert!(self.array_sizes[rel] >= offset);
        let preceding: usize = self.array_sizes[..rel].iter().sum();
        Some(self.base_dyn + preceding + offset)
    }

    /// Total-slot invariant: once arrays exist, the static span plus every
    /// array size must account for every table position.
    fn validate_arrays(&self) {
        #[cfg(debug_assertions)]
        {
            if !self.has_arrays() {
                return;
            }
            let total = self.base_dyn + self.array_sizes.iter().sum::<usize>();
            debug_assert_eq!(
                total,
                self.slots.len(),
                "slot table out of sync with array sizes"
            );
        }
    }
}

impl std::fmt::Debug for RefTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefTable")
            .field("num_refs", &self.slots.len())
            .field("array_sizes", &self.array_sizes)
            .field(
                "base_dyn",
                &self.dynamic_base(),
            )
            .finish()
    }
}
