//! Restore records for scalar and array-element data.

use crate::cell::{TabCell, ValueCell};
use crate::held::HeldState;
use dynattr_blocks::DescRegistry;
use dynattr_scene::Scene;
use std::rc::Rc;

/// Context bundle threaded through record callbacks. Records never reach
/// for global state; everything they may touch arrives here.
pub struct RestoreCtx<'a> {
    pub scene: &'a mut Scene,
    pub descs: &'a mut DescRegistry,
}

/// Callback invoked after a restore or redo writes a value, so the owner
/// can react (refresh caches, update UI, ...).
pub type RestoreCallback<T> = Rc<dyn Fn(&T)>;

/// One undoable mutation.
///
/// Lifecycle, driven strictly in order by the hold manager: created when
/// the mutation starts (captures the undo value, marks the data held) →
/// `end_hold` when the mutation completes (captures the redo value,
/// releases the hold) → any sequence of `restore` / `redo` → `evict` when
/// the record leaves the queue. Eviction is an explicit hook, not a drop
/// side effect, so records can reach their registries on the way out.
pub trait RestoreObj {
    fn name(&self) -> &'static str {
        "restore"
    }

    /// Write the captured undo value back. `is_undo` is false when the
    /// enclosing action was cancelled rather than undone.
    fn restore(&mut self, ctx: &mut RestoreCtx<'_>, is_undo: bool);

    /// Write the captured redo value back.
    fn redo(&mut self, ctx: &mut RestoreCtx<'_>);

    /// The mutation completed; capture the redo value and release the
    /// hold.
    fn end_hold(&mut self, held: &mut HeldState, ctx: &mut RestoreCtx<'_>);

    /// The record is leaving the queue for good.
    fn evict(&mut self, held: &mut HeldState, ctx: &mut RestoreCtx<'_>);
}

/// Restore record for one scalar value.
pub struct DataRestore<T: Clone + 'static> {
    cell: ValueCell<T>,
    undo: T,
    redo: T,
    owner: Option<RestoreCallback<T>>,
    holding: bool,
}

impl<T: Clone + 'static> DataRestore<T> {
    /// Capture the current value as the undo value and mark the cell
    /// held. Callers must check the held registry first; see
    /// [`Hold::hold_value`](crate::Hold::hold_value).
    pub fn new(
        held: &mut HeldState,
        cell: &ValueCell<T>,
        owner: Option<RestoreCallback<T>>,
    ) -> Self {
        debug_assert!(!held.is_held(cell.id()), "double hold on {}", cell.id());
        held.set_held(cell.id());
        let undo = cell.get();
        DataRestore {
            cell: cell.clone(),
            // The redo value defaults to the undo value until the
            // mutation completes.
            redo: undo.clone(),
            undo,
            owner,
            holding: true,
        }
    }

    fn notify_owner(&self, value: &T) {
        if let Some(owner) = &self.owner {
            owner(value);
        }
    }
}

impl<T: Clone + 'static> RestoreObj for DataRestore<T> {
    fn name(&self) -> &'static str {
        "data"
    }

    fn restore(&mut self, _ctx: &mut RestoreCtx<'_>, _is_undo: bool) {
        self.cell.set(self.undo.clone());
        self.notify_owner(&self.undo);
    }

    fn redo(&mut self, _ctx: &mut RestoreCtx<'_>) {
        self.cell.set(self.redo.clone());
        self.notify_owner(&self.redo);
    }

    fn end_hold(&mut self, held: &mut HeldState, _ctx: &mut RestoreCtx<'_>) {
        self.redo = self.cell.get();
        held.end_hold(self.cell.id());
        self.holding = false;
    }

    fn evict(&mut self, held: &mut HeldState, _ctx: &mut RestoreCtx<'_>) {
        if self.holding {
            held.end_hold(self.cell.id());
            self.holding = false;
        }
    }
}

/// Restore record for one element of a tab.
///
/// Captures the tab's length at both ends of the hold; restoring resizes
/// the tab back before writing, since the tab may have been resized in
/// between and the element index must exist again.
pub struct TabDataRestore<T: Clone + Default + 'static> {
    tab: TabCell<T>,
    index: usize,
    undo_len: usize,
    redo_len: usize,
    undo: T,
    redo: T,
    owner: Option<RestoreCallback<T>>,
    holding: bool,
}

impl<T: Clone + Default + 'static> TabDataRestore<T> {
    pub fn new(
        held: &mut HeldState,
        tab: &TabCell<T>,
        index: usize,
        owner: Option<RestoreCallback<T>>,
    ) -> Self {
        debug_assert!(
            !held.is_tab_held(tab.id(), index),
            "double hold on {}[{index}]",
            tab.id()
        );
        held.set_tab_held(tab.id(), index);
        let len = tab.len();
        let value = tab.get(index).unwrap_or_default();
        TabDataRestore {
            tab: tab.clone(),
            index,
            undo_len: len,
            redo_len: len,
            undo: value.clone(),
            redo: value,
            owner,
            holding: true,
        }
    }

    fn notify_owner(&self, value: &T) {
        if let Some(owner) = &self.owner {
            owner(value);
        }
    }
}

impl<T: Clone + Default + 'static> RestoreObj for TabDataRestore<T> {
    fn name(&self) -> &'static str {
        "tab-data"
    }

    fn restore(&mut self, _ctx: &mut RestoreCtx<'_>, _is_undo: bool) {
        self.tab.resize_with_default(self.undo_len);
        if self.index < self.undo_len {
            self.tab.set(self.index, self.undo.clone());
        }
        self.notify_owner(&self.undo);
    }

    fn redo(&mut self, _ctx: &mut RestoreCtx<'_>) {
        self.tab.resize_with_default(self.redo_len);
        if self.index < self.redo_len {
            self.tab.set(self.index, self.redo.clone());
        }
        self.notify_owner(&self.redo);
    }

    fn end_hold(&mut self, held: &mut HeldState, _ctx: &mut RestoreCtx<'_>) {
        self.redo_len = self.tab.len();
        if self.index < self.redo_len {
            if let Some(value) = self.tab.get(self.index) {
                self.redo = value;
            }
        }
        held.end_tab_hold(self.tab.id(), self.index);
        self.holding = false;
    }

    fn evict(&mut self, held: &mut HeldState, _ctx: &mut RestoreCtx<'_>) {
        if self.holding {
            held.end_tab_hold(self.tab.id(), self.index);
            self.holding = false;
        }
    }
}
