//! The hold manager: undo/redo queue and hold-session bookkeeping.

use crate::cell::{TabCell, ValueCell};
use crate::held::HeldState;
use crate::restore::{DataRestore, RestoreCallback, RestoreCtx, RestoreObj, TabDataRestore};
use dynattr_error::{DynattrError, Result, UndoErrorKind};
use log::{debug, trace, warn};
use std::collections::VecDeque;

/// Default number of accepted sessions kept before the oldest is evicted.
const DEFAULT_MAX_DEPTH: usize = 32;

struct Session {
    name: String,
    records: Vec<Box<dyn RestoreObj>>,
}

/// Owns the held-address registry and the undo/redo queues.
///
/// One hold session brackets one user-visible action: `begin`, any number
/// of `put`/`hold_value` calls while the mutation runs, then `accept` (or
/// `cancel`). Undo and redo replay accepted sessions strictly in queue
/// order. Sessions pushed off the far end of the queue have their records
/// evicted, which is where deferred descriptor cleanup happens.
pub struct Hold {
    held: HeldState,
    pending: Option<Session>,
    undo_stack: VecDeque<Session>,
    redo_stack: Vec<Session>,
    max_depth: usize,
}

impl Default for Hold {
    fn default() -> Self {
        Self::new()
    }
}

impl Hold {
    pub fn new() -> Self {
        Self::with_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn with_depth(max_depth: usize) -> Self {
        Hold {
            held: HeldState::new(),
            pending: None,
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_depth: max_depth.max(1),
        }
    }

    /// Whether a hold session is open.
    pub fn holding(&self) -> bool {
        self.pending.is_some()
    }

    pub fn held(&self) -> &HeldState {
        &self.held
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Open a hold session.
    pub fn begin(&mut self) {
        debug_assert!(!self.holding(), "begin inside an open hold");
        if self.pending.is_none() {
            self.pending = Some(Session {
                name: String::new(),
                records: Vec::new(),
            });
        }
    }

    /// Add a record to the open session. The record has already captured
    /// its undo value and marked its data held.
    pub fn put(&mut self, record: Box<dyn RestoreObj>) {
        match self.pending.as_mut() {
            Some(session) => {
                trace!("hold: put {} record", record.name());
                session.records.push(record);
            }
            None => {
                debug_assert!(false, "put outside a hold session");
                warn!("hold: dropping {} record put outside a session", record.name());
            }
        }
    }

    /// Hold a scalar cell, unless nothing is being held or the cell is
    /// already guarded by an earlier record.
    pub fn hold_value<T: Clone + 'static>(
        &mut self,
        cell: &ValueCell<T>,
        owner: Option<RestoreCallback<T>>,
    ) {
        if !self.holding() || self.held.is_held(cell.id()) {
            return;
        }
        let record = DataRestore::new(&mut self.held, cell, owner);
        self.put(Box::new(record));
    }

    /// Hold one tab element, unless nothing is being held or that element
    /// is already guarded.
    pub fn hold_tab_value<T: Clone + Default + 'static>(
        &mut self,
        tab: &TabCell<T>,
        index: usize,
        owner: Option<RestoreCallback<T>>,
    ) {
        if !self.holding() || self.held.is_tab_held(tab.id(), index) {
            return;
        }
        let record = TabDataRestore::new(&mut self.held, tab, index, owner);
        self.put(Box::new(record));
    }

    /// Close the session: every record captures its redo value and
    /// releases its hold, and the session joins the undo queue. Accepting
    /// a new action invalidates the redo queue, and the oldest session
    /// falls off once the depth limit is hit.
    pub fn accept<S: Into<String>>(&mut self, name: S, ctx: &mut RestoreCtx<'_>) {
        let Some(mut session) = self.pending.take() else {
            debug_assert!(false, "accept without begin");
            return;
        };
        session.name = name.into();
        for record in &mut session.records {
            record.end_hold(&mut self.held, ctx);
        }
        if session.records.is_empty() {
            trace!("hold: accept of '{}' held nothing", session.name);
            return;
        }
        debug!(
            "hold: accepted '{}' with {} records",
            session.name,
            session.records.len()
        );

        for mut stale in self.redo_stack.drain(..) {
            for record in &mut stale.records {
                record.evict(&mut self.held, ctx);
            }
        }
        self.undo_stack.push_back(session);
        while self.undo_stack.len() > self.max_depth {
            if let Some(mut evicted) = self.undo_stack.pop_front() {
                debug!("hold: evicting '{}' off the queue", evicted.name);
                for record in &mut evicted.records {
                    record.evict(&mut self.held, ctx);
                }
            }
        }
    }

    /// Abort the session: records written back (not as an undo), then
    /// evicted. Outstanding holds are released by eviction.
    pub fn cancel(&mut self, ctx: &mut RestoreCtx<'_>) {
        let Some(mut session) = self.pending.take() else {
            debug_assert!(false, "cancel without begin");
            return;
        };
        debug!("hold: cancelling {} records", session.records.len());
        for record in session.records.iter_mut().rev() {
            record.restore(ctx, false);
        }
        for record in &mut session.records {
            record.evict(&mut self.held, ctx);
        }
    }

    /// Undo the most recent accepted session.
    pub fn undo(&mut self, ctx: &mut RestoreCtx<'_>) -> Result<()> {
        debug_assert!(!self.holding(), "undo inside an open hold");
        let mut session = self.undo_stack.pop_back().ok_or_else(|| {
            DynattrError::undo("undo queue is empty", UndoErrorKind::UndoStackEmpty)
        })?;
        debug!("hold: undo '{}'", session.name);
        for record in session.records.iter_mut().rev() {
            record.restore(ctx, true);
        }
        self.redo_stack.push(session);
        Ok(())
    }

    /// Redo the most recently undone session.
    pub fn redo(&mut self, ctx: &mut RestoreCtx<'_>) -> Result<()> {
        debug_assert!(!self.holding(), "redo inside an open hold");
        let mut session = self.redo_stack.pop().ok_or_else(|| {
            DynattrError::undo("redo queue is empty", UndoErrorKind::RedoStackEmpty)
        })?;
        debug!("hold: redo '{}'", session.name);
        for record in &mut session.records {
            record.redo(ctx);
        }
        self.undo_stack.push_back(session);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynattr_blocks::{ClassTag, DescRegistry};
    use dynattr_scene::Scene;

    struct Fixture {
        scene: Scene,
        descs: DescRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                scene: Scene::new(),
                descs: DescRegistry::new(ClassTag(0)),
            }
        }

        fn ctx(&mut self) -> RestoreCtx<'_> {
            RestoreCtx {
                scene: &mut self.scene,
                descs: &mut self.descs,
            }
        }
    }

    #[test]
    fn test_edit_undo_redo_cycle() {
        let mut fx = Fixture::new();
        let mut hold = Hold::new();
        let cell = ValueCell::new(1);

        hold.begin();
        hold.hold_value(&cell, None);
        cell.set(2);
        hold.accept("edit", &mut fx.ctx());

        assert_eq!(cell.get(), 2);
        hold.undo(&mut fx.ctx()).unwrap();
        assert_eq!(cell.get(), 1);
        hold.redo(&mut fx.ctx()).unwrap();
        assert_eq!(cell.get(), 2);
        assert!(hold.held().is_empty());
    }

    #[test]
    fn test_double_hold_registers_one_record() {
        let mut fx = Fixture::new();
        let mut hold = Hold::new();
        let cell = ValueCell::new(1);

        hold.begin();
        hold.hold_value(&cell, None);
        cell.set(2);
        // A second mutation of the same data in one session must not
        // capture the intermediate value.
        hold.hold_value(&cell, None);
        cell.set(3);
        hold.accept("edit", &mut fx.ctx());

        hold.undo(&mut fx.ctx()).unwrap();
        assert_eq!(cell.get(), 1);
        hold.redo(&mut fx.ctx()).unwrap();
        assert_eq!(cell.get(), 3);
    }

    #[test]
    fn test_cancel_restores_and_releases() {
        let mut fx = Fixture::new();
        let mut hold = Hold::new();
        let cell = ValueCell::new(5);

        hold.begin();
        hold.hold_value(&cell, None);
        cell.set(6);
        hold.cancel(&mut fx.ctx());

        assert_eq!(cell.get(), 5);
        assert!(hold.held().is_empty());
        assert_eq!(hold.undo_depth(), 0);

        // The address is free for a new hold afterwards.
        hold.begin();
        hold.hold_value(&cell, None);
        cell.set(7);
        hold.accept("edit", &mut fx.ctx());
        assert_eq!(hold.undo_depth(), 1);
    }

    #[test]
    fn test_empty_session_leaves_no_queue_entry() {
        let mut fx = Fixture::new();
        let mut hold = Hold::new();
        hold.begin();
        hold.accept("noop", &mut fx.ctx());
        assert_eq!(hold.undo_depth(), 0);
    }

    #[test]
    fn test_new_accept_clears_redo() {
        let mut fx = Fixture::new();
        let mut hold = Hold::new();
        let cell = ValueCell::new(1);

        for value in [2, 3] {
            hold.begin();
            hold.hold_value(&cell, None);
            cell.set(value);
            hold.accept("edit", &mut fx.ctx());
        }
        hold.undo(&mut fx.ctx()).unwrap();
        assert_eq!(hold.redo_depth(), 1);

        hold.begin();
        hold.hold_value(&cell, None);
        cell.set(9);
        hold.accept("edit", &mut fx.ctx());

        assert_eq!(hold.redo_depth(), 0);
        assert!(hold.redo(&mut fx.ctx()).is_err());
    }

    #[test]
    fn test_depth_limit_evicts_oldest() {
        let mut fx = Fixture::new();
        let mut hold = Hold::with_depth(2);
        let cell = ValueCell::new(0);

        for value in 1..=3 {
            hold.begin();
            hold.hold_value(&cell, None);
            cell.set(value);
            hold.accept("edit", &mut fx.ctx());
        }
        assert_eq!(hold.undo_depth(), 2);

        hold.undo(&mut fx.ctx()).unwrap();
        hold.undo(&mut fx.ctx()).unwrap();
        // The first edit fell off the queue; its value stays.
        assert_eq!(cell.get(), 1);
        assert!(hold.undo(&mut fx.ctx()).is_err());
    }

    #[test]
    fn test_multiple_cells_restore_in_reverse_order() {
        let mut fx = Fixture::new();
        let mut hold = Hold::new();
        let a = ValueCell::new(1);
        let b = ValueCell::new(10);

        hold.begin();
        hold.hold_value(&a, None);
        a.set(2);
        hold.hold_value(&b, None);
        b.set(20);
        hold.accept("edit", &mut fx.ctx());

        hold.undo(&mut fx.ctx()).unwrap();
        assert_eq!((a.get(), b.get()), (1, 10));
        hold.redo(&mut fx.ctx()).unwrap();
        assert_eq!((a.get(), b.get()), (2, 20));
    }
}
