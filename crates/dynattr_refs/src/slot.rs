//! Slot records and the notification vocabulary.

use dynattr_scene::TargetId;
use std::fmt;

/// Stable identity of one slot within a [`RefTable`](crate::RefTable).
///
/// Identity survives index shifts caused by inserts and erases in the
/// dynamic region; the table index of a slot must always be re-derived via
/// [`RefTable::index_of`](crate::RefTable::index_of).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub(crate) u64);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot:{}", self.0)
    }
}

/// Logical reference-group id. Groups below the table's dynamic base are
/// static (one slot each); groups at or above it are resizable arrays.
pub type GroupId = usize;

/// Whether a slot keeps its target alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Counts as a dependent; target is deep-cloned on duplication.
    Strong,
    /// Does not keep the target alive; copied, not cloned, on duplication.
    Weak,
}

/// Whether a slot's value is written to the saved document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    Persisted,
    Transient,
}

/// Change-notification messages delivered to managed slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefMessage {
    /// The target mutated; `PartId` narrows which aspect.
    Changed,
    /// The target was removed from the scene.
    TargetDeleted,
}

/// Bitmask describing which part of a target a change touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartId(pub u32);

impl PartId {
    pub const ALL: PartId = PartId(u32::MAX);

    pub fn intersects(self, other: PartId) -> bool {
        self.0 & other.0 != 0
    }
}

/// Outcome of a notification dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefResult {
    Succeed,
    Fail,
}

/// Per-slot notification callback, invoked before default message handling.
pub type NotifyCallback = Box<dyn FnMut(RefMessage, PartId) -> RefResult>;

/// One managed reference: the target pointer, its ownership tags, and an
/// optional notification callback owned by the slot.
pub struct RefSlot {
    pub(crate) id: SlotId,
    pub(crate) target: Option<TargetId>,
    pub(crate) ownership: Ownership,
    pub(crate) persistence: Persistence,
    pub(crate) callback: Option<NotifyCallback>,
}

impl RefSlot {
    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn target(&self) -> Option<TargetId> {
        self.target
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn persistence(&self) -> Persistence {
        self.persistence
    }

    pub fn is_weak(&self) -> bool {
        self.ownership == Ownership::Weak
    }

    pub fn is_persisted(&self) -> bool {
        self.persistence == Persistence::Persisted
    }

    /// Replace the slot's callback, dropping any previous one.
    pub fn set_callback(&mut self, callback: Option<NotifyCallback>) {
        self.callback = callback;
    }
}

impl fmt::Debug for RefSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefSlot")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("ownership", &self.ownership)
            .field("persistence", &self.persistence)
            .field("callback", &self.callback.as_ref().map(|_| "<callback>"))
            .finish()
    }
}
