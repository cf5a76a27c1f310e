//! Error kind enums for different operation domains
//!
//! Fine-grained categorization of errors within each domain (Scene,
//! Reference, Block, Undo, Persist). The kinds are what callers match on
//! when they need to react programmatically; the surrounding error carries
//! the human-readable context.

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Specific kinds of scene/arena errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SceneErrorKind {
    #[error("Target not found")]
    TargetNotFound,
    #[error("Target already deleted")]
    TargetDeleted,
    #[error("Dependent count underflow")]
    RefCountUnderflow,
    #[error("Lock count underflow")]
    LockUnderflow,
}

/// Specific kinds of reference-table errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RefErrorKind {
    #[error("Slot index out of range")]
    InvalidIndex,
    #[error("Slot already occupied")]
    SlotOccupied,
    #[error("Slot not found")]
    SlotNotFound,
    #[error("Offset outside the array group")]
    InvalidOffset,
    #[error("Group is not an array")]
    NotAnArray,
    #[error("Target type mismatch")]
    TypeMismatch,
}

/// Specific kinds of parameter-block errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BlockErrorKind {
    #[error("Descriptor not found")]
    DescNotFound,
    #[error("Descriptor id already in use")]
    DuplicateId,
    #[error("Parameter not found")]
    ParamNotFound,
    #[error("Parameter value type mismatch")]
    ValueTypeMismatch,
    #[error("Attribute has no parameter block")]
    NoBlock,
}

/// Specific kinds of undo-system errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UndoErrorKind {
    #[error("No hold in progress")]
    NotHolding,
    #[error("Hold already in progress")]
    AlreadyHolding,
    #[error("Nothing to undo")]
    UndoStackEmpty,
    #[error("Nothing to redo")]
    RedoStackEmpty,
    #[error("Address is already held")]
    AlreadyHeld,
}

/// Specific kinds of persistence errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PersistErrorKind {
    #[error("Truncated chunk stream")]
    TruncatedStream,
    #[error("Duplicate header sub-chunk")]
    DuplicateHeader,
    #[error("Missing header sub-chunk")]
    MissingHeader,
    #[error("Unknown parameter type tag")]
    UnknownParamType,
    #[error("Chunk closed out of order")]
    ChunkOrder,
}
