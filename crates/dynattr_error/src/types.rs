//! Main error type and Result alias
//!
//! `DynattrError` is an enum with one struct variant per domain. Each
//! variant carries a message, the domain's kind enum, and whatever context
//! the domain can attach (operation name, slot index, block id, ...).

use crate::kinds::{
    BlockErrorKind, PersistErrorKind, RefErrorKind, SceneErrorKind, UndoErrorKind,
};
use thiserror::Error;

/// Result type alias used across the dynattr crates
pub type Result<T> = std::result::Result<T, DynattrError>;

/// Unified error type for the dynattr toolkit
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DynattrError {
    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("Scene error: {message} ({kind})")]
    Scene {
        message: String,
        kind: SceneErrorKind,
        target: Option<u64>,
    },

    #[error("Reference error: {message} ({kind})")]
    Reference {
        message: String,
        kind: RefErrorKind,
        slot_index: Option<usize>,
        operation: Option<String>,
    },

    #[error("Block error: {message} ({kind})")]
    Block {
        message: String,
        kind: BlockErrorKind,
        block_id: Option<u16>,
        operation: Option<String>,
    },

    #[error("Undo error: {message} ({kind})")]
    Undo {
        message: String,
        kind: UndoErrorKind,
    },

    #[error("Persistence error: {message} ({kind})")]
    Persist {
        message: String,
        kind: PersistErrorKind,
        chunk_tag: Option<u16>,
    },
}

// === Constructors ===

impl DynattrError {
    pub fn io<M: Into<String>>(message: M) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn scene<M: Into<String>>(message: M, kind: SceneErrorKind) -> Self {
        Self::Scene {
            message: message.into(),
            kind,
            target: None,
        }
    }

    pub fn reference<M: Into<String>>(message: M, kind: RefErrorKind) -> Self {
        Self::Reference {
            message: message.into(),
            kind,
            slot_index: None,
            operation: None,
        }
    }

    pub fn block<M: Into<String>>(message: M, kind: BlockErrorKind) -> Self {
        Self::Block {
            message: message.into(),
            kind,
            block_id: None,
            operation: None,
        }
    }

    pub fn undo<M: Into<String>>(message: M, kind: UndoErrorKind) -> Self {
        Self::Undo {
            message: message.into(),
            kind,
        }
    }

    pub fn persist<M: Into<String>>(message: M, kind: PersistErrorKind) -> Self {
        Self::Persist {
            message: message.into(),
            kind,
            chunk_tag: None,
        }
    }
}

// === Contextual builder methods ===

impl DynattrError {
    /// Add target-id context to scene errors
    pub fn with_target(mut self, id: u64) -> Self {
        if let Self::Scene { target, .. } = &mut self {
            *target = Some(id);
        }
        self
    }

    /// Add slot-index context to reference errors
    pub fn with_slot_index(mut self, index: usize) -> Self {
        if let Self::Reference { slot_index, .. } = &mut self {
            *slot_index = Some(index);
        }
        self
    }

    /// Add block-id context to block errors
    pub fn with_block_id(mut self, id: u16) -> Self {
        if let Self::Block { block_id, .. } = &mut self {
            *block_id = Some(id);
        }
        self
    }

    /// Add operation context to reference and block errors
    pub fn with_operation<O: Into<String>>(mut self, op: O) -> Self {
        match &mut self {
            Self::Reference { operation, .. } => *operation = Some(op.into()),
            Self::Block { operation, .. } => *operation = Some(op.into()),
            _ => {}
        }
        self
    }

    /// Add chunk-tag context to persistence errors
    pub fn with_chunk_tag(mut self, tag: u16) -> Self {
        if let Self::Persist { chunk_tag, .. } = &mut self {
            *chunk_tag = Some(tag);
        }
        self
    }
}

// === Type checking methods ===

impl DynattrError {
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    pub fn is_scene(&self) -> bool {
        matches!(self, Self::Scene { .. })
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference { .. })
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Self::Block { .. })
    }

    pub fn is_undo(&self) -> bool {
        matches!(self, Self::Undo { .. })
    }

    pub fn is_persist(&self) -> bool {
        matches!(self, Self::Persist { .. })
    }
}

// === Context accessors ===

impl DynattrError {
    /// Slot index attached to a reference error, if any
    pub fn slot_index(&self) -> Option<usize> {
        match self {
            Self::Reference { slot_index, .. } => *slot_index,
            _ => None,
        }
    }

    /// Block id attached to a block error, if any
    pub fn block_id(&self) -> Option<u16> {
        match self {
            Self::Block { block_id, .. } => *block_id,
            _ => None,
        }
    }
}

impl From<std::io::Error> for DynattrError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}
