// dynattr_undo/src/lib.rs

//! # dynattr_undo
//!
//! Undo/redo bookkeeping for dynamic-attribute documents: storage cells
//! with stable address identity, the held-pointer registry that prevents
//! double registration, scalar and array-element restore records, the
//! hold manager with its undo/redo queues, and the descriptor-swap
//! command that coordinates descriptor lifetime across parameter-block
//! replacement.
//!
//! Everything is single-threaded and context-driven: records receive a
//! [`RestoreCtx`] instead of reaching for globals, and queue eviction is
//! an explicit hook rather than a drop side effect, so deferred cleanup
//! (the obsolete-descriptor sweep) happens at well-defined points.
//!
//! Call order is strict and host-driven: hold → end-hold → any sequence
//! of restore/redo → evict. The manager enforces it; records assert it.

pub mod cell;
pub mod held;
pub mod hold;
pub mod restore;
pub mod swap;

pub use cell::{block_values_cell, CellId, TabCell, ValueCell};
pub use held::HeldState;
pub use hold::Hold;
pub use restore::{DataRestore, RestoreCallback, RestoreCtx, RestoreObj, TabDataRestore};
pub use swap::{replace_param_block, DescSwapRestore};
