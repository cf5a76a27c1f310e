//! dynattr - runtime-defined parameter blocks with undo/redo bookkeeping
//!
//! This is a convenience crate that re-exports the main functionality
//! from the dynattr ecosystem for integration and testing.

pub use dynattr_blocks::{
    self, AttrHandle, BlockId, ClassTag, DescHandle, DescRegistry, DynAttr, ParamBlock,
    ParamBlockDesc, ParamId, ParamType, ParamValue,
};
pub use dynattr_error::{DynattrError, Result};
pub use dynattr_refs::{
    self, Ownership, PartId, Persistence, RefHandle, RefMessage, RefTable, RefVec,
};
pub use dynattr_scene::{RemapContext, Scene, SceneTarget, TargetId};
pub use dynattr_undo::{
    self, replace_param_block, DescSwapRestore, Hold, RestoreCtx, TabCell, ValueCell,
};
