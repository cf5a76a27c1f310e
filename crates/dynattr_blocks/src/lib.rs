// dynattr_blocks/src/lib.rs

//! # dynattr_blocks
//!
//! Runtime-defined parameter blocks: the descriptor model, the per-class
//! descriptor registry with collision-free id management and two-phase
//! deferred deletion, live block instances, the attribute owner object,
//! and chunked binary persistence of descriptor shape.
//!
//! Only shape is persisted — a descriptor's id plus each parameter's type
//! tag and id. That is the minimum needed for saved block data to find
//! its descriptors again; everything presentational is rebuilt at load.

pub mod attr;
pub mod block;
pub mod chunk;
pub mod desc;
pub mod param;
pub mod registry;

pub use attr::{AttrHandle, DynAttr, BLOCK_REF};
pub use block::{ParamBlock, ValueTab};
pub use chunk::{ChunkReader, ChunkWriter, DESC_CHUNK, DESC_HDR_CHUNK, DESC_PARAM_CHUNK};
pub use desc::{ClassTag, DescHandle, ParamBlockDesc, ParamDef};
pub use param::{BlockId, ParamId, ParamType, ParamValue};
pub use registry::DescRegistry;
