//! # dynattr_scene
//!
//! The object model the rest of the dynattr toolkit builds on: an arena
//! ([`Scene`]) that owns every live target in a document and enforces the
//! dependency-count lifetime rules, plus the memoized deep-clone service
//! ([`RemapContext`]) used when dependents are duplicated.
//!
//! Targets are trait objects implementing [`SceneTarget`]; typed access
//! goes through `Any` downcasts. All mutation is single-threaded, driven by
//! the embedding document's edit and undo dispatch.

pub mod remap;
pub mod scene;
pub mod target;

pub use remap::RemapContext;
pub use scene::Scene;
pub use target::{SceneTarget, TargetId};
