//! Target identity and the trait all scene-owned objects implement.

use std::any::Any;
use std::fmt;

/// Stable identity of a target owned by a [`Scene`](crate::Scene).
///
/// Ids are allocated monotonically and never reused within one scene, so a
/// stale id held across a deletion resolves to "not found" rather than to a
/// different object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An object that can live in a [`Scene`](crate::Scene) and be pointed at
/// by reference slots.
///
/// Implementors provide downcast access for typed handles and a deep-clone
/// hook used by the remap service when a dependent object is duplicated.
pub trait SceneTarget: Any {
    /// Short name of the concrete type, for logging and diagnostics.
    fn type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Deep-clone this target. Shared sub-structure (for example a
    /// parameter-block descriptor handle) may be shared by the clone.
    fn clone_node(&self) -> Box<dyn SceneTarget>;
}
