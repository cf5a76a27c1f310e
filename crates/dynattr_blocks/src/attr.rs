//! The dynamic-attribute owner object.

use crate::block::ParamBlock;
use crate::desc::DescHandle;
use dynattr_error::Result;
use dynattr_refs::{PartId, RefHandle, RefMessage, RefResult, RefTable};
use dynattr_scene::{Scene, TargetId};
use std::cell::RefCell;
use std::rc::Rc;

/// Reference group holding the attribute's parameter block.
pub const BLOCK_REF: usize = 0;

/// A runtime-defined attribute: owns a reference table and keeps its
/// parameter block in reference group 0.
///
/// The attribute is a plain struct embedding its [`RefTable`]; the
/// dependency-system surface is exposed as delegation methods. Documents
/// hold attributes through [`AttrHandle`] so undo records can reach the
/// live state when they finalize.
pub struct DynAttr {
    name: String,
    refs: RefTable,
    block: RefHandle<ParamBlock>,
}

/// Shared handle to an attribute.
pub type AttrHandle = Rc<RefCell<DynAttr>>;

impl DynAttr {
    pub fn new<S: Into<String>>(scene: &mut Scene, name: S) -> Result<Self> {
        let mut refs = RefTable::new();
        let block = RefHandle::new(&mut refs, scene, BLOCK_REF, None, None)?;
        Ok(DynAttr {
            name: name.into(),
            refs,
            block,
        })
    }

    pub fn new_handle<S: Into<String>>(scene: &mut Scene, name: S) -> Result<AttrHandle> {
        Ok(Rc::new(RefCell::new(Self::new(scene, name)?)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    // Delegation to the embedded reference table.

    pub fn num_refs(&self) -> usize {
        self.refs.num_refs()
    }

    pub fn get_reference(&self, n: usize) -> Option<TargetId> {
        self.refs.get_reference(n)
    }

    pub fn notify(
        &mut self,
        scene: &mut Scene,
        target: TargetId,
        message: RefMessage,
        part: PartId,
    ) -> RefResult {
        self.refs.notify(scene, target, message, part)
    }

    pub fn refs(&self) -> &RefTable {
        &self.refs
    }

    pub fn refs_mut(&mut self) -> &mut RefTable {
        &mut self.refs
    }

    // Block access.

    /// The referenced block's target id, if one is assigned and alive.
    pub fn block_target(&self) -> Option<TargetId> {
        self.block.get(&self.refs)
    }

    /// Point the attribute at a different block (or none).
    pub fn set_block(&mut self, scene: &mut Scene, target: Option<TargetId>) -> Result<()> {
        self.block.set(&mut self.refs, scene, target)
    }

    pub fn param_block<'a>(&self, scene: &'a Scene) -> Option<&'a ParamBlock> {
        self.block.target(&self.refs, scene)
    }

    /// Descriptor of the live block, if any.
    pub fn block_desc(&self, scene: &Scene) -> Option<DescHandle> {
        Some(self.param_block(scene)?.desc())
    }
}
