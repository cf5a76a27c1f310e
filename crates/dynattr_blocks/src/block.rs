//! Parameter-block instances.

use crate::desc::DescHandle;
use crate::param::{BlockId, ParamId, ParamValue};
use dynattr_error::{BlockErrorKind, DynattrError, Result};
use dynattr_scene::SceneTarget;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to a block's value storage. Undo records hold this to
/// write values back; the allocation address doubles as the storage's
/// stable identity for hold tracking.
pub type ValueTab = Rc<RefCell<Vec<ParamValue>>>;

/// A live parameter block: one descriptor plus the values it shapes.
///
/// Blocks live in the scene arena so descriptor-id collision checks can
/// enumerate them, and so attribute owners can reference them through
/// their slot tables.
pub struct ParamBlock {
    desc: DescHandle,
    values: ValueTab,
}

impl ParamBlock {
    /// Build a block with zero values for every parameter of `desc`.
    pub fn new(desc: DescHandle) -> Self {
        let values = desc
            .borrow()
            .params()
            .iter()
            .map(|d| ParamValue::default_for(d.ty))
            .collect();
        ParamBlock {
            desc,
            values: Rc::new(RefCell::new(values)),
        }
    }

    pub fn desc(&self) -> DescHandle {
        Rc::clone(&self.desc)
    }

    pub fn block_id(&self) -> BlockId {
        self.desc.borrow().id
    }

    /// Shared handle to the value storage, for undo holds.
    pub fn values(&self) -> ValueTab {
        Rc::clone(&self.values)
    }

    pub fn value(&self, id: ParamId) -> Option<ParamValue> {
        let index = self.desc.borrow().index_of(id)?;
        self.values.borrow().get(index).cloned()
    }

    /// Set a parameter's value; the value's type must match the
    /// descriptor's definition.
    pub fn set_value(&self, id: ParamId, value: ParamValue) -> Result<()> {
        let desc = self.desc.borrow();
        let Some(index) = desc.index_of(id) else {
            return Err(DynattrError::block(
                format!("no parameter {id} in {}", desc.id),
                BlockErrorKind::ParamNotFound,
            )
            .with_block_id(desc.id.0));
        };
        let def = &desc.params()[index];
        if def.ty != value.ty() {
            return Err(DynattrError::block(
                format!("parameter {id} holds {:?}", def.ty),
                BlockErrorKind::ValueTypeMismatch,
            )
            .with_block_id(desc.id.0));
        }
        let mut values = self.values.borrow_mut();
        // The descriptor may have grown since the last rebuild.
        while values.len() < desc.count() {
            let ty = desc.params()[values.len()].ty;
            values.push(ParamValue::default_for(ty));
        }
        values[index] = value;
        Ok(())
    }

    /// Re-shape the value storage after the descriptor gained or lost
    /// trailing parameters.
    pub fn rebuild(&self) {
        let desc = self.desc.borrow();
        let mut values = self.values.borrow_mut();
        while values.len() < desc.count() {
            let ty = desc.params()[values.len()].ty;
            values.push(ParamValue::default_for(ty));
        }
        values.truncate(desc.count());
    }
}

impl SceneTarget for ParamBlock {
    fn type_name(&self) -> &'static str {
        "ParamBlock"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clone_node(&self) -> Box<dyn SceneTarget> {
        // Clones share the descriptor; values are copied.
        Box::new(ParamBlock {
            desc: Rc::clone(&self.desc),
            values: Rc::new(RefCell::new(self.values.borrow().clone())),
        })
    }
}
