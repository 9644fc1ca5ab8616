use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::{SimError, SimResult};
use crate::sim_if::sim_if;
use crate::trigger::Trigger;

thread_local! {
    static OBJ_CACHE: RefCell<HashMap<String, SimObject>> = RefCell::new(HashMap::new());
}

// handles are only valid for one simulation
pub(crate) fn clear_cache() {
    OBJ_CACHE.with(|c| c.borrow_mut().clear());
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimObject {
    pub(crate) handle: usize,
    pub(crate) kind: ObjectKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    /// Net, register or bit-select of the given width.
    Int(u32),
    Hier,
    Other,
}

impl SimObject {
    pub fn new(handle: usize, kind: ObjectKind) -> Self {
        SimObject { handle, kind }
    }

    pub fn handle(&self) -> usize {
        self.handle
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn name(&self) -> SimResult<String> {
        sim_if().get_full_name(self)
    }

    pub fn size(&self) -> Option<u32> {
        match self.kind {
            ObjectKind::Int(size) => Some(size),
            _ => None,
        }
    }

    pub fn get_root() -> SimResult<Self> {
        sim_if().get_root_object()
    }

    pub fn from_name(full_name: &str) -> SimResult<Self> {
        if let Some(obj) = OBJ_CACHE.with(|c| c.borrow().get(full_name).copied()) {
            return Ok(obj);
        }
        let obj = sim_if().get_object_by_name(full_name)?;
        OBJ_CACHE.with(|c| c.borrow_mut().insert(full_name.to_string(), obj));
        Ok(obj)
    }

    pub fn get_child(&self, name: &str) -> SimResult<Self> {
        let mut child_name = self.name()?;
        child_name.push('.');
        child_name.push_str(name);
        SimObject::from_name(&child_name)
    }

    /// Shorthand for `get_child`.
    pub fn c(&self, name: &str) -> SimResult<Self> {
        self.get_child(name)
    }

    /// Bit-select `index` of a vector object.
    pub fn idx(&self, index: u32) -> SimResult<Self> {
        match self.kind {
            ObjectKind::Int(size) if index < size => sim_if().get_object_by_index(self, index),
            _ => Err(SimError::IndexOutOfRange {
                name: self.name()?,
                index,
            }),
        }
    }

    pub fn u32(&self) -> SimResult<u32> {
        self.check_value()?;
        sim_if().get_value(self)
    }

    pub fn bin(&self) -> SimResult<String> {
        self.check_value()?;
        sim_if().get_value_bin(self)
    }

    pub fn set(&self, val: u32) -> SimResult<()> {
        self.check_value()?;
        sim_if().set_value(self, val)
    }

    pub fn set_bin(&self, val: &str) -> SimResult<()> {
        let size = match self.kind {
            ObjectKind::Int(size) => size,
            _ => return Err(SimError::NoValue(self.name()?)),
        };
        // remove '_' and 0b
        let stripped = val.replace("0b", "").replace('_', "");
        if stripped.len() != size as usize {
            return Err(SimError::InvalidValue {
                name: self.name()?,
                value: val.to_string(),
                reason: "length mismatch",
            });
        }
        if !stripped.chars().all(valid_char) {
            return Err(SimError::InvalidValue {
                name: self.name()?,
                value: val.to_string(),
                reason: "invalid characters",
            });
        }
        sim_if().set_value_bin(self, &stripped)
    }

    fn check_value(&self) -> SimResult<()> {
        match self.kind {
            ObjectKind::Int(_) => Ok(()),
            _ => Err(SimError::NoValue(self.name()?)),
        }
    }

    // convenience functions to get edge triggers for this signal
    pub fn rising_edge(self) -> Trigger {
        Trigger::rising_edge(self)
    }
    pub async fn rising_edge_ro(self) -> SimResult<()> {
        self.rising_edge().await?;
        Trigger::read_only().await
    }
    pub async fn rising_edge_rw(self) -> SimResult<()> {
        self.rising_edge().await?;
        Trigger::read_write().await
    }
    pub fn falling_edge(self) -> Trigger {
        Trigger::falling_edge(self)
    }
    pub async fn falling_edge_ro(self) -> SimResult<()> {
        self.falling_edge().await?;
        Trigger::read_only().await
    }
    pub fn edge(self) -> Trigger {
        Trigger::edge(self)
    }
}

fn valid_char(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), '0' | '1' | 'z' | 'x')
}
