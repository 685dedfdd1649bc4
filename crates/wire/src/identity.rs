//! Object identity caches
//!
//! Heap objects receive ids in traversal order, starting at 1; id 0 stands
//! for null. The writer maps object addresses to ids and keeps every written
//! object alive until the stream is finished, so an address can never be
//! reused by a temporary object produced mid-serialization.
//!
//! ```text
//! id field:  0 = null | 1..=count = existing | count+1 = new object follows
//! ```
//!
//! On the reader side an id slot may be replaced exactly once, when a
//! tentatively created object resolves to its real instance.

use crate::descriptor::TypeDescriptor;
use graphbin_core::{Error, ObjRef, Result, Value};
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// Meaning of a decoded id field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdField {
    /// Null reference
    Null,
    /// Previously read object
    Existing(u32),
    /// A new object follows
    New,
}

impl IdField {
    /// Decode against the number of ids assigned so far
    pub fn decode(raw: u32, count: u32) -> Result<IdField> {
        match raw {
            0 => Ok(IdField::Null),
            id if id <= count => Ok(IdField::Existing(id)),
            id if id == count + 1 => Ok(IdField::New),
            id => Err(Error::invalid_stream(format!(
                "object id {} out of range ({} objects read)",
                id, count
            ))),
        }
    }
}

struct WrittenObject {
    id: u32,
    header: Option<Rc<TypeDescriptor>>,
}

/// Writer side: object -> id
#[derive(Default)]
pub struct IdentityWriter {
    ids: FxHashMap<usize, WrittenObject>,
    keep_alive: Vec<ObjRef>,
}

impl IdentityWriter {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Id and polymorphic header of an already written object
    pub fn lookup(&self, obj: &ObjRef) -> Option<(u32, Option<Rc<TypeDescriptor>>)> {
        self.ids
            .get(&obj.addr())
            .map(|w| (w.id, w.header.clone()))
    }

    /// Assign the next id to a new object
    ///
    /// `header` is the descriptor used when the object was first written
    /// polymorphically; later back references repeat it.
    pub fn register(&mut self, obj: &ObjRef, header: Option<Rc<TypeDescriptor>>) -> u32 {
        let id = self.keep_alive.len() as u32 + 1;
        self.ids.insert(obj.addr(), WrittenObject { id, header });
        self.keep_alive.push(obj.clone());
        id
    }

    /// Record the header of an object first written without one
    pub fn set_header(&mut self, obj: &ObjRef, header: Rc<TypeDescriptor>) {
        if let Some(w) = self.ids.get_mut(&obj.addr()) {
            if w.header.is_none() {
                w.header = Some(header);
            }
        }
    }

    /// Number of ids assigned
    pub fn count(&self) -> u32 {
        self.keep_alive.len() as u32
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Set(Value),
    Replaced(Value),
}

/// Reader side: id -> object
#[derive(Debug, Default)]
pub struct IdentityReader {
    slots: Vec<Slot>,
}

impl IdentityReader {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ids assigned
    pub fn count(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Bind the next id to a newly created object
    pub fn add(&mut self, value: Value) -> u32 {
        self.slots.push(Slot::Set(value));
        self.slots.len() as u32
    }

    /// Object bound to an id; id 0 is null
    pub fn get(&self, id: u32) -> Result<Value> {
        if id == 0 {
            return Ok(Value::Null);
        }
        match self.slots.get(id as usize - 1) {
            Some(Slot::Set(v)) | Some(Slot::Replaced(v)) => Ok(v.clone()),
            None => Err(Error::invalid_stream(format!("unknown object id {}", id))),
        }
    }

    /// Replace the object bound to an id; allowed once per id
    pub fn replace(&mut self, id: u32, value: Value) -> Result<()> {
        let slot = id
            .checked_sub(1)
            .and_then(|i| self.slots.get_mut(i as usize))
            .ok_or_else(|| Error::invalid_stream(format!("unknown object id {}", id)))?;
        if matches!(slot, Slot::Replaced(_)) {
            return Err(Error::IdentityConflict(format!(
                "object id {} was already replaced",
                id
            )));
        }
        *slot = Slot::Replaced(value);
        Ok(())
    }
}
