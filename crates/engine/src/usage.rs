//! Deferred assignment of tentative objects
//!
//! An object read from the stream is tentative while a surrogate or a
//! real-object hook may still swap it for another instance. Every place the
//! tentative object gets stored is recorded as a [`UsageRef`]; once the
//! final object is known the recorded places are patched.
//!
//! Some places cannot be patched (queues, stacks, struct copies, key/value
//! pairs, bags handed to hooks). Storing a tentative object there clears the
//! `can_be_replaced` flag, and a later swap fails with an identity conflict.

use graphbin_core::{CollectionData, Error, HeapObject, ObjRef, Result, Value};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::debug;

/// A place holding a tentative object
#[derive(Debug, Clone)]
pub enum UsageRef {
    /// Instance field slot
    Field {
        /// Owning instance
        owner: ObjRef,
        /// Slot index
        slot: usize,
    },
    /// Array cell (row-major index)
    ArrayCell {
        /// Array
        array: ObjRef,
        /// Flat index
        index: usize,
    },
    /// Position in a list
    ListIndex {
        /// List
        list: ObjRef,
        /// Position
        index: usize,
    },
    /// Set addition postponed until the object is final
    CollectionAdd {
        /// Set
        collection: ObjRef,
    },
    /// Linked list node
    LinkedListNode {
        /// Linked list
        list: ObjRef,
        /// Node position
        index: usize,
    },
    /// Dictionary insertion postponed until the key is final
    DictionaryKey {
        /// Dictionary
        dictionary: ObjRef,
        /// Value to insert; may be the tentative key itself
        value: Value,
    },
    /// Dictionary value stored under a final key
    DictionaryValue {
        /// Dictionary
        dictionary: ObjRef,
        /// Key of the entry
        key: Value,
    },
    /// Key of an ordered dictionary entry
    OrderedKey {
        /// Ordered dictionary
        dictionary: ObjRef,
        /// Entry position
        position: usize,
    },
    /// Value of an ordered dictionary entry
    OrderedValue {
        /// Ordered dictionary
        dictionary: ObjRef,
        /// Entry position
        position: usize,
    },
}

/// Places of one tentative object
#[derive(Debug, Default)]
pub struct Usages {
    refs: SmallVec<[UsageRef; 2]>,
    can_be_replaced: bool,
}

/// Tentative objects of the root being read
#[derive(Debug, Default)]
pub struct UsageTracker {
    pending: FxHashMap<usize, Usages>,
}

impl UsageTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a freshly allocated tentative object
    pub fn track(&mut self, obj: &ObjRef) {
        self.pending.insert(
            obj.addr(),
            Usages {
                refs: SmallVec::new(),
                can_be_replaced: true,
            },
        );
    }

    /// Whether `value` is a tentative object
    pub fn is_tentative(&self, value: &Value) -> bool {
        match value {
            Value::Ref(obj) => self.pending.contains_key(&obj.addr()),
            _ => false,
        }
    }

    /// Number of unresolved objects
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Record a patchable place of `value`; returns false if it is not tentative
    pub fn record(&mut self, value: &Value, usage: UsageRef) -> bool {
        match value {
            Value::Ref(obj) => match self.pending.get_mut(&obj.addr()) {
                Some(usages) => {
                    usages.refs.push(usage);
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    /// Record that `value` was stored where it cannot be patched
    pub fn pin(&mut self, value: &Value) {
        if let Value::Ref(obj) = value {
            if let Some(usages) = self.pending.get_mut(&obj.addr()) {
                usages.can_be_replaced = false;
            }
        }
    }

    /// Finish a tentative object and patch its places with `real`
    ///
    /// Deferred insertions are applied even when `real` is the tentative
    /// object itself.
    pub fn resolve(&mut self, placeholder: &ObjRef, real: &Value) -> Result<()> {
        let usages = match self.pending.remove(&placeholder.addr()) {
            Some(usages) => usages,
            None => return Ok(()),
        };
        let replaced = !matches!(real, Value::Ref(r) if r.ptr_eq(placeholder));
        if replaced && !usages.can_be_replaced {
            return Err(Error::IdentityConflict(format!(
                "tentative {} was stored where it cannot be replaced",
                placeholder.runtime_type()
            )));
        }
        if replaced {
            debug!(
                target: "graphbin::de",
                from = %placeholder.runtime_type(),
                to = %real.type_name(),
                usages = usages.refs.len(),
                "Tentative object resolved"
            );
        }
        for usage in usages.refs {
            apply(usage, placeholder, real)?;
        }
        Ok(())
    }

    /// Drop every pending object
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

fn substitute(value: Value, placeholder: &ObjRef, real: &Value) -> Value {
    match &value {
        Value::Ref(r) if r.ptr_eq(placeholder) => real.clone(),
        _ => value,
    }
}

fn apply(usage: UsageRef, placeholder: &ObjRef, real: &Value) -> Result<()> {
    match usage {
        UsageRef::Field { owner, slot } => match &mut *owner.try_borrow_mut()? {
            HeapObject::Instance(instance) => set_slot(&mut instance.slots, slot, real),
            _ => Err(stale("field owner")),
        },
        UsageRef::ArrayCell { array, index } => match &mut *array.try_borrow_mut()? {
            HeapObject::Array(a) => set_slot(&mut a.items, index, real),
            _ => Err(stale("array")),
        },
        UsageRef::ListIndex { list, index } | UsageRef::LinkedListNode { list, index } => {
            match &mut *list.try_borrow_mut()? {
                HeapObject::Collection(c) => match c.data_mut() {
                    CollectionData::Seq(items) => set_slot(items, index, real),
                    CollectionData::Map(_) => Err(stale("list")),
                },
                _ => Err(stale("list")),
            }
        }
        UsageRef::CollectionAdd { collection } => match &mut *collection.try_borrow_mut()? {
            HeapObject::Collection(c) => c.add(real.clone()),
            _ => Err(stale("set")),
        },
        UsageRef::DictionaryKey { dictionary, value } => {
            let value = substitute(value, placeholder, real);
            match &mut *dictionary.try_borrow_mut()? {
                HeapObject::Collection(c) => c.insert(real.clone(), value),
                _ => Err(stale("dictionary")),
            }
        }
        UsageRef::DictionaryValue { dictionary, key } => {
            match &mut *dictionary.try_borrow_mut()? {
                HeapObject::Collection(c) => match c.data_mut() {
                    CollectionData::Map(entries) => {
                        match entries.iter_mut().find(|(k, _)| k.key_eq(&key)) {
                            Some((_, v)) => {
                                *v = real.clone();
                                Ok(())
                            }
                            None => Err(stale("dictionary entry")),
                        }
                    }
                    CollectionData::Seq(_) => Err(stale("dictionary")),
                },
                _ => Err(stale("dictionary")),
            }
        }
        UsageRef::OrderedKey {
            dictionary,
            position,
        } => patch_entry(&dictionary, position, |entry| entry.0 = real.clone()),
        UsageRef::OrderedValue {
            dictionary,
            position,
        } => patch_entry(&dictionary, position, |entry| entry.1 = real.clone()),
    }
}

fn patch_entry(
    dictionary: &ObjRef,
    position: usize,
    patch: impl FnOnce(&mut (Value, Value)),
) -> Result<()> {
    match &mut *dictionary.try_borrow_mut()? {
        HeapObject::Collection(c) => match c.data_mut() {
            CollectionData::Map(entries) => match entries.get_mut(position) {
                Some(entry) => {
                    patch(entry);
                    Ok(())
                }
                None => Err(stale("ordered entry")),
            },
            CollectionData::Seq(_) => Err(stale("ordered dictionary")),
        },
        _ => Err(stale("ordered dictionary")),
    }
}

fn set_slot(slots: &mut [Value], index: usize, real: &Value) -> Result<()> {
    match slots.get_mut(index) {
        Some(slot) => {
            *slot = real.clone();
            Ok(())
        }
        None => Err(stale("slot")),
    }
}

fn stale(what: &str) -> Error {
    Error::InvalidOperation(format!("recorded {} no longer matches its usage", what))
}
