//! Kind-specific insertion of decoded items
//!
//! Each collection kind is mapped once to an [`InsertStrategy`]. The
//! strategy decides whether a tentative item can be stored right away with a
//! patchable usage, has to be deferred until it is final, or gets pinned
//! because the place it lands in cannot be patched later.

use crate::usage::{UsageRef, UsageTracker};
use graphbin_core::{CollectionKind, CollectionObject, Error, HeapObject, ObjRef, Result, Value};

/// Insert operation of one collection kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InsertStrategy {
    /// Indexed sequence (`List`, `ArrayList`)
    Append,
    /// Node sequence (`LinkedList`)
    Linked,
    /// Deduplicating set; tentative items are added once final
    Set,
    /// Queue or stack; items cannot be patched in place
    Pinned,
    /// Hashed or sorted map
    Map,
    /// Insertion-ordered map patched by position
    Ordered,
}

impl InsertStrategy {
    pub(crate) fn for_kind(kind: CollectionKind) -> InsertStrategy {
        match kind {
            CollectionKind::List | CollectionKind::ArrayList => InsertStrategy::Append,
            CollectionKind::LinkedList => InsertStrategy::Linked,
            CollectionKind::HashSet | CollectionKind::SortedSet => InsertStrategy::Set,
            CollectionKind::Queue
            | CollectionKind::Stack
            | CollectionKind::NonGenericQueue
            | CollectionKind::NonGenericStack
            | CollectionKind::KeyValuePair
            | CollectionKind::DictionaryEntry => InsertStrategy::Pinned,
            CollectionKind::Dictionary
            | CollectionKind::SortedDictionary
            | CollectionKind::SortedList
            | CollectionKind::Hashtable
            | CollectionKind::NonGenericSortedList => InsertStrategy::Map,
            CollectionKind::OrderedDictionary => InsertStrategy::Ordered,
        }
    }

    /// Store a sequence item
    pub(crate) fn add(self, usages: &mut UsageTracker, target: &ObjRef, item: Value) -> Result<()> {
        match self {
            InsertStrategy::Append | InsertStrategy::Linked => {
                let index = with_collection(target, |c| {
                    let index = c.len();
                    c.add(item.clone())?;
                    Ok(index)
                })?;
                let usage = if self == InsertStrategy::Append {
                    UsageRef::ListIndex {
                        list: target.clone(),
                        index,
                    }
                } else {
                    UsageRef::LinkedListNode {
                        list: target.clone(),
                        index,
                    }
                };
                usages.record(&item, usage);
                Ok(())
            }
            InsertStrategy::Set => {
                if usages.is_tentative(&item) {
                    usages.record(
                        &item,
                        UsageRef::CollectionAdd {
                            collection: target.clone(),
                        },
                    );
                    return Ok(());
                }
                with_collection(target, |c| c.add(item))
            }
            InsertStrategy::Pinned => {
                usages.pin(&item);
                with_collection(target, |c| c.add(item))
            }
            InsertStrategy::Map | InsertStrategy::Ordered => Err(Error::InvalidOperation(
                "dictionary items need a key".to_string(),
            )),
        }
    }

    /// Store a dictionary entry
    pub(crate) fn insert(
        self,
        usages: &mut UsageTracker,
        target: &ObjRef,
        key: Value,
        value: Value,
    ) -> Result<()> {
        match self {
            InsertStrategy::Map => {
                let key_tentative = usages.is_tentative(&key);
                let value_tentative = usages.is_tentative(&value);
                match (key_tentative, value_tentative) {
                    (false, false) => with_collection(target, |c| c.insert(key, value)),
                    (true, false) => {
                        usages.record(
                            &key,
                            UsageRef::DictionaryKey {
                                dictionary: target.clone(),
                                value,
                            },
                        );
                        Ok(())
                    }
                    (false, true) => {
                        with_collection(target, |c| c.insert(key.clone(), value.clone()))?;
                        usages.record(
                            &value,
                            UsageRef::DictionaryValue {
                                dictionary: target.clone(),
                                key,
                            },
                        );
                        Ok(())
                    }
                    (true, true) if same_object(&key, &value) => {
                        usages.record(
                            &key,
                            UsageRef::DictionaryKey {
                                dictionary: target.clone(),
                                value,
                            },
                        );
                        Ok(())
                    }
                    (true, true) => {
                        usages.pin(&key);
                        usages.pin(&value);
                        with_collection(target, |c| c.insert(key, value))
                    }
                }
            }
            InsertStrategy::Ordered => {
                let position = with_collection(target, |c| {
                    let position = c.len();
                    c.insert(key.clone(), value.clone())?;
                    Ok(position)
                })?;
                usages.record(
                    &key,
                    UsageRef::OrderedKey {
                        dictionary: target.clone(),
                        position,
                    },
                );
                usages.record(
                    &value,
                    UsageRef::OrderedValue {
                        dictionary: target.clone(),
                        position,
                    },
                );
                Ok(())
            }
            _ => Err(Error::InvalidOperation(
                "sequence collections take no keys".to_string(),
            )),
        }
    }
}

fn same_object(a: &Value, b: &Value) -> bool {
    matches!((a, b), (Value::Ref(x), Value::Ref(y)) if x.ptr_eq(y))
}

fn with_collection<T>(
    target: &ObjRef,
    f: impl FnOnce(&mut CollectionObject) -> Result<T>,
) -> Result<T> {
    match &mut *target.try_borrow_mut()? {
        HeapObject::Collection(c) => f(c),
        other => Err(Error::InvalidOperation(format!(
            "{} is not a collection",
            other.runtime_type()
        ))),
    }
}
