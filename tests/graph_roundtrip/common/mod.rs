//! Shared fixtures for the graph round-trip suite.
//!
//! Import via `mod common;` from main.rs, then `use crate::common::*;`.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::cell::RefCell;
use std::rc::Rc;

pub use graphbin::{
    graph_eq, ArrayObject, BinarySerializationFormatter, CollectionKind, CollectionObject,
    DeserializationCallback, EnumValue, Error, ErrorKind, HeapObject, Instance, IntegerKind,
    KnownType, NameMapBinder, ObjRef, Result, SerializationInfo, SerializerOptions, SurrogateTable,
    Type, TypeDef, TypeDefRef, TypeRegistry, Value,
};

// ============================================================================
// Type fixtures
// ============================================================================

/// `App.Person { name: String, age: Int32, friend: Object }`
pub fn person_type() -> TypeDefRef {
    TypeDef::class("App.Person")
        .assembly("App")
        .field("name", Type::string())
        .field("age", Type::known(KnownType::I32))
        .field("friend", Type::object())
        .build()
}

/// `App.Node { label: String, next: Object }`
pub fn node_type() -> TypeDefRef {
    TypeDef::class("App.Node")
        .assembly("App")
        .field("label", Type::string())
        .field("next", Type::object())
        .build()
}

pub fn person(def: &TypeDefRef, name: &str, age: i32) -> ObjRef {
    ObjRef::instance(
        Instance::new(def)
            .with("name", Value::from(name))
            .with("age", Value::I32(age)),
    )
}

pub fn node(def: &TypeDefRef, label: &str) -> ObjRef {
    ObjRef::instance(Instance::new(def).with("label", Value::from(label)))
}

pub fn list_of(element: Type, items: Vec<Value>) -> ObjRef {
    let mut list = CollectionObject::new(CollectionKind::List, vec![element])
        .expect("list takes one argument");
    for item in items {
        list.add(item).expect("list add");
    }
    ObjRef::collection(list)
}

pub fn object_array(items: Vec<Value>) -> ObjRef {
    ObjRef::array(ArrayObject::vector(Type::object(), items))
}

/// Items of an array or sequence collection
pub fn items_of(value: &Value) -> Vec<Value> {
    let obj = value.as_ref().expect("heap object");
    let heap = obj.borrow();
    match &*heap {
        HeapObject::Array(array) => array.items.clone(),
        HeapObject::Collection(collection) => collection.items().to_vec(),
        other => panic!("{} has no items", other.runtime_type()),
    }
}

pub fn same(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Ref(x), Value::Ref(y)) => x.ptr_eq(y),
        _ => false,
    }
}

// ============================================================================
// Formatter helpers
// ============================================================================

pub fn formatter(defs: &[&TypeDefRef]) -> BinarySerializationFormatter {
    let mut registry = TypeRegistry::new();
    registry.register_all(defs.iter().copied());
    BinarySerializationFormatter::new().with_registry(registry)
}

pub fn round_trip(formatter: &BinarySerializationFormatter, value: &Value) -> Value {
    let bytes = formatter.serialize(value).expect("serialize");
    formatter.deserialize(&bytes).expect("deserialize")
}

pub fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

// ============================================================================
// Hook fixtures
// ============================================================================

/// Shared log written by hooks
#[derive(Clone, Default)]
pub struct Log(Rc<RefCell<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

/// Records the `name` field of every object it is called for
pub struct NameRecorder {
    pub log: Log,
}

impl DeserializationCallback for NameRecorder {
    fn on_deserialization(&self, obj: &Value) -> Result<()> {
        let name = obj
            .as_ref()
            .and_then(|o| o.field("name"))
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        self.log.push(name);
        Ok(())
    }
}
