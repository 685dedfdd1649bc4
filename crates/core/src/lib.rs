//! Core types for graphbin
//!
//! This crate defines the object model shared by the codec and the engine:
//! - Type / KnownType / CollectionKind: runtime type handles
//! - TypeDef: user-defined classes, structs, interfaces and enums
//! - Value / ObjRef / HeapObject: dynamic values with shared identity
//! - Hooks: custom serializers, surrogates, object references, callbacks
//! - TypeRegistry / SerializationBinder: name to type resolution
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builtins;
pub mod compare;
pub mod error;
pub mod hooks;
pub mod info;
pub mod registry;
pub mod typedef;
pub mod types;
pub mod value;

pub use builtins::{
    BitVectorSection, DateTime, DateTimeKind, DateTimeOffset, Decimal, StringBuilder, TimeSpan,
    Uri, Version,
};
pub use compare::graph_eq;
pub use error::{Error, ErrorKind, Result};
pub use hooks::{
    BinarySerializable, CustomSerializer, DeserializationCallback, ObjectReference,
    SerializationEvents, SerializationSurrogate, SurrogateSelector, SurrogateTable, TypeHooks,
};
pub use info::{InfoEntry, SerializationInfo};
pub use registry::{NameMapBinder, SerializationBinder, TypeRegistry, TypeResolver};
pub use typedef::{
    FieldDef, FieldLayout, LayoutField, LayoutLevel, TypeDef, TypeDefBuilder, TypeDefKind,
    TypeDefRef,
};
pub use types::{ArrayRank, CollectionKind, IntegerKind, KnownType, Type};
pub use value::{
    ArrayObject, CollectionData, CollectionObject, DictionaryEntry, EnumValue, HeapObject,
    Instance, KeyValuePair, ObjRef, Value,
};
