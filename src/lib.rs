//! graphbin - compact binary serializer for object graphs
//!
//! graphbin writes arbitrary object graphs (shared references, cycles,
//! polymorphic fields, collections and user types) into a compact binary
//! stream and restores an equivalent graph from it.
//!
//! # Quick Start
//!
//! ```
//! use graphbin::{
//!     BinarySerializationFormatter, CollectionKind, CollectionObject, ObjRef, Type, Value,
//! };
//!
//! let mut list = CollectionObject::new(CollectionKind::List, vec![Type::string()]).unwrap();
//! list.add(Value::from("a")).unwrap();
//! list.add(Value::from("b")).unwrap();
//!
//! let formatter = BinarySerializationFormatter::new();
//! let bytes = formatter.serialize(&Value::Ref(ObjRef::collection(list))).unwrap();
//! let copy = formatter.deserialize(&bytes).unwrap();
//! assert_eq!(copy.runtime_type(), Some(Type::list(Type::string())));
//! ```
//!
//! # Architecture
//!
//! - `graphbin-core`: object model, type definitions, hooks and errors
//! - `graphbin-wire`: low level codec, type and identity caches
//! - `graphbin-engine`: serialization managers and the formatter

pub use graphbin_core::*;
pub use graphbin_engine::{
    BinarySerializationFormatter, DeserializationManager, ElementKind, SerializationManager,
    SerializerOptions, StreamNaming, UsageRef, UsageTracker, MAX_GRAPH_DEPTH,
};

/// Low level codec
pub mod wire {
    pub use graphbin_wire::*;
}
