//! Serialization hook traits
//!
//! Types opt into non-default behavior by attaching hook objects to their
//! [`TypeDef`](crate::TypeDef). The serializer consults them in a fixed order:
//!
//! 1. a [`SerializationSurrogate`] from the configured [`SurrogateSelector`]
//! 2. [`BinarySerializable`] (self-describing byte blob)
//! 3. [`CustomSerializer`] (name/value bag)
//! 4. default field graph
//!
//! [`SerializationEvents`] wrap every one of these, [`ObjectReference`]
//! replaces the restored object with its real counterpart, and
//! [`DeserializationCallback`] runs after the whole root has been read.

use crate::error::Result;
use crate::info::SerializationInfo;
use crate::typedef::TypeDefRef;
use crate::types::Type;
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::fmt;
use std::rc::Rc;

/// Type-owned custom serialization via a name/value bag
pub trait CustomSerializer {
    /// Fill `info` with the state of `obj`
    fn get_object_data(&self, obj: &Value, info: &mut SerializationInfo) -> Result<()>;

    /// Restore `obj` (freshly allocated, fields at defaults) from `info`
    fn set_object_data(&self, obj: &mut Value, info: &SerializationInfo) -> Result<()>;
}

/// Proxy objects that resolve to a different real object after deserialization
pub trait ObjectReference {
    /// Return the object that should replace `obj` in the graph
    fn get_real_object(&self, obj: &Value) -> Result<Value>;
}

/// Callback invoked after the whole graph has been restored
pub trait DeserializationCallback {
    /// Called once per restored object, last-registered first
    fn on_deserialization(&self, obj: &Value) -> Result<()>;
}

/// Self-describing binary encoding owned by the type
pub trait BinarySerializable {
    /// Encode `obj` to bytes
    fn to_bytes(&self, obj: &Value) -> Result<Vec<u8>>;

    /// Reconstruct an instance of `ty` from bytes
    fn from_bytes(&self, ty: &TypeDefRef, bytes: &[u8]) -> Result<Value>;
}

/// Lifecycle notifications around (de)serialization of one object
pub trait SerializationEvents {
    /// Before the object's content is written
    fn on_serializing(&self, _obj: &Value) -> Result<()> {
        Ok(())
    }

    /// After the object's content is written
    fn on_serialized(&self, _obj: &Value) -> Result<()> {
        Ok(())
    }

    /// After allocation, before content is read
    fn on_deserializing(&self, _obj: &Value) -> Result<()> {
        Ok(())
    }

    /// After content is read
    fn on_deserialized(&self, _obj: &Value) -> Result<()> {
        Ok(())
    }
}

/// Externally supplied serializer for a type
pub trait SerializationSurrogate {
    /// Fill `info` with the state of `obj`
    fn get_object_data(&self, obj: &Value, info: &mut SerializationInfo) -> Result<()>;

    /// Populate `obj` from `info`; the returned value replaces `obj` in the graph
    fn set_object_data(&self, obj: Value, info: &SerializationInfo) -> Result<Value>;
}

/// Source of surrogates keyed by type
pub trait SurrogateSelector {
    /// Surrogate for `ty`, if any
    fn surrogate_for(&self, ty: &Type) -> Option<Rc<dyn SerializationSurrogate>>;
}

/// Hooks attached to a type definition
#[derive(Clone, Default)]
pub struct TypeHooks {
    /// Name/value bag serialization
    pub custom: Option<Rc<dyn CustomSerializer>>,
    /// Real-object substitution
    pub object_reference: Option<Rc<dyn ObjectReference>>,
    /// Post-graph callback
    pub callback: Option<Rc<dyn DeserializationCallback>>,
    /// Byte-blob encoding
    pub binary: Option<Rc<dyn BinarySerializable>>,
    /// Lifecycle events
    pub events: Option<Rc<dyn SerializationEvents>>,
}

impl TypeHooks {
    /// No hook attached
    pub fn is_empty(&self) -> bool {
        self.custom.is_none()
            && self.object_reference.is_none()
            && self.callback.is_none()
            && self.binary.is_none()
            && self.events.is_none()
    }
}

impl fmt::Debug for TypeHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeHooks")
            .field("custom", &self.custom.is_some())
            .field("object_reference", &self.object_reference.is_some())
            .field("callback", &self.callback.is_some())
            .field("binary", &self.binary.is_some())
            .field("events", &self.events.is_some())
            .finish()
    }
}

/// Surrogate selector backed by an exact-type table
#[derive(Default, Clone)]
pub struct SurrogateTable {
    surrogates: FxHashMap<Type, Rc<dyn SerializationSurrogate>>,
}

impl SurrogateTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a surrogate for an exact type
    pub fn add(&mut self, ty: Type, surrogate: Rc<dyn SerializationSurrogate>) {
        self.surrogates.insert(ty, surrogate);
    }

    /// Builder-style [`SurrogateTable::add`]
    pub fn with(mut self, ty: Type, surrogate: Rc<dyn SerializationSurrogate>) -> Self {
        self.add(ty, surrogate);
        self
    }

    /// Number of registered surrogates
    pub fn len(&self) -> usize {
        self.surrogates.len()
    }

    /// No surrogate registered
    pub fn is_empty(&self) -> bool {
        self.surrogates.is_empty()
    }
}

impl SurrogateSelector for SurrogateTable {
    fn surrogate_for(&self, ty: &Type) -> Option<Rc<dyn SerializationSurrogate>> {
        self.surrogates.get(ty).cloned()
    }
}

impl fmt::Debug for SurrogateTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.surrogates.keys()).finish()
    }
}
