//! Binary formatter
//!
//! [`BinarySerializationFormatter`] is the entry point of the engine. It
//! holds the options and collaborators of a serializer and creates one
//! manager pair per call, so no cache outlives a call.
//!
//! # Example
//!
//! ```
//! use graphbin_core::{Type, TypeDef, TypeRegistry, Value, ObjRef, Instance};
//! use graphbin_engine::BinarySerializationFormatter;
//!
//! let person = TypeDef::class("App.Person")
//!     .field("name", Type::string())
//!     .build();
//! let formatter = BinarySerializationFormatter::new()
//!     .with_registry(TypeRegistry::new().with(&person));
//!
//! let ada = ObjRef::instance(Instance::new(&person).with("name", Value::from("Ada")));
//! let bytes = formatter.serialize(&Value::Ref(ada)).unwrap();
//! let copy = formatter.deserialize(&bytes).unwrap();
//! assert_eq!(copy.as_ref().and_then(|o| o.field("name")), Some(Value::from("Ada")));
//! ```

use crate::de::DeserializationManager;
use crate::naming::StreamNaming;
use crate::options::SerializerOptions;
use crate::ser::SerializationManager;
use graphbin_core::{
    Error, Result, SerializationBinder, SurrogateSelector, TypeRegistry, TypeResolver, Value,
};
use std::io::{Cursor, Read, Write};
use std::rc::Rc;
use tracing::debug;

const PREALLOCATE_ITEMS: usize = 1024;

/// Serializer front end
#[derive(Clone)]
pub struct BinarySerializationFormatter {
    options: SerializerOptions,
    resolver: Rc<dyn TypeResolver>,
    binder: Option<Rc<dyn SerializationBinder>>,
    surrogates: Option<Rc<dyn SurrogateSelector>>,
}

impl Default for BinarySerializationFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl BinarySerializationFormatter {
    /// Formatter with default options and an empty registry
    pub fn new() -> Self {
        BinarySerializationFormatter {
            options: SerializerOptions::default(),
            resolver: Rc::new(TypeRegistry::new()),
            binder: None,
            surrogates: None,
        }
    }

    /// Replace the options
    pub fn with_options(mut self, options: SerializerOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve stream type names through `registry`
    pub fn with_registry(self, registry: TypeRegistry) -> Self {
        self.with_resolver(Rc::new(registry))
    }

    /// Resolve stream type names through a custom resolver
    pub fn with_resolver(mut self, resolver: Rc<dyn TypeResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Map types to stored names and back
    pub fn with_binder(mut self, binder: Rc<dyn SerializationBinder>) -> Self {
        self.binder = Some(binder);
        self
    }

    /// Take over selected types with surrogates
    pub fn with_surrogates(mut self, surrogates: Rc<dyn SurrogateSelector>) -> Self {
        self.surrogates = Some(surrogates);
        self
    }

    /// Active options
    pub fn options(&self) -> &SerializerOptions {
        &self.options
    }

    fn naming(&self) -> StreamNaming<'_> {
        StreamNaming::new(
            &self.options,
            self.resolver.as_ref(),
            self.binder.as_deref(),
            self.surrogates.as_deref(),
        )
    }

    /// Serialize one root value
    pub fn serialize(&self, value: &Value) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.serialize_to(&mut bytes, value)?;
        Ok(bytes)
    }

    /// Serialize one root value into a sink
    pub fn serialize_to<W: Write>(&self, sink: &mut W, value: &Value) -> Result<()> {
        let mut manager = SerializationManager::new(sink, self.naming());
        manager.write_root(value)?;
        debug!(target: "graphbin::ser", bytes = manager.position(), "Serialized root");
        Ok(())
    }

    /// Deserialize one root value; the input must hold nothing else
    pub fn deserialize(&self, bytes: &[u8]) -> Result<Value> {
        let mut manager = DeserializationManager::new(Cursor::new(bytes), self.naming());
        let value = manager.read_root()?;
        ensure_consumed(manager.into_inner(), bytes.len())?;
        Ok(value)
    }

    /// Deserialize one root value from a source, leaving what follows unread
    pub fn deserialize_from<R: Read>(&self, source: &mut R) -> Result<Value> {
        DeserializationManager::new(source, self.naming()).read_root()
    }

    /// Serialize several roots into one stream sharing every cache
    pub fn serialize_items(&self, items: &[Value]) -> Result<Vec<u8>> {
        let mut manager = SerializationManager::new(Vec::new(), self.naming());
        manager.write_count(items.len())?;
        for item in items {
            manager.write_root(item)?;
        }
        debug!(target: "graphbin::ser", items = items.len(), bytes = manager.position(), "Serialized items");
        Ok(manager.into_inner())
    }

    /// Inverse of [`serialize_items`](Self::serialize_items)
    pub fn deserialize_items(&self, bytes: &[u8]) -> Result<Vec<Value>> {
        let mut manager = DeserializationManager::new(Cursor::new(bytes), self.naming());
        let count = manager.read_count()?;
        let mut items = Vec::with_capacity(count.min(PREALLOCATE_ITEMS));
        for _ in 0..count {
            items.push(manager.read_root()?);
        }
        ensure_consumed(manager.into_inner(), bytes.len())?;
        Ok(items)
    }
}

fn ensure_consumed(cursor: Cursor<&[u8]>, len: usize) -> Result<()> {
    let position = cursor.position();
    if position != len as u64 {
        return Err(Error::invalid_stream(format!(
            "{} trailing bytes after the last value",
            len as u64 - position
        )));
    }
    Ok(())
}
