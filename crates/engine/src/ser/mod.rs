//! Serialization manager
//!
//! Walks an object graph depth-first and writes it to a sink. One manager
//! owns the type, name, assembly and identity caches of a stream, so several
//! roots written through the same manager share them.
//!
//! A polymorphic value (the root, every field, every `Object` element) is
//! written as:
//!
//! ```text
//! tag(s) [7-bit flag on the first]  type info  [id]  content
//! ```
//!
//! Heap types always carry the id field. User structs carry it too: 0 for an
//! unboxed value, otherwise the id of the boxed instance.
//!
//! The decision order for a value is: identity (already written heap
//! objects become back references), primitive fast path, surrogate,
//! built-in singles, enums, arrays and collections, runtime types, and
//! finally user types classified as binary serializable, raw struct or
//! recursive object graph.

mod content;

#[cfg(test)]
pub(crate) use content::encode_raw;

use crate::naming::StreamNaming;
use crate::scalar::enum_payload;
use graphbin_core::{
    Error, HeapObject, KnownType, ObjRef, Result, SerializationInfo, SerializationSurrogate,
    Type, TypeDefRef, Value,
};
use graphbin_wire::{
    builtins, BinaryWriter, DataTypes, IdentityWriter, TypeDescriptor, TypeNaming, TypeWriter,
};
use rustc_hash::FxHashMap;
use std::io::Write;
use std::rc::Rc;
use tracing::trace;

/// Deepest value nesting written before giving up
pub const MAX_GRAPH_DEPTH: usize = 256;

/// Writer side of a stream
pub struct SerializationManager<'a, W: Write> {
    w: BinaryWriter<W>,
    types: TypeWriter,
    ids: IdentityWriter,
    naming: StreamNaming<'a>,
    descriptors: FxHashMap<Type, Rc<TypeDescriptor>>,
    depth: usize,
}

impl<'a, W: Write> SerializationManager<'a, W> {
    /// Create a manager writing to `sink`
    pub fn new(sink: W, naming: StreamNaming<'a>) -> Self {
        SerializationManager {
            w: BinaryWriter::new(sink),
            types: TypeWriter::new(),
            ids: IdentityWriter::new(),
            naming,
            descriptors: FxHashMap::default(),
            depth: 0,
        }
    }

    /// Write one root value
    pub fn write_root(&mut self, value: &Value) -> Result<()> {
        let start = self.w.position();
        self.write_polymorphic(value)?;
        trace!(
            target: "graphbin::ser",
            root = %value.type_name(),
            bytes = self.w.position() - start,
            objects = self.ids.count(),
            "Root written"
        );
        Ok(())
    }

    /// Write the item count of a multi-item stream
    pub fn write_count(&mut self, count: usize) -> Result<()> {
        self.w.write_len(count)
    }

    /// Bytes written so far
    pub fn position(&self) -> u64 {
        self.w.position()
    }

    /// Unwrap the sink
    pub fn into_inner(self) -> W {
        self.w.into_inner()
    }

    /// Cached descriptor of a concrete type
    fn descriptor(&mut self, ty: &Type) -> Result<Rc<TypeDescriptor>> {
        if let Some(desc) = self.descriptors.get(ty) {
            return Ok(desc.clone());
        }
        let desc = Rc::new(TypeDescriptor::describe(ty, &self.naming, false)?);
        self.descriptors.insert(ty.clone(), desc.clone());
        Ok(desc)
    }

    fn write_header(&mut self, header: &TypeDescriptor, flags: DataTypes) -> Result<()> {
        self.types
            .write_descriptor(&mut self.w, header, flags, &self.naming)
    }

    /// Write the id field of a new object and assign its id
    fn write_new_id(&mut self, obj: &ObjRef, header: Option<Rc<TypeDescriptor>>) -> Result<()> {
        self.w.write_7bit(self.ids.count() + 1)?;
        self.ids.register(obj, header);
        Ok(())
    }

    /// Id field after the header of a user type or surrogate value
    fn write_id_field(&mut self, header: Rc<TypeDescriptor>, obj: Option<&ObjRef>) -> Result<()> {
        match obj {
            Some(obj) => self.write_new_id(obj, Some(header)),
            None if header.ty.is_struct() => self.w.write_7bit(0),
            None => Ok(()),
        }
    }

    fn enter(&mut self, value: &Value) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_GRAPH_DEPTH {
            return Err(Error::unsupported(
                value.type_name(),
                format!("object graph nested deeper than {}", MAX_GRAPH_DEPTH),
            ));
        }
        Ok(())
    }

    /// Write a value in a position declared as `Object`
    pub(crate) fn write_polymorphic(&mut self, value: &Value) -> Result<()> {
        self.enter(value)?;
        let result = self.write_polymorphic_inner(value);
        self.depth -= 1;
        result
    }

    fn write_polymorphic_inner(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.w.write_data_types(DataTypes::NULL),
            Value::Ref(obj) => match self.ids.lookup(obj) {
                Some((id, header)) => self.write_back_reference(obj, id, header),
                None => self.write_new_reference(obj),
            },
            _ => match value.runtime_type() {
                Some(Type::Known(k)) if k.is_primitive() => self.write_primitive(k, value),
                Some(ty) => self.write_value_type(value, ty),
                None => self.w.write_data_types(DataTypes::NULL),
            },
        }
    }

    fn write_primitive(&mut self, known: KnownType, value: &Value) -> Result<()> {
        let tag = DataTypes::for_known(known);
        if builtins::prefers_compact(value) {
            self.w.write_data_types(tag | DataTypes::SEVEN_BIT)?;
            builtins::write_compact(&mut self.w, value)
        } else {
            self.w.write_data_types(tag)?;
            builtins::write_known(&mut self.w, known, value)
        }
    }

    fn write_back_reference(
        &mut self,
        obj: &ObjRef,
        id: u32,
        header: Option<Rc<TypeDescriptor>>,
    ) -> Result<()> {
        let header = match header {
            Some(header) => header,
            None => {
                // first written in a typed position
                let header = self.descriptor(&obj.runtime_type())?;
                self.ids.set_header(obj, header.clone());
                header
            }
        };
        self.write_header(&header, DataTypes::NULL)?;
        self.w.write_7bit(id)
    }

    fn write_new_reference(&mut self, obj: &ObjRef) -> Result<()> {
        let ty = obj.runtime_type();
        let value = Value::Ref(obj.clone());
        if let Some(surrogate) = self.naming.surrogate_for(&ty) {
            return self.write_surrogate(&value, ty, surrogate, Some(obj));
        }
        let def = {
            let heap = obj.borrow();
            match &*heap {
                HeapObject::Instance(instance) => Some(instance.ty.clone()),
                _ => None,
            }
        };
        match def {
            Some(def) => self.write_user_polymorphic(&value, &def, Some(obj)),
            None => {
                let header = self.descriptor(&ty)?;
                self.write_header(&header, DataTypes::NULL)?;
                self.write_new_id(obj, Some(header.clone()))?;
                if header.data_type.is_collection() {
                    self.write_shape_content(&value, &header)?;
                }
                Ok(())
            }
        }
    }

    fn write_value_type(&mut self, value: &Value, ty: Type) -> Result<()> {
        if let Some(surrogate) = self.naming.surrogate_for(&ty) {
            return self.write_surrogate(value, ty, surrogate, None);
        }
        match value {
            Value::Enum(e) => {
                let header = self.descriptor(&ty)?;
                let payload = enum_payload(e)?;
                let compact = builtins::prefers_compact(&payload);
                let flags = if compact {
                    DataTypes::SEVEN_BIT
                } else {
                    DataTypes::NULL
                };
                self.write_header(&header, flags)?;
                match (compact, payload.runtime_type()) {
                    (true, _) => builtins::write_compact(&mut self.w, &payload),
                    (false, Some(Type::Known(k))) => {
                        builtins::write_known(&mut self.w, k, &payload)
                    }
                    _ => Err(Error::unsupported(e.ty.name(), "invalid enum payload")),
                }
            }
            Value::Type(t) => {
                self.w.write_data_types(DataTypes::RUNTIME_TYPE)?;
                self.types.write_type(&mut self.w, t, &self.naming)
            }
            Value::Struct(instance) => {
                let def = instance.ty.clone();
                self.write_user_polymorphic(value, &def, None)
            }
            Value::KeyValuePair(_) | Value::DictionaryEntry(_) => {
                let header = self.descriptor(&ty)?;
                self.write_header(&header, DataTypes::NULL)?;
                self.write_shape_content(value, &header)
            }
            _ => match ty {
                Type::Known(k) => {
                    self.w.write_data_types(DataTypes::for_known(k))?;
                    builtins::write_known(&mut self.w, k, value)
                }
                other => Err(Error::unsupported(
                    other.to_string(),
                    "no encoding applies to this value",
                )),
            },
        }
    }

    /// Polymorphic instance of a user type
    fn write_user_polymorphic(
        &mut self,
        value: &Value,
        def: &TypeDefRef,
        obj: Option<&ObjRef>,
    ) -> Result<()> {
        self.check_instance(def, obj.is_some())?;
        let dt = self.naming.classify(def);
        let events = self.naming.events(def);
        if let Some(events) = &events {
            events.on_serializing(value)?;
        }

        let mut info = None;
        let mut header_ty = Type::Named(def.clone());
        if dt == DataTypes::RECURSIVE_OBJECT_GRAPH {
            if let Some(custom) = self.naming.custom(def) {
                let mut bag = SerializationInfo::new();
                custom.get_object_data(value, &mut bag)?;
                if let Some(ty) = bag.type_override() {
                    Self::check_override(&header_ty, ty, obj.is_some())?;
                    header_ty = ty.clone();
                }
                info = Some(bag);
            }
        }

        let header = Rc::new(TypeDescriptor::leaf(dt, header_ty));
        self.write_header(&header, DataTypes::NULL)?;
        self.write_id_field(header, obj)?;
        self.write_instance_body(value, def, dt, info.as_ref())?;

        if let Some(events) = &events {
            events.on_serialized(value)?;
        }
        Ok(())
    }

    /// Value taken over by a surrogate: always the custom graph form
    fn write_surrogate(
        &mut self,
        value: &Value,
        ty: Type,
        surrogate: Rc<dyn SerializationSurrogate>,
        obj: Option<&ObjRef>,
    ) -> Result<()> {
        let mut info = SerializationInfo::new();
        surrogate.get_object_data(value, &mut info)?;
        let header_ty = match info.type_override() {
            Some(over) => {
                Self::check_override(&ty, over, obj.is_some())?;
                over.clone()
            }
            None => ty,
        };
        let header = Rc::new(TypeDescriptor::leaf(
            DataTypes::RECURSIVE_OBJECT_GRAPH,
            header_ty,
        ));
        self.write_header(&header, DataTypes::NULL)?;
        self.write_id_field(header, obj)?;
        self.write_custom_graph(&info)
    }

    fn check_instance(&self, def: &TypeDefRef, has_identity: bool) -> Result<()> {
        if !def.is_value_type() && !has_identity {
            return Err(Error::unsupported(
                def.name(),
                "class instances must be heap objects",
            ));
        }
        if def.is_interface() || def.enum_underlying().is_some() {
            return Err(Error::unsupported(def.name(), "not an instantiable type"));
        }
        if !self.naming.can_serialize(def) {
            return Err(Error::unsupported(
                def.name(),
                "type is not serializable and recursive fallback is off",
            ));
        }
        Ok(())
    }

    /// A heap object may be stored as any heap type or boxed struct, a value
    /// only as another value type
    fn check_override(original: &Type, over: &Type, has_identity: bool) -> Result<()> {
        let is_enum = over.as_named().map_or(false, |d| d.enum_underlying().is_some());
        let fits = if has_identity {
            over.has_identity() || over.is_struct()
        } else {
            !over.has_identity()
        };
        if is_enum || over.is_open() || !fits {
            return Err(Error::unsupported(
                original.to_string(),
                format!("cannot be stored as {}", over),
            ));
        }
        Ok(())
    }
}
