//! Deserialization manager
//!
//! Mirrors [`SerializationManager`](crate::ser::SerializationManager): the
//! tags at the start of every polymorphic value select the same branch the
//! writer took, and the type, name and identity caches grow in the same
//! order on both sides.
//!
//! Objects that a surrogate or a real-object hook may still swap are
//! tentative until their content is read. Places that receive a tentative
//! object are recorded in the [`UsageTracker`] and patched once the final
//! object is known. Deserialization callbacks run after the whole root has
//! been read, most recently finished object first.

mod collections;
mod graph;

use crate::element::ElementKind;
use crate::naming::StreamNaming;
use crate::scalar::enum_from_payload;
use crate::usage::{UsageRef, UsageTracker};
use collections::InsertStrategy;
use graphbin_core::{
    ArrayObject, ArrayRank, CollectionKind, CollectionObject, DeserializationCallback,
    DictionaryEntry, Error, HeapObject, KeyValuePair, KnownType, ObjRef, Result, Type, TypeDefRef,
    Value,
};
use graphbin_wire::{
    builtins, BinaryReader, DataTypes, IdField, IdentityReader, TypeDescriptor, TypeNaming,
    TypeReader,
};
use std::io::Read;
use std::rc::Rc;
use tracing::trace;

/// Deepest value nesting read before giving up
pub const MAX_GRAPH_DEPTH: usize = crate::ser::MAX_GRAPH_DEPTH;

/// Reader side of a stream
pub struct DeserializationManager<'a, R: Read> {
    r: BinaryReader<R>,
    types: TypeReader,
    ids: IdentityReader,
    naming: StreamNaming<'a>,
    usages: UsageTracker,
    callbacks: Vec<(Rc<dyn DeserializationCallback>, Value)>,
    depth: usize,
}

impl<'a, R: Read> DeserializationManager<'a, R> {
    /// Create a manager reading from `source`
    pub fn new(source: R, naming: StreamNaming<'a>) -> Self {
        DeserializationManager {
            r: BinaryReader::new(source),
            types: TypeReader::new(),
            ids: IdentityReader::new(),
            naming,
            usages: UsageTracker::new(),
            callbacks: Vec::new(),
            depth: 0,
        }
    }

    /// Read one root value and run its deserialization callbacks
    pub fn read_root(&mut self) -> Result<Value> {
        self.usages.clear();
        self.callbacks.clear();
        let value = self.read_polymorphic()?;
        if self.usages.pending() != 0 {
            return Err(Error::IdentityConflict(format!(
                "{} tentative objects were never resolved",
                self.usages.pending()
            )));
        }
        let callbacks = std::mem::take(&mut self.callbacks);
        for (callback, obj) in callbacks.iter().rev() {
            callback.on_deserialization(obj)?;
        }
        trace!(
            target: "graphbin::de",
            root = %value.type_name(),
            objects = self.ids.count(),
            callbacks = callbacks.len(),
            "Root read"
        );
        Ok(value)
    }

    /// Read the item count of a multi-item stream
    pub fn read_count(&mut self) -> Result<usize> {
        self.r.read_len()
    }

    /// Unwrap the source
    pub fn into_inner(self) -> R {
        self.r.into_inner()
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_GRAPH_DEPTH {
            return Err(Error::invalid_stream(format!(
                "object graph nested deeper than {}",
                MAX_GRAPH_DEPTH
            )));
        }
        Ok(())
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.enter()?;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Read a value from a position declared as `Object`
    pub(crate) fn read_polymorphic(&mut self) -> Result<Value> {
        let first = self.r.read_data_types()?;
        if first.is_null() {
            return Ok(Value::Null);
        }
        self.nested(|m| m.read_tagged(first))
    }

    fn read_tagged(&mut self, first: DataTypes) -> Result<Value> {
        let compact = first.is_seven_bit();
        let header = self.types.read_descriptor(
            first.without(DataTypes::SEVEN_BIT),
            &mut self.r,
            &self.naming,
            false,
        )?;
        if header.data_type.is_nullable() {
            return Err(Error::invalid_stream(format!(
                "polymorphic value of nullable type {}",
                header.ty
            )));
        }
        let compact_ok = header.data_type.is_enum()
            || matches!(header.ty, Type::Known(k) if k.dynamic_width().is_some());
        if compact && !compact_ok {
            return Err(Error::invalid_stream(format!("7-bit flag on {}", header.ty)));
        }
        let boxable = header.ty.is_struct();
        let mut boxed = false;
        if header.ty.has_identity() || boxable {
            let raw = self.r.read_7bit()?;
            match IdField::decode(raw, self.ids.count())? {
                IdField::Existing(id) => return self.ids.get(id),
                IdField::Null if boxable => {}
                IdField::Null => {
                    return Err(Error::invalid_stream(format!(
                        "polymorphic {} carries a null id",
                        header.ty
                    )))
                }
                IdField::New => boxed = boxable,
            }
        }
        self.read_new(&header, compact, boxed)
    }

    fn read_new(&mut self, header: &TypeDescriptor, compact: bool, boxed: bool) -> Result<Value> {
        let dt = header.data_type;
        if dt.is_impure() {
            return self.read_body(&header.ty, dt, boxed);
        }
        if dt.is_enum() {
            let def = named(&header.ty)?;
            let underlying = def
                .enum_underlying()
                .ok_or_else(|| Error::invalid_stream(format!("{} is not an enum", def.name())))?;
            let payload = if compact {
                builtins::read_compact(&mut self.r, underlying.known())?
            } else {
                builtins::read_known(&mut self.r, underlying.known())?
            };
            return enum_from_payload(def, &payload);
        }
        if dt.is_collection() {
            return self.read_shape(header);
        }
        match &header.ty {
            Type::RuntimeType => Ok(Value::Type(self.types.read_type(&mut self.r, &self.naming)?)),
            Type::Known(KnownType::Object) => {
                let obj = Value::Ref(ObjRef::plain());
                self.ids.add(obj.clone());
                Ok(obj)
            }
            Type::Known(known) if compact => builtins::read_compact(&mut self.r, *known),
            Type::Known(known) => builtins::read_known(&mut self.r, *known),
            other => Err(Error::invalid_stream(format!(
                "tag {} cannot start a value of {}",
                dt, other
            ))),
        }
    }

    /// Body of a user type (or surrogate-handled type) after its header
    ///
    /// `boxed` struct bodies come back as heap instances with an id.
    fn read_body(&mut self, ty: &Type, dt: DataTypes, boxed: bool) -> Result<Value> {
        let identity = ty.has_identity() || boxed;
        match dt {
            DataTypes::BINARY_SERIALIZABLE => {
                let def = named(ty)?.clone();
                let hook = def.hooks().binary.clone().ok_or_else(|| {
                    Error::unsupported(def.name(), "no binary serializable hook to read with")
                })?;
                let len = self.r.read_len()?;
                let bytes = self.r.read_bytes(len)?;
                let value = box_struct(hook.from_bytes(&def, &bytes)?, boxed);
                if identity != matches!(value, Value::Ref(_)) {
                    return Err(Error::Hook(format!(
                        "binary hook of {} returned a {}",
                        def.name(),
                        value.type_name()
                    )));
                }
                if identity {
                    self.ids.add(value.clone());
                }
                self.push_callback(&value);
                Ok(value)
            }
            DataTypes::RAW_STRUCT => {
                let def = named(ty)?;
                let len = self.r.read_len()?;
                let bytes = self.r.read_bytes(len)?;
                let mut raw = BinaryReader::new(std::io::Cursor::new(bytes.as_slice()));
                let value = graph::decode_raw(&mut raw, def, 0)?;
                let consumed = raw.into_inner().position();
                if consumed != len as u64 {
                    return Err(Error::invalid_stream(format!(
                        "raw {} is {} bytes, layout needs {}",
                        def.name(),
                        len,
                        consumed
                    )));
                }
                let value = box_struct(value, boxed);
                if boxed {
                    self.ids.add(value.clone());
                }
                Ok(value)
            }
            DataTypes::RECURSIVE_OBJECT_GRAPH => self.read_object_graph(ty, boxed),
            other => Err(Error::invalid_stream(format!("{} is not a body tag", other))),
        }
    }

    /// Array, collection or key/value pair after its header
    fn read_shape(&mut self, desc: &TypeDescriptor) -> Result<Value> {
        match &desc.ty {
            Type::Array(element, rank) => self.read_array(desc, element, *rank),
            Type::Collection(kind, _) if kind.is_pair() => self.read_pair(desc),
            Type::Collection(kind, args) => {
                let collection = CollectionObject::new(*kind, args.clone())
                    .map_err(|e| Error::invalid_stream(e.to_string()))?;
                let obj = ObjRef::collection(collection);
                self.ids.add(Value::Ref(obj.clone()));
                self.read_collection_items(desc, &obj, InsertStrategy::for_kind(*kind))?;
                Ok(Value::Ref(obj))
            }
            other => Err(Error::invalid_stream(format!("{} has no shape", other))),
        }
    }

    fn read_array(
        &mut self,
        desc: &TypeDescriptor,
        element: &Type,
        rank: ArrayRank,
    ) -> Result<Value> {
        let element_desc = child(desc.element.as_deref(), &desc.ty)?;
        let (lengths, lower_bounds) = match rank {
            ArrayRank::Vector => (vec![self.r.read_len()?], vec![0]),
            ArrayRank::Multi(n) => {
                let mut lengths = Vec::with_capacity(n as usize);
                let mut lower_bounds = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    lengths.push(self.r.read_len()?);
                    lower_bounds.push(self.r.read_i32()?);
                }
                (lengths, lower_bounds)
            }
        };
        let total = lengths
            .iter()
            .try_fold(1usize, |acc, &len| acc.checked_mul(len))
            .ok_or_else(|| Error::invalid_stream("array dimensions overflow"))?;

        // cells are appended as they are read
        let obj = ObjRef::array(ArrayObject {
            element: element.clone(),
            rank,
            lengths,
            lower_bounds,
            items: Vec::new(),
        });
        self.ids.add(Value::Ref(obj.clone()));

        if rank == ArrayRank::Vector && *element == Type::known(KnownType::U8) {
            let bytes = self.r.read_bytes(total)?;
            if let HeapObject::Array(array) = &mut *obj.try_borrow_mut()? {
                array.items = bytes.into_iter().map(Value::U8).collect();
            }
            return Ok(Value::Ref(obj));
        }

        let kind = ElementKind::of(element_desc, &self.naming);
        for index in 0..total {
            let item = self.read_element(&kind, element_desc)?;
            if let HeapObject::Array(array) = &mut *obj.try_borrow_mut()? {
                array.items.push(item.clone());
            }
            self.usages.record(
                &item,
                UsageRef::ArrayCell {
                    array: obj.clone(),
                    index,
                },
            );
        }
        Ok(Value::Ref(obj))
    }

    fn read_collection_items(
        &mut self,
        desc: &TypeDescriptor,
        obj: &ObjRef,
        strategy: InsertStrategy,
    ) -> Result<()> {
        let element_desc = child(desc.element.as_deref(), &desc.ty)?;
        let element_kind = ElementKind::of(element_desc, &self.naming);
        let count = self.r.read_len()?;
        let is_dictionary = desc.collection_kind().map_or(false, CollectionKind::is_dictionary);
        match desc.value.as_deref() {
            Some(value_desc) if is_dictionary => {
                let value_kind = ElementKind::of(value_desc, &self.naming);
                for _ in 0..count {
                    let key = self.read_element(&element_kind, element_desc)?;
                    let value = self.read_element(&value_kind, value_desc)?;
                    strategy.insert(&mut self.usages, obj, key, value)?;
                }
            }
            _ => {
                for _ in 0..count {
                    let item = self.read_element(&element_kind, element_desc)?;
                    strategy.add(&mut self.usages, obj, item)?;
                }
            }
        }
        Ok(())
    }

    fn read_pair(&mut self, desc: &TypeDescriptor) -> Result<Value> {
        let key_desc = child(desc.element.as_deref(), &desc.ty)?;
        let value_desc = child(desc.value.as_deref(), &desc.ty)?;
        let key_kind = ElementKind::of(key_desc, &self.naming);
        let value_kind = ElementKind::of(value_desc, &self.naming);
        let key = self.read_element(&key_kind, key_desc)?;
        let value = self.read_element(&value_kind, value_desc)?;
        // pairs are copied by value
        self.usages.pin(&key);
        self.usages.pin(&value);
        match desc.ty.underlying() {
            Type::Collection(CollectionKind::KeyValuePair, args) if args.len() == 2 => {
                Ok(Value::KeyValuePair(Box::new(KeyValuePair::new(
                    args[0].clone(),
                    args[1].clone(),
                    key,
                    value,
                ))))
            }
            _ => Ok(Value::DictionaryEntry(Box::new(DictionaryEntry { key, value }))),
        }
    }

    /// One value in a typed position
    fn read_element(&mut self, kind: &ElementKind, desc: &TypeDescriptor) -> Result<Value> {
        match kind {
            ElementKind::Polymorphic => self.read_polymorphic(),
            ElementKind::Value(known) => builtins::read_known(&mut self.r, *known),
            ElementKind::String => match self.r.read_len()? {
                0 => Ok(Value::Null),
                n => Ok(Value::String(self.r.read_string_of(n - 1)?)),
            },
            ElementKind::ReferenceSingle(known) => {
                if !self.r.read_bool()? {
                    return Ok(Value::Null);
                }
                builtins::read_known(&mut self.r, *known)
            }
            ElementKind::Enum(underlying) => {
                let payload = builtins::read_known(&mut self.r, underlying.known())?;
                enum_from_payload(named(desc.ty.underlying())?, &payload)
            }
            ElementKind::RuntimeType => {
                if !self.r.read_bool()? {
                    return Ok(Value::Null);
                }
                Ok(Value::Type(self.types.read_type(&mut self.r, &self.naming)?))
            }
            ElementKind::Nullable(inner) => {
                if !self.r.read_bool()? {
                    return Ok(Value::Null);
                }
                self.read_element(inner, desc)
            }
            ElementKind::ValuePair => self.nested(|m| m.read_pair(desc)),
            ElementKind::SealedStruct => {
                let def = named(desc.ty.underlying())?.clone();
                self.nested(|m| m.read_typed_body(&def))
            }
            ElementKind::ReferenceShape | ElementKind::SealedClass => {
                let raw = self.r.read_7bit()?;
                match IdField::decode(raw, self.ids.count())? {
                    IdField::Null => Ok(Value::Null),
                    IdField::Existing(id) => self.ids.get(id),
                    IdField::New => match (kind, &desc.ty) {
                        (ElementKind::SealedClass, Type::Named(def)) => {
                            let def = def.clone();
                            self.nested(|m| m.read_typed_body(&def))
                        }
                        _ => self.nested(|m| m.read_shape(desc)),
                    },
                }
            }
        }
    }

    fn read_typed_body(&mut self, def: &TypeDefRef) -> Result<Value> {
        let dt = self.naming.classify(def);
        self.read_body(&Type::Named(def.clone()), dt, false)
    }

    fn push_callback(&mut self, value: &Value) {
        let def = match value.runtime_type() {
            Some(Type::Named(def)) => def,
            _ => return,
        };
        if let Some(callback) = def.hooks().callback.clone() {
            self.callbacks.push((callback, value.clone()));
        }
    }
}

/// Move a struct value onto the heap when it was written boxed
fn box_struct(value: Value, boxed: bool) -> Value {
    match value {
        Value::Struct(instance) if boxed => Value::Ref(ObjRef::instance(*instance)),
        other => other,
    }
}

fn named(ty: &Type) -> Result<&TypeDefRef> {
    ty.as_named()
        .ok_or_else(|| Error::invalid_stream(format!("{} is not a user type", ty)))
}

fn child<'d>(desc: Option<&'d TypeDescriptor>, owner: &Type) -> Result<&'d TypeDescriptor> {
    desc.ok_or_else(|| Error::invalid_stream(format!("{} has no element type", owner)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::SerializerOptions;
    use crate::ser::SerializationManager;
    use graphbin_core::{graph_eq, ErrorKind, TypeRegistry};

    fn round_trip(value: &Value) -> Value {
        let options = SerializerOptions::strict();
        let registry = TypeRegistry::new();
        let naming = StreamNaming::new(&options, &registry, None, None);
        let mut ser = SerializationManager::new(Vec::new(), naming);
        ser.write_root(value).unwrap();
        let bytes = ser.into_inner();
        let mut de = DeserializationManager::new(bytes.as_slice(), naming);
        de.read_root().unwrap()
    }

    fn read(bytes: &[u8]) -> Result<Value> {
        let options = SerializerOptions::strict();
        let registry = TypeRegistry::new();
        let naming = StreamNaming::new(&options, &registry, None, None);
        DeserializationManager::new(bytes, naming).read_root()
    }

    #[test]
    fn test_primitives_round_trip() {
        for value in [
            Value::Null,
            Value::Bool(true),
            Value::I16(-300),
            Value::I32(100),
            Value::I64(i64::MIN),
            Value::U64(u64::MAX),
            Value::Char('λ'),
            Value::from("text"),
            Value::F64(1.5),
        ] {
            assert_eq!(round_trip(&value), value);
        }
    }

    #[test]
    fn test_typed_list_round_trip() {
        let mut list = CollectionObject::new(CollectionKind::List, vec![Type::string()]).unwrap();
        list.add(Value::from("a")).unwrap();
        list.add(Value::Null).unwrap();
        let value = Value::Ref(ObjRef::collection(list));
        assert!(graph_eq(&round_trip(&value), &value));
    }

    #[test]
    fn test_byte_vector_round_trip() {
        let bytes = ArrayObject::vector(
            Type::known(KnownType::U8),
            vec![Value::U8(1), Value::U8(2), Value::U8(255)],
        );
        let value = Value::Ref(ObjRef::array(bytes));
        assert!(graph_eq(&round_trip(&value), &value));
    }

    #[test]
    fn test_truncated_stream() {
        // Int32 tag without its payload
        let err = read(&[6, 1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStream);
    }

    #[test]
    fn test_id_out_of_range() {
        // Object tag, id 5 with no objects read
        let err = read(&[16, 5]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStream);
    }
}
