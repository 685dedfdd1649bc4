//! Bodies of user types and content of arrays, collections and pairs

use super::SerializationManager;
use crate::element::ElementKind;
use crate::scalar::enum_payload;
use graphbin_core::{
    ArrayRank, CollectionData, Error, HeapObject, Instance, KnownType, Result, SerializationInfo,
    Type, TypeDefRef, Value,
};
use graphbin_wire::{builtins, BinaryWriter, DataTypes, TypeDescriptor, TypeNaming};
use std::io::Write;

/// Content of a heap shape, cloned out of the borrow
enum ShapeContent {
    Array(ArrayContent),
    Collection(CollectionData),
}

struct ArrayContent {
    lengths: Vec<usize>,
    lower_bounds: Vec<i32>,
    vector: bool,
    items: Vec<Value>,
}

impl<'a, W: Write> SerializationManager<'a, W> {
    /// Body of a user type instance in the encoding chosen by `dt`
    pub(super) fn write_instance_body(
        &mut self,
        value: &Value,
        def: &TypeDefRef,
        dt: DataTypes,
        info: Option<&SerializationInfo>,
    ) -> Result<()> {
        match dt {
            DataTypes::BINARY_SERIALIZABLE => {
                let hook = def.hooks().binary.clone().ok_or_else(|| {
                    Error::unsupported(def.name(), "binary serializable hook is missing")
                })?;
                let bytes = hook.to_bytes(value)?;
                self.w.write_len(bytes.len())?;
                self.w.write_bytes(&bytes)
            }
            DataTypes::RAW_STRUCT => {
                let mut raw = BinaryWriter::new(Vec::new());
                if let Value::Ref(_) = value {
                    // boxed struct
                    let copy = Value::from(Instance {
                        ty: def.clone(),
                        slots: instance_slots(value, def)?,
                    });
                    encode_raw(&mut raw, &copy, def)?;
                } else {
                    encode_raw(&mut raw, value, def)?;
                }
                let bytes = raw.into_inner();
                self.w.write_len(bytes.len())?;
                self.w.write_bytes(&bytes)
            }
            _ => match info {
                Some(info) => self.write_custom_graph(info),
                None => self.write_default_graph(value, def),
            },
        }
    }

    /// Field graph: levels most-derived first, terminated by an omitted name
    fn write_default_graph(&mut self, value: &Value, def: &TypeDefRef) -> Result<()> {
        let slots = instance_slots(value, def)?;
        let layout = def.layout();
        self.w.write_bool(false)?;
        for (index, level) in layout.levels.iter().enumerate() {
            if index > 0 {
                self.types.write_name(&mut self.w, &level.type_name)?;
            }
            let fields: Vec<_> = level.persisted().collect();
            self.w.write_len(fields.len())?;
            for field in fields {
                self.types.write_name(&mut self.w, &field.name)?;
                let field_value = slots.get(field.slot).cloned().unwrap_or(Value::Null);
                self.write_polymorphic(&field_value)?;
            }
        }
        self.types.write_name(&mut self.w, "")
    }

    /// Name/value bag of a custom serializer or surrogate
    pub(super) fn write_custom_graph(&mut self, info: &SerializationInfo) -> Result<()> {
        self.w.write_bool(true)?;
        self.w.write_len(info.len())?;
        for entry in info.entries() {
            if entry.name.is_empty() {
                return Err(Error::InvalidOperation(
                    "serialization info entries need a name".to_string(),
                ));
            }
            self.types.write_name(&mut self.w, &entry.name)?;
            self.write_polymorphic(&entry.value)?;
            let actual = entry.value.runtime_type().unwrap_or_else(Type::object);
            let differs = actual != entry.declared;
            self.w.write_bool(differs)?;
            if differs {
                self.types
                    .write_type(&mut self.w, &entry.declared, &self.naming)?;
            }
        }
        Ok(())
    }

    /// Instance of a sealed user type in a typed position
    fn write_user_typed(&mut self, value: &Value, def: &TypeDefRef) -> Result<()> {
        if !self.naming.can_serialize(def) {
            return Err(Error::unsupported(
                def.name(),
                "type is not serializable and recursive fallback is off",
            ));
        }
        let events = self.naming.events(def);
        if let Some(events) = &events {
            events.on_serializing(value)?;
        }
        let dt = self.naming.classify(def);
        self.write_instance_body(value, def, dt, None)?;
        if let Some(events) = &events {
            events.on_serialized(value)?;
        }
        Ok(())
    }

    /// Content of an array, collection or key/value pair
    pub(super) fn write_shape_content(
        &mut self,
        value: &Value,
        desc: &TypeDescriptor,
    ) -> Result<()> {
        match value {
            Value::KeyValuePair(pair) => self.write_pair(&pair.key, &pair.value, desc),
            Value::DictionaryEntry(entry) => self.write_pair(&entry.key, &entry.value, desc),
            Value::Ref(obj) => {
                let content = {
                    let heap = obj.borrow();
                    match &*heap {
                        HeapObject::Array(array) => ShapeContent::Array(ArrayContent {
                            lengths: array.lengths.clone(),
                            lower_bounds: array.lower_bounds.clone(),
                            vector: matches!(array.rank, ArrayRank::Vector),
                            items: array.items.clone(),
                        }),
                        HeapObject::Collection(collection) => {
                            ShapeContent::Collection(collection.data().clone())
                        }
                        _ => {
                            return Err(Error::InvalidOperation(format!(
                                "{} has no collection content",
                                heap.runtime_type()
                            )))
                        }
                    }
                };
                match content {
                    ShapeContent::Array(array) => self.write_array(array, desc),
                    ShapeContent::Collection(data) => self.write_collection(data, desc),
                }
            }
            other => Err(Error::InvalidOperation(format!(
                "{} has no collection content",
                other.type_name()
            ))),
        }
    }

    fn write_array(&mut self, array: ArrayContent, desc: &TypeDescriptor) -> Result<()> {
        let element = child(desc.element.as_deref(), &desc.ty)?;
        if array.vector {
            self.w.write_len(array.items.len())?;
            if element.ty == Type::known(KnownType::U8) {
                return self.write_byte_vector(&array.items);
            }
        } else {
            for (length, lower) in array.lengths.iter().zip(&array.lower_bounds) {
                self.w.write_len(*length)?;
                self.w.write_i32(*lower)?;
            }
        }
        let kind = ElementKind::of(element, &self.naming);
        for item in &array.items {
            self.write_element(&kind, element, item)?;
        }
        Ok(())
    }

    fn write_byte_vector(&mut self, items: &[Value]) -> Result<()> {
        let bytes = items
            .iter()
            .map(|item| match item {
                Value::U8(b) => Ok(*b),
                other => Err(Error::InvalidOperation(format!(
                    "Byte array holds a {}",
                    other.type_name()
                ))),
            })
            .collect::<Result<Vec<u8>>>()?;
        self.w.write_bytes(&bytes)
    }

    fn write_collection(&mut self, data: CollectionData, desc: &TypeDescriptor) -> Result<()> {
        let element = child(desc.element.as_deref(), &desc.ty)?;
        let element_kind = ElementKind::of(element, &self.naming);
        match data {
            CollectionData::Seq(items) => {
                self.w.write_len(items.len())?;
                for item in &items {
                    self.write_element(&element_kind, element, item)?;
                }
            }
            CollectionData::Map(entries) => {
                let value = child(desc.value.as_deref(), &desc.ty)?;
                let value_kind = ElementKind::of(value, &self.naming);
                self.w.write_len(entries.len())?;
                for (k, v) in &entries {
                    self.write_element(&element_kind, element, k)?;
                    self.write_element(&value_kind, value, v)?;
                }
            }
        }
        Ok(())
    }

    fn write_pair(&mut self, key: &Value, value: &Value, desc: &TypeDescriptor) -> Result<()> {
        let key_desc = child(desc.element.as_deref(), &desc.ty)?;
        let value_desc = child(desc.value.as_deref(), &desc.ty)?;
        let key_kind = ElementKind::of(key_desc, &self.naming);
        let value_kind = ElementKind::of(value_desc, &self.naming);
        self.write_element(&key_kind, key_desc, key)?;
        self.write_element(&value_kind, value_desc, value)
    }

    /// One value in a typed position
    pub(super) fn write_element(
        &mut self,
        kind: &ElementKind,
        desc: &TypeDescriptor,
        value: &Value,
    ) -> Result<()> {
        match kind {
            ElementKind::Polymorphic => self.write_polymorphic(value),
            ElementKind::Value(known) => builtins::write_known(&mut self.w, *known, value),
            ElementKind::String => match value {
                Value::Null => self.w.write_7bit(0),
                Value::String(s) => {
                    self.w.write_len(s.len() + 1)?;
                    self.w.write_bytes(s.as_bytes())
                }
                other => Err(element_mismatch(desc, other)),
            },
            ElementKind::ReferenceSingle(known) => {
                if value.is_null() {
                    return self.w.write_bool(false);
                }
                self.w.write_bool(true)?;
                builtins::write_known(&mut self.w, *known, value)
            }
            ElementKind::Enum(underlying) => match value {
                Value::Enum(e) => {
                    let payload = enum_payload(e)?;
                    builtins::write_known(&mut self.w, underlying.known(), &payload)
                }
                other => Err(element_mismatch(desc, other)),
            },
            ElementKind::RuntimeType => match value {
                Value::Null => self.w.write_bool(false),
                Value::Type(t) => {
                    self.w.write_bool(true)?;
                    self.types.write_type(&mut self.w, t, &self.naming)
                }
                other => Err(element_mismatch(desc, other)),
            },
            ElementKind::Nullable(inner) => {
                if value.is_null() {
                    return self.w.write_bool(false);
                }
                self.w.write_bool(true)?;
                self.write_element(inner, desc, value)
            }
            ElementKind::ValuePair => self.nested(value, |m| m.write_shape_content(value, desc)),
            ElementKind::SealedStruct => match (value, desc.ty.underlying()) {
                (Value::Struct(instance), Type::Named(def)) if instance.ty == *def => {
                    self.nested(value, |m| m.write_user_typed(value, def))
                }
                (other, _) => Err(element_mismatch(desc, other)),
            },
            ElementKind::ReferenceShape | ElementKind::SealedClass => {
                self.write_typed_reference(kind, desc, value)
            }
        }
    }

    /// Id field of a sealed reference position, followed by content when new
    fn write_typed_reference(
        &mut self,
        kind: &ElementKind,
        desc: &TypeDescriptor,
        value: &Value,
    ) -> Result<()> {
        let obj = match value {
            Value::Null => return self.w.write_7bit(0),
            Value::Ref(obj) => obj,
            other => return Err(element_mismatch(desc, other)),
        };
        if let Some((id, _)) = self.ids.lookup(obj) {
            return self.w.write_7bit(id);
        }
        if obj.runtime_type() != desc.ty {
            return Err(element_mismatch(desc, value));
        }
        self.write_new_id(obj, None)?;
        match (kind, &desc.ty) {
            (ElementKind::SealedClass, Type::Named(def)) => {
                let def = def.clone();
                self.nested(value, |m| m.write_user_typed(value, &def))
            }
            _ => self.nested(value, |m| m.write_shape_content(value, desc)),
        }
    }

    fn nested(
        &mut self,
        value: &Value,
        f: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        self.enter(value)?;
        let result = f(self);
        self.depth -= 1;
        result
    }
}

fn child<'d>(desc: Option<&'d TypeDescriptor>, owner: &Type) -> Result<&'d TypeDescriptor> {
    desc.ok_or_else(|| Error::InvalidOperation(format!("{} has no element type", owner)))
}

fn element_mismatch(desc: &TypeDescriptor, value: &Value) -> Error {
    Error::InvalidOperation(format!(
        "a {} cannot be stored where {} is declared",
        value.type_name(),
        desc.ty
    ))
}

/// Slot values of a struct value or class instance
fn instance_slots(value: &Value, def: &TypeDefRef) -> Result<Vec<Value>> {
    match value {
        Value::Struct(instance) => Ok(instance.slots.clone()),
        Value::Ref(obj) => match &*obj.borrow() {
            HeapObject::Instance(instance) => Ok(instance.slots.clone()),
            other => Err(Error::InvalidOperation(format!(
                "expected an instance of {}, found {}",
                def.name(),
                other.runtime_type()
            ))),
        },
        other => Err(Error::InvalidOperation(format!(
            "expected an instance of {}, found {}",
            def.name(),
            other.type_name()
        ))),
    }
}

/// Fixed-width bytes of a blittable struct, every slot in order
pub(crate) fn encode_raw<W: Write>(
    w: &mut BinaryWriter<W>,
    value: &Value,
    def: &TypeDefRef,
) -> Result<()> {
    let instance = value.as_struct().ok_or_else(|| {
        Error::InvalidOperation(format!("expected a {} struct", def.name()))
    })?;
    let layout = def.layout();
    for field in layout.fields_by_slot() {
        let slot = instance.slots.get(field.slot).unwrap_or(&Value::Null);
        match (&field.ty, slot) {
            (Type::Known(known), v) => builtins::write_known(w, *known, v)?,
            (Type::Named(_), Value::Enum(e)) => {
                let payload = enum_payload(e)?;
                write_payload(w, &payload)?;
            }
            (Type::Named(inner), nested @ Value::Struct(_)) => encode_raw(w, nested, inner)?,
            (ty, v) => {
                return Err(Error::InvalidOperation(format!(
                    "field {} of {} holds a {} instead of {}",
                    field.name,
                    def.name(),
                    v.type_name(),
                    ty
                )))
            }
        }
    }
    Ok(())
}

fn write_payload<W: Write>(w: &mut BinaryWriter<W>, payload: &Value) -> Result<()> {
    match payload.runtime_type() {
        Some(Type::Known(known)) => builtins::write_known(w, known, payload),
        _ => Err(Error::InvalidOperation(format!(
            "{} is not an integer payload",
            payload.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphbin_core::{IntegerKind, Instance, TypeDef};

    #[test]
    fn test_raw_struct_layout() {
        let flag = TypeDef::enumeration("Flag", IntegerKind::U8).build();
        let point = TypeDef::structure("Point")
            .field("x", Type::known(KnownType::I32))
            .field("flag", Type::named(&flag))
            .build();
        let value = Value::from(
            Instance::new(&point)
                .with("x", Value::I32(0x0102_0304))
                .with(
                    "flag",
                    Value::Enum(graphbin_core::EnumValue::new(&flag, 7).unwrap()),
                ),
        );
        let mut w = BinaryWriter::new(Vec::new());
        encode_raw(&mut w, &value, &point).unwrap();
        assert_eq!(w.into_inner(), vec![0x04, 0x03, 0x02, 0x01, 7]);
    }

    #[test]
    fn test_raw_struct_rejects_wrong_slot() {
        let point = TypeDef::structure("Point")
            .field("x", Type::known(KnownType::I32))
            .build();
        let value = Value::from(Instance::new(&point).with("x", Value::from("text")));
        let mut w = BinaryWriter::new(Vec::new());
        assert!(encode_raw(&mut w, &value, &point).is_err());
    }
}
