//! Restoring user type instances from field graphs, bags and raw bytes

use super::DeserializationManager;
use crate::naming::MAX_RAW_DEPTH;
use crate::scalar::enum_from_payload;
use crate::usage::UsageRef;
use graphbin_core::{
    ArrayObject, CollectionObject, Error, HeapObject, Instance, KnownType, ObjRef,
    Result, SerializationInfo, Type, TypeDefKind, TypeDefRef, Value,
};
use graphbin_wire::{builtins, BinaryReader};
use std::io::Read;
use tracing::warn;

impl<'a, R: Read> DeserializationManager<'a, R> {
    /// Recursive object graph body of `ty`
    pub(super) fn read_object_graph(&mut self, ty: &Type, boxed: bool) -> Result<Value> {
        let surrogate = self.naming.surrogate_for(ty);
        let def = match (ty, &surrogate) {
            (Type::Named(def), None) => Some(def.clone()),
            _ => None,
        };
        if let Some(def) = &def {
            if !self.naming.can_serialize(def) {
                return Err(Error::unsupported(
                    def.name(),
                    "type is not serializable and recursive fallback is off",
                ));
            }
        }
        let object_reference = def.as_ref().and_then(|d| self.naming.object_reference(d));
        let events = def.as_ref().and_then(|d| self.naming.events(d));

        let blank = allocate(ty, boxed)?;
        let id = if ty.has_identity() || boxed {
            Some(self.ids.add(blank.clone()))
        } else {
            None
        };
        let placeholder = match &blank {
            Value::Ref(obj) if surrogate.is_some() || object_reference.is_some() => {
                self.usages.track(obj);
                Some(obj.clone())
            }
            _ => None,
        };
        if let Some(events) = &events {
            events.on_deserializing(&blank)?;
        }

        let mut value = if self.r.read_bool()? {
            let info = self.read_custom_entries()?;
            if let Some(surrogate) = &surrogate {
                self.pin_entries(&info);
                surrogate.set_object_data(blank.clone(), &info)?
            } else if let Some(custom) = def.as_ref().and_then(|d| self.naming.custom(d)) {
                self.pin_entries(&info);
                let mut value = blank.clone();
                custom.set_object_data(&mut value, &info)?;
                value
            } else {
                let def = graph_owner(ty)?;
                self.populate_from_info(blank.clone(), &def, &info)?
            }
        } else {
            let def = graph_owner(ty)?;
            self.read_default_fields(blank.clone(), &def)?
        };

        if let Some(events) = &events {
            events.on_deserialized(&value)?;
        }
        if let Some(hook) = &object_reference {
            value = hook.get_real_object(&value)?;
        }
        value = super::box_struct(value, boxed);

        if let Some(placeholder) = &placeholder {
            self.usages.resolve(placeholder, &value)?;
        }
        if let (Some(id), Value::Ref(original)) = (id, &blank) {
            let same = matches!(&value, Value::Ref(r) if r.ptr_eq(original));
            if !same {
                self.ids.replace(id, value.clone())?;
            }
        }
        self.push_callback(&value);
        Ok(value)
    }

    /// Field graph written level by level, most-derived first
    ///
    /// Named levels must follow the local hierarchy in order. Lenient reads
    /// search forward for the level and skip names they cannot place.
    fn read_default_fields(&mut self, mut value: Value, def: &TypeDefRef) -> Result<Value> {
        let layout = def.layout();
        let strict = !self.naming.options().ignore_object_changes;
        let mut level = if layout.levels.is_empty() { None } else { Some(0) };
        // next local level a named stream level may match
        let mut next = 1;
        let mut first = true;
        loop {
            if !first {
                let name = self.types.read_name(&mut self.r)?;
                if name.is_empty() {
                    break;
                }
                if strict {
                    match layout.levels.get(next) {
                        Some(expected) if expected.type_name == name => level = Some(next),
                        Some(expected) => {
                            return Err(Error::shape_mismatch(
                                def.name(),
                                format!(
                                    "stream has fields of base type '{}' where '{}' was expected",
                                    name, expected.type_name
                                ),
                            ))
                        }
                        None => {
                            return Err(Error::shape_mismatch(
                                def.name(),
                                format!("stream has fields of unknown base type '{}'", name),
                            ))
                        }
                    }
                } else {
                    level = layout
                        .levels
                        .iter()
                        .enumerate()
                        .skip(next)
                        .find(|(_, l)| l.type_name == name)
                        .map(|(index, _)| index);
                    if level.is_none() {
                        warn!(target: "graphbin::de", type_name = %def.name(), level = %name, "Skipping unplaced base type");
                    }
                }
                if let Some(index) = level {
                    next = index + 1;
                }
            }
            first = false;

            let count = self.r.read_len()?;
            for _ in 0..count {
                let name = self.types.read_name(&mut self.r)?;
                let field_value = self.read_polymorphic()?;
                let slot = level.and_then(|index| {
                    layout.levels[index]
                        .persisted()
                        .find(|f| f.name == name)
                        .map(|f| f.slot)
                });
                match slot {
                    Some(slot) => self.store_field(&mut value, slot, field_value)?,
                    None if strict => {
                        return Err(Error::shape_mismatch(
                            def.name(),
                            format!("unknown field '{}'", name),
                        ))
                    }
                    None => {
                        warn!(target: "graphbin::de", type_name = %def.name(), field = %name, "Skipping unknown field")
                    }
                }
            }
        }
        Ok(value)
    }

    /// Name/value bag of a custom serializer or surrogate
    fn read_custom_entries(&mut self) -> Result<SerializationInfo> {
        let count = self.r.read_len()?;
        let mut info = SerializationInfo::new();
        for _ in 0..count {
            let name = self.types.read_name(&mut self.r)?;
            if name.is_empty() {
                return Err(Error::invalid_stream("serialization info entry without a name"));
            }
            let value = self.read_polymorphic()?;
            let declared = if self.r.read_bool()? {
                self.types.read_type(&mut self.r, &self.naming)?
            } else {
                value.runtime_type().unwrap_or_else(Type::object)
            };
            info.add_typed(name, value, declared);
        }
        Ok(info)
    }

    /// Fields set by name from a bag no hook claimed
    fn populate_from_info(
        &mut self,
        mut value: Value,
        def: &TypeDefRef,
        info: &SerializationInfo,
    ) -> Result<Value> {
        let layout = def.layout();
        let strict = !self.naming.options().ignore_object_changes;
        for entry in info.entries() {
            match layout.find(&entry.name) {
                Some(field) => {
                    let slot = field.slot;
                    self.store_field(&mut value, slot, entry.value.clone())?;
                }
                None if strict => {
                    return Err(Error::shape_mismatch(
                        def.name(),
                        format!("unknown field '{}'", entry.name),
                    ))
                }
                None => {
                    warn!(target: "graphbin::de", type_name = %def.name(), field = %entry.name, "Skipping unknown field")
                }
            }
        }
        Ok(value)
    }

    fn store_field(&mut self, owner: &mut Value, slot: usize, field_value: Value) -> Result<()> {
        match owner {
            Value::Ref(obj) => {
                match &mut *obj.try_borrow_mut()? {
                    HeapObject::Instance(instance) => {
                        set_slot(instance, slot, field_value.clone())?
                    }
                    other => {
                        return Err(Error::invalid_stream(format!(
                            "{} has no fields",
                            other.runtime_type()
                        )))
                    }
                }
                self.usages.record(
                    &field_value,
                    UsageRef::Field {
                        owner: obj.clone(),
                        slot,
                    },
                );
                Ok(())
            }
            Value::Struct(instance) => {
                // struct copies cannot be patched
                self.usages.pin(&field_value);
                set_slot(instance, slot, field_value)
            }
            other => Err(Error::invalid_stream(format!(
                "{} has no fields",
                other.type_name()
            ))),
        }
    }

    fn pin_entries(&mut self, info: &SerializationInfo) {
        for entry in info.entries() {
            self.usages.pin(&entry.value);
        }
    }
}

fn set_slot(instance: &mut Instance, slot: usize, value: Value) -> Result<()> {
    match instance.slots.get_mut(slot) {
        Some(target) => {
            *target = value;
            Ok(())
        }
        None => Err(Error::invalid_stream(format!(
            "slot {} out of range for {}",
            slot,
            instance.ty.name()
        ))),
    }
}

fn graph_owner(ty: &Type) -> Result<TypeDefRef> {
    ty.as_named()
        .cloned()
        .ok_or_else(|| Error::invalid_stream(format!("{} has no field graph", ty)))
}

/// Uninitialized instance of a type about to be populated
fn allocate(ty: &Type, boxed: bool) -> Result<Value> {
    let value = match ty {
        Type::Named(def) => match def.kind() {
            TypeDefKind::Class { .. } => Value::Ref(ObjRef::instance(Instance::new(def))),
            TypeDefKind::Struct if boxed => Value::Ref(ObjRef::instance(Instance::new(def))),
            TypeDefKind::Struct => Value::Struct(Box::new(Instance::new(def))),
            _ => {
                return Err(Error::invalid_stream(format!(
                    "{} cannot be instantiated",
                    def.name()
                )))
            }
        },
        Type::Known(KnownType::Object) => Value::Ref(ObjRef::plain()),
        Type::Array(element, rank) => {
            let dimensions = rank.dimensions();
            Value::Ref(ObjRef::array(ArrayObject {
                element: (**element).clone(),
                rank: *rank,
                lengths: vec![0; dimensions],
                lower_bounds: vec![0; dimensions],
                items: Vec::new(),
            }))
        }
        Type::Collection(kind, args) if !kind.is_pair() => Value::Ref(ObjRef::collection(
            CollectionObject::new(*kind, args.clone())
                .map_err(|e| Error::invalid_stream(e.to_string()))?,
        )),
        other => Value::default_for(other),
    };
    Ok(value)
}

/// Struct decoded from its fixed-width field bytes
pub(super) fn decode_raw<R: Read>(
    r: &mut BinaryReader<R>,
    def: &TypeDefRef,
    depth: usize,
) -> Result<Value> {
    if !def.is_struct() || depth > MAX_RAW_DEPTH {
        return Err(Error::invalid_stream(format!(
            "{} cannot be stored as a raw struct",
            def.name()
        )));
    }
    let mut instance = Instance::new(def);
    let layout = def.layout();
    for field in layout.fields_by_slot() {
        let value = match &field.ty {
            Type::Known(known) if known.fixed_size().is_some() => builtins::read_known(r, *known)?,
            Type::Named(inner) => match inner.kind() {
                TypeDefKind::Enum(underlying) => {
                    let payload = builtins::read_known(r, underlying.known())?;
                    enum_from_payload(inner, &payload)?
                }
                TypeDefKind::Struct => decode_raw(r, inner, depth + 1)?,
                _ => return Err(not_blittable(def, &field.name)),
            },
            _ => return Err(not_blittable(def, &field.name)),
        };
        set_slot(&mut instance, field.slot, value)?;
    }
    Ok(Value::Struct(Box::new(instance)))
}

fn not_blittable(def: &TypeDefRef, field: &str) -> Error {
    Error::invalid_stream(format!(
        "field {} of {} has no raw encoding",
        field,
        def.name()
    ))
}
