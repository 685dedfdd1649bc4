//! Hook Tests
//!
//! Custom serializers, binary hooks, serialization events and
//! deserialization callbacks.

use crate::common::*;
use graphbin::{BinarySerializable, CustomSerializer, SerializationEvents};
use std::rc::Rc;

// ============================================================================
// Custom serializers
// ============================================================================

/// Stores a temperature as a single `celsius` entry
struct TemperatureSerializer;

impl CustomSerializer for TemperatureSerializer {
    fn get_object_data(&self, obj: &Value, info: &mut SerializationInfo) -> Result<()> {
        let kelvin = obj.as_ref().and_then(|o| o.field("kelvin"));
        let celsius = match kelvin {
            Some(Value::F64(k)) => k - 273.0,
            _ => return Err(Error::Hook("temperature without kelvin".into())),
        };
        info.add_typed("celsius", Value::F64(celsius), Type::known(KnownType::F64));
        Ok(())
    }

    fn set_object_data(&self, obj: &mut Value, info: &SerializationInfo) -> Result<()> {
        let celsius = match info.get("celsius") {
            Some(Value::F64(c)) => *c,
            _ => return Err(Error::Hook("missing celsius entry".into())),
        };
        let target = obj.as_ref().ok_or_else(|| Error::Hook("expected an object".into()))?;
        target.set_field("kelvin", Value::F64(celsius + 273.0))
    }
}

fn temperature_type() -> TypeDefRef {
    TypeDef::class("App.Temperature")
        .field("kelvin", Type::known(KnownType::F64))
        .custom_serializer(Rc::new(TemperatureSerializer))
        .build()
}

#[test]
fn custom_serializer_round_trip() {
    let def = temperature_type();
    let formatter = formatter(&[&def]);
    let value = Value::Ref(ObjRef::instance(
        Instance::new(&def).with("kelvin", Value::F64(300.0)),
    ));

    let bytes = formatter.serialize(&value).unwrap();
    assert!(contains_bytes(&bytes, b"celsius"));
    assert!(!contains_bytes(&bytes, b"kelvin"));

    let copy = formatter.deserialize(&bytes).unwrap();
    assert_eq!(copy.as_ref().unwrap().field("kelvin"), Some(Value::F64(300.0)));
}

#[test]
fn custom_serializer_ignored_by_option() {
    let def = temperature_type();
    let options = SerializerOptions::strict().with_ignore_custom_serialization(true);
    let formatter = formatter(&[&def]).with_options(options);
    let value = Value::Ref(ObjRef::instance(
        Instance::new(&def).with("kelvin", Value::F64(300.0)),
    ));

    let bytes = formatter.serialize(&value).unwrap();
    assert!(contains_bytes(&bytes, b"kelvin"));
    assert!(graph_eq(&formatter.deserialize(&bytes).unwrap(), &value));
}

/// Writes money as its transfer type
struct MoneySerializer {
    dto: TypeDefRef,
}

impl CustomSerializer for MoneySerializer {
    fn get_object_data(&self, obj: &Value, info: &mut SerializationInfo) -> Result<()> {
        let cents = obj.as_ref().and_then(|o| o.field("cents")).unwrap_or(Value::Null);
        info.set_type(Type::named(&self.dto));
        info.add_value("amount", cents);
        info.add_value("currency", Value::from("EUR"));
        Ok(())
    }

    fn set_object_data(&self, _obj: &mut Value, _info: &SerializationInfo) -> Result<()> {
        Err(Error::Hook("money is read as its transfer type".into()))
    }
}

#[test]
fn custom_serializer_type_override() {
    let dto = TypeDef::class("App.MoneyDto")
        .field("amount", Type::known(KnownType::I64))
        .field("currency", Type::string())
        .build();
    let money = TypeDef::class("App.Money")
        .field("cents", Type::known(KnownType::I64))
        .custom_serializer(Rc::new(MoneySerializer { dto: dto.clone() }))
        .build();
    let formatter = formatter(&[&dto, &money]);
    let value = Value::Ref(ObjRef::instance(
        Instance::new(&money).with("cents", Value::I64(1250)),
    ));

    let copy = round_trip(&formatter, &value);
    assert_eq!(copy.runtime_type(), Some(Type::named(&dto)));
    let copy = copy.as_ref().unwrap();
    assert_eq!(copy.field("amount"), Some(Value::I64(1250)));
    assert_eq!(copy.field("currency"), Some(Value::from("EUR")));
}

#[test]
fn custom_entries_keep_declared_types() {
    struct Declared;
    impl CustomSerializer for Declared {
        fn get_object_data(&self, _obj: &Value, info: &mut SerializationInfo) -> Result<()> {
            info.add_typed("count", Value::I32(3), Type::known(KnownType::I64));
            info.add_value("note", Value::Null);
            Ok(())
        }

        fn set_object_data(&self, _obj: &mut Value, info: &SerializationInfo) -> Result<()> {
            let count = info.entry("count").ok_or_else(|| Error::Hook("count".into()))?;
            if count.declared != Type::known(KnownType::I64) || count.value != Value::I32(3) {
                return Err(Error::Hook("declared type lost".into()));
            }
            Ok(())
        }
    }

    let def = TypeDef::class("App.Counter")
        .custom_serializer(Rc::new(Declared))
        .build();
    let formatter = formatter(&[&def]);
    round_trip(&formatter, &Value::Ref(ObjRef::instance(Instance::new(&def))));
}

// ============================================================================
// Binary hooks
// ============================================================================

/// Stores a blob's `data` string as raw UTF-8
struct BlobCodec;

impl BinarySerializable for BlobCodec {
    fn to_bytes(&self, obj: &Value) -> Result<Vec<u8>> {
        match obj.as_ref().and_then(|o| o.field("data")) {
            Some(Value::String(s)) => Ok(s.into_bytes()),
            _ => Ok(Vec::new()),
        }
    }

    fn from_bytes(&self, ty: &TypeDefRef, bytes: &[u8]) -> Result<Value> {
        let text = String::from_utf8(bytes.to_vec()).map_err(|e| Error::Hook(e.to_string()))?;
        Ok(Value::Ref(ObjRef::instance(
            Instance::new(ty).with("data", Value::from(text)),
        )))
    }
}

#[test]
fn binary_hook_keeps_identity() {
    let def = TypeDef::class("App.Blob")
        .field("data", Type::string())
        .binary_serializable(Rc::new(BlobCodec))
        .build();
    let formatter = formatter(&[&def]);
    let blob = ObjRef::instance(Instance::new(&def).with("data", Value::from("payload")));
    let value = Value::Ref(object_array(vec![Value::Ref(blob.clone()), Value::Ref(blob)]));

    let bytes = formatter.serialize(&value).unwrap();
    assert!(contains_bytes(&bytes, b"payload"));
    assert!(!contains_bytes(&bytes, b"data"));

    let copy = formatter.deserialize(&bytes).unwrap();
    let items = items_of(&copy);
    assert!(same(&items[0], &items[1]));
    assert_eq!(items[0].as_ref().unwrap().field("data"), Some(Value::from("payload")));
}

// ============================================================================
// Events and callbacks
// ============================================================================

struct EventLog {
    log: Log,
}

impl SerializationEvents for EventLog {
    fn on_serializing(&self, _obj: &Value) -> Result<()> {
        self.log.push("serializing");
        Ok(())
    }

    fn on_serialized(&self, _obj: &Value) -> Result<()> {
        self.log.push("serialized");
        Ok(())
    }

    fn on_deserializing(&self, _obj: &Value) -> Result<()> {
        self.log.push("deserializing");
        Ok(())
    }

    fn on_deserialized(&self, _obj: &Value) -> Result<()> {
        self.log.push("deserialized");
        Ok(())
    }
}

#[test]
fn serialization_events_fire_in_order() {
    let log = Log::default();
    let def = TypeDef::class("App.Audited")
        .field("value", Type::known(KnownType::I32))
        .events(Rc::new(EventLog { log: log.clone() }))
        .build();
    let formatter = formatter(&[&def]);
    let value = Value::Ref(ObjRef::instance(Instance::new(&def).with("value", Value::I32(9))));

    let copy = round_trip(&formatter, &value);
    assert!(graph_eq(&copy, &value));
    assert_eq!(
        log.entries(),
        vec!["serializing", "serialized", "deserializing", "deserialized"]
    );
}

#[test]
fn serialization_events_ignored_by_option() {
    let log = Log::default();
    let def = TypeDef::class("App.Audited")
        .events(Rc::new(EventLog { log: log.clone() }))
        .build();
    let options = SerializerOptions::strict().with_ignore_serialization_methods(true);
    let formatter = formatter(&[&def]).with_options(options);
    round_trip(&formatter, &Value::Ref(ObjRef::instance(Instance::new(&def))));
    assert!(log.entries().is_empty());
}

#[test]
fn callbacks_run_after_the_root_most_recent_first() {
    let log = Log::default();
    let def = TypeDef::class("App.Tree")
        .field("name", Type::string())
        .field("left", Type::object())
        .field("right", Type::object())
        .deserialization_callback(Rc::new(NameRecorder { log: log.clone() }))
        .build();
    let formatter = formatter(&[&def]);
    let named = |name: &str| ObjRef::instance(Instance::new(&def).with("name", Value::from(name)));
    let root = named("root");
    root.set_field("left", Value::Ref(named("left"))).unwrap();
    root.set_field("right", Value::Ref(named("right"))).unwrap();

    let bytes = formatter.serialize(&Value::Ref(root)).unwrap();
    assert!(log.entries().is_empty());
    formatter.deserialize(&bytes).unwrap();
    assert_eq!(log.entries(), vec!["root", "right", "left"]);
}

#[test]
fn failing_hook_surfaces_as_error() {
    struct Refuse;
    impl CustomSerializer for Refuse {
        fn get_object_data(&self, _obj: &Value, _info: &mut SerializationInfo) -> Result<()> {
            Err(Error::Hook("refused".into()))
        }

        fn set_object_data(&self, _obj: &mut Value, _info: &SerializationInfo) -> Result<()> {
            Ok(())
        }
    }

    let def = TypeDef::class("App.Refusing")
        .custom_serializer(Rc::new(Refuse))
        .build();
    let formatter = formatter(&[&def]);
    let err = formatter
        .serialize(&Value::Ref(ObjRef::instance(Instance::new(&def))))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Hook);
}
