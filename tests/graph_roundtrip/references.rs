//! Identity Tests
//!
//! Shared references, cycles, and objects replaced while reading.

use crate::common::*;
use graphbin::{ObjectReference, SerializationSurrogate};
use std::cell::RefCell;
use std::rc::Rc;

// ============================================================================
// Sharing and cycles
// ============================================================================

#[test]
fn shared_reference_restored_once() {
    let def = person_type();
    let formatter = formatter(&[&def]);
    let ada = person(&def, "Ada", 36);
    let value = Value::Ref(object_array(vec![
        Value::Ref(ada.clone()),
        Value::Ref(ada.clone()),
        Value::Ref(ada),
    ]));

    let copy = round_trip(&formatter, &value);
    let items = items_of(&copy);
    assert!(same(&items[0], &items[1]));
    assert!(same(&items[1], &items[2]));
}

#[test]
fn shared_reference_in_field_and_list() {
    let def = person_type();
    let formatter = formatter(&[&def]);
    let ada = person(&def, "Ada", 36);
    let bob = person(&def, "Bob", 40);
    bob.set_field("friend", Value::Ref(ada.clone())).unwrap();
    let list = list_of(Type::object(), vec![Value::Ref(bob), Value::Ref(ada)]);

    let copy = round_trip(&formatter, &Value::Ref(list));
    let items = items_of(&copy);
    let friend = items[0].as_ref().unwrap().field("friend").unwrap();
    assert!(same(&friend, &items[1]));
}

#[test]
fn two_node_cycle() {
    let def = node_type();
    let formatter = formatter(&[&def]);
    let a = node(&def, "a");
    let b = node(&def, "b");
    a.set_field("next", Value::Ref(b.clone())).unwrap();
    b.set_field("next", Value::Ref(a.clone())).unwrap();
    let value = Value::Ref(a);

    let copy = round_trip(&formatter, &value);
    assert!(graph_eq(&copy, &value));
    let next = copy.as_ref().unwrap().field("next").unwrap();
    let back = next.as_ref().unwrap().field("next").unwrap();
    assert!(same(&back, &copy));

    // break the cycles so the Rc graphs are freed
    value.as_ref().unwrap().set_field("next", Value::Null).unwrap();
    copy.as_ref().unwrap().set_field("next", Value::Null).unwrap();
}

#[test]
fn list_containing_itself() {
    let formatter = formatter(&[]);
    let list = list_of(Type::object(), vec![Value::I32(1)]);
    if let HeapObject::Collection(c) = &mut *list.borrow_mut() {
        c.add(Value::Ref(list.clone())).unwrap();
    }
    let value = Value::Ref(list);

    let copy = round_trip(&formatter, &value);
    let items = items_of(&copy);
    assert_eq!(items[0], Value::I32(1));
    assert!(same(&items[1], &copy));

    for v in [&value, &copy] {
        if let HeapObject::Collection(c) = &mut *v.as_ref().unwrap().borrow_mut() {
            if let graphbin::CollectionData::Seq(items) = c.data_mut() {
                items.clear();
            }
        }
    }
}

#[test]
fn equal_but_distinct_objects_stay_distinct() {
    let def = person_type();
    let formatter = formatter(&[&def]);
    let value = Value::Ref(object_array(vec![
        Value::Ref(person(&def, "Ada", 36)),
        Value::Ref(person(&def, "Ada", 36)),
    ]));
    let copy = round_trip(&formatter, &value);
    let items = items_of(&copy);
    assert!(!same(&items[0], &items[1]));
    assert!(graph_eq(&copy, &value));
}

// ============================================================================
// Boxed structs
// ============================================================================

fn point_struct() -> TypeDefRef {
    TypeDef::structure("App.Point")
        .field("x", Type::known(KnownType::I32))
        .field("y", Type::known(KnownType::I32))
        .build()
}

#[test]
fn boxed_struct_keeps_identity() {
    let def = point_struct();
    let point = Instance::new(&def).with("x", Value::I32(3)).with("y", Value::I32(-4));
    let boxed = ObjRef::instance(point.clone());

    for compact in [true, false] {
        let formatter = formatter(&[&def])
            .with_options(SerializerOptions::strict().with_compact_structures(compact));
        let value = Value::Ref(object_array(vec![
            Value::Ref(boxed.clone()),
            Value::Ref(boxed.clone()),
            Value::from(point.clone()),
        ]));

        let copy = round_trip(&formatter, &value);
        assert!(graph_eq(&copy, &value), "compact {}", compact);
        let items = items_of(&copy);
        assert!(same(&items[0], &items[1]));
        assert_eq!(items[0].as_ref().unwrap().field("y"), Some(Value::I32(-4)));
        assert!(matches!(items[2], Value::Struct(_)));
    }
}

#[test]
fn boxed_struct_root_and_self_reference() {
    let def = TypeDef::structure("App.Tag")
        .field("label", Type::string())
        .field("owner", Type::object())
        .build();
    let formatter = formatter(&[&def]);
    let tag = ObjRef::instance(Instance::new(&def).with("label", Value::from("root")));
    tag.set_field("owner", Value::Ref(tag.clone())).unwrap();
    let value = Value::Ref(tag);

    let copy = round_trip(&formatter, &value);
    assert!(graph_eq(&copy, &value));
    let owner = copy.as_ref().unwrap().field("owner").unwrap();
    assert!(same(&owner, &copy));

    value.as_ref().unwrap().set_field("owner", Value::Null).unwrap();
    copy.as_ref().unwrap().set_field("owner", Value::Null).unwrap();
}

// ============================================================================
// Object references
// ============================================================================

/// Resolves every deserialized settings object to one shared instance
struct SharedSettings {
    instance: RefCell<Option<ObjRef>>,
}

impl ObjectReference for SharedSettings {
    fn get_real_object(&self, _obj: &Value) -> Result<Value> {
        self.instance
            .borrow()
            .clone()
            .map(Value::Ref)
            .ok_or_else(|| Error::Hook("no shared settings instance".to_string()))
    }
}

#[test]
fn object_reference_resolves_singleton() {
    let hook = Rc::new(SharedSettings {
        instance: RefCell::new(None),
    });
    let def = TypeDef::class("App.Settings")
        .field("theme", Type::string())
        .object_reference(hook.clone())
        .build();
    let singleton = ObjRef::instance(Instance::new(&def).with("theme", Value::from("dark")));
    *hook.instance.borrow_mut() = Some(singleton.clone());
    let formatter = formatter(&[&def]);

    let written = ObjRef::instance(Instance::new(&def).with("theme", Value::from("light")));
    let value = Value::Ref(object_array(vec![
        Value::Ref(written.clone()),
        Value::from("between"),
        Value::Ref(written),
    ]));

    let copy = round_trip(&formatter, &value);
    let items = items_of(&copy);
    let expected = Value::Ref(singleton);
    assert!(same(&items[0], &expected));
    assert!(same(&items[2], &expected));

    *hook.instance.borrow_mut() = None;
}

#[test]
fn object_reference_ignored_by_option() {
    let hook = Rc::new(SharedSettings {
        instance: RefCell::new(None),
    });
    let def = TypeDef::class("App.Settings")
        .field("theme", Type::string())
        .object_reference(hook)
        .build();
    let formatter = formatter(&[&def])
        .with_options(SerializerOptions::strict().with_ignore_object_reference(true));
    let value = Value::Ref(ObjRef::instance(
        Instance::new(&def).with("theme", Value::from("light")),
    ));

    // the hook would fail without an instance
    let copy = round_trip(&formatter, &value);
    assert!(graph_eq(&copy, &value));
}

// ============================================================================
// Surrogates
// ============================================================================

/// Writes points as `x`/`y` entries and rebuilds them into the blank instance
struct PointSurrogate;

impl SerializationSurrogate for PointSurrogate {
    fn get_object_data(&self, obj: &Value, info: &mut SerializationInfo) -> Result<()> {
        let obj = obj.as_ref().ok_or_else(|| Error::Hook("expected an object".into()))?;
        info.add_value("x", obj.field("x").unwrap_or(Value::Null));
        info.add_value("y", obj.field("y").unwrap_or(Value::Null));
        Ok(())
    }

    fn set_object_data(&self, obj: Value, info: &SerializationInfo) -> Result<Value> {
        let target = obj.as_ref().ok_or_else(|| Error::Hook("expected an object".into()))?;
        for name in ["x", "y"] {
            target.set_field(name, info.get(name).cloned().unwrap_or(Value::Null))?;
        }
        Ok(obj)
    }
}

/// Replaces every point with a fresh instance on read
struct ReplacingSurrogate {
    def: TypeDefRef,
}

impl SerializationSurrogate for ReplacingSurrogate {
    fn get_object_data(&self, obj: &Value, info: &mut SerializationInfo) -> Result<()> {
        PointSurrogate.get_object_data(obj, info)
    }

    fn set_object_data(&self, _obj: Value, info: &SerializationInfo) -> Result<Value> {
        let mut instance = Instance::new(&self.def);
        instance.set("x", info.get("x").cloned().unwrap_or(Value::Null))?;
        instance.set("y", info.get("y").cloned().unwrap_or(Value::Null))?;
        Ok(Value::Ref(ObjRef::instance(instance)))
    }
}

fn legacy_point() -> TypeDefRef {
    TypeDef::class("Legacy.Point")
        .not_serializable()
        .field("x", Type::known(KnownType::I32))
        .field("y", Type::known(KnownType::I32))
        .build()
}

fn point_at(def: &TypeDefRef, x: i32, y: i32) -> ObjRef {
    ObjRef::instance(Instance::new(def).with("x", Value::I32(x)).with("y", Value::I32(y)))
}

#[test]
fn surrogate_serializes_unserializable_type() {
    let def = legacy_point();
    let surrogates = SurrogateTable::new().with(Type::named(&def), Rc::new(PointSurrogate));
    let hooked = formatter(&[&def]).with_surrogates(Rc::new(surrogates));
    let value = Value::Ref(point_at(&def, 3, -4));

    let copy = round_trip(&hooked, &value);
    assert!(graph_eq(&copy, &value));

    // without the surrogate the type is rejected
    let plain = formatter(&[&def]);
    assert_eq!(plain.serialize(&value).unwrap_err().kind(), ErrorKind::Unsupported);
}

#[test]
fn surrogate_replacement_patches_earlier_references() {
    let def = legacy_point();
    let surrogates = SurrogateTable::new().with(
        Type::named(&def),
        Rc::new(ReplacingSurrogate { def: def.clone() }),
    );
    let formatter = formatter(&[&def]).with_surrogates(Rc::new(surrogates));
    let p = point_at(&def, 1, 2);
    let value = Value::Ref(list_of(
        Type::object(),
        vec![Value::Ref(p.clone()), Value::Ref(p)],
    ));

    let copy = round_trip(&formatter, &value);
    let items = items_of(&copy);
    assert!(same(&items[0], &items[1]));
    assert_eq!(items[0].as_ref().unwrap().field("y"), Some(Value::I32(2)));
}

// ============================================================================
// Identity conflicts
// ============================================================================

/// Keeps every handle except the one labelled `swap`, which is replaced by a
/// fresh instance
struct SwapLabelled {
    def: RefCell<Option<TypeDefRef>>,
    swap: &'static str,
}

impl ObjectReference for SwapLabelled {
    fn get_real_object(&self, obj: &Value) -> Result<Value> {
        let label = obj.as_ref().and_then(|o| o.field("label"));
        match (&*self.def.borrow(), label) {
            (Some(def), Some(Value::String(label))) if label == self.swap => {
                let fresh = Instance::new(def).with("label", Value::from("fresh"));
                Ok(Value::Ref(ObjRef::instance(fresh)))
            }
            _ => Ok(obj.clone()),
        }
    }
}

/// `a.link = b`, `b.link = {a: b}`: the dictionary entry is read while both
/// handles are still unfinished
fn handles_with_map(swap: &'static str) -> (BinarySerializationFormatter, Value) {
    let hook = Rc::new(SwapLabelled {
        def: RefCell::new(None),
        swap,
    });
    let def = TypeDef::class("App.Handle")
        .field("label", Type::string())
        .field("link", Type::object())
        .object_reference(hook.clone())
        .build();
    *hook.def.borrow_mut() = Some(def.clone());

    let a = ObjRef::instance(Instance::new(&def).with("label", Value::from("a")));
    let b = ObjRef::instance(Instance::new(&def).with("label", Value::from("b")));
    let mut map = CollectionObject::new(
        CollectionKind::Dictionary,
        vec![Type::object(), Type::object()],
    )
    .unwrap();
    map.insert(Value::Ref(a.clone()), Value::Ref(b.clone())).unwrap();
    a.set_field("link", Value::Ref(b.clone())).unwrap();
    b.set_field("link", Value::Ref(ObjRef::collection(map))).unwrap();
    (formatter(&[&def]), Value::Ref(a))
}

#[test]
fn unfinished_key_and_value_kept() {
    let (formatter, value) = handles_with_map("none");
    let copy = round_trip(&formatter, &value);
    assert!(graph_eq(&copy, &value));
}

#[test]
fn unfinished_key_and_value_replaced_later() {
    let (formatter, value) = handles_with_map("b");
    let bytes = formatter.serialize(&value).unwrap();
    let err = formatter.deserialize(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IdentityConflict);
}
