//! Whole-graph scenarios
//!
//! Heterogeneous arrays, nested collections, inheritance and structs.

use crate::common::*;
use graphbin::{Decimal, TimeSpan, Uri, Version};
use uuid::Uuid;

// ============================================================================
// Heterogeneous values
// ============================================================================

#[test]
fn heterogeneous_object_array() {
    let formatter = formatter(&[]);
    let inner = list_of(Type::known(KnownType::I32), vec![Value::I32(1), Value::I32(2)]);
    let array = object_array(vec![
        Value::I32(42),
        Value::from("text"),
        Value::Null,
        Value::Bool(false),
        Value::F64(-0.5),
        Value::Char('x'),
        Value::Decimal(Decimal::new(12_345, 2).unwrap()),
        Value::Guid(Uuid::from_u128(0x1234_5678_9abc_def0)),
        Value::TimeSpan(TimeSpan::from_ticks(36_000_000_000)),
        Value::Version(Version::new(2, 1).with_build(7)),
        Value::Uri(Uri::absolute("https://example.com/a?b=c")),
        Value::DbNull,
        Value::Type(Type::dictionary(Type::string(), Type::object())),
        Value::Ref(inner),
        Value::Ref(ObjRef::plain()),
    ]);
    let value = Value::Ref(array);

    let copy = round_trip(&formatter, &value);
    assert!(graph_eq(&copy, &value));
}

#[test]
fn typed_string_array_keeps_nulls() {
    let formatter = formatter(&[]);
    let array = ArrayObject::vector(
        Type::string(),
        vec![Value::from(""), Value::Null, Value::from("ünïcødé")],
    );
    let value = Value::Ref(ObjRef::array(array));
    assert!(graph_eq(&round_trip(&formatter, &value), &value));
}

#[test]
fn multi_dimensional_array_keeps_bounds() {
    let formatter = formatter(&[]);
    let mut array =
        ArrayObject::multi(Type::known(KnownType::I32), vec![2, 3], vec![1, -2]).unwrap();
    array.set(&[1, -2], Value::I32(10)).unwrap();
    array.set(&[2, 0], Value::I32(20)).unwrap();
    let value = Value::Ref(ObjRef::array(array));

    let copy = round_trip(&formatter, &value);
    assert!(graph_eq(&copy, &value));
    match &*copy.as_ref().unwrap().borrow() {
        HeapObject::Array(array) => {
            assert_eq!(array.lower_bounds, vec![1, -2]);
            assert_eq!(array.get(&[2, 0]), Some(&Value::I32(20)));
        }
        _ => panic!("expected an array"),
    };
}

#[test]
fn empty_multi_dimensional_arrays() {
    let formatter = formatter(&[]);
    for lengths in [vec![0, 0], vec![0, 3]] {
        let array = ArrayObject::multi(Type::object(), lengths.clone(), vec![0, 0]).unwrap();
        let value = Value::Ref(ObjRef::array(array));

        let copy = round_trip(&formatter, &value);
        assert!(graph_eq(&copy, &value), "{:?}", lengths);
        match &*copy.as_ref().unwrap().borrow() {
            HeapObject::Array(array) => {
                assert_eq!(array.lengths, lengths);
                assert!(array.items.is_empty());
            }
            _ => panic!("expected an array"),
        };
    }
}

#[test]
fn empty_nested_dictionary() {
    let formatter = formatter(&[]);
    let inner_type = Type::dictionary(Type::known(KnownType::I32), Type::string());
    let outer = CollectionObject::new(
        CollectionKind::Dictionary,
        vec![Type::string(), inner_type.clone()],
    )
    .unwrap();
    let value = Value::Ref(ObjRef::collection(outer));

    let copy = round_trip(&formatter, &value);
    assert!(graph_eq(&copy, &value));
    assert_eq!(
        copy.runtime_type(),
        Some(Type::dictionary(Type::string(), inner_type))
    );
}

#[test]
fn null_in_nullable_field() {
    let def = TypeDef::class("App.Reading")
        .field("celsius", Type::nullable(Type::known(KnownType::F64)))
        .field("station", Type::string())
        .build();
    let formatter = formatter(&[&def]);
    let reading = |celsius: Value| {
        Value::Ref(ObjRef::instance(
            Instance::new(&def)
                .with("celsius", celsius)
                .with("station", Value::from("north")),
        ))
    };
    let value = Value::Ref(object_array(vec![
        reading(Value::Null),
        reading(Value::F64(21.5)),
    ]));

    let copy = round_trip(&formatter, &value);
    assert!(graph_eq(&copy, &value));
    let items = items_of(&copy);
    assert_eq!(items[0].as_ref().unwrap().field("celsius"), Some(Value::Null));
    assert_eq!(items[1].as_ref().unwrap().field("celsius"), Some(Value::F64(21.5)));
}

// ============================================================================
// Collections
// ============================================================================

#[test]
fn nested_dictionary() {
    let formatter = formatter(&[]);
    let inner_type = Type::dictionary(Type::string(), Type::known(KnownType::I32));
    let mut outer = CollectionObject::new(
        CollectionKind::Dictionary,
        vec![Type::string(), inner_type.clone()],
    )
    .unwrap();
    for (name, count) in [("a", 1), ("b", 2)] {
        let mut inner = CollectionObject::new(
            CollectionKind::Dictionary,
            vec![Type::string(), Type::known(KnownType::I32)],
        )
        .unwrap();
        for i in 0..count {
            inner.insert(Value::from(format!("k{}", i)), Value::I32(i)).unwrap();
        }
        outer
            .insert(Value::from(name), Value::Ref(ObjRef::collection(inner)))
            .unwrap();
    }
    let value = Value::Ref(ObjRef::collection(outer));

    let copy = round_trip(&formatter, &value);
    assert!(graph_eq(&copy, &value));
    assert_eq!(copy.runtime_type(), Some(Type::dictionary(Type::string(), inner_type)));
}

#[test]
fn dictionary_of_objects() {
    let person_def = person_type();
    let formatter = formatter(&[&person_def]);
    let ada = person(&person_def, "Ada", 36);
    let mut map = CollectionObject::new(
        CollectionKind::Dictionary,
        vec![Type::known(KnownType::I32), Type::object()],
    )
    .unwrap();
    map.insert(Value::I32(1), Value::Ref(ada.clone())).unwrap();
    map.insert(Value::I32(2), Value::from("plain text")).unwrap();
    map.insert(Value::I32(3), Value::Ref(ada)).unwrap();
    let value = Value::Ref(ObjRef::collection(map));

    let copy = round_trip(&formatter, &value);
    assert!(graph_eq(&copy, &value));
}

#[test]
fn sorted_and_ordered_collections() {
    let formatter = formatter(&[]);
    let mut sorted = CollectionObject::new(
        CollectionKind::SortedDictionary,
        vec![Type::known(KnownType::I32), Type::string()],
    )
    .unwrap();
    for key in [5, 1, 3] {
        sorted.insert(Value::I32(key), Value::from(key.to_string())).unwrap();
    }
    let mut ordered = CollectionObject::new(CollectionKind::OrderedDictionary, vec![]).unwrap();
    ordered.insert(Value::from("z"), Value::I32(1)).unwrap();
    ordered.insert(Value::from("a"), Value::I32(2)).unwrap();
    let mut set = CollectionObject::new(CollectionKind::SortedSet, vec![Type::string()]).unwrap();
    for item in ["pear", "apple", "fig"] {
        set.add(Value::from(item)).unwrap();
    }
    let value = Value::Ref(object_array(vec![
        Value::Ref(ObjRef::collection(sorted)),
        Value::Ref(ObjRef::collection(ordered)),
        Value::Ref(ObjRef::collection(set)),
    ]));

    let copy = round_trip(&formatter, &value);
    assert!(graph_eq(&copy, &value));
    let parts = items_of(&copy);
    assert_eq!(
        items_of(&parts[2]),
        vec![Value::from("apple"), Value::from("fig"), Value::from("pear")]
    );
}

#[test]
fn queue_stack_and_linked_list_keep_order() {
    let formatter = formatter(&[]);
    let mut parts = Vec::new();
    for kind in [CollectionKind::Queue, CollectionKind::Stack, CollectionKind::LinkedList] {
        let mut c = CollectionObject::new(kind, vec![Type::known(KnownType::I64)]).unwrap();
        for i in [3i64, 1, 2] {
            c.add(Value::I64(i)).unwrap();
        }
        parts.push(Value::Ref(ObjRef::collection(c)));
    }
    let value = Value::Ref(object_array(parts));
    assert!(graph_eq(&round_trip(&formatter, &value), &value));
}

#[test]
fn key_value_pairs_as_values() {
    let formatter = formatter(&[]);
    let pair = graphbin::KeyValuePair::new(
        Type::string(),
        Type::object(),
        Value::from("answer"),
        Value::I32(42),
    );
    let entry = graphbin::DictionaryEntry {
        key: Value::I32(1),
        value: Value::from("one"),
    };
    let value = Value::Ref(object_array(vec![
        Value::KeyValuePair(Box::new(pair)),
        Value::DictionaryEntry(Box::new(entry)),
    ]));
    assert!(graph_eq(&round_trip(&formatter, &value), &value));
}

#[test]
fn non_generic_hashtable() {
    let formatter = formatter(&[]);
    let mut table = CollectionObject::new(CollectionKind::Hashtable, vec![]).unwrap();
    table.insert(Value::from("x"), Value::F32(1.5)).unwrap();
    table.insert(Value::I32(7), Value::Null).unwrap();
    let value = Value::Ref(ObjRef::collection(table));
    assert!(graph_eq(&round_trip(&formatter, &value), &value));
}

// ============================================================================
// User types
// ============================================================================

#[test]
fn derived_class_writes_every_level() {
    let base = person_type();
    let employee = TypeDef::class("App.Employee")
        .assembly("App")
        .base(&base)
        .field("salary", Type::known(KnownType::Decimal))
        .build();
    let formatter = formatter(&[&base, &employee]);
    let obj = ObjRef::instance(
        Instance::new(&employee)
            .with("name", Value::from("Grace"))
            .with("age", Value::I32(45))
            .with("salary", Value::Decimal(Decimal::new(100_000, 0).unwrap())),
    );
    let value = Value::Ref(obj);

    let copy = round_trip(&formatter, &value);
    assert!(graph_eq(&copy, &value));
    assert_eq!(copy.as_ref().unwrap().field("name"), Some(Value::from("Grace")));
}

#[test]
fn transient_fields_are_not_written() {
    let def = TypeDef::class("App.Session")
        .field("user", Type::string())
        .transient_field("token", Type::string())
        .build();
    let formatter = formatter(&[&def]);
    let obj = ObjRef::instance(
        Instance::new(&def)
            .with("user", Value::from("ada"))
            .with("token", Value::from("secret-token")),
    );
    let bytes = formatter.serialize(&Value::Ref(obj)).unwrap();
    assert!(!contains_bytes(&bytes, b"secret-token"));

    let copy = formatter.deserialize(&bytes).unwrap();
    let copy = copy.as_ref().unwrap();
    assert_eq!(copy.field("user"), Some(Value::from("ada")));
    assert_eq!(copy.field("token"), Some(Value::Null));
}

#[test]
fn struct_fields_inside_class() {
    let point = TypeDef::structure("App.Point")
        .field("x", Type::known(KnownType::I32))
        .field("y", Type::known(KnownType::I32))
        .build();
    let shape = TypeDef::class("App.Shape")
        .field("origin", Type::named(&point))
        .field("corners", Type::array(Type::named(&point)))
        .build();
    let formatter = formatter(&[&point, &shape]);
    let at = |x, y| {
        Value::from(Instance::new(&point).with("x", Value::I32(x)).with("y", Value::I32(y)))
    };
    let corners = ArrayObject::vector(Type::named(&point), vec![at(0, 0), at(4, 3)]);
    let obj = ObjRef::instance(
        Instance::new(&shape)
            .with("origin", at(1, 2))
            .with("corners", Value::Ref(ObjRef::array(corners))),
    );
    let value = Value::Ref(obj);
    assert!(graph_eq(&round_trip(&formatter, &value), &value));
}

#[test]
fn sealed_class_elements() {
    let leaf = TypeDef::class("App.Leaf")
        .sealed()
        .field("weight", Type::known(KnownType::F64))
        .build();
    let formatter = formatter(&[&leaf]);
    let a = ObjRef::instance(Instance::new(&leaf).with("weight", Value::F64(1.25)));
    let list = list_of(
        Type::named(&leaf),
        vec![Value::Ref(a.clone()), Value::Null, Value::Ref(a)],
    );
    let value = Value::Ref(list);

    let copy = round_trip(&formatter, &value);
    assert!(graph_eq(&copy, &value));
    let items = items_of(&copy);
    assert!(same(&items[0], &items[2]));
}

#[test]
fn unknown_type_on_read() {
    let def = person_type();
    let writer = formatter(&[&def]);
    let reader = formatter(&[]);
    let bytes = writer.serialize(&Value::Ref(person(&def, "Ada", 36))).unwrap();
    let err = reader.deserialize(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeNotFound);
}

#[test]
fn non_serializable_type_rejected() {
    let def = TypeDef::class("App.Handle").not_serializable().build();
    let formatter = formatter(&[&def]);
    let err = formatter
        .serialize(&Value::Ref(ObjRef::instance(Instance::new(&def))))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}
