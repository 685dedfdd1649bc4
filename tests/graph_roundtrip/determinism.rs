//! Output Stability Tests
//!
//! Equal graphs produce equal bytes, and cached type information keeps the
//! cost of repeated values flat.

use crate::common::*;

fn sample_graph(def: &TypeDefRef) -> Value {
    let ada = person(def, "Ada", 36);
    let bob = person(def, "Bob", 41);
    bob.set_field("friend", Value::Ref(ada.clone())).unwrap();
    let mut map = CollectionObject::new(
        CollectionKind::Dictionary,
        vec![Type::string(), Type::object()],
    )
    .unwrap();
    map.insert(Value::from("ada"), Value::Ref(ada)).unwrap();
    map.insert(Value::from("bob"), Value::Ref(bob)).unwrap();
    map.insert(Value::from("count"), Value::I64(2)).unwrap();
    Value::Ref(ObjRef::collection(map))
}

#[test]
fn repeated_serialization_is_byte_identical() {
    let def = person_type();
    let formatter = formatter(&[&def]);
    let graph = sample_graph(&def);
    let first = formatter.serialize(&graph).unwrap();
    let second = formatter.serialize(&graph).unwrap();
    assert_eq!(first, second);
}

#[test]
fn equal_graphs_are_byte_identical() {
    let def = person_type();
    let formatter = formatter(&[&def]);
    let a = formatter.serialize(&sample_graph(&def)).unwrap();
    let b = formatter.serialize(&sample_graph(&def)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn round_trip_reserializes_identically() {
    let def = person_type();
    let formatter = formatter(&[&def]);
    let bytes = formatter.serialize(&sample_graph(&def)).unwrap();
    let copy = formatter.deserialize(&bytes).unwrap();
    assert_eq!(formatter.serialize(&copy).unwrap(), bytes);
}

#[test]
fn per_item_overhead_does_not_grow() {
    let def = person_type();
    let formatter = formatter(&[&def]);
    let people = |n: usize| -> Vec<Value> {
        (0..n)
            .map(|i| Value::Ref(person(&def, "Same Name", i as i32 % 50)))
            .collect()
    };
    let size = |n: usize| formatter.serialize_items(&people(n)).unwrap().len();

    let one = size(1);
    let step = size(2) - one;
    assert!(step < one, "type information is repeated");
    for n in 2..10 {
        assert_eq!(size(n + 1) - size(n), step);
    }
}

#[test]
fn items_share_identity_across_roots() {
    let def = person_type();
    let formatter = formatter(&[&def]);
    let ada = Value::Ref(person(&def, "Ada", 36));
    let bytes = formatter
        .serialize_items(&[ada.clone(), Value::from("gap"), ada])
        .unwrap();

    let items = formatter.deserialize_items(&bytes).unwrap();
    assert_eq!(items.len(), 3);
    assert!(same(&items[0], &items[2]));
}
