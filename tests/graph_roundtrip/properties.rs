//! Property Tests
//!
//! Random leaves and flat collections survive a round trip unchanged.

use crate::common::*;
use proptest::prelude::*;

fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i8>().prop_map(Value::I8),
        any::<u8>().prop_map(Value::U8),
        any::<i16>().prop_map(Value::I16),
        any::<u16>().prop_map(Value::U16),
        any::<i32>().prop_map(Value::I32),
        any::<u32>().prop_map(Value::U32),
        any::<i64>().prop_map(Value::I64),
        any::<u64>().prop_map(Value::U64),
        any::<char>().prop_map(Value::Char),
        any::<f32>().prop_map(Value::F32),
        any::<f64>().prop_map(Value::F64),
        any::<i64>().prop_map(Value::IntPtr),
        any::<u64>().prop_map(Value::UIntPtr),
        ".{0,40}".prop_map(Value::from),
    ]
}

proptest! {
    #[test]
    fn prop_leaf_round_trip(value in arb_leaf()) {
        let formatter = formatter(&[]);
        let copy = round_trip(&formatter, &value);
        prop_assert!(graph_eq(&copy, &value), "{:?} became {:?}", value, copy);
    }

    #[test]
    fn prop_object_array_round_trip(items in prop::collection::vec(arb_leaf(), 0..24)) {
        let formatter = formatter(&[]);
        let value = Value::Ref(object_array(items));
        prop_assert!(graph_eq(&round_trip(&formatter, &value), &value));
    }

    #[test]
    fn prop_typed_int_array_round_trip(items in prop::collection::vec(any::<i32>(), 0..64)) {
        let formatter = formatter(&[]);
        let array = ArrayObject::vector(
            Type::known(KnownType::I32),
            items.into_iter().map(Value::I32).collect(),
        );
        let value = Value::Ref(ObjRef::array(array));
        prop_assert!(graph_eq(&round_trip(&formatter, &value), &value));
    }

    #[test]
    fn prop_string_dictionary_round_trip(
        entries in prop::collection::btree_map(".{0,12}", prop::option::of(".{0,12}"), 0..16)
    ) {
        let formatter = formatter(&[]);
        let mut map = CollectionObject::new(
            CollectionKind::Dictionary,
            vec![Type::string(), Type::string()],
        )
        .unwrap();
        for (key, value) in entries {
            map.insert(Value::from(key), value.map_or(Value::Null, Value::from)).unwrap();
        }
        let value = Value::Ref(ObjRef::collection(map));
        prop_assert!(graph_eq(&round_trip(&formatter, &value), &value));
    }

    #[test]
    fn prop_truncated_stream_fails_cleanly(items in prop::collection::vec(any::<i64>(), 1..8), cut in 1usize..64) {
        let formatter = formatter(&[]);
        let value = Value::Ref(list_of(
            Type::object(),
            items.into_iter().map(Value::I64).collect(),
        ));
        let bytes = formatter.serialize(&value).unwrap();
        let cut = cut.min(bytes.len() - 1);
        prop_assert!(formatter.deserialize(&bytes[..cut]).is_err());
    }
}
