//! Enum Tests
//!
//! Every underlying width at its extremes, polymorphic and typed.

use crate::common::*;

fn bounds(kind: IntegerKind) -> (i128, i128) {
    let bits = kind.bits();
    if kind.is_signed() {
        (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    } else {
        (0, (1i128 << bits) - 1)
    }
}

fn enum_types() -> Vec<(IntegerKind, TypeDefRef)> {
    IntegerKind::ALL
        .iter()
        .map(|&kind| {
            let name = format!("App.{}Level", kind.known().name());
            (kind, TypeDef::enumeration(name, kind).build())
        })
        .collect()
}

fn all_types_formatter(types: &[(IntegerKind, TypeDefRef)]) -> BinarySerializationFormatter {
    let defs: Vec<&TypeDefRef> = types.iter().map(|(_, def)| def).collect();
    formatter(&defs)
}

#[test]
fn polymorphic_enum_extremes() {
    let types = enum_types();
    let formatter = all_types_formatter(&types);
    for (kind, def) in &types {
        let (min, max) = bounds(*kind);
        for v in [min, max, 0, 1] {
            let value = Value::Enum(EnumValue::new(def, v).unwrap());
            let copy = round_trip(&formatter, &value);
            assert_eq!(copy, value, "{:?} {}", kind, v);
            match copy {
                Value::Enum(e) => assert_eq!(e.value(), v),
                other => panic!("expected an enum, got {:?}", other),
            }
        }
    }
}

#[test]
fn typed_enum_array_extremes() {
    let types = enum_types();
    let formatter = all_types_formatter(&types);
    for (kind, def) in &types {
        let (min, max) = bounds(*kind);
        let items = vec![
            Value::Enum(EnumValue::new(def, min).unwrap()),
            Value::Enum(EnumValue::new(def, max).unwrap()),
        ];
        let value = Value::Ref(ObjRef::array(ArrayObject::vector(Type::named(def), items)));
        assert!(graph_eq(&round_trip(&formatter, &value), &value), "{:?}", kind);
    }
}

#[test]
fn nullable_enum_elements() {
    let types = enum_types();
    let formatter = all_types_formatter(&types);
    let (kind, def) = &types[0];
    let (min, _) = bounds(*kind);
    let list = list_of(
        Type::nullable(Type::named(def)),
        vec![Value::Null, Value::Enum(EnumValue::new(def, min).unwrap())],
    );
    let value = Value::Ref(list);
    assert!(graph_eq(&round_trip(&formatter, &value), &value));
}

#[test]
fn small_values_use_compact_form() {
    let types = enum_types();
    let formatter = all_types_formatter(&types);
    let (_, def) = types
        .iter()
        .find(|(kind, _)| *kind == IntegerKind::I64)
        .unwrap();
    let small = formatter
        .serialize(&Value::Enum(EnumValue::new(def, 3).unwrap()))
        .unwrap();
    let large = formatter
        .serialize(&Value::Enum(EnumValue::new(def, -3).unwrap()))
        .unwrap();
    assert!(small.len() < large.len());
}

#[test]
fn enum_fields_in_user_types() {
    let level = TypeDef::enumeration("App.Severity", IntegerKind::U8).build();
    let def = TypeDef::class("App.Alert")
        .field("severity", Type::named(&level))
        .field("message", Type::string())
        .build();
    let formatter = formatter(&[&level, &def]);
    let value = Value::Ref(ObjRef::instance(
        Instance::new(&def)
            .with("severity", Value::Enum(EnumValue::new(&level, 200).unwrap()))
            .with("message", Value::from("disk almost full")),
    ));
    assert!(graph_eq(&round_trip(&formatter, &value), &value));
}
