//! Serializer Option Tests
//!
//! Layout drift, renaming binders, assembly names and struct encodings.

use crate::common::*;
use std::rc::Rc;

fn doc_v2() -> TypeDefRef {
    TypeDef::class("App.Doc")
        .assembly("App")
        .field("title", Type::string())
        .field("pages", Type::known(KnownType::I32))
        .build()
}

fn doc_v1() -> TypeDefRef {
    TypeDef::class("App.Doc")
        .assembly("App")
        .field("title", Type::string())
        .build()
}

fn doc_bytes() -> Vec<u8> {
    let def = doc_v2();
    let value = Value::Ref(ObjRef::instance(
        Instance::new(&def)
            .with("title", Value::from("Notes"))
            .with("pages", Value::I32(12)),
    ));
    formatter(&[&def]).serialize(&value).unwrap()
}

// ============================================================================
// Layout drift
// ============================================================================

#[test]
fn strict_rejects_unknown_field() {
    let def = doc_v1();
    let err = formatter(&[&def]).deserialize(&doc_bytes()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
}

#[test]
fn lenient_skips_unknown_field() {
    let def = doc_v1();
    let options = SerializerOptions::strict().with_ignore_object_changes(true);
    let copy = formatter(&[&def])
        .with_options(options)
        .deserialize(&doc_bytes())
        .unwrap();
    assert_eq!(copy.as_ref().unwrap().field("title"), Some(Value::from("Notes")));
}

#[test]
fn missing_fields_keep_defaults() {
    let def = doc_v1();
    let value = Value::Ref(ObjRef::instance(
        Instance::new(&def).with("title", Value::from("Short")),
    ));
    let bytes = formatter(&[&def]).serialize(&value).unwrap();

    let newer = doc_v2();
    let copy = formatter(&[&newer]).deserialize(&bytes).unwrap();
    let copy = copy.as_ref().unwrap();
    assert_eq!(copy.field("title"), Some(Value::from("Short")));
    assert_eq!(copy.field("pages"), Some(Value::I32(0)));
}

#[test]
fn unknown_base_level() {
    let base = person_type();
    let derived = TypeDef::class("App.Employee")
        .assembly("App")
        .base(&base)
        .field("badge", Type::known(KnownType::I32))
        .build();
    let value = Value::Ref(ObjRef::instance(
        Instance::new(&derived)
            .with("name", Value::from("Ada"))
            .with("badge", Value::I32(7)),
    ));
    let bytes = formatter(&[&base, &derived]).serialize(&value).unwrap();

    // reader knows the type without its base class
    let flat = TypeDef::class("App.Employee")
        .assembly("App")
        .field("badge", Type::known(KnownType::I32))
        .build();
    let err = formatter(&[&flat]).deserialize(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ShapeMismatch);

    let lenient = formatter(&[&flat]).with_options(SerializerOptions::lenient());
    let copy = lenient.deserialize(&bytes).unwrap();
    assert_eq!(copy.as_ref().unwrap().field("badge"), Some(Value::I32(7)));
}

#[test]
fn reordered_base_levels() {
    // writer: C derives from B, B from A
    let a = TypeDef::class("App.A")
        .assembly("App")
        .field("a", Type::known(KnownType::I32))
        .build();
    let b = TypeDef::class("App.B")
        .assembly("App")
        .base(&a)
        .field("b", Type::known(KnownType::I32))
        .build();
    let c = TypeDef::class("App.C")
        .assembly("App")
        .base(&b)
        .field("c", Type::known(KnownType::I32))
        .build();
    let value = Value::Ref(ObjRef::instance(
        Instance::new(&c)
            .with("a", Value::I32(1))
            .with("b", Value::I32(2))
            .with("c", Value::I32(3)),
    ));
    let bytes = formatter(&[&a, &b, &c]).serialize(&value).unwrap();

    // reader: C derives from A, A from B
    let b2 = TypeDef::class("App.B")
        .assembly("App")
        .field("b", Type::known(KnownType::I32))
        .build();
    let a2 = TypeDef::class("App.A")
        .assembly("App")
        .base(&b2)
        .field("a", Type::known(KnownType::I32))
        .build();
    let c2 = TypeDef::class("App.C")
        .assembly("App")
        .base(&a2)
        .field("c", Type::known(KnownType::I32))
        .build();
    let err = formatter(&[&b2, &a2, &c2]).deserialize(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ShapeMismatch);

    let lenient = formatter(&[&b2, &a2, &c2]).with_options(SerializerOptions::lenient());
    let copy = lenient.deserialize(&bytes).unwrap();
    let copy = copy.as_ref().unwrap();
    assert_eq!(copy.field("c"), Some(Value::I32(3)));
    assert_eq!(copy.field("b"), Some(Value::I32(2)));
    assert_eq!(copy.field("a"), Some(Value::I32(0)));
}

// ============================================================================
// Naming
// ============================================================================

#[test]
fn binder_renames_types() {
    let def = person_type();
    let binder = NameMapBinder::new().alias(&def, Some("Legacy"), "Old.Person");
    let formatter = formatter(&[]).with_binder(Rc::new(binder));
    let value = Value::Ref(person(&def, "Ada", 36));

    let bytes = formatter.serialize(&value).unwrap();
    assert!(contains_bytes(&bytes, b"Old.Person"));
    assert!(!contains_bytes(&bytes, b"App.Person"));

    let copy = formatter.deserialize(&bytes).unwrap();
    assert_eq!(copy.runtime_type(), Some(Type::named(&def)));
    assert!(graph_eq(&copy, &value));
}

#[test]
fn omitted_assembly_names() {
    let def = TypeDef::class("App.Widget")
        .assembly("Company.Product, Version=1.0.0.0")
        .field("id", Type::known(KnownType::I32))
        .build();
    let value = Value::Ref(ObjRef::instance(Instance::new(&def).with("id", Value::I32(5))));

    let full = formatter(&[&def]).serialize(&value).unwrap();
    assert!(contains_bytes(&full, b"Company.Product"));

    let options = SerializerOptions::strict().with_omit_assembly_names(true);
    let short = formatter(&[&def]).with_options(options);
    let bytes = short.serialize(&value).unwrap();
    assert!(!contains_bytes(&bytes, b"Company.Product"));
    assert!(bytes.len() < full.len());
    assert!(graph_eq(&short.deserialize(&bytes).unwrap(), &value));
}

// ============================================================================
// Classification
// ============================================================================

fn point_type() -> TypeDefRef {
    TypeDef::structure("App.Point")
        .field("x", Type::known(KnownType::I32))
        .field("y", Type::known(KnownType::I32))
        .build()
}

#[test]
fn compact_structs_are_smaller() {
    let def = point_type();
    let value = Value::from(
        Instance::new(&def)
            .with("x", Value::I32(-1))
            .with("y", Value::I32(2)),
    );

    let compact = formatter(&[&def]);
    let compact_bytes = compact.serialize(&value).unwrap();
    assert_eq!(compact.deserialize(&compact_bytes).unwrap(), value);

    let options = SerializerOptions::strict().with_compact_structures(false);
    let graph = formatter(&[&def]).with_options(options);
    let graph_bytes = graph.serialize(&value).unwrap();
    assert!(graph_bytes.len() > compact_bytes.len());
    assert_eq!(graph.deserialize(&graph_bytes).unwrap(), value);
}

#[test]
fn recursive_fallback_allows_plain_types() {
    let def = TypeDef::class("App.Plain")
        .not_serializable()
        .field("n", Type::known(KnownType::I32))
        .build();
    let value = Value::Ref(ObjRef::instance(Instance::new(&def).with("n", Value::I32(1))));

    let strict = formatter(&[&def]);
    assert_eq!(strict.serialize(&value).unwrap_err().kind(), ErrorKind::Unsupported);

    let fallback = formatter(&[&def])
        .with_options(SerializerOptions::strict().with_recursive_fallback(true));
    let bytes = fallback.serialize(&value).unwrap();
    assert!(graph_eq(&fallback.deserialize(&bytes).unwrap(), &value));

    // a strict reader refuses the same stream
    assert_eq!(strict.deserialize(&bytes).unwrap_err().kind(), ErrorKind::Unsupported);
}

#[test]
fn options_load_from_json() {
    let options: SerializerOptions =
        serde_json::from_str(r#"{ "omit_assembly_names": true }"#).unwrap();
    assert!(options.omit_assembly_names);
    assert!(options.compact_serialization_of_structures);
    assert!(!options.ignore_object_changes);
}
