//! Element encodings of typed positions
//!
//! Array cells, collection items and key/value pair members have a declared
//! type known from the collection shape. The declared descriptor is mapped
//! once per collection to an [`ElementKind`] that both managers follow:
//!
//! ```text
//! Nullable<T>              presence bool, then T
//! primitives, value singles fixed-width payload
//! String                   7-bit (byte length + 1), 0 = null
//! reference singles        presence bool, then payload
//! enums                    fixed-width underlying value
//! Type                     presence bool, then type reference
//! KeyValuePair, DictEntry  content
//! arrays, collections      id field, content when new
//! sealed structs           content
//! sealed classes           id field, content when new
//! everything else          polymorphic value (tags, type info, id, content)
//! ```

use crate::naming::StreamNaming;
use graphbin_core::{IntegerKind, KnownType, Type, TypeDefKind};
use graphbin_wire::TypeDescriptor;

/// How values of one declared element type are encoded
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    /// Own tags, type info and identity per value
    Polymorphic,
    /// Fixed-width payload of a primitive or value single
    Value(KnownType),
    /// Length+1 prefixed string, 0 for null
    String,
    /// Presence flag plus payload
    ReferenceSingle(KnownType),
    /// Underlying integer of an enum
    Enum(IntegerKind),
    /// Presence flag plus type reference
    RuntimeType,
    /// Presence flag plus the wrapped encoding
    Nullable(Box<ElementKind>),
    /// Key/value pair content
    ValuePair,
    /// Array or collection behind an id field
    ReferenceShape,
    /// Struct content
    SealedStruct,
    /// Class content behind an id field
    SealedClass,
}

impl ElementKind {
    /// Encoding of the declared descriptor
    pub fn of(desc: &TypeDescriptor, naming: &StreamNaming<'_>) -> ElementKind {
        Self::of_type(&desc.ty, naming)
    }

    fn of_type(ty: &Type, naming: &StreamNaming<'_>) -> ElementKind {
        if naming.is_hooked(ty) {
            return ElementKind::Polymorphic;
        }
        match ty {
            Type::Known(KnownType::Object) => ElementKind::Polymorphic,
            Type::Known(KnownType::String) => ElementKind::String,
            Type::Known(k) if k.is_value_type() => ElementKind::Value(*k),
            Type::Known(k) => ElementKind::ReferenceSingle(*k),
            Type::RuntimeType => ElementKind::RuntimeType,
            Type::Nullable(inner) => match Self::of_type(inner, naming) {
                ElementKind::Polymorphic => ElementKind::Polymorphic,
                kind => ElementKind::Nullable(Box::new(kind)),
            },
            Type::Array(..) => ElementKind::ReferenceShape,
            Type::Collection(kind, _) if kind.is_pair() => ElementKind::ValuePair,
            Type::Collection(..) => ElementKind::ReferenceShape,
            Type::Named(def) => match def.kind() {
                TypeDefKind::Enum(underlying) => ElementKind::Enum(*underlying),
                TypeDefKind::Struct => ElementKind::SealedStruct,
                TypeDefKind::Class { sealed: true, .. } => ElementKind::SealedClass,
                _ => ElementKind::Polymorphic,
            },
            Type::GenericParameter(_) => ElementKind::Polymorphic,
        }
    }
}
