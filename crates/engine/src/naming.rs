//! Naming, classification and hook lookup for one serializer call
//!
//! Both managers consult the same [`StreamNaming`], so a type is classified
//! identically on both sides as long as the options and collaborators match.

use crate::options::SerializerOptions;
use graphbin_core::{
    CustomSerializer, Error, ObjectReference, Result, SerializationBinder, SerializationEvents,
    SerializationSurrogate, SurrogateSelector, Type, TypeDefKind, TypeDefRef, TypeResolver,
};
use graphbin_wire::{DataTypes, TypeNaming};
use std::rc::Rc;

/// Deepest struct nesting stored as raw bytes
pub(crate) const MAX_RAW_DEPTH: usize = 16;

/// Options plus the resolver, binder and surrogate selector of a call
#[derive(Clone, Copy)]
pub struct StreamNaming<'a> {
    options: &'a SerializerOptions,
    resolver: &'a dyn TypeResolver,
    binder: Option<&'a dyn SerializationBinder>,
    surrogates: Option<&'a dyn SurrogateSelector>,
}

impl<'a> StreamNaming<'a> {
    /// Bundle the collaborators of a call
    pub fn new(
        options: &'a SerializerOptions,
        resolver: &'a dyn TypeResolver,
        binder: Option<&'a dyn SerializationBinder>,
        surrogates: Option<&'a dyn SurrogateSelector>,
    ) -> Self {
        StreamNaming {
            options,
            resolver,
            binder,
            surrogates,
        }
    }

    /// Active options
    pub fn options(&self) -> &'a SerializerOptions {
        self.options
    }

    /// Surrogate that takes over `ty`, if any
    ///
    /// User types other than enums are always eligible; other non-array
    /// types only with `try_use_surrogate_selector_for_any_type`.
    pub fn surrogate_for(&self, ty: &Type) -> Option<Rc<dyn SerializationSurrogate>> {
        let selector = self.surrogates?;
        let eligible = match ty {
            Type::Named(def) => def.enum_underlying().is_none(),
            Type::Array(..) | Type::Nullable(_) | Type::GenericParameter(_) => false,
            _ => self.options.try_use_surrogate_selector_for_any_type,
        };
        if eligible {
            selector.surrogate_for(ty)
        } else {
            None
        }
    }

    /// Custom serializer of a type unless ignored
    pub fn custom(&self, def: &TypeDefRef) -> Option<Rc<dyn CustomSerializer>> {
        if self.options.ignore_custom_serialization {
            return None;
        }
        def.hooks().custom.clone()
    }

    /// Real-object hook of a type unless ignored
    pub fn object_reference(&self, def: &TypeDefRef) -> Option<Rc<dyn ObjectReference>> {
        if self.options.ignore_object_reference {
            return None;
        }
        def.hooks().object_reference.clone()
    }

    /// Lifecycle events of a type unless ignored
    pub fn events(&self, def: &TypeDefRef) -> Option<Rc<dyn SerializationEvents>> {
        if self.options.ignore_serialization_methods {
            return None;
        }
        def.hooks().events.clone()
    }

    /// Whether hooks may change how values of `ty` are encoded, so that even
    /// sealed positions have to be written polymorphically
    pub fn is_hooked(&self, ty: &Type) -> bool {
        if self.surrogate_for(ty).is_some() {
            return true;
        }
        match ty {
            Type::Named(def) => {
                self.custom(def).is_some()
                    || self.object_reference(def).is_some()
                    || (def.hooks().binary.is_some() && !self.options.ignore_binary_serializable)
            }
            _ => false,
        }
    }

    /// Whether instances of `def` may be written at all
    pub fn can_serialize(&self, def: &TypeDefRef) -> bool {
        def.is_serializable()
            || self.custom(def).is_some()
            || self.options.recursive_serialization_as_fallback
    }

    /// Struct whose fields are all fixed-width primitives, enums or such structs
    pub fn is_blittable(def: &TypeDefRef) -> bool {
        Self::is_blittable_at(def, 0)
    }

    fn is_blittable_at(def: &TypeDefRef, depth: usize) -> bool {
        if !def.is_struct() || depth > MAX_RAW_DEPTH {
            return false;
        }
        def.layout()
            .fields_by_slot()
            .iter()
            .all(|field| match &field.ty {
                Type::Known(k) => k.fixed_size().is_some(),
                Type::Named(inner) => match inner.kind() {
                    TypeDefKind::Enum(_) => true,
                    TypeDefKind::Struct => Self::is_blittable_at(inner, depth + 1),
                    _ => false,
                },
                _ => false,
            })
    }
}

impl TypeNaming for StreamNaming<'_> {
    fn classify(&self, def: &TypeDefRef) -> DataTypes {
        if self.surrogate_for(&Type::Named(def.clone())).is_some() {
            return DataTypes::RECURSIVE_OBJECT_GRAPH;
        }
        if def.hooks().binary.is_some() && !self.options.ignore_binary_serializable {
            return DataTypes::BINARY_SERIALIZABLE;
        }
        if self.options.compact_serialization_of_structures
            && self.custom(def).is_none()
            && self.events(def).is_none()
            && Self::is_blittable(def)
        {
            return DataTypes::RAW_STRUCT;
        }
        DataTypes::RECURSIVE_OBJECT_GRAPH
    }

    fn stored_name(&self, def: &TypeDefRef) -> (Option<String>, String) {
        let (assembly, name) = self
            .binder
            .and_then(|b| b.bind_to_name(def))
            .unwrap_or_else(|| (def.assembly().map(str::to_string), def.name().to_string()));
        if self.options.omit_assembly_names {
            (None, name)
        } else {
            (assembly, name)
        }
    }

    fn resolve(&self, assembly: Option<&str>, name: &str) -> Result<TypeDefRef> {
        self.binder
            .and_then(|b| b.bind_to_type(assembly, name))
            .or_else(|| self.resolver.resolve(assembly, name))
            .ok_or_else(|| Error::TypeNotFound {
                assembly: assembly.map(str::to_string),
                name: name.to_string(),
            })
    }
}
