//! User-defined type descriptions
//!
//! A [`TypeDef`] is the runtime description of a class, struct, interface or
//! enum: its stored name, optional assembly, declared fields, inheritance and
//! attached serialization hooks. Type definitions are shared via
//! [`TypeDefRef`] (`Rc<TypeDef>`) and compare by `(assembly, name)`.
//!
//! ## Field layout
//!
//! Instance slots are flat: base class fields come first, then each derived
//! level appends its own. The serializer walks levels most-derived first.
//!
//! ```text
//! class Base { a, b }          slots: [a=0, b=1]
//! class Derived : Base { c }   slots: [a=0, b=1, c=2]
//! levels(Derived) = [Derived{c:2}, Base{a:0, b:1}]
//! ```
//!
//! Self-referencing fields cannot name their own definition while it is being
//! built; declare them as `Object` or as an interface/base type instead.

use crate::hooks::{
    BinarySerializable, CustomSerializer, DeserializationCallback, ObjectReference,
    SerializationEvents, TypeHooks,
};
use crate::types::{IntegerKind, Type};
use once_cell::unsync::OnceCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Shared handle to a type definition
pub type TypeDefRef = Rc<TypeDef>;

/// Category of a user-defined type
#[derive(Debug, Clone)]
pub enum TypeDefKind {
    /// Reference type with optional base class
    Class {
        /// Base class, if any
        base: Option<TypeDefRef>,
        /// Whether the class can have subtypes
        sealed: bool,
    },
    /// Abstract contract; only usable as a declared type
    Interface,
    /// Value type
    Struct,
    /// Enumeration over an integer kind
    Enum(IntegerKind),
}

/// A declared instance field
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name (unique within its declaring type)
    pub name: String,
    /// Declared type
    pub ty: Type,
    /// Transient fields are skipped by default-graph serialization
    pub transient: bool,
}

/// One field of a computed [`FieldLayout`]
#[derive(Debug, Clone)]
pub struct LayoutField {
    /// Field name
    pub name: String,
    /// Index into the instance slot vector
    pub slot: usize,
    /// Declared type
    pub ty: Type,
    /// Skipped by default-graph serialization
    pub transient: bool,
}

/// Fields declared by one level of an inheritance chain
#[derive(Debug, Clone)]
pub struct LayoutLevel {
    /// Name of the declaring type
    pub type_name: String,
    /// Fields declared at this level
    pub fields: Vec<LayoutField>,
}

impl LayoutLevel {
    /// Fields that take part in default-graph serialization
    pub fn persisted(&self) -> impl Iterator<Item = &LayoutField> {
        self.fields.iter().filter(|f| !f.transient)
    }
}

/// Flattened field layout of a type, most-derived level first
#[derive(Debug, Clone, Default)]
pub struct FieldLayout {
    /// Levels, most-derived first
    pub levels: Vec<LayoutLevel>,
    slot_count: usize,
}

impl FieldLayout {
    /// Total number of instance slots
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Find a field by name, most-derived declaration wins
    pub fn find(&self, name: &str) -> Option<&LayoutField> {
        self.levels
            .iter()
            .flat_map(|level| level.fields.iter())
            .find(|f| f.name == name)
    }

    /// All fields in slot order
    pub fn fields_by_slot(&self) -> Vec<&LayoutField> {
        let mut fields: Vec<&LayoutField> =
            self.levels.iter().flat_map(|l| l.fields.iter()).collect();
        fields.sort_by_key(|f| f.slot);
        fields
    }
}

/// Runtime description of a user-defined type
pub struct TypeDef {
    name: String,
    assembly: Option<String>,
    kind: TypeDefKind,
    fields: Vec<FieldDef>,
    serializable: bool,
    hooks: TypeHooks,
    layout: OnceCell<Rc<FieldLayout>>,
}

impl TypeDef {
    /// Start building a class
    pub fn class(name: impl Into<String>) -> TypeDefBuilder {
        TypeDefBuilder::new(
            name,
            TypeDefKind::Class {
                base: None,
                sealed: false,
            },
        )
    }

    /// Start building a struct
    pub fn structure(name: impl Into<String>) -> TypeDefBuilder {
        TypeDefBuilder::new(name, TypeDefKind::Struct)
    }

    /// Start building an interface
    pub fn interface(name: impl Into<String>) -> TypeDefBuilder {
        TypeDefBuilder::new(name, TypeDefKind::Interface)
    }

    /// Start building an enum
    pub fn enumeration(name: impl Into<String>, underlying: IntegerKind) -> TypeDefBuilder {
        TypeDefBuilder::new(name, TypeDefKind::Enum(underlying))
    }

    /// Full type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Assembly name, if any
    pub fn assembly(&self) -> Option<&str> {
        self.assembly.as_deref()
    }

    /// Category
    pub fn kind(&self) -> &TypeDefKind {
        &self.kind
    }

    /// Fields declared directly on this type
    pub fn own_fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Attached hooks
    pub fn hooks(&self) -> &TypeHooks {
        &self.hooks
    }

    /// Whether default-graph serialization is permitted
    pub fn is_serializable(&self) -> bool {
        self.serializable
    }

    /// Struct or enum
    pub fn is_value_type(&self) -> bool {
        matches!(self.kind, TypeDefKind::Struct | TypeDefKind::Enum(_))
    }

    /// Struct
    pub fn is_struct(&self) -> bool {
        matches!(self.kind, TypeDefKind::Struct)
    }

    /// Interface
    pub fn is_interface(&self) -> bool {
        matches!(self.kind, TypeDefKind::Interface)
    }

    /// Underlying integer kind for enums
    pub fn enum_underlying(&self) -> Option<IntegerKind> {
        match self.kind {
            TypeDefKind::Enum(k) => Some(k),
            _ => None,
        }
    }

    /// Whether no subtype can exist
    pub fn is_sealed(&self) -> bool {
        match &self.kind {
            TypeDefKind::Class { sealed, .. } => *sealed,
            TypeDefKind::Interface => false,
            TypeDefKind::Struct | TypeDefKind::Enum(_) => true,
        }
    }

    /// Base class, if any
    pub fn base(&self) -> Option<&TypeDefRef> {
        match &self.kind {
            TypeDefKind::Class { base, .. } => base.as_ref(),
            _ => None,
        }
    }

    /// Whether `self` is `other` or derives from it
    pub fn is_subtype_of(&self, other: &TypeDef) -> bool {
        if self == other {
            return true;
        }
        self.base().map_or(false, |b| b.is_subtype_of(other))
    }

    /// Computed field layout (cached after the first call)
    pub fn layout(&self) -> Rc<FieldLayout> {
        self.layout
            .get_or_init(|| Rc::new(self.compute_layout()))
            .clone()
    }

    fn compute_layout(&self) -> FieldLayout {
        let mut levels = Vec::new();
        let mut next_slot = 0;

        if let Some(base) = self.base() {
            let base_layout = base.layout();
            next_slot = base_layout.slot_count();
            levels.extend(base_layout.levels.iter().cloned());
        }

        let own = LayoutLevel {
            type_name: self.name.clone(),
            fields: self
                .fields
                .iter()
                .enumerate()
                .map(|(i, f)| LayoutField {
                    name: f.name.clone(),
                    slot: next_slot + i,
                    ty: f.ty.clone(),
                    transient: f.transient,
                })
                .collect(),
        };
        let slot_count = next_slot + own.fields.len();
        levels.insert(0, own);

        FieldLayout { levels, slot_count }
    }
}

impl PartialEq for TypeDef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.assembly == other.assembly
    }
}

impl Eq for TypeDef {}

impl Hash for TypeDef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.assembly.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDef")
            .field("name", &self.name)
            .field("assembly", &self.assembly)
            .field("kind", &self.kind)
            .field("fields", &self.fields.len())
            .finish()
    }
}

/// Builder for [`TypeDef`]
///
/// # Example
///
/// ```
/// use graphbin_core::{Type, TypeDef, KnownType};
///
/// let person = TypeDef::class("App.Person")
///     .assembly("App")
///     .field("name", Type::string())
///     .field("age", Type::known(KnownType::I32))
///     .build();
/// assert_eq!(person.layout().slot_count(), 2);
/// ```
pub struct TypeDefBuilder {
    name: String,
    assembly: Option<String>,
    kind: TypeDefKind,
    fields: Vec<FieldDef>,
    serializable: bool,
    hooks: TypeHooks,
}

impl TypeDefBuilder {
    fn new(name: impl Into<String>, kind: TypeDefKind) -> Self {
        TypeDefBuilder {
            name: name.into(),
            assembly: None,
            kind,
            fields: Vec::new(),
            serializable: true,
            hooks: TypeHooks::default(),
        }
    }

    /// Set the assembly name
    pub fn assembly(mut self, assembly: impl Into<String>) -> Self {
        self.assembly = Some(assembly.into());
        self
    }

    /// Declare a field
    pub fn field(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            ty,
            transient: false,
        });
        self
    }

    /// Declare a field skipped by default-graph serialization
    pub fn transient_field(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            ty,
            transient: true,
        });
        self
    }

    /// Set the base class (classes only)
    pub fn base(mut self, parent: &TypeDefRef) -> Self {
        if let TypeDefKind::Class { base, .. } = &mut self.kind {
            *base = Some(parent.clone());
        }
        self
    }

    /// Mark the class sealed
    pub fn sealed(mut self) -> Self {
        if let TypeDefKind::Class { sealed, .. } = &mut self.kind {
            *sealed = true;
        }
        self
    }

    /// Forbid default-graph serialization
    pub fn not_serializable(mut self) -> Self {
        self.serializable = false;
        self
    }

    /// Attach a custom serializer
    pub fn custom_serializer(mut self, hook: Rc<dyn CustomSerializer>) -> Self {
        self.hooks.custom = Some(hook);
        self
    }

    /// Attach an object-reference (proxy) hook
    pub fn object_reference(mut self, hook: Rc<dyn ObjectReference>) -> Self {
        self.hooks.object_reference = Some(hook);
        self
    }

    /// Attach a post-deserialization callback
    pub fn deserialization_callback(mut self, hook: Rc<dyn DeserializationCallback>) -> Self {
        self.hooks.callback = Some(hook);
        self
    }

    /// Attach a self-describing binary codec
    pub fn binary_serializable(mut self, hook: Rc<dyn BinarySerializable>) -> Self {
        self.hooks.binary = Some(hook);
        self
    }

    /// Attach lifecycle event handlers
    pub fn events(mut self, hook: Rc<dyn SerializationEvents>) -> Self {
        self.hooks.events = Some(hook);
        self
    }

    /// Finish the definition
    pub fn build(self) -> TypeDefRef {
        Rc::new(TypeDef {
            name: self.name,
            assembly: self.assembly,
            kind: self.kind,
            fields: self.fields,
            serializable: self.serializable,
            hooks: self.hooks,
            layout: OnceCell::new(),
        })
    }
}
