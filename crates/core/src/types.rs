//! Type model for graphbin
//!
//! This module defines the static shape of values:
//! - KnownType: built-in primitive and single types (tag-encodable)
//! - IntegerKind: enum underlying integer kinds
//! - CollectionKind: closed vocabulary of supported collection shapes
//! - ArrayRank: single-dimension vector vs. multi-dimensional arrays
//! - Type: the full type handle (known, named, array, collection, nullable, ...)

use crate::typedef::TypeDefRef;
use std::fmt;

/// Built-in types whose encoding is fully described by a type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KnownType {
    /// Boolean
    Bool,
    /// Signed 8-bit integer
    I8,
    /// Unsigned 8-bit integer
    U8,
    /// Signed 16-bit integer
    I16,
    /// Unsigned 16-bit integer
    U16,
    /// Signed 32-bit integer
    I32,
    /// Unsigned 32-bit integer
    U32,
    /// Signed 64-bit integer
    I64,
    /// Unsigned 64-bit integer
    U64,
    /// Unicode scalar value
    Char,
    /// UTF-8 string
    String,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// Native signed integer (always 64 bits on the wire)
    IntPtr,
    /// Native unsigned integer (always 64 bits on the wire)
    UIntPtr,
    /// The root object type; as a value it is a plain identity-only object
    Object,
    /// 96-bit scaled decimal
    Decimal,
    /// Date and time with kind
    DateTime,
    /// Database null marker
    DbNull,
    /// Time interval
    TimeSpan,
    /// Date and time with UTC offset
    DateTimeOffset,
    /// 128-bit GUID
    Guid,
    /// Four-part version number
    Version,
    /// Uniform resource identifier
    Uri,
    /// Packed bit array
    BitArray,
    /// 32-bit bit vector
    BitVector32,
    /// Section of a 32-bit bit vector
    BitVector32Section,
    /// Growable string buffer
    StringBuilder,
}

impl KnownType {
    /// Every known type in declaration order
    pub const ALL: [KnownType; 28] = [
        KnownType::Bool,
        KnownType::I8,
        KnownType::U8,
        KnownType::I16,
        KnownType::U16,
        KnownType::I32,
        KnownType::U32,
        KnownType::I64,
        KnownType::U64,
        KnownType::Char,
        KnownType::String,
        KnownType::F32,
        KnownType::F64,
        KnownType::IntPtr,
        KnownType::UIntPtr,
        KnownType::Object,
        KnownType::Decimal,
        KnownType::DateTime,
        KnownType::DbNull,
        KnownType::TimeSpan,
        KnownType::DateTimeOffset,
        KnownType::Guid,
        KnownType::Version,
        KnownType::Uri,
        KnownType::BitArray,
        KnownType::BitVector32,
        KnownType::BitVector32Section,
        KnownType::StringBuilder,
    ];

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            KnownType::Bool => "Boolean",
            KnownType::I8 => "SByte",
            KnownType::U8 => "Byte",
            KnownType::I16 => "Int16",
            KnownType::U16 => "UInt16",
            KnownType::I32 => "Int32",
            KnownType::U32 => "UInt32",
            KnownType::I64 => "Int64",
            KnownType::U64 => "UInt64",
            KnownType::Char => "Char",
            KnownType::String => "String",
            KnownType::F32 => "Single",
            KnownType::F64 => "Double",
            KnownType::IntPtr => "IntPtr",
            KnownType::UIntPtr => "UIntPtr",
            KnownType::Object => "Object",
            KnownType::Decimal => "Decimal",
            KnownType::DateTime => "DateTime",
            KnownType::DbNull => "DBNull",
            KnownType::TimeSpan => "TimeSpan",
            KnownType::DateTimeOffset => "DateTimeOffset",
            KnownType::Guid => "Guid",
            KnownType::Version => "Version",
            KnownType::Uri => "Uri",
            KnownType::BitArray => "BitArray",
            KnownType::BitVector32 => "BitVector32",
            KnownType::BitVector32Section => "BitVector32.Section",
            KnownType::StringBuilder => "StringBuilder",
        }
    }

    /// Primitive fast-path types
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            KnownType::Bool
                | KnownType::I8
                | KnownType::U8
                | KnownType::I16
                | KnownType::U16
                | KnownType::I32
                | KnownType::U32
                | KnownType::I64
                | KnownType::U64
                | KnownType::Char
                | KnownType::String
                | KnownType::F32
                | KnownType::F64
                | KnownType::IntPtr
                | KnownType::UIntPtr
        )
    }

    /// Whether instances are copied by value
    pub fn is_value_type(self) -> bool {
        !matches!(
            self,
            KnownType::String
                | KnownType::Object
                | KnownType::DbNull
                | KnownType::Version
                | KnownType::Uri
                | KnownType::BitArray
                | KnownType::StringBuilder
        )
    }

    /// Bit width for integral types eligible for dynamic-width encoding
    ///
    /// Returns `None` for types narrower than 16 bits and for non-integers.
    pub fn dynamic_width(self) -> Option<u32> {
        match self {
            KnownType::I16 | KnownType::U16 => Some(16),
            KnownType::I32 | KnownType::U32 | KnownType::Char => Some(32),
            KnownType::I64 | KnownType::U64 | KnownType::IntPtr | KnownType::UIntPtr => Some(64),
            _ => None,
        }
    }

    /// Fixed encoded size in bytes, for blittable types
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            KnownType::Bool | KnownType::I8 | KnownType::U8 => Some(1),
            KnownType::I16 | KnownType::U16 => Some(2),
            KnownType::I32 | KnownType::U32 | KnownType::Char | KnownType::F32 => Some(4),
            KnownType::I64
            | KnownType::U64
            | KnownType::F64
            | KnownType::IntPtr
            | KnownType::UIntPtr => Some(8),
            _ => None,
        }
    }
}

impl fmt::Display for KnownType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Underlying integer kind of an enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerKind {
    /// i8
    I8,
    /// u8
    U8,
    /// i16
    I16,
    /// u16
    U16,
    /// i32
    I32,
    /// u32
    U32,
    /// i64
    I64,
    /// u64
    U64,
}

impl IntegerKind {
    /// Every integer kind
    pub const ALL: [IntegerKind; 8] = [
        IntegerKind::I8,
        IntegerKind::U8,
        IntegerKind::I16,
        IntegerKind::U16,
        IntegerKind::I32,
        IntegerKind::U32,
        IntegerKind::I64,
        IntegerKind::U64,
    ];

    /// The equivalent known type
    pub fn known(self) -> KnownType {
        match self {
            IntegerKind::I8 => KnownType::I8,
            IntegerKind::U8 => KnownType::U8,
            IntegerKind::I16 => KnownType::I16,
            IntegerKind::U16 => KnownType::U16,
            IntegerKind::I32 => KnownType::I32,
            IntegerKind::U32 => KnownType::U32,
            IntegerKind::I64 => KnownType::I64,
            IntegerKind::U64 => KnownType::U64,
        }
    }

    /// Reverse of [`IntegerKind::known`]
    pub fn from_known(known: KnownType) -> Option<Self> {
        IntegerKind::ALL.into_iter().find(|k| k.known() == known)
    }

    /// Width in bits
    pub fn bits(self) -> u32 {
        match self {
            IntegerKind::I8 | IntegerKind::U8 => 8,
            IntegerKind::I16 | IntegerKind::U16 => 16,
            IntegerKind::I32 | IntegerKind::U32 => 32,
            IntegerKind::I64 | IntegerKind::U64 => 64,
        }
    }

    /// Whether the kind is signed
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            IntegerKind::I8 | IntegerKind::I16 | IntegerKind::I32 | IntegerKind::I64
        )
    }

    /// Mask selecting the low `bits()` bits
    pub fn mask(self) -> u64 {
        match self.bits() {
            64 => u64::MAX,
            b => (1u64 << b) - 1,
        }
    }

    /// Sign-extend (or zero-extend) raw low bits back to an i128 value
    pub fn to_i128(self, raw: u64) -> i128 {
        let raw = raw & self.mask();
        if self.is_signed() {
            let shift = 64 - self.bits();
            (((raw << shift) as i64) >> shift) as i128
        } else {
            raw as i128
        }
    }
}

/// Closed vocabulary of supported collection shapes (arrays excluded)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollectionKind {
    /// Growable indexed list
    List,
    /// Doubly linked list
    LinkedList,
    /// Unordered set
    HashSet,
    /// Ordered set
    SortedSet,
    /// FIFO queue
    Queue,
    /// LIFO stack
    Stack,
    /// Hash map
    Dictionary,
    /// Tree map ordered by key
    SortedDictionary,
    /// Array-backed sorted map
    SortedList,
    /// Generic key/value pair (value type)
    KeyValuePair,
    /// Non-generic list of objects
    ArrayList,
    /// Non-generic queue of objects
    NonGenericQueue,
    /// Non-generic stack of objects
    NonGenericStack,
    /// Non-generic hash map
    Hashtable,
    /// Non-generic sorted map
    NonGenericSortedList,
    /// Non-generic insertion-ordered map
    OrderedDictionary,
    /// Non-generic key/value pair (value type)
    DictionaryEntry,
}

impl CollectionKind {
    /// Every collection kind
    pub const ALL: [CollectionKind; 17] = [
        CollectionKind::List,
        CollectionKind::LinkedList,
        CollectionKind::HashSet,
        CollectionKind::SortedSet,
        CollectionKind::Queue,
        CollectionKind::Stack,
        CollectionKind::Dictionary,
        CollectionKind::SortedDictionary,
        CollectionKind::SortedList,
        CollectionKind::KeyValuePair,
        CollectionKind::ArrayList,
        CollectionKind::NonGenericQueue,
        CollectionKind::NonGenericStack,
        CollectionKind::Hashtable,
        CollectionKind::NonGenericSortedList,
        CollectionKind::OrderedDictionary,
        CollectionKind::DictionaryEntry,
    ];

    /// Number of generic type arguments
    pub fn arity(self) -> usize {
        match self {
            CollectionKind::List
            | CollectionKind::LinkedList
            | CollectionKind::HashSet
            | CollectionKind::SortedSet
            | CollectionKind::Queue
            | CollectionKind::Stack => 1,
            CollectionKind::Dictionary
            | CollectionKind::SortedDictionary
            | CollectionKind::SortedList
            | CollectionKind::KeyValuePair => 2,
            _ => 0,
        }
    }

    /// Whether items are key/value entries
    pub fn is_dictionary(self) -> bool {
        matches!(
            self,
            CollectionKind::Dictionary
                | CollectionKind::SortedDictionary
                | CollectionKind::SortedList
                | CollectionKind::Hashtable
                | CollectionKind::NonGenericSortedList
                | CollectionKind::OrderedDictionary
        )
    }

    /// Key/value pair kinds are value types, not collections with identity
    pub fn is_pair(self) -> bool {
        matches!(
            self,
            CollectionKind::KeyValuePair | CollectionKind::DictionaryEntry
        )
    }

    /// Element count of the implicit object arguments of non-generic kinds
    pub fn implicit_object_args(self) -> usize {
        match self {
            CollectionKind::ArrayList
            | CollectionKind::NonGenericQueue
            | CollectionKind::NonGenericStack => 1,
            CollectionKind::Hashtable
            | CollectionKind::NonGenericSortedList
            | CollectionKind::OrderedDictionary
            | CollectionKind::DictionaryEntry => 2,
            _ => 0,
        }
    }

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            CollectionKind::List => "List",
            CollectionKind::LinkedList => "LinkedList",
            CollectionKind::HashSet => "HashSet",
            CollectionKind::SortedSet => "SortedSet",
            CollectionKind::Queue => "Queue",
            CollectionKind::Stack => "Stack",
            CollectionKind::Dictionary => "Dictionary",
            CollectionKind::SortedDictionary => "SortedDictionary",
            CollectionKind::SortedList => "SortedList",
            CollectionKind::KeyValuePair => "KeyValuePair",
            CollectionKind::ArrayList => "ArrayList",
            CollectionKind::NonGenericQueue => "Queue",
            CollectionKind::NonGenericStack => "Stack",
            CollectionKind::Hashtable => "Hashtable",
            CollectionKind::NonGenericSortedList => "SortedList",
            CollectionKind::OrderedDictionary => "OrderedDictionary",
            CollectionKind::DictionaryEntry => "DictionaryEntry",
        }
    }
}

/// Array dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayRank {
    /// Single-dimension, zero-based array
    Vector,
    /// Array with explicit rank and lower bounds (rank 1 allowed for non-zero bases)
    Multi(u8),
}

impl ArrayRank {
    /// Number of dimensions
    pub fn dimensions(self) -> usize {
        match self {
            ArrayRank::Vector => 1,
            ArrayRank::Multi(n) => n as usize,
        }
    }

    /// Wire byte: 0 for vectors, the rank otherwise
    pub fn to_byte(self) -> u8 {
        match self {
            ArrayRank::Vector => 0,
            ArrayRank::Multi(n) => n,
        }
    }

    /// Inverse of [`ArrayRank::to_byte`]
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => ArrayRank::Vector,
            n => ArrayRank::Multi(n),
        }
    }
}

/// A runtime type handle
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Built-in type
    Known(KnownType),
    /// The type of type objects
    RuntimeType,
    /// User-defined class, struct, interface or enum
    Named(TypeDefRef),
    /// Array of an element type
    Array(Box<Type>, ArrayRank),
    /// Supported collection shape with its type arguments (empty for non-generic kinds)
    Collection(CollectionKind, Vec<Type>),
    /// Nullable wrapper around a value type
    Nullable(Box<Type>),
    /// Open generic parameter, valid only inside runtime type values
    GenericParameter(u8),
}

impl Type {
    /// Built-in type
    pub fn known(k: KnownType) -> Self {
        Type::Known(k)
    }

    /// The object type
    pub fn object() -> Self {
        Type::Known(KnownType::Object)
    }

    /// The string type
    pub fn string() -> Self {
        Type::Known(KnownType::String)
    }

    /// A user-defined type
    pub fn named(def: &TypeDefRef) -> Self {
        Type::Named(def.clone())
    }

    /// Single-dimension array
    pub fn array(element: Type) -> Self {
        Type::Array(Box::new(element), ArrayRank::Vector)
    }

    /// Array with an explicit rank
    pub fn array_with_rank(element: Type, rank: u8) -> Self {
        Type::Array(Box::new(element), ArrayRank::Multi(rank))
    }

    /// Generic or non-generic collection
    pub fn collection(kind: CollectionKind, args: Vec<Type>) -> Self {
        Type::Collection(kind, args)
    }

    /// `List<T>`
    pub fn list(element: Type) -> Self {
        Type::Collection(CollectionKind::List, vec![element])
    }

    /// `Dictionary<K, V>`
    pub fn dictionary(key: Type, value: Type) -> Self {
        Type::Collection(CollectionKind::Dictionary, vec![key, value])
    }

    /// `KeyValuePair<K, V>`
    pub fn key_value_pair(key: Type, value: Type) -> Self {
        Type::Collection(CollectionKind::KeyValuePair, vec![key, value])
    }

    /// `Nullable<T>`
    pub fn nullable(inner: Type) -> Self {
        Type::Nullable(Box::new(inner))
    }

    /// Open generic definition of a collection kind, e.g. `List<>`
    pub fn generic_definition(kind: CollectionKind) -> Self {
        let args = (0..kind.arity() as u8).map(Type::GenericParameter).collect();
        Type::Collection(kind, args)
    }

    /// Whether instances are copied by value
    pub fn is_value_type(&self) -> bool {
        match self {
            Type::Known(k) => k.is_value_type(),
            Type::RuntimeType => false,
            Type::Named(def) => def.is_value_type(),
            Type::Array(..) => false,
            Type::Collection(kind, _) => kind.is_pair(),
            Type::Nullable(_) => true,
            Type::GenericParameter(_) => false,
        }
    }

    /// Whether instances live on the heap with an identity
    pub fn has_identity(&self) -> bool {
        match self {
            Type::Known(k) => *k == KnownType::Object,
            Type::Named(def) => !def.is_value_type(),
            Type::Array(..) => true,
            Type::Collection(kind, _) => !kind.is_pair(),
            _ => false,
        }
    }

    /// User struct; boxed instances of it live on the heap
    pub fn is_struct(&self) -> bool {
        matches!(self, Type::Named(def) if def.is_struct())
    }

    /// Whether no subtype can appear where this type is declared
    pub fn is_sealed(&self) -> bool {
        match self {
            Type::Known(k) => *k != KnownType::Object,
            Type::Named(def) => def.is_sealed(),
            Type::GenericParameter(_) => false,
            _ => true,
        }
    }

    /// Whether the type contains an open generic parameter
    pub fn is_open(&self) -> bool {
        match self {
            Type::GenericParameter(_) => true,
            Type::Array(e, _) | Type::Nullable(e) => e.is_open(),
            Type::Collection(_, args) => args.iter().any(Type::is_open),
            _ => false,
        }
    }

    /// The user definition, if this is a named type
    pub fn as_named(&self) -> Option<&TypeDefRef> {
        match self {
            Type::Named(def) => Some(def),
            _ => None,
        }
    }

    /// The underlying type of a nullable wrapper, or self
    pub fn underlying(&self) -> &Type {
        match self {
            Type::Nullable(inner) => inner,
            other => other,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Known(k) => f.write_str(k.name()),
            Type::RuntimeType => f.write_str("Type"),
            Type::Named(def) => f.write_str(def.name()),
            Type::Array(element, ArrayRank::Vector) => write!(f, "{}[]", element),
            Type::Array(element, ArrayRank::Multi(1)) => write!(f, "{}[*]", element),
            Type::Array(element, ArrayRank::Multi(n)) => {
                write!(f, "{}[{}]", element, ",".repeat(*n as usize - 1))
            }
            Type::Collection(kind, args) if args.is_empty() => f.write_str(kind.name()),
            Type::Collection(kind, args) => {
                write!(f, "{}<", kind.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(">")
            }
            Type::Nullable(inner) => write!(f, "Nullable<{}>", inner),
            Type::GenericParameter(pos) => write!(f, "T{}", pos),
        }
    }
}
