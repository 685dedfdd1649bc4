//! Dynamic object model
//!
//! [`Value`] is what the serializer reads and writes. Value-typed data
//! (primitives, built-in singles, structs, enums, key/value pairs) is held
//! inline; everything with an identity lives behind an [`ObjRef`]
//! (`Rc<RefCell<HeapObject>>`), so shared references and cycles are expressed
//! by cloning the handle.
//!
//! ```text
//! Value::Ref ──► HeapObject::Instance { ty, slots }
//!                HeapObject::Array { element, rank, lengths, lower_bounds, items }
//!                HeapObject::Collection { ty, data: Seq | Map }
//!                HeapObject::Plain
//! ```

use crate::builtins::{
    BitVectorSection, DateTime, DateTimeOffset, Decimal, StringBuilder, TimeSpan, Uri, Version,
};
use crate::error::{Error, Result};
use crate::typedef::{TypeDefKind, TypeDefRef};
use crate::types::{ArrayRank, CollectionKind, KnownType, Type};
use std::cell::{Ref, RefCell, RefMut};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

/// A dynamically typed value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null reference (or empty nullable)
    Null,
    /// Boolean
    Bool(bool),
    /// i8
    I8(i8),
    /// u8
    U8(u8),
    /// i16
    I16(i16),
    /// u16
    U16(u16),
    /// i32
    I32(i32),
    /// u32
    U32(u32),
    /// i64
    I64(i64),
    /// u64
    U64(u64),
    /// Character
    Char(char),
    /// String
    String(String),
    /// f32
    F32(f32),
    /// f64
    F64(f64),
    /// Native signed integer
    IntPtr(i64),
    /// Native unsigned integer
    UIntPtr(u64),
    /// Decimal
    Decimal(Decimal),
    /// Date/time
    DateTime(DateTime),
    /// Database null marker
    DbNull,
    /// Time interval
    TimeSpan(TimeSpan),
    /// Date/time with offset
    DateTimeOffset(DateTimeOffset),
    /// GUID
    Guid(Uuid),
    /// Version number
    Version(Version),
    /// URI
    Uri(Uri),
    /// Bit array
    BitArray(Vec<bool>),
    /// 32-bit bit vector
    BitVector32(i32),
    /// Bit vector section
    BitVector32Section(BitVectorSection),
    /// String buffer
    StringBuilder(StringBuilder),
    /// Enum value
    Enum(EnumValue),
    /// Runtime type object
    Type(Type),
    /// Struct instance (value semantics)
    Struct(Box<Instance>),
    /// Generic key/value pair
    KeyValuePair(Box<KeyValuePair>),
    /// Non-generic key/value pair
    DictionaryEntry(Box<DictionaryEntry>),
    /// Reference to a heap object
    Ref(ObjRef),
}

impl Value {
    /// Default value of a declared type
    pub fn default_for(ty: &Type) -> Value {
        match ty {
            Type::Known(k) => match k {
                KnownType::Bool => Value::Bool(false),
                KnownType::I8 => Value::I8(0),
                KnownType::U8 => Value::U8(0),
                KnownType::I16 => Value::I16(0),
                KnownType::U16 => Value::U16(0),
                KnownType::I32 => Value::I32(0),
                KnownType::U32 => Value::U32(0),
                KnownType::I64 => Value::I64(0),
                KnownType::U64 => Value::U64(0),
                KnownType::Char => Value::Char('\0'),
                KnownType::F32 => Value::F32(0.0),
                KnownType::F64 => Value::F64(0.0),
                KnownType::IntPtr => Value::IntPtr(0),
                KnownType::UIntPtr => Value::UIntPtr(0),
                KnownType::Decimal => Value::Decimal(Decimal::default()),
                KnownType::DateTime => Value::DateTime(DateTime::MIN),
                KnownType::TimeSpan => Value::TimeSpan(TimeSpan::default()),
                KnownType::DateTimeOffset => Value::DateTimeOffset(DateTimeOffset::default()),
                KnownType::Guid => Value::Guid(Uuid::nil()),
                KnownType::BitVector32 => Value::BitVector32(0),
                KnownType::BitVector32Section => {
                    Value::BitVector32Section(BitVectorSection::default())
                }
                _ => Value::Null,
            },
            Type::Named(def) => match def.kind() {
                TypeDefKind::Struct => Value::Struct(Box::new(Instance::new(def))),
                TypeDefKind::Enum(_) => Value::Enum(EnumValue {
                    ty: def.clone(),
                    bits: 0,
                }),
                _ => Value::Null,
            },
            Type::Collection(CollectionKind::KeyValuePair, args) if args.len() == 2 => {
                Value::KeyValuePair(Box::new(KeyValuePair::new(
                    args[0].clone(),
                    args[1].clone(),
                    Value::default_for(&args[0]),
                    Value::default_for(&args[1]),
                )))
            }
            Type::Collection(CollectionKind::DictionaryEntry, _) => {
                Value::DictionaryEntry(Box::new(DictionaryEntry {
                    key: Value::Null,
                    value: Value::Null,
                }))
            }
            _ => Value::Null,
        }
    }

    /// Runtime type of the value; `None` for null
    pub fn runtime_type(&self) -> Option<Type> {
        let known = |k| Some(Type::Known(k));
        match self {
            Value::Null => None,
            Value::Bool(_) => known(KnownType::Bool),
            Value::I8(_) => known(KnownType::I8),
            Value::U8(_) => known(KnownType::U8),
            Value::I16(_) => known(KnownType::I16),
            Value::U16(_) => known(KnownType::U16),
            Value::I32(_) => known(KnownType::I32),
            Value::U32(_) => known(KnownType::U32),
            Value::I64(_) => known(KnownType::I64),
            Value::U64(_) => known(KnownType::U64),
            Value::Char(_) => known(KnownType::Char),
            Value::String(_) => known(KnownType::String),
            Value::F32(_) => known(KnownType::F32),
            Value::F64(_) => known(KnownType::F64),
            Value::IntPtr(_) => known(KnownType::IntPtr),
            Value::UIntPtr(_) => known(KnownType::UIntPtr),
            Value::Decimal(_) => known(KnownType::Decimal),
            Value::DateTime(_) => known(KnownType::DateTime),
            Value::DbNull => known(KnownType::DbNull),
            Value::TimeSpan(_) => known(KnownType::TimeSpan),
            Value::DateTimeOffset(_) => known(KnownType::DateTimeOffset),
            Value::Guid(_) => known(KnownType::Guid),
            Value::Version(_) => known(KnownType::Version),
            Value::Uri(_) => known(KnownType::Uri),
            Value::BitArray(_) => known(KnownType::BitArray),
            Value::BitVector32(_) => known(KnownType::BitVector32),
            Value::BitVector32Section(_) => known(KnownType::BitVector32Section),
            Value::StringBuilder(_) => known(KnownType::StringBuilder),
            Value::Enum(e) => Some(Type::Named(e.ty.clone())),
            Value::Type(_) => Some(Type::RuntimeType),
            Value::Struct(i) => Some(Type::Named(i.ty.clone())),
            Value::KeyValuePair(kvp) => Some(Type::key_value_pair(
                kvp.key_type.clone(),
                kvp.value_type.clone(),
            )),
            Value::DictionaryEntry(_) => Some(Type::Collection(
                CollectionKind::DictionaryEntry,
                Vec::new(),
            )),
            Value::Ref(r) => Some(r.runtime_type()),
        }
    }

    /// Display name of the runtime type, `"null"` for null
    pub fn type_name(&self) -> String {
        self.runtime_type()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "null".to_string())
    }

    /// Null check
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Heap handle, if this is a reference
    pub fn as_ref(&self) -> Option<&ObjRef> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// String payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Widen any integer payload to i64
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I8(v) => Some(v as i64),
            Value::U8(v) => Some(v as i64),
            Value::I16(v) => Some(v as i64),
            Value::U16(v) => Some(v as i64),
            Value::I32(v) => Some(v as i64),
            Value::U32(v) => Some(v as i64),
            Value::I64(v) | Value::IntPtr(v) => Some(v),
            Value::U64(v) | Value::UIntPtr(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Struct payload
    pub fn as_struct(&self) -> Option<&Instance> {
        match self {
            Value::Struct(i) => Some(i),
            _ => None,
        }
    }

    /// Ordering used by sorted collections and key lookup
    ///
    /// Values of different kinds order by kind; references order by address.
    pub fn key_cmp(&self, other: &Value) -> Ordering {
        let rank = self.kind_rank().cmp(&other.kind_rank());
        if rank != Ordering::Equal {
            return rank;
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Char(a), Value::Char(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::F32(a), Value::F32(b)) => a.total_cmp(b),
            (Value::F64(a), Value::F64(b)) => a.total_cmp(b),
            (Value::U64(a), Value::U64(b)) | (Value::UIntPtr(a), Value::UIntPtr(b)) => a.cmp(b),
            (Value::Decimal(a), Value::Decimal(b)) => a.parts().cmp(&b.parts()),
            (Value::DateTime(a), Value::DateTime(b)) => a.to_binary().cmp(&b.to_binary()),
            (Value::TimeSpan(a), Value::TimeSpan(b)) => a.cmp(b),
            (Value::DateTimeOffset(a), Value::DateTimeOffset(b)) => {
                (a.ticks, a.offset_minutes).cmp(&(b.ticks, b.offset_minutes))
            }
            (Value::Guid(a), Value::Guid(b)) => a.cmp(b),
            (Value::Version(a), Value::Version(b)) => a.cmp(b),
            (Value::Uri(a), Value::Uri(b)) => (a.absolute, &a.text).cmp(&(b.absolute, &b.text)),
            (Value::BitArray(a), Value::BitArray(b)) => a.cmp(b),
            (Value::BitVector32(a), Value::BitVector32(b)) => a.cmp(b),
            (Value::BitVector32Section(a), Value::BitVector32Section(b)) => {
                (a.mask, a.offset).cmp(&(b.mask, b.offset))
            }
            (Value::StringBuilder(a), Value::StringBuilder(b)) => a.text.cmp(&b.text),
            (Value::Enum(a), Value::Enum(b)) => {
                (a.ty.name(), a.value()).cmp(&(b.ty.name(), b.value()))
            }
            (Value::Type(a), Value::Type(b)) => a.to_string().cmp(&b.to_string()),
            (Value::Struct(a), Value::Struct(b)) => a
                .ty
                .name()
                .cmp(b.ty.name())
                .then_with(|| cmp_slices(&a.slots, &b.slots)),
            (Value::KeyValuePair(a), Value::KeyValuePair(b)) => a
                .key
                .key_cmp(&b.key)
                .then_with(|| a.value.key_cmp(&b.value)),
            (Value::DictionaryEntry(a), Value::DictionaryEntry(b)) => a
                .key
                .key_cmp(&b.key)
                .then_with(|| a.value.key_cmp(&b.value)),
            (Value::Ref(a), Value::Ref(b)) => a.addr().cmp(&b.addr()),
            (a, b) => match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => Ordering::Equal,
            },
        }
    }

    /// Key equality used by sets and dictionaries
    pub fn key_eq(&self, other: &Value) -> bool {
        self.key_cmp(other) == Ordering::Equal
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::I8(_) => 2,
            Value::U8(_) => 3,
            Value::I16(_) => 4,
            Value::U16(_) => 5,
            Value::I32(_) => 6,
            Value::U32(_) => 7,
            Value::I64(_) => 8,
            Value::U64(_) => 9,
            Value::Char(_) => 10,
            Value::String(_) => 11,
            Value::F32(_) => 12,
            Value::F64(_) => 13,
            Value::IntPtr(_) => 14,
            Value::UIntPtr(_) => 15,
            Value::Decimal(_) => 16,
            Value::DateTime(_) => 17,
            Value::DbNull => 18,
            Value::TimeSpan(_) => 19,
            Value::DateTimeOffset(_) => 20,
            Value::Guid(_) => 21,
            Value::Version(_) => 22,
            Value::Uri(_) => 23,
            Value::BitArray(_) => 24,
            Value::BitVector32(_) => 25,
            Value::BitVector32Section(_) => 26,
            Value::StringBuilder(_) => 27,
            Value::Enum(_) => 28,
            Value::Type(_) => 29,
            Value::Struct(_) => 30,
            Value::KeyValuePair(_) => 31,
            Value::DictionaryEntry(_) => 32,
            Value::Ref(_) => 33,
        }
    }
}

fn cmp_slices(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = x.key_cmp(y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<ObjRef> for Value {
    fn from(v: ObjRef) -> Self {
        Value::Ref(v)
    }
}

impl From<Instance> for Value {
    fn from(v: Instance) -> Self {
        Value::Struct(Box::new(v))
    }
}

/// Enum value: a named type plus its raw bits
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    /// Enum type
    pub ty: TypeDefRef,
    /// Raw bits, masked to the underlying width
    pub bits: u64,
}

impl EnumValue {
    /// Build an enum value; `None` if `ty` is not an enum
    pub fn new(ty: &TypeDefRef, value: i128) -> Option<Self> {
        let underlying = ty.enum_underlying()?;
        Some(EnumValue {
            ty: ty.clone(),
            bits: (value as u64) & underlying.mask(),
        })
    }

    /// Numeric value, sign-extended per the underlying kind
    pub fn value(&self) -> i128 {
        match self.ty.enum_underlying() {
            Some(k) => k.to_i128(self.bits),
            None => self.bits as i128,
        }
    }
}

/// Field storage of a class or struct instance
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// Runtime type
    pub ty: TypeDefRef,
    /// Field values by layout slot
    pub slots: Vec<Value>,
}

impl Instance {
    /// Instance with every field at its default value
    pub fn new(ty: &TypeDefRef) -> Self {
        let layout = ty.layout();
        let slots = layout
            .fields_by_slot()
            .into_iter()
            .map(|f| Value::default_for(&f.ty))
            .collect();
        Instance {
            ty: ty.clone(),
            slots,
        }
    }

    /// Field value by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        let slot = self.ty.layout().find(name)?.slot;
        self.slots.get(slot)
    }

    /// Set a field by name
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let slot = self
            .ty
            .layout()
            .find(name)
            .map(|f| f.slot)
            .ok_or_else(|| {
                Error::InvalidOperation(format!(
                    "type '{}' has no field '{}'",
                    self.ty.name(),
                    name
                ))
            })?;
        match self.slots.get_mut(slot) {
            Some(s) => {
                *s = value;
                Ok(())
            }
            None => Err(Error::InvalidOperation(format!(
                "slot {} out of range for '{}'",
                slot,
                self.ty.name()
            ))),
        }
    }

    /// Builder-style [`Instance::set`]; unknown names are ignored
    pub fn with(mut self, name: &str, value: Value) -> Self {
        let _ = self.set(name, value);
        self
    }
}

/// Generic key/value pair with its declared argument types
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValuePair {
    /// Declared key type
    pub key_type: Type,
    /// Declared value type
    pub value_type: Type,
    /// Key
    pub key: Value,
    /// Value
    pub value: Value,
}

impl KeyValuePair {
    /// Build a pair
    pub fn new(key_type: Type, value_type: Type, key: Value, value: Value) -> Self {
        KeyValuePair {
            key_type,
            value_type,
            key,
            value,
        }
    }
}

/// Non-generic key/value pair
#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryEntry {
    /// Key
    pub key: Value,
    /// Value
    pub value: Value,
}

/// Array with element type, rank, per-dimension lengths and lower bounds
///
/// Items are stored row-major.
#[derive(Debug, Clone)]
pub struct ArrayObject {
    /// Element type
    pub element: Type,
    /// Vector or explicit rank
    pub rank: ArrayRank,
    /// Length per dimension
    pub lengths: Vec<usize>,
    /// Lower bound per dimension
    pub lower_bounds: Vec<i32>,
    /// Row-major items
    pub items: Vec<Value>,
}

impl ArrayObject {
    /// Zero-based single-dimension array
    pub fn vector(element: Type, items: Vec<Value>) -> Self {
        ArrayObject {
            element,
            rank: ArrayRank::Vector,
            lengths: vec![items.len()],
            lower_bounds: vec![0],
            items,
        }
    }

    /// Array with explicit rank, filled with element defaults
    pub fn multi(element: Type, lengths: Vec<usize>, lower_bounds: Vec<i32>) -> Result<Self> {
        if lengths.is_empty() || lengths.len() != lower_bounds.len() || lengths.len() > 32 {
            return Err(Error::InvalidOperation(format!(
                "invalid array shape: {} lengths, {} lower bounds",
                lengths.len(),
                lower_bounds.len()
            )));
        }
        let total = lengths
            .iter()
            .try_fold(1usize, |acc, &l| acc.checked_mul(l))
            .ok_or_else(|| Error::InvalidOperation("array too large".to_string()))?;
        let default = Value::default_for(&element);
        Ok(ArrayObject {
            rank: ArrayRank::Multi(lengths.len() as u8),
            items: vec![default; total],
            element,
            lengths,
            lower_bounds,
        })
    }

    /// Array type
    pub fn array_type(&self) -> Type {
        Type::Array(Box::new(self.element.clone()), self.rank)
    }

    /// Total item count
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Zero items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Row-major index of a multi-dimensional position
    pub fn flat_index(&self, indices: &[i32]) -> Option<usize> {
        if indices.len() != self.lengths.len() {
            return None;
        }
        let mut flat = 0usize;
        for ((&index, &length), &lower) in indices
            .iter()
            .zip(self.lengths.iter())
            .zip(self.lower_bounds.iter())
        {
            let offset = usize::try_from(index as i64 - lower as i64).ok()?;
            if offset >= length {
                return None;
            }
            flat = flat * length + offset;
        }
        Some(flat)
    }

    /// Item at a position
    pub fn get(&self, indices: &[i32]) -> Option<&Value> {
        self.items.get(self.flat_index(indices)?)
    }

    /// Replace the item at a position
    pub fn set(&mut self, indices: &[i32], value: Value) -> Result<()> {
        let flat = self
            .flat_index(indices)
            .ok_or_else(|| Error::InvalidOperation(format!("index {:?} out of range", indices)))?;
        self.items[flat] = value;
        Ok(())
    }
}

/// Item storage of a collection
#[derive(Debug, Clone)]
pub enum CollectionData {
    /// Sequence kinds (lists, sets, queues, stacks)
    Seq(Vec<Value>),
    /// Dictionary kinds, in enumeration order
    Map(Vec<(Value, Value)>),
}

/// A supported collection with its type arguments
///
/// Queues store front first; stacks store bottom first. Sorted kinds keep
/// their items ordered by [`Value::key_cmp`].
#[derive(Debug, Clone)]
pub struct CollectionObject {
    kind: CollectionKind,
    args: Vec<Type>,
    data: CollectionData,
}

impl CollectionObject {
    /// Empty collection of `kind` with the given type arguments
    pub fn new(kind: CollectionKind, args: Vec<Type>) -> Result<Self> {
        if kind.is_pair() {
            return Err(Error::InvalidOperation(format!(
                "{} is a value type, not a collection",
                kind.name()
            )));
        }
        if args.len() != kind.arity() {
            return Err(Error::InvalidOperation(format!(
                "{} expects {} type arguments, got {}",
                kind.name(),
                kind.arity(),
                args.len()
            )));
        }
        let data = if kind.is_dictionary() {
            CollectionData::Map(Vec::new())
        } else {
            CollectionData::Seq(Vec::new())
        };
        Ok(CollectionObject { kind, args, data })
    }

    /// Shape
    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Collection type
    pub fn collection_type(&self) -> Type {
        Type::Collection(self.kind, self.args.clone())
    }

    /// Generic arguments, or `Object` placeholders for non-generic kinds
    pub fn element_types(&self) -> Vec<Type> {
        if self.args.is_empty() {
            vec![Type::object(); self.kind.implicit_object_args()]
        } else {
            self.args.clone()
        }
    }

    /// Storage
    pub fn data(&self) -> &CollectionData {
        &self.data
    }

    /// Mutable storage (bypasses ordering and uniqueness rules)
    pub fn data_mut(&mut self) -> &mut CollectionData {
        &mut self.data
    }

    /// Sequence items; empty for dictionaries
    pub fn items(&self) -> &[Value] {
        match &self.data {
            CollectionData::Seq(items) => items,
            CollectionData::Map(_) => &[],
        }
    }

    /// Dictionary entries; empty for sequences
    pub fn entries(&self) -> &[(Value, Value)] {
        match &self.data {
            CollectionData::Map(entries) => entries,
            CollectionData::Seq(_) => &[],
        }
    }

    /// Number of items or entries
    pub fn len(&self) -> usize {
        match &self.data {
            CollectionData::Seq(items) => items.len(),
            CollectionData::Map(entries) => entries.len(),
        }
    }

    /// Empty check
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add an item to a sequence kind
    ///
    /// Sets ignore duplicates; sorted sets insert in order.
    pub fn add(&mut self, value: Value) -> Result<()> {
        let kind = self.kind;
        let items = match &mut self.data {
            CollectionData::Seq(items) => items,
            CollectionData::Map(_) => {
                return Err(Error::InvalidOperation(format!(
                    "{} requires key/value insertion",
                    kind.name()
                )))
            }
        };
        match kind {
            CollectionKind::HashSet => {
                if !items.iter().any(|v| v.key_eq(&value)) {
                    items.push(value);
                }
            }
            CollectionKind::SortedSet => {
                if let Err(pos) = items.binary_search_by(|item| item.key_cmp(&value)) {
                    items.insert(pos, value);
                }
            }
            _ => items.push(value),
        }
        Ok(())
    }

    /// Insert an entry into a dictionary kind
    ///
    /// Null and duplicate keys are rejected; sorted kinds insert in key order.
    pub fn insert(&mut self, key: Value, value: Value) -> Result<()> {
        let kind = self.kind;
        let entries = match &mut self.data {
            CollectionData::Map(entries) => entries,
            CollectionData::Seq(_) => {
                return Err(Error::InvalidOperation(format!(
                    "{} does not hold key/value entries",
                    kind.name()
                )))
            }
        };
        if key.is_null() {
            return Err(Error::InvalidOperation(format!(
                "{} does not accept null keys",
                kind.name()
            )));
        }
        let sorted = matches!(
            kind,
            CollectionKind::SortedDictionary
                | CollectionKind::SortedList
                | CollectionKind::NonGenericSortedList
        );
        if sorted {
            match entries.binary_search_by(|(k, _)| k.key_cmp(&key)) {
                Ok(_) => return Err(duplicate_key(kind, &key)),
                Err(pos) => entries.insert(pos, (key, value)),
            }
        } else {
            if entries.iter().any(|(k, _)| k.key_eq(&key)) {
                return Err(duplicate_key(kind, &key));
            }
            entries.push((key, value));
        }
        Ok(())
    }

    /// Value stored under a key
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries()
            .iter()
            .find(|(k, _)| k.key_eq(key))
            .map(|(_, v)| v)
    }

    /// Key presence check (dictionaries) or membership (sequences)
    pub fn contains(&self, value: &Value) -> bool {
        match &self.data {
            CollectionData::Seq(items) => items.iter().any(|v| v.key_eq(value)),
            CollectionData::Map(entries) => entries.iter().any(|(k, _)| k.key_eq(value)),
        }
    }
}

fn duplicate_key(kind: CollectionKind, key: &Value) -> Error {
    Error::InvalidOperation(format!(
        "duplicate key of type {} in {}",
        key.type_name(),
        kind.name()
    ))
}

/// Heap-allocated object content
#[derive(Debug, Clone)]
pub enum HeapObject {
    /// Identity-only object
    Plain,
    /// Array
    Array(ArrayObject),
    /// Collection
    Collection(CollectionObject),
    /// Class instance
    Instance(Instance),
}

impl HeapObject {
    /// Runtime type
    pub fn runtime_type(&self) -> Type {
        match self {
            HeapObject::Plain => Type::object(),
            HeapObject::Array(a) => a.array_type(),
            HeapObject::Collection(c) => c.collection_type(),
            HeapObject::Instance(i) => Type::Named(i.ty.clone()),
        }
    }
}

/// Shared handle to a heap object; equality is identity
#[derive(Clone)]
pub struct ObjRef(Rc<RefCell<HeapObject>>);

impl ObjRef {
    /// Allocate a heap object
    pub fn new(obj: HeapObject) -> Self {
        ObjRef(Rc::new(RefCell::new(obj)))
    }

    /// Identity-only object
    pub fn plain() -> Self {
        Self::new(HeapObject::Plain)
    }

    /// Class instance
    pub fn instance(instance: Instance) -> Self {
        Self::new(HeapObject::Instance(instance))
    }

    /// Array
    pub fn array(array: ArrayObject) -> Self {
        Self::new(HeapObject::Array(array))
    }

    /// Collection
    pub fn collection(collection: CollectionObject) -> Self {
        Self::new(HeapObject::Collection(collection))
    }

    /// Immutable borrow
    pub fn borrow(&self) -> Ref<'_, HeapObject> {
        self.0.borrow()
    }

    /// Mutable borrow
    pub fn borrow_mut(&self) -> RefMut<'_, HeapObject> {
        self.0.borrow_mut()
    }

    /// Mutable borrow that reports reentrancy as an error
    pub fn try_borrow_mut(&self) -> Result<RefMut<'_, HeapObject>> {
        self.0
            .try_borrow_mut()
            .map_err(|_| Error::InvalidOperation("object is already borrowed".to_string()))
    }

    /// Same object
    pub fn ptr_eq(&self, other: &ObjRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Stable address while the object is alive
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Runtime type
    pub fn runtime_type(&self) -> Type {
        self.0.borrow().runtime_type()
    }

    /// Clone of a class instance field
    pub fn field(&self, name: &str) -> Option<Value> {
        match &*self.0.borrow() {
            HeapObject::Instance(i) => i.get(name).cloned(),
            _ => None,
        }
    }

    /// Set a class instance field
    pub fn set_field(&self, name: &str, value: Value) -> Result<()> {
        match &mut *self.try_borrow_mut()? {
            HeapObject::Instance(i) => i.set(name, value),
            other => Err(Error::InvalidOperation(format!(
                "{} has no fields",
                other.runtime_type()
            ))),
        }
    }
}

impl PartialEq for ObjRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(obj) => write!(f, "ObjRef({:#x}, {})", self.addr(), obj.runtime_type()),
            Err(_) => write!(f, "ObjRef({:#x}, <borrowed>)", self.addr()),
        }
    }
}
