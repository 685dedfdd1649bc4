//! Type tags
//!
//! Every polymorphic value and every node of a type shape is introduced by a
//! [`DataTypes`] tag, written as a 7-bit varint.
//!
//! # Layout
//!
//! ```text
//! bit 15   14        13..8             7       6      5..0
//!     [0][NULLABLE][collection kind][7-BIT][ENUM][simple kind]
//! ```
//!
//! - simple kind: Null, primitives (1-15), built-in singles (16-28),
//!   RuntimeType (29), GenericParameter (30), BinarySerializable (40),
//!   RawStruct (41), RecursiveObjectGraph (42)
//! - ENUM: simple kind is the enum's underlying integer
//! - 7-BIT: the integer payload of this value is a varint
//! - collection kind: Array (1) and the collection vocabulary (2-22)
//! - NULLABLE: the node is `Nullable<T>` of the described value type

use graphbin_core::{CollectionKind, Error, IntegerKind, KnownType, Result};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A type tag
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DataTypes(u16);

impl DataTypes {
    const SIMPLE_MASK: u16 = 0x003F;
    const COLLECTION_MASK: u16 = 0x3F00;
    const COLLECTION_SHIFT: u16 = 8;
    const VALID_MASK: u16 = 0x7FFF;

    /// Null value / no simple kind
    pub const NULL: DataTypes = DataTypes(0);
    /// Runtime type object
    pub const RUNTIME_TYPE: DataTypes = DataTypes(29);
    /// Open generic parameter
    pub const GENERIC_PARAMETER: DataTypes = DataTypes(30);
    /// Self-describing byte blob
    pub const BINARY_SERIALIZABLE: DataTypes = DataTypes(40);
    /// Blittable struct bytes
    pub const RAW_STRUCT: DataTypes = DataTypes(41);
    /// Field graph or custom name/value bag
    pub const RECURSIVE_OBJECT_GRAPH: DataTypes = DataTypes(42);

    /// Enum flag
    pub const ENUM: DataTypes = DataTypes(0x0040);
    /// Varint payload flag
    pub const SEVEN_BIT: DataTypes = DataTypes(0x0080);
    /// Nullable wrapper flag
    pub const NULLABLE: DataTypes = DataTypes(0x4000);

    /// Array collection kind
    pub const ARRAY: DataTypes = DataTypes(1 << Self::COLLECTION_SHIFT);

    /// Raw bits
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// From raw bits, rejecting unknown codes
    pub fn from_bits(bits: u16) -> Result<Self> {
        let dt = DataTypes(bits);
        if bits & !Self::VALID_MASK != 0 {
            return Err(Error::invalid_stream(format!("invalid type tag {:#06x}", bits)));
        }
        let simple = dt.simple();
        let simple_known = simple == 0
            || Self::known_for_code(simple).is_some()
            || matches!(simple, 29 | 30 | 40 | 41 | 42);
        if !simple_known {
            return Err(Error::invalid_stream(format!("unknown simple kind {}", simple)));
        }
        let code = dt.collection_code();
        if code != 0 && code != 1 && Self::kind_for_code(code).is_none() {
            return Err(Error::invalid_stream(format!("unknown collection kind {}", code)));
        }
        if dt.is_collection() && simple != 0 {
            return Err(Error::invalid_stream(format!(
                "collection tag {:#06x} carries a simple kind",
                bits
            )));
        }
        if dt.is_enum() && dt.known().and_then(IntegerKind::from_known).is_none() {
            return Err(Error::invalid_stream(format!(
                "enum tag {:#06x} has a non-integer underlying kind",
                bits
            )));
        }
        Ok(dt)
    }

    /// Simple kind bits
    pub const fn simple(self) -> u16 {
        self.0 & Self::SIMPLE_MASK
    }

    /// Simple kind only, flags and collection cleared
    pub const fn simple_type(self) -> DataTypes {
        DataTypes(self.0 & Self::SIMPLE_MASK)
    }

    /// Collection code (0 when not a collection)
    pub const fn collection_code(self) -> u16 {
        (self.0 & Self::COLLECTION_MASK) >> Self::COLLECTION_SHIFT
    }

    /// Contains every bit of `flag`
    pub const fn contains(self, flag: DataTypes) -> bool {
        self.0 & flag.0 == flag.0
    }

    /// Tag with `flag` cleared
    pub const fn without(self, flag: DataTypes) -> DataTypes {
        DataTypes(self.0 & !flag.0)
    }

    /// Null tag
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Enum flag set
    pub const fn is_enum(self) -> bool {
        self.contains(Self::ENUM)
    }

    /// 7-bit flag set
    pub const fn is_seven_bit(self) -> bool {
        self.contains(Self::SEVEN_BIT)
    }

    /// Nullable flag set
    pub const fn is_nullable(self) -> bool {
        self.contains(Self::NULLABLE)
    }

    /// Array or collection node
    pub const fn is_collection(self) -> bool {
        self.collection_code() != 0
    }

    /// Array node
    pub const fn is_array(self) -> bool {
        self.collection_code() == 1
    }

    /// BinarySerializable, RawStruct or RecursiveObjectGraph
    pub const fn is_impure(self) -> bool {
        matches!(self.simple(), 40 | 41 | 42)
    }

    /// Tag of a known type
    pub fn for_known(known: KnownType) -> DataTypes {
        DataTypes(Self::code_for_known(known))
    }

    /// Known type of the simple kind, if any
    pub fn known(self) -> Option<KnownType> {
        Self::known_for_code(self.simple())
    }

    /// Enum tag over an underlying integer kind
    pub fn for_enum(underlying: IntegerKind) -> DataTypes {
        Self::ENUM | Self::for_known(underlying.known())
    }

    /// Tag of a collection kind
    pub fn for_collection(kind: CollectionKind) -> DataTypes {
        DataTypes(Self::code_for_kind(kind) << Self::COLLECTION_SHIFT)
    }

    /// Collection kind (not arrays)
    pub fn collection_kind(self) -> Option<CollectionKind> {
        Self::kind_for_code(self.collection_code())
    }

    fn code_for_known(known: KnownType) -> u16 {
        match known {
            KnownType::Bool => 1,
            KnownType::I8 => 2,
            KnownType::U8 => 3,
            KnownType::I16 => 4,
            KnownType::U16 => 5,
            KnownType::I32 => 6,
            KnownType::U32 => 7,
            KnownType::I64 => 8,
            KnownType::U64 => 9,
            KnownType::Char => 10,
            KnownType::String => 11,
            KnownType::F32 => 12,
            KnownType::F64 => 13,
            KnownType::IntPtr => 14,
            KnownType::UIntPtr => 15,
            KnownType::Object => 16,
            KnownType::Decimal => 17,
            KnownType::DateTime => 18,
            KnownType::DbNull => 19,
            KnownType::TimeSpan => 20,
            KnownType::DateTimeOffset => 21,
            KnownType::Guid => 22,
            KnownType::Version => 23,
            KnownType::Uri => 24,
            KnownType::BitArray => 25,
            KnownType::BitVector32 => 26,
            KnownType::BitVector32Section => 27,
            KnownType::StringBuilder => 28,
        }
    }

    fn known_for_code(code: u16) -> Option<KnownType> {
        KnownType::ALL
            .into_iter()
            .find(|&k| Self::code_for_known(k) == code)
    }

    fn code_for_kind(kind: CollectionKind) -> u16 {
        match kind {
            CollectionKind::List => 2,
            CollectionKind::LinkedList => 3,
            CollectionKind::HashSet => 4,
            CollectionKind::SortedSet => 5,
            CollectionKind::Queue => 6,
            CollectionKind::Stack => 7,
            CollectionKind::Dictionary => 8,
            CollectionKind::SortedDictionary => 9,
            CollectionKind::SortedList => 10,
            CollectionKind::KeyValuePair => 11,
            CollectionKind::ArrayList => 16,
            CollectionKind::NonGenericQueue => 17,
            CollectionKind::NonGenericStack => 18,
            CollectionKind::Hashtable => 19,
            CollectionKind::NonGenericSortedList => 20,
            CollectionKind::OrderedDictionary => 21,
            CollectionKind::DictionaryEntry => 22,
        }
    }

    fn kind_for_code(code: u16) -> Option<CollectionKind> {
        CollectionKind::ALL
            .into_iter()
            .find(|&k| Self::code_for_kind(k) == code)
    }
}

impl BitOr for DataTypes {
    type Output = DataTypes;

    fn bitor(self, rhs: DataTypes) -> DataTypes {
        DataTypes(self.0 | rhs.0)
    }
}

impl BitOrAssign for DataTypes {
    fn bitor_assign(&mut self, rhs: DataTypes) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for DataTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataTypes({})", self)
    }
}

impl fmt::Display for DataTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        if self.is_nullable() {
            parts.push("Nullable".to_string());
        }
        if self.is_array() {
            parts.push("Array".to_string());
        } else if let Some(kind) = self.collection_kind() {
            parts.push(format!("{:?}", kind));
        }
        if self.is_enum() {
            parts.push("Enum".to_string());
        }
        match self.simple() {
            0 if parts.is_empty() => parts.push("Null".to_string()),
            0 => {}
            29 => parts.push("RuntimeType".to_string()),
            30 => parts.push("GenericParameter".to_string()),
            40 => parts.push("BinarySerializable".to_string()),
            41 => parts.push("RawStruct".to_string()),
            42 => parts.push("RecursiveObjectGraph".to_string()),
            code => match Self::known_for_code(code) {
                Some(k) => parts.push(k.name().to_string()),
                None => parts.push(format!("#{}", code)),
            },
        }
        if self.is_seven_bit() {
            parts.push("7Bit".to_string());
        }
        f.write_str(&parts.join("|"))
    }
}
