//! Type descriptors and collection shape tags
//!
//! A [`TypeDescriptor`] is the static type information of one node of a
//! value's type: its tag, resolved [`Type`], element/value descriptors and
//! array rank. Shapes are flattened to one tag per node in pre-order:
//!
//! ```text
//! Dictionary<String, List<Int32[]>>
//!   -> [Dictionary] [String] [List] [Array] [Int32]
//! ```
//!
//! Array ranks, enum types and impure (user-defined) types are not part of
//! the tags; they follow in a separate type-info pass (see
//! [`TypeWriter`](crate::type_codec::TypeWriter)). Non-generic collections
//! emit no element tags and get implicit `Object` element descriptors.

use crate::data_types::DataTypes;
use crate::io::{BinaryReader, BinaryWriter};
use crate::type_codec::TypeNaming;
use graphbin_core::{ArrayRank, CollectionKind, Error, KnownType, Result, Type};
use smallvec::SmallVec;
use std::io::{Read, Write};

/// Deepest type nesting accepted from a stream
pub const MAX_SHAPE_DEPTH: usize = 64;

/// Static type information of one type node
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    /// Tag of this node
    pub data_type: DataTypes,
    /// Tag of the enclosing node, if nested
    pub parent: Option<DataTypes>,
    /// Resolved type
    pub ty: Type,
    /// Element (or key) descriptor of collections and arrays
    pub element: Option<Box<TypeDescriptor>>,
    /// Value descriptor of dictionary-like kinds
    pub value: Option<Box<TypeDescriptor>>,
    /// Rank of array nodes
    pub rank: Option<ArrayRank>,
}

impl TypeDescriptor {
    /// Leaf descriptor
    pub fn leaf(data_type: DataTypes, ty: Type) -> Self {
        TypeDescriptor {
            data_type,
            parent: None,
            ty,
            element: None,
            value: None,
            rank: None,
        }
    }

    /// Descriptor of the `Object` type
    pub fn object() -> Self {
        Self::leaf(DataTypes::for_known(KnownType::Object), Type::object())
    }

    /// Build the descriptor of a type
    ///
    /// Open generic parameters are accepted only when `allow_open` is set
    /// (runtime type values).
    pub fn describe(ty: &Type, naming: &dyn TypeNaming, allow_open: bool) -> Result<Self> {
        Self::describe_nested(ty, None, naming, allow_open, 0)
    }

    fn describe_nested(
        ty: &Type,
        parent: Option<DataTypes>,
        naming: &dyn TypeNaming,
        allow_open: bool,
        depth: usize,
    ) -> Result<Self> {
        if depth > MAX_SHAPE_DEPTH {
            return Err(Error::unsupported(ty.to_string(), "type nesting is too deep"));
        }
        let mut desc = match ty {
            Type::Known(k) => Self::leaf(DataTypes::for_known(*k), ty.clone()),
            Type::RuntimeType => Self::leaf(DataTypes::RUNTIME_TYPE, ty.clone()),
            Type::Named(def) => match def.enum_underlying() {
                Some(underlying) => Self::leaf(DataTypes::for_enum(underlying), ty.clone()),
                None => Self::leaf(naming.classify(def), ty.clone()),
            },
            Type::GenericParameter(_) => {
                if !allow_open {
                    return Err(Error::unsupported(
                        ty.to_string(),
                        "open generic parameters are only allowed in type values",
                    ));
                }
                Self::leaf(DataTypes::GENERIC_PARAMETER, ty.clone())
            }
            Type::Array(element, rank) => {
                if let ArrayRank::Multi(n) = rank {
                    if *n == 0 || *n > 32 {
                        return Err(Error::unsupported(ty.to_string(), "invalid array rank"));
                    }
                }
                let dt = DataTypes::ARRAY;
                let element =
                    Self::describe_nested(element, Some(dt), naming, allow_open, depth + 1)?;
                TypeDescriptor {
                    data_type: dt,
                    parent: None,
                    ty: ty.clone(),
                    element: Some(Box::new(element)),
                    value: None,
                    rank: Some(*rank),
                }
            }
            Type::Collection(kind, args) => {
                Self::describe_collection(ty, *kind, args, naming, allow_open, depth)?
            }
            Type::Nullable(inner) => {
                if !inner.is_value_type() || matches!(**inner, Type::Nullable(_)) {
                    return Err(Error::unsupported(
                        ty.to_string(),
                        "nullable requires a non-nullable value type",
                    ));
                }
                let mut desc =
                    Self::describe_nested(inner, parent, naming, allow_open, depth)?;
                desc.data_type |= DataTypes::NULLABLE;
                desc.ty = ty.clone();
                let dt = desc.data_type;
                for child in [&mut desc.element, &mut desc.value].into_iter().flatten() {
                    child.parent = Some(dt);
                }
                desc
            }
        };
        desc.parent = parent;
        Ok(desc)
    }

    fn describe_collection(
        ty: &Type,
        kind: CollectionKind,
        args: &[Type],
        naming: &dyn TypeNaming,
        allow_open: bool,
        depth: usize,
    ) -> Result<Self> {
        if args.len() != kind.arity() {
            return Err(Error::unsupported(
                ty.to_string(),
                format!("{} expects {} type arguments", kind.name(), kind.arity()),
            ));
        }
        let dt = DataTypes::for_collection(kind);
        let mut children: SmallVec<[TypeDescriptor; 2]> = SmallVec::new();
        if args.is_empty() {
            for _ in 0..kind.implicit_object_args() {
                let mut implicit = Self::object();
                implicit.parent = Some(dt);
                children.push(implicit);
            }
        } else {
            for arg in args {
                children.push(Self::describe_nested(
                    arg,
                    Some(dt),
                    naming,
                    allow_open,
                    depth + 1,
                )?);
            }
        }
        let mut children = children.into_iter();
        Ok(TypeDescriptor {
            data_type: dt,
            parent: None,
            ty: ty.clone(),
            element: children.next().map(Box::new),
            value: children.next().map(Box::new),
            rank: None,
        })
    }

    /// Collection kind of this node (not arrays)
    pub fn collection_kind(&self) -> Option<CollectionKind> {
        self.data_type.collection_kind()
    }

    /// Whether child nodes are written as tags
    pub fn emits_children(&self) -> bool {
        self.data_type.is_array()
            || self
                .collection_kind()
                .map_or(false, |kind| kind.arity() > 0)
    }

    /// Write the shape tags in pre-order
    pub fn write_tags<W: Write>(&self, w: &mut BinaryWriter<W>) -> Result<()> {
        self.write_tags_with(w, DataTypes::NULL)
    }

    /// Write the shape tags, OR-ing `root_flags` into the first tag
    pub fn write_tags_with<W: Write>(
        &self,
        w: &mut BinaryWriter<W>,
        root_flags: DataTypes,
    ) -> Result<()> {
        w.write_data_types(self.data_type | root_flags)?;
        if self.emits_children() {
            for child in [&self.element, &self.value].into_iter().flatten() {
                child.write_tags(w)?;
            }
        }
        Ok(())
    }
}

/// Tag tree read from a stream before the type-info pass
#[derive(Debug, Clone, PartialEq)]
pub struct TagNode {
    /// Tag of this node
    pub data_type: DataTypes,
    /// Child nodes (empty for leaves and non-generic collections)
    pub children: Vec<TagNode>,
}

impl TagNode {
    /// Read a tag tree whose first tag has already been read
    pub fn read<R: Read>(first: DataTypes, r: &mut BinaryReader<R>) -> Result<TagNode> {
        Self::read_nested(first, r, 0)
    }

    fn read_nested<R: Read>(
        data_type: DataTypes,
        r: &mut BinaryReader<R>,
        depth: usize,
    ) -> Result<TagNode> {
        if depth > MAX_SHAPE_DEPTH {
            return Err(Error::invalid_stream("type shape nested too deeply"));
        }
        let child_count = if data_type.is_array() {
            1
        } else {
            data_type.collection_kind().map_or(0, CollectionKind::arity)
        };
        let mut children = Vec::with_capacity(child_count);
        for _ in 0..child_count {
            let tag = r.read_data_types()?;
            if tag.is_seven_bit() {
                return Err(Error::invalid_stream("7-bit flag on a nested type tag"));
            }
            children.push(Self::read_nested(tag, r, depth + 1)?);
        }
        Ok(TagNode {
            data_type,
            children,
        })
    }
}
