//! Type references and the type-info pass
//!
//! A type reference is a 7-bit index into the per-stream type cache (see
//! [`crate::cache`]). New named types write an assembly reference and the
//! type name through the name cache; every other new type is written by tag
//! (shape tags plus its own type-info pass). Both kinds are appended to the
//! cache after they have been written, so nested types get lower indices.
//!
//! The type-info pass follows the shape tags of a descriptor and writes, in
//! pre-order:
//!
//! ```text
//! array node         rank byte (0 = vector)
//! enum / impure node type reference
//! generic parameter  position byte
//! ```

use crate::cache::{
    CacheIndex, IndexReader, IndexWriter, StringCacheReader, StringCacheWriter, ASSEMBLY_PREAMBLE,
};
use crate::data_types::DataTypes;
use crate::descriptor::{TagNode, TypeDescriptor};
use crate::io::{BinaryReader, BinaryWriter};
use graphbin_core::{ArrayRank, Error, KnownType, Result, Type, TypeDefRef};
use std::io::{Read, Write};
use tracing::debug;

/// Naming and classification policy shared by both directions
pub trait TypeNaming {
    /// Simple kind used for a non-enum user type
    /// (BinarySerializable, RawStruct or RecursiveObjectGraph)
    fn classify(&self, def: &TypeDefRef) -> DataTypes;

    /// Stored `(assembly, name)` of a user type
    fn stored_name(&self, def: &TypeDefRef) -> (Option<String>, String);

    /// Map stored names back to a type definition
    fn resolve(&self, assembly: Option<&str>, name: &str) -> Result<TypeDefRef>;
}

fn type_preamble() -> impl Iterator<Item = Type> {
    KnownType::ALL
        .into_iter()
        .map(Type::Known)
        .chain(std::iter::once(Type::RuntimeType))
}

/// Writer side of the type, assembly and member-name caches
pub struct TypeWriter {
    types: IndexWriter<Type>,
    assemblies: StringCacheWriter,
    names: StringCacheWriter,
}

impl Default for TypeWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeWriter {
    /// Caches seeded with their preambles
    pub fn new() -> Self {
        TypeWriter {
            types: IndexWriter::with_preamble(type_preamble()),
            assemblies: StringCacheWriter::with_preamble(ASSEMBLY_PREAMBLE),
            names: StringCacheWriter::default(),
        }
    }

    /// Number of cached types (preamble included)
    pub fn type_count(&self) -> usize {
        self.types.count()
    }

    /// Write a type reference
    pub fn write_type<W: Write>(
        &mut self,
        w: &mut BinaryWriter<W>,
        ty: &Type,
        naming: &dyn TypeNaming,
    ) -> Result<()> {
        let count = self.types.count();
        if let Some(index) = self.types.index_of(ty) {
            return w.write_7bit(CacheIndex::Existing(index).encode(count)?);
        }

        match ty {
            Type::Named(def) => {
                w.write_7bit(CacheIndex::New.encode(count)?)?;
                let (assembly, name) = naming.stored_name(def);
                if name.is_empty() {
                    return Err(Error::unsupported(def.name(), "stored type name is empty"));
                }
                let assemblies_before = self.assemblies.count();
                self.assemblies.write(w, assembly.as_deref())?;
                if self.assemblies.count() != assemblies_before {
                    debug!(target: "graphbin::types", assembly = ?assembly, "New assembly in stream");
                }
                self.names.write(w, Some(&name))?;
                debug!(target: "graphbin::types", type_name = %name, index = count, "New type in stream");
            }
            _ => {
                w.write_7bit(CacheIndex::ByTag.encode(count)?)?;
                let desc = TypeDescriptor::describe(ty, naming, true)?;
                self.write_descriptor(w, &desc, DataTypes::NULL, naming)?;
                debug!(target: "graphbin::types", type_name = %ty, "New composite type in stream");
            }
        }
        self.types.add(ty.clone());
        Ok(())
    }

    /// Write shape tags and the type-info pass of a descriptor
    pub fn write_descriptor<W: Write>(
        &mut self,
        w: &mut BinaryWriter<W>,
        desc: &TypeDescriptor,
        root_flags: DataTypes,
        naming: &dyn TypeNaming,
    ) -> Result<()> {
        desc.write_tags_with(w, root_flags)?;
        self.write_type_info(w, desc, naming)
    }

    /// Write the type-info pass of a descriptor
    pub fn write_type_info<W: Write>(
        &mut self,
        w: &mut BinaryWriter<W>,
        desc: &TypeDescriptor,
        naming: &dyn TypeNaming,
    ) -> Result<()> {
        if desc.data_type.is_array() {
            let rank = desc.rank.unwrap_or(ArrayRank::Vector);
            w.write_u8(rank.to_byte())?;
        } else if desc.data_type.is_enum() {
            match desc.ty.underlying() {
                Type::Named(def) => self.write_type(w, &Type::Named(def.clone()), naming)?,
                other => {
                    return Err(Error::InvalidOperation(format!(
                        "descriptor tag {} does not match type {}",
                        desc.data_type, other
                    )))
                }
            }
        } else if desc.data_type.is_impure() {
            // surrogates may claim built-in and collection types as well
            self.write_type(w, desc.ty.underlying(), naming)?;
        } else if let Type::GenericParameter(position) = desc.ty {
            w.write_u8(position)?;
        }

        if desc.emits_children() {
            for child in [&desc.element, &desc.value].into_iter().flatten() {
                self.write_type_info(w, child, naming)?;
            }
        }
        Ok(())
    }

    /// Write a member or level name through the name cache
    pub fn write_name<W: Write>(&mut self, w: &mut BinaryWriter<W>, name: &str) -> Result<()> {
        self.names.write(w, Some(name))
    }
}

/// Reader side of the type, assembly and member-name caches
pub struct TypeReader {
    types: IndexReader<Type>,
    assemblies: StringCacheReader,
    names: StringCacheReader,
}

impl Default for TypeReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeReader {
    /// Caches seeded with their preambles
    pub fn new() -> Self {
        TypeReader {
            types: IndexReader::with_preamble(type_preamble()),
            assemblies: StringCacheReader::with_preamble(ASSEMBLY_PREAMBLE),
            names: StringCacheReader::default(),
        }
    }

    /// Number of cached types (preamble included)
    pub fn type_count(&self) -> usize {
        self.types.count()
    }

    /// Read a type reference
    pub fn read_type<R: Read>(
        &mut self,
        r: &mut BinaryReader<R>,
        naming: &dyn TypeNaming,
    ) -> Result<Type> {
        let raw = r.read_7bit()?;
        let ty = match CacheIndex::decode(raw, self.types.count(), true)? {
            CacheIndex::Existing(i) => {
                return self
                    .types
                    .get(i)
                    .cloned()
                    .ok_or_else(|| Error::invalid_stream(format!("type index {} missing", i)))
            }
            CacheIndex::Omitted => {
                return Err(Error::invalid_stream("type reference cannot be omitted"))
            }
            CacheIndex::New => {
                let assembly = self.assemblies.read(r)?;
                let name = self
                    .names
                    .read(r)?
                    .ok_or_else(|| Error::invalid_stream("type name is empty"))?;
                let def = naming.resolve(assembly.as_deref(), &name)?;
                debug!(target: "graphbin::types", type_name = %name, assembly = ?assembly, "Resolved stream type");
                Type::Named(def)
            }
            CacheIndex::ByTag => {
                let first = r.read_data_types()?;
                self.read_descriptor(first, r, naming, true)?.ty
            }
        };
        self.types.push(ty.clone());
        Ok(ty)
    }

    /// Read a descriptor whose first tag has already been read
    pub fn read_descriptor<R: Read>(
        &mut self,
        first: DataTypes,
        r: &mut BinaryReader<R>,
        naming: &dyn TypeNaming,
        allow_open: bool,
    ) -> Result<TypeDescriptor> {
        let tree = TagNode::read(first, r)?;
        self.read_type_info(&tree, None, r, naming, allow_open)
    }

    fn read_type_info<R: Read>(
        &mut self,
        node: &TagNode,
        parent: Option<DataTypes>,
        r: &mut BinaryReader<R>,
        naming: &dyn TypeNaming,
        allow_open: bool,
    ) -> Result<TypeDescriptor> {
        let dt = node.data_type;
        let mut desc = TypeDescriptor::leaf(dt, Type::object());
        desc.parent = parent;

        let base = if dt.is_array() {
            let rank = match r.read_u8()? {
                n if n > 32 => {
                    return Err(Error::invalid_stream(format!("invalid array rank {}", n)))
                }
                n => ArrayRank::from_byte(n),
            };
            let element = self.read_child(node, 0, dt, r, naming, allow_open)?;
            let ty = Type::Array(Box::new(element.ty.clone()), rank);
            desc.rank = Some(rank);
            desc.element = Some(Box::new(element));
            ty
        } else if let Some(kind) = dt.collection_kind() {
            let mut args = Vec::with_capacity(kind.arity());
            if kind.arity() == 0 {
                let implicit = kind.implicit_object_args();
                let mut object = TypeDescriptor::object();
                object.parent = Some(dt);
                if implicit >= 1 {
                    desc.element = Some(Box::new(object.clone()));
                }
                if implicit >= 2 {
                    desc.value = Some(Box::new(object));
                }
            } else {
                let element = self.read_child(node, 0, dt, r, naming, allow_open)?;
                args.push(element.ty.clone());
                desc.element = Some(Box::new(element));
                if kind.arity() > 1 {
                    let value = self.read_child(node, 1, dt, r, naming, allow_open)?;
                    args.push(value.ty.clone());
                    desc.value = Some(Box::new(value));
                }
            }
            Type::Collection(kind, args)
        } else if dt.is_enum() {
            let ty = self.read_type(r, naming)?;
            let expected = dt.known();
            match &ty {
                Type::Named(def) if def.enum_underlying().map(|k| k.known()) == expected => {}
                other => {
                    return Err(Error::invalid_stream(format!(
                        "type {} does not match enum tag {}",
                        other, dt
                    )))
                }
            }
            ty
        } else if dt.is_impure() {
            let ty = self.read_type(r, naming)?;
            let valid = match &ty {
                Type::Named(def) => def.enum_underlying().is_none(),
                other => !other.is_open(),
            };
            if !valid {
                return Err(Error::invalid_stream(format!(
                    "type {} does not match tag {}",
                    ty, dt
                )));
            }
            ty
        } else if dt.simple_type() == DataTypes::RUNTIME_TYPE {
            Type::RuntimeType
        } else if dt.simple_type() == DataTypes::GENERIC_PARAMETER {
            if !allow_open {
                return Err(Error::invalid_stream(
                    "open generic parameter outside a type value",
                ));
            }
            Type::GenericParameter(r.read_u8()?)
        } else {
            let known = dt
                .known()
                .ok_or_else(|| Error::invalid_stream(format!("tag {} does not name a type", dt)))?;
            Type::Known(known)
        };

        desc.ty = if dt.is_nullable() {
            if !base.is_value_type() {
                return Err(Error::invalid_stream(format!(
                    "nullable flag on reference type {}",
                    base
                )));
            }
            Type::Nullable(Box::new(base))
        } else {
            base
        };
        Ok(desc)
    }

    fn read_child<R: Read>(
        &mut self,
        node: &TagNode,
        index: usize,
        parent: DataTypes,
        r: &mut BinaryReader<R>,
        naming: &dyn TypeNaming,
        allow_open: bool,
    ) -> Result<TypeDescriptor> {
        let child = node
            .children
            .get(index)
            .ok_or_else(|| Error::invalid_stream("missing element tag"))?;
        self.read_type_info(child, Some(parent), r, naming, allow_open)
    }

    /// Read a member or level name through the name cache (`""` when omitted)
    pub fn read_name<R: Read>(&mut self, r: &mut BinaryReader<R>) -> Result<String> {
        Ok(self.names.read(r)?.unwrap_or_default())
    }
}
