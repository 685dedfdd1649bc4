//! Wire layer of the graphbin format
//!
//! Everything below the object graph lives here:
//! - varint: 7-bit length-prefixed integers
//! - io: little-endian primitive reader/writer
//! - data_types: shape tags and their flag bits
//! - builtins: payloads of built-in value types
//! - cache: per-stream assembly, type and name caches
//! - descriptor: per-node type descriptors and tag trees
//! - type_codec: type references and the type-info pass
//! - identity: object id caches

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builtins;
pub mod cache;
pub mod data_types;
pub mod descriptor;
pub mod identity;
pub mod io;
pub mod type_codec;
pub mod varint;

pub use builtins::{read_compact, read_known, write_compact, write_known};
pub use cache::{CacheIndex, ASSEMBLY_PREAMBLE};
pub use data_types::DataTypes;
pub use descriptor::{TagNode, TypeDescriptor, MAX_SHAPE_DEPTH};
pub use identity::{IdField, IdentityReader, IdentityWriter};
pub use io::{BinaryReader, BinaryWriter};
pub use type_codec::{TypeNaming, TypeReader, TypeWriter};
