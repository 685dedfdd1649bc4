//! Serialization engine for graphbin
//!
//! This crate turns object graphs into the binary stream and back:
//! - BinarySerializationFormatter: public entry point
//! - SerializationManager / DeserializationManager: per-call state
//! - StreamNaming: type classification and hook lookup under the options
//! - UsageTracker: deferred patching of objects that are replaced on read
//! - SerializerOptions: switches shared by both directions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod de;
pub mod element;
pub mod formatter;
pub mod naming;
pub mod options;
mod scalar;
pub mod ser;
pub mod usage;

pub use de::DeserializationManager;
pub use element::ElementKind;
pub use formatter::BinarySerializationFormatter;
pub use naming::StreamNaming;
pub use options::SerializerOptions;
pub use ser::{SerializationManager, MAX_GRAPH_DEPTH};
pub use usage::{UsageRef, UsageTracker, Usages};
