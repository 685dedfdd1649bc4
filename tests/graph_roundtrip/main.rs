//! Object graph round-trip suite
//!
//! End-to-end tests through `BinarySerializationFormatter`.

mod common;

mod determinism;
mod enums;
mod hooks;
mod options;
mod properties;
mod references;
mod scenarios;
