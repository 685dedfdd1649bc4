//! Serializer options
//!
//! A plain struct of switches shared by both directions. Streams must be
//! read with the options they were written with: several switches change
//! how a type is classified on the wire.
//!
//! # Example
//!
//! ```
//! use graphbin_engine::SerializerOptions;
//!
//! let options = SerializerOptions::strict()
//!     .with_ignore_custom_serialization(true)
//!     .with_omit_assembly_names(true);
//! assert!(options.compact_serialization_of_structures);
//! ```

use serde::{Deserialize, Serialize};

/// Switches controlling type classification and hook usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerOptions {
    /// Serialize types without the serializable flag by their fields
    pub recursive_serialization_as_fallback: bool,
    /// Write blittable structs as raw bytes
    pub compact_serialization_of_structures: bool,
    /// Do not use [`BinarySerializable`](graphbin_core::BinarySerializable) hooks
    pub ignore_binary_serializable: bool,
    /// Do not use [`CustomSerializer`](graphbin_core::CustomSerializer) hooks
    pub ignore_custom_serialization: bool,
    /// Do not resolve [`ObjectReference`](graphbin_core::ObjectReference) proxies
    pub ignore_object_reference: bool,
    /// Do not invoke [`SerializationEvents`](graphbin_core::SerializationEvents)
    pub ignore_serialization_methods: bool,
    /// Skip unknown fields and mismatched levels instead of failing
    pub ignore_object_changes: bool,
    /// Consult the surrogate selector for every non-array type, not only user types
    pub try_use_surrogate_selector_for_any_type: bool,
    /// Write user types without their assembly name
    pub omit_assembly_names: bool,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self::strict()
    }
}

impl SerializerOptions {
    /// Every switch off except compact structs
    pub fn strict() -> Self {
        SerializerOptions {
            recursive_serialization_as_fallback: false,
            compact_serialization_of_structures: true,
            ignore_binary_serializable: false,
            ignore_custom_serialization: false,
            ignore_object_reference: false,
            ignore_serialization_methods: false,
            ignore_object_changes: false,
            try_use_surrogate_selector_for_any_type: false,
            omit_assembly_names: false,
        }
    }

    /// Tolerates layout drift and types without the serializable flag
    pub fn lenient() -> Self {
        SerializerOptions {
            recursive_serialization_as_fallback: true,
            ignore_object_changes: true,
            ..Self::strict()
        }
    }

    /// Set `recursive_serialization_as_fallback`
    pub fn with_recursive_fallback(mut self, on: bool) -> Self {
        self.recursive_serialization_as_fallback = on;
        self
    }

    /// Set `compact_serialization_of_structures`
    pub fn with_compact_structures(mut self, on: bool) -> Self {
        self.compact_serialization_of_structures = on;
        self
    }

    /// Set `ignore_binary_serializable`
    pub fn with_ignore_binary_serializable(mut self, on: bool) -> Self {
        self.ignore_binary_serializable = on;
        self
    }

    /// Set `ignore_custom_serialization`
    pub fn with_ignore_custom_serialization(mut self, on: bool) -> Self {
        self.ignore_custom_serialization = on;
        self
    }

    /// Set `ignore_object_reference`
    pub fn with_ignore_object_reference(mut self, on: bool) -> Self {
        self.ignore_object_reference = on;
        self
    }

    /// Set `ignore_serialization_methods`
    pub fn with_ignore_serialization_methods(mut self, on: bool) -> Self {
        self.ignore_serialization_methods = on;
        self
    }

    /// Set `ignore_object_changes`
    pub fn with_ignore_object_changes(mut self, on: bool) -> Self {
        self.ignore_object_changes = on;
        self
    }

    /// Set `try_use_surrogate_selector_for_any_type`
    pub fn with_surrogates_for_any_type(mut self, on: bool) -> Self {
        self.try_use_surrogate_selector_for_any_type = on;
        self
    }

    /// Set `omit_assembly_names`
    pub fn with_omit_assembly_names(mut self, on: bool) -> Self {
        self.omit_assembly_names = on;
        self
    }
}
