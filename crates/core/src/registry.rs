//! Type registry and name binding
//!
//! Deserialization turns stored `(assembly, name)` pairs back into type
//! definitions. The [`TypeRegistry`] is the default lookup; a
//! [`SerializationBinder`] may rename types in both directions.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut registry = TypeRegistry::new();
//! registry.register(&person);
//!
//! // Exact lookup
//! let ty = registry.resolve(Some("App"), "App.Person");
//!
//! // Streams written with omitted assembly names
//! let ty = registry.resolve(None, "App.Person");
//! ```

use crate::typedef::TypeDefRef;
use rustc_hash::FxHashMap;

/// Maps stored names to type definitions
pub trait TypeResolver {
    /// Definition for a stored `(assembly, name)` pair
    fn resolve(&self, assembly: Option<&str>, name: &str) -> Option<TypeDefRef>;
}

/// Renames types on write and maps names back on read
pub trait SerializationBinder {
    /// Stored `(assembly, name)` for a type; `None` keeps the real names
    fn bind_to_name(&self, ty: &TypeDefRef) -> Option<(Option<String>, String)>;

    /// Definition for stored names; `None` falls back to the registry
    fn bind_to_type(&self, assembly: Option<&str>, name: &str) -> Option<TypeDefRef>;
}

/// Registry of known type definitions
///
/// Maintains mappings from:
/// - `(assembly, name)` -> definition
/// - `name` -> definitions (for lookups without an assembly)
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    by_full_name: FxHashMap<(Option<String>, String), TypeDefRef>,
    by_name: FxHashMap<String, Vec<TypeDefRef>>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition (re-registering replaces the previous entry)
    pub fn register(&mut self, def: &TypeDefRef) {
        let key = (def.assembly().map(str::to_string), def.name().to_string());
        self.by_full_name.insert(key, def.clone());

        let bucket = self.by_name.entry(def.name().to_string()).or_default();
        bucket.retain(|d| d != def);
        bucket.push(def.clone());
    }

    /// Register several definitions
    pub fn register_all<'a>(&mut self, defs: impl IntoIterator<Item = &'a TypeDefRef>) {
        for def in defs {
            self.register(def);
        }
    }

    /// Builder-style [`TypeRegistry::register`]
    pub fn with(mut self, def: &TypeDefRef) -> Self {
        self.register(def);
        self
    }

    /// Number of registered definitions
    pub fn len(&self) -> usize {
        self.by_full_name.len()
    }

    /// No definitions registered
    pub fn is_empty(&self) -> bool {
        self.by_full_name.is_empty()
    }

    /// Check if a definition is registered
    pub fn is_registered(&self, def: &TypeDefRef) -> bool {
        self.by_full_name
            .contains_key(&(def.assembly().map(str::to_string), def.name().to_string()))
    }
}

impl TypeResolver for TypeRegistry {
    /// Exact match first; without an assembly, a unique name match
    fn resolve(&self, assembly: Option<&str>, name: &str) -> Option<TypeDefRef> {
        let key = (assembly.map(str::to_string), name.to_string());
        if let Some(def) = self.by_full_name.get(&key) {
            return Some(def.clone());
        }
        if assembly.is_none() {
            if let Some([only]) = self.by_name.get(name).map(Vec::as_slice) {
                return Some(only.clone());
            }
        }
        None
    }
}

/// Binder backed by explicit alias tables
#[derive(Debug, Default, Clone)]
pub struct NameMapBinder {
    to_name: FxHashMap<(Option<String>, String), (Option<String>, String)>,
    to_type: FxHashMap<(Option<String>, String), TypeDefRef>,
}

impl NameMapBinder {
    /// Create an empty binder
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `def` under an alias and map the alias back to `def`
    pub fn alias(mut self, def: &TypeDefRef, assembly: Option<&str>, name: &str) -> Self {
        let alias = (assembly.map(str::to_string), name.to_string());
        self.to_name.insert(
            (def.assembly().map(str::to_string), def.name().to_string()),
            alias.clone(),
        );
        self.to_type.insert(alias, def.clone());
        self
    }

    /// Map stored names to `def` without renaming on write
    pub fn map_back(mut self, assembly: Option<&str>, name: &str, def: &TypeDefRef) -> Self {
        self.to_type
            .insert((assembly.map(str::to_string), name.to_string()), def.clone());
        self
    }
}

impl SerializationBinder for NameMapBinder {
    fn bind_to_name(&self, ty: &TypeDefRef) -> Option<(Option<String>, String)> {
        self.to_name
            .get(&(ty.assembly().map(str::to_string), ty.name().to_string()))
            .cloned()
    }

    fn bind_to_type(&self, assembly: Option<&str>, name: &str) -> Option<TypeDefRef> {
        self.to_type
            .get(&(assembly.map(str::to_string), name.to_string()))
            .cloned()
    }
}
