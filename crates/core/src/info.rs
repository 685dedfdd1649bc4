//! Name/value bag exchanged with custom serializers and surrogates

use crate::types::Type;
use crate::value::Value;

/// One named entry of a [`SerializationInfo`]
#[derive(Debug, Clone)]
pub struct InfoEntry {
    /// Entry name
    pub name: String,
    /// Stored value
    pub value: Value,
    /// Type the value was declared as when added
    pub declared: Type,
}

/// Ordered name/value bag
///
/// Entries keep insertion order, which is also their stream order. Names are
/// expected to be unique; [`SerializationInfo::get`] returns the first match.
#[derive(Debug, Clone, Default)]
pub struct SerializationInfo {
    type_override: Option<Type>,
    entries: Vec<InfoEntry>,
}

impl SerializationInfo {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value declared as `Object`
    pub fn add_value(&mut self, name: impl Into<String>, value: Value) {
        self.add_typed(name, value, Type::object());
    }

    /// Add a value with an explicit declared type
    pub fn add_typed(&mut self, name: impl Into<String>, value: Value, declared: Type) {
        self.entries.push(InfoEntry {
            name: name.into(),
            value,
            declared,
        });
    }

    /// Look up a value by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.value)
    }

    /// Look up an entry by name
    pub fn entry(&self, name: &str) -> Option<&InfoEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Whether a name is present
    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// Request that the stream records `ty` instead of the object's own type
    pub fn set_type(&mut self, ty: Type) {
        self.type_override = Some(ty);
    }

    /// Type requested via [`SerializationInfo::set_type`]
    pub fn type_override(&self) -> Option<&Type> {
        self.type_override.as_ref()
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[InfoEntry] {
        &self.entries
    }

    /// Mutable entries (used while patching deferred references)
    pub fn entries_mut(&mut self) -> &mut [InfoEntry] {
        &mut self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
