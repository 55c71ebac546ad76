//! Primitive registry for managing registered renderables.

use std::collections::HashMap;

use cumulo_core::{CumuloError, Result};
use cumulo_render::Primitive;

/// Registry for all renderable primitives in the scene.
///
/// Primitives are organized by kind and then by instance name.
#[derive(Default)]
pub struct Registry {
    /// Map from kind -> (instance name -> primitive)
    primitives: HashMap<String, HashMap<String, Box<dyn Primitive>>>,
}

impl Registry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a primitive.
    ///
    /// Returns an error if a primitive with the same kind and name already
    /// exists.
    pub fn register(&mut self, primitive: Box<dyn Primitive>) -> Result<()> {
        let kind = primitive.kind().to_string();
        let name = primitive.name().to_string();

        let kind_map = self.primitives.entry(kind).or_default();
        if kind_map.contains_key(&name) {
            return Err(CumuloError::PrimitiveExists(name));
        }
        kind_map.insert(name, primitive);
        Ok(())
    }

    /// Gets a reference to a primitive by kind and name.
    #[must_use]
    pub fn get(&self, kind: &str, name: &str) -> Option<&dyn Primitive> {
        self.primitives
            .get(kind)
            .and_then(|m| m.get(name))
            .map(AsRef::as_ref)
    }

    /// Gets a mutable reference to a primitive by kind and name.
    pub fn get_mut(&mut self, kind: &str, name: &str) -> Option<&mut Box<dyn Primitive>> {
        self.primitives.get_mut(kind)?.get_mut(name)
    }

    /// Checks if a primitive with the given kind and name exists.
    #[must_use]
    pub fn contains(&self, kind: &str, name: &str) -> bool {
        self.primitives
            .get(kind)
            .is_some_and(|m| m.contains_key(name))
    }

    /// Removes a primitive by kind and name.
    pub fn remove(&mut self, kind: &str, name: &str) -> Option<Box<dyn Primitive>> {
        self.primitives.get_mut(kind).and_then(|m| m.remove(name))
    }

    /// Removes all primitives from the registry.
    pub fn clear(&mut self) {
        self.primitives.clear();
    }

    /// Returns an iterator over all primitives.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Primitive> {
        self.primitives
            .values()
            .flat_map(HashMap::values)
            .map(AsRef::as_ref)
    }

    /// Returns a mutable iterator over all primitives.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Primitive>> + '_ {
        self.primitives.values_mut().flat_map(HashMap::values_mut)
    }

    /// Returns the total number of registered primitives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.primitives.values().map(HashMap::len).sum()
    }

    /// Returns true if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primitives.values().all(HashMap::is_empty)
    }
}
