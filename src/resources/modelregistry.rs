//! Registry of loaded models, keyed by scoped name.
//!
//! Every model (root or nested) is registered under its scoped name, which
//! keeps names unique across the whole tree. Root models are additionally
//! kept in load order; the tick driver walks them in that order.

use bevy_ecs::prelude::{Entity, Resource};
use rustc_hash::FxHashMap;

use crate::error::{Result, SimError};

#[derive(Resource, Default)]
pub struct ModelRegistry {
    by_name: FxHashMap<String, Entity>,
    roots: Vec<Entity>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model. Fails if the scoped name is taken.
    pub fn insert(&mut self, scoped_name: impl Into<String>, entity: Entity, root: bool) -> Result<()> {
        let scoped_name = scoped_name.into();
        if self.by_name.contains_key(&scoped_name) {
            return Err(SimError::DuplicateName(scoped_name));
        }
        self.by_name.insert(scoped_name, entity);
        if root {
            self.roots.push(entity);
        }
        Ok(())
    }

    /// Look a model up by scoped name.
    pub fn get(&self, scoped_name: impl AsRef<str>) -> Option<Entity> {
        self.by_name.get(scoped_name.as_ref()).copied()
    }

    pub fn contains(&self, scoped_name: impl AsRef<str>) -> bool {
        self.by_name.contains_key(scoped_name.as_ref())
    }

    /// Forget a model. Returns its entity if it was registered.
    pub fn remove(&mut self, scoped_name: impl AsRef<str>) -> Option<Entity> {
        let entity = self.by_name.remove(scoped_name.as_ref())?;
        self.roots.retain(|r| *r != entity);
        Some(entity)
    }

    /// Root models in load order.
    pub fn roots(&self) -> &[Entity] {
        &self.roots
    }

    /// All registered scoped names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
