//! Database: a named, keyed map of collections.

use std::collections::HashMap;

use crate::collection::{Collection, CollectionInfo};
use crate::error::{CoreError, Result};
use crate::types::CollectionConfig;

/// A database groups collections under one namespace. Dropping a database
/// closes every collection it owns before removing them.
pub struct Database {
    name: String,
    collections: HashMap<String, Collection>,
}

impl Database {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collections: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates a new, empty collection. Fails with `AlreadyExists` if the
    /// name is taken.
    pub fn create_collection(&mut self, config: CollectionConfig) -> Result<()> {
        if self.collections.contains_key(&config.name) {
            return Err(CoreError::AlreadyExists(format!(
                "collection '{}'",
                config.name
            )));
        }
        self.collections
            .insert(config.name.clone(), Collection::new(config));
        Ok(())
    }

    /// Inserts a collection already rebuilt by `Collection::restore`,
    /// bypassing `create_collection`'s duplicate check (used only during
    /// snapshot restore, which starts from an empty database map).
    pub fn insert_restored_collection(&mut self, name: String, collection: Collection) {
        self.collections.insert(name, collection);
    }

    /// Closes and removes a collection, releasing its resources.
    pub fn drop_collection(&mut self, name: &str) -> Result<()> {
        let mut collection = self
            .collections
            .remove(name)
            .ok_or_else(|| CoreError::collection_not_found(name))?;
        collection.close();
        Ok(())
    }

    pub fn collection(&self, name: &str) -> Result<&Collection> {
        self.collections
            .get(name)
            .ok_or_else(|| CoreError::collection_not_found(name))
    }

    pub fn collection_mut(&mut self, name: &str) -> Result<&mut Collection> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| CoreError::collection_not_found(name))
    }

    pub fn list_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn collection_infos(&self) -> Vec<CollectionInfo> {
        let mut infos: Vec<CollectionInfo> = self.collections.values().map(|c| c.info()).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn collections_mut(&mut self) -> impl Iterator<Item = (&String, &mut Collection)> {
        self.collections.iter_mut()
    }

    pub fn collections(&self) -> impl Iterator<Item = (&String, &Collection)> {
        self.collections.iter()
    }

    /// Closes every collection. Used when the owning database is dropped.
    pub fn close(&mut self) {
        for (_, collection) in self.collections.iter_mut() {
            collection.close();
        }
        self.collections.clear();
    }
}
