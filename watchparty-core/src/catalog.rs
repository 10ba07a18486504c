//! Catalog Access
//!
//! The media library as seen by the engine: where an item lives on disk and
//! which collections (library folders) exist.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// An item known to the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    /// Underlying content path, if the item is file-backed
    pub path: Option<String>,
}

/// A named library folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub locations: Vec<String>,
}

/// Read access to the media catalog
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Look up an item. `Ok(None)` means the item no longer exists.
    async fn item(&self, item_id: &str) -> Result<Option<CatalogItem>, CatalogError>;

    /// List library folders
    async fn collections(&self) -> Result<Vec<Collection>, CatalogError>;
}

/// Catalog held in memory, for embedding hosts that already know their library
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    items: RwLock<HashMap<String, CatalogItem>>,
    collections: RwLock<Vec<Collection>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an item
    pub fn insert_item(&self, item: CatalogItem) {
        self.items.write().insert(item.id.clone(), item);
    }

    /// Forget an item
    pub fn remove_item(&self, item_id: &str) -> Option<CatalogItem> {
        self.items.write().remove(item_id)
    }

    /// Add a library folder
    pub fn insert_collection(&self, collection: Collection) {
        self.collections.write().push(collection);
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn item(&self, item_id: &str) -> Result<Option<CatalogItem>, CatalogError> {
        Ok(self.items.read().get(item_id).cloned())
    }

    async fn collections(&self) -> Result<Vec<Collection>, CatalogError> {
        Ok(self.collections.read().clone())
    }
}
