use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use seedsmith_core::{Result, SeedError};
use tracing::info;

use crate::collection::{Collection, CollectionReader};
use crate::embedding::Embedder;
use crate::snapshot::SnapshotStore;

/// Creates collections, hands out read-only views and persists snapshots.
pub struct MemoryStore {
    embedder: Arc<dyn Embedder>,
    snapshots: Option<SnapshotStore>,
    readers: RwLock<HashMap<String, CollectionReader>>,
}

impl MemoryStore {
    /// In-memory only; `persist` becomes a no-op.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            snapshots: None,
            readers: RwLock::new(HashMap::new()),
        }
    }

    /// Persist snapshots under `store`.
    pub fn with_snapshots(mut self, store: SnapshotStore) -> Self {
        self.snapshots = Some(store);
        self
    }

    pub fn snapshots(&self) -> Option<&SnapshotStore> {
        self.snapshots.as_ref()
    }

    /// Create a new, empty collection. Names are unique per store.
    pub fn create(&self, name: &str) -> Result<Collection> {
        let mut readers = self.readers.write();
        if readers.contains_key(name) {
            return Err(SeedError::Memory(format!("collection '{name}' already exists")));
        }
        let collection = Collection::new(name, Arc::clone(&self.embedder));
        readers.insert(name.to_string(), collection.reader());
        Ok(collection)
    }

    /// Read-only view of a collection created by this store.
    pub fn reader(&self, name: &str) -> Option<CollectionReader> {
        self.readers.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.readers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot `collection` at revision `next_id`. Returns the file written, if
    /// this store persists at all.
    pub fn persist(&self, collection: &Collection) -> Result<Option<PathBuf>> {
        let Some(store) = &self.snapshots else {
            return Ok(None);
        };
        let path = store.write(&collection.name(), collection.next_id(), &collection.dump())?;
        Ok(Some(path))
    }

    /// Seed `collection` from the latest snapshot of the same name in `from`.
    /// Returns the revision loaded, if one existed.
    pub fn resume(&self, collection: &Collection, from: &SnapshotStore) -> Result<Option<u64>> {
        let name = collection.name();
        match from.read_latest(&name)? {
            Some((revision, snapshot)) => {
                let added = collection.load(&snapshot)?;
                info!(collection = %name, revision, added, "resumed from snapshot");
                Ok(Some(revision))
            }
            None => Ok(None),
        }
    }

    /// Build a throwaway collection from the latest snapshot in `from`; empty if none exists.
    pub fn open_latest(&self, from: &SnapshotStore, name: &str) -> Result<Collection> {
        let collection = Collection::new(name, Arc::clone(&self.embedder));
        if let Some((_, snapshot)) = from.read_latest(name)? {
            collection.load(&snapshot)?;
        }
        Ok(collection)
    }
}
