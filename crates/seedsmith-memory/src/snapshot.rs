use std::path::{Path, PathBuf};

use seedsmith_core::{Result, SeedError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Full `{ids, documents}` export of a collection at one revision.
///
/// Ids are written as decimal strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Validated `(id, document)` pairs.
    pub fn entries(&self) -> Result<Vec<(u64, &str)>> {
        if self.ids.len() != self.documents.len() {
            return Err(SeedError::Memory(format!(
                "snapshot has {} ids but {} documents",
                self.ids.len(),
                self.documents.len()
            )));
        }
        self.ids
            .iter()
            .zip(&self.documents)
            .map(|(id, doc)| {
                id.trim()
                    .parse::<u64>()
                    .map(|id| (id, doc.as_str()))
                    .map_err(|_| SeedError::Memory(format!("snapshot id '{id}' is not an integer")))
            })
            .collect()
    }
}

/// Snapshot files under `<root>/<collection>/<revision>.json`.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn collection_dir(&self, collection: &str) -> PathBuf {
        self.root.join(collection)
    }

    /// Write a revision. The file appears atomically (temp file + rename).
    pub fn write(&self, collection: &str, revision: u64, snapshot: &Snapshot) -> Result<PathBuf> {
        let dir = self.collection_dir(collection);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{revision}.json"));
        let tmp = dir.join(format!(".{revision}.json.tmp"));
        let body = serde_json::to_string(snapshot)?;
        std::fs::write(&tmp, body).map_err(|e| SeedError::Snapshot {
            path: tmp.clone(),
            reason: e.to_string(),
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| SeedError::Snapshot {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        debug!(collection, revision, entries = snapshot.len(), "snapshot written");
        Ok(path)
    }

    /// All revisions present, ascending. Files whose stem is not an integer are ignored.
    pub fn revisions(&self, collection: &str) -> Result<Vec<u64>> {
        let dir = self.collection_dir(collection);
        if !dir.is_dir() {
            return Ok(vec![]);
        }
        let mut revs = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(rev) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
            {
                revs.push(rev);
            }
        }
        revs.sort_unstable();
        Ok(revs)
    }

    /// The maximum revision present, if any.
    pub fn latest_revision(&self, collection: &str) -> Result<Option<u64>> {
        Ok(self.revisions(collection)?.last().copied())
    }

    pub fn read(&self, collection: &str, revision: u64) -> Result<Snapshot> {
        let path = self.collection_dir(collection).join(format!("{revision}.json"));
        let raw = std::fs::read_to_string(&path).map_err(|e| SeedError::Snapshot {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let snapshot: Snapshot = serde_json::from_str(&raw).map_err(|e| SeedError::Snapshot {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        snapshot.entries().map_err(|e| SeedError::Snapshot {
            path,
            reason: e.to_string(),
        })?;
        Ok(snapshot)
    }

    /// Read the latest revision, if any exists.
    pub fn read_latest(&self, collection: &str) -> Result<Option<(u64, Snapshot)>> {
        match self.latest_revision(collection)? {
            Some(rev) => {
                let snapshot = self.read(collection, rev)?;
                info!(collection, revision = rev, entries = snapshot.len(), "loaded latest snapshot");
                Ok(Some((rev, snapshot)))
            }
            None => Ok(None),
        }
    }
}
