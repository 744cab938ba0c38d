use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use seedsmith_core::{Result, SeedError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedding::{Embedder, cosine_similarity};
use crate::snapshot::Snapshot;

/// A ranked query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHit {
    pub id: u64,
    pub document: String,
    pub score: f32,
}

#[derive(Debug)]
struct Entry {
    id: u64,
    document: String,
    embedding: Vec<f32>,
}

#[derive(Debug)]
struct Inner {
    name: String,
    entries: Vec<Entry>,
    index: HashMap<u64, usize>,
    next_id: u64,
}

impl Inner {
    fn query(&self, embedder: &dyn Embedder, text: &str, k: usize) -> Vec<QueryHit> {
        if k == 0 || self.entries.is_empty() {
            return vec![];
        }
        let q = embedder.embed(text);
        let mut scored: Vec<(&Entry, f32)> = self
            .entries
            .iter()
            .map(|e| (e, cosine_similarity(&q, &e.embedding)))
            .collect();
        // Equal scores: an exact text match first, then insertion order.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| (b.0.document == text).cmp(&(a.0.document == text)))
        });
        scored.truncate(k);
        scored
            .into_iter()
            .map(|(e, score)| QueryHit {
                id: e.id,
                document: e.document.clone(),
                score,
            })
            .collect()
    }

    fn dump(&self) -> Snapshot {
        Snapshot {
            ids: self.entries.iter().map(|e| e.id.to_string()).collect(),
            documents: self.entries.iter().map(|e| e.document.clone()).collect(),
        }
    }
}

/// An append-only collection of documents, owned by the agent that created it.
///
/// Ids come from a per-collection counter and are never reused. Other agents
/// get a [`CollectionReader`]; appends are visible to readers immediately.
pub struct Collection {
    inner: Arc<RwLock<Inner>>,
    embedder: Arc<dyn Embedder>,
}

/// Shared read-only view of a [`Collection`].
#[derive(Clone)]
pub struct CollectionReader {
    inner: Arc<RwLock<Inner>>,
    embedder: Arc<dyn Embedder>,
}

impl Collection {
    pub fn new(name: impl Into<String>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                name: name.into(),
                entries: Vec::new(),
                index: HashMap::new(),
                next_id: 0,
            })),
            embedder,
        }
    }

    /// Append documents and return their freshly allocated ids.
    pub fn add<I, S>(&self, documents: I) -> Vec<u64>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        // Embed outside the lock.
        let prepared: Vec<(String, Vec<f32>)> = documents
            .into_iter()
            .map(|d| {
                let d = d.into();
                let emb = self.embedder.embed(&d);
                (d, emb)
            })
            .collect();

        let mut inner = self.inner.write();
        let mut ids = Vec::with_capacity(prepared.len());
        for (document, embedding) in prepared {
            let id = inner.next_id;
            inner.next_id += 1;
            let pos = inner.entries.len();
            inner.index.insert(id, pos);
            inner.entries.push(Entry {
                id,
                document,
                embedding,
            });
            ids.push(id);
        }
        debug!(collection = %inner.name, added = ids.len(), total = inner.entries.len(), "documents added");
        ids
    }

    /// Rehydrate from a snapshot. Entries already present with the same text
    /// are skipped; the id counter resumes one past the largest id seen.
    /// Returns the number of entries added.
    pub fn load(&self, snapshot: &Snapshot) -> Result<usize> {
        let entries = snapshot.entries()?;
        let prepared: Vec<(u64, String, Vec<f32>)> = entries
            .iter()
            .map(|(id, doc)| (*id, doc.to_string(), self.embedder.embed(doc)))
            .collect();

        let mut inner = self.inner.write();
        for (id, doc, _) in &prepared {
            if let Some(&pos) = inner.index.get(id)
                && inner.entries[pos].document != *doc
            {
                return Err(SeedError::Memory(format!(
                    "collection '{}': snapshot id {} conflicts with an existing document",
                    inner.name, id
                )));
            }
        }

        let mut added = 0;
        for (id, document, embedding) in prepared {
            if inner.index.contains_key(&id) {
                continue;
            }
            let pos = inner.entries.len();
            inner.index.insert(id, pos);
            inner.entries.push(Entry {
                id,
                document,
                embedding,
            });
            inner.next_id = inner.next_id.max(id + 1);
            added += 1;
        }
        debug!(collection = %inner.name, added, next_id = inner.next_id, "snapshot loaded");
        Ok(added)
    }

    /// A read-only handle for other agents.
    pub fn reader(&self) -> CollectionReader {
        CollectionReader {
            inner: Arc::clone(&self.inner),
            embedder: Arc::clone(&self.embedder),
        }
    }

    pub fn name(&self) -> String {
        self.inner.read().name.clone()
    }

    /// The id the next added document will get.
    pub fn next_id(&self) -> u64 {
        self.inner.read().next_id
    }

    pub fn query(&self, text: &str, k: usize) -> Vec<QueryHit> {
        self.inner.read().query(self.embedder.as_ref(), text, k)
    }

    pub fn get(&self, id: u64) -> Option<String> {
        let inner = self.inner.read();
        inner.index.get(&id).map(|&pos| inner.entries[pos].document.clone())
    }

    pub fn dump(&self) -> Snapshot {
        self.inner.read().dump()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CollectionReader {
    pub fn name(&self) -> String {
        self.inner.read().name.clone()
    }

    pub fn query(&self, text: &str, k: usize) -> Vec<QueryHit> {
        self.inner.read().query(self.embedder.as_ref(), text, k)
    }

    pub fn get(&self, id: u64) -> Option<String> {
        let inner = self.inner.read();
        inner.index.get(&id).map(|&pos| inner.entries[pos].document.clone())
    }

    /// All documents in insertion order.
    pub fn documents(&self) -> Vec<String> {
        self.inner
            .read()
            .entries
            .iter()
            .map(|e| e.document.clone())
            .collect()
    }

    pub fn dump(&self) -> Snapshot {
        self.inner.read().dump()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Collection")
            .field("name", &inner.name)
            .field("len", &inner.entries.len())
            .field("next_id", &inner.next_id)
            .finish()
    }
}
