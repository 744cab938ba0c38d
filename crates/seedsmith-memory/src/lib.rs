//! # seedsmith-memory
//!
//! Semantic memory for the agents:
//!
//! - **Collections**: append-only named sets of documents with sequential ids
//!   and similarity search.
//! - **Snapshots**: `{ids, documents}` JSON files, one per revision, used for
//!   crash recovery and for seeding a later run.
//! - **Store**: creates collections and hands out read-only views of them.

pub mod collection;
pub mod embedding;
pub mod snapshot;
pub mod store;

/// Collection names shared by the agents and the tool server.
pub mod names {
    pub const FORMAT_SPEC: &str = "format_spec_db";
    pub const SEQUENCE: &str = "sequence_db";
    pub const COMPONENT: &str = "component_db";
    pub const COVERAGE: &str = "coverage_db";

    /// Collections the model may search through the memory tool.
    pub const QUERYABLE: [&str; 3] = [FORMAT_SPEC, SEQUENCE, COMPONENT];
}

pub use collection::{Collection, CollectionReader, QueryHit};
pub use embedding::{Embedder, HashingEmbedder, cosine_similarity};
pub use snapshot::{Snapshot, SnapshotStore};
pub use store::MemoryStore;
