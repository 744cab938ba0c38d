use std::path::Path;
use std::sync::Arc;

use seedsmith_config::SeedsmithConfig;
use seedsmith_memory::{HashingEmbedder, MemoryStore, SnapshotStore};

pub(super) fn cmd_latest(run: &Path, collection: &str) -> seedsmith_core::Result<()> {
    let store = SnapshotStore::new(run);
    match store.read_latest(collection)? {
        Some((revision, snapshot)) => {
            println!("{collection} @ revision {revision} ({} documents)", snapshot.len());
            for (id, document) in snapshot.entries()? {
                println!("  [{id}] {document}");
            }
        }
        None => println!("No data in {collection}."),
    }
    Ok(())
}

pub(super) fn cmd_query(
    config: &SeedsmithConfig,
    run: &Path,
    collection: &str,
    query: &str,
    limit: usize,
) -> seedsmith_core::Result<()> {
    let store = MemoryStore::new(Arc::new(HashingEmbedder::new(config.memory.embedding_dims)));
    let latest = store.open_latest(&SnapshotStore::new(run), collection)?;
    if latest.is_empty() {
        println!("No data in {collection}.");
        return Ok(());
    }
    for hit in latest.query(query, limit) {
        println!("  [{}] {:.3}  {}", hit.id, hit.score, hit.document);
    }
    Ok(())
}
