use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use seedsmith_core::Result;
use seedsmith_memory::{SnapshotStore, names};
use tracing::debug;

/// Directory tree of one pipeline run:
///
/// ```text
/// <runs_dir>/<YYYYmmdd_HHMMSS>/
///   output.log
///   seeds/
///   format_spec_db/ sequence_db/ component_db/ coverage_db/   <revision>.json
///   seed_sequence_pairs.json
///   report.json
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    /// Create a fresh run directory stamped with `started`. A numeric suffix is
    /// added if a run with the same stamp already exists.
    ///
    /// The root is always absolute: tool servers run in other working
    /// directories and must still land seeds in `seeds/`.
    pub fn create(runs_dir: impl AsRef<Path>, started: DateTime<Local>) -> Result<Self> {
        let stamp = started.format("%Y%m%d_%H%M%S").to_string();
        let runs_dir = std::path::absolute(runs_dir.as_ref())?;
        let mut root = runs_dir.join(&stamp);
        let mut n = 1;
        while root.exists() {
            root = runs_dir.join(format!("{stamp}_{n}"));
            n += 1;
        }
        let layout = Self { root };
        layout.ensure()?;
        Ok(layout)
    }

    /// An existing run directory, e.g. one to resume from.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create every directory of the layout.
    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(self.seeds_dir())?;
        for name in [names::FORMAT_SPEC, names::SEQUENCE, names::COMPONENT, names::COVERAGE] {
            std::fs::create_dir_all(self.collection_dir(name))?;
        }
        debug!(root = %self.root.display(), "run layout ready");
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run identifier: the directory name.
    pub fn run_id(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn transcript_path(&self) -> PathBuf {
        self.root.join("output.log")
    }

    /// Where the developer writes generated seeds.
    pub fn seeds_dir(&self) -> PathBuf {
        self.root.join("seeds")
    }

    pub fn collection_dir(&self, collection: &str) -> PathBuf {
        self.root.join(collection)
    }

    pub fn pairs_path(&self) -> PathBuf {
        self.root.join("seed_sequence_pairs.json")
    }

    pub fn report_path(&self) -> PathBuf {
        self.root.join("report.json")
    }

    /// Snapshot files of this run.
    pub fn snapshots(&self) -> SnapshotStore {
        SnapshotStore::new(self.root.clone())
    }
}
