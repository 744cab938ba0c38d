//! The four agent roles. Each one phrases its decisions as [`RoleTask`]s and
//! runs them through the shared task loop.

mod developer;
mod field_designer;
mod format_analyst;
mod sequence_planner;

use std::collections::BTreeMap;
use std::path::PathBuf;

use seedsmith_config::TaskBudgets;
use seedsmith_core::Conversation;
use seedsmith_memory::{Collection, MemoryStore};
use serde_json::Value;
use tracing::{debug, warn};

use crate::layout::RunLayout;
use crate::roles::{RoleValue, Schema, ValidationError};
use crate::task::TaskSpec;

pub use developer::Developer;
pub use field_designer::FieldDesigner;
pub use format_analyst::FormatAnalyst;
pub use sequence_planner::SequencePlanner;

/// Seed file -> the type sequence it realises.
pub type SeedPairs = BTreeMap<String, BTreeMap<u32, String>>;

/// What every agent knows about the run.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub target: String,
    /// Optional user-supplied reference text about the target's format.
    pub spec_text: Option<String>,
    /// Existing seed corpus, if any.
    pub seed_dir: Option<PathBuf>,
    pub layout: RunLayout,
    pub budgets: TaskBudgets,
    /// Component hits considered per sequence step by the developer.
    pub retrieval_k: usize,
}

impl AgentContext {
    pub(crate) fn seed_dir_display(&self) -> String {
        self.seed_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(no seed corpus)".into())
    }
}

/// Appends accepted documents to a collection and snapshots it.
pub struct MemoryWriter<'a> {
    store: &'a MemoryStore,
    collection: &'a Collection,
}

impl<'a> MemoryWriter<'a> {
    pub fn new(store: &'a MemoryStore, collection: &'a Collection) -> Self {
        Self { store, collection }
    }

    /// A failed snapshot is logged; the document stays committed in memory.
    pub fn commit(&self, document: String) {
        let ids = self.collection.add([document]);
        match self.store.persist(self.collection) {
            Ok(Some(path)) => {
                debug!(collection = %self.collection.name(), ?ids, path = %path.display(), "committed")
            }
            Ok(None) => debug!(collection = %self.collection.name(), ?ids, "committed"),
            Err(e) => warn!(
                collection = %self.collection.name(),
                error = %e,
                "snapshot write failed after commit"
            ),
        }
    }
}

/// A task whose reply is one [`RoleValue`].
pub struct RoleTask<'a> {
    pub name: String,
    pub max_attempts: u32,
    pub system: &'static str,
    pub user: String,
    pub schema: Schema<'a>,
    /// Where an accepted value is committed, if anywhere.
    pub writer: Option<MemoryWriter<'a>>,
    /// A reply containing this marker and no block declines the task.
    pub exit_marker: Option<&'static str>,
}

impl TaskSpec for RoleTask<'_> {
    type Output = RoleValue;

    fn name(&self) -> &str {
        &self.name
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn build_prompt(&self, _attempt: u32) -> Conversation {
        Conversation::with_prompt(self.system, self.user.clone())
    }

    fn validate(&self, value: Value) -> Result<RoleValue, ValidationError> {
        RoleValue::parse(self.schema, value)
    }

    fn declined(&self, reply: &str) -> bool {
        self.exit_marker.is_some_and(|m| reply.contains(m))
    }

    fn commit(&self, output: &RoleValue) {
        if let Some(writer) = &self.writer {
            writer.commit(output.to_document());
        }
    }
}
