use std::path::{Path, PathBuf};

use seedsmith_memory::{Collection, MemoryStore};
use tracing::{info, warn};

use super::{AgentContext, MemoryWriter, RoleTask, SeedPairs};
use crate::conversation::ConversationLoop;
use crate::pipeline::PipelineReport;
use crate::prompts;
use crate::roles::{RoleValue, Schema};
use crate::task::run_task;

const ROLE: &str = "format_analyst";

/// Learns the target's input types and their structure, from documentation
/// and from the seed corpus. Owns `format_spec_db`; records observed
/// sequences in `sequence_db`.
pub struct FormatAnalyst<'a> {
    ctx: &'a AgentContext,
    conversation_loop: &'a ConversationLoop,
    store: &'a MemoryStore,
    format_specs: &'a Collection,
    sequences: &'a Collection,
}

impl<'a> FormatAnalyst<'a> {
    pub fn new(
        ctx: &'a AgentContext,
        conversation_loop: &'a ConversationLoop,
        store: &'a MemoryStore,
        format_specs: &'a Collection,
        sequences: &'a Collection,
    ) -> Self {
        Self {
            ctx,
            conversation_loop,
            store,
            format_specs,
            sequences,
        }
    }

    /// Ask for the catalogue of input types. Nothing is committed.
    pub async fn discover_types(&self, report: &mut PipelineReport) -> Vec<String> {
        let task = RoleTask {
            name: "discover input types".into(),
            max_attempts: self.ctx.budgets.type_discovery,
            system: prompts::ANALYST_SYSTEM,
            user: prompts::type_discovery(&self.ctx.target, self.ctx.spec_text.as_deref()),
            schema: Schema::TypeCatalogue,
            writer: None,
            exit_marker: None,
        };
        let outcome = run_task(&task, self.conversation_loop).await;
        report.record(ROLE, &task.name, &outcome);
        match outcome.value() {
            Some(RoleValue::TypeCatalogue { types }) => {
                info!(count = types.len(), ?types, "input types discovered");
                types
            }
            _ => Vec::new(),
        }
    }

    /// One format-specification task per type.
    pub async fn analyze_format_specs(&self, types: &[String], report: &mut PipelineReport) {
        for type_name in types {
            let task = RoleTask {
                name: format!("format spec of {type_name}"),
                max_attempts: self.ctx.budgets.format_spec,
                system: prompts::ANALYST_SYSTEM,
                user: prompts::format_spec(
                    &self.ctx.target,
                    type_name,
                    self.ctx.spec_text.as_deref(),
                ),
                schema: Schema::FormatSpec,
                writer: Some(MemoryWriter::new(self.store, self.format_specs)),
                exit_marker: None,
            };
            let outcome = run_task(&task, self.conversation_loop).await;
            report.record(ROLE, &task.name, &outcome);
        }
    }

    /// Analyse the seed corpus as a whole.
    pub async fn analyze_seeds(&self, report: &mut PipelineReport) {
        let Some(seed_dir) = &self.ctx.seed_dir else {
            info!("no seed corpus, skipping seed analysis");
            return;
        };
        let task = RoleTask {
            name: "analyze seed corpus".into(),
            max_attempts: self.ctx.budgets.seed_analysis,
            system: prompts::ANALYST_SYSTEM,
            user: prompts::seed_analysis(&self.ctx.target, &seed_dir.display().to_string()),
            schema: Schema::FormatSpec,
            writer: Some(MemoryWriter::new(self.store, self.format_specs)),
            exit_marker: None,
        };
        let outcome = run_task(&task, self.conversation_loop).await;
        report.record(ROLE, &task.name, &outcome);
    }

    /// Extract the type sequence realised by each seed file.
    pub async fn extract_sequences(
        &self,
        types: &[String],
        pairs: &mut SeedPairs,
        report: &mut PipelineReport,
    ) {
        let Some(seed_dir) = &self.ctx.seed_dir else {
            return;
        };
        let files = match seed_files(seed_dir) {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %seed_dir.display(), error = %e, "cannot list seed corpus");
                return;
            }
        };

        for file in files {
            let file_name = file.display().to_string();
            info!(file = %file_name, "extracting sequence");
            let task = RoleTask {
                name: format!("sequence of {file_name}"),
                max_attempts: self.ctx.budgets.sequence_extraction,
                system: prompts::ANALYST_SYSTEM,
                user: prompts::sequence_extraction(&self.ctx.target, &file_name, types),
                schema: Schema::Sequence { allowed: types },
                writer: Some(MemoryWriter::new(self.store, self.sequences)),
                exit_marker: None,
            };
            let outcome = run_task(&task, self.conversation_loop).await;
            report.record(ROLE, &task.name, &outcome);
            if let Some(RoleValue::Sequence(steps)) = outcome.value() {
                pairs.insert(file_name, steps);
            }
        }
    }
}

/// Every regular file under `root`, sorted.
fn seed_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.is_file() {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}
