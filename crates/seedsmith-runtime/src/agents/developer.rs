use std::collections::BTreeMap;

use seedsmith_memory::CollectionReader;
use tracing::{info, warn};

use super::{AgentContext, RoleTask, SeedPairs};
use crate::conversation::ConversationLoop;
use crate::pipeline::PipelineReport;
use crate::prompts;
use crate::roles::{RoleValue, Schema};
use crate::task::run_task;

const ROLE: &str = "developer";

/// Turns a planned sequence into a seed file under the run's `seeds/`.
pub struct Developer<'a> {
    ctx: &'a AgentContext,
    conversation_loop: &'a ConversationLoop,
    components: CollectionReader,
    sequences: CollectionReader,
}

impl<'a> Developer<'a> {
    pub fn new(
        ctx: &'a AgentContext,
        conversation_loop: &'a ConversationLoop,
        components: CollectionReader,
        sequences: CollectionReader,
    ) -> Self {
        Self {
            ctx,
            conversation_loop,
            components,
            sequences,
        }
    }

    /// Build one seed. `planned` falls back to the newest well-formed entry of
    /// `sequence_db` when the planner produced nothing.
    pub async fn develop(
        &self,
        planned: Option<BTreeMap<u32, String>>,
        pairs: &mut SeedPairs,
        report: &mut PipelineReport,
    ) -> Option<String> {
        let Some(sequence) = planned.or_else(|| self.latest_sequence()) else {
            warn!("no sequence available, skipping seed development");
            return None;
        };

        let output_dir = self.ctx.layout.seeds_dir();
        let task = RoleTask {
            name: "develop seed".into(),
            max_attempts: self.ctx.budgets.develop,
            system: prompts::DEVELOPER_SYSTEM,
            user: prompts::develop(
                &self.ctx.target,
                &self.ctx.seed_dir_display(),
                &output_dir.display().to_string(),
                &sequence,
                &self.instructions(&sequence),
            ),
            schema: Schema::SeedReport {
                seed_dir: &output_dir,
            },
            writer: None,
            exit_marker: None,
        };
        let outcome = run_task(&task, self.conversation_loop).await;
        report.record(ROLE, &task.name, &outcome);

        match outcome.value() {
            Some(RoleValue::SeedReport { seed_name }) => {
                info!(seed = %seed_name, "seed written");
                pairs.insert(seed_name.clone(), sequence);
                Some(seed_name)
            }
            _ => None,
        }
    }

    /// One line per step, each quoting a random pick among the top component hits.
    fn instructions(&self, sequence: &BTreeMap<u32, String>) -> String {
        let mut lines = Vec::with_capacity(sequence.len());
        for (step, type_name) in sequence {
            let query = format!("What is the constraint and feature of {type_name}?");
            let hits = self.components.query(&query, self.ctx.retrieval_k);
            let line = if hits.is_empty() {
                format!("  {step}. {type_name}: no component designed yet")
            } else {
                let pick = &hits[rand::random::<u32>() as usize % hits.len()];
                format!("  {step}. {type_name}: {}", pick.document)
            };
            lines.push(line);
        }
        lines.join("\n")
    }

    fn latest_sequence(&self) -> Option<BTreeMap<u32, String>> {
        self.sequences.documents().iter().rev().find_map(|doc| {
            let value = serde_json::from_str(doc).ok()?;
            match RoleValue::parse(Schema::Sequence { allowed: &[] }, value) {
                Ok(RoleValue::Sequence(steps)) => Some(steps),
                _ => None,
            }
        })
    }
}
