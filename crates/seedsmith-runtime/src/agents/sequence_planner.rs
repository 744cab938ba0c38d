use std::collections::BTreeMap;

use seedsmith_memory::{Collection, MemoryStore};
use tracing::info;

use super::{AgentContext, MemoryWriter, RoleTask};
use crate::conversation::ConversationLoop;
use crate::pipeline::PipelineReport;
use crate::prompts;
use crate::roles::{RoleValue, Schema};
use crate::task::run_task;

const ROLE: &str = "sequence_planner";

/// Known sequences quoted in the planning prompt.
const KNOWN_SEQUENCES: usize = 20;

/// Proposes a new type sequence and commits it to `sequence_db`.
pub struct SequencePlanner<'a> {
    ctx: &'a AgentContext,
    conversation_loop: &'a ConversationLoop,
    store: &'a MemoryStore,
    sequences: &'a Collection,
}

impl<'a> SequencePlanner<'a> {
    pub fn new(
        ctx: &'a AgentContext,
        conversation_loop: &'a ConversationLoop,
        store: &'a MemoryStore,
        sequences: &'a Collection,
    ) -> Self {
        Self {
            ctx,
            conversation_loop,
            store,
            sequences,
        }
    }

    pub async fn plan(
        &self,
        types: &[String],
        report: &mut PipelineReport,
    ) -> Option<BTreeMap<u32, String>> {
        let known = self.sequences.reader().documents();
        let recent = &known[known.len().saturating_sub(KNOWN_SEQUENCES)..];

        let task = RoleTask {
            name: "plan new sequence".into(),
            max_attempts: self.ctx.budgets.sequence_plan,
            system: prompts::PLANNER_SYSTEM,
            user: prompts::sequence_plan(&self.ctx.target, types, recent),
            schema: Schema::Sequence { allowed: types },
            writer: Some(MemoryWriter::new(self.store, self.sequences)),
            exit_marker: None,
        };
        let outcome = run_task(&task, self.conversation_loop).await;
        report.record(ROLE, &task.name, &outcome);
        match outcome.value() {
            Some(RoleValue::Sequence(steps)) => {
                info!(steps = steps.len(), "sequence planned");
                Some(steps)
            }
            _ => None,
        }
    }
}
