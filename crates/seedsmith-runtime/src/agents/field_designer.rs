use seedsmith_memory::{Collection, MemoryStore};
use tracing::info;

use super::{AgentContext, MemoryWriter, RoleTask};
use crate::conversation::ConversationLoop;
use crate::pipeline::PipelineReport;
use crate::prompts;
use crate::roles::{RoleValue, Schema};
use crate::task::{TaskOutcome, run_task};

const ROLE: &str = "field_designer";

/// Designs new field features per type, committing each to `component_db`.
pub struct FieldDesigner<'a> {
    ctx: &'a AgentContext,
    conversation_loop: &'a ConversationLoop,
    store: &'a MemoryStore,
    components: &'a Collection,
}

impl<'a> FieldDesigner<'a> {
    pub fn new(
        ctx: &'a AgentContext,
        conversation_loop: &'a ConversationLoop,
        store: &'a MemoryStore,
        components: &'a Collection,
    ) -> Self {
        Self {
            ctx,
            conversation_loop,
            store,
            components,
        }
    }

    /// Up to `field_design` single-attempt design rounds per type. A type is
    /// finished early when the model declines with the exit marker.
    pub async fn design(&self, types: &[String], report: &mut PipelineReport) {
        let rounds = self.ctx.budgets.field_design.max(1);
        for type_name in types {
            let mut previous: Vec<String> = Vec::new();
            for round in 1..=rounds {
                let task = RoleTask {
                    name: format!("design {type_name} ({round}/{rounds})"),
                    max_attempts: 1,
                    system: prompts::DESIGNER_SYSTEM,
                    user: prompts::field_design(
                        &self.ctx.target,
                        type_name,
                        &self.ctx.seed_dir_display(),
                        &previous,
                    ),
                    schema: Schema::FieldDesign,
                    writer: Some(MemoryWriter::new(self.store, self.components)),
                    exit_marker: Some(prompts::EXIT_MARKER),
                };
                let outcome = run_task(&task, self.conversation_loop).await;
                report.record(ROLE, &task.name, &outcome);
                match outcome {
                    TaskOutcome::Success {
                        value: RoleValue::FieldDesign { design, .. },
                        ..
                    } => previous.push(design),
                    TaskOutcome::Declined { .. } => {
                        info!(type_name = %type_name, round, "field designer finished type");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }
}
