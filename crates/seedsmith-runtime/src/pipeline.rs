use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use seedsmith_config::TaskBudgets;
use seedsmith_core::{Result, RunEvent};
use seedsmith_memory::{Collection, Embedder, MemoryStore, SnapshotStore, names};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::agents::{
    AgentContext, Developer, FieldDesigner, FormatAnalyst, SeedPairs, SequencePlanner,
};
use crate::conversation::ConversationLoop;
use crate::layout::RunLayout;
use crate::task::TaskOutcome;

/// What the caller decides about a run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub target: String,
    pub spec_text: Option<String>,
    pub seed_dir: Option<PathBuf>,
    /// Previous run directory whose latest snapshots seed this run's memory.
    pub resume_from: Option<PathBuf>,
    pub budgets: TaskBudgets,
    pub retrieval_k: usize,
}

impl PipelineOptions {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            spec_text: None,
            seed_dir: None,
            resume_from: None,
            budgets: TaskBudgets::default(),
            retrieval_k: 5,
        }
    }
}

/// One task outcome as it appears in `report.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub role: String,
    pub task: String,
    pub outcome: String,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl TaskRecord {
    pub fn from_outcome<T>(role: &str, task: &str, outcome: &TaskOutcome<T>) -> Self {
        let failure = match outcome {
            TaskOutcome::Failed { last_failure, .. } => Some(last_failure.to_string()),
            _ => None,
        };
        Self {
            role: role.to_string(),
            task: task.to_string(),
            outcome: outcome.label().to_string(),
            attempts: outcome.attempts(),
            failure,
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub target: String,
    pub run_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub types: Vec<String>,
    pub tasks: Vec<TaskRecord>,
    pub seeds: Vec<String>,
    /// Collection name -> document count at the end of the run.
    pub collections: BTreeMap<String, usize>,
}

impl PipelineReport {
    pub fn new(layout: &RunLayout, target: &str) -> Self {
        Self {
            run_id: layout.run_id(),
            target: target.to_string(),
            run_dir: layout.root().to_path_buf(),
            started_at: Utc::now(),
            finished_at: None,
            types: Vec::new(),
            tasks: Vec::new(),
            seeds: Vec::new(),
            collections: BTreeMap::new(),
        }
    }

    pub fn record<T>(&mut self, role: &str, task: &str, outcome: &TaskOutcome<T>) {
        self.tasks.push(TaskRecord::from_outcome(role, task, outcome));
    }

    pub fn succeeded(&self) -> usize {
        self.tasks.iter().filter(|t| t.outcome == "success").count()
    }

    pub fn failed(&self) -> usize {
        self.tasks.iter().filter(|t| t.outcome == "failed").count()
    }
}

/// The full agent sequence for one target:
/// analyst, then planner, then designer, then developer.
pub struct Pipeline {
    options: PipelineOptions,
    layout: RunLayout,
    conversation_loop: ConversationLoop,
    embedder: Arc<dyn Embedder>,
}

impl Pipeline {
    pub fn new(
        options: PipelineOptions,
        layout: RunLayout,
        conversation_loop: ConversationLoop,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            options,
            layout,
            conversation_loop,
            embedder,
        }
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    /// Run every stage. Task failures are recorded, never raised; only I/O on
    /// the run directory itself can fail the run.
    pub async fn run(&self) -> Result<PipelineReport> {
        let sink = Arc::clone(self.conversation_loop.sink());
        let mut report = PipelineReport::new(&self.layout, &self.options.target);
        sink.emit(&RunEvent::RunStarted {
            run_id: report.run_id.clone(),
            target: self.options.target.clone(),
        });
        info!(run_id = %report.run_id, target = %self.options.target, "pipeline started");

        self.layout.ensure()?;
        let store = MemoryStore::new(Arc::clone(&self.embedder)).with_snapshots(self.layout.snapshots());
        let format_specs = store.create(names::FORMAT_SPEC)?;
        let sequences = store.create(names::SEQUENCE)?;
        let components = store.create(names::COMPONENT)?;
        let coverage = store.create(names::COVERAGE)?;
        let collections = [&format_specs, &sequences, &components, &coverage];

        if let Some(from) = &self.options.resume_from {
            self.resume(&store, &collections, from);
        }

        let ctx = AgentContext {
            target: self.options.target.clone(),
            spec_text: self.options.spec_text.clone(),
            seed_dir: self.options.seed_dir.clone(),
            layout: self.layout.clone(),
            budgets: self.options.budgets.clone(),
            retrieval_k: self.options.retrieval_k,
        };
        let mut pairs = SeedPairs::new();

        let analyst = FormatAnalyst::new(
            &ctx,
            &self.conversation_loop,
            &store,
            &format_specs,
            &sequences,
        );
        let types = analyst.discover_types(&mut report).await;
        if types.is_empty() {
            warn!("no input types discovered; later stages run without a type catalogue");
        }
        analyst.analyze_format_specs(&types, &mut report).await;
        analyst.analyze_seeds(&mut report).await;
        analyst.extract_sequences(&types, &mut pairs, &mut report).await;

        let planner = SequencePlanner::new(&ctx, &self.conversation_loop, &store, &sequences);
        let planned = planner.plan(&types, &mut report).await;

        let designer = FieldDesigner::new(&ctx, &self.conversation_loop, &store, &components);
        designer.design(&types, &mut report).await;

        let developer = Developer::new(
            &ctx,
            &self.conversation_loop,
            components.reader(),
            sequences.reader(),
        );
        if let Some(seed) = developer.develop(planned, &mut pairs, &mut report).await {
            report.seeds.push(seed);
        }

        report.types = types;
        for collection in collections {
            report.collections.insert(collection.name(), collection.len());
        }
        report.finished_at = Some(Utc::now());

        std::fs::write(self.layout.pairs_path(), serde_json::to_string_pretty(&pairs)?)?;
        std::fs::write(self.layout.report_path(), serde_json::to_string_pretty(&report)?)?;

        let (succeeded, failed) = (report.succeeded(), report.failed());
        sink.emit(&RunEvent::RunFinished {
            run_id: report.run_id.clone(),
            succeeded,
            failed,
        });
        info!(run_id = %report.run_id, succeeded, failed, seeds = report.seeds.len(), "pipeline finished");
        Ok(report)
    }

    /// Load the latest snapshot of each collection from `from` and re-persist
    /// it here so the tool server, which reads this run's directory, sees it.
    fn resume(&self, store: &MemoryStore, collections: &[&Collection], from: &Path) {
        let previous = SnapshotStore::new(from);
        for collection in collections {
            match store.resume(collection, &previous) {
                Ok(Some(_)) => {
                    if let Err(e) = store.persist(collection) {
                        warn!(collection = %collection.name(), error = %e, "could not re-persist resumed collection");
                    }
                }
                Ok(None) => {
                    info!(collection = %collection.name(), from = %from.display(), "nothing to resume")
                }
                Err(e) => {
                    warn!(collection = %collection.name(), error = %e, "resume failed, starting empty")
                }
            }
        }
    }
}
