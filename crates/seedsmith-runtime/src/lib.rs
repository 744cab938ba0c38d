//! # seedsmith-runtime
//!
//! The orchestration core shared by every agent, and the pipeline that runs
//! the agents in order.
//!
//! ```text
//!   Agent Task Loop  ── build prompt, retry up to max_attempts
//!         │
//!         ▼
//!   Conversation Loop ──────────────┐
//!    AwaitingModel ──► aggregate    │ tool calls
//!         ▲                         ▼
//!         └──────────────── AwaitingTools ──► Tool Dispatcher ──► tool server
//!         │ final text
//!         ▼
//!   Extract ```json block ──► validate (RoleValue) ──► commit to memory
//! ```

pub mod agents;
pub mod conversation;
pub mod dispatch;
pub mod extract;
pub mod layout;
pub mod pipeline;
pub(crate) mod prompts;
pub mod roles;
pub mod task;

pub use conversation::{ConversationLoop, LoopState, LoopSummary, ModelSettings};
pub use dispatch::{DispatchPolicy, ToolDispatcher};
pub use extract::extract_json_block;
pub use layout::RunLayout;
pub use pipeline::{Pipeline, PipelineOptions, PipelineReport, TaskRecord};
pub use roles::{RoleValue, Schema, ValidationError};
pub use task::{AttemptFailure, TaskOutcome, TaskSpec, run_task};
