use seedsmith_core::{Conversation, RunEvent, SeedError};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::conversation::ConversationLoop;
use crate::extract::extract_json_block;
use crate::roles::ValidationError;

/// One logical decision made by an agent: the prompt to send, how to judge
/// the reply and what to do with an accepted one.
pub trait TaskSpec: Send + Sync {
    type Output: Send;

    fn name(&self) -> &str;

    fn max_attempts(&self) -> u32;

    /// A fresh conversation for `attempt` (1-based). Every attempt starts over.
    fn build_prompt(&self, attempt: u32) -> Conversation;

    /// Check the reply's structured block.
    fn validate(&self, value: Value) -> Result<Self::Output, ValidationError>;

    /// Whether a reply without a structured block means "nothing more to do".
    fn declined(&self, _reply: &str) -> bool {
        false
    }

    /// Persist an accepted value. Called exactly once per successful task.
    fn commit(&self, _output: &Self::Output) {}
}

/// Why a single attempt did not produce an accepted value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptFailure {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("fatal stream termination: {0}")]
    FatalTermination(String),

    #[error("no parseable ```json block in the reply")]
    ResponseParse,

    #[error("validation failed: {0}")]
    Validation(String),
}

impl From<SeedError> for AttemptFailure {
    fn from(e: SeedError) -> Self {
        if e.is_fatal_termination() {
            AttemptFailure::FatalTermination(e.to_string())
        } else {
            AttemptFailure::Transport(e.to_string())
        }
    }
}

/// Final result of a task. Never an error: the pipeline carries on either way.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<T> {
    Success { value: T, attempts: u32 },
    /// The model said there was nothing (more) to contribute.
    Declined { attempts: u32 },
    /// Every attempt failed; the last failure is kept for the report.
    Failed { attempts: u32, last_failure: AttemptFailure },
}

impl<T> TaskOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            TaskOutcome::Success { attempts, .. }
            | TaskOutcome::Declined { attempts }
            | TaskOutcome::Failed { attempts, .. } => *attempts,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskOutcome::Success { .. } => "success",
            TaskOutcome::Declined { .. } => "declined",
            TaskOutcome::Failed { .. } => "failed",
        }
    }

    pub fn value(self) -> Option<T> {
        match self {
            TaskOutcome::Success { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// Run `task` with up to `max_attempts` full exchanges.
///
/// Each attempt builds a new prompt, runs the conversation, extracts the
/// ```` ```json ```` block and validates it. Fatal stream terminations are
/// not retried within an attempt; they use one up like any other failure.
pub async fn run_task<T>(task: &T, conversation_loop: &ConversationLoop) -> TaskOutcome<T::Output>
where
    T: TaskSpec + ?Sized,
{
    let sink = conversation_loop.sink();
    let max = task.max_attempts().max(1);
    let mut last_failure = AttemptFailure::ResponseParse;

    for attempt in 1..=max {
        sink.emit(&RunEvent::TaskStarted {
            task: task.name().to_string(),
            attempt,
            max_attempts: max,
        });

        let failure = match attempt_once(task, conversation_loop, attempt).await {
            Ok(Some(value)) => {
                task.commit(&value);
                info!(task = task.name(), attempt, "task succeeded");
                finish(task, conversation_loop, "success", attempt);
                return TaskOutcome::Success {
                    value,
                    attempts: attempt,
                };
            }
            Ok(None) => {
                info!(task = task.name(), attempt, "model declined the task");
                finish(task, conversation_loop, "declined", attempt);
                return TaskOutcome::Declined { attempts: attempt };
            }
            Err(failure) => failure,
        };

        match &failure {
            AttemptFailure::FatalTermination(reason) => warn!(
                task = task.name(),
                attempt,
                max,
                reason = %reason,
                "fatal stream termination, attempt consumed"
            ),
            other => warn!(task = task.name(), attempt, max, failure = %other, "attempt failed"),
        }
        sink.emit(&RunEvent::notice(format!(
            "{} attempt {attempt}/{max} failed: {failure}",
            task.name()
        )));
        last_failure = failure;
    }

    warn!(task = task.name(), attempts = max, "maximum attempts reached, task marked failed");
    finish(task, conversation_loop, "failed", max);
    TaskOutcome::Failed {
        attempts: max,
        last_failure,
    }
}

/// `Ok(None)` means the model declined.
async fn attempt_once<T>(
    task: &T,
    conversation_loop: &ConversationLoop,
    attempt: u32,
) -> Result<Option<T::Output>, AttemptFailure>
where
    T: TaskSpec + ?Sized,
{
    let mut conversation = task.build_prompt(attempt);
    conversation_loop.run(&mut conversation).await?;
    let reply = conversation.final_text().unwrap_or_default();

    match extract_json_block(&reply) {
        Some(value) => task
            .validate(value)
            .map(Some)
            .map_err(|e| AttemptFailure::Validation(e.0)),
        None if task.declined(&reply) => Ok(None),
        None => Err(AttemptFailure::ResponseParse),
    }
}

fn finish<T: TaskSpec + ?Sized>(task: &T, conversation_loop: &ConversationLoop, outcome: &str, attempts: u32) {
    conversation_loop.sink().emit(&RunEvent::TaskFinished {
        task: task.name().to_string(),
        outcome: outcome.to_string(),
        attempts,
    });
}
