use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Everything worth showing a human about a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunEvent {
    // ── Run lifecycle ──────────────────────────────────────────
    RunStarted {
        run_id: String,
        target: String,
    },
    RunFinished {
        run_id: String,
        succeeded: usize,
        failed: usize,
    },

    // ── Task lifecycle ─────────────────────────────────────────
    TaskStarted {
        task: String,
        attempt: u32,
        max_attempts: u32,
    },
    TaskFinished {
        task: String,
        outcome: String,
        attempts: u32,
    },

    // ── Conversation ───────────────────────────────────────────
    AssistantText {
        text: String,
    },
    ToolCallRequested {
        tool_call_id: String,
        tool_name: String,
        arguments: String,
    },
    ToolCallFinished {
        tool_call_id: String,
        tool_name: String,
        is_error: bool,
        content: String,
    },

    Notice {
        message: String,
    },
}

impl RunEvent {
    pub fn notice(message: impl Into<String>) -> Self {
        RunEvent::Notice {
            message: message.into(),
        }
    }

    /// Transcript line(s) for this event.
    pub fn render(&self) -> String {
        match self {
            RunEvent::RunStarted { run_id, target } => {
                format!("=== run {run_id} started (target: {target}) ===")
            }
            RunEvent::RunFinished {
                run_id,
                succeeded,
                failed,
            } => format!("=== run {run_id} finished: {succeeded} succeeded, {failed} failed ==="),
            RunEvent::TaskStarted {
                task,
                attempt,
                max_attempts,
            } => format!("* * * [TASK] {task} (attempt {attempt}/{max_attempts})"),
            RunEvent::TaskFinished {
                task,
                outcome,
                attempts,
            } => format!("* * * [TASK] {task}: {outcome} after {attempts} attempt(s)"),
            RunEvent::AssistantText { text } => format!("[assistant]\n{text}"),
            RunEvent::ToolCallRequested {
                tool_call_id,
                tool_name,
                arguments,
            } => format!("[tool call] {tool_name} ({tool_call_id}) {arguments}"),
            RunEvent::ToolCallFinished {
                tool_call_id,
                tool_name,
                is_error,
                content,
            } => {
                let status = if *is_error { "error" } else { "ok" };
                format!("[tool result] {tool_name} ({tool_call_id}) {status}\n{content}")
            }
            RunEvent::Notice { message } => format!("* * * [INFO] {message}"),
        }
    }
}

/// Destination for the human-readable run transcript.
///
/// Opened at run start, written (and flushed) once per event, closed at run end.
pub trait OutputSink: Send + Sync {
    fn emit(&self, event: &RunEvent);

    /// Flush and release the underlying destination. Later events are dropped.
    fn close(&self) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn emit(&self, _event: &RunEvent) {}
}

/// Collects events in memory; used by tests and embedders.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<RunEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().clone()
    }
}

impl OutputSink for MemorySink {
    fn emit(&self, event: &RunEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Appends the transcript to a file, optionally mirroring it to stdout.
pub struct TranscriptSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
    echo_stdout: bool,
}

impl TranscriptSink {
    pub fn open(path: impl AsRef<Path>, echo_stdout: bool) -> crate::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
            echo_stdout,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputSink for TranscriptSink {
    fn emit(&self, event: &RunEvent) {
        let line = event.render();
        if self.echo_stdout {
            println!("{line}");
        }
        let mut guard = self.file.lock();
        if let Some(file) = guard.as_mut() {
            let written = writeln!(file, "{line}").and_then(|_| file.flush());
            if let Err(e) = written {
                tracing::warn!(path = %self.path.display(), error = %e, "transcript write failed");
            }
        }
    }

    fn close(&self) {
        if let Some(mut file) = self.file.lock().take() {
            if let Err(e) = file.flush() {
                tracing::warn!(path = %self.path.display(), error = %e, "transcript flush failed");
            }
        }
    }
}

impl Drop for TranscriptSink {
    fn drop(&mut self) {
        self.close();
    }
}
