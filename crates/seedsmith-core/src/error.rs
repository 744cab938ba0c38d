use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the entire Seedsmith pipeline.
#[derive(Error, Debug)]
pub enum SeedError {
    // ── Transport errors ───────────────────────────────────────
    #[error("transport error: {0}")]
    Transport(String),

    #[error("completion provider error: {0}")]
    Provider(String),

    #[error("timed out: {0}")]
    Timeout(String),

    // ── Fatal stream terminations ──────────────────────────────
    #[error("completion truncated by the length limit")]
    OutputTruncated,

    #[error("completion blocked by the content filter")]
    ContentFiltered,

    #[error("stream protocol violation: {0}")]
    ProtocolViolation(String),

    // ── Tool errors ────────────────────────────────────────────
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("tool execution failed: {tool}: {reason}")]
    ToolExecution { tool: String, reason: String },

    #[error("tool protocol error: {0}")]
    ToolProtocol(String),

    // ── Memory errors ──────────────────────────────────────────
    #[error("memory error: {0}")]
    Memory(String),

    #[error("snapshot error: {}: {reason}", path.display())]
    Snapshot { path: PathBuf, reason: String },

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SeedError {
    /// Terminal stream outcomes that end a round trip without a usable answer.
    /// They recur deterministically, so callers count them as a consumed attempt.
    pub fn is_fatal_termination(&self) -> bool {
        matches!(
            self,
            SeedError::OutputTruncated | SeedError::ContentFiltered | SeedError::ProtocolViolation(_)
        )
    }

    /// Network or stream failures that a fresh attempt may get past.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SeedError::Transport(_) | SeedError::Provider(_) | SeedError::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SeedError>;
