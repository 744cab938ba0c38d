//! # seedsmith-core
//!
//! Core types, traits, and primitives shared by every Seedsmith crate:
//! the error taxonomy, conversation messages, tool-call plumbing and the
//! run output sink.

pub mod error;
pub mod message;
pub mod sink;
pub mod tool;

pub use error::{Result, SeedError};
pub use message::{Conversation, Message, MessageContent, Role};
pub use sink::{MemorySink, NullSink, OutputSink, RunEvent, TranscriptSink};
pub use tool::{ToolCall, ToolOutput, ToolPart, ToolResult, ToolServer, ToolSpec};
