//! # seedsmith-llm
//!
//! Streaming access to a chat-completion service. Providers emit raw
//! incremental events; the [`aggregator`] turns one stream into either a final
//! assistant text or a finalized set of tool calls.

pub mod aggregator;
pub mod mock;
pub mod openai;
pub mod provider;

pub use aggregator::{Aggregate, PendingToolCall, StreamAggregator, aggregate, drain};
pub use mock::MockProvider;
pub use openai::OpenAiProvider;
pub use provider::{
    CompletionProvider, CompletionRequest, FinishReason, StreamEvent, ToolCallDelta, Usage,
};
