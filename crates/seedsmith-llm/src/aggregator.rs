//! Reconstructs one round trip's outcome from incremental stream events.
//!
//! Text fragments are concatenated in arrival order. Tool-call fragments are
//! keyed by their stream index; fragments for different indices may interleave
//! freely and each index's name and arguments are concatenated in arrival order.

use std::collections::BTreeMap;

use seedsmith_core::{Result, SeedError, ToolCall};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::provider::{FinishReason, StreamEvent, ToolCallDelta, Usage};

/// A tool call still being streamed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingToolCall {
    pub index: u32,
    pub id: Option<String>,
    pub name: String,
    pub arguments: String,
}

impl PendingToolCall {
    fn new(index: u32) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    fn absorb(&mut self, delta: ToolCallDelta) {
        if let Some(id) = delta.id.filter(|id| !id.is_empty()) {
            self.id = Some(id);
        }
        if let Some(name) = delta.name {
            self.name.push_str(&name);
        }
        if let Some(args) = delta.arguments {
            self.arguments.push_str(&args);
        }
    }

    fn finalize(self) -> Result<ToolCall> {
        if self.name.is_empty() {
            return Err(SeedError::ProtocolViolation(format!(
                "tool call at index {} has no name",
                self.index
            )));
        }
        let id = self
            .id
            .unwrap_or_else(|| format!("tool_{}", self.index));
        Ok(ToolCall::new(id, self.name, self.arguments))
    }
}

/// What a completed stream resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregate {
    /// Ordinary completion: the full assistant text.
    Text(String),
    /// Tool invocation: finalized calls ordered by stream index.
    ToolCalls(Vec<ToolCall>),
}

/// Accumulates the events of a single streaming response.
#[derive(Debug, Default)]
pub struct StreamAggregator {
    text: String,
    pending: BTreeMap<u32, PendingToolCall>,
    finish: Option<FinishReason>,
    usage: Usage,
}

impl StreamAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one event. A mid-stream error ends the round trip as a transport failure.
    pub fn apply(&mut self, event: StreamEvent) -> Result<()> {
        match event {
            StreamEvent::TextDelta(text) => self.text.push_str(&text),
            StreamEvent::ToolCallDelta(delta) => {
                let index = delta.index;
                self.pending
                    .entry(index)
                    .or_insert_with(|| PendingToolCall::new(index))
                    .absorb(delta);
            }
            StreamEvent::Finish(reason) => {
                if let Some(previous) = &self.finish {
                    debug!(previous = previous.as_str(), next = reason.as_str(), "finish reason replaced");
                }
                self.finish = Some(reason);
            }
            StreamEvent::Usage(usage) => self.usage.merge(&usage),
            StreamEvent::Error(message) => return Err(SeedError::Transport(message)),
        }
        Ok(())
    }

    /// Text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingToolCall> {
        self.pending.values()
    }

    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Resolve the stream by its terminal reason.
    pub fn finish(self) -> Result<Aggregate> {
        match self.finish {
            Some(FinishReason::Stop) => {
                if !self.pending.is_empty() {
                    warn!(
                        dropped = self.pending.len(),
                        "stream stopped normally, ignoring partial tool calls"
                    );
                }
                Ok(Aggregate::Text(self.text))
            }
            Some(FinishReason::ToolCalls) => {
                if self.pending.is_empty() {
                    return Err(SeedError::ProtocolViolation(
                        "finish reason tool_calls without any tool call".into(),
                    ));
                }
                let calls = self
                    .pending
                    .into_values()
                    .map(PendingToolCall::finalize)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Aggregate::ToolCalls(calls))
            }
            Some(FinishReason::Length) => Err(SeedError::OutputTruncated),
            Some(FinishReason::ContentFilter) => Err(SeedError::ContentFiltered),
            Some(FinishReason::Other(reason)) => Err(SeedError::ProtocolViolation(format!(
                "unrecognized finish reason '{reason}'"
            ))),
            None => Err(SeedError::Transport(
                "stream ended without a finish reason".into(),
            )),
        }
    }
}

/// Drain a provider stream. The returned aggregator is not yet resolved, so
/// callers can read usage before calling [`StreamAggregator::finish`].
pub async fn drain(mut rx: mpsc::Receiver<StreamEvent>) -> Result<StreamAggregator> {
    let mut agg = StreamAggregator::new();
    while let Some(event) = rx.recv().await {
        agg.apply(event)?;
    }
    let usage = agg.usage();
    debug!(
        input_tokens = usage.input_tokens,
        output_tokens = usage.output_tokens,
        "stream complete"
    );
    Ok(agg)
}

/// Drain a provider stream and resolve it.
pub async fn aggregate(rx: mpsc::Receiver<StreamEvent>) -> Result<Aggregate> {
    drain(rx).await?.finish()
}
