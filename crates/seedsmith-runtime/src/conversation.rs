use std::sync::Arc;

use seedsmith_config::LlmConfig;
use seedsmith_core::{
    Conversation, Message, NullSink, OutputSink, Result, Role, RunEvent, SeedError, ToolCall,
};
use seedsmith_llm::{Aggregate, CompletionProvider, CompletionRequest, Usage, drain};
use tracing::{debug, info, warn};

use crate::dispatch::ToolDispatcher;

/// Model parameters sent with every round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl From<&LlmConfig> for ModelSettings {
    fn from(cfg: &LlmConfig) -> Self {
        Self {
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
        }
    }
}

/// Where a conversation stands between round trips.
#[derive(Debug)]
pub enum LoopState {
    /// Waiting for the model to answer the conversation as it stands.
    AwaitingModel,
    /// The model asked for these calls; their results are due next.
    AwaitingTools(Vec<ToolCall>),
    /// The model answered with text.
    Done,
    /// The round trip ended without a usable answer. Nothing was appended for it.
    Fatal(SeedError),
}

impl LoopState {
    /// Entry state for a conversation: resumes a pending tool turn, and leaves
    /// an answered conversation alone.
    pub fn for_conversation(conversation: &Conversation) -> Self {
        if conversation.is_done() {
            LoopState::Done
        } else if let Some(calls) = conversation.pending_tool_calls() {
            LoopState::AwaitingTools(calls.to_vec())
        } else {
            LoopState::AwaitingModel
        }
    }

    fn label(&self) -> &'static str {
        match self {
            LoopState::AwaitingModel => "awaiting_model",
            LoopState::AwaitingTools(_) => "awaiting_tools",
            LoopState::Done => "done",
            LoopState::Fatal(_) => "fatal",
        }
    }
}

/// What one `run` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    /// Model round trips made.
    pub rounds: u32,
    /// Tool calls dispatched.
    pub tool_calls: u32,
    pub usage: Usage,
}

/// Drives a conversation until the model answers with text.
///
/// There is no cap on the number of round trips; the model decides when to
/// stop asking for tools and callers bound the whole exchange from outside.
pub struct ConversationLoop {
    provider: Arc<dyn CompletionProvider>,
    dispatcher: Arc<ToolDispatcher>,
    settings: ModelSettings,
    sink: Arc<dyn OutputSink>,
}

impl ConversationLoop {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        dispatcher: Arc<ToolDispatcher>,
        settings: ModelSettings,
    ) -> Self {
        Self {
            provider,
            dispatcher,
            settings,
            sink: Arc::new(NullSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn sink(&self) -> &Arc<dyn OutputSink> {
        &self.sink
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Run `conversation` to completion.
    ///
    /// On error the conversation keeps every completed round trip but nothing
    /// from the one that failed.
    pub async fn run(&self, conversation: &mut Conversation) -> Result<LoopSummary> {
        let mut summary = LoopSummary::default();
        let mut state = LoopState::for_conversation(conversation);
        if matches!(state, LoopState::Done) {
            debug!(conversation = %conversation.id, "conversation already answered");
            return Ok(summary);
        }

        let tools = self.dispatcher.catalogue().await?;

        loop {
            debug!(state = state.label(), round = summary.rounds, "conversation loop");
            state = match state {
                LoopState::AwaitingModel => {
                    summary.rounds += 1;
                    match self.round_trip(conversation, &tools, &mut summary).await {
                        Ok(Aggregate::Text(text)) => {
                            self.sink.emit(&RunEvent::AssistantText { text: text.clone() });
                            conversation.push(Message::text(Role::Assistant, text));
                            LoopState::Done
                        }
                        Ok(Aggregate::ToolCalls(calls)) => match duplicate_id(&calls) {
                            Some(id) => LoopState::Fatal(SeedError::ProtocolViolation(format!(
                                "invocation id '{id}' used by more than one tool call"
                            ))),
                            None => {
                                conversation.push(Message::tool_calls(calls.clone()));
                                LoopState::AwaitingTools(calls)
                            }
                        },
                        Err(e) => LoopState::Fatal(e),
                    }
                }
                LoopState::AwaitingTools(calls) => {
                    summary.tool_calls += calls.len() as u32;
                    let results = self.dispatcher.dispatch(&calls).await;
                    match conversation.record_tool_results(results) {
                        Ok(()) => LoopState::AwaitingModel,
                        Err(e) => LoopState::Fatal(e),
                    }
                }
                LoopState::Done => {
                    info!(
                        rounds = summary.rounds,
                        tool_calls = summary.tool_calls,
                        tokens = summary.usage.total_tokens(),
                        "conversation finished"
                    );
                    return Ok(summary);
                }
                LoopState::Fatal(e) => {
                    if e.is_fatal_termination() {
                        warn!(error = %e, round = summary.rounds, "round trip terminated");
                    } else {
                        warn!(error = %e, round = summary.rounds, "round trip failed");
                    }
                    return Err(e);
                }
            };
        }
    }

    async fn round_trip(
        &self,
        conversation: &Conversation,
        tools: &[seedsmith_core::ToolSpec],
        summary: &mut LoopSummary,
    ) -> Result<Aggregate> {
        let request = CompletionRequest {
            model: self.settings.model.clone(),
            messages: conversation.messages().to_vec(),
            tools: tools.to_vec(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };
        let rx = self.provider.stream(&request).await?;
        let agg = drain(rx).await?;
        summary.usage.merge(&agg.usage());
        agg.finish()
    }
}

fn duplicate_id(calls: &[ToolCall]) -> Option<String> {
    calls.iter().enumerate().find_map(|(i, call)| {
        calls[..i]
            .iter()
            .any(|earlier| earlier.id == call.id)
            .then(|| call.id.clone())
    })
}
