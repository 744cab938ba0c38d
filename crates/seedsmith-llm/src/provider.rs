use async_trait::async_trait;
use seedsmith_core::{Message, Result, ToolSpec};
use serde::{Deserialize, Serialize};

/// A streaming request to a completion service.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    /// Full conversation so far.
    pub messages: Vec<Message>,
    /// Tool catalogue declared to the model.
    pub tools: Vec<ToolSpec>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Why the service stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
    /// Anything the service sent that we do not recognise.
    Other(String),
}

impl FinishReason {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "stop" => FinishReason::Stop,
            "tool_calls" => FinishReason::ToolCalls,
            "length" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            other => FinishReason::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::Length => "length",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::Other(s) => s,
        }
    }
}

/// An appended fragment of one indexed tool call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallDelta {
    /// Stream position of the call; fragments with the same index belong together.
    pub index: u32,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

/// One incremental event of a streaming response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Appended assistant text.
    TextDelta(String),
    ToolCallDelta(ToolCallDelta),
    /// Terminal reason reported by the service.
    Finish(FinishReason),
    /// Usage stats (usually sent at the end of the stream).
    Usage(Usage),
    /// Transport or API failure mid-stream.
    Error(String),
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    pub fn merge(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// A streaming chat-completion service.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Human-readable name, e.g. "openai".
    fn name(&self) -> &str;

    /// Start a streaming request. The receiver yields events until the stream ends.
    async fn stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<tokio::sync::mpsc::Receiver<StreamEvent>>;
}
