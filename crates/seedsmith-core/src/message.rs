use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SeedError};
use crate::tool::{ToolCall, ToolResult};

/// A message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: Vec<MessageContent>,
    pub timestamp: DateTime<Utc>,
    /// Tool calls requested by the assistant in this message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single content block within a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    ToolResult {
        tool_call_id: String,
        content: String,
        is_error: bool,
    },
}

impl Message {
    /// Create a simple text message.
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: vec![MessageContent::Text { text: text.into() }],
            timestamp: Utc::now(),
            tool_calls: vec![],
        }
    }

    /// An assistant turn that requests tool invocations instead of answering.
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            content: vec![],
            timestamp: Utc::now(),
            tool_calls: calls,
        }
    }

    /// A tool turn carrying one invocation's result.
    pub fn tool_result(result: ToolResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Tool,
            content: vec![MessageContent::ToolResult {
                tool_call_id: result.tool_call_id,
                content: result.content,
                is_error: result.is_error,
            }],
            timestamp: Utc::now(),
            tool_calls: vec![],
        }
    }

    /// Extract all text content joined together.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                MessageContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The invocation id this message answers, for tool turns.
    pub fn tool_call_id(&self) -> Option<&str> {
        self.content.iter().find_map(|c| match c {
            MessageContent::ToolResult { tool_call_id, .. } => Some(tool_call_id.as_str()),
            _ => None,
        })
    }
}

/// The ordered exchange for one logical task.
///
/// Append-only: messages are never edited or removed once pushed. Tool results
/// are only accepted as a complete answer to the assistant turn directly
/// before them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    messages: Vec<Message>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            messages: Vec::new(),
        }
    }

    /// Start a conversation with a system preamble and the first user turn.
    pub fn with_prompt(system: impl Into<String>, user: impl Into<String>) -> Self {
        let mut conv = Self::new();
        conv.push(Message::text(Role::System, system));
        conv.push(Message::text(Role::User, user));
        conv
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Tool calls from the latest assistant turn that have no results yet.
    pub fn pending_tool_calls(&self) -> Option<&[ToolCall]> {
        match self.messages.last() {
            Some(m) if m.role == Role::Assistant && !m.tool_calls.is_empty() => {
                Some(&m.tool_calls)
            }
            _ => None,
        }
    }

    /// True once the assistant has answered with plain text.
    pub fn is_done(&self) -> bool {
        matches!(
            self.messages.last(),
            Some(m) if m.role == Role::Assistant && m.tool_calls.is_empty()
        )
    }

    /// Text of the final assistant answer, if the conversation is done.
    pub fn final_text(&self) -> Option<String> {
        if self.is_done() {
            self.messages.last().map(Message::text_content)
        } else {
            None
        }
    }

    /// Append the results answering the pending tool calls.
    ///
    /// Every pending call must be answered exactly once, matched by invocation
    /// id; results may arrive in any order. Nothing is appended on mismatch.
    pub fn record_tool_results(&mut self, results: Vec<ToolResult>) -> Result<()> {
        let pending = self.pending_tool_calls().ok_or_else(|| {
            SeedError::ProtocolViolation("tool results without a pending tool-call turn".into())
        })?;

        if results.len() != pending.len() {
            return Err(SeedError::ProtocolViolation(format!(
                "{} tool results for {} tool calls",
                results.len(),
                pending.len()
            )));
        }
        let mut unanswered: Vec<&str> = pending.iter().map(|c| c.id.as_str()).collect();
        for result in &results {
            match unanswered.iter().position(|id| *id == result.tool_call_id) {
                Some(pos) => {
                    unanswered.swap_remove(pos);
                }
                None => {
                    return Err(SeedError::ProtocolViolation(format!(
                        "tool result for unknown or duplicate invocation id '{}'",
                        result.tool_call_id
                    )));
                }
            }
        }

        self.messages
            .extend(results.into_iter().map(Message::tool_result));
        Ok(())
    }
}
