use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool advertised by the tool server, as declared to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object.
    pub input_schema: Value,
}

/// A finalized request from the model to call a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub tool_name: String,
    /// Raw argument text as streamed by the model, normally a JSON object.
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, tool_name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments: arguments.into(),
        }
    }

    /// Decode the argument text. An empty payload means "no arguments".
    pub fn parse_arguments(&self) -> serde_json::Result<Value> {
        if self.arguments.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&self.arguments)
    }
}

/// One part of a tool server's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolPart {
    Text(String),
    /// Any non-text part (image, resource, ...) identified by its kind.
    Unsupported(String),
}

/// What the tool server returned for a single invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub parts: Vec<ToolPart>,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![ToolPart::Text(text.into())],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            parts: vec![ToolPart::Text(text.into())],
            is_error: true,
        }
    }

    /// All text parts joined by newlines.
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ToolPart::Text(t) => Some(t.as_str()),
                ToolPart::Unsupported(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The result message produced for one tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub content: String,
    pub is_error: bool,
}

/// A collaborator that serves named tools over some request/response transport.
#[async_trait]
pub trait ToolServer: Send + Sync {
    /// Discover the tool catalogue.
    async fn list_tools(&self) -> crate::Result<Vec<ToolSpec>>;

    /// Invoke one tool. `Ok` with `is_error` set means the tool ran and failed;
    /// `Err` means the transport itself failed.
    async fn call_tool(&self, name: &str, arguments: Value) -> crate::Result<ToolOutput>;
}
