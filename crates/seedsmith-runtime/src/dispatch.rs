use std::sync::Arc;

use futures::future::join_all;
use seedsmith_core::{
    NullSink, OutputSink, Result, RunEvent, ToolCall, ToolPart, ToolResult, ToolServer, ToolSpec,
};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// Retry and size limits applied to every tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Invocations per call before the failure is handed back to the model.
    pub max_retries: u32,
    /// Upper bound on each text part of a successful result, in bytes.
    pub max_result_bytes: usize,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            max_result_bytes: 256_000,
        }
    }
}

/// Executes finalized tool calls against the tool server.
///
/// A call never fails the batch: once its retries are spent the error text
/// becomes the call's result so the model can see it and adapt.
pub struct ToolDispatcher {
    server: Arc<dyn ToolServer>,
    policy: DispatchPolicy,
    sink: Arc<dyn OutputSink>,
}

impl ToolDispatcher {
    pub fn new(server: Arc<dyn ToolServer>, policy: DispatchPolicy) -> Self {
        Self {
            server,
            policy,
            sink: Arc::new(NullSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    /// The tool catalogue to declare to the model.
    pub async fn catalogue(&self) -> Result<Vec<ToolSpec>> {
        self.server.list_tools().await
    }

    /// Run every call concurrently and wait for all of them.
    ///
    /// Returns one result per call, each tagged with its invocation id.
    pub async fn dispatch(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        info!(count = calls.len(), "dispatching tool calls");
        join_all(calls.iter().map(|call| self.dispatch_one(call))).await
    }

    pub async fn dispatch_one(&self, call: &ToolCall) -> ToolResult {
        self.sink.emit(&RunEvent::ToolCallRequested {
            tool_call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            arguments: call.arguments.clone(),
        });

        let result = match call.parse_arguments() {
            Ok(args) => self.invoke(call, args).await,
            Err(e) => {
                warn!(tool = %call.tool_name, error = %e, "tool call arguments are not valid JSON");
                embed(
                    call,
                    &Value::Null,
                    vec![format!("[ERROR] Invalid tool arguments: {e}")],
                    true,
                )
            }
        };

        self.sink.emit(&RunEvent::ToolCallFinished {
            tool_call_id: result.tool_call_id.clone(),
            tool_name: result.tool_name.clone(),
            is_error: result.is_error,
            content: result.content.clone(),
        });
        result
    }

    async fn invoke(&self, call: &ToolCall, args: Value) -> ToolResult {
        let max = self.policy.max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max {
            match self.server.call_tool(&call.tool_name, args.clone()).await {
                Ok(output) if !output.is_error => {
                    debug!(tool = %call.tool_name, attempt, "tool call succeeded");
                    let mut texts = Vec::with_capacity(output.parts.len());
                    for part in output.parts {
                        match part {
                            ToolPart::Text(text) => {
                                texts.push(truncate_utf8(&text, self.policy.max_result_bytes).to_string())
                            }
                            ToolPart::Unsupported(kind) => {
                                warn!(tool = %call.tool_name, kind = %kind, "unsupported tool result part");
                                return embed(
                                    call,
                                    &args,
                                    vec![format!("[ERROR] Unsupported tool result part: {kind}")],
                                    true,
                                );
                            }
                        }
                    }
                    return embed(call, &args, texts, false);
                }
                Ok(output) => {
                    last_error = output.text_content();
                    warn!(tool = %call.tool_name, attempt, max, "tool reported an error");
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(tool = %call.tool_name, attempt, max, error = %e, "tool call failed");
                }
            }
        }

        embed(
            call,
            &args,
            vec![format!(
                "[ERROR] Tool call failed after {max} attempts: {last_error}"
            )],
            true,
        )
    }
}

/// Result payload: the call's own arguments plus `{tool_name: [texts]}`.
fn embed(call: &ToolCall, args: &Value, texts: Vec<String>, is_error: bool) -> ToolResult {
    let mut payload = match args {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("arguments".into(), other.clone());
            map
        }
    };
    payload.insert(
        call.tool_name.clone(),
        Value::Array(texts.into_iter().map(Value::String).collect()),
    );
    ToolResult {
        tool_call_id: call.id.clone(),
        tool_name: call.tool_name.clone(),
        content: Value::Object(payload).to_string(),
        is_error,
    }
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a character.
pub fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_utf8("hello", 10), "hello");
        assert_eq!(truncate_utf8("hello", 3), "hel");
        // 'é' is two bytes
        assert_eq!(truncate_utf8("aé", 2), "a");
        assert_eq!(truncate_utf8("", 0), "");
    }

    #[test]
    fn payload_merges_arguments_and_texts() {
        let call = ToolCall::new("c1", "echo", r#"{"x":1}"#);
        let result = embed(&call, &serde_json::json!({"x": 1}), vec!["ok".into()], false);
        let v: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(v, serde_json::json!({"x": 1, "echo": ["ok"]}));
        assert_eq!(result.tool_call_id, "c1");
    }
}
