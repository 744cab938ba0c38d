use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use seedsmith_core::{Message, MessageContent, Result, Role};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::provider::*;

/// OpenAI-compatible chat-completions provider (OpenAI, Azure, vLLM, ...).
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    provider_name: String,
    request_timeout: Option<Duration>,
}

impl OpenAiProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: "https://api.openai.com/v1".into(),
            provider_name: "openai".into(),
            request_timeout: None,
        }
    }

    /// Use a custom base URL (for Azure, Together, vLLM, etc.)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Abandon a request (including its streamed body) after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

/// Convert a conversation message to the chat-completions wire shape.
fn message_to_json(msg: &Message) -> Vec<Value> {
    match msg.role {
        Role::System => vec![json!({ "role": "system", "content": msg.text_content() })],
        Role::User => vec![json!({ "role": "user", "content": msg.text_content() })],
        Role::Assistant if msg.tool_calls.is_empty() => {
            vec![json!({ "role": "assistant", "content": msg.text_content() })]
        }
        Role::Assistant => {
            let tc: Vec<Value> = msg
                .tool_calls
                .iter()
                .map(|tc| {
                    json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.tool_name,
                            "arguments": tc.arguments,
                        }
                    })
                })
                .collect();
            let text = msg.text_content();
            let content = if text.is_empty() { Value::Null } else { json!(text) };
            vec![json!({ "role": "assistant", "content": content, "tool_calls": tc })]
        }
        Role::Tool => msg
            .content
            .iter()
            .filter_map(|block| match block {
                MessageContent::ToolResult {
                    tool_call_id,
                    content,
                    ..
                } => Some(json!({
                    "role": "tool",
                    "tool_call_id": tool_call_id,
                    "content": content,
                })),
                MessageContent::Text { .. } => None,
            })
            .collect(),
    }
}

/// Build the streaming request body.
pub fn build_request_body(request: &CompletionRequest) -> Value {
    let messages: Vec<Value> = request.messages.iter().flat_map(message_to_json).collect();

    let mut body = json!({
        "model": &request.model,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
        "messages": messages,
        "stream": true,
        "stream_options": { "include_usage": true },
    });

    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    }
                })
            })
            .collect();
        body["tools"] = json!(tools);
        body["tool_choice"] = json!("auto");
    }
    body
}

/// One complete SSE payload line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    Data(String),
    Done,
}

/// Splits a byte stream into SSE `data:` payloads.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters split across network chunks are decoded intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseLine> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim();
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if data == "[DONE]" {
                    lines.push(SseLine::Done);
                } else {
                    lines.push(SseLine::Data(data.to_string()));
                }
            }
        }
        lines
    }
}

/// Translate one `chat.completion.chunk` JSON payload into stream events.
pub fn parse_chunk(data: &str) -> std::result::Result<Vec<StreamEvent>, serde_json::Error> {
    let chunk: Value = serde_json::from_str(data)?;
    let mut events = Vec::new();

    if let Some(message) = chunk["error"]["message"].as_str() {
        events.push(StreamEvent::Error(message.to_string()));
        return Ok(events);
    }

    if let Some(choice) = chunk["choices"].get(0) {
        let delta = &choice["delta"];
        if let Some(text) = delta["content"].as_str()
            && !text.is_empty()
        {
            events.push(StreamEvent::TextDelta(text.to_string()));
        }
        if let Some(tcs) = delta["tool_calls"].as_array() {
            for (pos, tc) in tcs.iter().enumerate() {
                let index = tc["index"].as_u64().unwrap_or(pos as u64) as u32;
                events.push(StreamEvent::ToolCallDelta(ToolCallDelta {
                    index,
                    id: tc["id"].as_str().map(str::to_string),
                    name: tc["function"]["name"].as_str().map(str::to_string),
                    arguments: tc["function"]["arguments"].as_str().map(str::to_string),
                }));
            }
        }
        if let Some(reason) = choice["finish_reason"].as_str() {
            events.push(StreamEvent::Finish(FinishReason::parse(reason)));
        }
    }

    if let Some(usage) = chunk.get("usage").filter(|u| u.is_object()) {
        events.push(StreamEvent::Usage(Usage {
            input_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: usage["completion_tokens"].as_u64().unwrap_or(0) as u32,
        }));
    }
    Ok(events)
}

/// Events of one SSE payload. A payload that does not decode ends the stream
/// with an error: dropping it could silently corrupt tool-call arguments.
pub fn decode_payload(data: &str) -> Vec<StreamEvent> {
    match parse_chunk(data) {
        Ok(events) => events,
        Err(e) => {
            warn!(error = %e, "undecodable SSE payload");
            vec![StreamEvent::Error(format!("undecodable stream payload: {e}"))]
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<mpsc::Receiver<StreamEvent>> {
        let body = build_request_body(request);
        let (tx, rx) = mpsc::channel(256);

        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);
        if let Some(timeout) = self.request_timeout {
            req = req.timeout(timeout);
        }

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "starting completion stream"
        );

        tokio::spawn(async move {
            let resp = match req.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                    return;
                }
            };

            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                let _ = tx
                    .send(StreamEvent::Error(format!("HTTP {status}: {text}")))
                    .await;
                return;
            }

            let mut stream = resp.bytes_stream();
            let mut decoder = SseDecoder::new();
            while let Some(chunk) = stream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                        return;
                    }
                };
                for line in decoder.push(&bytes) {
                    let data = match line {
                        SseLine::Done => return,
                        SseLine::Data(data) => data,
                    };
                    let events = decode_payload(&data);
                    let failed = matches!(events.last(), Some(StreamEvent::Error(_)));
                    for event in events {
                        if tx.send(event).await.is_err() {
                            // Receiver gone; nobody is listening.
                            return;
                        }
                    }
                    if failed {
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seedsmith_core::{ToolCall, ToolResult, ToolSpec};

    #[test]
    fn decoder_handles_split_lines_and_multibyte() {
        let mut dec = SseDecoder::new();
        let payload = "data: {\"x\":\"é\"}\n\ndata: [DONE]\n".as_bytes();
        // Split inside the two-byte 'é'.
        let split = payload.iter().position(|b| *b == 0xC3).unwrap() + 1;
        assert!(dec.push(&payload[..split]).is_empty());
        let lines = dec.push(&payload[split..]);
        assert_eq!(
            lines,
            vec![SseLine::Data("{\"x\":\"é\"}".into()), SseLine::Done]
        );
    }

    #[test]
    fn decoder_ignores_comments() {
        let mut dec = SseDecoder::new();
        assert!(dec.push(b": keep-alive\n\n").is_empty());
    }

    #[test]
    fn parse_chunk_text_and_finish() {
        let events = parse_chunk(
            r#"{"choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#,
        )
        .unwrap();
        assert_eq!(events, vec![StreamEvent::TextDelta("Hel".into())]);

        let events =
            parse_chunk(r#"{"choices":[{"index":0,"delta":{},"finish_reason":"length"}]}"#).unwrap();
        assert_eq!(events, vec![StreamEvent::Finish(FinishReason::Length)]);
    }

    #[test]
    fn parse_chunk_tool_call_fragment() {
        let events = parse_chunk(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"id":"call_9","type":"function","function":{"name":"echo","arguments":"{\"x\""}}]}}]}"#,
        )
        .unwrap();
        assert_eq!(
            events,
            vec![StreamEvent::ToolCallDelta(ToolCallDelta {
                index: 1,
                id: Some("call_9".into()),
                name: Some("echo".into()),
                arguments: Some("{\"x\"".into()),
            })]
        );
    }

    #[test]
    fn parse_chunk_usage_only() {
        let events = parse_chunk(
            r#"{"choices":[],"usage":{"prompt_tokens":12,"completion_tokens":3}}"#,
        )
        .unwrap();
        assert_eq!(
            events,
            vec![StreamEvent::Usage(Usage {
                input_tokens: 12,
                output_tokens: 3
            })]
        );
    }

    #[test]
    fn undecodable_payload_becomes_stream_error() {
        let events = decode_payload(r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"#);
        assert!(matches!(events.as_slice(), [StreamEvent::Error(msg)] if msg.contains("undecodable")));

        let events = decode_payload(r#"{"choices":[{"delta":{"content":"ok"}}]}"#);
        assert_eq!(events, vec![StreamEvent::TextDelta("ok".into())]);
    }

    #[test]
    fn request_body_carries_tools_and_tool_turns() {
        let assistant = Message::tool_calls(vec![ToolCall::new("c1", "echo", r#"{"x":1}"#)]);
        let request = CompletionRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![
                Message::text(Role::System, "sys"),
                Message::text(Role::User, "hi"),
                assistant,
                Message::tool_result(ToolResult {
                    tool_call_id: "c1".into(),
                    tool_name: "echo".into(),
                    content: "1".into(),
                    is_error: false,
                }),
            ],
            tools: vec![ToolSpec {
                name: "echo".into(),
                description: "echo back".into(),
                input_schema: json!({"type": "object"}),
            }],
            max_tokens: 100,
            temperature: 0.2,
        };
        let body = build_request_body(&request);
        assert_eq!(body["stream"], true);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["function"]["name"], "echo");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2]["tool_calls"][0]["function"]["arguments"], r#"{"x":1}"#);
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "c1");
    }
}
