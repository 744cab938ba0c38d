//! Mock completion provider for deterministic testing.
//!
//! Replays scripted event streams without making any HTTP calls.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use seedsmith_core::Result;
use tokio::sync::mpsc;

use crate::provider::*;

/// A mock provider that replays one scripted stream per request.
///
/// # Example
/// ```
/// use seedsmith_llm::MockProvider;
/// let provider = MockProvider::new()
///     .with_tool_calls(&[("call_1", "list_files", "{}")])
///     .with_text("All done.");
/// ```
#[derive(Default)]
pub struct MockProvider {
    scripts: Mutex<VecDeque<Vec<StreamEvent>>>,
    /// Every request received, for assertions in tests.
    requests: Mutex<Vec<CompletionRequest>>,
}

/// Split `text` into fragments of at most `size` characters.
fn fragments(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw event stream.
    pub fn with_script(self, events: Vec<StreamEvent>) -> Self {
        self.scripts.lock().push_back(events);
        self
    }

    /// Queue a text answer, streamed in small fragments, ending with `stop`.
    pub fn with_text(self, text: &str) -> Self {
        let mut events: Vec<StreamEvent> = fragments(text, 7)
            .into_iter()
            .map(StreamEvent::TextDelta)
            .collect();
        events.push(StreamEvent::Finish(FinishReason::Stop));
        self.with_script(events)
    }

    /// Queue a tool-call turn. Argument fragments of all calls are interleaved
    /// round-robin, the way parallel tool calls arrive from a real service.
    pub fn with_tool_calls(self, calls: &[(&str, &str, &str)]) -> Self {
        let mut events = Vec::new();
        let mut pieces: Vec<VecDeque<String>> = Vec::new();
        for (i, (id, name, args)) in calls.iter().enumerate() {
            events.push(StreamEvent::ToolCallDelta(ToolCallDelta {
                index: i as u32,
                id: Some(id.to_string()),
                name: Some(name.to_string()),
                arguments: None,
            }));
            pieces.push(fragments(args, 3).into());
        }
        loop {
            let mut emitted = false;
            for (i, queue) in pieces.iter_mut().enumerate() {
                if let Some(piece) = queue.pop_front() {
                    events.push(StreamEvent::ToolCallDelta(ToolCallDelta {
                        index: i as u32,
                        id: None,
                        name: None,
                        arguments: Some(piece),
                    }));
                    emitted = true;
                }
            }
            if !emitted {
                break;
            }
        }
        events.push(StreamEvent::Finish(FinishReason::ToolCalls));
        self.with_script(events)
    }

    /// Queue a stream that ends with the given terminal reason after some text.
    pub fn with_finish(self, reason: FinishReason) -> Self {
        self.with_script(vec![
            StreamEvent::TextDelta("partial".into()),
            StreamEvent::Finish(reason),
        ])
    }

    /// Queue a transport failure.
    pub fn with_error(self, message: &str) -> Self {
        self.with_script(vec![StreamEvent::Error(message.to_string())])
    }

    /// All requests made so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Scripts not yet consumed.
    pub fn remaining(&self) -> usize {
        self.scripts.lock().len()
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<mpsc::Receiver<StreamEvent>> {
        self.requests.lock().push(request.clone());
        let script = self
            .scripts
            .lock()
            .pop_front()
            .unwrap_or_else(|| vec![StreamEvent::Error("mock: no more scripted streams".into())]);

        let (tx, rx) = mpsc::channel(script.len().max(1));
        tokio::spawn(async move {
            for event in script {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}
