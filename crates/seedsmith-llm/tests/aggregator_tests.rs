#[cfg(test)]
mod tests {
    use seedsmith_core::{SeedError, ToolCall};
    use seedsmith_llm::*;

    fn delta(index: u32, id: Option<&str>, name: Option<&str>, args: Option<&str>) -> StreamEvent {
        StreamEvent::ToolCallDelta(ToolCallDelta {
            index,
            id: id.map(str::to_string),
            name: name.map(str::to_string),
            arguments: args.map(str::to_string),
        })
    }

    /// Every merge of `seqs` that keeps each sequence's own order.
    fn interleavings(seqs: &[Vec<StreamEvent>]) -> Vec<Vec<StreamEvent>> {
        if seqs.iter().all(|s| s.is_empty()) {
            return vec![vec![]];
        }
        let mut out = Vec::new();
        for (i, seq) in seqs.iter().enumerate() {
            if let Some((head, rest)) = seq.split_first() {
                let mut remaining = seqs.to_vec();
                remaining[i] = rest.to_vec();
                for mut tail in interleavings(&remaining) {
                    tail.insert(0, head.clone());
                    out.push(tail);
                }
            }
        }
        out
    }

    fn run(events: Vec<StreamEvent>) -> Result<Aggregate, SeedError> {
        let mut agg = StreamAggregator::new();
        for e in events {
            agg.apply(e)?;
        }
        agg.finish()
    }

    // ── Text ───────────────────────────────────────────────────

    #[test]
    fn test_stop_concatenates_text_in_order() {
        let out = run(vec![
            StreamEvent::TextDelta("Hel".into()),
            StreamEvent::TextDelta("lo, ".into()),
            StreamEvent::Usage(Usage { input_tokens: 5, output_tokens: 2 }),
            StreamEvent::TextDelta("world".into()),
            StreamEvent::Finish(FinishReason::Stop),
        ])
        .unwrap();
        assert_eq!(out, Aggregate::Text("Hello, world".into()));
    }

    #[test]
    fn test_stop_ignores_partial_tool_calls() {
        let out = run(vec![
            StreamEvent::TextDelta("answer".into()),
            delta(0, Some("c"), Some("echo"), Some("{")),
            StreamEvent::Finish(FinishReason::Stop),
        ])
        .unwrap();
        assert_eq!(out, Aggregate::Text("answer".into()));
    }

    // ── Tool calls ─────────────────────────────────────────────

    #[test]
    fn test_interleaved_fragments_reassemble_per_index() {
        let a = vec![
            delta(0, Some("call_a"), Some("read_"), None),
            delta(0, None, Some("file"), Some("{\"pa")),
            delta(0, None, None, Some("th\":\"x\"}")),
        ];
        let b = vec![
            delta(1, Some("call_b"), Some("echo"), Some("{\"x\"")),
            delta(1, None, None, Some(":1}")),
        ];
        let c = vec![delta(2, None, Some("list_files"), Some(""))];

        let all = interleavings(&[a, b, c]);
        assert_eq!(all.len(), 60);
        for mut events in all {
            events.push(StreamEvent::Finish(FinishReason::ToolCalls));
            let out = run(events).unwrap();
            assert_eq!(
                out,
                Aggregate::ToolCalls(vec![
                    ToolCall::new("call_a", "read_file", "{\"path\":\"x\"}"),
                    ToolCall::new("call_b", "echo", "{\"x\":1}"),
                    ToolCall::new("tool_2", "list_files", ""),
                ])
            );
        }
    }

    #[test]
    fn test_tool_calls_ordered_by_index_not_arrival() {
        let out = run(vec![
            delta(3, Some("late"), Some("b"), Some("{}")),
            delta(1, Some("early"), Some("a"), Some("{}")),
            StreamEvent::Finish(FinishReason::ToolCalls),
        ])
        .unwrap();
        let Aggregate::ToolCalls(calls) = out else {
            panic!("expected tool calls");
        };
        assert_eq!(calls[0].id, "early");
        assert_eq!(calls[1].id, "late");
    }

    #[test]
    fn test_tool_calls_without_calls_is_violation() {
        let err = run(vec![StreamEvent::Finish(FinishReason::ToolCalls)]).unwrap_err();
        assert!(matches!(err, SeedError::ProtocolViolation(_)));
    }

    #[test]
    fn test_tool_call_without_name_is_violation() {
        let err = run(vec![
            delta(0, Some("c"), None, Some("{}")),
            StreamEvent::Finish(FinishReason::ToolCalls),
        ])
        .unwrap_err();
        assert!(matches!(err, SeedError::ProtocolViolation(_)));
    }

    // ── Terminal reasons ───────────────────────────────────────

    #[test]
    fn test_fatal_terminal_reasons_are_distinct() {
        assert!(matches!(
            run(vec![StreamEvent::Finish(FinishReason::Length)]).unwrap_err(),
            SeedError::OutputTruncated
        ));
        assert!(matches!(
            run(vec![StreamEvent::Finish(FinishReason::ContentFilter)]).unwrap_err(),
            SeedError::ContentFiltered
        ));
        let err = run(vec![StreamEvent::Finish(FinishReason::parse("function_call"))]).unwrap_err();
        assert!(matches!(err, SeedError::ProtocolViolation(ref m) if m.contains("function_call")));
    }

    #[test]
    fn test_missing_finish_is_transport_failure() {
        let err = run(vec![StreamEvent::TextDelta("cut off".into())]).unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_stream_error_is_transport_failure() {
        let err = run(vec![
            StreamEvent::TextDelta("a".into()),
            StreamEvent::Error("connection reset".into()),
        ])
        .unwrap_err();
        assert!(matches!(err, SeedError::Transport(ref m) if m == "connection reset"));
    }

    #[test]
    fn test_finish_reason_parse() {
        assert_eq!(FinishReason::parse("stop"), FinishReason::Stop);
        assert_eq!(FinishReason::parse("tool_calls"), FinishReason::ToolCalls);
        assert_eq!(FinishReason::parse("length"), FinishReason::Length);
        assert_eq!(FinishReason::parse("content_filter"), FinishReason::ContentFilter);
        assert_eq!(FinishReason::parse("eos").as_str(), "eos");
    }

    // ── Through the mock provider ──────────────────────────────

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "mock".into(),
            messages: vec![],
            tools: vec![],
            max_tokens: 10,
            temperature: 0.0,
        }
    }

    #[tokio::test]
    async fn test_mock_text_stream_aggregates() {
        let provider = MockProvider::new().with_text("The quick brown fox jumps");
        let rx = provider.stream(&request()).await.unwrap();
        let out = aggregate(rx).await.unwrap();
        assert_eq!(out, Aggregate::Text("The quick brown fox jumps".into()));
        assert_eq!(provider.request_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_parallel_tool_calls_aggregate() {
        let provider = MockProvider::new().with_tool_calls(&[
            ("1", "echo", r#"{"x":1}"#),
            ("2", "read_seed_file_as_hex", r#"{"path":"seeds/a.bin"}"#),
        ]);
        let rx = provider.stream(&request()).await.unwrap();
        let out = aggregate(rx).await.unwrap();
        assert_eq!(
            out,
            Aggregate::ToolCalls(vec![
                ToolCall::new("1", "echo", r#"{"x":1}"#),
                ToolCall::new("2", "read_seed_file_as_hex", r#"{"path":"seeds/a.bin"}"#),
            ])
        );
    }

    #[tokio::test]
    async fn test_drain_keeps_usage_before_resolution() {
        let provider = MockProvider::new().with_script(vec![
            StreamEvent::TextDelta("cut".into()),
            StreamEvent::Usage(Usage {
                input_tokens: 7,
                output_tokens: 2,
            }),
            StreamEvent::Finish(FinishReason::Length),
        ]);
        let rx = provider.stream(&request()).await.unwrap();
        let agg = drain(rx).await.unwrap();
        assert_eq!(agg.usage().input_tokens, 7);
        assert_eq!(agg.text(), "cut");
        assert!(matches!(agg.finish(), Err(SeedError::OutputTruncated)));
    }

    #[tokio::test]
    async fn test_mock_exhausted_script_is_transport_failure() {
        let provider = MockProvider::new();
        let rx = provider.stream(&request()).await.unwrap();
        assert!(aggregate(rx).await.unwrap_err().is_transport());
    }
}
