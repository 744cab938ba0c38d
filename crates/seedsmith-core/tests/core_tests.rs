#[cfg(test)]
mod tests {
    use seedsmith_core::*;

    fn results_for(calls: &[(&str, &str)]) -> Vec<ToolResult> {
        calls
            .iter()
            .map(|(id, name)| ToolResult {
                tool_call_id: id.to_string(),
                tool_name: name.to_string(),
                content: "ok".into(),
                is_error: false,
            })
            .collect()
    }

    // ── Message tests ──────────────────────────────────────────

    #[test]
    fn test_message_text_constructor() {
        let msg = Message::text(Role::User, "hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text_content(), "hello");
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn test_tool_result_message_carries_id() {
        let msg = Message::tool_result(ToolResult {
            tool_call_id: "call_7".into(),
            tool_name: "echo".into(),
            content: "hi".into(),
            is_error: false,
        });
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id(), Some("call_7"));
    }

    #[test]
    fn test_role_serde() {
        for role in [Role::System, Role::User, Role::Assistant, Role::Tool] {
            let json = serde_json::to_string(&role).unwrap();
            let restored: Role = serde_json::from_str(&json).unwrap();
            assert_eq!(role, restored);
        }
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }

    // ── Conversation tests ─────────────────────────────────────

    #[test]
    fn test_conversation_prompt_not_done() {
        let conv = Conversation::with_prompt("sys", "do it");
        assert_eq!(conv.len(), 2);
        assert!(!conv.is_done());
        assert!(conv.pending_tool_calls().is_none());
        assert!(conv.final_text().is_none());
    }

    #[test]
    fn test_conversation_done_after_assistant_text() {
        let mut conv = Conversation::with_prompt("sys", "do it");
        conv.push(Message::text(Role::Assistant, "done"));
        assert!(conv.is_done());
        assert_eq!(conv.final_text().as_deref(), Some("done"));
    }

    #[test]
    fn test_record_tool_results_any_order() {
        let mut conv = Conversation::with_prompt("sys", "do it");
        conv.push(Message::tool_calls(vec![
            ToolCall::new("a", "echo", "{}"),
            ToolCall::new("b", "echo", "{}"),
        ]));
        assert_eq!(conv.pending_tool_calls().map(|c| c.len()), Some(2));

        conv.record_tool_results(results_for(&[("b", "echo"), ("a", "echo")]))
            .unwrap();
        assert_eq!(conv.len(), 5);
        assert!(conv.pending_tool_calls().is_none());
        assert!(!conv.is_done());
    }

    #[test]
    fn test_record_tool_results_rejects_mismatch() {
        let mut conv = Conversation::with_prompt("sys", "do it");
        conv.push(Message::tool_calls(vec![ToolCall::new("a", "echo", "{}")]));

        let err = conv
            .record_tool_results(results_for(&[("zzz", "echo")]))
            .unwrap_err();
        assert!(matches!(err, SeedError::ProtocolViolation(_)));
        assert_eq!(conv.len(), 3);

        let err = conv
            .record_tool_results(results_for(&[("a", "echo"), ("a", "echo")]))
            .unwrap_err();
        assert!(matches!(err, SeedError::ProtocolViolation(_)));
        assert_eq!(conv.len(), 3);
    }

    #[test]
    fn test_record_tool_results_without_pending_turn() {
        let mut conv = Conversation::with_prompt("sys", "do it");
        assert!(conv.record_tool_results(vec![]).is_err());
    }

    // ── Tool tests ─────────────────────────────────────────────

    #[test]
    fn test_tool_call_parse_arguments() {
        let call = ToolCall::new("1", "echo", r#"{"x":1}"#);
        assert_eq!(call.parse_arguments().unwrap()["x"], 1);

        let empty = ToolCall::new("2", "list_files", "  ");
        assert!(empty.parse_arguments().unwrap().as_object().unwrap().is_empty());

        let broken = ToolCall::new("3", "echo", r#"{"x":"#);
        assert!(broken.parse_arguments().is_err());
    }

    #[test]
    fn test_tool_output_text_content_skips_unsupported() {
        let out = ToolOutput {
            parts: vec![
                ToolPart::Text("one".into()),
                ToolPart::Unsupported("image".into()),
                ToolPart::Text("two".into()),
            ],
            is_error: false,
        };
        assert_eq!(out.text_content(), "one\ntwo");
        assert!(ToolOutput::error("bad").is_error);
    }

    // ── Error tests ────────────────────────────────────────────

    #[test]
    fn test_error_classification() {
        assert!(SeedError::OutputTruncated.is_fatal_termination());
        assert!(SeedError::ContentFiltered.is_fatal_termination());
        assert!(SeedError::ProtocolViolation("weird".into()).is_fatal_termination());
        assert!(!SeedError::Transport("reset".into()).is_fatal_termination());

        assert!(SeedError::Transport("reset".into()).is_transport());
        assert!(SeedError::Timeout("tools/call".into()).is_transport());
        assert!(!SeedError::ContentFiltered.is_transport());
    }

    #[test]
    fn test_error_display() {
        let err = SeedError::ToolExecution {
            tool: "run_command".into(),
            reason: "exit 2".into(),
        };
        let s = err.to_string();
        assert!(s.contains("run_command"));
        assert!(s.contains("exit 2"));
    }

    // ── Sink tests ─────────────────────────────────────────────

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemorySink::new();
        sink.emit(&RunEvent::notice("hello"));
        sink.emit(&RunEvent::AssistantText { text: "hi".into() });
        assert_eq!(sink.events().len(), 2);
    }

    #[test]
    fn test_transcript_sink_flushes_each_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run").join("output.log");
        let sink = TranscriptSink::open(&path, false).unwrap();

        sink.emit(&RunEvent::notice("first"));
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("first"));

        sink.emit(&RunEvent::ToolCallRequested {
            tool_call_id: "1".into(),
            tool_name: "echo".into(),
            arguments: "{}".into(),
        });
        sink.close();
        sink.emit(&RunEvent::notice("after close"));

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[tool call] echo (1)"));
        assert!(!contents.contains("after close"));
    }
}
