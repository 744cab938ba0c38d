#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use seedsmith_core::{SeedError, ToolPart, ToolServer};
    use seedsmith_memory::{Snapshot, SnapshotStore, names};
    use seedsmith_tools::protocol::{CallToolResult, RpcRequest, ToolDescriptor, codes};
    use seedsmith_tools::server::handle_request;
    use seedsmith_tools::*;
    use serde_json::{Value, json};
    use tokio::io::BufReader;

    /// Echoes its `text` argument after sleeping `delay_ms`.
    struct EchoHandler;

    #[async_trait]
    impl ToolHandler for EchoHandler {
        fn server_name(&self) -> &str {
            "echo"
        }

        fn tools(&self) -> Vec<ToolDescriptor> {
            vec![ToolDescriptor {
                name: "echo".into(),
                description: None,
                input_schema: json!({ "type": "object" }),
            }]
        }

        async fn call(&self, _name: &str, arguments: Value) -> CallToolResult {
            let delay = arguments["delay_ms"].as_u64().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            match arguments["text"].as_str() {
                Some(t) => CallToolResult::text(t),
                None => CallToolResult::error("missing text"),
            }
        }
    }

    async fn connect(handler: Arc<dyn ToolHandler>, timeout: Duration) -> StdioToolClient {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_io);
        tokio::spawn(async move {
            let _ = serve(handler, BufReader::new(server_read), server_write).await;
        });
        let (client_read, client_write) = tokio::io::split(client_io);
        StdioToolClient::connect(client_read, client_write, timeout)
            .await
            .unwrap()
    }

    fn toolbox(seed_dir: &std::path::Path, db_dir: &std::path::Path) -> SeedToolbox {
        let mut config = ToolboxConfig::new(seed_dir, db_dir);
        config.embedding_dims = 256;
        config.exec_timeout = Duration::from_secs(20);
        SeedToolbox::new(config)
    }

    // ── Protocol tests ─────────────────────────────────────────

    #[tokio::test]
    async fn test_initialize_reports_server_name() {
        let req = RpcRequest::new(1, "initialize", Some(json!({})));
        let resp = handle_request(&EchoHandler, req).await.unwrap();
        assert_eq!(resp.id, Some(json!(1)));
        assert_eq!(resp.result.unwrap()["serverInfo"]["name"], "echo");
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let req = RpcRequest::notification("notifications/initialized", None);
        assert!(handle_request(&EchoHandler, req).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_method_is_rpc_error() {
        let req = RpcRequest::new(7, "resources/list", None);
        let resp = handle_request(&EchoHandler, req).await.unwrap();
        assert_eq!(resp.error.unwrap().code, codes::METHOD_NOT_FOUND);
    }

    #[test]
    fn test_call_result_wire_shape() {
        let v = serde_json::to_value(CallToolResult::error("boom")).unwrap();
        assert_eq!(v, json!({ "content": [{ "type": "text", "text": "boom" }], "isError": true }));
    }

    // ── Client/server tests ────────────────────────────────────

    #[tokio::test]
    async fn test_list_and_call_over_duplex() {
        let client = connect(Arc::new(EchoHandler), Duration::from_secs(5)).await;
        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "echo");
        assert_eq!(tools[0].description, "");

        let out = client.call_tool("echo", json!({ "text": "hi" })).await.unwrap();
        assert!(!out.is_error);
        assert_eq!(out.parts, vec![ToolPart::Text("hi".into())]);

        let out = client.call_tool("echo", json!({})).await.unwrap();
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_not_raised() {
        let client = connect(Arc::new(EchoHandler), Duration::from_secs(5)).await;
        let out = client.call_tool("nope", json!({})).await.unwrap();
        assert!(out.is_error);
        assert!(out.text_content().contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_correlated_by_id() {
        let client = Arc::new(connect(Arc::new(EchoHandler), Duration::from_secs(5)).await);
        // Later calls finish first.
        let calls = (0..6u64).map(|i| {
            let client = Arc::clone(&client);
            async move {
                let out = client
                    .call_tool("echo", json!({ "text": format!("call-{i}"), "delay_ms": (6 - i) * 20 }))
                    .await
                    .unwrap();
                (i, out.text_content())
            }
        });
        for (i, text) in futures_join(calls).await {
            assert_eq!(text, format!("call-{i}"));
        }
    }

    async fn futures_join<F, T>(futs: impl Iterator<Item = F>) -> Vec<T>
    where
        F: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let handles: Vec<_> = futs.map(tokio::spawn).collect();
        let mut out = Vec::new();
        for h in handles {
            out.push(h.await.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let client = connect(Arc::new(EchoHandler), Duration::from_millis(200)).await;
        let err = client
            .call_tool("echo", json!({ "text": "late", "delay_ms": 2000 }))
            .await
            .unwrap_err();
        assert!(matches!(err, SeedError::Timeout(_)));
        assert!(err.is_transport());
    }

    // ── Toolbox tests ──────────────────────────────────────────

    #[tokio::test]
    async fn test_toolbox_advertises_every_tool() {
        let dir = tempfile::tempdir().unwrap();
        let tb = toolbox(dir.path(), dir.path());
        let names: Vec<String> = tb.tools().into_iter().map(|t| t.name).collect();
        for expected in [
            "list_files",
            "read_seed_file_as_hex",
            "read_seed_file_as_ascii_text",
            "read_seed_file_as_hex_and_ascii",
            "run_command",
            "run_code",
            "query_memory",
            "coverage_lookup",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
    }

    #[tokio::test]
    async fn test_list_and_read_seed_files() {
        let seeds = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(seeds.path().join("nested")).unwrap();
        std::fs::write(seeds.path().join("a.bin"), b"AB\n\x00").unwrap();
        std::fs::write(seeds.path().join("nested/b.txt"), b"hello").unwrap();
        let tb = toolbox(seeds.path(), seeds.path());

        let listing = tb.call("list_files", json!({})).await;
        let text = &listing.content[0].text.clone().unwrap();
        assert!(text.contains("a.bin"));
        assert!(text.contains("b.txt"));

        let hex = tb
            .call("read_seed_file_as_hex", json!({ "file_path": "a.bin" }))
            .await;
        assert!(!hex.is_error);
        assert_eq!(hex.content[0].text.as_deref(), Some("41 42\n00"));

        let missing = tb
            .call("read_seed_file_as_ascii_text", json!({ "file_path": "zzz" }))
            .await;
        assert!(missing.is_error);
    }

    #[tokio::test]
    async fn test_empty_seed_dir_lists_nothing() {
        let seeds = tempfile::tempdir().unwrap();
        let tb = toolbox(seeds.path(), seeds.path());
        let out = tb.call("list_files", json!({})).await;
        assert_eq!(out.content[0].text.as_deref(), Some("No files found."));
    }

    #[tokio::test]
    async fn test_run_command_reports_exit_code_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let tb = toolbox(dir.path(), dir.path());

        let ok = tb.call("run_command", json!({ "command": "echo hi" })).await;
        assert!(!ok.is_error);
        assert_eq!(ok.content[0].text.as_deref(), Some("Command succeeded.\nOutput:\nhi\n"));

        let failed = tb.call("run_command", json!({ "command": "exit 3" })).await;
        assert!(!failed.is_error);
        assert!(failed.content[0].text.as_deref().unwrap().starts_with("Command failed (exit code 3)"));

        let bad = tb.call("run_command", json!({})).await;
        assert!(bad.is_error);
    }

    #[tokio::test]
    async fn test_run_code_rejects_unknown_language() {
        let dir = tempfile::tempdir().unwrap();
        let tb = toolbox(dir.path(), dir.path());
        let out = tb
            .call("run_code", json!({ "language": "cobol", "code": "DISPLAY 'HI'." }))
            .await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn test_query_memory_reads_latest_snapshot() {
        let db = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(db.path());
        let old = Snapshot {
            ids: vec!["0".into()],
            documents: vec!["stale USER message".into()],
        };
        let new = Snapshot {
            ids: vec!["0".into(), "1".into()],
            documents: vec![
                r#"{"1": "USER", "2": "PASS"}"#.into(),
                r#"{"1": "RETR"}"#.into(),
            ],
        };
        store.write(names::SEQUENCE, 1, &old).unwrap();
        store.write(names::SEQUENCE, 2, &new).unwrap();

        let tb = toolbox(db.path(), db.path());
        let out = tb
            .call(
                "query_memory",
                json!({ "query": r#"{"1": "USER", "2": "PASS"}"#, "collection": names::SEQUENCE, "n_results": 1 }),
            )
            .await;
        assert!(!out.is_error);
        let hits: Value = serde_json::from_str(out.content[0].text.as_deref().unwrap()).unwrap();
        assert_eq!(hits.as_array().unwrap().len(), 1);
        assert_eq!(hits[0]["id"], "0");
        assert_eq!(hits[0]["document"], r#"{"1": "USER", "2": "PASS"}"#);
    }

    #[tokio::test]
    async fn test_query_memory_rejects_other_collections() {
        let db = tempfile::tempdir().unwrap();
        let tb = toolbox(db.path(), db.path());
        let out = tb
            .call("query_memory", json!({ "query": "x", "collection": names::COVERAGE }))
            .await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn test_coverage_lookup_without_data() {
        let db = tempfile::tempdir().unwrap();
        let tb = toolbox(db.path(), db.path());
        let out = tb
            .call("coverage_lookup", json!({ "sequence": "[USER, PASS]" }))
            .await;
        assert!(!out.is_error);
        assert_eq!(out.content[0].text.as_deref(), Some("No data in coverage_db."));
    }
}
