use std::sync::Arc;

use async_trait::async_trait;
use seedsmith_core::Result;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::protocol::*;

/// Something that can answer `tools/list` and `tools/call`.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn server_name(&self) -> &str;

    fn tools(&self) -> Vec<ToolDescriptor>;

    /// Run one tool. Failures are reported in the result (`is_error`), not raised.
    async fn call(&self, name: &str, arguments: Value) -> CallToolResult;
}

/// Answer a single request. Returns `None` for notifications.
pub async fn handle_request(handler: &dyn ToolHandler, request: RpcRequest) -> Option<RpcResponse> {
    if request.is_notification() {
        debug!(method = %request.method, "notification");
        return None;
    }
    let id = request.id.clone();
    let response = match request.method.as_str() {
        "initialize" => RpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": handler.server_name(),
                    "version": env!("CARGO_PKG_VERSION"),
                }
            }),
        ),
        "ping" => RpcResponse::success(id, json!({})),
        "tools/list" => {
            let result = ListToolsResult {
                tools: handler.tools(),
            };
            match serde_json::to_value(result) {
                Ok(v) => RpcResponse::success(id, v),
                Err(e) => RpcResponse::failure(id, codes::INTERNAL_ERROR, e.to_string()),
            }
        }
        "tools/call" => {
            let params = request.params.unwrap_or(Value::Null);
            match serde_json::from_value::<CallToolParams>(params) {
                Ok(params) => {
                    let known = handler.tools().iter().any(|t| t.name == params.name);
                    let result = if known {
                        handler.call(&params.name, params.arguments).await
                    } else {
                        CallToolResult::error(format!("Unknown tool: {}", params.name))
                    };
                    match serde_json::to_value(result) {
                        Ok(v) => RpcResponse::success(id, v),
                        Err(e) => RpcResponse::failure(id, codes::INTERNAL_ERROR, e.to_string()),
                    }
                }
                Err(e) => RpcResponse::failure(id, codes::INVALID_PARAMS, e.to_string()),
            }
        }
        other => RpcResponse::failure(
            id,
            codes::METHOD_NOT_FOUND,
            format!("Method not found: {other}"),
        ),
    };
    Some(response)
}

/// Serve requests read line by line from `reader`, writing responses to `writer`.
///
/// Requests are handled concurrently; responses are written as they complete
/// and correlated by id. Returns when the reader reaches EOF and every
/// in-flight request has been answered.
pub async fn serve<R, W>(handler: Arc<dyn ToolHandler>, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<String>(64);

    let writer_task = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    info!(server = handler.server_name(), "tool server listening on stdio");
    let mut in_flight = JoinSet::new();
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let request = match serde_json::from_str::<RpcRequest>(trimmed) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "unparseable request line");
                let resp = RpcResponse::failure(None, codes::PARSE_ERROR, e.to_string());
                if let Ok(s) = serde_json::to_string(&resp) {
                    let _ = tx.send(s).await;
                }
                continue;
            }
        };

        let handler = Arc::clone(&handler);
        let tx = tx.clone();
        in_flight.spawn(async move {
            if let Some(resp) = handle_request(handler.as_ref(), request).await {
                match serde_json::to_string(&resp) {
                    Ok(s) => {
                        let _ = tx.send(s).await;
                    }
                    Err(e) => warn!(error = %e, "failed to encode response"),
                }
            }
        });

        // Reap finished handlers as we go.
        while in_flight.try_join_next().is_some() {}
    }

    while in_flight.join_next().await.is_some() {}
    drop(tx);
    match writer_task.await {
        Ok(result) => result?,
        Err(e) => warn!(error = %e, "response writer task failed"),
    }
    info!("tool server input closed");
    Ok(())
}
