use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use seedsmith_core::{Result, SeedError, ToolOutput, ToolServer, ToolSpec};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::protocol::*;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<RpcResponse>>>>;

/// How to launch the tool server process.
#[derive(Debug, Clone)]
pub struct ToolServerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

/// Client for a line-delimited JSON-RPC tool server.
///
/// One connection serves every caller: requests are tagged with fresh ids and
/// a background reader routes each response to whoever is waiting on it.
pub struct StdioToolClient {
    writer: tokio::sync::Mutex<Box<dyn AsyncWrite + Unpin + Send>>,
    pending: PendingMap,
    next_id: AtomicU64,
    timeout: Duration,
    child: Mutex<Option<Child>>,
    reader_task: tokio::task::JoinHandle<()>,
}

impl StdioToolClient {
    /// Launch the server process and complete the handshake.
    pub async fn spawn(command: &ToolServerCommand, timeout: Duration) -> Result<Self> {
        info!(program = %command.program, args = ?command.args, "starting tool server");
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SeedError::ToolProtocol(format!("failed to start '{}': {e}", command.program))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SeedError::ToolProtocol("tool server stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SeedError::ToolProtocol("tool server stdout unavailable".into()))?;

        let client = Self::connect(stdout, stdin, timeout).await?;
        *client.child.lock() = Some(child);
        Ok(client)
    }

    /// Attach to an already-open transport and complete the handshake.
    pub async fn connect<R, W>(reader: R, writer: W, timeout: Duration) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let reader_task = tokio::spawn(read_responses(reader, Arc::clone(&pending)));

        let client = Self {
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            pending,
            next_id: AtomicU64::new(1),
            timeout,
            child: Mutex::new(None),
            reader_task,
        };

        let init = client
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "seedsmith",
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                })),
            )
            .await?;
        debug!(server = %init["serverInfo"]["name"], "tool server initialized");
        client
            .notify("notifications/initialized", None)
            .await?;
        Ok(client)
    }

    async fn write_line(&self, message: &RpcRequest) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| SeedError::Transport(format!("tool server write failed: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| SeedError::Transport(format!("tool server flush failed: {e}")))?;
        Ok(())
    }

    /// Send a request and wait for its response's `result`.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        if let Err(e) = self.write_line(&RpcRequest::new(id, method, params)).await {
            self.pending.lock().remove(&id);
            return Err(e);
        }

        let response = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(_)) => {
                return Err(SeedError::Transport(
                    "tool server closed the connection".into(),
                ));
            }
            Err(_) => {
                self.pending.lock().remove(&id);
                return Err(SeedError::Timeout(format!(
                    "{method} after {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        if let Some(err) = response.error {
            return Err(SeedError::ToolProtocol(format!(
                "{method}: {} ({})",
                err.message, err.code
            )));
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        self.write_line(&RpcRequest::notification(method, params))
            .await
    }

    /// Stop the server process, if this client started one.
    pub fn shutdown(&self) {
        if let Some(mut child) = self.child.lock().take() {
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "failed to stop tool server");
            }
        }
        self.reader_task.abort();
    }
}

impl Drop for StdioToolClient {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

async fn read_responses<R>(reader: R, pending: PendingMap)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let response = match serde_json::from_str::<RpcResponse>(line) {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(error = %e, "ignoring unparseable tool server line");
                        continue;
                    }
                };
                let Some(id) = response.id.as_ref().and_then(Value::as_u64) else {
                    warn!(error = ?response.error, "tool server response without a usable id");
                    continue;
                };
                match pending.lock().remove(&id) {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => debug!(id, "response for an abandoned request"),
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "tool server read failed");
                break;
            }
        }
    }
    // Wake every waiter with a closed channel.
    pending.lock().clear();
}

#[async_trait]
impl ToolServer for StdioToolClient {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>> {
        let result = self.request("tools/list", None).await?;
        let list: ListToolsResult = serde_json::from_value(result)?;
        Ok(list.tools.into_iter().map(ToolSpec::from).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolOutput> {
        let result = self
            .request("tools/call", Some(json!({ "name": name, "arguments": arguments })))
            .await?;
        let result: CallToolResult = serde_json::from_value(result)?;
        Ok(result.into())
    }
}
