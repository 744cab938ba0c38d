use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use seedsmith_core::{Result, SeedError};
use seedsmith_memory::{Collection, Embedder, HashingEmbedder, SnapshotStore, names};
use serde_json::{Value, json};
use tokio::process::Command;
use tracing::{debug, info};

use crate::protocol::{CallToolResult, ToolDescriptor};
use crate::server::ToolHandler;

static FENCED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)```").ok());

static JAVA_CLASS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"public\s+class\s+(\w+)").ok());

/// Where the toolbox finds seeds and memory snapshots.
#[derive(Debug, Clone)]
pub struct ToolboxConfig {
    pub seed_dir: PathBuf,
    /// Run directory holding one snapshot directory per collection.
    pub db_dir: PathBuf,
    /// Working directory for `run_command`; the seed directory when unset.
    pub work_dir: Option<PathBuf>,
    pub exec_timeout: Duration,
    pub coverage_k: usize,
    pub embedding_dims: usize,
}

impl ToolboxConfig {
    pub fn new(seed_dir: impl Into<PathBuf>, db_dir: impl Into<PathBuf>) -> Self {
        Self {
            seed_dir: seed_dir.into(),
            db_dir: db_dir.into(),
            work_dir: None,
            exec_timeout: Duration::from_secs(120),
            coverage_k: 3,
            embedding_dims: 512,
        }
    }
}

/// The seed-analysis tools served by `seedsmith serve-tools`.
pub struct SeedToolbox {
    config: ToolboxConfig,
    snapshots: SnapshotStore,
    embedder: Arc<dyn Embedder>,
}

impl SeedToolbox {
    pub fn new(config: ToolboxConfig) -> Self {
        let snapshots = SnapshotStore::new(config.db_dir.clone());
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(config.embedding_dims));
        Self {
            config,
            snapshots,
            embedder,
        }
    }

    pub fn config(&self) -> &ToolboxConfig {
        &self.config
    }

    async fn dispatch(&self, name: &str, args: &Value) -> Result<CallToolResult> {
        match name {
            "list_files" => self.exec_list_files().await,
            "read_seed_file_as_hex" => {
                let bytes = self.read_seed(name, args).await?;
                Ok(CallToolResult::text(hex_lines(&bytes)))
            }
            "read_seed_file_as_ascii_text" => {
                let bytes = self.read_seed(name, args).await?;
                Ok(CallToolResult::text(ascii_text(&bytes)))
            }
            "read_seed_file_as_hex_and_ascii" => {
                let bytes = self.read_seed(name, args).await?;
                Ok(CallToolResult::text(hex_and_ascii(&bytes)))
            }
            "run_command" => self.exec_run_command(args).await,
            "run_code" => self.exec_run_code(args).await,
            "query_memory" => self.exec_query_memory(args).await,
            "coverage_lookup" => self.exec_coverage_lookup(args).await,
            _ => Err(SeedError::ToolNotFound(name.to_string())),
        }
    }

    fn resolve_seed_path(&self, raw: &str) -> PathBuf {
        let path = Path::new(raw);
        if path.is_absolute() || path.exists() {
            return path.to_path_buf();
        }
        self.config.seed_dir.join(path)
    }

    async fn read_seed(&self, tool: &str, args: &Value) -> Result<Vec<u8>> {
        let raw = required_str(tool, args, "file_path")?;
        let path = self.resolve_seed_path(raw);
        tokio::fs::read(&path).await.map_err(|e| SeedError::ToolExecution {
            tool: tool.into(),
            reason: format!("could not read {}: {e}", path.display()),
        })
    }

    async fn exec_list_files(&self) -> Result<CallToolResult> {
        let root = self.config.seed_dir.clone();
        let files = tokio::task::spawn_blocking(move || list_files_recursive(&root))
            .await
            .map_err(|e| SeedError::ToolExecution {
                tool: "list_files".into(),
                reason: e.to_string(),
            })??;
        if files.is_empty() {
            return Ok(CallToolResult::text("No files found."));
        }
        let listing: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
        Ok(CallToolResult::text(listing.join("\n")))
    }

    async fn exec_run_command(&self, args: &Value) -> Result<CallToolResult> {
        let command = required_str("run_command", args, "command")?;
        info!(command, "executing shell command");

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd.current_dir(self.config.work_dir.as_ref().unwrap_or(&self.config.seed_dir));
        let out = self.output("run_command", cmd).await?;

        let text = if out.success {
            format!("Command succeeded.\nOutput:\n{}", out.stdout)
        } else {
            format!(
                "Command failed (exit code {}).\nOutput:\n{}\nError:\n{}",
                out.code, out.stdout, out.stderr
            )
        };
        Ok(CallToolResult::text(text))
    }

    async fn exec_run_code(&self, args: &Value) -> Result<CallToolResult> {
        let language = required_str("run_code", args, "language")?.to_ascii_lowercase();
        let code = unwrap_fenced(required_str("run_code", args, "code")?);
        let dir = tempfile::tempdir()?;
        debug!(language = %language, dir = %dir.path().display(), "running code");

        let mut run = match language.as_str() {
            "python" | "python3" | "py" => {
                let src = dir.path().join("main.py");
                tokio::fs::write(&src, &code).await?;
                let mut cmd = Command::new("python3");
                cmd.arg(&src);
                cmd
            }
            "c" | "cpp" | "c++" => {
                let (ext, compiler) = if language == "c" { ("c", "gcc") } else { ("cpp", "g++") };
                let src = dir.path().join(format!("main.{ext}"));
                let exe = dir.path().join("main");
                tokio::fs::write(&src, &code).await?;
                let mut compile = Command::new(compiler);
                compile.arg(&src).arg("-o").arg(&exe);
                if let Some(failure) = self.compile("run_code", compile).await? {
                    return Ok(failure);
                }
                Command::new(&exe)
            }
            "java" => {
                let class_name = JAVA_CLASS
                    .as_ref()
                    .and_then(|re| re.captures(&code))
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_else(|| "Main".to_string());
                let src = dir.path().join(format!("{class_name}.java"));
                tokio::fs::write(&src, &code).await?;
                let mut compile = Command::new("javac");
                compile.arg(&src);
                if let Some(failure) = self.compile("run_code", compile).await? {
                    return Ok(failure);
                }
                let mut cmd = Command::new("java");
                cmd.arg("-cp").arg(dir.path()).arg(&class_name);
                cmd
            }
            other => {
                return Ok(CallToolResult::error(format!(
                    "unsupported language '{other}' (expected python, c, cpp or java)"
                )));
            }
        };

        run.current_dir(dir.path());
        let out = self.output("run_code", run).await?;
        let text = if out.success {
            format!("Execution succeeded.\nOutput:\n{}", out.stdout)
        } else {
            format!(
                "Execution failed (exit code {}).\nOutput:\n{}\nError:\n{}",
                out.code, out.stdout, out.stderr
            )
        };
        Ok(CallToolResult::text(text))
    }

    /// `Some` carries the report of a failed compilation.
    async fn compile(&self, tool: &str, cmd: Command) -> Result<Option<CallToolResult>> {
        let out = self.output(tool, cmd).await?;
        if out.success {
            return Ok(None);
        }
        Ok(Some(CallToolResult::text(format!(
            "Compilation failed (exit code {}).\nError:\n{}",
            out.code, out.stderr
        ))))
    }

    async fn output(&self, tool: &str, mut cmd: Command) -> Result<ProcessOutput> {
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        let secs = self.config.exec_timeout.as_secs();
        let output = tokio::time::timeout(self.config.exec_timeout, cmd.output())
            .await
            .map_err(|_| SeedError::ToolExecution {
                tool: tool.into(),
                reason: format!("timed out after {secs}s"),
            })?
            .map_err(|e| SeedError::ToolExecution {
                tool: tool.into(),
                reason: e.to_string(),
            })?;
        Ok(ProcessOutput {
            success: output.status.success(),
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn exec_query_memory(&self, args: &Value) -> Result<CallToolResult> {
        let query = required_str("query_memory", args, "query")?;
        let collection = required_str("query_memory", args, "collection")?;
        let n = args["n_results"].as_u64().unwrap_or(5).max(1) as usize;
        if !names::QUERYABLE.contains(&collection) {
            return Ok(CallToolResult::error(format!(
                "unsupported collection '{collection}' (expected one of {})",
                names::QUERYABLE.join(", ")
            )));
        }
        self.search_latest(collection, query, n)
    }

    async fn exec_coverage_lookup(&self, args: &Value) -> Result<CallToolResult> {
        let sequence = required_str("coverage_lookup", args, "sequence")?;
        self.search_latest(names::COVERAGE, sequence, self.config.coverage_k)
    }

    fn search_latest(&self, name: &str, query: &str, k: usize) -> Result<CallToolResult> {
        let Some((revision, snapshot)) = self.snapshots.read_latest(name)? else {
            return Ok(CallToolResult::text(format!("No data in {name}.")));
        };
        let collection = Collection::new(name, Arc::clone(&self.embedder));
        collection.load(&snapshot)?;
        let hits: Vec<Value> = collection
            .query(query, k)
            .into_iter()
            .map(|h| json!({ "id": h.id.to_string(), "document": h.document }))
            .collect();
        debug!(collection = name, revision, hits = hits.len(), "memory query");
        Ok(CallToolResult::text(serde_json::to_string_pretty(&hits)?))
    }
}

struct ProcessOutput {
    success: bool,
    code: i32,
    stdout: String,
    stderr: String,
}

#[async_trait]
impl ToolHandler for SeedToolbox {
    fn server_name(&self) -> &str {
        "seedsmith-tools"
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        let file_arg = json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the seed file, absolute or relative to the seed directory"
                }
            },
            "required": ["file_path"]
        });
        vec![
            ToolDescriptor {
                name: "list_files".into(),
                description: Some("List every file under the seed directory, recursively.".into()),
                input_schema: json!({ "type": "object", "properties": {} }),
            },
            ToolDescriptor {
                name: "read_seed_file_as_hex".into(),
                description: Some(
                    "Read a seed file as space-separated hex bytes, one output line per input line.".into(),
                ),
                input_schema: file_arg.clone(),
            },
            ToolDescriptor {
                name: "read_seed_file_as_ascii_text".into(),
                description: Some("Read a seed file as ASCII text. Non-ASCII bytes are dropped.".into()),
                input_schema: file_arg.clone(),
            },
            ToolDescriptor {
                name: "read_seed_file_as_hex_and_ascii".into(),
                description: Some(
                    "Read a seed file printing printable ASCII as-is and every other byte as two hex digits.".into(),
                ),
                input_schema: file_arg,
            },
            ToolDescriptor {
                name: "run_command".into(),
                description: Some("Run a non-interactive shell command and return its output.".into()),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "command": { "type": "string", "description": "The shell command to run" }
                    },
                    "required": ["command"]
                }),
            },
            ToolDescriptor {
                name: "run_code".into(),
                description: Some(
                    "Compile (if needed) and run a program. Fenced ``` blocks are unwrapped.".into(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "language": { "type": "string", "enum": ["python", "c", "cpp", "java"] },
                        "code": { "type": "string", "description": "Program source" }
                    },
                    "required": ["language", "code"]
                }),
            },
            ToolDescriptor {
                name: "query_memory".into(),
                description: Some(
                    "Search a memory collection for the documents most similar to a query sentence.".into(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "A complete sentence to search for" },
                        "collection": { "type": "string", "enum": names::QUERYABLE },
                        "n_results": { "type": "integer", "minimum": 1, "description": "Number of hits (default: 5)" }
                    },
                    "required": ["query", "collection"]
                }),
            },
            ToolDescriptor {
                name: "coverage_lookup".into(),
                description: Some(format!(
                    "Return the {} recorded coverage entries most relevant to a message sequence.",
                    self.config.coverage_k
                )),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "sequence": { "type": "string", "description": "e.g. \"[MESSAGE1, MESSAGE2]\"" }
                    },
                    "required": ["sequence"]
                }),
            },
        ]
    }

    async fn call(&self, name: &str, arguments: Value) -> CallToolResult {
        match self.dispatch(name, &arguments).await {
            Ok(result) => result,
            Err(e) => CallToolResult::error(e.to_string()),
        }
    }
}

fn required_str<'a>(tool: &str, args: &'a Value, key: &str) -> Result<&'a str> {
    args[key].as_str().ok_or_else(|| SeedError::ToolExecution {
        tool: tool.into(),
        reason: format!("missing '{key}' argument"),
    })
}

fn list_files_recursive(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.is_file() {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

fn is_printable(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | b'\r' | 0x20..=0x7e)
}

/// Space-separated hex bytes, keeping the input's line structure.
pub fn hex_lines(bytes: &[u8]) -> String {
    bytes
        .split(|b| *b == b'\n')
        .map(|line| {
            line.iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The ASCII bytes of `bytes`, everything else dropped.
pub fn ascii_text(bytes: &[u8]) -> String {
    bytes.iter().filter(|b| b.is_ascii()).map(|b| *b as char).collect()
}

/// Printable runs verbatim, other bytes as `xx `, with a space between runs of
/// different kinds.
pub fn hex_and_ascii(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    let mut prev: Option<bool> = None;
    for &b in bytes {
        let printable = is_printable(b);
        if prev.is_some_and(|p| p != printable) {
            out.push(' ');
        }
        if printable {
            out.push(b as char);
        } else {
            out.push_str(&format!("{b:02x} "));
        }
        prev = Some(printable);
    }
    out
}

/// The body of the first fenced block, or the trimmed input when there is none.
pub fn unwrap_fenced(code: &str) -> String {
    FENCED
        .as_ref()
        .and_then(|re| re.captures(code))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| code.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_keeps_lines() {
        assert_eq!(hex_lines(b"AB\n\x00"), "41 42\n00");
        assert_eq!(hex_lines(b""), "");
    }

    #[test]
    fn mixed_rendering_separates_runs() {
        assert_eq!(hex_and_ascii(b"GET\x00\x01/"), "GET 00 01  /");
        assert_eq!(hex_and_ascii(b"\xff"), "ff ");
    }

    #[test]
    fn ascii_drops_high_bytes() {
        assert_eq!(ascii_text(b"a\xc3\xa9b\x01"), "ab\x01");
    }

    #[test]
    fn fenced_code_is_unwrapped() {
        assert_eq!(unwrap_fenced("```python\nprint(1)\n```"), "print(1)");
        assert_eq!(unwrap_fenced("```c++\nint main(){}\n```"), "int main(){}");
        assert_eq!(unwrap_fenced("  print(2)  "), "print(2)");
    }
}
