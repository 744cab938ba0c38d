use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration: maps to `seedsmith.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedsmithConfig {
    pub llm: LlmConfig,
    pub tools: ToolsConfig,
    pub memory: MemoryConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
    pub services: ServicesConfig,
}

// ── LLM ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model identifier sent to the completion endpoint.
    pub model: String,
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// Maximum tokens per response.
    pub max_tokens: u32,
    /// Temperature (0.0 - 2.0).
    pub temperature: f32,
    /// Seconds before a single streaming request is abandoned. 0 = no timeout.
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            base_url: "https://api.openai.com/v1".into(),
            max_tokens: 16384,
            temperature: 0.7,
            request_timeout_secs: 600,
        }
    }
}

// ── Tools ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Tool server executable. `None` runs this binary's `serve-tools` command.
    pub command: Option<String>,
    /// Extra arguments for a custom tool server command.
    pub args: Vec<String>,
    /// Extra environment for the tool server process.
    pub env: HashMap<String, String>,
    /// Attempts per tool call before the error is handed back to the model.
    pub max_retries: u32,
    /// Byte cap for each text part of a tool result.
    pub max_result_bytes: usize,
    /// Seconds to wait for one tool server response.
    pub call_timeout_secs: u64,
    /// Seconds a `run_command` / `run_code` child may run.
    pub exec_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: vec![],
            env: HashMap::new(),
            max_retries: 5,
            max_result_bytes: 256_000,
            call_timeout_secs: 300,
            exec_timeout_secs: 120,
        }
    }
}

// ── Memory ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Embedding vector dimensions for the local hashing embedder.
    pub embedding_dims: usize,
    /// Hits fetched per sequence step when the developer looks up components.
    pub retrieval_k: usize,
    /// Hits returned by the coverage lookup tool.
    pub coverage_k: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            embedding_dims: 512,
            retrieval_k: 5,
            coverage_k: 3,
        }
    }
}

// ── Pipeline ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory that holds one timestamped sub-directory per run.
    pub runs_dir: PathBuf,
    pub budgets: TaskBudgets,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            runs_dir: PathBuf::from("agent_runs"),
            budgets: TaskBudgets::default(),
        }
    }
}

/// Attempt budget per kind of task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskBudgets {
    pub type_discovery: u32,
    pub format_spec: u32,
    pub seed_analysis: u32,
    pub sequence_extraction: u32,
    pub sequence_plan: u32,
    /// Also caps how many components are designed per type.
    pub field_design: u32,
    pub develop: u32,
}

impl Default for TaskBudgets {
    fn default() -> Self {
        Self {
            type_discovery: 3,
            format_spec: 3,
            seed_analysis: 3,
            sequence_extraction: 3,
            sequence_plan: 3,
            field_design: 5,
            develop: 3,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty", "compact" or "json".
    pub format: String,
    /// Mirror the run transcript to stdout as well as `output.log`.
    pub transcript_stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
            transcript_stdout: true,
        }
    }
}

// ── Services ───────────────────────────────────────────────────

/// External service credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// OpenAI API key. Falls back to the OPENAI_API_KEY environment variable.
    pub openai_api_key: Option<String>,
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            WarningSeverity::Error => "error",
            WarningSeverity::Warning => "warning",
            WarningSeverity::Info => "info",
        };
        write!(f, "[{}] {}: {}", tag, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl SeedsmithConfig {
    /// Validate the config and return a list of warnings.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Model ───
        if self.llm.model.trim().is_empty() {
            warnings.push(ConfigWarning {
                field: "llm.model".into(),
                message: "model is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'gpt-4o-mini'".into()),
            });
        }

        if !(self.llm.base_url.starts_with("http://") || self.llm.base_url.starts_with("https://")) {
            warnings.push(ConfigWarning {
                field: "llm.base_url".into(),
                message: format!("'{}' is not an http(s) URL", self.llm.base_url),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'https://api.openai.com/v1'".into()),
            });
        }

        // ── Temperature ───
        if self.llm.temperature < 0.0 || self.llm.temperature > 2.0 {
            warnings.push(ConfigWarning {
                field: "llm.temperature".into(),
                message: format!("temperature {} is out of range", self.llm.temperature),
                severity: WarningSeverity::Error,
                hint: Some("Temperature must be between 0.0 and 2.0".into()),
            });
        }

        // ── Max tokens ───
        if self.llm.max_tokens == 0 {
            warnings.push(ConfigWarning {
                field: "llm.max_tokens".into(),
                message: "max_tokens is 0, the model cannot produce output".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 16384".into()),
            });
        }

        // ── Tool dispatch ───
        if self.tools.max_retries == 0 {
            warnings.push(ConfigWarning {
                field: "tools.max_retries".into(),
                message: "max_retries is 0, no tool call would ever run".into(),
                severity: WarningSeverity::Error,
                hint: Some("Use at least 1 (default 5)".into()),
            });
        }
        if self.tools.max_result_bytes < 1024 {
            warnings.push(ConfigWarning {
                field: "tools.max_result_bytes".into(),
                message: format!("{} bytes is very small for tool output", self.tools.max_result_bytes),
                severity: WarningSeverity::Warning,
                hint: Some("The default is 256000".into()),
            });
        }

        // ── Memory ───
        if self.memory.embedding_dims == 0 {
            warnings.push(ConfigWarning {
                field: "memory.embedding_dims".into(),
                message: "embedding_dims must be positive".into(),
                severity: WarningSeverity::Error,
                hint: None,
            });
        }
        if self.memory.retrieval_k == 0 {
            warnings.push(ConfigWarning {
                field: "memory.retrieval_k".into(),
                message: "retrieval_k is 0, the developer gets no component hints".into(),
                severity: WarningSeverity::Warning,
                hint: Some("The default is 5".into()),
            });
        }

        // ── Budgets ───
        let b = &self.pipeline.budgets;
        for (name, value) in [
            ("type_discovery", b.type_discovery),
            ("format_spec", b.format_spec),
            ("seed_analysis", b.seed_analysis),
            ("sequence_extraction", b.sequence_extraction),
            ("sequence_plan", b.sequence_plan),
            ("field_design", b.field_design),
            ("develop", b.develop),
        ] {
            if value == 0 {
                warnings.push(ConfigWarning {
                    field: format!("pipeline.budgets.{name}"),
                    message: "budget is 0, the task will be skipped as failed".into(),
                    severity: WarningSeverity::Warning,
                    hint: Some("Typical budgets are 3 to 5".into()),
                });
            }
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        // ── API key ───
        if self.services.openai_api_key.is_none() {
            warnings.push(ConfigWarning {
                field: "services.openai_api_key".into(),
                message: "no API key configured".into(),
                severity: WarningSeverity::Info,
                hint: Some("Set services.openai_api_key or export OPENAI_API_KEY".into()),
            });
        }

        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
