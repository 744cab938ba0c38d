//! # seedsmith-config
//!
//! Configuration for the Seedsmith pipeline. Reads `seedsmith.toml`, then applies
//! environment variable overrides on top.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::SeedsmithConfig;
pub use schema::{
    ConfigWarning, LlmConfig, LoggingConfig, MemoryConfig, PipelineConfig, ServicesConfig,
    TaskBudgets, ToolsConfig, WarningSeverity,
};
