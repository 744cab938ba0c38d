//! # seedsmith-tools
//!
//! The tool-serving collaborator. Tools are exposed over JSON-RPC 2.0, one
//! message per line, on a child process's stdin/stdout:
//!
//! - [`protocol`]: wire types (`initialize`, `tools/list`, `tools/call`).
//! - [`server`]: the request loop around a [`server::ToolHandler`].
//! - [`client`]: a multiplexing client implementing [`seedsmith_core::ToolServer`].
//! - [`builtin`]: the seed-analysis toolbox served by `seedsmith serve-tools`.

pub mod builtin;
pub mod client;
pub mod protocol;
pub mod server;

pub use builtin::{SeedToolbox, ToolboxConfig};
pub use client::{StdioToolClient, ToolServerCommand};
pub use server::{ToolHandler, serve};
