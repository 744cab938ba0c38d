//! # seedsmith-cli
//!
//! Command-line interface for the Seedsmith pipeline.
//!
//! ## Commands
//!
//! - `seedsmith run`: Run every agent once against a target
//! - `seedsmith serve-tools`: Serve the seed toolbox over stdio
//! - `seedsmith memory`: Inspect collection snapshots of a run
//! - `seedsmith config`: Show the resolved configuration
//! - `seedsmith completions`: Generate shell completions

pub mod commands;

pub use commands::Cli;
