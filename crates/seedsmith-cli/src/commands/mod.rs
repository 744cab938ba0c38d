use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use std::path::PathBuf;

use seedsmith_config::{ConfigLoader, SeedsmithConfig};
use seedsmith_core::SeedError;

mod memory;
mod run;
mod serve;

/// Seedsmith: multi-agent seed generation for fuzz targets
#[derive(Parser)]
#[command(name = "seedsmith", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to seedsmith.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the analyst, planner, designer and developer once against a target
    Run {
        /// Name of the fuzz target (e.g. "libpng", "dns-server")
        #[arg(short, long)]
        target: String,
        /// Reference document describing the input format
        #[arg(short, long)]
        spec: Option<PathBuf>,
        /// Existing seed corpus to learn from
        #[arg(long)]
        seed_dir: Option<PathBuf>,
        /// Previous run directory whose memory this run starts from
        #[arg(long)]
        resume_from: Option<PathBuf>,
    },
    /// Serve the seed toolbox as JSON-RPC over stdin/stdout
    ServeTools {
        /// Directory the file tools read seeds from
        #[arg(long, env = "SEEDSMITH_SEED_DIR")]
        seed_dir: PathBuf,
        /// Run directory holding the collection snapshots
        #[arg(long, env = "SEEDSMITH_DB_DIR")]
        db_dir: PathBuf,
    },
    /// Inspect the memory snapshots of a run
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Print the latest snapshot of a collection
    Latest {
        /// Run directory
        #[arg(short, long)]
        run: PathBuf,
        /// Collection name (format_spec_db, sequence_db, component_db, coverage_db)
        #[arg(long)]
        collection: String,
    },
    /// Similarity search over the latest snapshot of a collection
    Query {
        #[arg(short, long)]
        run: PathBuf,
        #[arg(long)]
        collection: String,
        /// Query text
        #[arg(long)]
        query: String,
        /// Number of results
        #[arg(short = 'n', long, default_value = "5")]
        limit: usize,
    },
}

impl Cli {
    pub async fn run(self) -> seedsmith_core::Result<()> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // Resolve log level: --verbose > --quiet > --log-level > config
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level.as_deref().unwrap_or(&config.logging.level)
        };
        init_tracing(&config, log_level);

        match self.command {
            Commands::Run {
                target,
                spec,
                seed_dir,
                resume_from,
            } => {
                let args = run::RunArgs {
                    target,
                    spec,
                    seed_dir,
                    resume_from,
                };
                run::cmd_run(config, &config_loader, args).await
            }
            Commands::ServeTools { seed_dir, db_dir } => {
                serve::cmd_serve_tools(config, seed_dir, db_dir).await
            }
            Commands::Memory { action } => match action {
                MemoryAction::Latest { run, collection } => memory::cmd_latest(&run, &collection),
                MemoryAction::Query {
                    run,
                    collection,
                    query,
                    limit,
                } => memory::cmd_query(&config, &run, &collection, &query, limit),
            },
            Commands::Config { json } => Self::cmd_config(config, json),
            Commands::Completions { shell } => Self::cmd_completions(shell),
        }
    }

    fn cmd_config(config: SeedsmithConfig, json: bool) -> seedsmith_core::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config).map_err(|e| SeedError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    fn cmd_completions(shell: Shell) -> seedsmith_core::Result<()> {
        generate(shell, &mut Cli::command(), "seedsmith", &mut std::io::stdout());
        Ok(())
    }
}

/// Diagnostics go to stderr: `serve-tools` owns stdout for the protocol and
/// `run` may mirror its transcript there.
fn init_tracing(config: &SeedsmithConfig, log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .with_target(true)
            .init();
    } else if config.logging.format == "compact" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
}
