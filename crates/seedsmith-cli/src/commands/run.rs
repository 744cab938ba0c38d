use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use seedsmith_config::{ConfigLoader, SeedsmithConfig};
use seedsmith_core::{OutputSink, SeedError, TranscriptSink};
use seedsmith_llm::OpenAiProvider;
use seedsmith_memory::HashingEmbedder;
use seedsmith_runtime::{
    ConversationLoop, DispatchPolicy, ModelSettings, Pipeline, PipelineOptions, RunLayout,
    ToolDispatcher,
};
use seedsmith_tools::{StdioToolClient, ToolServerCommand};
use tracing::{info, warn};

pub(super) struct RunArgs {
    pub target: String,
    pub spec: Option<PathBuf>,
    pub seed_dir: Option<PathBuf>,
    pub resume_from: Option<PathBuf>,
}

pub(super) async fn cmd_run(
    config: SeedsmithConfig,
    config_loader: &ConfigLoader,
    args: RunArgs,
) -> seedsmith_core::Result<()> {
    let api_key = config.services.openai_api_key.clone().ok_or_else(|| {
        SeedError::Config(
            "no API key: set [services] openai_api_key in seedsmith.toml or OPENAI_API_KEY".into(),
        )
    })?;
    let spec_text = match &args.spec {
        Some(path) => Some(std::fs::read_to_string(path)?),
        None => None,
    };
    if let Some(dir) = &args.seed_dir
        && !dir.is_dir()
    {
        return Err(SeedError::Config(format!(
            "seed directory {} does not exist",
            dir.display()
        )));
    }
    if let Some(dir) = &args.resume_from
        && !dir.is_dir()
    {
        return Err(SeedError::Config(format!(
            "run directory {} does not exist",
            dir.display()
        )));
    }

    let layout = RunLayout::create(&config.pipeline.runs_dir, chrono::Local::now())?;
    println!("Seedsmith v{}", env!("CARGO_PKG_VERSION"));
    println!("   Target: {}", args.target);
    println!("   Model:  {}", config.llm.model);
    println!("   Run:    {}", layout.root().display());
    println!();

    let sink = Arc::new(TranscriptSink::open(
        layout.transcript_path(),
        config.logging.transcript_stdout,
    )?);

    let command = tool_server_command(&config, config_loader.path(), &layout, args.seed_dir.as_deref())?;
    let client = Arc::new(
        StdioToolClient::spawn(&command, Duration::from_secs(config.tools.call_timeout_secs)).await?,
    );

    let mut provider = OpenAiProvider::new(api_key).with_base_url(config.llm.base_url.clone());
    if config.llm.request_timeout_secs > 0 {
        provider = provider.with_timeout(Duration::from_secs(config.llm.request_timeout_secs));
    }

    let policy = DispatchPolicy {
        max_retries: config.tools.max_retries,
        max_result_bytes: config.tools.max_result_bytes,
    };
    let dispatcher = ToolDispatcher::new(client.clone(), policy).with_sink(sink.clone());
    let conversation_loop = ConversationLoop::new(
        Arc::new(provider),
        Arc::new(dispatcher),
        ModelSettings::from(&config.llm),
    )
    .with_sink(sink.clone());

    let options = PipelineOptions {
        target: args.target,
        spec_text,
        seed_dir: args.seed_dir.map(std::path::absolute).transpose()?,
        resume_from: args.resume_from,
        budgets: config.pipeline.budgets.clone(),
        retrieval_k: config.memory.retrieval_k,
    };
    let embedder = Arc::new(HashingEmbedder::new(config.memory.embedding_dims));
    let pipeline = Pipeline::new(options, layout.clone(), conversation_loop, embedder);

    let result = pipeline.run().await;
    sink.close();
    client.shutdown();
    let report = result?;

    println!();
    println!(
        "Run {} finished: {} succeeded, {} failed",
        report.run_id,
        report.succeeded(),
        report.failed()
    );
    for seed in &report.seeds {
        println!("   seed: {}", layout.seeds_dir().join(seed).display());
    }
    println!("   report: {}", layout.report_path().display());
    info!(run_dir = %layout.root().display(), "run complete");
    Ok(())
}

/// The configured tool server, or this binary's own `serve-tools`. Either way
/// the server learns the seed and snapshot directories from the environment.
fn tool_server_command(
    config: &SeedsmithConfig,
    config_path: &Path,
    layout: &RunLayout,
    seed_dir: Option<&Path>,
) -> seedsmith_core::Result<ToolServerCommand> {
    let seeds = match seed_dir {
        Some(dir) => std::path::absolute(dir)?,
        None => layout.seeds_dir(),
    };
    let mut env = config.tools.env.clone();
    env.insert("SEEDSMITH_SEED_DIR".into(), seeds.display().to_string());
    env.insert("SEEDSMITH_DB_DIR".into(), layout.root().display().to_string());

    if let Some(program) = &config.tools.command {
        return Ok(ToolServerCommand {
            program: program.clone(),
            args: config.tools.args.clone(),
            env,
        });
    }

    let exe = std::env::current_exe()?;
    let mut args = Vec::new();
    if config_path.exists() {
        args.push("--config".to_string());
        args.push(std::path::absolute(config_path)?.display().to_string());
    } else {
        warn!(path = %config_path.display(), "tool server runs with default configuration");
    }
    args.extend(["--log-level".to_string(), "warn".to_string(), "serve-tools".to_string()]);
    Ok(ToolServerCommand {
        program: exe.display().to_string(),
        args,
        env,
    })
}
