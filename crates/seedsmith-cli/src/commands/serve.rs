use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use seedsmith_config::SeedsmithConfig;
use seedsmith_tools::{SeedToolbox, ToolboxConfig, serve};
use tokio::io::BufReader;
use tracing::info;

pub(super) async fn cmd_serve_tools(
    config: SeedsmithConfig,
    seed_dir: PathBuf,
    db_dir: PathBuf,
) -> seedsmith_core::Result<()> {
    let mut toolbox = ToolboxConfig::new(seed_dir, db_dir);
    toolbox.exec_timeout = Duration::from_secs(config.tools.exec_timeout_secs);
    toolbox.coverage_k = config.memory.coverage_k;
    toolbox.embedding_dims = config.memory.embedding_dims;
    info!(seed_dir = %toolbox.seed_dir.display(), db_dir = %toolbox.db_dir.display(), "serving seed tools on stdio");

    let handler = Arc::new(SeedToolbox::new(toolbox));
    serve(handler, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}
