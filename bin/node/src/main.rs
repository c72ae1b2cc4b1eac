// Portal node entry point

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use portal_common::logging::init_logging;
use portal_common::{ErrorKind, SystemClock};
use portal_config::PlatformConfig;
use portal_node_core::{Intent, Platform, Sweeper};
use portal_storage::FileStore;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Portal node CLI arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Path to the platform configuration file
    #[clap(short, long, value_parser)]
    config: Option<PathBuf>,

    /// Log level, overriding the configuration
    #[clap(long)]
    log_level: Option<String>,

    /// Directory holding the state snapshot
    #[clap(long)]
    data_dir: Option<PathBuf>,

    /// File of JSON-lines intents; stdin when omitted
    #[clap(short, long, value_parser)]
    input: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<PlatformConfig> {
    let mut config = match &args.config {
        Some(path) => PlatformConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => PlatformConfig::from_env().context("Failed to load configuration")?,
    };
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir = Some(dir.clone());
    }
    Ok(config)
}

fn error_line(kind: ErrorKind, message: impl ToString) -> Value {
    json!({ "error": { "kind": kind, "message": message.to_string() } })
}

/// Apply one input line and render its result line
async fn handle_line(platform: &Platform, line: &str) -> Value {
    let intent: Intent = match serde_json::from_str(line) {
        Ok(intent) => intent,
        Err(e) => return error_line(ErrorKind::InvalidInput, format!("malformed intent: {}", e)),
    };
    match platform.apply(intent).await {
        Ok(outcome) => json!({ "ok": outcome }),
        Err(e) => error_line(e.kind(), e),
    }
}

async fn process<R: AsyncBufRead + Unpin>(platform: &Platform, reader: R) -> Result<usize> {
    let mut lines = reader.lines();
    let mut applied = 0;
    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        println!("{}", handle_line(platform, line).await);
        applied += 1;
    }
    Ok(applied)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let _log_guard = init_logging(&config.logging.level, config.logging.dir.as_deref(), "portal-node")
        .context("Failed to initialize logging")?;
    info!("Starting Portal node...");

    let store = config.storage.data_dir.clone().map(FileStore::new);
    let restore = match &store {
        Some(store) => Platform::has_snapshot(store).await?,
        None => false,
    };
    let platform = match &store {
        Some(store) if restore => {
            info!("Restoring state from {:?}", config.storage.data_dir);
            Platform::load_from(store, config.clone(), Arc::new(SystemClock))
                .await
                .context("Failed to restore state")?
        }
        _ => Platform::with_system_clock(config.clone()),
    };
    let platform = Arc::new(platform);
    let sweeper = Sweeper::from_config(Arc::clone(&platform));

    let applied = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            process(&platform, BufReader::new(file)).await?
        }
        None => process(&platform, BufReader::new(tokio::io::stdin())).await?,
    };
    info!("Applied {} intents", applied);

    if let Some(sweeper) = sweeper {
        sweeper.stop().await;
    }
    platform.sweep().await;

    match &store {
        Some(store) => platform.save_to(store).await.context("Failed to save state")?,
        None => warn!("No data directory configured; state is discarded"),
    }

    info!("Portal node shutdown complete");
    Ok(())
}
