//! `chainwatch run`: drive the watcher over a chain event stream.

use anyhow::{Context, Result};
use chainwatch_abi::MemoryAbiRegistry;
use chainwatch_core::{MessageSink, WatcherBuilder, WatcherConfig};
use chainwatch_sink::{TcpPushSink, WriterSink};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, BufReader};

use crate::replay::JsonLinesSource;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// JSON config file (WatcherConfig); flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Account to watch, as RECEIVER or RECEIVER:ACTION (repeatable)
    #[arg(long = "watch", value_name = "RECEIVER[:ACTION]")]
    pub watch: Vec<String>,

    /// Seconds after which an accepted block is too old to report (-1 = no limit)
    #[arg(long = "watch-age-limit", allow_negative_numbers = true)]
    pub watch_age_limit: Option<i64>,

    /// Push socket to bind, e.g. tcp://127.0.0.1:5556 (empty disables the watcher)
    #[arg(long)]
    pub sender_bind: Option<String>,

    /// Directory of <account>.abi.json files used to decode action data
    #[arg(long)]
    pub abi_dir: Option<PathBuf>,

    /// JSON-lines chain event file (default: stdin)
    #[arg(long)]
    pub events: Option<PathBuf>,

    /// Write notifications to stdout instead of the push socket
    #[arg(long)]
    pub stdout: bool,

    /// Drop pending transactions still unmatched after this many accepted blocks
    #[arg(long)]
    pub pending_horizon: Option<u32>,

    /// Time budget for decoding one action payload, in milliseconds
    #[arg(long)]
    pub decode_budget_ms: Option<u64>,
}

/// Merge the optional config file with command-line overrides.
pub fn resolve_config(args: &RunArgs) -> Result<WatcherConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => WatcherConfig::default(),
    };

    if !args.watch.is_empty() {
        config.watch = args.watch.clone();
    }
    if let Some(secs) = args.watch_age_limit {
        config.age_limit_secs = secs;
    }
    if let Some(bind) = &args.sender_bind {
        config.sender_bind = bind.clone();
    }
    if let Some(blocks) = args.pending_horizon {
        config.pending_horizon_blocks = Some(blocks);
    }
    if let Some(ms) = args.decode_budget_ms {
        config.decode_budget_ms = ms;
    }
    Ok(config)
}

fn load_config(path: &Path) -> Result<WatcherConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
}

pub async fn run(args: RunArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    if !config.is_enabled() && !args.stdout {
        tracing::warn!("No sender bind address configured; watcher disabled");
        return Ok(());
    }

    let registry = MemoryAbiRegistry::new();
    if let Some(dir) = &args.abi_dir {
        let loaded = registry
            .load_directory(dir)
            .with_context(|| format!("loading ABIs from {}", dir.display()))?;
        tracing::info!(loaded, dir = %dir.display(), "ABI registry ready");
    }

    let sink: Box<dyn MessageSink> = if args.stdout {
        Box::new(WriterSink::stdout())
    } else {
        Box::new(TcpPushSink::bind(&config.sender_bind)?)
    };

    let mut watcher = WatcherBuilder::new()
        .config(config)
        .abi_provider(Arc::new(registry))
        .build(sink)
        .context("invalid watcher configuration")?;

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &args.events {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening event stream {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let handled = watcher.run(&mut JsonLinesSource::new(reader)).await?;
    tracing::info!(
        handled,
        published = watcher.publisher().sent(),
        pending = watcher.pending().len(),
        "Watcher finished"
    );
    Ok(())
}
