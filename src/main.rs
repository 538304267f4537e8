//! Cacheflush
//!
//! Moves files from cache drives to the backing pool until each cache
//! drive has the configured amount of free space.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           Cacheflush                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │    Walker    │───▶│  Classifier  │───▶│    Mover     │       │
//! │  │   (Eyes)     │    │   (Brain)    │    │   (Hands)    │       │
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cacheflush::adapters::{CompositeNotifier, LoggingNotifier, PushoverNotifier, StatvfsProbe};
use cacheflush::{FlushConfig, FlushMetrics, Flusher};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Cacheflush - Move cold files from cache drives to the backing pool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML config file (defaults to ./cacheflush.yaml)
    #[arg(long, env = "CACHEFLUSH_CONFIG")]
    config: Option<PathBuf>,

    /// Dry run: classify and log, but do not move anything
    #[arg(long)]
    skipmove: bool,

    /// Treat every file as evictable
    #[arg(long)]
    force: bool,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = FlushConfig::load(args.config.as_deref()).context("Failed to load config")?;
    config.apply_overrides(args.skipmove, args.force);
    config.validate().context("Invalid configuration")?;

    init_logging(&config, args.log_json)?;

    let ctx = config.to_run_context()?;
    info!("Loaded configuration: {:?}", ctx);

    let mut notifier = CompositeNotifier::new().with_notifier(LoggingNotifier::info_level());
    if let Some(pushover) = config.pushover() {
        notifier = notifier.with_notifier(PushoverNotifier::new(pushover)?);
    }

    let flusher = Flusher::new(
        ctx,
        Arc::new(StatvfsProbe::new()),
        Arc::new(notifier),
        FlushMetrics::new()?,
    );

    let report = flusher.run().await;
    match serde_json::to_string(&report) {
        Ok(json) => tracing::debug!(report = %json, "Run report"),
        Err(e) => error!("Failed to serialize run report: {}", e),
    }

    if let Some(path) = &config.metrics_file {
        if let Err(e) = flusher.metrics().write_textfile(path) {
            error!("Failed to write metrics file {}: {}", path.display(), e);
        }
    }

    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(config: &FlushConfig, log_json: bool) -> anyhow::Result<()> {
    let level = if config.debug_logging {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o664)
        .open(&config.log_file)
        .with_context(|| format!("Failed to open log file {}", config.log_file))?;
    let writer = Mutex::new(file);

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    if log_json || config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(writer))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(false).with_target(true).with_writer(writer))
            .init();
    }

    Ok(())
}
