//! Doctrine daemon - background pattern scanning and governance state
//!
//! `doctrined` loads the rule bundles, restores overlay state and runs the
//! scan scheduler until interrupted. `--once` runs a single cycle and prints
//! its report.

use anyhow::Context;
use clap::Parser;
use doctrine_engine::{DoctrineConfig, GovernanceEngine, ScanScheduler};
use doctrine_pde::FileHistoryProvider;
use doctrine_registry::FileRuleSource;
use doctrine_store::{BestEffortStore, InMemoryStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Doctrine daemon CLI
#[derive(Parser)]
#[command(name = "doctrined")]
#[command(about = "Doctrine governance daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "DOCTRINE_CONFIG")]
    config: Option<String>,

    /// Rule bundle directory
    #[arg(long, env = "DOCTRINE_BUNDLE_DIR")]
    bundle_dir: Option<PathBuf>,

    /// Canonical rule source file
    #[arg(long, env = "DOCTRINE_RULE_SOURCE")]
    rule_source: Option<PathBuf>,

    /// Per-user history directory
    #[arg(long, env = "DOCTRINE_HISTORY_DIR")]
    history_dir: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "DOCTRINE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "DOCTRINE_LOG_JSON")]
    json: bool,

    /// Run one scan cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = DoctrineConfig::load(cli.config.as_deref()).context("loading configuration")?;

    // Override with CLI args
    if let Some(dir) = cli.bundle_dir {
        config.registry.bundle_dir = dir;
    }
    if let Some(path) = cli.rule_source {
        config.registry.rule_source = path;
    }
    if let Some(dir) = cli.history_dir {
        config.history.dir = dir;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let store = BestEffortStore::new(Arc::new(InMemoryStore::new()));
    let rule_source = Arc::new(FileRuleSource::new(config.registry.rule_source.clone()));
    let engine = Arc::new(GovernanceEngine::new(
        store,
        rule_source,
        config.thresholds.clone(),
    )?);

    let startup = engine
        .initialize(&config.registry.bundle_dir)
        .await
        .with_context(|| format!("loading bundles from {}", config.registry.bundle_dir.display()))?;
    if startup.load.safe_mode {
        tracing::error!(
            mismatches = ?startup.load.mismatches,
            "Started in safe mode: rule content and overlays are halted until bundles are regenerated"
        );
    }

    let provider = Arc::new(FileHistoryProvider::new(
        config.history.dir.clone(),
        config.history.max_events,
    ));
    let scheduler = ScanScheduler::new(
        engine.clone(),
        provider.clone(),
        provider,
        config.scheduler.clone(),
    );

    if cli.once {
        match scheduler.run_once().await {
            Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
            Err(outcome) => tracing::warn!(?outcome, "Scan cycle not run"),
        }
        return Ok(());
    }

    if !config.scheduler.enabled {
        tracing::info!("Scheduler disabled by configuration, nothing to run");
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    scheduler.run(shutdown_rx).await;
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
