//! Driftnet service binary
//!
//! Wires together the storage layer, the worker pool, and the enqueue API,
//! then runs until interrupted.

use anyhow::Context;
use clap::Parser;
use driftnet::api::{self, AppState};
use driftnet::config::load_config_with_hash;
use driftnet::crawler::{spawn_workers, CrawlContext};
use driftnet::storage::SqliteStorage;
use driftnet::{HostLimiters, ProxyPool};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "driftnet", version, about = "Crawl scheduling and fetch service")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "driftnet.toml")]
    config: PathBuf,

    /// Override the API bind address from the config file
    #[arg(long)]
    addr: Option<String>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn setup_logging(verbose: u8, quiet: bool) {
    let default_filter = if quiet {
        "driftnet=warn"
    } else {
        match verbose {
            0 => "driftnet=info,warn",
            1 => "driftnet=debug,info",
            _ => "trace",
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    if let Some(addr) = cli.addr {
        config.http.addr = addr;
    }
    info!(config = %cli.config.display(), hash = %config_hash, "configuration loaded");

    let storage = SqliteStorage::new(Path::new(&config.storage.database_path))
        .with_context(|| format!("failed to open database {}", config.storage.database_path))?;
    let storage = Arc::new(Mutex::new(storage));
    let config = Arc::new(config);
    let proxies = Arc::new(ProxyPool::new(&config.proxies)?);
    let limiters = Arc::new(HostLimiters::new(
        config.crawler.rps_per_host,
        config.crawler.rps_burst,
    ));
    info!(proxies = proxies.len(), "proxy pool ready");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ctx = CrawlContext {
        storage: storage.clone(),
        config: config.clone(),
        proxies: proxies.clone(),
        limiters,
        shutdown: shutdown_rx,
    };
    let workers = spawn_workers(ctx);

    let state = AppState {
        storage,
        config: config.clone(),
        proxy_count: proxies.len(),
        started_at: Instant::now(),
    };
    let listener = tokio::net::TcpListener::bind(&config.http.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http.addr))?;
    info!(addr = %config.http.addr, "api listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    for handle in workers {
        let _ = handle.await;
    }
    info!("shutdown complete");
    Ok(())
}
