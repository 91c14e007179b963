//! cmon-daemon entry point.
//!
//! This file is intentionally thin: it sets up tracing, loads config, wires
//! the chain monitor onto its own task, and starts the HTTP server. All route
//! handlers live in `routes.rs`; all shared state types live in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use cmon_config::{ConfigConsumer, MonitorConfig, UnusedKeyPolicy};
use cmon_daemon::{routes, state};
use cmon_reconcile::{ChainWatermark, Layer};
use cmon_runtime::{
    ChainMonitor, MessageMatchRegistrar, MonitorSettings, Notifier, PgStore, TracingNotifier,
};
use tokio::sync::watch;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};

const ENV_CONFIG_PATHS: &str = "CMON_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/cmon.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience).
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cfg = load_config()?;

    let pool = cmon_db::connect_from_env().await?;
    cmon_db::migrate(&pool).await?;
    let store = Arc::new(PgStore::new(pool));

    let l1 = Arc::new(ChainWatermark::new(Layer::L1));
    let l2 = Arc::new(ChainWatermark::new(Layer::L2));
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);

    let settings = MonitorSettings {
        batch_size: cfg.monitor.batch_size,
        tick_interval: Duration::from_millis(cfg.monitor.tick_interval_ms),
        ..Default::default()
    };
    let monitor = ChainMonitor::new(
        store.clone(),
        l1.clone(),
        l2.clone(),
        notifier.clone(),
        settings,
    )
    .await
    .context("chain monitor startup failed")?;

    let registrar = Arc::new(MessageMatchRegistrar::new(
        store,
        notifier,
        cfg.l1.start_number,
    ));
    let shared = Arc::new(state::AppState::new(l1, l2, registrar, monitor.subscribe()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor_task = tokio::spawn(monitor.run(shutdown_rx));

    let app = routes::build_router(Arc::clone(&shared)).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    let addr: SocketAddr = cfg
        .daemon
        .addr
        .parse()
        .with_context(|| format!("invalid /daemon/addr '{}'", cfg.daemon.addr))?;
    info!("cmon-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    let _ = shutdown_tx.send(true);
    monitor_task.await.context("chain monitor task panicked")?;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Layered YAML from `CMON_CONFIG` (comma-separated, later wins).
fn load_config() -> anyhow::Result<MonitorConfig> {
    let raw = std::env::var(ENV_CONFIG_PATHS).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let paths: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let loaded = cmon_config::load_layered_yaml(&paths)?;
    cmon_config::report_unused_keys(
        ConfigConsumer::Daemon,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )?;
    let cfg = loaded.monitor()?;

    for (layer, contracts) in [("l1", &cfg.l1.contracts), ("l2", &cfg.l2.contracts)] {
        let missing = contracts.unconfigured();
        if !missing.is_empty() {
            warn!(layer, missing = ?missing, "contract addresses not configured");
        }
    }
    info!(config_hash = %loaded.config_hash, "config loaded");
    Ok(cfg)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "ctrl-c handler unavailable; serving until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
