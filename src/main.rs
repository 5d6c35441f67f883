use anyhow::{anyhow, Context, Result};
use nerve_collector::config::CollectorConfig;
use nerve_collector::parser::SchemaRegistry;
use nerve_collector::{Metric, NerveCollector};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("initialize tracing subscriber")?;

    if let Err(err) = run().await {
        tracing::error!(error = ?err, "fatal collector error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("NERVE_COLLECTOR_CONFIG").ok())
        .map(PathBuf::from);
    let config =
        CollectorConfig::load(config_path.as_deref()).context("load collector configuration")?;

    let collector = NerveCollector::new(&config, SchemaRegistry::default())
        .context("initialize nerve collector")?;

    info!(
        discovery = %config.config_file_path.display(),
        query_path = %config.query_path,
        interval_secs = config.interval,
        timeout_secs = config.timeout,
        whitelist = ?config.services_whitelist,
        max_concurrency = config.max_concurrency,
        "nerve collector online"
    );

    // Capacity 1: producers wait for the handler, as close to a rendezvous
    // channel as tokio allows.
    let (tx, rx) = mpsc::channel::<Metric>(1);
    let handler = tokio::spawn(forward_metrics(rx));

    let mut ticker = tokio::time::interval(config.interval());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match collector.collect(&tx).await {
                    Ok(summary) => summary.log(),
                    Err(err) => warn!(error = %err, "collection cycle aborted"),
                }
            }
            res = tokio::signal::ctrl_c() => {
                if let Err(err) = res {
                    warn!(error = %err, "ctrl_c listener error");
                }
                info!("Shutdown signal received, exiting");
                break;
            }
        }
    }

    drop(tx);
    handler.await.context("join metric handler")?;
    Ok(())
}

/// Stand-in for the downstream handler layer: log every metric.
async fn forward_metrics(mut rx: mpsc::Receiver<Metric>) {
    while let Some(metric) = rx.recv().await {
        match serde_json::to_string(&metric) {
            Ok(json) => debug!(metric = %json, "metric"),
            Err(err) => warn!(error = %err, name = %metric.name, "unserializable metric"),
        }
    }
}

fn init_tracing() -> Result<()> {
    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,hyper=warn,reqwest=warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber init: {err}"))
}
