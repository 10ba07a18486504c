//! Watch Party - Sync Daemon
//!
//! Polls a media server's sessions, feeds playback events to the sync
//! engine, and runs the reconciliation ticker.
//!
//! Usage:
//!   cargo run --release -- --server http://127.0.0.1:8096 --api-key <key>
//!   cargo run --release -- --config /path/to/watchparty.json

mod artifacts;
mod metrics;
mod poller;

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use watchparty_core::transport::DEFAULT_SERVER_URL;
use watchparty_core::{Coordinator, JsonFileStore, MediaServerClient, SessionTransport};

/// Default settings file
const DEFAULT_CONFIG: &str = "watchparty.json";

/// How often sessions are polled for playback events
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How often the status line is logged
const STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// Command line options
struct Options {
    config: String,
    server: String,
    api_key: Option<String>,
}

impl Options {
    fn parse(args: &[String]) -> Self {
        let value = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };

        Self {
            config: value("--config").unwrap_or_else(|| DEFAULT_CONFIG.to_string()),
            server: value("--server").unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            api_key: value("--api-key").or_else(|| std::env::var("WATCHPARTY_API_KEY").ok()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("watchparty_core=debug,watchparty_server=info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let options = Options::parse(&args);

    let mut client = MediaServerClient::new(&options.server)?;
    if let Some(key) = &options.api_key {
        client = client.with_api_key(key);
    }
    if let Err(e) = client.ping().await {
        warn!("Media server at {} not ready yet: {}", options.server, e);
    }
    let client = Arc::new(client);

    info!("Settings: {}", options.config);
    info!("Media server: {}", options.server);

    // Shared metrics state
    let metrics = Arc::new(RwLock::new(metrics::Metrics::new()));

    let (report_tx, mut report_rx) = mpsc::unbounded_channel();
    let store = Arc::new(JsonFileStore::new(&options.config));
    let coordinator = Arc::new(
        Coordinator::new(store, client.clone(), client.clone())
            .with_artifacts(Arc::new(artifacts::ArtifactFiles))
            .with_command_reports(report_tx),
    );

    let report_metrics = Arc::clone(&metrics);
    tokio::spawn(async move {
        while let Some(report) = report_rx.recv().await {
            report_metrics.write().command_finished(&report);
        }
    });

    let (tick_tx, mut tick_rx) = mpsc::unbounded_channel();
    let tick_metrics = Arc::clone(&metrics);
    tokio::spawn(async move {
        while let Some(summary) = tick_rx.recv().await {
            tick_metrics.write().tick_finished(summary);
        }
    });
    let ticker_cancel = coordinator.spawn_ticker(Some(tick_tx));

    let (poller_cancel, poller_rx) = oneshot::channel();
    let transport: Arc<dyn SessionTransport> = client;
    let poller = tokio::spawn(poller::run(
        Arc::clone(&coordinator),
        transport,
        Arc::clone(&metrics),
        POLL_INTERVAL,
        poller_rx,
    ));

    let mut status = tokio::time::interval(STATUS_INTERVAL);
    status.tick().await;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            _ = status.tick() => {
                let m = metrics.read();
                info!("{}", m.summary());
                for entry in m.logs.iter().rev().take(3) {
                    info!("  {} [{}] {}", entry.timestamp.format("%H:%M:%S"), entry.level.as_str(), entry.message);
                }
            }
        }
    }

    let _ = ticker_cancel.send(());
    let _ = poller_cancel.send(());
    let _ = poller.await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_options_defaults_and_flags() {
        let options = Options::parse(&args(&["watchparty-server"]));
        assert_eq!(options.config, DEFAULT_CONFIG);
        assert_eq!(options.server, DEFAULT_SERVER_URL);

        let options = Options::parse(&args(&[
            "watchparty-server",
            "--server",
            "http://media:8096",
            "--config",
            "/etc/wp.json",
            "--api-key",
            "k",
        ]));
        assert_eq!(options.server, "http://media:8096");
        assert_eq!(options.config, "/etc/wp.json");
        assert_eq!(options.api_key.as_deref(), Some("k"));
    }
}
