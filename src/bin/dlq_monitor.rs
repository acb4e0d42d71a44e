use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use ad_moderation::{config::AppConfig, services::bus::RedisBus, services::dlq::DlqMonitor};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting DLQ monitor");

    let config = AppConfig::from_env().expect("Failed to load configuration");

    let bus = Arc::new(RedisBus::new(&config.redis_url).expect("Failed to initialize task bus"));
    let monitor = DlqMonitor::new(bus);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        monitor.run(shutdown_rx).await;
    });

    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT, shutting down");
        }
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }

    shutdown_tx.send(true).ok();

    if let Err(e) = handle.await {
        tracing::error!(error = %e, "Monitor task panicked");
    }

    tracing::info!("DLQ monitor stopped");
}
