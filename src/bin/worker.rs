use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use ad_moderation::{
    config::AppConfig,
    db::{self, PgItemStore, PgResultStore},
    ml::LogisticModel,
    services::{bus::RedisBus, cache::RedisPredictionCache},
    worker::Worker,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting moderation worker pool");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Initialize database
    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Initialize services
    tracing::info!("Initializing services");
    let bus = Arc::new(RedisBus::new(&config.redis_url).expect("Failed to initialize task bus"));
    let results = Arc::new(PgResultStore::new(db_pool.clone()));
    let items = Arc::new(PgItemStore::new(db_pool.clone()));
    let cache = Arc::new(
        RedisPredictionCache::new(&config.redis_url)
            .expect("Failed to initialize prediction cache"),
    );

    // The model is loaded once per process; every worker shares the same
    // immutable reference.
    tracing::info!("Loading violation model");
    let model =
        Arc::new(LogisticModel::load(config.model_path.as_deref()).expect("Failed to load model"));

    let worker = Worker::new(bus, results, items, cache, model);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tracing::info!(worker_count = config.worker_count, "Worker pool ready");

    let mut handles = Vec::with_capacity(config.worker_count);
    for worker_id in 0..config.worker_count {
        let worker = worker.clone();
        let shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            tracing::info!(worker_id, "Worker started");
            worker.run(shutdown).await;
            tracing::info!(worker_id, "Worker stopped");
        }));
    }

    // Graceful shutdown: stop fetching on SIGINT/SIGTERM and let in-flight
    // tasks reach a terminal state before exiting.
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

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Worker task panicked");
        }
    }

    tracing::info!("Worker pool stopped");
}
