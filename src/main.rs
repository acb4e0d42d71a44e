use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use ad_moderation::app_state::AppState;
use ad_moderation::config::AppConfig;
use ad_moderation::db;
use ad_moderation::routes;
use ad_moderation::services::bus::{RedisBus, TASK_TOPIC};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing ad-moderation server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!(
        "moderation_tasks_submitted",
        "Total moderation tasks accepted at intake"
    );
    metrics::describe_counter!(
        "moderation_tasks_completed",
        "Total moderation tasks completed by the worker pool"
    );
    metrics::describe_counter!(
        "moderation_tasks_retried",
        "Total transient failures requeued with a delay"
    );
    metrics::describe_counter!(
        "moderation_tasks_dead_lettered",
        "Total tasks routed to the dead-letter topic"
    );
    metrics::describe_counter!(
        "moderation_tasks_duplicate",
        "Total redelivered tasks discarded by the idempotent short-circuit"
    );
    metrics::describe_counter!(
        "moderation_cache_hits",
        "Total predictions served from the cache without model invocation"
    );
    metrics::describe_histogram!(
        "moderation_processing_seconds",
        "Time to process a moderation task end-to-end"
    );
    metrics::describe_gauge!(
        "moderation_queue_depth",
        "Current number of visible tasks on the moderation topic"
    );

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Initialize the Redis task bus
    tracing::info!("Connecting to Redis task bus");
    let bus = RedisBus::new(&config.redis_url).expect("Failed to initialize task bus");

    // Create shared application state
    let state = AppState::new(db_pool, bus);

    // Periodically export the task topic depth
    let depth_bus = state.bus.clone();
    tokio::spawn(async move {
        loop {
            if let Ok(depth) = depth_bus.depth(TASK_TOPIC).await {
                metrics::gauge!("moderation_queue_depth").set(depth as f64);
            }
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
    });

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/api/v1/moderation",
            post(routes::moderation::submit_moderation),
        )
        .route(
            "/api/v1/moderation/{task_id}",
            get(routes::moderation::get_moderation_result),
        )
        .route("/api/v1/predict", post(routes::moderation::predict))
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(64 * 1024)); // 64 KB limit

    tracing::info!("Starting ad-moderation on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
